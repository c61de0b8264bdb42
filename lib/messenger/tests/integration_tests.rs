//! Integration tests for `HyperTransport` and `Messenger` using wiremock.

use std::time::Duration;

use assert2::{check, let_assert};
use messenger::{
    CallContext, Error, ErrorKind, HyperTransport, JsonCodec, Messenger, Method, Request, Transport,
    TransportConfig,
};
use serde::{Deserialize, Serialize};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

#[tokio::test]
async fn test_transport_get_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Served-By", "mock")
                .set_body_string("hello"),
        )
        .mount(&mock_server)
        .await;

    let transport = HyperTransport::new();
    let url = url::Url::parse(&format!("{}/users/1", mock_server.uri())).expect("url");
    let request = Request::builder(Method::Get, url).build();

    let response = transport.send(request).await.expect("response");

    check!(response.status() == 200);
    check!(response.header("x-served-by") == Some("mock"));
    check!(response.body().as_ref() == b"hello");
}

#[tokio::test]
async fn test_transport_connection_refused() {
    let transport = HyperTransport::with_config(
        TransportConfig::builder()
            .connect_timeout(Duration::from_secs(1))
            .build(),
    );
    let url = url::Url::parse("http://127.0.0.1:1/").expect("url");

    let err = transport
        .send(Request::builder(Method::Get, url).build())
        .await
        .expect_err("refused");

    check!(err.kind() == ErrorKind::Transport);
}

#[tokio::test]
async fn test_messenger_post_json() {
    let mock_server = MockServer::start().await;

    let input = User {
        id: 0,
        name: "Bob".to_string(),
    };
    let output = User {
        id: 42,
        name: "Bob".to_string(),
    };

    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("Content-Type", "application/json; charset=UTF-8"))
        .and(header("Accept", "application/json"))
        .and(body_json(&input))
        .respond_with(ResponseTemplate::new(200).set_body_json(&output))
        .mount(&mock_server)
        .await;

    let messenger = Messenger::builder().codec(JsonCodec).build();
    let mut created = User {
        id: 0,
        name: String::new(),
    };

    let reply = messenger
        .call()
        .post(format!("{}/users", mock_server.uri()))
        .json(&input)
        .json_response(&mut created)
        .send(&CallContext::new())
        .await
        .expect("send");

    check!(reply.status() == 200);
    check!(created == output);
}

#[tokio::test]
async fn test_messenger_query_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": ["messenger", "rustls"]
        })))
        .mount(&mock_server)
        .await;

    let messenger = Messenger::new();
    let reply = messenger
        .call()
        .get(format!("{}/search", mock_server.uri()))
        .param("q", "rust")
        .param("page", "1")
        .send(&CallContext::new())
        .await
        .expect("send");

    let results: serde_json::Value = reply.json().expect("json");
    check!(results["results"][0] == "messenger");
}

#[tokio::test]
async fn test_messenger_http_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/not-found"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&mock_server)
        .await;

    let messenger = Messenger::new();
    let err = messenger
        .call()
        .get(format!("{}/not-found", mock_server.uri()))
        .send(&CallContext::new())
        .await
        .expect_err("rejected");

    check!(err.status() == Some(404));
    let_assert!(Some(body) = err.body());
    check!(body.as_ref() == b"Not Found");
}

#[tokio::test]
async fn test_messenger_status_handler() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/users/9"))
        .respond_with(ResponseTemplate::new(409).set_body_string("locked"))
        .mount(&mock_server)
        .await;

    let mut conflict = None;
    let reply = Messenger::builder()
        .validator(|status: u16, body: &bytes::Bytes| match status {
            200 | 409 => Ok(()),
            _ => Err(messenger::rejection(status, body)),
        })
        .build()
        .call()
        .delete(format!("{}/users/9", mock_server.uri()))
        .handler(409, |reply: &messenger::Reply| -> messenger::Result<()> {
            conflict = Some(reply.text()?.to_string());
            Ok(())
        })
        .send(&CallContext::new())
        .await
        .expect("handled");

    check!(reply.status() == 409);
    check!(conflict.as_deref() == Some("locked"));
}

#[tokio::test]
async fn test_messenger_transport_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let messenger = Messenger::builder()
        .transport_config(
            TransportConfig::builder()
                .timeout(Duration::from_millis(100))
                .build(),
        )
        .build();

    let err = messenger
        .call()
        .get(mock_server.uri())
        .send(&CallContext::new())
        .await
        .expect_err("timed out");

    check!(err.is_connection());
    let_assert!(Error::Send(_) = err);
}
