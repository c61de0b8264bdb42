//! Response validation.
//!
//! A [`Validator`] is the single authority on whether a completed exchange
//! counts as a success. It sees the status code and the drained body.

use bytes::Bytes;

use crate::{Error, Result};

/// Longest body prefix embedded in a rejection message.
const BODY_SNIPPET_LIMIT: usize = 512;

/// Status + body acceptance predicate.
pub trait Validator: Send + Sync {
    /// Approve the response, or return the error it should fail with.
    fn validate(&self, status: u16, body: &Bytes) -> Result<()>;
}

impl<F> Validator for F
where
    F: Fn(u16, &Bytes) -> Result<()> + Send + Sync,
{
    fn validate(&self, status: u16, body: &Bytes) -> Result<()> {
        self(status, body)
    }
}

/// Approves `200 OK` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl Validator for DefaultValidator {
    fn validate(&self, status: u16, body: &Bytes) -> Result<()> {
        if status == 200 {
            Ok(())
        } else {
            Err(rejection(status, body))
        }
    }
}

/// Approves any `2xx` status.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuccessValidator;

impl Validator for SuccessValidator {
    fn validate(&self, status: u16, body: &Bytes) -> Result<()> {
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(rejection(status, body))
        }
    }
}

/// Approves every response; status routing is left to handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _status: u16, _body: &Bytes) -> Result<()> {
        Ok(())
    }
}

/// Build the typed rejection for `status`, embedding a body snippet.
#[must_use]
pub fn rejection(status: u16, body: &Bytes) -> Error {
    let text = String::from_utf8_lossy(body);
    let mut chars = text.chars();
    let mut snippet: String = chars.by_ref().take(BODY_SNIPPET_LIMIT).collect();
    if chars.next().is_some() {
        snippet.push_str("...");
    }
    Error::http_with_body(
        status,
        format!("unexpected status {status}: {snippet}"),
        body.clone(),
    )
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;

    #[test]
    fn default_validator_approves_ok_only() {
        check!(DefaultValidator.validate(200, &Bytes::new()).is_ok());
        check!(DefaultValidator.validate(201, &Bytes::new()).is_err());
    }

    #[test]
    fn default_validator_embeds_body() {
        let err = DefaultValidator
            .validate(500, &Bytes::from_static(b"boom"))
            .expect_err("rejected");

        let_assert!(Error::Http { status, message, body } = err);
        check!(status == 500);
        check!(message.contains("boom"));
        check!(body == Some(Bytes::from_static(b"boom")));
    }

    #[test]
    fn long_bodies_are_truncated_in_message() {
        let body = Bytes::from("x".repeat(2_000));
        let err = rejection(503, &body);
        let_assert!(Error::Http { message, body: Some(kept), .. } = err);
        check!(message.len() < 600);
        check!(message.ends_with("..."));
        check!(kept.len() == 2_000);
    }

    #[test]
    fn success_validator_accepts_2xx() {
        check!(SuccessValidator.validate(204, &Bytes::new()).is_ok());
        check!(SuccessValidator.validate(404, &Bytes::new()).is_err());
    }

    #[test]
    fn closures_are_validators() {
        let accept_404 = |status: u16, _body: &Bytes| {
            if status == 404 {
                Ok(())
            } else {
                Err(Error::http(status, "nope"))
            }
        };
        check!(accept_404.validate(404, &Bytes::new()).is_ok());
        check!(AcceptAll.validate(500, &Bytes::new()).is_ok());
    }
}
