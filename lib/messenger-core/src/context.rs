//! Per-call context.
//!
//! A [`CallContext`] travels explicitly through every
//! [`Dispatcher::dispatch`](crate::Dispatcher::dispatch). It carries the
//! call's cancellation signal, its optional deadline, and the shared
//! [`DeliveryContext`] through which outer decorators observe the response
//! produced further in.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use messenger_core::CallContext;
//!
//! let cx = CallContext::new();
//! let child = cx.with_timeout(Duration::from_secs(5));
//! assert!(child.deadline().is_some());
//! cx.cancel();
//! assert!(child.err().is_some());
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{Error, Request, Response};

// ============================================================================
// Delivery Context
// ============================================================================

#[derive(Debug)]
struct DeliveryState {
    request: Request,
    response: Option<Response>,
}

/// In-flight request and response of one logical call.
///
/// Created once at the outermost entry point and shared by every decorator
/// and every retry attempt of that call.
#[derive(Debug)]
pub struct DeliveryContext {
    state: Mutex<DeliveryState>,
}

impl DeliveryContext {
    fn new(request: Request) -> Self {
        Self {
            state: Mutex::new(DeliveryState {
                request,
                response: None,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut DeliveryState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// The request of this call.
    ///
    /// Starts as the request the call was attached with; decorators that
    /// rewrite the request in flight mirror their changes here through
    /// [`DeliveryContext::set_header`].
    #[must_use]
    pub fn request(&self) -> Request {
        self.with_state(|state| state.request.clone())
    }

    /// Set a header on the delivery's request, replacing any value under
    /// the same case-insensitive name.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.with_state(|state| state.request.set_header(name, value));
    }

    /// The latest response recorded for this call, if any.
    #[must_use]
    pub fn response(&self) -> Option<Response> {
        self.with_state(|state| state.response.clone())
    }

    /// Record a response.
    pub fn set_response(&self, response: Response) {
        self.with_state(|state| state.response = Some(response));
    }
}

// ============================================================================
// Call Context
// ============================================================================

/// Cancellation, deadline, and delivery of one logical call.
///
/// Cloning is cheap; clones share the cancellation signal and delivery.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    delivery: Option<Arc<DeliveryContext>>,
}

impl CallContext {
    /// A context with no deadline that is never cancelled unless asked.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context driven by an existing cancellation token.
    #[must_use]
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
            delivery: None,
        }
    }

    /// Derive a child context that ends at `deadline` at the latest.
    ///
    /// The child inherits the parent's cancellation and delivery; cancelling
    /// the child never cancels the parent.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
            delivery: self.delivery.clone(),
        }
    }

    /// Derive a child context bounded by `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attach a delivery context for `request` unless one is already attached.
    #[must_use]
    pub fn with_delivery(&self, request: &Request) -> Self {
        let mut cx = self.clone();
        if cx.delivery.is_none() {
            cx.delivery = Some(Arc::new(DeliveryContext::new(request.clone())));
        }
        cx
    }

    /// The delivery context, if one was attached.
    #[must_use]
    pub fn delivery(&self) -> Option<&DeliveryContext> {
        self.delivery.as_deref()
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Guard that cancels this context when dropped, releasing anything
    /// waiting on it.
    #[must_use]
    pub fn release_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    /// Why this context has ended, or `None` while it is still live.
    #[must_use]
    pub fn err(&self) -> Option<Error> {
        if self.token.is_cancelled() {
            return Some(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once this context is cancelled or its deadline passes.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                () = self.token.cancelled() => Error::Cancelled,
                () = tokio::time::sleep_until(deadline) => Error::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                Error::Cancelled
            }
        }
    }
}
