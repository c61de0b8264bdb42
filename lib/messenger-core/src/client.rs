//! Dispatch capabilities.
//!
//! - [`Transport`] - Low-level network I/O, consumed by the pipeline
//! - [`Dispatcher`] - One link of the decorator chain
//! - [`Policy`] - External execution policy wrapped around an action
//!
//! Implement [`Transport`] to plug in a network stack, or [`Dispatcher`] to
//! add a decorator or a mock for tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::{CallContext, Request, Response, Result};

/// Boxed future returned by [`Dispatcher::dispatch`].
pub type DispatchFuture<'a> = Pin<Box<dyn Future<Output = Result<Response<Bytes>>> + Send + 'a>>;

/// Type-erased, shareable dispatcher.
pub type BoxDispatcher = Arc<dyn Dispatcher>;

/// Core transport trait.
///
/// Performs the actual network exchange and fully materializes status,
/// headers and body.
pub trait Transport: Send + Sync {
    /// Send a request and return the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails for any reason:
    /// - Network errors
    /// - TLS errors
    /// - Body read errors
    fn send(&self, request: Request<Bytes>)
    -> impl Future<Output = Result<Response<Bytes>>> + Send;
}

/// One link of the dispatch chain.
///
/// Decorators wrap an inner dispatcher and must leave the request and
/// response untouched apart from their own cross-cutting effect. They hold no
/// per-call state: everything belonging to a call lives in the
/// [`CallContext`].
pub trait Dispatcher: Send + Sync {
    /// Dispatch `request` within `cx`.
    ///
    /// # Errors
    ///
    /// Returns transport errors, and [`Error::Cancelled`](crate::Error::Cancelled)
    /// or [`Error::DeadlineExceeded`](crate::Error::DeadlineExceeded) when
    /// `cx` ends first.
    fn dispatch<'a>(&'a self, cx: &'a CallContext, request: Request<Bytes>) -> DispatchFuture<'a>;
}

impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    fn dispatch<'a>(&'a self, cx: &'a CallContext, request: Request<Bytes>) -> DispatchFuture<'a> {
        (**self).dispatch(cx, request)
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for Box<D> {
    fn dispatch<'a>(&'a self, cx: &'a CallContext, request: Request<Bytes>) -> DispatchFuture<'a> {
        (**self).dispatch(cx, request)
    }
}

// ============================================================================
// Execution Policy
// ============================================================================

/// Future returned by an [`Action`] and by [`Policy::execute`].
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Zero-argument action run by a [`Policy`]. May be invoked several times.
pub type Action<'a> = Box<dyn FnMut() -> ActionFuture<'a> + Send + 'a>;

/// External execution policy.
///
/// A policy wraps an action with arbitrary before/after logic and may run it
/// more than once (retry, circuit breaking).
pub trait Policy: Send + Sync {
    /// Run `action` under this policy.
    fn execute<'a>(&'a self, cx: &'a CallContext, action: Action<'a>) -> ActionFuture<'a>;
}

/// Policy that runs the action exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectPolicy;

impl Policy for DirectPolicy {
    fn execute<'a>(&'a self, _cx: &'a CallContext, mut action: Action<'a>) -> ActionFuture<'a> {
        Box::pin(async move { action().await })
    }
}

impl<P: Policy + ?Sized> Policy for Arc<P> {
    fn execute<'a>(&'a self, cx: &'a CallContext, action: Action<'a>) -> ActionFuture<'a> {
        (**self).execute(cx, action)
    }
}
