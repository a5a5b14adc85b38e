//! Terminal handler trait and type erasure.
//!
//! The router needs to hold handlers of *different* concrete types in one
//! table, so handlers are stored as trait objects behind a common interface.
//! The chain from user code to vtable call:
//!
//! ```text
//! async fn find(req: Request) -> anyhow::Result<Response> { … }
//!        ↓ router.route(Method::Get, "/contacts/:id", find)
//! find.into_boxed_handler()                 ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(find))                 ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at dispatch time       ← one vtable dispatch
//! ```
//!
//! Handlers are fallible: an `Err` crosses back to the dispatcher, which logs
//! it and answers with a generic 500. Expected application outcomes (404, 422,
//! …) are `Ok` responses with the appropriate status, not errors.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::Response;

/// A heap-allocated, type-erased future resolving to the handler outcome.
pub(crate) type BoxFuture =
    Pin<Box<dyn Future<Output = anyhow::Result<Response>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid terminal handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request) -> anyhow::Result<Response>
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
{
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype bridging a concrete handler `F` into the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        Box::pin((self.0)(req))
    }
}
