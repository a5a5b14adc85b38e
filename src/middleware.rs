//! Middleware contract.
//!
//! A middleware sits in front of a terminal handler and sees every request
//! routed through its chain, in registration order. For each request it picks
//! one of three exits:
//!
//! - `Ok(None)` — pass through; the next chain entry (or the handler) runs
//!   with any annotation the middleware made, such as an attached identity.
//! - `Ok(Some(response))` — short-circuit; that response goes straight back
//!   to the client and nothing later in the chain runs.
//! - `Err(_)` — unexpected failure; the dispatcher logs it and answers with a
//!   generic 500. Expected refusals (401, 403) are short-circuits, not errors.
//!
//! Middlewares must be reentrant: one instance is shared across all in-flight
//! requests, so any per-request state belongs on the [`Request`] itself.

use async_trait::async_trait;

use crate::request::Request;
use crate::response::Response;

/// A single entry in a route's middleware chain.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Inspects (and possibly annotates) the request, or produces the final
    /// response for it.
    async fn handle(&self, req: &mut Request) -> anyhow::Result<Option<Response>>;
}
