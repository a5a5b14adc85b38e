//! Built-in Kubernetes health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from the load-balancer. |
//!
//! ```rust,no_run
//! use courier::{Method, Router, health};
//!
//! # fn main() -> Result<(), courier::RouteError> {
//! let app = Router::new()
//!     .route(Method::Get, "/healthz", health::liveness)?
//!     .route(Method::Get, "/readyz", health::readiness)?;
//! # Ok(()) }
//! ```
//!
//! Replace `readiness` with your own handler to gate on dependency health
//! (document store, broker connection, …).

use serde_json::json;

use crate::{Request, Response};

/// Liveness probe handler. Always `200 OK`; if the process can answer HTTP at
/// all, it is alive, so this handler intentionally has no dependencies.
pub async fn liveness(_req: Request) -> anyhow::Result<Response> {
    Ok(Response::ok(json!({"status": "ok"})))
}

/// Readiness probe handler (default implementation). Always `200 OK`; swap in
/// your own if the application needs a warm-up period.
pub async fn readiness(_req: Request) -> anyhow::Result<Response> {
    Ok(Response::ok(json!({"status": "ready"})))
}
