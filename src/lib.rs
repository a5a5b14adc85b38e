//! # courier
//!
//! The dispatch core for small JSON backends: an HTTP routing/middleware
//! pipeline and an at-least-once pub/sub delivery adapter. Nothing more.
//!
//! ## The contract
//!
//! Domain logic lives outside this crate, behind three seams: terminal
//! [`Handler`]s produce responses, a [`TokenVerifier`](auth::TokenVerifier)
//! judges credentials, and [`Subscriber`](broker::Subscriber)s consume
//! events. courier owns what happens between those seams — matching, chain
//! execution, short-circuiting, fanout, acknowledge/requeue — and contains
//! every failure at its boundary: a failing request becomes a status code, a
//! failing message becomes a redelivery, and neither takes the process down.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use courier::{Method, Request, Response, Router, Server, Status};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = Router::new()
//!         .route(Method::Get,  "/contacts/:id", find_contact)?
//!         .route(Method::Post, "/contacts",     create_contact)?;
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await?;
//!     Ok(())
//! }
//!
//! async fn find_contact(req: Request) -> anyhow::Result<Response> {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Ok(Response::ok(serde_json::json!({ "id": id })))
//! }
//!
//! async fn create_contact(req: Request) -> anyhow::Result<Response> {
//!     if req.body().is_null() {
//!         return Ok(Response::status(Status::BadRequest));
//!     }
//!     Ok(Response::status(Status::Created))
//! }
//! ```
//!
//! Routes take an ordered middleware chain via
//! [`Router::route_with`] — see [`auth::BearerAuth`] for the built-in
//! bearer-token guard. Events travel through [`pubsub::DurablePubSub`] over
//! any [`transport::Transport`]; [`memory::MemoryTransport`] ships in-crate.

mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod auth;
pub mod broker;
pub mod health;
pub mod jwt;
pub mod memory;
pub mod middleware;
pub mod pubsub;
pub mod transport;

pub use error::{RouteError, ServeError};
pub use handler::Handler;
pub use method::Method;
pub use middleware::Middleware;
pub use request::{IdentityAlreadySet, Request};
pub use response::Response;
pub use router::{Chain, Router};
pub use server::Server;
pub use status::Status;
