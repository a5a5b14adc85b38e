//! Route table and dispatcher.
//!
//! One radix tree per HTTP method — O(path-length) lookup via [`matchit`].
//! A method mismatch on a known path therefore falls out as a plain 404;
//! there are no 405 semantics. Build the table once at startup; after that it
//! is read-only and dispatch needs no synchronisation.
//!
//! Dispatch walks the route's middleware chain in registration order. The
//! first middleware to produce a response short-circuits the rest of the
//! chain and the terminal handler. Errors from middleware or handler stop at
//! this boundary: they are logged and answered with a generic 500, so one
//! failing request can never take down the serving loop.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::error::RouteError;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// An ordered middleware chain, shared by routes that guard the same way.
pub type Chain = Vec<Arc<dyn Middleware>>;

struct RouteEntry {
    chain: Chain,
    handler: BoxedHandler,
}

/// The application route table.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Arc<RouteEntry>>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Registers a handler with no middleware. Returns `self` so
    /// registrations chain with `?`:
    ///
    /// ```rust,no_run
    /// # use courier::{Method, Request, Response, Router};
    /// # async fn health(_: Request) -> anyhow::Result<Response> { todo!() }
    /// # fn main() -> Result<(), courier::RouteError> {
    /// let app = Router::new()
    ///     .route(Method::Get, "/healthz", health)?;
    /// # Ok(()) }
    /// ```
    pub fn route(self, method: Method, path: &str, handler: impl Handler) -> Result<Self, RouteError> {
        self.route_with(method, path, handler, Vec::new())
    }

    /// Registers a handler behind an ordered middleware chain.
    ///
    /// Path parameters use `:name` segments — `/contacts/:id` matches
    /// `/contacts/42` binding `id = "42"`.
    pub fn route_with(
        mut self,
        method: Method,
        path: &str,
        handler: impl Handler,
        chain: Chain,
    ) -> Result<Self, RouteError> {
        self.register(method, path, handler, chain)?;
        Ok(self)
    }

    /// Non-consuming registration, for wiring code that loops over routes.
    ///
    /// Fails with [`RouteError::Duplicate`] when the (path, method) pair is
    /// already taken. Registration is a startup-only activity and a failure
    /// here should abort the process.
    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        handler: impl Handler,
        chain: Chain,
    ) -> Result<(), RouteError> {
        let entry = Arc::new(RouteEntry { chain, handler: handler.into_boxed_handler() });
        self.routes
            .entry(method)
            .or_default()
            .insert(template(path), entry)
            .map_err(|e| match e {
                matchit::InsertError::Conflict { .. } => RouteError::Duplicate {
                    method,
                    path: path.to_owned(),
                },
                source => RouteError::Pattern { path: path.to_owned(), source },
            })
    }

    /// Resolves and executes the route for `req`, producing the one response
    /// every request gets. Never panics the caller and never returns an
    /// error: every failure mode maps to a status code.
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let Some((entry, params)) = self.lookup(req.method(), req.path()) else {
            return Response::error(Status::NotFound, "route not found");
        };
        req.set_params(params);

        for middleware in &entry.chain {
            match middleware.handle(&mut req).await {
                Ok(None) => {}
                Ok(Some(response)) => return response,
                Err(e) => {
                    tracing::error!(
                        method = %req.method(),
                        path = %req.path(),
                        error = %e,
                        "middleware failed"
                    );
                    return Response::error(Status::InternalServerError, "Internal Server Error");
                }
            }
        }

        match entry.handler.call(req).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "handler failed");
                Response::error(Status::InternalServerError, "Internal Server Error")
            }
        }
    }

    fn lookup(&self, method: Method, path: &str) -> Option<(Arc<RouteEntry>, HashMap<String, String>)> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((Arc::clone(matched.value), params))
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrites `:name` path segments into the `{name}` syntax the radix tree
/// speaks. Segments without a leading colon pass through untouched.
fn template(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("/")
}
