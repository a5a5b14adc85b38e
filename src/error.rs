//! Error types for route registration and serving.
//!
//! Application-level failures (404, 401, 500, …) are expressed as HTTP
//! [`Response`](crate::Response) values, never as these errors. The types here
//! cover the two things that may legitimately abort startup: a malformed or
//! duplicate route table, and socket-level failures. Messaging has its own
//! taxonomy in [`broker`](crate::broker) and [`transport`](crate::transport).

use thiserror::Error;

use crate::method::Method;

/// Route-table construction failure.
///
/// Registration happens once at startup, before serving begins, so these are
/// fatal: a process with a broken route table must not come up.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The (path, method) pair is already registered.
    #[error("route {method} {path} is already registered")]
    Duplicate { method: Method, path: String },

    /// The path pattern is not a valid route template.
    #[error("invalid route pattern `{path}`: {source}")]
    Pattern {
        path: String,
        #[source]
        source: matchit::InsertError,
    },
}

/// Socket-level serving failure: binding the port or accepting connections.
#[derive(Debug, Error)]
#[error("io: {0}")]
pub struct ServeError(#[from] pub(crate) std::io::Error);
