//! HTTP serving loop and graceful shutdown.
//!
//! The server owns the boundary between the wire and the dispatch core: it
//! parses each hyper request into a [`Request`] value, hands it to
//! [`Router::dispatch`], and serialises the resulting [`Response`] back as
//! JSON. Malformed JSON bodies are refused here with a 400 before the router
//! ever sees them.
//!
//! On SIGTERM or Ctrl-C the listener stops accepting, in-flight connections
//! drain, and [`Server::serve`] returns — the shape Kubernetes expects within
//! `terminationGracePeriodSeconds`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::ServeError;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::status::Status;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string — a wiring bug that
    /// should stop the process before it serves anything.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown: a SIGTERM or Ctrl-C
    /// followed by every in-flight request completing.
    pub async fn serve(self, router: Router) -> Result<(), ServeError> {
        let listener = TcpListener::bind(self.addr).await?;

        // Shared across connection tasks; the route table itself is
        // read-only from here on.
        let router = Arc::new(router);

        info!(addr = %self.addr, "courier listening");

        // JoinSet tracks every spawned connection task so shutdown can wait
        // for all of them.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM immediately stops
                // accepting, even with connections queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { bridge(router, req).await }
                        });

                        // auto::Builder speaks both HTTP/1.1 and HTTP/2,
                        // whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("courier stopped");
        Ok(())
    }
}

// ── Wire bridge ───────────────────────────────────────────────────────────────

/// Converts one hyper request into a [`Request`], dispatches it, and encodes
/// the [`Response`]. Infallible: every failure becomes a status code.
async fn bridge(
    router: Arc<Router>,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();

    let Ok(method) = parts.method.as_str().parse::<Method>() else {
        // Not a routable verb; indistinguishable from an unknown route.
        return Ok(encode(Response::error(Status::NotFound, "route not found")));
    };

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("body read error: {e}");
            return Ok(encode(Response::error(Status::BadRequest, "unreadable request body")));
        }
    };
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(_) => {
                return Ok(encode(Response::error(Status::BadRequest, "request body is not valid JSON")));
            }
        }
    };

    let query = parts.uri.query().map(parse_query).unwrap_or_default();
    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_owned(), v.to_owned()))
        })
        .collect();

    let request = Request::new(method, parts.uri.path(), body, query, headers);
    Ok(encode(router.dispatch(request).await))
}

/// Splits a raw query string into key/value pairs. Values are taken verbatim;
/// percent-decoding is left to handlers that need it.
fn parse_query(raw: &str) -> HashMap<String, String> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_owned(), v.to_owned()),
            None => (pair.to_owned(), String::new()),
        })
        .collect()
}

/// Serialises a [`Response`] into the hyper representation.
fn encode(response: Response) -> http::Response<Full<Bytes>> {
    let body = serde_json::to_vec(response.body()).unwrap_or_else(|_| b"null".to_vec());

    let mut wire = http::Response::new(Full::new(Bytes::from(body)));
    *wire.status_mut() = http::StatusCode::from_u16(response.status_code().as_u16())
        .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
    wire.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    for (name, value) in response.headers() {
        let Ok(name) = http::header::HeaderName::from_bytes(name.as_bytes()) else {
            error!(header = %name, "skipping invalid response header name");
            continue;
        };
        let Ok(value) = http::HeaderValue::from_str(value) else {
            error!(header = %name, "skipping invalid response header value");
            continue;
        };
        wire.headers_mut().insert(name, value);
    }
    wire
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal: SIGTERM (kubectl, control plane) or
/// SIGINT (Ctrl-C, local dev). Windows only has Ctrl-C.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::parse_query;

    #[test]
    fn query_pairs_split_on_ampersand() {
        let q = parse_query("page=2&tag=vip");
        assert_eq!(q.get("page").map(String::as_str), Some("2"));
        assert_eq!(q.get("tag").map(String::as_str), Some("vip"));
    }

    #[test]
    fn bare_keys_get_empty_values() {
        let q = parse_query("archived");
        assert_eq!(q.get("archived").map(String::as_str), Some(""));
    }
}
