//! End-to-end dispatch behaviour: route matching, chain execution order,
//! short-circuiting, auth outcomes, and error containment.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use courier::auth::{BearerAuth, Identity, TokenVerifier, VerifyError};
use courier::{Method, Middleware, Request, Response, Router, Status};

/// Middleware that records its name, optionally halting the chain.
struct Recorder {
    name: &'static str,
    halt: bool,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Middleware for Recorder {
    async fn handle(&self, _req: &mut Request) -> anyhow::Result<Option<Response>> {
        self.log.lock().unwrap().push(self.name);
        if self.halt {
            Ok(Some(Response::error(Status::Forbidden, "halted")))
        } else {
            Ok(None)
        }
    }
}

struct FailingMiddleware;

#[async_trait]
impl Middleware for FailingMiddleware {
    async fn handle(&self, _req: &mut Request) -> anyhow::Result<Option<Response>> {
        anyhow::bail!("document store exploded")
    }
}

/// Middleware that unconditionally attaches a fixed identity.
struct AttachIdentity(&'static str);

#[async_trait]
impl Middleware for AttachIdentity {
    async fn handle(&self, req: &mut Request) -> anyhow::Result<Option<Response>> {
        req.attach_identity(Identity::new(self.0, format!("{}@example.com", self.0)))?;
        Ok(None)
    }
}

struct StaticVerifier;

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, VerifyError> {
        if token == "valid-token" {
            Ok(Identity::new("user-42", "alice@example.com"))
        } else {
            Err(VerifyError::new("signature mismatch"))
        }
    }
}

fn bearer() -> Arc<dyn Middleware> {
    Arc::new(BearerAuth::new(Arc::new(StaticVerifier)))
}

#[tokio::test]
async fn unknown_route_is_404_and_runs_nothing() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let handled = Arc::new(AtomicUsize::new(0));

    let mw = Arc::new(Recorder { name: "guard", halt: false, log: Arc::clone(&log) });
    let handled_in = Arc::clone(&handled);
    let router = Router::new()
        .route_with(Method::Get, "/contacts", move |_req: Request| {
            let handled = Arc::clone(&handled_in);
            async move {
                handled.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(Response::ok(json!([])))
            }
        }, vec![mw])
        .unwrap();

    let res = router
        .dispatch(Request::builder(Method::Get, "/nope").build())
        .await;
    assert_eq!(res.status_code(), Status::NotFound);
    assert_eq!(res.body()["error"], "route not found");
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(handled.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn method_mismatch_on_known_path_is_404() {
    let router = Router::new()
        .route(Method::Get, "/contacts", |_req: Request| async {
            anyhow::Ok(Response::ok(json!([])))
        })
        .unwrap();

    let res = router
        .dispatch(Request::builder(Method::Post, "/contacts").build())
        .await;
    assert_eq!(res.status_code(), Status::NotFound);
}

#[tokio::test]
async fn path_params_reach_the_handler() {
    let router = Router::new()
        .route(Method::Get, "/contacts/:id", |req: Request| async move {
            let id = req.param("id").unwrap_or_default().to_owned();
            anyhow::Ok(Response::ok(json!({ "id": id })))
        })
        .unwrap();

    let res = router
        .dispatch(Request::builder(Method::Get, "/contacts/42").build())
        .await;
    assert_eq!(res.status_code(), Status::Ok);
    assert_eq!(res.body()["id"], "42");
}

#[tokio::test]
async fn halting_middleware_stops_the_chain() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let handled = Arc::new(AtomicUsize::new(0));

    let chain: courier::Chain = vec![
        Arc::new(Recorder { name: "first", halt: false, log: Arc::clone(&log) }),
        Arc::new(Recorder { name: "second", halt: true, log: Arc::clone(&log) }),
        Arc::new(Recorder { name: "third", halt: false, log: Arc::clone(&log) }),
    ];
    let handled_in = Arc::clone(&handled);
    let router = Router::new()
        .route_with(Method::Get, "/contacts", move |_req: Request| {
            let handled = Arc::clone(&handled_in);
            async move {
                handled.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(Response::ok(json!([])))
            }
        }, chain)
        .unwrap();

    let res = router
        .dispatch(Request::builder(Method::Get, "/contacts").build())
        .await;
    assert_eq!(res.status_code(), Status::Forbidden);
    assert_eq!(*log.lock().unwrap(), ["first", "second"]);
    assert_eq!(handled.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn request_without_token_is_refused_before_the_handler() {
    let handled = Arc::new(AtomicUsize::new(0));
    let handled_in = Arc::clone(&handled);
    let router = Router::new()
        .route_with(Method::Post, "/contacts", move |_req: Request| {
            let handled = Arc::clone(&handled_in);
            async move {
                handled.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(Response::json(Status::Created, json!({})))
            }
        }, vec![bearer()])
        .unwrap();

    let res = router
        .dispatch(Request::builder(Method::Post, "/contacts").build())
        .await;
    assert_eq!(res.status_code(), Status::Unauthorized);
    assert_eq!(res.body()["error"], "No token provided");
    assert_eq!(handled.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn bad_token_is_401_and_good_token_reaches_handler_with_identity() {
    let router = Router::new()
        .route_with(Method::Get, "/contacts", |req: Request| async move {
            let identity = req.identity().expect("auth middleware attaches identity");
            anyhow::Ok(Response::ok(json!({
                "subject": identity.subject_id,
                "email": identity.email,
            })))
        }, vec![bearer()])
        .unwrap();

    let res = router
        .dispatch(
            Request::builder(Method::Get, "/contacts")
                .header("authorization", "Bearer forged")
                .build(),
        )
        .await;
    assert_eq!(res.status_code(), Status::Unauthorized);
    assert_eq!(res.body()["error"], "Token invalid");

    let res = router
        .dispatch(
            Request::builder(Method::Get, "/contacts")
                .header("authorization", "Bearer valid-token")
                .build(),
        )
        .await;
    assert_eq!(res.status_code(), Status::Ok);
    assert_eq!(res.body()["subject"], "user-42");
    assert_eq!(res.body()["email"], "alice@example.com");
}

#[tokio::test]
async fn handler_error_becomes_a_generic_500() {
    let router = Router::new()
        .route(Method::Get, "/contacts", |_req: Request| async {
            Err::<Response, _>(anyhow::anyhow!("repository timed out"))
        })
        .unwrap();

    let res = router
        .dispatch(Request::builder(Method::Get, "/contacts").build())
        .await;
    assert_eq!(res.status_code(), Status::InternalServerError);
    // The underlying error is logged, never exposed.
    assert_eq!(res.body()["error"], "Internal Server Error");
}

#[tokio::test]
async fn middleware_error_becomes_a_500_and_skips_the_handler() {
    let handled = Arc::new(AtomicUsize::new(0));
    let handled_in = Arc::clone(&handled);
    let router = Router::new()
        .route_with(Method::Get, "/contacts", move |_req: Request| {
            let handled = Arc::clone(&handled_in);
            async move {
                handled.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(Response::ok(json!([])))
            }
        }, vec![Arc::new(FailingMiddleware)])
        .unwrap();

    let res = router
        .dispatch(Request::builder(Method::Get, "/contacts").build())
        .await;
    assert_eq!(res.status_code(), Status::InternalServerError);
    assert_eq!(handled.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn two_identity_attaching_middlewares_are_a_500() {
    let chain: courier::Chain = vec![
        Arc::new(AttachIdentity("first")),
        Arc::new(AttachIdentity("second")),
    ];
    let router = Router::new()
        .route_with(Method::Get, "/contacts", |_req: Request| async {
            anyhow::Ok(Response::ok(json!([])))
        }, chain)
        .unwrap();

    let res = router
        .dispatch(Request::builder(Method::Get, "/contacts").build())
        .await;
    assert_eq!(res.status_code(), Status::InternalServerError);
}
