//! Bearer-token authentication: the verifier port and the middleware.
//!
//! Token issuance and verification mechanics live behind [`TokenVerifier`];
//! the middleware only knows how to pull the credential out of the
//! `authorization` header, hand it to the verifier, and translate the outcome
//! into either an attached [`Identity`] or a 401. Verification failures never
//! leak details to the client — every failure mode is a flat 401 body.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// The authenticated principal attached to a request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    pub subject_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(subject_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self { subject_id: subject_id.into(), email: email.into() }
    }
}

/// Verification failure. The reason is logged server-side only; clients see a
/// uniform `Token invalid`.
#[derive(Debug, Error)]
#[error("token rejected: {reason}")]
pub struct VerifyError {
    pub reason: String,
}

impl VerifyError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Token-verification collaborator.
///
/// Implemented outside the dispatch core — see [`jwt`](crate::jwt) for the
/// HS256 implementation, or hand the middleware a stub in tests.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, VerifyError>;
}

/// Middleware enforcing `authorization: Bearer <token>` on a route.
///
/// Stateless and shared across concurrent requests; its only effect on a
/// passing request is the attached identity.
pub struct BearerAuth {
    verifier: Arc<dyn TokenVerifier>,
}

impl BearerAuth {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl Middleware for BearerAuth {
    async fn handle(&self, req: &mut Request) -> anyhow::Result<Option<Response>> {
        let Some(header) = req.header("authorization") else {
            return Ok(Some(Response::error(Status::Unauthorized, "No token provided")));
        };

        // Expect `<scheme> <token>`; anything shorter is malformed.
        let mut parts = header.split_whitespace();
        let _scheme = parts.next();
        let Some(token) = parts.next() else {
            return Ok(Some(Response::error(Status::Unauthorized, "Token malformatted")));
        };

        match self.verifier.verify(token).await {
            Ok(identity) => {
                req.attach_identity(identity)?;
                Ok(None)
            }
            Err(e) => {
                tracing::debug!(reason = %e, "bearer token rejected");
                Ok(Some(Response::error(Status::Unauthorized, "Token invalid")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    struct StaticVerifier {
        accept: &'static str,
    }

    #[async_trait]
    impl TokenVerifier for StaticVerifier {
        async fn verify(&self, token: &str) -> Result<Identity, VerifyError> {
            if token == self.accept {
                Ok(Identity::new("user-1", "alice@example.com"))
            } else {
                Err(VerifyError::new("unknown token"))
            }
        }
    }

    fn auth() -> BearerAuth {
        BearerAuth::new(Arc::new(StaticVerifier { accept: "good" }))
    }

    #[tokio::test]
    async fn missing_header_is_401() {
        let mut req = Request::builder(Method::Get, "/contacts").build();
        let res = auth().handle(&mut req).await.unwrap().unwrap();
        assert_eq!(res.status_code(), Status::Unauthorized);
        assert_eq!(res.body()["error"], "No token provided");
    }

    #[tokio::test]
    async fn scheme_without_token_is_401() {
        let mut req = Request::builder(Method::Get, "/contacts")
            .header("authorization", "Bearer")
            .build();
        let res = auth().handle(&mut req).await.unwrap().unwrap();
        assert_eq!(res.body()["error"], "Token malformatted");
    }

    #[tokio::test]
    async fn rejected_token_is_401() {
        let mut req = Request::builder(Method::Get, "/contacts")
            .header("authorization", "Bearer forged")
            .build();
        let res = auth().handle(&mut req).await.unwrap().unwrap();
        assert_eq!(res.body()["error"], "Token invalid");
        assert!(req.identity().is_none());
    }

    #[tokio::test]
    async fn accepted_token_attaches_identity_and_continues() {
        let mut req = Request::builder(Method::Get, "/contacts")
            .header("Authorization", "Bearer good")
            .build();
        let verdict = auth().handle(&mut req).await.unwrap();
        assert!(verdict.is_none());
        assert_eq!(req.identity().unwrap().email, "alice@example.com");
    }
}
