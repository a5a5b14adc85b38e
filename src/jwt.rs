//! HS256 JWT token service.
//!
//! The [`TokenVerifier`] implementation most deployments will wire into
//! [`BearerAuth`](crate::auth::BearerAuth), plus issuance for login handlers.
//! Claims are deliberately minimal: subject id, email, expiry.

use async_trait::async_trait;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    get_current_timestamp,
};
use serde::{Deserialize, Serialize};

use crate::auth::{Identity, TokenVerifier, VerifyError};

#[derive(Debug, Deserialize, Serialize)]
struct Claims {
    sub: String,
    email: String,
    exp: u64,
}

/// Issues and verifies HS256 tokens with a shared secret.
pub struct JwtTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl JwtTokenService {
    /// `ttl_secs` is how long issued tokens stay valid.
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    /// Signs a token for the given identity, expiring `ttl_secs` from now.
    pub fn issue(&self, identity: &Identity) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: identity.subject_id.clone(),
            email: identity.email.clone(),
            exp: get_current_timestamp() + self.ttl_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenService {
    async fn verify(&self, token: &str) -> Result<Identity, VerifyError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| VerifyError::new(e.to_string()))?;
        Ok(Identity::new(data.claims.sub, data.claims.email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_tokens_verify() {
        let svc = JwtTokenService::new(b"test-secret", 60);
        let token = svc.issue(&Identity::new("user-7", "carol@example.com")).unwrap();

        let identity = svc.verify(&token).await.unwrap();
        assert_eq!(identity.subject_id, "user-7");
        assert_eq!(identity.email, "carol@example.com");
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let issuer = JwtTokenService::new(b"secret-a", 60);
        let verifier = JwtTokenService::new(b"secret-b", 60);

        let token = issuer.issue(&Identity::new("user-7", "carol@example.com")).unwrap();
        assert!(verifier.verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let svc = JwtTokenService::new(b"test-secret", 60);
        assert!(svc.verify("not.a.jwt").await.is_err());
    }
}
