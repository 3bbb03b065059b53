//! Auth boundary: the socket upgrade route only depends on [`AuthIdentity`]
//! and the [`AuthenticatedUser`] extractor, never on a concrete token
//! format. [`HmacJwtIdentity`] is a minimal HS256 implementation suitable
//! for development and tests; a production deployment can swap in an
//! OAuth2 / OIDC-backed issuer without touching any handler signature.
//!
//! Refresh-token rotation and the Google OAuth2 code exchange are declared
//! as [`TokenIssuer`] but not implemented here — a production deployment is
//! expected to supply its own.

use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::{dev, web, FromRequest, HttpRequest};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub type UserId = String;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing or malformed authorization header")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

impl actix_web::ResponseError for AuthError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::UNAUTHORIZED
    }
}

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// Verifies a bearer token and returns the user id it identifies. This is
/// the only auth seam the socket upgrade route depends on.
pub trait AuthIdentity: Send + Sync {
    fn authenticate(&self, bearer: &str) -> Result<UserId, AuthError>;
}

/// Refresh-token rotation and OAuth2 code exchange, declared for a future
/// HTTP surface this crate does not expose yet. No production
/// implementation ships here; tests back it with an in-memory fake.
pub trait TokenIssuer: Send + Sync {
    fn issue_access_token(&self, user_id: &str) -> Result<String, AuthError>;
    fn rotate_refresh_token(&self, refresh_token: &str) -> Result<(String, String), AuthError>;
}

pub struct HmacJwtIdentity {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_expire_secs: i64,
}

impl HmacJwtIdentity {
    pub fn new(secret: &str, access_expire_secs: i64) -> Self {
        HmacJwtIdentity {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_expire_secs,
        }
    }

    /// Mints an access token directly. Exposed as an inherent method (not
    /// part of [`TokenIssuer`]) so tests and local tooling can produce
    /// tokens for [`HmacJwtIdentity::authenticate`] without a shipped
    /// issuance endpoint.
    pub fn issue_access_token(&self, user_id: &str) -> Result<String, AuthError> {
        let claims = Claims { sub: user_id.to_string(), exp: now() + self.access_expire_secs };
        Ok(jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)?)
    }
}

impl AuthIdentity for HmacJwtIdentity {
    fn authenticate(&self, bearer: &str) -> Result<UserId, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(bearer, &self.decoding_key, &Validation::default())?;
        Ok(data.claims.sub)
    }
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeTokenIssuer;

    impl TokenIssuer for FakeTokenIssuer {
        fn issue_access_token(&self, user_id: &str) -> Result<String, AuthError> {
            Ok(format!("access-{user_id}"))
        }

        fn rotate_refresh_token(&self, refresh_token: &str) -> Result<(String, String), AuthError> {
            Ok((format!("{refresh_token}-rotated"), "new-refresh".to_string()))
        }
    }

    #[test]
    fn issued_token_authenticates_back_to_same_user() {
        let identity = HmacJwtIdentity::new("test-secret", 3600);
        let token = identity.issue_access_token("alice").unwrap();
        assert_eq!(identity.authenticate(&token).unwrap(), "alice");
    }

    #[test]
    fn token_signed_with_different_secret_is_rejected() {
        let issuer = HmacJwtIdentity::new("secret-a", 3600);
        let verifier = HmacJwtIdentity::new("secret-b", 3600);
        let token = issuer.issue_access_token("alice").unwrap();
        assert!(verifier.authenticate(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let identity = HmacJwtIdentity::new("test-secret", -1);
        let token = identity.issue_access_token("alice").unwrap();
        assert!(identity.authenticate(&token).is_err());
    }

    #[test]
    fn fake_issuer_rotates_refresh_tokens() {
        let issuer = FakeTokenIssuer;
        let (access, refresh) = issuer.rotate_refresh_token("old-refresh").unwrap();
        assert_eq!(access, "old-refresh-rotated");
        assert_eq!(refresh, "new-refresh");
    }
}

/// The authenticated caller of a request, extracted from the
/// `Authorization: Bearer <token>` header.
pub struct AuthenticatedUser(pub String);

impl FromRequest for AuthenticatedUser {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut dev::Payload) -> Self::Future {
        let result = (|| {
            let identity = req
                .app_data::<web::Data<Arc<dyn AuthIdentity>>>()
                .expect("AuthIdentity must be registered as app data");

            let header = req.headers().get(actix_web::http::header::AUTHORIZATION);
            let token = header
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .or_else(|| req.query_string().strip_prefix("token="))
                .ok_or(AuthError::MissingToken)?;

            let user_id = identity.authenticate(token)?;
            Ok(AuthenticatedUser(user_id))
        })();
        ready(result)
    }
}
