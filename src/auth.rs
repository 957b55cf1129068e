//! Bearer token issuance and verification, and password checks.
//!
//! Tokens are HS256 JWTs carrying `{id, username, exp}` and are valid for
//! 24 hours. Stored passwords are bcrypt hashes (`$2a$`, `$2b$`, `$2y$`), as
//! provisioned by the existing user store, or Argon2 PHC strings.

use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ---

/// Token lifetime in seconds.
pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub username: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

/// Signing and verification keys derived from the shared secret.
#[derive(Clone)]
pub struct JwtKeys {
    inner: Arc<Keys>,
}

impl JwtKeys {
    // ---
    pub fn new(secret: &str) -> Self {
        Self {
            inner: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
                validation: Validation::new(Algorithm::HS256),
            }),
        }
    }

    /// Issue a token for `username` expiring [`TOKEN_TTL_SECS`] from now.
    pub fn issue(&self, id: i64, username: &str) -> Result<String, ApiError> {
        let claims = Claims {
            id,
            username: username.to_string(),
            exp: (Utc::now() + Duration::seconds(TOKEN_TTL_SECS)).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, ApiError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.inner.encoding)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {}", e)))
    }

    /// Decode and validate a token. Expiry maps to
    /// [`ApiError::ExpiredToken`], anything else to [`ApiError::InvalidToken`].
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let data = decode::<Claims>(token, &self.inner.decoding, &self.inner.validation)?;
        Ok(data.claims)
    }
}

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Check `password` against a stored bcrypt hash or Argon2 PHC string. A
/// malformed stored hash never verifies.
pub fn verify_password(stored_hash: &str, password: &str) -> bool {
    // ---
    if BCRYPT_PREFIXES
        .iter()
        .any(|prefix| stored_hash.starts_with(prefix))
    {
        return match bcrypt::verify(password, stored_hash) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!("Stored bcrypt hash is malformed: {}", e);
                false
            }
        };
    }

    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is not a valid PHC string: {}", e);
            false
        }
    }
}

/// The caller of a protected endpoint, taken from `Authorization: Bearer`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser(pub Claims);

impl<S> FromRequestParts<S> for AuthUser
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // ---
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::MissingToken)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token)?;
        Ok(AuthUser(claims))
    }
}

/// Argon2 PHC string for `password` with a fixed salt.
#[cfg(test)]
pub(crate) fn hash_for_tests(password: &str) -> String {
    use argon2::password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::encode_b64(b"noc-monitor-salt").unwrap();
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use axum::http::Request;

    async fn extract(keys: &JwtKeys, authorization: Option<&str>) -> Result<AuthUser, ApiError> {
        let mut builder = Request::builder().uri("/api/access-logs");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, keys).await
    }

    #[test]
    fn test_issued_token_round_trips_claims() {
        // ---
        let keys = JwtKeys::new("s3cret");
        let token = keys.issue(7, "operator").unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.id, 7);
        assert_eq!(claims.username, "operator");
        let ttl = claims.exp - Utc::now().timestamp();
        assert!((TOKEN_TTL_SECS - 5..=TOKEN_TTL_SECS).contains(&ttl));
    }

    #[test]
    fn test_expired_and_foreign_tokens_are_distinguished() {
        // ---
        let keys = JwtKeys::new("s3cret");
        let expired = keys
            .sign(&Claims {
                id: 1,
                username: "old".to_string(),
                exp: (Utc::now() - Duration::hours(2)).timestamp(),
            })
            .unwrap();
        assert!(matches!(keys.verify(&expired), Err(ApiError::ExpiredToken)));

        let foreign = JwtKeys::new("other").issue(1, "x").unwrap();
        assert!(matches!(keys.verify(&foreign), Err(ApiError::InvalidToken)));
        assert!(matches!(keys.verify("garbage"), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn test_password_verification() {
        // ---
        let stored = hash_for_tests("hunter2");
        assert!(verify_password(&stored, "hunter2"));
        assert!(!verify_password(&stored, "hunter3"));
        assert!(!verify_password("plaintext", "plaintext"));
    }

    #[test]
    fn test_bcrypt_hashes_from_user_store_verify() {
        // ---
        // OpenBSD reference vector
        let stored = "$2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW";
        assert!(verify_password(stored, "U*U"));
        assert!(!verify_password(stored, "U*V"));

        let fresh = bcrypt::hash("s3cret", 4).unwrap();
        assert!(fresh.starts_with("$2b$04$"));
        assert!(verify_password(&fresh, "s3cret"));
        assert!(!verify_password("$2b$04$truncated", "s3cret"));
    }

    #[tokio::test]
    async fn test_extractor_reads_bearer_header() {
        // ---
        let keys = JwtKeys::new("s3cret");
        let token = keys.issue(3, "noc").unwrap();

        let user = extract(&keys, Some(&format!("Bearer {}", token))).await.unwrap();
        assert_eq!(user.0.username, "noc");

        assert!(matches!(extract(&keys, None).await, Err(ApiError::MissingToken)));
        assert!(matches!(extract(&keys, Some("Bearer ")).await, Err(ApiError::MissingToken)));
        assert!(matches!(extract(&keys, Some(&token)).await, Err(ApiError::MissingToken)));
        assert!(matches!(
            extract(&keys, Some("Bearer not.a.jwt")).await,
            Err(ApiError::InvalidToken)
        ));
    }
}
