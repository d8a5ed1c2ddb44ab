//! services/api/src/adapters/token.rs
//!
//! The stateless bearer-token adapter, implementing the `TokenService` port
//! with HS256-signed JWTs. The signing secret and token lifetime come from
//! configuration.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use readcircle_core::domain::AuthClaims;
use readcircle_core::ports::{PortError, PortResult, TokenService};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The claims embedded in every issued token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    username: String,
    exp: i64,
}

/// A token adapter backed by `jsonwebtoken`.
pub struct JwtTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_hours: i64,
}

impl JwtTokens {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_hours,
        }
    }
}

impl TokenService for JwtTokens {
    fn issue(&self, user_id: Uuid, username: &str) -> PortResult<String> {
        let exp = (Utc::now() + Duration::hours(self.ttl_hours)).timestamp();
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            exp,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| PortError::Unexpected(format!("failed to sign token: {e}")))
    }

    fn verify(&self, token: &str) -> PortResult<AuthClaims> {
        // Bad signature, expired, malformed: the caller only needs to know the
        // token was rejected.
        let data =
            jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
                .map_err(|_| PortError::Unauthorized("Invalid or expired token".to_string()))?;
        Ok(AuthClaims {
            user_id: data.claims.sub,
            username: data.claims.username,
        })
    }
}
