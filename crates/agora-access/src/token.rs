//! Signed bearer tokens: issuance and verification.

use agora_types::api::Claims;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::config::AccessConfig;
use crate::error::AccessError;

/// Issues and verifies HMAC-signed tokens with a process-wide secret.
///
/// Verification is a pure function of the token, the secret and the clock:
/// it proves the holder was issued the token and that it has not expired,
/// nothing more. Whether the subject still exists or is allowed anything is
/// decided later by [`AccessGate`](crate::AccessGate).
#[derive(Clone)]
pub struct TokenVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl TokenVerifier {
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            algorithm: config.algorithm,
            ttl: Duration::minutes(config.token_ttl_minutes),
        }
    }

    pub fn issue(&self, user_id: i64, handle: &str) -> Result<String, AccessError> {
        self.issue_at(user_id, handle, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: i64,
        handle: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AccessError> {
        let claims = Claims {
            sub: handle.to_string(),
            user_id,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };

        jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| AccessError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AccessError> {
        self.verify_at(token, Utc::now())
    }

    /// Fails when the signature or structure is invalid, or when `now >= exp`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AccessError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);
        // Expiry is checked below against the caller's clock, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AccessError::InvalidToken(e.to_string()))?;

        if now.timestamp() >= claims.exp {
            return Err(AccessError::InvalidToken("token has expired".into()));
        }
        if claims.sub.is_empty() {
            return Err(AccessError::InvalidToken("empty subject".into()));
        }

        Ok(claims)
    }
}
