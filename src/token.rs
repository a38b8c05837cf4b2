use crate::errors::AuthError;
use josekit::jws::{JwsHeader, HS256};
use josekit::jwt::{self, JwtPayload, JwtPayloadValidator};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Identity claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub email: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
}

/// Issues and validates HS256 session tokens. Stateless: nothing is
/// recorded server-side, so a token stands on its signature and expiry
/// alone and cannot be revoked before it runs out.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            secret: secret.to_vec(),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }

    /// Sign a token embedding the claims, issued now and expiring after
    /// the configured lifetime.
    pub fn issue(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        let now = SystemTime::now();

        let mut payload = JwtPayload::new();
        payload.set_claim(
            "email",
            Some(serde_json::Value::String(claims.email.clone())),
        )?;
        payload.set_claim(
            "fullName",
            Some(serde_json::Value::String(claims.full_name.clone())),
        )?;
        payload.set_issued_at(&now);
        payload.set_expires_at(&(now + self.ttl));

        let signer = HS256.signer_from_bytes(&self.secret)?;
        let mut header = JwsHeader::new();
        header.set_token_type("JWT");
        let token = jwt::encode_with_signer(&payload, &header, &signer)?;
        Ok(token)
    }

    /// Verify signature and expiry, returning the embedded claims. Any
    /// failure comes back as `Unauthorized`.
    pub fn validate(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let verifier = HS256.verifier_from_bytes(&self.secret)?;

        let (payload, _header) = jwt::decode_with_verifier(token, &verifier)
            .map_err(|_| unauthorized_token_error())?;

        let mut validator = JwtPayloadValidator::new();
        validator.set_base_time(SystemTime::now());
        validator
            .validate(&payload)
            .map_err(|_| unauthorized_token_error())?;

        let email = payload
            .claim("email")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let full_name = payload
            .claim("fullName")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        match (email, full_name) {
            (Some(email), Some(full_name)) => Ok(SessionClaims { email, full_name }),
            _ => Err(unauthorized_token_error()),
        }
    }
}

fn unauthorized_token_error() -> AuthError {
    AuthError::Unauthorized("Access Denied: Invalid or expired token.".to_string())
}
