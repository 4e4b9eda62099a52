//! Session Token Service
//!
//! Issues and validates the signed session tokens that carry the caller's
//! identity into protected procedures.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::models::{Session, SessionClaims, SessionToken, User};
use crate::utils::error::AppError;

/// Session lifetime when none is configured
pub const DEFAULT_SESSION_DAYS: i64 = 30;

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::TokenGeneration(msg) => AppError::Internal(msg),
            JwtError::InvalidToken(_) => {
                AppError::Authentication("Invalid or expired session".to_string())
            }
        }
    }
}

/// Signs and verifies HS256 session tokens
#[derive(Clone)]
pub struct JwtService {
    secret: String,
    /// Session token lifetime (default: 30 days)
    session_expires_in: Duration,
}

impl JwtService {
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            session_expires_in: Duration::days(DEFAULT_SESSION_DAYS),
        }
    }

    /// Create a service with a custom session lifetime
    pub fn with_expiration(secret: String, session_expires_in: Duration) -> Self {
        Self {
            secret,
            session_expires_in,
        }
    }

    /// Issue a session token for `user`
    pub fn issue_session(&self, user: &User) -> Result<SessionToken, JwtError> {
        let now = Utc::now();
        let claims = SessionClaims::new(user, now + self.session_expires_in, now);

        let header = Header::new(Algorithm::HS256);
        let encoding_key = EncodingKey::from_secret(self.secret.as_ref());
        let token = encode(&header, &claims, &encoding_key)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))?;

        Ok(SessionToken::new(
            token,
            self.session_expires_in.num_seconds(),
        ))
    }

    /// Validate a session token and extract the session
    pub fn validate_session(&self, token: &str) -> Result<Session, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;

        let decoding_key = DecodingKey::from_secret(self.secret.as_ref());
        let claims = decode::<SessionClaims>(token, &decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

        Session::from_claims(&claims)
            .map_err(|_| JwtError::InvalidToken("Invalid user ID in token".into()))
    }
}
