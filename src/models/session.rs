//! Session Models
//!
//! Session token claims and the session context threaded into every
//! protected service call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::User;

/// JWT claims carried by a session token
///
/// Contains standard JWT claims plus the user fields the client displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject - user ID
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// JWT ID - unique token identifier
    pub jti: String,

    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

impl SessionClaims {
    /// Create claims for `user`
    pub fn new(user: &User, expires_at: DateTime<Utc>, issued_at: DateTime<Utc>) -> Self {
        Self {
            sub: user.id.to_string(),
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            image: user.image.clone(),
        }
    }
}

/// The authenticated caller
///
/// Name, email and image reflect the user at sign-in time. Services that
/// compare against current values read the stored user instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a session from validated token claims
    pub fn from_claims(claims: &SessionClaims) -> Result<Self, uuid::Error> {
        Ok(Self {
            user_id: Uuid::parse_str(&claims.sub)?,
            name: claims.name.clone(),
            email: claims.email.clone(),
            image: claims.image.clone(),
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
        })
    }

    /// Session for `user` without a token, used by trusted in-process callers
    pub fn for_user(user: &User, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            image: user.image.clone(),
            expires_at,
        }
    }
}

/// Issued session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Seconds until expiry
    pub expires_in: i64,
}

impl SessionToken {
    pub fn new(token: String, expires_in: i64) -> Self {
        Self {
            token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

/// Outcome of any successful sign-in
#[derive(Debug, Clone, Serialize)]
pub struct SignInResponse {
    pub session: SessionToken,
    pub user: User,
    /// First sign-in without a name: the client shows the "complete profile" step
    pub needs_profile: bool,
    pub is_new_user: bool,
}
