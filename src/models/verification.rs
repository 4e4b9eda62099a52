//! Verification Token Model
//!
//! Single-use, time-bounded tokens proving control of an email address. They
//! back both magic-link sign-in and email change confirmation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a freshly issued token stays valid
pub const TOKEN_TTL_HOURS: i64 = 24;

/// What a verification token may be redeemed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_purpose", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationPurpose {
    /// Magic-link sign-in
    SignIn,
    /// Confirmation of a new email address for an existing user
    EmailChange,
}

/// Verification token record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct VerificationToken {
    /// Target email address
    pub identifier: String,

    /// Opaque token (UUID v4)
    pub token: String,

    pub purpose: VerificationPurpose,

    /// Absolute UTC expiry
    pub expires_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    /// Issues a new token for `identifier` valid for [`TOKEN_TTL_HOURS`]
    pub fn issue(identifier: &str, purpose: VerificationPurpose) -> Self {
        let now = Utc::now();
        Self {
            identifier: identifier.to_string(),
            token: Uuid::new_v4().to_string(),
            purpose,
            expires_at: now + Duration::hours(TOKEN_TTL_HOURS),
            created_at: now,
        }
    }

    /// Check if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Check if this token can be redeemed for `purpose`
    pub fn is_usable_for(&self, purpose: VerificationPurpose) -> bool {
        self.purpose == purpose && !self.is_expired()
    }
}
