//! User Model
//!
//! Core user data structures and type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User record as stored
///
/// `name`, `email` and `slug` are optional: a magic-link sign-in creates a
/// user with only an email, and an OAuth profile may lack one. All datetime
/// fields are UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique identifier for the user
    pub id: Uuid,

    /// Display name, absent until the profile is completed
    pub name: Option<String>,

    /// Email address (unique, normalized)
    pub email: Option<String>,

    /// When the current email address was verified
    pub email_verified: Option<DateTime<Utc>>,

    /// Custom avatar URL; when absent the CDN profile image is used
    pub image: Option<String>,

    /// URL-safe identifier derived from the name (unique)
    pub slug: Option<String>,

    /// Timestamp when the user account was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the user profile was last modified
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Minimal public projection embedded in collection responses
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            image: self.image.clone(),
            slug: self.slug.clone(),
        }
    }

    /// Users without a name must complete their profile before using the app
    pub fn needs_profile(&self) -> bool {
        self.name.as_deref().map_or(true, |n| n.trim().is_empty())
    }
}

/// Public projection of a user: id, name, image and slug
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub image: Option<String>,
    pub slug: Option<String>,
}

/// Data for inserting a new user
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<DateTime<Utc>>,
    pub image: Option<String>,
    pub slug: Option<String>,
}

/// The caller's own profile, with the avatar URL resolved
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,

    /// Custom image if set, otherwise the CDN URL of the uploaded avatar
    pub avatar_url: String,
}

/// Result of a profile update
#[derive(Debug, Clone, Serialize)]
pub struct UpdateProfileResponse {
    pub user: User,

    /// A verification email was sent to the requested new address
    pub email_verification_sent: bool,
}
