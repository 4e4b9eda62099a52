//! OAuth Models
//!
//! Data structures for the Google OAuth sign-in flow and the provider-neutral
//! profile the identity adapter maps onto a local user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider name stored on linked accounts
pub const GOOGLE_PROVIDER: &str = "google";

/// External profile as handed to the identity adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthProfile {
    /// Provider name, e.g. "google"
    pub provider: String,
    /// Subject id at the provider
    pub subject: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}

/// OAuth state token for CSRF protection during OAuth flows
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OAuthState {
    /// Secure random state token
    pub state_token: String,

    /// Token expiration timestamp
    pub expires_at: DateTime<Utc>,

    /// Optional redirect URL after successful authentication
    pub redirect_url: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Google OAuth user information from the userinfo endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleUserInfo {
    /// Google user ID (the OpenID subject)
    pub id: String,

    pub email: Option<String>,

    /// Whether the email is verified by Google
    #[serde(default)]
    pub verified_email: bool,

    pub name: Option<String>,

    /// URL to user's profile picture
    pub picture: Option<String>,
}

impl From<GoogleUserInfo> for OAuthProfile {
    fn from(info: GoogleUserInfo) -> Self {
        Self {
            provider: GOOGLE_PROVIDER.to_string(),
            subject: info.id,
            name: info.name,
            email: if info.verified_email { info.email } else { None },
            picture: info.picture,
        }
    }
}

/// Query for starting the Google OAuth flow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleOAuthInitQuery {
    /// Optional redirect URL after successful authentication
    pub redirect_url: Option<String>,
}

/// Response from initiating Google OAuth flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleOAuthInitResponse {
    /// Google OAuth authorization URL where user should be redirected
    pub authorization_url: String,

    /// State token for CSRF protection (validated on callback)
    pub state: String,
}

/// Google OAuth callback query parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleOAuthCallbackQuery {
    /// Authorization code from Google (exchanged for access token)
    pub code: Option<String>,

    /// State token for CSRF protection (must match our stored state)
    pub state: Option<String>,

    /// Error code if authorization was denied or failed
    pub error: Option<String>,

    /// Human-readable error description
    pub error_description: Option<String>,
}
