//! OAuth Service
//!
//! Google OAuth 2.0 sign-in. This module covers the provider side of the flow:
//! authorization URL generation, single-use state tokens, code exchange and
//! the userinfo lookup. The resulting [`OAuthProfile`] is handed to the
//! identity service, which maps it onto a local user.

use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl,
    Scope, TokenResponse, TokenUrl,
};
use reqwest::Client as HttpClient;
use thiserror::Error;

use crate::{
    config::GoogleOAuthConfig,
    database::{DynStore, StoreError},
    models::oauth::*,
    utils::error::AppError,
};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v4/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// OAuth service specific errors
#[derive(Error, Debug)]
pub enum OAuthServiceError {
    /// OAuth configuration error
    #[error("OAuth configuration error: {0}")]
    ConfigurationError(String),

    /// Missing or malformed state parameter
    #[error("Invalid OAuth state: {0}")]
    InvalidState(String),

    /// OAuth state has expired
    #[error("OAuth state has expired")]
    StateExpired,

    /// OAuth state not found, or already used
    #[error("OAuth state not found")]
    StateNotFound,

    /// OAuth authorization code error
    #[error("Invalid authorization code: {0}")]
    InvalidAuthorizationCode(String),

    /// OAuth token exchange error
    #[error("Token exchange failed: {0}")]
    TokenExchangeError(String),

    /// The provider reported an error on the callback
    #[error("OAuth provider error: {0}")]
    ProviderError(String),

    /// User info fetch error
    #[error("Failed to fetch user info: {0}")]
    UserInfoError(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// HTTP client construction error
    #[error("HTTP request error: {0}")]
    HttpError(String),
}

impl From<OAuthServiceError> for AppError {
    fn from(err: OAuthServiceError) -> Self {
        match err {
            OAuthServiceError::ConfigurationError(msg) => AppError::Configuration(msg),
            OAuthServiceError::InvalidState(msg) => {
                AppError::BadRequest(format!("Invalid OAuth state: {}", msg))
            }
            OAuthServiceError::StateExpired => {
                AppError::BadRequest("OAuth state has expired".to_string())
            }
            OAuthServiceError::StateNotFound => {
                AppError::BadRequest("OAuth state not found".to_string())
            }
            OAuthServiceError::InvalidAuthorizationCode(msg) => {
                AppError::BadRequest(format!("Invalid authorization code: {}", msg))
            }
            OAuthServiceError::TokenExchangeError(msg) => {
                AppError::ExternalService(format!("Token exchange failed: {}", msg))
            }
            OAuthServiceError::ProviderError(msg) => {
                AppError::ExternalService(format!("OAuth provider error: {}", msg))
            }
            OAuthServiceError::UserInfoError(msg) => {
                AppError::ExternalService(format!("Failed to fetch user info: {}", msg))
            }
            OAuthServiceError::Store(e) => e.into(),
            OAuthServiceError::HttpError(msg) => {
                AppError::ExternalService(format!("HTTP request error: {}", msg))
            }
        }
    }
}

/// Result type for OAuth service operations
pub type OAuthServiceResult<T> = Result<T, OAuthServiceError>;

/// Profile obtained from a completed callback
#[derive(Debug, Clone)]
pub struct GoogleCallbackOutcome {
    pub profile: OAuthProfile,
    /// Redirect URL stored when the flow was initiated
    pub redirect_url: Option<String>,
}

/// Google OAuth 2.0 client
pub struct OAuthService {
    store: DynStore,
    google_config: GoogleOAuthConfig,
    google_client: BasicClient,
    http_client: HttpClient,
}

impl OAuthService {
    /// Creates the service from Google client credentials
    ///
    /// # Errors
    /// * `ConfigurationError` - Invalid OAuth URLs or redirect URI
    /// * `HttpError` - Failed to create HTTP client
    pub fn new(store: DynStore, google_config: GoogleOAuthConfig) -> OAuthServiceResult<Self> {
        let google_client = BasicClient::new(
            ClientId::new(google_config.client_id.clone()),
            Some(ClientSecret::new(google_config.client_secret.clone())),
            AuthUrl::new(GOOGLE_AUTH_URL.to_string()).map_err(|e| {
                OAuthServiceError::ConfigurationError(format!("Invalid Google auth URL: {}", e))
            })?,
            Some(TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).map_err(|e| {
                OAuthServiceError::ConfigurationError(format!("Invalid Google token URL: {}", e))
            })?),
        )
        .set_redirect_uri(
            RedirectUrl::new(google_config.redirect_uri.clone()).map_err(|e| {
                OAuthServiceError::ConfigurationError(format!("Invalid redirect URI: {}", e))
            })?,
        );

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                OAuthServiceError::HttpError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            store,
            google_config,
            google_client,
            http_client,
        })
    }

    /// Initiates the Google OAuth 2.0 authorization flow
    ///
    /// Generates the authorization URL and stores its state token with an
    /// expiry. Scopes requested: `openid`, `email`, `profile`.
    ///
    /// # Arguments
    /// * `redirect_url` - Optional URL to send the user to after sign-in
    pub async fn initiate_google_oauth(
        &self,
        redirect_url: Option<String>,
    ) -> OAuthServiceResult<GoogleOAuthInitResponse> {
        let (auth_url, csrf_token) = self
            .google_client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .url();

        let now = Utc::now();
        let state = OAuthState {
            state_token: csrf_token.secret().clone(),
            expires_at: now + chrono::Duration::minutes(self.google_config.state_expires_minutes),
            redirect_url,
            created_at: now,
        };

        self.store.insert_oauth_state(&state).await?;

        Ok(GoogleOAuthInitResponse {
            authorization_url: auth_url.to_string(),
            state: state.state_token,
        })
    }

    /// Handles the Google OAuth callback
    ///
    /// Validates and consumes the state, exchanges the authorization code and
    /// fetches the user's Google profile.
    ///
    /// # Errors
    /// * `InvalidAuthorizationCode` - Missing authorization code
    /// * `InvalidState` / `StateNotFound` / `StateExpired` - State token problems
    /// * `ProviderError` - Google returned an OAuth error
    /// * `TokenExchangeError` - Failed to exchange code for access token
    /// * `UserInfoError` - Failed to fetch user information from Google
    pub async fn handle_google_callback(
        &self,
        query: GoogleOAuthCallbackQuery,
    ) -> OAuthServiceResult<GoogleCallbackOutcome> {
        if let Some(error) = query.error {
            let description = query.error_description.unwrap_or_else(|| error.clone());
            warn!("Google OAuth callback returned an error: {}", description);
            return Err(OAuthServiceError::ProviderError(format!(
                "OAuth error: {} - {}",
                error, description
            )));
        }

        let auth_code = query.code.ok_or_else(|| {
            OAuthServiceError::InvalidAuthorizationCode("Missing authorization code".to_string())
        })?;

        let state_token = query
            .state
            .ok_or_else(|| OAuthServiceError::InvalidState("Missing state token".to_string()))?;

        let state = self.consume_state(&state_token).await?;

        let token_response = self
            .google_client
            .exchange_code(AuthorizationCode::new(auth_code))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| {
                OAuthServiceError::TokenExchangeError(format!(
                    "Failed to exchange OAuth code: {}",
                    e
                ))
            })?;

        let google_user = self
            .fetch_google_user_info(token_response.access_token().secret())
            .await?;

        info!("Google OAuth callback completed for subject {}", google_user.id);

        Ok(GoogleCallbackOutcome {
            profile: google_user.into(),
            redirect_url: state.redirect_url,
        })
    }

    /// Validates and consumes an OAuth state token
    ///
    /// The state is removed whether or not it has expired, so it can never be
    /// replayed.
    pub async fn consume_state(&self, state_token: &str) -> OAuthServiceResult<OAuthState> {
        let state = self
            .store
            .take_oauth_state(state_token)
            .await?
            .ok_or(OAuthServiceError::StateNotFound)?;

        if state.expires_at < Utc::now() {
            return Err(OAuthServiceError::StateExpired);
        }

        Ok(state)
    }

    async fn fetch_google_user_info(
        &self,
        access_token: &str,
    ) -> OAuthServiceResult<GoogleUserInfo> {
        let response = self
            .http_client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                OAuthServiceError::UserInfoError(format!("Failed to fetch user info: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(OAuthServiceError::ProviderError(format!(
                "Google API returned error: {}",
                response.status()
            )));
        }

        response.json::<GoogleUserInfo>().await.map_err(|e| {
            OAuthServiceError::UserInfoError(format!("Failed to parse user info: {}", e))
        })
    }
}
