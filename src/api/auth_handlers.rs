//! Sign-in Handlers
//!
//! Google OAuth initiation and callback, and the magic-link request and
//! redemption. Each successful sign-in answers with a session token.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header::ACCEPT, HeaderMap},
    response::{IntoResponse, Json, Redirect, Response},
};
use log::{info, warn};
use serde::Serialize;
use url::Url;

use super::handlers::{invalid_input, AppState, SuccessResponse};
use crate::{
    models::{
        GoogleOAuthCallbackQuery, GoogleOAuthInitQuery, GoogleOAuthInitResponse,
        MagicLinkCallbackRequest, MagicLinkRequest, MagicLinkResponse, SignInResponse,
    },
    service::OAuthService,
    utils::error::{AppError, AppResult},
};

/// Google sign-in result with the redirect stored at initiation
#[derive(Debug, Serialize)]
pub struct GoogleSignInResponse {
    #[serde(flatten)]
    pub sign_in: SignInResponse,
    pub redirect_url: Option<String>,
}

fn oauth_service(state: &AppState) -> AppResult<&OAuthService> {
    state
        .oauth_service
        .as_deref()
        .ok_or_else(|| AppError::Internal("OAuth service not configured".to_string()))
}

/// Where a browser may be sent after sign-in: a path on this site, or an
/// absolute http(s) URL on the web client's own origin
fn check_redirect_url(redirect_url: &str, app_base_url: &str) -> AppResult<()> {
    if redirect_url.is_empty() {
        return Err(AppError::Validation(
            "Redirect URL cannot be empty".to_string(),
        ));
    }

    // Browsers read `/\host` as `//host`
    if redirect_url.chars().any(|c| c == '\\' || c.is_control()) {
        return Err(AppError::Validation(
            "Redirect URL contains invalid characters".to_string(),
        ));
    }

    if redirect_url.starts_with('/') {
        if redirect_url.starts_with("//") {
            return Err(AppError::Validation(
                "Redirect URL must be a path on this site".to_string(),
            ));
        }
        return Ok(());
    }

    let same_origin = match (Url::parse(redirect_url), Url::parse(app_base_url)) {
        (Ok(target), Ok(base)) => {
            matches!(target.scheme(), "http" | "https") && target.origin() == base.origin()
        }
        _ => false,
    };

    if !same_origin {
        return Err(AppError::Validation(
            "Redirect URL must be a path or a URL on this site".to_string(),
        ));
    }

    Ok(())
}

/// Handler for initiating Google OAuth flow
///
/// **Endpoint:** `GET /auth/signin/google?redirect_url=/collections`
///
/// The client sends the user to the returned authorization URL.
pub async fn initiate_google_oauth(
    State(state): State<AppState>,
    query: Result<Query<GoogleOAuthInitQuery>, QueryRejection>,
) -> AppResult<Json<SuccessResponse<GoogleOAuthInitResponse>>> {
    let Query(query) = query.map_err(invalid_input)?;
    if let Some(redirect_url) = &query.redirect_url {
        check_redirect_url(redirect_url, &state.app_base_url)?;
    }

    let response = oauth_service(&state)?
        .initiate_google_oauth(query.redirect_url)
        .await?;

    Ok(Json(SuccessResponse::new(response)))
}

/// Handler for Google OAuth callback
///
/// **Endpoint:** `GET /auth/callback/google?code=...&state=...`
///
/// Clients sending `Accept: application/json` get the sign-in as JSON.
/// Browsers are redirected to the stored redirect URL (or `/`) with the
/// session token in the URL fragment.
pub async fn handle_google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<GoogleOAuthCallbackQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query.map_err(invalid_input)?;

    let outcome = oauth_service(&state)?.handle_google_callback(query).await?;
    let sign_in = state
        .identity_service
        .sign_in_with_profile(outcome.profile)
        .await?;
    info!("User {} signed in with Google", sign_in.user.id);

    // Stored before the current rules applied, or tampered with
    let redirect_url = outcome.redirect_url.filter(|url| {
        let allowed = check_redirect_url(url, &state.app_base_url).is_ok();
        if !allowed {
            warn!("Dropping disallowed sign-in redirect {}", url);
        }
        allowed
    });

    let wants_json = headers
        .get(ACCEPT)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"));

    if wants_json {
        let body = GoogleSignInResponse {
            sign_in,
            redirect_url,
        };
        return Ok(Json(SuccessResponse::new(body)).into_response());
    }

    let target = redirect_url.unwrap_or_else(|| "/".to_string());
    let location = format!(
        "{}#session={}&needs_profile={}&new_user={}",
        target, sign_in.session.token, sign_in.needs_profile, sign_in.is_new_user
    );
    Ok(Redirect::to(&location).into_response())
}

/// Handler for requesting a magic sign-in link
///
/// **Endpoint:** `POST /auth/signin/email`
pub async fn request_magic_link(
    State(state): State<AppState>,
    request: Result<Json<MagicLinkRequest>, JsonRejection>,
) -> AppResult<Json<SuccessResponse<MagicLinkResponse>>> {
    let Json(request) = request.map_err(invalid_input)?;
    let response = state.identity_service.request_magic_link(request).await?;
    Ok(Json(SuccessResponse::new(response)))
}

/// Handler for redeeming a magic sign-in link
///
/// **Endpoint:** `POST /auth/callback/email`
pub async fn consume_magic_link(
    State(state): State<AppState>,
    request: Result<Json<MagicLinkCallbackRequest>, JsonRejection>,
) -> AppResult<Json<SuccessResponse<SignInResponse>>> {
    let Json(request) = request.map_err(invalid_input)?;
    let response = state.identity_service.consume_magic_link(request).await?;
    Ok(Json(SuccessResponse::new(response)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://bookbar.example.com";

    fn allowed(redirect_url: &str) -> bool {
        check_redirect_url(redirect_url, BASE).is_ok()
    }

    #[test]
    fn test_redirect_url_accepts_own_site() {
        assert!(allowed("/collections"));
        assert!(allowed("/u/jane-doe?page=2"));
        assert!(allowed("https://bookbar.example.com/me"));
        assert!(allowed("https://bookbar.example.com"));
    }

    #[test]
    fn test_redirect_url_rejects_other_hosts() {
        assert!(!allowed("https://attacker.example/steal"));
        assert!(!allowed("http://bookbar.example.com/me"));
        assert!(!allowed("https://bookbar.example.com.attacker.example/"));
        assert!(!allowed("https://bookbar.example.com:8443/"));
        assert!(!allowed("//attacker.example"));
        assert!(!allowed("/\\attacker.example"));
        assert!(!allowed("/\t/attacker.example"));
    }

    #[test]
    fn test_redirect_url_rejects_other_schemes() {
        assert!(!allowed(""));
        assert!(!allowed("javascript:alert(1)"));
        assert!(!allowed("collections"));
        assert!(!allowed("ftp://bookbar.example.com/"));
    }
}
