//! HTTP Request Handlers
//!
//! Shared application state and response envelope, the health check and
//! the `user.*` procedures.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use chrono::Utc;

use super::middleware::AuthUser;
use crate::{
    database::DynStore,
    models::{
        HealthCheckResponse, UpdateProfileRequest, UpdateProfileResponse, User, UserProfile,
        VerifyEmailRequest,
    },
    service::{
        BookCatalog, CollectionService, IdentityService, JwtService, OAuthService, UserService,
    },
    utils::error::{AppError, AppResult},
    VERSION,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub jwt_service: Arc<JwtService>,
    pub collection_service: Arc<CollectionService>,
    pub user_service: Arc<UserService>,
    pub identity_service: Arc<IdentityService>,
    /// Absent when Google sign-in is not configured
    pub oauth_service: Option<Arc<OAuthService>>,
    pub book_catalog: Arc<dyn BookCatalog>,
    /// Public base URL of the web client; absolute sign-in redirects must
    /// share its origin
    pub app_base_url: String,
}

/// Standard success response wrapper
#[derive(serde::Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Malformed query strings and bodies are reported in the standard error shape
pub(crate) fn invalid_input(err: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("Invalid input: {}", err))
}

/// Health check endpoint
pub async fn health_check(
    State(state): State<AppState>,
) -> AppResult<Json<SuccessResponse<HealthCheckResponse>>> {
    state.store.ping().await?;

    Ok(Json(SuccessResponse::new(HealthCheckResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: VERSION.to_string(),
    })))
}

/// `user.getUser`
pub async fn get_user(
    State(state): State<AppState>,
    Extension(AuthUser(session)): Extension<AuthUser>,
) -> AppResult<Json<SuccessResponse<UserProfile>>> {
    let profile = state.user_service.get_user(&session).await?;
    Ok(Json(SuccessResponse::new(profile)))
}

/// `user.updateProfile`
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(AuthUser(session)): Extension<AuthUser>,
    request: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> AppResult<Json<SuccessResponse<UpdateProfileResponse>>> {
    let Json(request) = request.map_err(invalid_input)?;
    let response = state.user_service.update_profile(&session, request).await?;
    Ok(Json(SuccessResponse::new(response)))
}

/// `user.verifyEmail`
pub async fn verify_email(
    State(state): State<AppState>,
    Extension(AuthUser(session)): Extension<AuthUser>,
    request: Result<Json<VerifyEmailRequest>, JsonRejection>,
) -> AppResult<Json<SuccessResponse<User>>> {
    let Json(request) = request.map_err(invalid_input)?;
    let user = state.user_service.verify_email(&session, request).await?;
    Ok(Json(SuccessResponse::new(user)))
}

/// `user.delete`
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(AuthUser(session)): Extension<AuthUser>,
) -> AppResult<Json<SuccessResponse<()>>> {
    state.user_service.delete(&session).await?;
    Ok(Json(SuccessResponse::new(())))
}
