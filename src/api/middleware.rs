//! Authentication Middleware
//!
//! Resolves the caller's session from the bearer token on protected
//! procedures.

use crate::database::DynStore;
use crate::models::Session;
use crate::service::JwtService;
use crate::utils::error::AppError;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Extension type for storing the authenticated session in request extensions
#[derive(Debug, Clone)]
pub struct AuthUser(pub Session);

/// What the auth middleware needs to accept a session
#[derive(Clone)]
pub struct SessionAuth {
    pub jwt_service: Arc<JwtService>,
    pub store: DynStore,
}

impl SessionAuth {
    pub fn new(jwt_service: Arc<JwtService>, store: DynStore) -> Self {
        Self { jwt_service, store }
    }
}

/// Bearer token from the Authorization header
fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| AppError::Authentication("Missing Authorization header".into()))?;

    auth_header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Authentication("Invalid Authorization header format".into()))
}

/// Authentication middleware that validates the session token
///
/// Answers 401 when the header is missing or malformed, the token is
/// invalid or expired, or its user has since been deleted. Otherwise the
/// session is added to the request extensions as [`AuthUser`].
pub async fn auth_middleware(
    State(auth): State<SessionAuth>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)?;
    let session = auth.jwt_service.validate_session(token)?;

    if auth.store.get_user(session.user_id).await?.is_none() {
        return Err(AppError::Authentication(
            "Session user no longer exists".into(),
        ));
    }

    request.extensions_mut().insert(AuthUser(session));

    Ok(next.run(request).await)
}

/// Helper function to extract the authenticated session from request extensions
pub fn extract_auth_user(request: &Request) -> Result<&Session, AppError> {
    request
        .extensions()
        .get::<AuthUser>()
        .map(|auth_user| &auth_user.0)
        .ok_or_else(|| AppError::Authentication("Session not found in request extensions".into()))
}
