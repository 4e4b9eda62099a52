//! User Service Implementation
//!
//! Profile reads and updates, the email-change verification flow, avatar
//! uploads and account deletion.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{error, info};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::database::{DynStore, Store, StoreError, StoreResult};
use crate::models::{
    ImageUpload, Session, UpdateProfileRequest, UpdateProfileResponse, User, UserProfile,
    VerificationPurpose, VerificationToken, VerifyEmailRequest,
};
use crate::service::email_service::EmailService;
use crate::service::image_cdn::{profile_image_key, CdnError, ImageCdn};
use crate::utils::{
    error::{validation_message, AppError},
    slug::{slugify, with_suffix},
    validation::{is_accepted_image_type, messages, normalize_email, MAX_IMAGE_BYTES},
};

/// Custom error types for the user service
#[derive(Error, Debug)]
pub enum UserServiceError {
    /// User with the specified identifier was not found
    #[error("User not found")]
    UserNotFound,

    /// Input validation failed with detailed error message
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Profile update without any field
    #[error("Nothing to update")]
    NoChanges,

    #[error("New email is the same as the current email")]
    EmailUnchanged,

    /// Attempted to claim an email that another user holds
    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Verification token unknown, expired or for another purpose
    #[error("Invalid or expired verification token")]
    InvalidVerificationToken,

    #[error("Image upload failed: {0}")]
    ImageUpload(#[from] CdnError),

    /// Email service error
    #[error("Email service error: {0}")]
    EmailServiceError(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::UserNotFound => AppError::NotFound("User not found".to_string()),
            UserServiceError::ValidationError(msg) => AppError::Validation(msg),
            UserServiceError::NoChanges
            | UserServiceError::EmailUnchanged
            | UserServiceError::InvalidImage(_)
            | UserServiceError::InvalidVerificationToken => AppError::BadRequest(err.to_string()),
            UserServiceError::EmailAlreadyExists => {
                AppError::Conflict("Email already exists".to_string())
            }
            UserServiceError::ImageUpload(e) => e.into(),
            UserServiceError::EmailServiceError(msg) => AppError::ExternalService(msg),
            UserServiceError::Store(e) => e.into(),
        }
    }
}

/// Result type for user service operations
pub type UserServiceResult<T> = Result<T, UserServiceError>;

/// First free slug for `name`: the plain slug, else `-2`, `-3`, ...
///
/// `except` is the user being renamed, whose own slug does not count as taken.
pub async fn available_slug(
    store: &dyn Store,
    name: &str,
    except: Option<Uuid>,
) -> StoreResult<String> {
    let base = slugify(name);
    if !store.slug_taken(&base, except).await? {
        return Ok(base);
    }

    let mut n = 2;
    loop {
        let candidate = with_suffix(&base, n);
        if !store.slug_taken(&candidate, except).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// User service for profile management
pub struct UserService {
    store: DynStore,
    email_service: Arc<EmailService>,
    cdn: Arc<dyn ImageCdn>,
}

impl UserService {
    pub fn new(store: DynStore, email_service: Arc<EmailService>, cdn: Arc<dyn ImageCdn>) -> Self {
        Self {
            store,
            email_service,
            cdn,
        }
    }

    /// The caller's full profile
    pub async fn get_user(&self, session: &Session) -> UserServiceResult<UserProfile> {
        let user = self.current_user(session).await?;
        let avatar_url = user
            .image
            .clone()
            .unwrap_or_else(|| self.cdn.image_url(&profile_image_key(user.id)));

        Ok(UserProfile { user, avatar_url })
    }

    /// Applies the supplied profile fields in the order image, email, name
    ///
    /// A new email is not stored yet: a verification link is sent to it and
    /// the change takes effect in [`UserService::verify_email`].
    pub async fn update_profile(
        &self,
        session: &Session,
        request: UpdateProfileRequest,
    ) -> UserServiceResult<UpdateProfileResponse> {
        if !request.has_changes() {
            return Err(UserServiceError::NoChanges);
        }

        request
            .validate()
            .map_err(|e| UserServiceError::ValidationError(validation_message(&e)))?;

        let mut user = self.current_user(session).await?;

        // Every field is checked before the first write
        if let Some(image) = &request.image {
            check_image(image)?;
        }
        let new_email = match &request.email {
            Some(email) => Some(self.check_new_email(&user, email).await?),
            None => None,
        };

        if let Some(image) = &request.image {
            user = self.replace_avatar(&user, image).await?;
        }

        let email_verification_sent = match &new_email {
            Some(email) => {
                self.request_email_change(&user, email).await?;
                true
            }
            None => false,
        };

        if let Some(name) = &request.name {
            let name = name.trim();
            let slug = available_slug(&*self.store, name, Some(user.id)).await?;
            user = self
                .store
                .update_user_name(user.id, name, &slug)
                .await?
                .ok_or(UserServiceError::UserNotFound)?;
            info!("User {} renamed; slug is now {}", user.id, slug);
        }

        Ok(UpdateProfileResponse {
            user,
            email_verification_sent,
        })
    }

    /// Redeems an email-change token, moving the caller to the new address
    pub async fn verify_email(
        &self,
        session: &Session,
        request: VerifyEmailRequest,
    ) -> UserServiceResult<User> {
        request
            .validate()
            .map_err(|e| UserServiceError::ValidationError(validation_message(&e)))?;

        let token = self
            .store
            .find_verification_token(&request.token)
            .await?
            .ok_or(UserServiceError::InvalidVerificationToken)?;

        if token.purpose != VerificationPurpose::EmailChange {
            return Err(UserServiceError::InvalidVerificationToken);
        }

        if token.is_expired() {
            self.store.delete_verification_token(&token.token).await?;
            return Err(UserServiceError::InvalidVerificationToken);
        }

        let user = self
            .store
            .apply_verified_email(session.user_id, &token.token, &token.identifier)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => UserServiceError::EmailAlreadyExists,
                other => other.into(),
            })?
            .ok_or(UserServiceError::InvalidVerificationToken)?;

        info!("User {} verified new email address", user.id);
        Ok(user)
    }

    /// Deletes the caller's account and everything it owns
    pub async fn delete(&self, session: &Session) -> UserServiceResult<()> {
        if !self.store.delete_user(session.user_id).await? {
            return Err(UserServiceError::UserNotFound);
        }

        info!("User {} deleted their account", session.user_id);
        Ok(())
    }

    async fn current_user(&self, session: &Session) -> UserServiceResult<User> {
        self.store
            .get_user(session.user_id)
            .await?
            .ok_or(UserServiceError::UserNotFound)
    }

    async fn replace_avatar(&self, user: &User, image: &ImageUpload) -> UserServiceResult<User> {
        let key = profile_image_key(user.id);
        self.cdn.upload(&image.bytes, &key).await.map_err(|e| {
            error!("Avatar upload failed for user {}: {}", user.id, e);
            e
        })?;

        // The CDN copy takes over from any custom image URL
        self.store
            .clear_user_image(user.id)
            .await?
            .ok_or(UserServiceError::UserNotFound)
    }

    /// Normalized new address, unless it is the current one or taken
    async fn check_new_email(&self, user: &User, email: &str) -> UserServiceResult<String> {
        let email = normalize_email(email);

        if user.email.as_deref() == Some(email.as_str()) {
            return Err(UserServiceError::EmailUnchanged);
        }

        if let Some(holder) = self.store.get_user_by_email(&email).await? {
            if holder.id != user.id {
                return Err(UserServiceError::EmailAlreadyExists);
            }
        }

        Ok(email)
    }

    async fn request_email_change(&self, user: &User, email: &str) -> UserServiceResult<()> {
        let token = VerificationToken::issue(email, VerificationPurpose::EmailChange);
        self.store.replace_verification_token(&token).await?;

        self.email_service
            .send_email_change_verification(email, user.name.as_deref(), &token.token)
            .await
            .map_err(|e| UserServiceError::EmailServiceError(e.to_string()))?;

        info!("Email change requested by user {}", user.id);
        Ok(())
    }
}

/// Re-checks an avatar upload: type, declared size and decoded size
fn check_image(image: &ImageUpload) -> UserServiceResult<()> {
    if !is_accepted_image_type(&image.mime_type) {
        return Err(UserServiceError::InvalidImage(
            messages::INVALID_IMAGE_TYPE.to_string(),
        ));
    }

    if image.size > MAX_IMAGE_BYTES {
        return Err(UserServiceError::InvalidImage(
            messages::IMAGE_TOO_LARGE.to_string(),
        ));
    }

    let payload = match image.bytes.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => {
            return Err(UserServiceError::InvalidImage(
                "Image must be a base64 data URI".to_string(),
            ))
        }
    };

    let decoded = STANDARD
        .decode(payload.trim())
        .map_err(|_| UserServiceError::InvalidImage("Image data is not valid base64".to_string()))?;

    if decoded.len() as u64 > MAX_IMAGE_BYTES {
        return Err(UserServiceError::InvalidImage(
            messages::IMAGE_TOO_LARGE.to_string(),
        ));
    }

    Ok(())
}
