//! Identity Provider Adapter
//!
//! Turns an external proof of identity (a Google profile or a redeemed magic
//! link) into a local user and a signed session.

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use thiserror::Error;
use validator::Validate;

use crate::database::{DynStore, StoreError};
use crate::models::{
    MagicLinkCallbackRequest, MagicLinkRequest, MagicLinkResponse, NewUser, OAuthProfile,
    SignInResponse, User, VerificationPurpose, VerificationToken, TOKEN_TTL_HOURS,
};
use crate::service::email_service::EmailService;
use crate::service::jwt::{JwtError, JwtService};
use crate::service::user::available_slug;
use crate::utils::{
    error::{validation_message, AppError},
    validation::normalize_email,
};

#[derive(Error, Debug)]
pub enum IdentityServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Sign-in link unknown, expired, already used or for another address
    #[error("Invalid or expired sign-in link")]
    InvalidSignInLink,

    #[error("Email service error: {0}")]
    EmailServiceError(String),

    #[error("Session error: {0}")]
    Session(#[from] JwtError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<IdentityServiceError> for AppError {
    fn from(err: IdentityServiceError) -> Self {
        match err {
            IdentityServiceError::ValidationError(msg) => AppError::Validation(msg),
            IdentityServiceError::InvalidSignInLink => AppError::BadRequest(err.to_string()),
            IdentityServiceError::EmailServiceError(msg) => AppError::ExternalService(msg),
            IdentityServiceError::Session(e) => e.into(),
            IdentityServiceError::Store(e) => e.into(),
        }
    }
}

pub type IdentityServiceResult<T> = Result<T, IdentityServiceError>;

/// Maps verified external identities onto local users
pub struct IdentityService {
    store: DynStore,
    jwt_service: Arc<JwtService>,
    email_service: Arc<EmailService>,
}

impl IdentityService {
    pub fn new(
        store: DynStore,
        jwt_service: Arc<JwtService>,
        email_service: Arc<EmailService>,
    ) -> Self {
        Self {
            store,
            jwt_service,
            email_service,
        }
    }

    /// Emails a single-use sign-in link, replacing any earlier one
    pub async fn request_magic_link(
        &self,
        request: MagicLinkRequest,
    ) -> IdentityServiceResult<MagicLinkResponse> {
        request
            .validate()
            .map_err(|e| IdentityServiceError::ValidationError(validation_message(&e)))?;

        let email = normalize_email(&request.email);
        let token = VerificationToken::issue(&email, VerificationPurpose::SignIn);
        self.store.replace_verification_token(&token).await?;

        self.email_service
            .send_magic_link(&email, &token.token)
            .await
            .map_err(|e| IdentityServiceError::EmailServiceError(e.to_string()))?;

        Ok(MagicLinkResponse {
            message: "Check your email for a sign-in link".to_string(),
            expires_in: TOKEN_TTL_HOURS * 3600,
        })
    }

    /// Redeems a sign-in link. The first redemption for an address creates
    /// the user; every redemption marks the address verified.
    pub async fn consume_magic_link(
        &self,
        request: MagicLinkCallbackRequest,
    ) -> IdentityServiceResult<SignInResponse> {
        request
            .validate()
            .map_err(|e| IdentityServiceError::ValidationError(validation_message(&e)))?;

        let email = normalize_email(&request.email);
        let token = self
            .store
            .find_verification_token(&request.token)
            .await?
            .ok_or(IdentityServiceError::InvalidSignInLink)?;

        if token.purpose != VerificationPurpose::SignIn || token.identifier != email {
            return Err(IdentityServiceError::InvalidSignInLink);
        }

        // Consumed before checking expiry so a stale link cannot linger
        if !self.store.delete_verification_token(&token.token).await? || token.is_expired() {
            return Err(IdentityServiceError::InvalidSignInLink);
        }

        let (user, is_new_user) = match self.store.get_user_by_email(&email).await? {
            Some(user) if user.email_verified.is_some() => (user, false),
            Some(user) => {
                let user = self
                    .store
                    .mark_email_verified(user.id)
                    .await?
                    .unwrap_or(user);
                (user, false)
            }
            None => {
                let user = self
                    .store
                    .create_user(NewUser {
                        email: Some(email.clone()),
                        email_verified: Some(Utc::now()),
                        ..Default::default()
                    })
                    .await?;
                info!("Created user {} from magic link", user.id);
                (user, true)
            }
        };

        self.signed_in(user, is_new_user)
    }

    /// Signs in with a provider profile
    ///
    /// Resolution order: an account already linked to the subject, then a
    /// user holding the profile's email (which gets linked), then a new user.
    pub async fn sign_in_with_profile(
        &self,
        profile: OAuthProfile,
    ) -> IdentityServiceResult<SignInResponse> {
        if let Some(user) = self
            .store
            .find_user_by_account(&profile.provider, &profile.subject)
            .await?
        {
            return self.signed_in(user, false);
        }

        let email = profile.email.as_deref().map(normalize_email);

        if let Some(email) = &email {
            if let Some(user) = self.store.get_user_by_email(email).await? {
                self.store
                    .link_account(user.id, &profile.provider, &profile.subject)
                    .await?;
                info!("Linked {} account to existing user {}", profile.provider, user.id);

                let user = match user.email_verified {
                    Some(_) => user,
                    None => self
                        .store
                        .mark_email_verified(user.id)
                        .await?
                        .unwrap_or(user),
                };
                return self.signed_in(user, false);
            }
        }

        let name = profile
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let slug = match &name {
            Some(name) => Some(available_slug(&*self.store, name, None).await?),
            None => None,
        };

        let user = self
            .store
            .create_user(NewUser {
                name,
                email_verified: email.as_ref().map(|_| Utc::now()),
                email,
                image: profile.picture.clone(),
                slug,
            })
            .await?;

        self.store
            .link_account(user.id, &profile.provider, &profile.subject)
            .await?;
        info!("Created user {} from {} sign-in", user.id, profile.provider);

        self.signed_in(user, true)
    }

    fn signed_in(&self, user: User, is_new_user: bool) -> IdentityServiceResult<SignInResponse> {
        let session = self.jwt_service.issue_session(&user).map_err(|e| {
            warn!("Failed to issue session for user {}: {}", user.id, e);
            e
        })?;

        Ok(SignInResponse {
            session,
            needs_profile: user.needs_profile(),
            is_new_user,
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Store;
    use crate::models::GOOGLE_PROVIDER;
    use crate::test_support::{MemoryStore, RecordingMailer};
    use crate::utils::ErrorKind;
    use chrono::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        mailer: Arc<RecordingMailer>,
        jwt: Arc<JwtService>,
        service: IdentityService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let jwt = Arc::new(JwtService::new("test_secret".to_string()));
        let email_service =
            Arc::new(EmailService::new(mailer.clone(), "https://bookbar.example.com").unwrap());

        Fixture {
            service: IdentityService::new(store.clone(), jwt.clone(), email_service),
            store,
            mailer,
            jwt,
        }
    }

    fn google_profile(subject: &str, name: Option<&str>, email: Option<&str>) -> OAuthProfile {
        OAuthProfile {
            provider: GOOGLE_PROVIDER.to_string(),
            subject: subject.to_string(),
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            picture: Some("https://lh3.googleusercontent.com/a/photo".to_string()),
        }
    }

    fn kind(err: IdentityServiceError) -> ErrorKind {
        AppError::from(err).kind()
    }

    fn sent_token(mailer: &RecordingMailer) -> String {
        let sent = mailer.sent();
        let text = &sent.last().unwrap().text;
        let start = text.find("token=").unwrap() + "token=".len();
        text[start..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit() || *c == '-')
            .collect()
    }

    // ============================================================================
    // Magic Link Tests
    // ============================================================================

    #[tokio::test]
    async fn test_magic_link_creates_user() {
        let f = fixture();
        let response = f
            .service
            .request_magic_link(MagicLinkRequest {
                email: "Reader@Example.com".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.expires_in, 24 * 3600);

        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "reader@example.com");

        let signed_in = f
            .service
            .consume_magic_link(MagicLinkCallbackRequest {
                email: "reader@example.com".to_string(),
                token: sent_token(&f.mailer),
            })
            .await
            .unwrap();

        assert!(signed_in.is_new_user);
        assert!(signed_in.needs_profile);
        assert_eq!(signed_in.user.email.as_deref(), Some("reader@example.com"));
        assert!(signed_in.user.email_verified.is_some());

        let session = f.jwt.validate_session(&signed_in.session.token).unwrap();
        assert_eq!(session.user_id, signed_in.user.id);
    }

    #[tokio::test]
    async fn test_magic_link_is_single_use() {
        let f = fixture();
        f.service
            .request_magic_link(MagicLinkRequest {
                email: "reader@example.com".to_string(),
            })
            .await
            .unwrap();
        let request = MagicLinkCallbackRequest {
            email: "reader@example.com".to_string(),
            token: sent_token(&f.mailer),
        };

        f.service.consume_magic_link(request.clone()).await.unwrap();
        let err = f.service.consume_magic_link(request).await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_magic_link_for_existing_user() {
        let f = fixture();
        let existing = f.store.seed_user("Jane Doe", "jane@example.com").await;

        f.service
            .request_magic_link(MagicLinkRequest {
                email: "jane@example.com".to_string(),
            })
            .await
            .unwrap();
        let signed_in = f
            .service
            .consume_magic_link(MagicLinkCallbackRequest {
                email: "jane@example.com".to_string(),
                token: sent_token(&f.mailer),
            })
            .await
            .unwrap();

        assert!(!signed_in.is_new_user);
        assert!(!signed_in.needs_profile);
        assert_eq!(signed_in.user.id, existing.id);
        assert!(signed_in.user.email_verified.is_some());
    }

    #[tokio::test]
    async fn test_magic_link_wrong_email_rejected() {
        let f = fixture();
        f.service
            .request_magic_link(MagicLinkRequest {
                email: "reader@example.com".to_string(),
            })
            .await
            .unwrap();

        let err = f
            .service
            .consume_magic_link(MagicLinkCallbackRequest {
                email: "someone@example.com".to_string(),
                token: sent_token(&f.mailer),
            })
            .await
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::BadRequest);
        assert!(f
            .store
            .get_user_by_email("someone@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_expired_magic_link_rejected() {
        let f = fixture();
        let mut token = VerificationToken::issue("reader@example.com", VerificationPurpose::SignIn);
        token.expires_at = Utc::now() - Duration::minutes(5);
        f.store.replace_verification_token(&token).await.unwrap();

        let err = f
            .service
            .consume_magic_link(MagicLinkCallbackRequest {
                email: "reader@example.com".to_string(),
                token: token.token.clone(),
            })
            .await
            .unwrap_err();

        assert_eq!(kind(err), ErrorKind::BadRequest);
        assert!(f
            .store
            .find_verification_token(&token.token)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_email_change_token_cannot_sign_in() {
        let f = fixture();
        let token = VerificationToken::issue("reader@example.com", VerificationPurpose::EmailChange);
        f.store.replace_verification_token(&token).await.unwrap();

        let err = f
            .service
            .consume_magic_link(MagicLinkCallbackRequest {
                email: "reader@example.com".to_string(),
                token: token.token,
            })
            .await
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_magic_link_request_validates_email() {
        let f = fixture();
        let err = f
            .service
            .request_magic_link(MagicLinkRequest {
                email: "not-an-email".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(kind(err), ErrorKind::BadRequest);
        assert!(f.mailer.sent().is_empty());
    }

    // ============================================================================
    // Provider Profile Tests
    // ============================================================================

    #[tokio::test]
    async fn test_profile_creates_user_with_slug() {
        let f = fixture();
        let signed_in = f
            .service
            .sign_in_with_profile(google_profile("g-1", Some("Jane Doe"), Some("jane@example.com")))
            .await
            .unwrap();

        assert!(signed_in.is_new_user);
        assert!(!signed_in.needs_profile);
        assert_eq!(signed_in.user.slug.as_deref(), Some("jane-doe"));
        assert_eq!(
            signed_in.user.image.as_deref(),
            Some("https://lh3.googleusercontent.com/a/photo")
        );
        assert!(signed_in.user.email_verified.is_some());

        let again = f
            .service
            .sign_in_with_profile(google_profile("g-1", Some("Jane Doe"), Some("jane@example.com")))
            .await
            .unwrap();
        assert!(!again.is_new_user);
        assert_eq!(again.user.id, signed_in.user.id);
    }

    #[tokio::test]
    async fn test_profile_links_existing_email() {
        let f = fixture();
        let existing = f.store.seed_user("Jane Doe", "jane@example.com").await;

        let signed_in = f
            .service
            .sign_in_with_profile(google_profile("g-2", Some("Jane"), Some("JANE@example.com")))
            .await
            .unwrap();

        assert!(!signed_in.is_new_user);
        assert_eq!(signed_in.user.id, existing.id);

        let linked = f
            .store
            .find_user_by_account(GOOGLE_PROVIDER, "g-2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(linked.id, existing.id);
    }

    #[tokio::test]
    async fn test_profile_without_name_needs_profile() {
        let f = fixture();
        let signed_in = f
            .service
            .sign_in_with_profile(google_profile("g-3", None, None))
            .await
            .unwrap();

        assert!(signed_in.is_new_user);
        assert!(signed_in.needs_profile);
        assert_eq!(signed_in.user.slug, None);
        assert_eq!(signed_in.user.email, None);
    }

    #[tokio::test]
    async fn test_profile_name_collision_gets_suffix() {
        let f = fixture();
        f.store.seed_user("Jane Doe", "jane@example.com").await;

        let signed_in = f
            .service
            .sign_in_with_profile(google_profile("g-4", Some("Jane Doe"), Some("other@example.com")))
            .await
            .unwrap();

        assert_eq!(signed_in.user.slug.as_deref(), Some("jane-doe-2"));
    }
}
