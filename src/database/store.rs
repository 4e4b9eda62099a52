//! Data Access Interface
//!
//! `Store` is the interface between the services and the datastore. Every
//! read and write the services perform goes through it, so SQL stays in one
//! place and services can be exercised against an in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::connection::Pagination;
use crate::models::{
    Collection, CollectionDetail, CollectionFilter, CollectionSummary, NewCollection, NewUser,
    OAuthState, Rating, RatingSummary, User, VerificationToken,
};
use crate::utils::error::AppError;

/// Errors raised by the data access layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries the constraint name
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A referenced row is gone; carries the constraint name
    #[error("Foreign key violated: {0}")]
    ForeignKeyViolation(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation(db_err.constraint().unwrap_or_default().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                StoreError::ForeignKeyViolation(
                    db_err.constraint().unwrap_or_default().to_string(),
                )
            }
            other => StoreError::Database(other),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(constraint) => {
                AppError::Conflict(format!("Record already exists ({})", constraint))
            }
            // The acting user was deleted while their session is still live
            StoreError::ForeignKeyViolation(constraint) if constraint.ends_with("_user_id_fkey") => {
                AppError::Authentication("Session user no longer exists".to_string())
            }
            StoreError::ForeignKeyViolation(constraint) => {
                AppError::NotFound(format!("Referenced record no longer exists ({})", constraint))
            }
            StoreError::Database(err) => AppError::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to a store
pub type DynStore = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Round-trip to the datastore
    async fn ping(&self) -> StoreResult<()>;

    // Users

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn get_user_by_slug(&self, slug: &str) -> StoreResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    /// Set name and slug together
    async fn update_user_name(&self, id: Uuid, name: &str, slug: &str)
        -> StoreResult<Option<User>>;
    async fn clear_user_image(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn mark_email_verified(&self, id: Uuid) -> StoreResult<Option<User>>;
    /// Deletes the user and, by cascade, everything they own
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;
    /// Whether `slug` belongs to a user other than `except`
    async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> StoreResult<bool>;

    // Linked identities

    async fn find_user_by_account(&self, provider: &str, subject: &str)
        -> StoreResult<Option<User>>;
    async fn link_account(&self, user_id: Uuid, provider: &str, subject: &str) -> StoreResult<()>;

    // Verification tokens

    /// Purges tokens with the same identifier and purpose, then stores `token`
    async fn replace_verification_token(&self, token: &VerificationToken) -> StoreResult<()>;
    async fn find_verification_token(&self, token: &str)
        -> StoreResult<Option<VerificationToken>>;
    async fn delete_verification_token(&self, token: &str) -> StoreResult<bool>;
    /// Consumes `token` and moves the user to `email`, marked verified, as one
    /// unit. `None` when the token was already consumed or the user is gone.
    async fn apply_verified_email(
        &self,
        user_id: Uuid,
        token: &str,
        email: &str,
    ) -> StoreResult<Option<User>>;

    // OAuth state

    async fn insert_oauth_state(&self, state: &OAuthState) -> StoreResult<()>;
    /// Removes and returns the state, so it can be used once
    async fn take_oauth_state(&self, state_token: &str) -> StoreResult<Option<OAuthState>>;

    // Collections

    /// One page of collections matching `filter`, newest first, plus the
    /// total number of matches
    async fn list_collections(
        &self,
        filter: &CollectionFilter,
        page: Pagination,
    ) -> StoreResult<(Vec<CollectionSummary>, i64)>;
    async fn get_collection(&self, id: Uuid) -> StoreResult<Option<CollectionDetail>>;
    async fn find_collection(&self, id: Uuid) -> StoreResult<Option<Collection>>;
    /// Creates the collection and upserts/attaches its books as one unit
    async fn create_collection(
        &self,
        owner: Uuid,
        collection: &NewCollection,
    ) -> StoreResult<Collection>;
    async fn delete_collection(&self, id: Uuid) -> StoreResult<bool>;

    // Favourites and ratings

    async fn is_favourited(&self, collection_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    /// Flips the favourite atomically. Returns the new state, or `None` when
    /// the collection does not exist.
    async fn toggle_favourite(&self, collection_id: Uuid, user_id: Uuid)
        -> StoreResult<Option<bool>>;
    async fn rating_summary(&self, collection_id: Uuid) -> StoreResult<RatingSummary>;
    async fn get_rating(&self, collection_id: Uuid, user_id: Uuid) -> StoreResult<Option<Rating>>;
    async fn upsert_rating(
        &self,
        collection_id: Uuid,
        user_id: Uuid,
        value: f64,
    ) -> StoreResult<Rating>;
}
