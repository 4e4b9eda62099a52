//! Request and Response Models
//!
//! Input types for every procedure, validated before any datastore access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::book::Book;
use crate::utils::validation::{
    email_validator, image_type_validator, name_validator, url_validator, MAX_IMAGE_BYTES,
};

/// Page selector for listing procedures. Pages start at 1.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

/// Input for `collection.getAllByUserSlug`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserCollectionsQuery {
    #[validate(length(min = 1, max = 255, message = "Slug cannot be empty"))]
    pub slug: String,
    pub page: Option<i64>,
}

/// Input for `collection.search`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(length(min = 1, max = 200, message = "Query must be 1-200 characters"))]
    pub query: String,
    pub page: Option<i64>,
}

/// Input naming a single collection (queries and simple mutations)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionIdRequest {
    pub id: Uuid,
}

/// A book as submitted when creating a collection
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BookInput {
    /// External catalog id
    #[validate(length(min = 1, max = 64, message = "Book id must be 1-64 characters"))]
    pub id: String,

    #[validate(length(min = 1, max = 512, message = "Book title must be 1-512 characters"))]
    pub title: String,

    pub authors: Option<String>,

    pub description: Option<String>,

    #[validate(custom(function = "url_validator"))]
    pub cover: Option<String>,

    #[validate(custom(function = "url_validator"))]
    pub link: String,

    #[validate(range(min = 0.0, max = 5.0, message = "Average rating must be between 0 and 5"))]
    pub avg_rating: Option<f64>,
}

impl From<BookInput> for Book {
    fn from(input: BookInput) -> Self {
        Book {
            id: input.id,
            title: input.title,
            authors: input.authors,
            description: input.description,
            cover: input.cover.filter(|c| !c.is_empty()),
            link: input.link,
            avg_rating: input.avg_rating,
        }
    }
}

/// Input for `collection.create`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCollectionRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: String,

    #[validate(length(max = 100, message = "A collection holds at most 100 books"))]
    pub books: Vec<BookInput>,
}

/// Input for `collection.rate`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateCollectionRequest {
    pub id: Uuid,

    #[validate(range(min = 0.5, max = 5.0, message = "Rating must be between 0.5 and 5"))]
    pub rating: f64,
}

/// Avatar image submitted with a profile update
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ImageUpload {
    /// MIME type, one of the accepted image types
    #[serde(rename = "type")]
    #[validate(custom(function = "image_type_validator"))]
    pub mime_type: String,

    /// Declared size in bytes
    #[validate(range(max = MAX_IMAGE_BYTES, message = "Image must be 1MB or smaller"))]
    pub size: u64,

    /// Image content as a base64 data URI ("data:image/png;base64,...")
    #[validate(length(min = 1, message = "Image data cannot be empty"))]
    pub bytes: String,
}

/// Input for `user.updateProfile`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(custom(function = "name_validator"))]
    pub name: Option<String>,

    #[validate(custom(function = "email_validator"))]
    pub email: Option<String>,

    #[validate(nested)]
    pub image: Option<ImageUpload>,
}

impl UpdateProfileRequest {
    /// Whether at least one field was supplied
    pub fn has_changes(&self) -> bool {
        self.name.is_some() || self.email.is_some() || self.image.is_some()
    }
}

/// Input for `user.verifyEmail`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1, max = 128, message = "Token cannot be empty"))]
    pub token: String,
}

/// Input for `book.search`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookSearchQuery {
    #[validate(length(min = 1, max = 200, message = "Query must be 1-200 characters"))]
    pub query: String,

    #[validate(range(min = 1, max = 40, message = "max_results must be 1-40"))]
    pub max_results: Option<u8>,
}

/// Request a magic sign-in link by email
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MagicLinkRequest {
    #[validate(custom(function = "email_validator"))]
    pub email: String,
}

/// Redeem a magic sign-in link
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MagicLinkCallbackRequest {
    #[validate(custom(function = "email_validator"))]
    pub email: String,

    #[validate(length(min = 1, max = 128, message = "Token cannot be empty"))]
    pub token: String,
}

/// Response for magic link requests
#[derive(Debug, Serialize)]
pub struct MagicLinkResponse {
    pub message: String,
    pub expires_in: i64,
}

/// Response for health check
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}
