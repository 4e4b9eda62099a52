//! Validation Utilities
//!
//! Input validation functions for procedure inputs and profile data.

use regex::Regex;
use std::sync::OnceLock;
use validator::ValidationError;

/// Image MIME types accepted for avatar uploads
pub const ACCEPTED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Largest avatar upload, in bytes
pub const MAX_IMAGE_BYTES: u64 = 1_000_000;

/// Lowest and highest rating a user may give
pub const MIN_RATING: f64 = 0.5;
pub const MAX_RATING: f64 = 5.0;

/// Validates email address format using a comprehensive regex pattern
pub fn validate_email(email: &str) -> bool {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    regex.is_match(email.trim())
}

/// Normalizes email address to lowercase and removes whitespace
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates a display name: 1-255 characters of letters, spaces, hyphens,
/// apostrophes and periods
pub fn validate_name(name: &str) -> bool {
    let trimmed = name.trim();

    if trimmed.is_empty() || trimmed.chars().count() > 255 {
        return false;
    }

    static NAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = NAME_REGEX
        .get_or_init(|| Regex::new(r"^[\p{L}\s\-'.]+$").expect("Failed to compile name regex"));

    regex.is_match(trimmed)
}

/// Validates URL format for covers, links and avatars
pub fn validate_url(url: &str) -> bool {
    if url.is_empty() {
        return true; // Empty URLs are allowed for optional fields
    }

    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = URL_REGEX.get_or_init(|| {
        Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").expect("Failed to compile URL regex")
    });

    regex.is_match(url) && url.len() <= 2048
}

/// Whether `mime_type` is one of the accepted avatar image types
pub fn is_accepted_image_type(mime_type: &str) -> bool {
    ACCEPTED_IMAGE_TYPES.contains(&mime_type)
}

/// Whether `value` is a valid half-star rating in [0.5, 5]
pub fn is_valid_rating(value: f64) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&value) && (value * 2.0).fract() == 0.0
}

/// Custom validator for email fields using the validator crate
pub fn email_validator(email: &str) -> Result<(), ValidationError> {
    if validate_email(email) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_email").with_message(messages::INVALID_EMAIL.into()))
    }
}

/// Custom validator for name fields using the validator crate
pub fn name_validator(name: &str) -> Result<(), ValidationError> {
    if validate_name(name) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_name").with_message(messages::INVALID_NAME.into()))
    }
}

/// Custom validator for URL fields using the validator crate
pub fn url_validator(url: &str) -> Result<(), ValidationError> {
    if validate_url(url) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_url").with_message(messages::INVALID_URL.into()))
    }
}

/// Custom validator for avatar MIME types
pub fn image_type_validator(mime_type: &str) -> Result<(), ValidationError> {
    if is_accepted_image_type(mime_type) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_image_type")
            .with_message(messages::INVALID_IMAGE_TYPE.into()))
    }
}

/// Validation error messages for user-friendly responses
pub mod messages {
    pub const INVALID_EMAIL: &str = "Please enter a valid email address";
    pub const INVALID_NAME: &str =
        "Name must contain only letters, spaces, hyphens, periods, and apostrophes";
    pub const INVALID_URL: &str = "Please enter a valid URL starting with http:// or https://";
    pub const INVALID_IMAGE_TYPE: &str = "Image must be a JPEG, PNG, or WebP file";
    pub const IMAGE_TOO_LARGE: &str = "Image must be 1MB or smaller";
    pub const INVALID_RATING: &str = "Rating must be between 0.5 and 5 in half-star steps";
    pub const INVALID_PAGE: &str = "Page number must be 1 or greater";
    pub const FIELD_REQUIRED: &str = "This field is required";
}
