//! Utilities Module
//!
//! Shared utilities for error handling, validation, and slug derivation used
//! throughout the service.

pub mod error;
pub mod slug;
pub mod validation;

// Re-export commonly used utilities
pub use error::{AppError, AppResult, ErrorKind, ErrorResponse};
pub use slug::slugify;
pub use validation::*;
