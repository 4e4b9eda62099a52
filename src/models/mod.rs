//! Data Models Module
//!
//! Data structures used throughout the service: stored entities, the
//! projections returned to clients, and validated procedure inputs.

pub mod book;
pub mod collection;
pub mod oauth;
pub mod rating;
pub mod requests;
pub mod session;
pub mod user;
pub mod verification;

// Re-export commonly used types
pub use book::*;
pub use collection::*;
pub use oauth::*;
pub use rating::*;
pub use requests::*;
pub use session::*;
pub use user::*;
pub use verification::*;
