//! API Layer
//!
//! The procedure-call boundary: routing, authentication and request
//! decoding in front of the services.

pub mod auth_handlers;
pub mod book_handlers;
pub mod collection_handlers;
pub mod handlers;
pub mod middleware;
pub mod routes;

// Re-export commonly used types
pub use handlers::{AppState, SuccessResponse};
pub use middleware::{auth_middleware, extract_auth_user, AuthUser, SessionAuth};
pub use routes::{create_routes, RouterBuilder};
