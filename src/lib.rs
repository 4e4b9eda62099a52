//! bookbar
//!
//! Backend for a social book-collection app: users curate titled
//! collections of books pulled from an external catalog, browse and search
//! everyone's collections, favourite them and rate them on a half-star scale.
//!
//! # Architecture
//!
//! - **API Layer**: `/rpc/<router>.<procedure>` handlers, session middleware
//!   and a configurable `RouterBuilder`
//! - **Service Layer**: collection, user and identity services, plus clients
//!   for mail, the image CDN, the book catalog and Google OAuth
//! - **Models**: records and per-procedure request/response types
//! - **Database**: the `Store` data access trait and its PostgreSQL
//!   implementation
//! - **Utils**: error types, validation and slug derivation
//!
//! # Router Builder Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bookbar::{
//!     api::{RouterBuilder, SessionAuth},
//!     database::{DatabaseConfig, DynStore, PgStore},
//!     service::JwtService,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DatabaseConfig::from_env()?.create_pool().await?;
//! let store: DynStore = Arc::new(PgStore::new(pool));
//! let jwt = Arc::new(JwtService::new("a-long-random-session-secret-value".to_string()));
//! let auth = SessionAuth::new(jwt, store);
//!
//! // Public read replica
//! let readonly = RouterBuilder::with_readonly_routes().build(auth.clone());
//!
//! // Everything
//! let full = RouterBuilder::with_all_routes().build(auth);
//! # Ok(())
//! # }
//! ```

/// HTTP API layer with handlers and configurable routing
pub mod api;

/// Configuration management for all service settings
pub mod config;

/// Data access interface, PostgreSQL store and connection management
pub mod database;

/// Data models and request/response structures
pub mod models;

/// Business logic and external collaborator clients
pub mod service;

/// Shared utilities for errors, validation and slugs
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types for convenient access
pub use api::{create_routes, AppState, RouterBuilder};
pub use models::{
    Book, Collection, CollectionDetail, CollectionSummary, Rating, RatingSummary, Session, User,
};
pub use service::{
    CollectionService, EmailService, IdentityService, JwtService, OAuthService, UserService,
};
pub use utils::error::{AppError, AppResult, ErrorKind, ErrorResponse};

// Re-export database utilities for configuration
pub use database::{DatabaseConfig, DatabasePool, DynStore, PgStore, Store};

// Re-export configuration system
pub use config::{env, AppConfig, ConfigError};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
