//! Database Module
//!
//! Connection management, the `Store` data access interface and its
//! PostgreSQL implementation.

pub mod connection;
pub mod postgres;
pub mod store;

// Re-export commonly used types
pub use connection::{DatabaseConfig, DatabasePool, Pagination, COLLECTIONS_PER_PAGE};
pub use postgres::PgStore;
pub use store::{DynStore, Store, StoreError, StoreResult};
