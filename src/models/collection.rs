//! Collection Model
//!
//! Collections, the listing and detail projections returned to clients, and
//! the data needed to create one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{book::Book, user::UserSummary};

/// Collection row as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Collection {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Owning user, set at creation and never changed
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Listing entry: the collection, its owner, and its books' cover URLs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub user: UserSummary,
    /// Cover URLs in insertion order; books without a cover are skipped
    pub covers: Vec<String>,
}

/// Single collection with its full, ordered book list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDetail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub user: UserSummary,
    pub books: Vec<Book>,
}

/// One page of collections
#[derive(Debug, Clone, Serialize)]
pub struct CollectionPage {
    pub collections: Vec<CollectionSummary>,
    pub total_pages: i64,
}

/// One page of a single user's collections, with the resolved user
#[derive(Debug, Clone, Serialize)]
pub struct UserCollectionPage {
    pub user: UserSummary,
    pub collections: Vec<CollectionSummary>,
    pub total_pages: i64,
}

/// Which collections a listing covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionFilter {
    All,
    Owner(Uuid),
    /// Title or description matches the query
    Search(String),
}

/// Data for creating a collection together with its books
#[derive(Debug, Clone)]
pub struct NewCollection {
    pub title: String,
    pub description: String,
    /// Books in insertion order; ids are unique within the list
    pub books: Vec<Book>,
}

/// Response for collection creation
#[derive(Debug, Clone, Serialize)]
pub struct CreateCollectionResponse {
    pub id: Uuid,
}

/// Response for favourite queries and toggles
#[derive(Debug, Clone, Serialize)]
pub struct FavouriteState {
    pub favourited: bool,
}
