//! Book Model

use serde::{Deserialize, Serialize};

/// A book sourced from the external catalog. The id is the catalog's volume id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub id: String,
    pub title: String,
    /// Authors flattened to a display string ("A, B")
    pub authors: Option<String>,
    pub description: Option<String>,
    /// Cover image URL
    pub cover: Option<String>,
    /// Canonical link to the book in its catalog
    pub link: String,
    /// Average rating reported by the source catalog
    pub avg_rating: Option<f64>,
}
