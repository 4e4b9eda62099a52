//! Rating Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's rating of a collection. At most one per (user, collection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rating {
    pub user_id: Uuid,
    pub collection_id: Uuid,
    pub value: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate of all ratings for a collection, computed on read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RatingSummary {
    /// Mean value, `None` when there are no ratings
    pub average: Option<f64>,
    pub count: i64,
}

impl RatingSummary {
    /// Summarizes a set of rating values
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let (sum, count) = values
            .into_iter()
            .fold((0.0, 0i64), |(sum, count), v| (sum + v, count + 1));

        Self {
            average: (count > 0).then(|| sum / count as f64),
            count,
        }
    }
}
