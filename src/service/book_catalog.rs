//! External Book Catalog
//!
//! Book metadata lookups against the Google Books volumes API.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use thiserror::Error;

use crate::config::BookCatalogConfig;
use crate::models::Book;
use crate::utils::error::AppError;

/// Results returned when the caller does not ask for a count
pub const DEFAULT_MAX_RESULTS: u8 = 3;

/// Upper bound accepted by the volumes API
pub const MAX_RESULTS_LIMIT: u8 = 40;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    Request(String),

    #[error("Catalog returned status {0}")]
    Status(u16),
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        AppError::ExternalService(err.to_string())
    }
}

#[async_trait]
pub trait BookCatalog: Send + Sync {
    /// Free-text search; `subject:<name>` restricts to a subject
    async fn search(&self, query: &str, max_results: u8) -> Result<Vec<Book>, CatalogError>;
}

#[derive(Debug, Default, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    id: String,
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    description: Option<String>,
    image_links: Option<ImageLinks>,
    canonical_volume_link: Option<String>,
    info_link: Option<String>,
    average_rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ImageLinks {
    thumbnail: Option<String>,
}

impl Volume {
    /// Volumes without a title are skipped
    fn into_book(self) -> Option<Book> {
        let info = self.volume_info;
        let title = info.title.filter(|t| !t.trim().is_empty())?;

        let link = info
            .canonical_volume_link
            .or(info.info_link)
            .unwrap_or_else(|| format!("https://books.google.com/books?id={}", self.id));

        Some(Book {
            title,
            authors: (!info.authors.is_empty()).then(|| info.authors.join(", ")),
            description: info.description,
            cover: info.image_links.and_then(|links| links.thumbnail),
            link,
            avg_rating: info.average_rating,
            id: self.id,
        })
    }
}

/// Google Books volumes API client
pub struct GoogleBooksCatalog {
    config: BookCatalogConfig,
    http_client: HttpClient,
}

impl GoogleBooksCatalog {
    pub fn new(config: BookCatalogConfig) -> Result<Self, CatalogError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CatalogError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl BookCatalog for GoogleBooksCatalog {
    async fn search(&self, query: &str, max_results: u8) -> Result<Vec<Book>, CatalogError> {
        let max_results = max_results.clamp(1, MAX_RESULTS_LIMIT).to_string();
        let mut params = vec![("q", query), ("maxResults", max_results.as_str())];
        if let Some(key) = self.config.api_key.as_deref() {
            params.push(("key", key));
        }

        debug!("Searching book catalog for {:?}", query);

        let response = self
            .http_client
            .get(format!(
                "{}/volumes",
                self.config.api_base_url.trim_end_matches('/')
            ))
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                error!("Book catalog request failed: {}", e);
                CatalogError::Request(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }

        let volumes = response
            .json::<VolumesResponse>()
            .await
            .map_err(|e| CatalogError::Request(format!("Invalid catalog response: {}", e)))?;

        Ok(volumes
            .items
            .into_iter()
            .filter_map(Volume::into_book)
            .collect())
    }
}
