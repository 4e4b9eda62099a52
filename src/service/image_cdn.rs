//! Image CDN
//!
//! Avatar storage on a Cloudinary-compatible image CDN. Uploads are signed,
//! stored under a deterministic key per user and screened by the CDN's
//! moderation add-on.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{error, info};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::CdnConfig;
use crate::utils::error::AppError;

/// Folder all avatars live in
pub const AVATAR_FOLDER: &str = "bookbar";

/// Moderation add-on applied to uploads
pub const MODERATION: &str = "webpurify";

#[derive(Error, Debug)]
pub enum CdnError {
    #[error("Image CDN is not configured")]
    NotConfigured,

    #[error("Upload request failed: {0}")]
    Request(String),

    #[error("Upload rejected: {0}")]
    Rejected(String),
}

impl From<CdnError> for AppError {
    fn from(err: CdnError) -> Self {
        AppError::Internal(format!("Image upload failed: {}", err))
    }
}

/// Storage key of a user's uploaded avatar
pub fn profile_image_key(user_id: Uuid) -> String {
    format!("{}-profile-image", user_id)
}

#[async_trait]
pub trait ImageCdn: Send + Sync {
    /// Uploads a base64 data URI under `key`, replacing any previous image.
    /// Returns the delivery URL.
    async fn upload(&self, data_uri: &str, key: &str) -> Result<String, CdnError>;

    /// Delivery URL for `key`
    fn image_url(&self, key: &str) -> String;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadErrorResponse {
    error: UploadErrorBody,
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    message: String,
}

/// Cloudinary upload API client
pub struct CloudinaryCdn {
    config: CdnConfig,
    http_client: HttpClient,
}

impl CloudinaryCdn {
    pub fn new(config: CdnConfig) -> Result<Self, CdnError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CdnError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// SHA-256 signature over the alphabetically sorted upload parameters
    fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<_> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl ImageCdn for CloudinaryCdn {
    async fn upload(&self, data_uri: &str, key: &str) -> Result<String, CdnError> {
        let signed = vec![
            ("folder", AVATAR_FOLDER.to_string()),
            ("invalidate", "true".to_string()),
            ("moderation", MODERATION.to_string()),
            ("public_id", key.to_string()),
            ("timestamp", Utc::now().timestamp().to_string()),
        ];
        let signature = self.sign(&signed);

        let mut form: Vec<(&str, String)> = signed;
        form.push(("file", data_uri.to_string()));
        form.push(("api_key", self.config.api_key.clone()));
        form.push(("signature", signature));
        form.push(("signature_algorithm", "sha256".to_string()));

        let url = format!(
            "{}/v1_1/{}/image/upload",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.cloud_name
        );

        let response = self
            .http_client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("Avatar upload request failed for {}: {}", key, e);
                CdnError::Request(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<UploadErrorResponse>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| status.to_string());
            error!("Avatar upload rejected for {}: {}", key, message);
            return Err(CdnError::Rejected(message));
        }

        let uploaded = response
            .json::<UploadResponse>()
            .await
            .map_err(|e| CdnError::Request(format!("Invalid upload response: {}", e)))?;

        info!("Uploaded avatar {}", key);
        Ok(uploaded.secure_url)
    }

    fn image_url(&self, key: &str) -> String {
        format!(
            "https://res.cloudinary.com/{}/image/upload/{}/{}",
            self.config.cloud_name, AVATAR_FOLDER, key
        )
    }
}

/// Stand-in used when no CDN credentials are configured; uploads fail
pub struct UnconfiguredCdn;

#[async_trait]
impl ImageCdn for UnconfiguredCdn {
    async fn upload(&self, _data_uri: &str, _key: &str) -> Result<String, CdnError> {
        Err(CdnError::NotConfigured)
    }

    fn image_url(&self, key: &str) -> String {
        format!("/images/{}/{}", AVATAR_FOLDER, key)
    }
}
