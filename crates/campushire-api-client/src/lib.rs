//! Shared HTTP client for the Campushire API.
//!
//! Provides a minimal client with configurable auth (Bearer token or
//! X-API-Key), generic GET/POST helpers, import domain methods, and the
//! `ImportWatcher` that keeps a client-side view of an import job in sync by
//! polling the status endpoint.

pub mod api;
pub mod reconciler;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Authentication strategy for the API.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
}

/// Non-2xx response, preserved with status and raw body so callers can
/// distinguish a 404 from a transport failure.
#[derive(Debug, thiserror::Error)]
#[error("API request failed with status {status}: {body}")]
pub struct ApiStatusError {
    pub status: u16,
    pub body: String,
}

/// API version prefix (e.g. "/api/v0"). Set CAMPUSHIRE_API_VERSION to match the server.
pub fn api_prefix() -> String {
    let version = std::env::var("CAMPUSHIRE_API_VERSION").unwrap_or_else(|_| "v0".to_string());
    format!("/api/{}", version)
}

/// HTTP client for the Campushire API with configurable auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl ApiClient {
    pub fn new(base_url: String, auth: Auth) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Create client from environment: CAMPUSHIRE_API_URL (or API_URL),
    /// CAMPUSHIRE_API_KEY (or API_KEY). Uses X-API-Key auth.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("CAMPUSHIRE_API_URL")
            .or_else(|_| std::env::var("API_URL"))
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let api_key = std::env::var("CAMPUSHIRE_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .context("Missing API key. Set CAMPUSHIRE_API_KEY or API_KEY")?;

        Self::new(base_url, Auth::XApiKey(api_key))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
            Auth::XApiKey(key) => request.header("X-API-Key", key.as_str()),
        }
    }

    async fn read_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiStatusError {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body: T = response
            .json()
            .await
            .context("Failed to parse response as JSON")?;

        Ok(body)
    }

    /// GET request. Deserializes the JSON response; non-2xx becomes an
    /// `ApiStatusError` inside the returned error.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.get(&url));

        let response = request.send().await.context("Failed to send request")?;
        Self::read_body(response).await
    }

    /// POST multipart form and deserialize response.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.post(&url).multipart(form));

        let response = request.send().await.context("Failed to send request")?;
        Self::read_body(response).await
    }

    /// Raw client for custom requests. Caller must apply auth via build_url and headers.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

// Re-export domain types for convenience.
pub use api::conflict_job_id;
pub use campushire_core::models::{ImportJobResponse, ImportStatus, ImportSubmitResponse};
pub use reconciler::{
    spawn as spawn_import_watcher, ImportObservation, ImportSnapshot, ImportWatcherHandle,
    LatestImportFetch, StatusFetch, WatcherConfig,
};
