mod kinopoisk;
mod memory;
mod prober;
#[cfg(test)]
mod stub_server;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::types::{Candidate, CandidateId, ImageAsset, TitleSummary};

pub use kinopoisk::KinopoiskProvider;
pub use memory::{InMemoryCatalog, ScriptedProber};
pub use prober::HttpImageProber;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur while talking to the catalog
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("API request failed: {0}")]
    Request(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Response parsing failed: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CatalogError {
    pub fn status(&self) -> Option<u16> {
        match self {
            CatalogError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Permission or rate-limit failure; blocks the session
    pub fn is_lockout(&self) -> bool {
        matches!(self.status(), Some(403) | Some(429))
    }
}

/// Title and image lookups against an external catalog
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Fetch one random title, unfiltered
    async fn random_title(&self) -> CatalogResult<TitleSummary>;

    /// Fetch full details (names, aliases, people) for a title
    async fn title_details(&self, id: CandidateId) -> CatalogResult<Candidate>;

    /// Fetch up to `limit` images of the given type tags for a title
    async fn images(
        &self,
        id: CandidateId,
        types: &[String],
        limit: u32,
    ) -> CatalogResult<Vec<ImageAsset>>;

    /// Get the name of this provider
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Loadable,
    Broken,
    /// Aborted through the cancellation token; says nothing about the URL
    Cancelled,
}

/// Decides whether an image URL actually renders
#[async_trait]
pub trait ImageProber: Send + Sync {
    async fn probe(&self, url: &str, cancel: CancellationToken) -> ProbeOutcome;
}

/// Configuration for the catalog collaborators
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    /// API key sent as X-API-KEY
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.kinopoisk.dev".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(8),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl CatalogConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            base_url: non_empty_var("CATALOG_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            api_key: non_empty_var("CATALOG_API_KEY"),
            request_timeout: non_empty_var("CATALOG_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            probe_timeout: non_empty_var("IMAGE_PROBE_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.probe_timeout),
        }
    }

    /// Build the HTTP catalog provider
    pub fn build_provider(&self) -> CatalogResult<Arc<dyn CatalogProvider>> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            CatalogError::Config("No catalog API key configured. Set CATALOG_API_KEY".to_string())
        })?;

        let provider =
            KinopoiskProvider::new(self.base_url.clone(), api_key, self.request_timeout)?;
        Ok(Arc::new(provider))
    }

    /// Build the HTTP image prober
    pub fn build_prober(&self) -> CatalogResult<Arc<dyn ImageProber>> {
        Ok(Arc::new(HttpImageProber::new(self.probe_timeout)?))
    }
}
