#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Analytics loaders.
//!
//! The map never computes counts itself. An [`AnalyticsSource`] fetches
//! the report analytics and per-layer points from wherever the host keeps
//! them: a directory of JSON files ([`FileAnalyticsSource`]) or an HTTP
//! API ([`HttpAnalyticsSource`]).

use std::path::PathBuf;

use async_trait::async_trait;
use report_map_analytics_models::{LayerPoints, ReportAnalytics};
use serde::de::DeserializeOwned;
use url::Url;

/// Errors that can occur while loading analytics.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured base URL does not parse.
    #[error("Invalid analytics URL: {0}")]
    Url(#[from] url::ParseError),

    /// The configured base URL cannot take path segments (e.g. `mailto:`).
    #[error("Analytics URL '{base_url}' cannot be a base")]
    CannotBeABase {
        /// Configured base URL.
        base_url: String,
    },

    /// Nothing is available for the requested source.
    #[error("No points for source '{source_id}'")]
    UnknownSource {
        /// External source id.
        source_id: String,
    },
}

/// Where report analytics come from.
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    /// Short description for log messages.
    fn describe(&self) -> String;

    /// Fetches layers and per-area counts.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the fetch or decoding fails.
    async fn fetch_report(&self) -> Result<ReportAnalytics, AnalyticsError>;

    /// Fetches the points of one external source.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the fetch or decoding fails.
    async fn fetch_layer_points(&self, source_id: &str) -> Result<LayerPoints, AnalyticsError>;
}

/// Reads `analytics.json` and `layers/<source_id>.json` from a directory.
#[derive(Debug, Clone)]
pub struct FileAnalyticsSource {
    root: PathBuf,
}

impl FileAnalyticsSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read_json<T: DeserializeOwned>(&self, path: PathBuf) -> Result<T, AnalyticsError> {
        log::debug!("Reading {}", path.display());
        let bytes = tokio::fs::read(&path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl AnalyticsSource for FileAnalyticsSource {
    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }

    async fn fetch_report(&self) -> Result<ReportAnalytics, AnalyticsError> {
        self.read_json(self.root.join("analytics.json")).await
    }

    async fn fetch_layer_points(&self, source_id: &str) -> Result<LayerPoints, AnalyticsError> {
        if source_id.is_empty() || source_id.contains(['/', '\\']) || source_id.starts_with('.') {
            return Err(AnalyticsError::UnknownSource {
                source_id: source_id.to_string(),
            });
        }

        let path = self.root.join("layers").join(format!("{source_id}.json"));
        if !tokio::fs::try_exists(&path).await? {
            return Err(AnalyticsError::UnknownSource {
                source_id: source_id.to_string(),
            });
        }

        let mut points: LayerPoints = self.read_json(path).await?;
        if points.external_source_id.is_empty() {
            points.external_source_id = source_id.to_string();
        }
        Ok(points)
    }
}

/// Fetches `<base>/analytics` and `<base>/layers/<source_id>/points`.
#[derive(Debug, Clone)]
pub struct HttpAnalyticsSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnalyticsSource {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL of the analytics endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the base URL is invalid.
    pub fn report_url(&self) -> Result<Url, AnalyticsError> {
        self.endpoint(&["analytics"])
    }

    /// URL of a source's points endpoint. The source id is percent-encoded
    /// as a single path segment.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the base URL is invalid.
    pub fn points_url(&self, source_id: &str) -> Result<Url, AnalyticsError> {
        self.endpoint(&["layers", source_id, "points"])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AnalyticsError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|()| AnalyticsError::CannotBeABase {
                base_url: self.base_url.clone(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, AnalyticsError> {
        log::debug!("GET {url}");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AnalyticsSource for HttpAnalyticsSource {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    async fn fetch_report(&self) -> Result<ReportAnalytics, AnalyticsError> {
        self.get_json(self.report_url()?).await
    }

    async fn fetch_layer_points(&self, source_id: &str) -> Result<LayerPoints, AnalyticsError> {
        let response = self
            .client
            .get(self.points_url(source_id)?)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AnalyticsError::UnknownSource {
                source_id: source_id.to_string(),
            });
        }
        Ok(response.error_for_status()?.json().await?)
    }
}
