#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the report map server.
//!
//! Kept apart from the engine types so the HTTP contract can evolve on
//! its own.

use report_map::{ApplyStatus, AreaDetail};
use report_map_selection::{PanelState, PanelTab, SelectionEffect, SelectionState};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Current selection, as shown by the area panel and URL bar.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSelection {
    #[serde(flatten)]
    pub state: SelectionState,
    pub panel: PanelState,
    pub fragment: String,
    pub area: Option<AreaDetail>,
}

/// Effects produced by an event or selection call.
#[derive(Debug, Clone, Serialize)]
pub struct ApiEffects {
    pub effects: Vec<SelectionEffect>,
}

/// Body of `POST /api/selection/area`.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectAreaRequest {
    /// GSS code of the area.
    pub code: String,
}

/// Body of `PUT /api/selection/panel`.
#[derive(Debug, Clone, Deserialize)]
pub struct PanelTabRequest {
    pub tab: PanelTab,
}

/// Outcome of refreshing one marker layer's points.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerRefresh {
    pub external_source_id: String,
    /// `None` when the fetch failed.
    pub status: Option<ApplyStatus>,
    pub points: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `POST /api/refresh`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub analytics: ApplyStatus,
    pub layers: Vec<LayerRefresh>,
}
