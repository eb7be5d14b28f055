#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Payloads produced by the report's analytics and point queries.

use report_map_geography_models::{AreaAggregate, TilesetKind};
use serde::{Deserialize, Serialize};

/// Reference to an external data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSourceRef {
    /// External source id.
    pub id: String,
}

/// A data layer configured on the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLayer {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Source the layer's records come from.
    pub source: LayerSourceRef,
}

/// Report-level analytics: configured layers and per-area record counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAnalytics {
    /// Layers in display order.
    #[serde(default)]
    pub layers: Vec<ReportLayer>,
    #[serde(default)]
    pub imported_data_count_by_region: Vec<AreaAggregate>,
    #[serde(default)]
    pub imported_data_count_by_constituency: Vec<AreaAggregate>,
    #[serde(default)]
    pub imported_data_count_by_ward: Vec<AreaAggregate>,
}

impl ReportAnalytics {
    /// Aggregates for one tileset level.
    #[must_use]
    pub fn aggregates(&self, kind: TilesetKind) -> &[AreaAggregate] {
        match kind {
            TilesetKind::Region => &self.imported_data_count_by_region,
            TilesetKind::Constituency => &self.imported_data_count_by_constituency,
            TilesetKind::Ward => &self.imported_data_count_by_ward,
        }
    }
}

/// Points of one external source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerPoints {
    /// Filled in from the request when the payload omits it.
    #[serde(default)]
    pub external_source_id: String,
    /// Record link template with a `{record_id}` placeholder.
    #[serde(default)]
    pub record_url_template: Option<String>,
    #[serde(default = "empty_collection")]
    pub points: geojson::FeatureCollection,
}

fn empty_collection() -> geojson::FeatureCollection {
    geojson::FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}

impl LayerPoints {
    /// Creates an empty point set for a source.
    #[must_use]
    pub fn empty(external_source_id: impl Into<String>) -> Self {
        Self {
            external_source_id: external_source_id.into(),
            record_url_template: None,
            points: empty_collection(),
        }
    }
}
