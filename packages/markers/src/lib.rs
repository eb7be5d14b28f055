#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point markers for external record sources.
//!
//! Each connected data source becomes one `GeoJSON` source plus one
//! marker layer. The first two sources draw icons, later ones draw
//! colored circles. The selected record is filtered out of its own
//! layer and redrawn on a dedicated layer above every other marker.

pub mod layer;
pub mod popup;
pub mod record;

use serde::{Deserialize, Serialize};

pub use record::{RecordFeature, SelectedRecord};

/// Reasons a clicked feature is not accepted as a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkerError {
    #[error("Feature has no geometry")]
    MissingGeometry,

    #[error("Feature geometry is not a point")]
    NotAPoint,

    #[error("Point coordinates are not finite")]
    InvalidCoordinates,

    #[error("Feature has no id property")]
    MissingId,

    #[error("Feature id is not a string or integer")]
    InvalidId,

    #[error("Property '{name}' has an unexpected type")]
    InvalidProperty {
        /// Property name.
        name: String,
    },
}

/// Points from one external data source, as shown on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLayerSource {
    /// Id of the external data source.
    pub external_source_id: String,
    /// Display position among the report's layers. Decides the marker
    /// style.
    pub index: usize,
    /// Layer name shown in the legend.
    #[serde(default)]
    pub name: String,
    /// Link to a record, with `{record_id}` standing in for its id.
    #[serde(default)]
    pub record_url_template: Option<String>,
    /// Point features.
    #[serde(default)]
    pub points: Vec<geojson::Feature>,
}

impl MapLayerSource {
    /// Creates a source with no points.
    #[must_use]
    pub fn new(external_source_id: impl Into<String>, index: usize) -> Self {
        Self {
            external_source_id: external_source_id.into(),
            index,
            name: String::new(),
            record_url_template: None,
            points: Vec::new(),
        }
    }
}
