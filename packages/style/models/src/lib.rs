#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Layer, source and style expression types fed to the render surface.
//!
//! Everything here is plain data that serializes to the `Mapbox` /
//! `MapLibre` style specification. Expressions are `serde_json::Value`
//! trees built with the helpers in [`expr`]; no control flow crosses
//! into the surface.

pub mod expr;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString};

/// Style layer type.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LayerKind {
    /// Filled polygons.
    Fill,
    /// Polygon outlines and lines.
    Line,
    /// Icons and text.
    Symbol,
    /// Plain circles.
    Circle,
}

/// A style layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Unique layer id.
    pub id: String,
    /// Layer type.
    #[serde(rename = "type")]
    pub kind: LayerKind,
    /// Source the layer draws from.
    pub source: String,
    /// Layer inside a vector source.
    #[serde(
        rename = "source-layer",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_layer: Option<String>,
    /// Zoom at which the layer appears.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minzoom: Option<f64>,
    /// Zoom at which the layer disappears.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxzoom: Option<f64>,
    /// Feature filter expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    /// Paint properties.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub paint: Map<String, Value>,
    /// Layout properties.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub layout: Map<String, Value>,
}

impl LayerSpec {
    /// Creates a layer with no zoom gate, filter or properties.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: LayerKind, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            source_layer: None,
            minzoom: None,
            maxzoom: None,
            filter: None,
            paint: Map::new(),
            layout: Map::new(),
        }
    }

    /// Sets the vector source layer.
    #[must_use]
    pub fn source_layer(mut self, source_layer: impl Into<String>) -> Self {
        self.source_layer = Some(source_layer.into());
        self
    }

    /// Restricts the layer to `[min, max)`.
    #[must_use]
    pub fn zoom_range(mut self, min: f64, max: f64) -> Self {
        self.minzoom = Some(min);
        self.maxzoom = Some(max);
        self
    }

    /// Hides the layer below `min`.
    #[must_use]
    pub fn min_zoom(mut self, min: f64) -> Self {
        self.minzoom = Some(min);
        self
    }

    /// Sets (or clears) the feature filter.
    #[must_use]
    pub fn filter(mut self, filter: Option<Value>) -> Self {
        self.filter = filter;
        self
    }

    /// Sets a paint property.
    #[must_use]
    pub fn paint(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.paint.insert(key.to_string(), value.into());
        self
    }

    /// Sets a layout property.
    #[must_use]
    pub fn layout(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.layout.insert(key.to_string(), value.into());
        self
    }
}

/// A data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceSpec {
    /// Remote vector tiles.
    Vector {
        /// Tileset URL.
        url: String,
        /// Source layer -> feature property used as the feature id.
        #[serde(
            rename = "promoteId",
            default,
            skip_serializing_if = "BTreeMap::is_empty"
        )]
        promote_id: BTreeMap<String, String>,
    },
    /// Inline `GeoJSON`.
    Geojson {
        /// Feature collection to draw.
        data: geojson::FeatureCollection,
    },
}

impl SourceSpec {
    /// Vector source keyed by `promotion_key` on `source_layer`.
    #[must_use]
    pub fn vector(url: impl Into<String>, source_layer: &str, promotion_key: &str) -> Self {
        Self::Vector {
            url: url.into(),
            promote_id: BTreeMap::from([(source_layer.to_string(), promotion_key.to_string())]),
        }
    }

    /// `GeoJSON` source from a list of features.
    #[must_use]
    pub fn geojson(features: Vec<geojson::Feature>) -> Self {
        Self::Geojson {
            data: geojson::FeatureCollection {
                bbox: None,
                features,
                foreign_members: None,
            },
        }
    }

    /// Returns `true` for sources whose data is available as soon as they
    /// are added.
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        matches!(self, Self::Geojson { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_serializes_to_style_spec_shape() {
        let layer = LayerSpec::new("constituencies-fill", LayerKind::Fill, "constituencies")
            .source_layer("boundaries")
            .zoom_range(8.0, 10.0)
            .paint("fill-opacity", 0.5);

        let value = serde_json::to_value(&layer).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "constituencies-fill",
                "type": "fill",
                "source": "constituencies",
                "source-layer": "boundaries",
                "minzoom": 8.0,
                "maxzoom": 10.0,
                "paint": { "fill-opacity": 0.5 }
            })
        );
    }

    #[test]
    fn vector_source_promotes_key_per_layer() {
        let source = SourceSpec::vector("mapbox://example.wards", "wards", "WD23CD");
        let value = serde_json::to_value(&source).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "vector",
                "url": "mapbox://example.wards",
                "promoteId": { "wards": "WD23CD" }
            })
        );
        assert!(!source.is_inline());
        assert!(SourceSpec::geojson(Vec::new()).is_inline());
    }
}
