#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Administrative area and boundary tileset types.
//!
//! These types describe UK administrative areas (regions, Westminster
//! constituencies, wards) keyed by GSS code, the per-area record counts
//! produced by the upstream analytics query, and the static boundary
//! tilesets those counts are painted onto.

pub mod gss;

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Center point as `(longitude, latitude)`.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            f64::midpoint(self.west, self.east),
            f64::midpoint(self.south, self.north),
        )
    }
}

/// Number of imported records attributed to a single administrative area.
///
/// One row per area per tileset per report. Rows are replaced wholesale
/// whenever the analytics query runs again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaAggregate {
    /// GSS code of the area (e.g. `"E14000530"`).
    #[serde(alias = "gss")]
    pub code: String,
    /// Human-readable area name.
    #[serde(default)]
    pub label: String,
    /// Record count. Negative and non-finite inputs are clamped to zero.
    #[serde(deserialize_with = "deserialize_count")]
    pub count: u64,
    /// Point used to anchor the area's count label.
    #[serde(default, alias = "point")]
    pub representative_point: Option<geojson::Geometry>,
    /// Camera bounds for zooming to the area, when the query provides them.
    #[serde(default)]
    pub fit_bounds: Option<BoundingBox>,
}

impl AreaAggregate {
    /// Creates an aggregate without a representative point or bounds.
    #[must_use]
    pub fn new(code: impl Into<String>, label: impl Into<String>, count: u64) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            count,
            representative_point: None,
            fit_bounds: None,
        }
    }
}

/// Accepts any JSON number and clamps it into a non-negative integer.
fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(value.map_or(0, |n| {
        n.as_u64()
            .unwrap_or_else(|| n.as_f64().map_or(0, clamp_count))
    }))
}

/// Clamps a floating point count into `0..=u64::MAX`, mapping NaN to zero.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn clamp_count(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= u64::MAX as f64 {
        u64::MAX
    } else {
        value.round() as u64
    }
}

/// The administrative level a boundary tileset draws.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TilesetKind {
    /// English regions and devolved nations.
    Region,
    /// Westminster parliamentary constituencies.
    Constituency,
    /// Electoral wards.
    Ward,
}

impl TilesetKind {
    /// Returns all variants in level-of-detail order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Region, Self::Constituency, Self::Ward]
    }
}

/// Static description of a vector boundary tileset.
///
/// All tilesets stay in the scene at once; the render surface hides each
/// one outside its `[min_zoom, max_zoom)` range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tileset {
    /// Administrative level.
    pub kind: TilesetKind,
    /// Source identifier registered with the render surface.
    pub source_id: String,
    /// Vector tile URL (e.g. `mapbox://account.tileset`).
    pub source_url: String,
    /// Layer inside the vector tiles holding the boundary polygons.
    pub boundary_layer_id: String,
    /// Feature property used to key per-feature state (the GSS code).
    pub promotion_key: String,
    /// Feature property holding the area name.
    pub label_key: String,
    /// Zoom at which the tileset becomes visible.
    pub min_zoom: f64,
    /// Zoom at which the tileset is hidden again.
    pub max_zoom: f64,
}

impl Tileset {
    /// Returns `true` if the tileset is drawn at `zoom`.
    #[must_use]
    pub fn is_visible_at(&self, zoom: f64) -> bool {
        zoom >= self.min_zoom && zoom < self.max_zoom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_accepts_upstream_field_names() {
        let aggregate: AreaAggregate = serde_json::from_value(serde_json::json!({
            "gss": "E14000530",
            "label": "Hackney North",
            "count": 42,
            "point": { "type": "Point", "coordinates": [-0.07, 51.56] }
        }))
        .unwrap();

        assert_eq!(aggregate.code, "E14000530");
        assert_eq!(aggregate.count, 42);
        assert!(aggregate.representative_point.is_some());
        assert!(aggregate.fit_bounds.is_none());
    }

    #[test]
    fn negative_and_fractional_counts_are_clamped() {
        let negative: AreaAggregate =
            serde_json::from_str(r#"{"code":"E14000001","count":-5}"#).unwrap();
        assert_eq!(negative.count, 0);

        let fractional: AreaAggregate =
            serde_json::from_str(r#"{"code":"E14000001","count":2.6}"#).unwrap();
        assert_eq!(fractional.count, 3);

        let missing: AreaAggregate =
            serde_json::from_str(r#"{"code":"E14000001","count":null}"#).unwrap();
        assert_eq!(missing.count, 0);
    }

    #[test]
    fn clamp_count_handles_non_finite() {
        assert_eq!(clamp_count(f64::NAN), 0);
        assert_eq!(clamp_count(f64::NEG_INFINITY), 0);
        assert_eq!(clamp_count(f64::INFINITY), u64::MAX);
    }

    #[test]
    fn tileset_visibility_is_half_open() {
        let tileset = Tileset {
            kind: TilesetKind::Constituency,
            source_id: "constituencies".to_string(),
            source_url: "mapbox://example.constituencies".to_string(),
            boundary_layer_id: "constituencies".to_string(),
            promotion_key: "PCON24CD".to_string(),
            label_key: "PCON24NM".to_string(),
            min_zoom: 8.0,
            max_zoom: 10.0,
        };

        assert!(!tileset.is_visible_at(7.9));
        assert!(tileset.is_visible_at(8.0));
        assert!(tileset.is_visible_at(9.99));
        assert!(!tileset.is_visible_at(10.0));
    }

    #[test]
    fn bounding_box_center() {
        let bbox = BoundingBox::new(-1.0, 50.0, 1.0, 52.0);
        assert_eq!(bbox.center(), (0.0, 51.0));
    }
}
