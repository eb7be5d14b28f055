//! Marker layer definitions.

use report_map_choropleth::color::Hsl;
use report_map_geography::tilesets::MAX_REGION_ZOOM;
use report_map_style_models::{LayerKind, LayerSpec, expr};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{MapLayerSource, SelectedRecord};

/// Sources at or below this index draw icons.
pub const MAX_ICON_INDEX: usize = 1;

/// Icon used for the selected record.
pub const SELECTED_ICON: &str = "icon-selected";

/// Source and layer id for the selected record.
pub const SELECTED_RECORD_ID: &str = "selected-record";

const GOLDEN_ANGLE: f64 = 137.507_764_05;

/// Marker styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerStyle {
    /// Markers are hidden below this zoom. Follows the constituency
    /// tileset's minimum zoom rather than configuration.
    #[serde(skip)]
    pub min_zoom: f64,
    pub icon_size: f64,
    pub selected_icon_size: f64,
    pub circle_radius: f64,
    pub circle_stroke_color: String,
    pub circle_stroke_width: f64,
    /// Explicit circle colors for sources after the icon ones, in order.
    /// Sources past the end get a hashed color.
    pub palette: Vec<String>,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            min_zoom: MAX_REGION_ZOOM,
            icon_size: 0.75,
            selected_icon_size: 1.0,
            circle_radius: 5.0,
            circle_stroke_color: "#ffffff".to_string(),
            circle_stroke_width: 1.0,
            palette: Vec::new(),
        }
    }
}

/// `GeoJSON` source id for an external source's points.
#[must_use]
pub fn source_id(external_source_id: &str) -> String {
    format!("records-{external_source_id}")
}

/// Marker layer id for an external source.
#[must_use]
pub fn layer_id(external_source_id: &str) -> String {
    format!("records-{external_source_id}-markers")
}

/// Maps a marker layer id back to its external source id.
#[must_use]
pub fn external_source_for_layer(layer_id: &str) -> Option<&str> {
    layer_id
        .strip_prefix("records-")?
        .strip_suffix("-markers")
        .filter(|id| !id.is_empty())
}

/// Icon for an icon-drawn source.
#[must_use]
pub fn icon_name(index: usize) -> String {
    format!("icon-{index}")
}

/// Circle color for a source.
///
/// Depends only on `index` and `external_source_id`, so the same source
/// keeps its color across sessions.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn layer_colour(index: usize, external_source_id: &str, palette: &[String]) -> String {
    if let Some(color) = index
        .checked_sub(MAX_ICON_INDEX + 1)
        .and_then(|i| palette.get(i))
    {
        return color.clone();
    }

    let digest = md5::compute(external_source_id.as_bytes());
    let offset = f64::from(u16::from_be_bytes([digest.0[0], digest.0[1]]) % 360);

    Hsl {
        h: (index as f64).mul_add(GOLDEN_ANGLE, offset),
        s: 0.7,
        l: 0.55,
    }
    .to_string()
}

/// Filter hiding the selected record from its own source's layer.
#[must_use]
pub fn record_filter(source: &MapLayerSource, selection: Option<&SelectedRecord>) -> Option<Value> {
    selection
        .filter(|s| s.source_id == source.external_source_id)
        .map(|s| expr::ne(expr::to_string(expr::get("id")), s.record_id.as_str()))
}

/// Marker layer for one source.
#[must_use]
pub fn build_layer(
    source: &MapLayerSource,
    selection: Option<&SelectedRecord>,
    style: &MarkerStyle,
) -> LayerSpec {
    let id = &source.external_source_id;
    let layer = if source.index <= MAX_ICON_INDEX {
        LayerSpec::new(layer_id(id), LayerKind::Symbol, source_id(id))
            .layout("icon-image", icon_name(source.index))
            .layout("icon-anchor", "bottom")
            .layout("icon-size", style.icon_size)
            .layout("icon-allow-overlap", true)
            .layout("icon-ignore-placement", true)
    } else {
        LayerSpec::new(layer_id(id), LayerKind::Circle, source_id(id))
            .paint(
                "circle-color",
                layer_colour(source.index, id, &style.palette),
            )
            .paint("circle-radius", style.circle_radius)
            .paint("circle-stroke-color", style.circle_stroke_color.as_str())
            .paint("circle-stroke-width", style.circle_stroke_width)
    };

    layer
        .min_zoom(style.min_zoom)
        .filter(record_filter(source, selection))
}

/// Layer drawing the selected record on top of every marker.
#[must_use]
pub fn selected_layer(style: &MarkerStyle) -> LayerSpec {
    LayerSpec::new(SELECTED_RECORD_ID, LayerKind::Symbol, SELECTED_RECORD_ID)
        .layout("icon-image", SELECTED_ICON)
        .layout("icon-anchor", "bottom")
        .layout("icon-size", style.selected_icon_size)
        .layout("icon-allow-overlap", true)
        .layout("icon-ignore-placement", true)
}

/// Features for the selected-record source.
#[must_use]
pub fn selected_features(selection: Option<&SelectedRecord>) -> Vec<geojson::Feature> {
    selection
        .map(SelectedRecord::to_point_feature)
        .into_iter()
        .collect()
}

/// Legend entry for a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    pub external_source_id: String,
    pub name: String,
    /// Icon name for icon sources.
    pub icon: Option<String>,
    /// Circle color for circle sources.
    pub color: Option<String>,
}

/// Legend entry matching [`build_layer`]'s styling.
#[must_use]
pub fn legend_entry(source: &MapLayerSource, style: &MarkerStyle) -> LegendEntry {
    let id = &source.external_source_id;
    let (icon, color) = if source.index <= MAX_ICON_INDEX {
        (Some(icon_name(source.index)), None)
    } else {
        (None, Some(layer_colour(source.index, id, &style.palette)))
    };
    LegendEntry {
        external_source_id: id.clone(),
        name: source.name.clone(),
        icon,
        color,
    }
}
