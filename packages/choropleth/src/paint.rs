//! Boundary layer and label definitions for one tileset.
//!
//! Every tileset gets four layers, bottom to top: a fill colored from the
//! `count` feature state, an outline, an outline for the selected area
//! and a label layer drawn from a `GeoJSON` source of representative
//! points. All of them are gated to the tileset's zoom range.

use report_map_geography::index::AreaCodeIndex;
use report_map_geography_models::Tileset;
use report_map_style_models::{LayerKind, LayerSpec, SourceSpec, expr};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{feature_state::COUNT_STATE_KEY, scale::ChoroplethScales};

/// Fill used for areas with no count.
pub const TRANSPARENT: &str = "rgba(0, 0, 0, 0)";

/// Feature property on label points holding the text size multiplier.
pub const TEXT_SCALE_PROPERTY: &str = "textScale";

/// Styling knobs for boundary layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoroplethStyle {
    /// Opacity of the area fill.
    pub fill_opacity: f64,
    /// Outline color of every area.
    pub line_color: String,
    /// Outline width in pixels.
    pub line_width: f64,
    /// Outline color of the selected area.
    pub selected_line_color: String,
    /// Outline width of the selected area in pixels.
    pub selected_line_width: f64,
    /// Base label size in pixels, multiplied by the text scale.
    pub label_size: f64,
    /// Label text color.
    pub label_color: String,
    /// Halo drawn behind label text.
    pub label_halo_color: String,
}

impl Default for ChoroplethStyle {
    fn default() -> Self {
        Self {
            fill_opacity: 0.6,
            line_color: "#ffffff".to_string(),
            line_width: 0.5,
            selected_line_color: "#ffffff".to_string(),
            selected_line_width: 3.0,
            label_size: 14.0,
            label_color: "#ffffff".to_string(),
            label_halo_color: "#000000".to_string(),
        }
    }
}

/// Fill layer id for a tileset.
#[must_use]
pub fn fill_layer_id(tileset: &Tileset) -> String {
    format!("{}-fill", tileset.source_id)
}

/// Outline layer id for a tileset.
#[must_use]
pub fn line_layer_id(tileset: &Tileset) -> String {
    format!("{}-line", tileset.source_id)
}

/// Selected-area outline layer id for a tileset.
#[must_use]
pub fn selected_layer_id(tileset: &Tileset) -> String {
    format!("{}-selected", tileset.source_id)
}

/// Label layer id for a tileset.
#[must_use]
pub fn label_layer_id(tileset: &Tileset) -> String {
    format!("{}-labels", tileset.source_id)
}

/// Id of the `GeoJSON` source that feeds the label layer.
#[must_use]
pub fn label_source_id(tileset: &Tileset) -> String {
    format!("{}-labels", tileset.source_id)
}

/// Vector source for a tileset, promoting its GSS code property.
#[must_use]
pub fn boundary_source(tileset: &Tileset) -> SourceSpec {
    SourceSpec::vector(
        tileset.source_url.clone(),
        &tileset.boundary_layer_id,
        &tileset.promotion_key,
    )
}

/// Fill color expression.
///
/// Areas without a `count` state stay transparent. Otherwise the count
/// is bucketed by a step expression over the distinct color stops. With
/// no stops at all the fill is the color of the domain minimum.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn fill_color_expression(scales: &ChoroplethScales) -> Value {
    let stops = scales.distinct_stops();
    let colored = match stops.split_first() {
        None => {
            let min = scales.color_scale.domain_min.max(0.0) as u64;
            json!(scales.color_for(min).to_string())
        }
        Some((first, rest)) => expr::step(
            expr::to_number(expr::feature_state(COUNT_STATE_KEY), 0.0),
            first.color.to_string(),
            rest.iter()
                .map(|stop| (stop.value, json!(stop.color.to_string())))
                .collect(),
        ),
    };

    expr::case(
        vec![(
            expr::eq(expr::feature_state(COUNT_STATE_KEY), Value::Null),
            json!(TRANSPARENT),
        )],
        colored,
    )
}

/// Filter matching the selected area, or nothing when no area is
/// selected.
#[must_use]
pub fn selected_area_filter(tileset: &Tileset, code: Option<&str>) -> Value {
    expr::eq(
        expr::get(&tileset.promotion_key),
        code.map_or(Value::Null, |c| json!(c)),
    )
}

fn zoom_gated(layer: LayerSpec, tileset: &Tileset) -> LayerSpec {
    layer.zoom_range(tileset.min_zoom, tileset.max_zoom)
}

/// Fill layer with the given color expression.
#[must_use]
pub fn fill_layer(tileset: &Tileset, style: &ChoroplethStyle, color: Value) -> LayerSpec {
    zoom_gated(
        LayerSpec::new(fill_layer_id(tileset), LayerKind::Fill, &tileset.source_id)
            .source_layer(&tileset.boundary_layer_id)
            .paint("fill-color", color)
            .paint("fill-opacity", style.fill_opacity),
        tileset,
    )
}

/// Outline layer.
#[must_use]
pub fn line_layer(tileset: &Tileset, style: &ChoroplethStyle) -> LayerSpec {
    zoom_gated(
        LayerSpec::new(line_layer_id(tileset), LayerKind::Line, &tileset.source_id)
            .source_layer(&tileset.boundary_layer_id)
            .paint("line-color", style.line_color.as_str())
            .paint("line-width", style.line_width),
        tileset,
    )
}

/// Outline of the selected area.
#[must_use]
pub fn selected_layer(
    tileset: &Tileset,
    style: &ChoroplethStyle,
    selected_code: Option<&str>,
) -> LayerSpec {
    zoom_gated(
        LayerSpec::new(selected_layer_id(tileset), LayerKind::Line, &tileset.source_id)
            .source_layer(&tileset.boundary_layer_id)
            .filter(Some(selected_area_filter(tileset, selected_code)))
            .paint("line-color", style.selected_line_color.as_str())
            .paint("line-width", style.selected_line_width),
        tileset,
    )
}

/// Count labels, sized by the `textScale` property of each label point.
///
/// The area name is read from the tileset's `label_key` property, falling
/// back to the code for unnamed areas.
#[must_use]
pub fn label_layer(tileset: &Tileset, style: &ChoroplethStyle) -> LayerSpec {
    zoom_gated(
        LayerSpec::new(
            label_layer_id(tileset),
            LayerKind::Symbol,
            label_source_id(tileset),
        )
        .layout(
            "text-field",
            expr::concat(vec![
                expr::to_string(expr::get("count")),
                json!("\n"),
                expr::coalesce(vec![expr::get(&tileset.label_key), expr::get("code")]),
            ]),
        )
        .layout(
            "text-size",
            expr::mul(style.label_size, expr::get(TEXT_SCALE_PROPERTY)),
        )
        .layout("text-allow-overlap", false)
        .paint("text-color", style.label_color.as_str())
        .paint("text-halo-color", style.label_halo_color.as_str())
        .paint("text-halo-width", 1.0),
        tileset,
    )
}

/// All boundary layers of a tileset, bottom first.
#[must_use]
pub fn boundary_layers(
    tileset: &Tileset,
    style: &ChoroplethStyle,
    scales: &ChoroplethScales,
    selected_code: Option<&str>,
) -> Vec<LayerSpec> {
    vec![
        fill_layer(tileset, style, fill_color_expression(scales)),
        line_layer(tileset, style),
        selected_layer(tileset, style, selected_code),
        label_layer(tileset, style),
    ]
}

/// Label points for every indexed area that has a representative point.
///
/// The area name is stored under the tileset's `label_key`, the property
/// the boundary tiles carry it in.
#[must_use]
pub fn label_features(
    tileset: &Tileset,
    index: &AreaCodeIndex,
    scales: &ChoroplethScales,
) -> Vec<geojson::Feature> {
    index
        .iter()
        .filter_map(|(code, entry)| {
            let (lng, lat) = entry.point?;
            let mut properties = Map::new();
            properties.insert("code".to_string(), json!(code));
            if !entry.label.is_empty() {
                properties.insert(tileset.label_key.clone(), json!(entry.label));
            }
            properties.insert("count".to_string(), json!(entry.count));
            properties.insert(
                TEXT_SCALE_PROPERTY.to_string(),
                json!(scales.text_scale_for(entry.count)),
            );

            Some(geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![lng, lat]))),
                id: Some(geojson::feature::Id::String(code.to_string())),
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect()
}
