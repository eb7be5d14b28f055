//! Read-only views of the map for the area panel, record popup, legend
//! and API snapshots.

use report_map_choropleth::scale::ColorScale;
use report_map_geography_models::{TilesetKind, gss::Nation};
use report_map_markers::{layer::LegendEntry, popup::RecordPopup};
use report_map_selection::{PanelState, SelectionState};
use serde::Serialize;

use crate::ViewState;

/// What the area detail panel shows for the selected area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaDetail {
    pub code: String,
    pub tileset: TilesetKind,
    /// Nation from the code prefix.
    pub nation: Option<Nation>,
    /// `None` when the area has no aggregate in the current report.
    pub label: Option<String>,
    pub count: Option<u64>,
}

/// Color ramp of one tileset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TilesetLegend {
    pub tileset: TilesetKind,
    pub source_id: String,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub color_scale: ColorScale,
}

/// Map legend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Legend {
    pub tilesets: Vec<TilesetLegend>,
    pub markers: Vec<LegendEntry>,
}

/// Everything an observer needs to reproduce the map, plus the surface
/// itself.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSnapshot<'a, S: Serialize> {
    pub view: ViewState,
    pub selection: SelectionState,
    pub panel: PanelState,
    pub fragment: &'a str,
    pub area: Option<AreaDetail>,
    pub popup: Option<RecordPopup>,
    pub legend: Legend,
    pub pending_feature_states: usize,
    pub scene: &'a S,
}
