#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report map orchestration.
//!
//! [`ReportMap`] owns a render surface and wires everything onto it: the
//! boundary tilesets and their choropleth paint, per-feature counts,
//! marker layers for each external data source and the selection state
//! machine. The host feeds it analytics responses, layer points and
//! [`SurfaceEvent`]s; the map keeps the surface and its own state cells
//! (view, selected area, selected record) consistent.
//!
//! Fetches may resolve out of order. Each one is tagged with a
//! [`RequestId`] from [`ReportMap::begin_request`] and a response older
//! than the newest one already applied is dropped.

pub mod config;
pub mod outputs;

use std::collections::BTreeMap;

use report_map_analytics_models::{LayerPoints, ReportAnalytics, ReportLayer};
use report_map_choropleth::{
    feature_state::FeatureStateSynchronizer, paint, scale::ChoroplethScales,
};
use report_map_geography::{bounds, index::AreaCodeIndex, tilesets::TilesetRegistry};
use report_map_geography_models::{BoundingBox, Tileset, TilesetKind, gss};
use report_map_markers::{MapLayerSource, SelectedRecord, layer, popup::RecordPopup};
use report_map_selection::{
    PanelState, PanelTab, SelectionEffect, SelectionState, SelectionStateMachine,
    cell::StateCell,
};
use report_map_surface::{
    Cursor, FitBoundsOptions, PointerEvent, PointerEventKind, RenderSurface, SurfaceError,
    SurfaceEvent,
};
use serde::{Deserialize, Serialize};

pub use config::{ConfigError, MapConfig};
pub use outputs::{AreaDetail, Legend, MapSnapshot, TilesetLegend};

/// Errors that can occur while driving the map.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The render surface rejected a call.
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Points arrived for a source the report does not show.
    #[error("No layer is configured for source '{source_id}'")]
    UnknownLayerSource {
        /// External source id.
        source_id: String,
    },
}

/// Camera position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    /// `[longitude, latitude]`
    pub center: [f64; 2],
    pub zoom: f64,
    /// Bounds of the last fit, if the camera was fitted.
    pub bounds: Option<BoundingBox>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            center: [-2.5, 54.0],
            zoom: 5.0,
            bounds: None,
        }
    }
}

impl ViewState {
    /// Approximate camera after fitting `bounds`, no closer than
    /// `max_zoom`.
    #[must_use]
    pub fn fitted(bounds: BoundingBox, max_zoom: f64) -> Self {
        let (lng, lat) = bounds.center();
        let span = (bounds.east - bounds.west)
            .abs()
            .max((bounds.north - bounds.south).abs() * 2.0);
        let zoom = if span > 0.0 {
            (360.0 / span).log2().clamp(0.0, max_zoom)
        } else {
            max_zoom
        };

        Self {
            center: [lng, lat],
            zoom,
            bounds: Some(bounds),
        }
    }
}

/// Tag for one analytics or points fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// Whether a response was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ApplyStatus {
    Applied,
    /// A newer response had already been applied.
    Stale,
}

#[derive(Debug, Clone)]
struct TilesetData {
    index: AreaCodeIndex,
    scales: ChoroplethScales,
}

/// What a pointer event landed on.
enum HitTarget {
    Constituencies(Tileset),
    Markers(String),
    Other,
}

/// The report map.
#[derive(Debug)]
pub struct ReportMap<S: RenderSurface> {
    surface: S,
    config: MapConfig,
    registry: TilesetRegistry,
    marker_style: layer::MarkerStyle,
    synchronizer: FeatureStateSynchronizer,
    selection: SelectionStateMachine,
    view: StateCell<ViewState>,
    areas: BTreeMap<TilesetKind, TilesetData>,
    layers: Vec<MapLayerSource>,
    next_request: u64,
    analytics_applied: Option<RequestId>,
    points_applied: BTreeMap<String, RequestId>,
    mounted: bool,
}

impl<S: RenderSurface> ReportMap<S> {
    /// Creates a map over `surface`, restoring the selected area from the
    /// page's URL `fragment`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Config`] if the configured tileset file cannot
    /// be loaded.
    pub fn new(surface: S, config: MapConfig, fragment: &str) -> Result<Self, MapError> {
        let registry = config.registry()?;
        Ok(Self::with_registry(surface, config, registry, fragment))
    }

    /// Creates a map with an explicit tileset registry.
    #[must_use]
    pub fn with_registry(
        surface: S,
        config: MapConfig,
        registry: TilesetRegistry,
        fragment: &str,
    ) -> Self {
        let mut marker_style = config.markers.clone();
        marker_style.min_zoom = registry.marker_min_zoom();

        Self {
            surface,
            synchronizer: FeatureStateSynchronizer::new(config.stale_state),
            selection: SelectionStateMachine::from_fragment(
                fragment,
                registry.constituency_fit_max_zoom(),
            ),
            view: StateCell::new(config.initial_view),
            marker_style,
            registry,
            config,
            areas: BTreeMap::new(),
            layers: Vec::new(),
            next_request: 0,
            analytics_applied: None,
            points_applied: BTreeMap::new(),
            mounted: false,
        }
    }

    /// Registers tileset sources, boundary layers, the selected-record
    /// layer and pointer subscriptions. Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Surface`] if the surface rejects a source or
    /// layer.
    pub fn mount(&mut self) -> Result<(), MapError> {
        if self.mounted {
            return Ok(());
        }

        let empty = ChoroplethScales::compute(std::iter::empty());
        let selected_code = self.selection.area_code().map(str::to_string);

        for tileset in self.registry.iter() {
            self.surface
                .add_source(&tileset.source_id, paint::boundary_source(tileset))?;
            self.surface
                .upsert_geojson_source(&paint::label_source_id(tileset), Vec::new())?;
            for spec in paint::boundary_layers(
                tileset,
                &self.config.choropleth,
                &empty,
                selected_code.as_deref(),
            ) {
                self.surface.add_layer(spec)?;
            }
        }

        if let Some(constituencies) = self.registry.get(TilesetKind::Constituency) {
            subscribe_all(&mut self.surface, &paint::fill_layer_id(constituencies));
        }

        self.surface.upsert_geojson_source(
            layer::SELECTED_RECORD_ID,
            layer::selected_features(self.selection.record()),
        )?;
        self.surface
            .add_layer(layer::selected_layer(&self.marker_style))?;

        self.mounted = true;
        log::info!("Mounted report map with {} tilesets", self.registry.len());
        Ok(())
    }

    /// Issues a tag for a fetch that is about to start.
    pub const fn begin_request(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    /// Applies a report analytics response: per-tileset color scales,
    /// fill paint, labels and feature state, then the marker layer list.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Surface`] if the surface rejects an update.
    pub fn apply_analytics(
        &mut self,
        request: RequestId,
        analytics: &ReportAnalytics,
    ) -> Result<ApplyStatus, MapError> {
        if self.analytics_applied.is_some_and(|applied| request <= applied) {
            log::warn!("Dropping stale analytics response {request:?}");
            return Ok(ApplyStatus::Stale);
        }
        self.mount()?;

        for tileset in self.registry.iter() {
            let index = AreaCodeIndex::from_aggregates(analytics.aggregates(tileset.kind));
            let scales = ChoroplethScales::from_index(&index);

            self.surface.set_paint_property(
                &paint::fill_layer_id(tileset),
                "fill-color",
                paint::fill_color_expression(&scales),
            )?;
            self.surface.upsert_geojson_source(
                &paint::label_source_id(tileset),
                paint::label_features(tileset, &index, &scales),
            )?;
            let report = self
                .synchronizer
                .apply_all(&mut self.surface, tileset, &index)?;
            log::info!(
                "{}: {} areas, domain [{}, {}], {report:?}",
                tileset.source_id,
                index.len(),
                scales.color_scale.domain_min,
                scales.color_scale.domain_max
            );

            self.areas.insert(tileset.kind, TilesetData { index, scales });
        }

        self.configure_layers(&analytics.layers)?;
        self.analytics_applied = Some(request);
        Ok(ApplyStatus::Applied)
    }

    /// Rebuilds the marker layer list from the report's layers. Sources
    /// that stay keep their points; sources that disappear lose their
    /// layer.
    fn configure_layers(&mut self, report_layers: &[ReportLayer]) -> Result<(), MapError> {
        let mut previous: BTreeMap<String, MapLayerSource> = std::mem::take(&mut self.layers)
            .into_iter()
            .map(|source| (source.external_source_id.clone(), source))
            .collect();

        for (index, report_layer) in report_layers.iter().enumerate() {
            let id = &report_layer.source.id;
            if id.is_empty() || self.layers.iter().any(|l| &l.external_source_id == id) {
                log::debug!("Skipping duplicate or empty layer source '{id}'");
                continue;
            }
            let mut source = previous
                .remove(id)
                .unwrap_or_else(|| MapLayerSource::new(id.clone(), index));
            source.index = index;
            source.name.clone_from(&report_layer.name);
            self.layers.push(source);
        }

        let orphaned = self
            .selection
            .record()
            .is_some_and(|record| previous.contains_key(&record.source_id));
        let effects = if orphaned {
            self.selection.clear_record()
        } else {
            Vec::new()
        };

        for removed in previous.keys() {
            let layer_id = layer::layer_id(removed);
            if self.surface.has_layer(&layer_id) {
                self.surface.remove_layer(&layer_id)?;
            }
            self.points_applied.remove(removed);
            log::debug!("Removed marker layer for '{removed}'");
        }

        for source in &self.layers {
            self.surface.upsert_geojson_source(
                &layer::source_id(&source.external_source_id),
                source.points.clone(),
            )?;
            let spec = layer::build_layer(source, self.selection.record(), &self.marker_style);
            let layer_id = spec.id.clone();
            self.surface.upsert_layer(spec)?;
            subscribe_all(&mut self.surface, &layer_id);
        }

        self.surface
            .upsert_layer(layer::selected_layer(&self.marker_style))?;
        self.apply_effects(effects)?;
        Ok(())
    }

    /// Replaces one source's points.
    ///
    /// # Errors
    ///
    /// * [`MapError::UnknownLayerSource`] if the report has no layer for
    ///   the source
    /// * [`MapError::Surface`] if the surface rejects the data
    pub fn apply_layer_points(
        &mut self,
        request: RequestId,
        points: LayerPoints,
    ) -> Result<ApplyStatus, MapError> {
        let id = points.external_source_id;
        if self
            .points_applied
            .get(&id)
            .is_some_and(|applied| request <= *applied)
        {
            log::warn!("Dropping stale points response {request:?} for '{id}'");
            return Ok(ApplyStatus::Stale);
        }

        let Some(source) = self.layers.iter_mut().find(|l| l.external_source_id == id) else {
            return Err(MapError::UnknownLayerSource { source_id: id });
        };
        source.points = points.points.features;
        source.record_url_template = points.record_url_template;
        log::info!("{id}: {} points", source.points.len());

        self.surface
            .upsert_geojson_source(&layer::source_id(&id), source.points.clone())?;
        self.points_applied.insert(id, request);
        Ok(ApplyStatus::Applied)
    }

    /// Feeds a surface event into the map. Returns the selection effects
    /// the host should act on (panel and URL fragment updates); effects on
    /// the map itself have already been applied.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Surface`] if the surface rejects an update.
    pub fn handle_event(&mut self, event: SurfaceEvent) -> Result<Vec<SelectionEffect>, MapError> {
        match event {
            SurfaceEvent::Load => {
                self.synchronizer.on_ready(&mut self.surface, None)?;
                Ok(Vec::new())
            }
            SurfaceEvent::SourceLoaded { source_id } => {
                self.synchronizer
                    .on_ready(&mut self.surface, Some(&source_id))?;
                Ok(Vec::new())
            }
            SurfaceEvent::ViewChanged { center, zoom } => {
                self.view.set(ViewState {
                    center,
                    zoom,
                    bounds: None,
                });
                Ok(Vec::new())
            }
            SurfaceEvent::Pointer(pointer) => self.handle_pointer(&pointer),
        }
    }

    fn hit_target(&self, layer_id: Option<&str>) -> HitTarget {
        let Some(layer_id) = layer_id else {
            return HitTarget::Other;
        };

        if let Some(tileset) = self.registry.get(TilesetKind::Constituency)
            && paint::fill_layer_id(tileset) == layer_id
        {
            return HitTarget::Constituencies(tileset.clone());
        }

        layer::external_source_for_layer(layer_id)
            .filter(|id| self.layers.iter().any(|l| l.external_source_id == *id))
            .map_or(HitTarget::Other, |id| HitTarget::Markers(id.to_string()))
    }

    fn handle_pointer(&mut self, pointer: &PointerEvent) -> Result<Vec<SelectionEffect>, MapError> {
        let target = self.hit_target(pointer.layer_id.as_deref());

        match pointer.kind {
            PointerEventKind::MouseOver => {
                if !matches!(target, HitTarget::Other) {
                    self.surface.set_cursor(Cursor::Pointer);
                }
                Ok(Vec::new())
            }
            PointerEventKind::MouseLeave => {
                self.surface.set_cursor(Cursor::Default);
                Ok(Vec::new())
            }
            PointerEventKind::Click => {
                let Some(feature) = pointer.features.first().filter(|_| !pointer.is_background())
                else {
                    let effects = self.selection.clear_record();
                    return self.apply_effects(effects);
                };

                let effects = match target {
                    HitTarget::Constituencies(tileset) => {
                        let Some(code) = feature_code(&tileset, feature) else {
                            log::debug!("Ignoring boundary click without a code");
                            return Ok(Vec::new());
                        };
                        let area_bounds = self.area_bounds(TilesetKind::Constituency, &code).or_else(
                            || feature.geometry.as_ref().and_then(bounds::bounding_box),
                        );
                        self.selection.select_constituency(&code, area_bounds)
                    }
                    HitTarget::Markers(source_id) => self.selection.select_record(&source_id, feature),
                    HitTarget::Other => Vec::new(),
                };
                self.apply_effects(effects)
            }
        }
    }

    /// Bounds from the aggregate data. Preferred over clicked geometry,
    /// which is clipped at tile edges.
    fn area_bounds(&self, kind: TilesetKind, code: &str) -> Option<BoundingBox> {
        self.areas.get(&kind).and_then(|data| data.index.bounds(code))
    }

    fn apply_effects(
        &mut self,
        effects: Vec<SelectionEffect>,
    ) -> Result<Vec<SelectionEffect>, MapError> {
        for effect in &effects {
            match effect {
                SelectionEffect::FitBounds { bounds, max_zoom } => {
                    self.surface.fit_bounds(
                        *bounds,
                        FitBoundsOptions {
                            max_zoom: *max_zoom,
                            padding: self.config.fit_padding,
                        },
                    );
                    self.view.set(ViewState::fitted(*bounds, *max_zoom));
                }
                SelectionEffect::AreaChanged => self.restyle_selected_area()?,
                SelectionEffect::RecordChanged => self.restyle_markers()?,
                SelectionEffect::OpenAreaPanel
                | SelectionEffect::CloseAreaPanel
                | SelectionEffect::SetPanelTab { .. }
                | SelectionEffect::UpdateFragment { .. } => {}
            }
        }
        Ok(effects)
    }

    fn restyle_selected_area(&mut self) -> Result<(), MapError> {
        if !self.mounted {
            return Ok(());
        }
        let code = self.selection.area_code();
        for tileset in self.registry.iter() {
            self.surface.set_filter(
                &paint::selected_layer_id(tileset),
                Some(paint::selected_area_filter(tileset, code)),
            )?;
        }
        Ok(())
    }

    fn restyle_markers(&mut self) -> Result<(), MapError> {
        if !self.mounted {
            return Ok(());
        }
        let record = self.selection.record();
        for source in &self.layers {
            let layer_id = layer::layer_id(&source.external_source_id);
            if self.surface.has_layer(&layer_id) {
                self.surface
                    .set_filter(&layer_id, layer::record_filter(source, record))?;
            }
        }
        self.surface
            .upsert_geojson_source(layer::SELECTED_RECORD_ID, layer::selected_features(record))?;
        Ok(())
    }

    /// Selects an area without a click, e.g. from a search box.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Surface`] if restyling fails.
    pub fn select_constituency(&mut self, code: &str) -> Result<Vec<SelectionEffect>, MapError> {
        let area_bounds = self.area_bounds(TilesetKind::Constituency, code);
        let effects = self.selection.select_constituency(code, area_bounds);
        self.apply_effects(effects)
    }

    /// Deselects the area, e.g. when its panel is closed.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Surface`] if restyling fails.
    pub fn clear_area(&mut self) -> Result<Vec<SelectionEffect>, MapError> {
        let effects = self.selection.clear_area();
        self.apply_effects(effects)
    }

    /// Deselects the record, e.g. when its popup is closed.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Surface`] if restyling fails.
    pub fn clear_record(&mut self) -> Result<Vec<SelectionEffect>, MapError> {
        let effects = self.selection.clear_record();
        self.apply_effects(effects)
    }

    /// Switches the area panel tab.
    pub fn set_panel_tab(&mut self, tab: PanelTab) -> Vec<SelectionEffect> {
        self.selection.set_panel_tab(tab)
    }

    #[must_use]
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    /// Mutable access for hosts that drive the surface directly, e.g. to
    /// mark sources loaded.
    pub const fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    #[must_use]
    pub const fn registry(&self) -> &TilesetRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn config(&self) -> &MapConfig {
        &self.config
    }

    #[must_use]
    pub const fn is_mounted(&self) -> bool {
        self.mounted
    }

    #[must_use]
    pub const fn view(&self) -> &ViewState {
        self.view.get()
    }

    #[must_use]
    pub fn selection(&self) -> SelectionState {
        self.selection.state()
    }

    #[must_use]
    pub const fn selected_record(&self) -> Option<&SelectedRecord> {
        self.selection.record()
    }

    #[must_use]
    pub const fn panel(&self) -> PanelState {
        self.selection.panel()
    }

    /// Current URL fragment.
    #[must_use]
    pub fn fragment(&self) -> &str {
        self.selection.fragment()
    }

    /// Area index for a tileset, once analytics have been applied.
    #[must_use]
    pub fn index(&self, kind: TilesetKind) -> Option<&AreaCodeIndex> {
        self.areas.get(&kind).map(|data| &data.index)
    }

    /// Scales for a tileset, once analytics have been applied.
    #[must_use]
    pub fn scales(&self, kind: TilesetKind) -> Option<&ChoroplethScales> {
        self.areas.get(&kind).map(|data| &data.scales)
    }

    /// Marker sources in display order.
    #[must_use]
    pub fn layers(&self) -> &[MapLayerSource] {
        &self.layers
    }

    /// Feature-state writes waiting for their source to load.
    #[must_use]
    pub fn pending_feature_states(&self) -> usize {
        self.synchronizer.pending_len()
    }

    /// Detail for the selected area.
    #[must_use]
    pub fn area_detail(&self) -> Option<AreaDetail> {
        let code = self.selection.area_code()?;
        let entry = self
            .index(TilesetKind::Constituency)
            .and_then(|index| index.get(code));

        Some(AreaDetail {
            code: code.to_string(),
            tileset: TilesetKind::Constituency,
            nation: gss::nation(code),
            label: entry.map(|e| e.label.clone()),
            count: entry.map(|e| e.count),
        })
    }

    /// Popup for the selected record.
    #[must_use]
    pub fn popup(&self) -> Option<RecordPopup> {
        let record = self.selection.record()?;
        let template = self
            .layers
            .iter()
            .find(|l| l.external_source_id == record.source_id)
            .and_then(|l| l.record_url_template.as_deref());
        Some(RecordPopup::new(record, template))
    }

    #[must_use]
    pub fn legend(&self) -> Legend {
        Legend {
            tilesets: self
                .registry
                .iter()
                .filter_map(|tileset| {
                    self.areas.get(&tileset.kind).map(|data| TilesetLegend {
                        tileset: tileset.kind,
                        source_id: tileset.source_id.clone(),
                        min_zoom: tileset.min_zoom,
                        max_zoom: tileset.max_zoom,
                        color_scale: data.scales.color_scale.clone(),
                    })
                })
                .collect(),
            markers: self
                .layers
                .iter()
                .map(|source| layer::legend_entry(source, &self.marker_style))
                .collect(),
        }
    }

    /// Serializable view of the whole map.
    #[must_use]
    pub fn snapshot(&self) -> MapSnapshot<'_, S>
    where
        S: Serialize,
    {
        MapSnapshot {
            view: *self.view.get(),
            selection: self.selection(),
            panel: self.panel(),
            fragment: self.fragment(),
            area: self.area_detail(),
            popup: self.popup(),
            legend: self.legend(),
            pending_feature_states: self.pending_feature_states(),
            scene: &self.surface,
        }
    }
}

fn subscribe_all<S: RenderSurface>(surface: &mut S, layer_id: &str) {
    for kind in [
        PointerEventKind::Click,
        PointerEventKind::MouseOver,
        PointerEventKind::MouseLeave,
    ] {
        surface.subscribe(layer_id, kind);
    }
}

/// GSS code of a clicked boundary feature: the promotion key property,
/// falling back to the feature id.
fn feature_code(tileset: &Tileset, feature: &geojson::Feature) -> Option<String> {
    feature
        .properties
        .as_ref()
        .and_then(|p| p.get(&tileset.promotion_key))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .or_else(|| match &feature.id {
            Some(geojson::feature::Id::String(id)) => Some(id.clone()),
            _ => None,
        })
        .filter(|code| !code.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_map_choropleth::feature_state::{COUNT_STATE_KEY, feature_target};
    use report_map_style_models::{LayerKind, SourceSpec};
    use report_map_surface::scene::SceneSurface;
    use serde_json::json;

    const CODE: &str = "E14000530";

    fn analytics() -> ReportAnalytics {
        serde_json::from_value(json!({
            "layers": [
                { "name": "Members", "source": { "id": "members" } },
                { "name": "Events", "source": { "id": "events" } },
                { "name": "Petitions", "source": { "id": "petitions" } }
            ],
            "importedDataCountByRegion": [
                { "code": "E15000007", "label": "London", "count": 40 }
            ],
            "importedDataCountByConstituency": [
                {
                    "code": CODE,
                    "label": "Bethnal Green and Stepney",
                    "count": 12,
                    "representativePoint": { "type": "Point", "coordinates": [-0.05, 51.52] },
                    "fitBounds": { "west": -0.08, "south": 51.51, "east": -0.02, "north": 51.54 }
                },
                { "code": "E14000531", "label": "Bexhill and Battle", "count": 3 }
            ],
            "importedDataCountByWard": []
        }))
        .unwrap()
    }

    fn points(source_id: &str) -> LayerPoints {
        serde_json::from_value(json!({
            "externalSourceId": source_id,
            "recordUrlTemplate": "https://crm.example.org/records/{record_id}",
            "points": {
                "type": "FeatureCollection",
                "features": [
                    {
                        "type": "Feature",
                        "geometry": { "type": "Point", "coordinates": [-0.05, 51.52] },
                        "properties": { "id": "rec-1", "name": "Ada", "postcodeData": { "postcode": "E2 9PJ" } }
                    }
                ]
            }
        }))
        .unwrap()
    }

    fn loaded_map(fragment: &str) -> ReportMap<SceneSurface> {
        let mut map = ReportMap::new(SceneSurface::new(), MapConfig::default(), fragment).unwrap();
        map.mount().unwrap();
        let request = map.begin_request();
        map.apply_analytics(request, &analytics()).unwrap();
        map.surface_mut().mark_all_loaded();
        map.handle_event(SurfaceEvent::Load).unwrap();
        map
    }

    fn click(layer_id: &str, feature: serde_json::Value) -> SurfaceEvent {
        SurfaceEvent::Pointer(PointerEvent::on_layer(
            PointerEventKind::Click,
            layer_id,
            vec![serde_json::from_value(feature).unwrap()],
        ))
    }

    fn boundary_click(code: &str) -> SurfaceEvent {
        click(
            "constituencies-fill",
            json!({
                "type": "Feature",
                "geometry": null,
                "properties": { "PCON24CD": code }
            }),
        )
    }

    fn count_state(map: &ReportMap<SceneSurface>, code: &str) -> Option<f64> {
        let tileset = map.registry().get(TilesetKind::Constituency).unwrap();
        map.surface()
            .feature_state(&feature_target(tileset, code))
            .and_then(|s| s.get(COUNT_STATE_KEY).copied())
    }

    #[test]
    fn mount_registers_every_tileset_and_the_selected_layer() {
        let mut map = ReportMap::new(SceneSurface::new(), MapConfig::default(), "").unwrap();
        map.mount().unwrap();
        map.mount().unwrap();

        let scene = map.surface();
        for source in ["regions", "constituencies", "wards"] {
            assert!(matches!(
                scene.source(source).unwrap().spec,
                SourceSpec::Vector { .. }
            ));
            assert!(scene.layer(&format!("{source}-fill")).is_some());
            assert!(scene.layer(&format!("{source}-labels")).is_some());
        }
        assert_eq!(
            scene.layers().last().map(|l| l.id.as_str()),
            Some(layer::SELECTED_RECORD_ID)
        );
        assert!(scene.is_subscribed("constituencies-fill", PointerEventKind::Click));
        assert!(!scene.is_subscribed("regions-fill", PointerEventKind::Click));
    }

    #[test]
    fn feature_state_waits_for_load_and_applies_once() {
        let mut map = ReportMap::new(SceneSurface::new(), MapConfig::default(), "").unwrap();
        let request = map.begin_request();
        map.apply_analytics(request, &analytics()).unwrap();

        assert_eq!(map.surface().feature_state_writes(), 0);
        assert_eq!(map.pending_feature_states(), 3);

        map.surface_mut().mark_source_loaded("constituencies");
        map.handle_event(SurfaceEvent::SourceLoaded {
            source_id: "constituencies".to_string(),
        })
        .unwrap();
        assert_eq!(map.surface().feature_state_writes(), 2);
        assert_eq!(count_state(&map, CODE), Some(12.0));

        map.surface_mut().mark_all_loaded();
        map.handle_event(SurfaceEvent::Load).unwrap();
        map.handle_event(SurfaceEvent::Load).unwrap();
        assert_eq!(map.surface().feature_state_writes(), 3);
        assert_eq!(map.pending_feature_states(), 0);
    }

    #[test]
    fn fill_paint_follows_the_analytics() {
        let map = loaded_map("");
        let fill = map.surface().layer("constituencies-fill").unwrap();
        let scales = map.scales(TilesetKind::Constituency).unwrap();

        assert_eq!(
            fill.paint["fill-color"],
            paint::fill_color_expression(scales)
        );
        assert!((scales.color_scale.domain_min - 3.0).abs() < f64::EPSILON);
        assert!((scales.color_scale.domain_max - 12.0).abs() < f64::EPSILON);

        let SourceSpec::Geojson { data } = &map.surface().source("constituencies-labels").unwrap().spec
        else {
            panic!("expected label source");
        };
        assert_eq!(data.features.len(), 1);
    }

    #[test]
    fn clicking_a_constituency_selects_it_and_fits_bounds() {
        let mut map = loaded_map("");
        let effects = map.handle_event(boundary_click(CODE)).unwrap();

        assert_eq!(map.selection().selected_area_code.as_deref(), Some(CODE));
        let camera = map.surface().camera().unwrap();
        assert_eq!(camera.bounds, BoundingBox::new(-0.08, 51.51, -0.02, 51.54));
        assert!((camera.options.max_zoom - 9.9).abs() < 1e-9);
        assert!(map.view().zoom <= 9.9);

        assert!(effects.contains(&SelectionEffect::OpenAreaPanel));
        assert_eq!(map.panel().tab, PanelTab::Selected);
        assert_eq!(map.fragment(), "#constituency=E14000530");

        let outline = map.surface().layer("constituencies-selected").unwrap();
        assert_eq!(outline.filter, Some(json!(["==", ["get", "PCON24CD"], CODE])));

        let detail = map.area_detail().unwrap();
        assert_eq!(detail.count, Some(12));
        assert_eq!(detail.nation, Some(gss::Nation::England));
    }

    #[test]
    fn clicked_geometry_is_the_fallback_for_bounds() {
        let mut map = loaded_map("");
        map.handle_event(click(
            "constituencies-fill",
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.4, 50.8], [0.6, 50.8], [0.6, 50.9], [0.4, 50.8]]]
                },
                "properties": { "PCON24CD": "E14000531" }
            }),
        ))
        .unwrap();

        let camera = map.surface().camera().unwrap();
        assert_eq!(camera.bounds, BoundingBox::new(0.4, 50.8, 0.6, 50.9));
    }

    #[test]
    fn fragment_restores_the_selected_area() {
        let map = loaded_map("#constituency=E14000530");
        assert_eq!(map.selection().selected_area_code.as_deref(), Some(CODE));
        assert!(map.surface().camera().is_none());

        let outline = map.surface().layer("constituencies-selected").unwrap();
        assert_eq!(outline.filter, Some(json!(["==", ["get", "PCON24CD"], CODE])));
    }

    #[test]
    fn marker_layers_follow_layer_order() {
        let map = loaded_map("");
        let scene = map.surface();

        assert_eq!(
            scene.layer("records-members-markers").unwrap().kind,
            LayerKind::Symbol
        );
        assert_eq!(
            scene.layer("records-events-markers").unwrap().kind,
            LayerKind::Symbol
        );
        assert_eq!(
            scene.layer("records-petitions-markers").unwrap().kind,
            LayerKind::Circle
        );
        assert_eq!(
            scene.layers().last().map(|l| l.id.as_str()),
            Some(layer::SELECTED_RECORD_ID)
        );
        assert_eq!(map.legend().markers.len(), 3);
    }

    #[test]
    fn clicking_a_marker_selects_the_record() {
        let mut map = loaded_map("");
        let request = map.begin_request();
        map.apply_layer_points(request, points("members")).unwrap();

        let feature = points("members").points.features[0].clone();
        let effects = map
            .handle_event(SurfaceEvent::Pointer(PointerEvent::on_layer(
                PointerEventKind::Click,
                "records-members-markers",
                vec![feature],
            )))
            .unwrap();
        assert_eq!(effects, vec![SelectionEffect::RecordChanged]);

        let record = map.selected_record().unwrap();
        assert_eq!(record.record_id, "rec-1");

        let scene = map.surface();
        assert_eq!(
            scene.layer("records-members-markers").unwrap().filter,
            Some(json!(["!=", ["to-string", ["get", "id"]], "rec-1"]))
        );
        assert_eq!(scene.layer("records-events-markers").unwrap().filter, None);

        let popup = map.popup().unwrap();
        assert_eq!(popup.title, "Ada");
        assert_eq!(
            popup.url.as_deref(),
            Some("https://crm.example.org/records/rec-1")
        );
    }

    #[test]
    fn background_click_clears_only_the_record() {
        let mut map = loaded_map("");
        map.handle_event(boundary_click(CODE)).unwrap();
        map.handle_event(click(
            "records-members-markers",
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [0.0, 51.0] },
                "properties": { "id": 5 }
            }),
        ))
        .unwrap();
        assert!(map.selected_record().is_some());

        map.handle_event(SurfaceEvent::Pointer(PointerEvent::background_click()))
            .unwrap();
        assert!(map.selected_record().is_none());
        assert_eq!(map.selection().selected_area_code.as_deref(), Some(CODE));
        assert_eq!(
            map.surface().layer("records-members-markers").unwrap().filter,
            None
        );
    }

    #[test]
    fn record_without_id_is_ignored() {
        let mut map = loaded_map("");
        let effects = map
            .handle_event(click(
                "records-members-markers",
                json!({
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [0.0, 51.0] },
                    "properties": { "name": "No id" }
                }),
            ))
            .unwrap();

        assert!(effects.is_empty());
        assert!(map.selected_record().is_none());
    }

    #[test]
    fn stale_responses_are_dropped() {
        let mut map = ReportMap::new(SceneSurface::new(), MapConfig::default(), "").unwrap();
        let older = map.begin_request();
        let newer = map.begin_request();

        let mut latest = analytics();
        latest.imported_data_count_by_constituency.truncate(1);
        assert_eq!(
            map.apply_analytics(newer, &latest).unwrap(),
            ApplyStatus::Applied
        );
        assert_eq!(
            map.apply_analytics(older, &analytics()).unwrap(),
            ApplyStatus::Stale
        );
        assert_eq!(map.index(TilesetKind::Constituency).unwrap().len(), 1);

        let first = map.begin_request();
        let second = map.begin_request();
        map.apply_layer_points(second, points("members")).unwrap();
        assert_eq!(
            map.apply_layer_points(first, LayerPoints::empty("members"))
                .unwrap(),
            ApplyStatus::Stale
        );
        assert_eq!(map.layers()[0].points.len(), 1);
    }

    #[test]
    fn points_for_unknown_source_are_rejected() {
        let mut map = loaded_map("");
        let request = map.begin_request();
        assert!(matches!(
            map.apply_layer_points(request, points("unknown")),
            Err(MapError::UnknownLayerSource { .. })
        ));
    }

    #[test]
    fn removed_layers_lose_their_markers() {
        let mut map = loaded_map("");
        let mut next = analytics();
        next.layers.remove(0);
        let request = map.begin_request();
        map.apply_analytics(request, &next).unwrap();

        let scene = map.surface();
        assert!(scene.layer("records-members-markers").is_none());
        assert_eq!(
            scene.layer("records-events-markers").unwrap().kind,
            LayerKind::Symbol
        );
        assert_eq!(
            scene.layer("records-petitions-markers").unwrap().kind,
            LayerKind::Symbol
        );
    }

    #[test]
    fn selected_record_is_cleared_when_its_layer_is_removed() {
        let mut map = loaded_map("");
        let request = map.begin_request();
        map.apply_layer_points(request, points("members")).unwrap();
        let feature = points("members").points.features[0].clone();
        map.handle_event(SurfaceEvent::Pointer(PointerEvent::on_layer(
            PointerEventKind::Click,
            "records-members-markers",
            vec![feature],
        )))
        .unwrap();
        assert!(map.selected_record().is_some());

        let mut next = analytics();
        next.layers.remove(0);
        let request = map.begin_request();
        map.apply_analytics(request, &next).unwrap();

        assert!(map.selected_record().is_none());
        assert!(map.popup().is_none());
        let SourceSpec::Geojson { data } = &map
            .surface()
            .source(layer::SELECTED_RECORD_ID)
            .unwrap()
            .spec
        else {
            panic!("selected record source is not geojson");
        };
        assert!(data.features.is_empty());
    }

    #[test]
    fn selected_record_survives_when_its_layer_is_kept() {
        let mut map = loaded_map("");
        let request = map.begin_request();
        map.apply_layer_points(request, points("events")).unwrap();
        let feature = points("events").points.features[0].clone();
        map.handle_event(SurfaceEvent::Pointer(PointerEvent::on_layer(
            PointerEventKind::Click,
            "records-events-markers",
            vec![feature],
        )))
        .unwrap();

        let mut next = analytics();
        next.layers.remove(0);
        let request = map.begin_request();
        map.apply_analytics(request, &next).unwrap();

        assert_eq!(map.selected_record().unwrap().source_id, "events");
        assert_eq!(
            map.surface().layer("records-events-markers").unwrap().filter,
            Some(json!(["!=", ["to-string", ["get", "id"]], "rec-1"]))
        );
    }

    #[test]
    fn hover_toggles_cursor() {
        let mut map = loaded_map("");
        map.handle_event(SurfaceEvent::Pointer(PointerEvent::on_layer(
            PointerEventKind::MouseOver,
            "records-members-markers",
            Vec::new(),
        )))
        .unwrap();
        assert_eq!(map.surface().cursor(), Cursor::Pointer);

        map.handle_event(SurfaceEvent::Pointer(PointerEvent::on_layer(
            PointerEventKind::MouseLeave,
            "records-members-markers",
            Vec::new(),
        )))
        .unwrap();
        assert_eq!(map.surface().cursor(), Cursor::Default);
    }

    #[test]
    fn closing_the_panel_clears_the_area() {
        let mut map = loaded_map("#constituency=E14000530&view=table");
        let effects = map.clear_area().unwrap();

        assert!(effects.contains(&SelectionEffect::CloseAreaPanel));
        assert_eq!(map.fragment(), "#view=table");
        let outline = map.surface().layer("constituencies-selected").unwrap();
        assert_eq!(outline.filter, Some(json!(["==", ["get", "PCON24CD"], null])));
    }

    #[test]
    fn snapshot_serializes() {
        let map = loaded_map("#constituency=E14000530");
        let value = serde_json::to_value(map.snapshot()).unwrap();

        assert_eq!(value["selection"]["selectedAreaCode"], json!(CODE));
        assert_eq!(value["area"]["count"], json!(12));
        assert_eq!(value["pendingFeatureStates"], json!(0));
        assert!(value["scene"]["layers"].as_array().unwrap().len() > 12);
    }
}
