//! In-memory render surface that records the scene it is asked to draw.
//!
//! Vector sources start unloaded and reject feature-state writes until
//! [`SceneSurface::mark_source_loaded`] is called, mirroring a real
//! surface that is still fetching tiles. Inline `GeoJSON` sources are
//! loaded as soon as they are added.

use std::collections::{BTreeMap, BTreeSet};

use report_map_geography_models::BoundingBox;
use report_map_style_models::{LayerSpec, SourceSpec};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::{
    Cursor, FeatureState, FeatureTarget, FitBoundsOptions, PointerEventKind, RenderSurface,
    SurfaceError,
};

/// A registered source and its load status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSource {
    /// Source definition.
    pub spec: SourceSpec,
    /// Whether the surface considers the source loaded.
    pub loaded: bool,
}

/// Last camera move requested through [`RenderSurface::fit_bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRequest {
    /// Requested bounds.
    pub bounds: BoundingBox,
    /// Requested options.
    pub options: FitBoundsOptions,
}

/// A pointer event subscription.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Layer id.
    pub layer_id: String,
    /// Event type.
    pub kind: PointerEventKind,
}

/// Recording render surface.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSurface {
    sources: BTreeMap<String, SceneSource>,
    layers: Vec<LayerSpec>,
    #[serde(serialize_with = "serialize_feature_states")]
    feature_states: BTreeMap<FeatureTarget, FeatureState>,
    camera: Option<CameraRequest>,
    cursor: Cursor,
    subscriptions: BTreeSet<Subscription>,
    #[serde(skip)]
    feature_state_writes: usize,
}

impl SceneSurface {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a source as loaded. Returns `false` if the source is unknown.
    pub fn mark_source_loaded(&mut self, source_id: &str) -> bool {
        self.sources.get_mut(source_id).is_some_and(|source| {
            source.loaded = true;
            true
        })
    }

    /// Marks every source as loaded and returns the ids that changed.
    pub fn mark_all_loaded(&mut self) -> Vec<String> {
        self.sources
            .iter_mut()
            .filter(|(_, source)| !source.loaded)
            .map(|(id, source)| {
                source.loaded = true;
                id.clone()
            })
            .collect()
    }

    /// Returns a registered source.
    #[must_use]
    pub fn source(&self, id: &str) -> Option<&SceneSource> {
        self.sources.get(id)
    }

    /// Returns a layer by id.
    #[must_use]
    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Layers in draw order, bottom first.
    #[must_use]
    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    /// Position of a layer in draw order.
    #[must_use]
    pub fn layer_position(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    /// Last camera request, if any.
    #[must_use]
    pub const fn camera(&self) -> Option<&CameraRequest> {
        self.camera.as_ref()
    }

    /// Current cursor.
    #[must_use]
    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Returns `true` if the layer is subscribed to `kind` events.
    #[must_use]
    pub fn is_subscribed(&self, layer_id: &str, kind: PointerEventKind) -> bool {
        self.subscriptions.contains(&Subscription {
            layer_id: layer_id.to_string(),
            kind,
        })
    }

    /// Number of successful feature-state writes since creation.
    #[must_use]
    pub const fn feature_state_writes(&self) -> usize {
        self.feature_state_writes
    }

    /// Number of features that currently hold state.
    #[must_use]
    pub fn feature_state_len(&self) -> usize {
        self.feature_states.len()
    }

    fn ensure_loaded(&self, source_id: &str) -> Result<(), SurfaceError> {
        match self.sources.get(source_id) {
            None => Err(SurfaceError::UnknownSource {
                source_id: source_id.to_string(),
            }),
            Some(source) if !source.loaded => Err(SurfaceError::SourceNotLoaded {
                source_id: source_id.to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    fn layer_mut(&mut self, layer_id: &str) -> Result<&mut LayerSpec, SurfaceError> {
        self.layers
            .iter_mut()
            .find(|l| l.id == layer_id)
            .ok_or_else(|| SurfaceError::UnknownLayer {
                layer_id: layer_id.to_string(),
            })
    }
}

impl RenderSurface for SceneSurface {
    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<(), SurfaceError> {
        if self.sources.contains_key(id) {
            return Err(SurfaceError::DuplicateSource {
                source_id: id.to_string(),
            });
        }
        let loaded = source.is_inline();
        self.sources.insert(
            id.to_string(),
            SceneSource {
                spec: source,
                loaded,
            },
        );
        Ok(())
    }

    fn set_source_data(
        &mut self,
        id: &str,
        data: geojson::FeatureCollection,
    ) -> Result<(), SurfaceError> {
        let source = self
            .sources
            .get_mut(id)
            .ok_or_else(|| SurfaceError::UnknownSource {
                source_id: id.to_string(),
            })?;

        match &mut source.spec {
            SourceSpec::Geojson { data: existing } => {
                *existing = data;
                Ok(())
            }
            SourceSpec::Vector { .. } => Err(SurfaceError::NotInline {
                source_id: id.to_string(),
            }),
        }
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), SurfaceError> {
        if self.has_layer(&layer.id) {
            return Err(SurfaceError::DuplicateLayer { layer_id: layer.id });
        }
        if !self.sources.contains_key(&layer.source) {
            return Err(SurfaceError::UnknownSource {
                source_id: layer.source,
            });
        }
        self.layers.push(layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        let position = self
            .layer_position(id)
            .ok_or_else(|| SurfaceError::UnknownLayer {
                layer_id: id.to_string(),
            })?;
        self.layers.remove(position);
        self.subscriptions.retain(|s| s.layer_id != id);
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    fn set_filter(&mut self, layer_id: &str, filter: Option<Value>) -> Result<(), SurfaceError> {
        self.layer_mut(layer_id)?.filter = filter;
        Ok(())
    }

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        key: &str,
        value: Value,
    ) -> Result<(), SurfaceError> {
        self.layer_mut(layer_id)?
            .paint
            .insert(key.to_string(), value);
        Ok(())
    }

    fn set_feature_state(
        &mut self,
        target: &FeatureTarget,
        state: &FeatureState,
    ) -> Result<(), SurfaceError> {
        self.ensure_loaded(&target.source)?;
        let entry = self.feature_states.entry(target.clone()).or_default();
        entry.extend(state.iter().map(|(k, v)| (k.clone(), *v)));
        self.feature_state_writes += 1;
        Ok(())
    }

    fn feature_state(&self, target: &FeatureTarget) -> Option<FeatureState> {
        self.feature_states.get(target).cloned()
    }

    fn remove_feature_state(&mut self, target: &FeatureTarget) -> Result<(), SurfaceError> {
        self.ensure_loaded(&target.source)?;
        self.feature_states.remove(target);
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: BoundingBox, options: FitBoundsOptions) {
        log::debug!("fit_bounds {bounds:?} max_zoom={}", options.max_zoom);
        self.camera = Some(CameraRequest { bounds, options });
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    fn subscribe(&mut self, layer_id: &str, kind: PointerEventKind) {
        self.subscriptions.insert(Subscription {
            layer_id: layer_id.to_string(),
            kind,
        });
    }
}

/// Serializes feature states as a list, since JSON object keys must be
/// strings.
fn serialize_feature_states<S>(
    states: &BTreeMap<FeatureTarget, FeatureState>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    #[derive(Serialize)]
    struct Entry<'a> {
        #[serde(flatten)]
        target: &'a FeatureTarget,
        state: &'a FeatureState,
    }

    serializer.collect_seq(
        states
            .iter()
            .map(|(target, state)| Entry { target, state }),
    )
}
