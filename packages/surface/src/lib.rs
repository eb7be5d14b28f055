#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Render surface contract.
//!
//! The map engine never paints anything itself. It registers sources and
//! layers, writes per-feature state, moves the camera and subscribes to
//! pointer events through [`RenderSurface`]. The surface reports back
//! through [`SurfaceEvent`]s that the host feeds into the engine.
//!
//! [`scene::SceneSurface`] is an in-memory implementation that records
//! every call so a scene can be inspected, serialized or tested.

pub mod event;
pub mod scene;

use std::collections::BTreeMap;

use report_map_geography_models::BoundingBox;
use report_map_style_models::{LayerSpec, SourceSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};

pub use event::{PointerEvent, PointerEventKind, SurfaceEvent};

/// Numeric per-feature state, e.g. `{ "count": 12.0 }`.
pub type FeatureState = BTreeMap<String, f64>;

/// Identifies one feature inside a source for feature-state writes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureTarget {
    /// Source id.
    pub source: String,
    /// Layer inside a vector source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<String>,
    /// Promoted feature id (the value of the promotion key).
    pub id: String,
}

/// Camera options for [`RenderSurface::fit_bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitBoundsOptions {
    /// Upper zoom limit for the fitted camera.
    pub max_zoom: f64,
    /// Padding around the bounds in pixels.
    pub padding: f64,
}

/// Mouse cursor shown over the map canvas.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Cursor {
    /// Browser default cursor.
    #[default]
    Default,
    /// Hand cursor over interactive features.
    Pointer,
}

/// Errors reported by a render surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    /// The source has not been added to the surface yet.
    #[error("Source '{source_id}' does not exist")]
    UnknownSource {
        /// Source id.
        source_id: String,
    },

    /// The source exists but its data has not loaded yet.
    #[error("Source '{source_id}' is not loaded")]
    SourceNotLoaded {
        /// Source id.
        source_id: String,
    },

    /// A source with this id was already added.
    #[error("Source '{source_id}' already exists")]
    DuplicateSource {
        /// Source id.
        source_id: String,
    },

    /// The source is not a `GeoJSON` source.
    #[error("Source '{source_id}' does not accept inline data")]
    NotInline {
        /// Source id.
        source_id: String,
    },

    /// The layer has not been added to the surface.
    #[error("Layer '{layer_id}' does not exist")]
    UnknownLayer {
        /// Layer id.
        layer_id: String,
    },

    /// A layer with this id was already added.
    #[error("Layer '{layer_id}' already exists")]
    DuplicateLayer {
        /// Layer id.
        layer_id: String,
    },
}

impl SurfaceError {
    /// Returns `true` for errors that go away once the surface finishes
    /// loading (missing or unloaded source).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::UnknownSource { .. } | Self::SourceNotLoaded { .. }
        )
    }
}

/// A stateful map rendering surface.
///
/// All calls happen on the single UI event loop, so implementations need
/// no internal locking.
pub trait RenderSurface {
    /// Registers a data source.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::DuplicateSource`] if the id is taken.
    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<(), SurfaceError>;

    /// Replaces the data of an inline `GeoJSON` source.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the source is missing or not inline.
    fn set_source_data(
        &mut self,
        id: &str,
        data: geojson::FeatureCollection,
    ) -> Result<(), SurfaceError>;

    /// Returns `true` if the source has been added.
    fn has_source(&self, id: &str) -> bool;

    /// Appends a layer on top of the existing ones.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::DuplicateLayer`] if the id is taken.
    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), SurfaceError>;

    /// Removes a layer.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownLayer`] if the layer is missing.
    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError>;

    /// Returns `true` if the layer has been added.
    fn has_layer(&self, id: &str) -> bool;

    /// Replaces a layer's filter.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownLayer`] if the layer is missing.
    fn set_filter(&mut self, layer_id: &str, filter: Option<Value>) -> Result<(), SurfaceError>;

    /// Sets one paint property on a layer.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::UnknownLayer`] if the layer is missing.
    fn set_paint_property(
        &mut self,
        layer_id: &str,
        key: &str,
        value: Value,
    ) -> Result<(), SurfaceError>;

    /// Merges `state` into the feature's state.
    ///
    /// # Errors
    ///
    /// Returns a transient [`SurfaceError`] if the source is missing or
    /// not loaded yet.
    fn set_feature_state(
        &mut self,
        target: &FeatureTarget,
        state: &FeatureState,
    ) -> Result<(), SurfaceError>;

    /// Reads a feature's state.
    fn feature_state(&self, target: &FeatureTarget) -> Option<FeatureState>;

    /// Clears a feature's state.
    ///
    /// # Errors
    ///
    /// Returns a transient [`SurfaceError`] if the source is missing or
    /// not loaded yet.
    fn remove_feature_state(&mut self, target: &FeatureTarget) -> Result<(), SurfaceError>;

    /// Moves the camera to show `bounds`.
    fn fit_bounds(&mut self, bounds: BoundingBox, options: FitBoundsOptions);

    /// Changes the canvas cursor.
    fn set_cursor(&mut self, cursor: Cursor);

    /// Asks the surface to deliver `kind` pointer events for `layer_id`.
    fn subscribe(&mut self, layer_id: &str, kind: PointerEventKind);

    /// Adds the layer on top, removing any existing layer with the same
    /// id first.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::remove_layer`] / [`Self::add_layer`].
    fn upsert_layer(&mut self, layer: LayerSpec) -> Result<(), SurfaceError> {
        if self.has_layer(&layer.id) {
            self.remove_layer(&layer.id)?;
        }
        self.add_layer(layer)
    }

    /// Adds an inline source or replaces its data if it already exists.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::add_source`] /
    /// [`Self::set_source_data`].
    fn upsert_geojson_source(
        &mut self,
        id: &str,
        features: Vec<geojson::Feature>,
    ) -> Result<(), SurfaceError> {
        match SourceSpec::geojson(features) {
            SourceSpec::Geojson { data } if self.has_source(id) => self.set_source_data(id, data),
            spec => self.add_source(id, spec),
        }
    }
}
