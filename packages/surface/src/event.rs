//! Events delivered by the render surface to the map engine.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Pointer event types the engine subscribes to.
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
pub enum PointerEventKind {
    /// Primary button click.
    Click,
    /// Pointer entered a feature.
    MouseOver,
    /// Pointer left a feature.
    MouseLeave,
}

/// A pointer event.
///
/// `layer_id` is the subscribed layer the event was dispatched for;
/// `None` means the event hit the map background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerEvent {
    /// Event type.
    pub kind: PointerEventKind,
    /// Layer the event was dispatched for.
    #[serde(default)]
    pub layer_id: Option<String>,
    /// Features under the pointer on that layer, topmost first.
    #[serde(default)]
    pub features: Vec<geojson::Feature>,
    /// Pointer location as `[longitude, latitude]`.
    #[serde(default)]
    pub lng_lat: Option<[f64; 2]>,
}

impl PointerEvent {
    /// A click on the map background.
    #[must_use]
    pub const fn background_click() -> Self {
        Self {
            kind: PointerEventKind::Click,
            layer_id: None,
            features: Vec::new(),
            lng_lat: None,
        }
    }

    /// An event on a layer with the given features.
    #[must_use]
    pub fn on_layer(
        kind: PointerEventKind,
        layer_id: impl Into<String>,
        features: Vec<geojson::Feature>,
    ) -> Self {
        Self {
            kind,
            layer_id: Some(layer_id.into()),
            features,
            lng_lat: None,
        }
    }

    /// Returns `true` if no feature was under the pointer.
    #[must_use]
    pub fn is_background(&self) -> bool {
        self.layer_id.is_none() || self.features.is_empty()
    }
}

/// Everything the surface can tell the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SurfaceEvent {
    /// The whole surface (style and all sources) finished loading.
    Load,
    /// A single source finished loading.
    SourceLoaded {
        /// Source id.
        #[serde(rename = "sourceId")]
        source_id: String,
    },
    /// The camera finished moving.
    ViewChanged {
        /// `[longitude, latitude]` of the view center.
        center: [f64; 2],
        /// Zoom level.
        zoom: f64,
    },
    /// A pointer event on a subscribed layer or the background.
    Pointer(PointerEvent),
}
