//! Map configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! fit_padding = 40.0
//! stale_state = "clear"
//! tilesets = "config/tilesets.toml"
//!
//! [initial_view]
//! center = [-1.5, 53.0]
//! zoom = 6.0
//!
//! [choropleth]
//! fill_opacity = 0.5
//!
//! [markers]
//! palette = ["#e4572e", "#17bebb"]
//! ```

use std::path::{Path, PathBuf};

use report_map_choropleth::{feature_state::StaleStatePolicy, paint::ChoroplethStyle};
use report_map_geography::{GeoError, tilesets::TilesetRegistry};
use report_map_markers::layer::MarkerStyle;
use serde::{Deserialize, Serialize};

use crate::ViewState;

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Tileset override failed to load.
    #[error("Geography error: {0}")]
    Geo(#[from] GeoError),
}

/// Report map settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Camera before any interaction.
    pub initial_view: ViewState,
    /// Padding in pixels when fitting the camera to an area.
    pub fit_padding: f64,
    /// What happens to feature state of areas missing from a refresh.
    pub stale_state: StaleStatePolicy,
    pub choropleth: ChoroplethStyle,
    pub markers: MarkerStyle,
    /// Tileset definitions replacing the built-in ones.
    pub tilesets: Option<PathBuf>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            initial_view: ViewState::default(),
            fit_padding: 20.0,
            stale_state: StaleStatePolicy::default(),
            choropleth: ChoroplethStyle::default(),
            markers: MarkerStyle::default(),
            tilesets: None,
        }
    }
}

impl MapConfig {
    /// Parses a configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the TOML is malformed.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(toml_str)?)
    }

    /// Reads a configuration file. A relative `tilesets` path is resolved
    /// against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_toml_str(&std::fs::read_to_string(path)?)?;
        if let (Some(tilesets), Some(dir)) = (&config.tilesets, path.parent())
            && tilesets.is_relative()
        {
            config.tilesets = Some(dir.join(tilesets));
        }
        log::info!("Loaded map configuration from {}", path.display());
        Ok(config)
    }

    /// Reads the file named by `REPORT_MAP_CONFIG`, or returns the
    /// defaults when the variable is unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the named file cannot be loaded.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("REPORT_MAP_CONFIG") {
            Ok(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    /// The tileset registry this configuration selects.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Geo`] if the override file is invalid.
    pub fn registry(&self) -> Result<TilesetRegistry, ConfigError> {
        Ok(match &self.tilesets {
            Some(path) => TilesetRegistry::load(path)?,
            None => TilesetRegistry::embedded(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = MapConfig::from_toml_str("").unwrap();
        assert_eq!(config, MapConfig::default());
        assert_eq!(config.stale_state, StaleStatePolicy::Retain);
        assert_eq!(config.registry().unwrap(), TilesetRegistry::embedded());
    }

    #[test]
    fn overrides_nested_sections() {
        let config = MapConfig::from_toml_str(
            r##"
            stale_state = "clear"

            [initial_view]
            center = [-3.2, 55.9]
            zoom = 7.0

            [choropleth]
            fill_opacity = 0.4

            [markers]
            palette = ["#e4572e"]
            "##,
        )
        .unwrap();

        assert_eq!(config.stale_state, StaleStatePolicy::Clear);
        assert!((config.initial_view.zoom - 7.0).abs() < f64::EPSILON);
        assert!((config.choropleth.fill_opacity - 0.4).abs() < f64::EPSILON);
        assert!((config.choropleth.label_size - 14.0).abs() < f64::EPSILON);
        assert_eq!(config.markers.palette, ["#e4572e"]);
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(matches!(
            MapConfig::from_toml_str(r#"stale_state = "forget""#),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn missing_tileset_override_is_an_error() {
        let config = MapConfig {
            tilesets: Some(PathBuf::from("/nonexistent/tilesets.toml")),
            ..MapConfig::default()
        };
        assert!(matches!(config.registry(), Err(ConfigError::Geo(_))));
    }
}
