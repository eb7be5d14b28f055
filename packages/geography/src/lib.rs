#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Area code index, boundary tileset registry and geometry helpers.
//!
//! The [`index::AreaCodeIndex`] joins GSS codes to their aggregate counts
//! and label anchor points. The [`tilesets::TilesetRegistry`] declares the
//! three boundary tilesets (region, constituency, ward) and the zoom
//! ranges over which the render surface shows each of them.

pub mod bounds;
pub mod index;
pub mod tilesets;

use thiserror::Error;

/// Errors that can occur while loading geography configuration.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Tileset definitions could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Tileset definition file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tileset definitions violate a registry invariant.
    #[error("Invalid tileset registry: {message}")]
    InvalidRegistry {
        /// Description of what went wrong.
        message: String,
    },
}
