#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Choropleth rendering for boundary tilesets.
//!
//! Turns per-area counts into a color scale ([`scale`]), paints the
//! boundary layers with step expressions over per-feature state
//! ([`paint`]) and keeps that feature state in sync with the render
//! surface, deferring writes until a tileset's source has loaded
//! ([`feature_state`]).

pub mod color;
pub mod feature_state;
pub mod paint;
pub mod scale;
