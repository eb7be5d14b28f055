#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report map API server binary.
//!
//! Reads analytics from `ANALYTICS_URL` when set, otherwise from the
//! directory in `REPORT_MAP_DATA_DIR` (default `data`). Map settings come
//! from the TOML file named by `REPORT_MAP_CONFIG`.

use std::sync::Arc;

use report_map::MapConfig;
use report_map_analytics::{AnalyticsSource, FileAnalyticsSource, HttpAnalyticsSource};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = MapConfig::from_env().map_err(std::io::Error::other)?;

    let source: Arc<dyn AnalyticsSource> = match std::env::var("ANALYTICS_URL") {
        Ok(url) if !url.is_empty() => Arc::new(HttpAnalyticsSource::new(url)),
        _ => Arc::new(FileAnalyticsSource::new(
            std::env::var("REPORT_MAP_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
        )),
    };

    report_map_server::run_server(config, source).await
}
