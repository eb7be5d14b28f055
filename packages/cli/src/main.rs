#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command line entry point for the report map.
//!
//! `scene` renders a report into the in-memory surface and prints the
//! resulting snapshot as JSON; `serve` starts the API server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use report_map::MapConfig;
use report_map_analytics::{AnalyticsSource, FileAnalyticsSource, HttpAnalyticsSource};
use report_map_server::AppState;
use report_map_surface::SurfaceEvent;

/// Report map toolchain.
#[derive(Parser)]
#[command(name = "report_map")]
#[command(about = "Choropleth and marker map for report analytics")]
struct Cli {
    /// Map configuration file. Falls back to `REPORT_MAP_CONFIG`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding `analytics.json` and `layers/<id>.json`.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Analytics API base URL. Takes precedence over `--data-dir`.
    #[arg(long)]
    analytics_url: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the rendered map as JSON.
    Scene {
        /// URL fragment to restore the selection from.
        #[arg(long, default_value = "")]
        fragment: String,

        /// Treat every source as loaded so feature state is applied.
        #[arg(long)]
        loaded: bool,

        /// GSS code of a constituency to select.
        #[arg(long)]
        select: Option<String>,

        /// Pretty-print the JSON.
        #[arg(long)]
        pretty: bool,
    },

    /// Start the API server.
    Serve,
}

impl Cli {
    fn map_config(&self) -> Result<MapConfig, report_map::ConfigError> {
        match &self.config {
            Some(path) => MapConfig::load(path),
            None => MapConfig::from_env(),
        }
    }

    fn analytics_source(&self) -> Arc<dyn AnalyticsSource> {
        match &self.analytics_url {
            Some(url) => Arc::new(HttpAnalyticsSource::new(url.clone())),
            None => Arc::new(FileAnalyticsSource::new(self.data_dir.clone())),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let cli = Cli::parse();
    let config = cli.map_config()?;
    let source = cli.analytics_source();

    match cli.command {
        Commands::Scene {
            fragment,
            loaded,
            select,
            pretty,
        } => {
            let state = AppState::new(config, source, &fragment)?;
            let summary = report_map_server::refresh(&state).await?;
            log::debug!("Refresh: {} layers", summary.layers.len());

            let mut map = state.lock()?;
            if loaded {
                map.surface_mut().mark_all_loaded();
                map.handle_event(SurfaceEvent::Load)?;
            }
            if let Some(code) = select {
                map.select_constituency(&code)?;
            }

            let snapshot = map.snapshot();
            let json = if pretty {
                serde_json::to_string_pretty(&snapshot)?
            } else {
                serde_json::to_string(&snapshot)?
            };
            println!("{json}");
        }
        Commands::Serve => {
            // The server uses actix-web's runtime, so it runs in a
            // blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(move || {
                actix_web::rt::System::new().block_on(report_map_server::run_server(config, source))
            })
            .await??;
        }
    }

    Ok(())
}
