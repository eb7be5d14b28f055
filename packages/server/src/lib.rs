#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the report map.
//!
//! Hosts one [`ReportMap`] over an in-memory [`SceneSurface`]. A browser
//! (or any other client) posts surface events to `/api/events` and reads
//! back the resulting scene, selection and legend. Analytics are pulled
//! from an [`AnalyticsSource`] on startup and on `POST /api/refresh`.

mod handlers;

use std::sync::{Arc, Mutex, MutexGuard};

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use report_map::{MapConfig, MapError, ReportMap};
use report_map_analytics::{AnalyticsError, AnalyticsSource};
use report_map_server_models::{LayerRefresh, RefreshSummary};
use report_map_surface::scene::SceneSurface;

/// Errors that can occur while serving the map.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Fetching analytics failed.
    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    /// The map rejected an update.
    #[error("Map error: {0}")]
    Map(#[from] MapError),

    /// A handler panicked while holding the map.
    #[error("Map state is poisoned")]
    Poisoned,
}

/// Shared application state.
pub struct AppState {
    /// The map session. A `Mutex` because the surface is single-threaded
    /// and every call mutates it.
    pub map: Mutex<ReportMap<SceneSurface>>,
    /// Where analytics and points come from.
    pub source: Arc<dyn AnalyticsSource>,
}

impl AppState {
    /// Creates state for a fresh map.
    ///
    /// # Errors
    ///
    /// Returns [`MapError`] if the configured tilesets cannot be loaded.
    pub fn new(
        config: MapConfig,
        source: Arc<dyn AnalyticsSource>,
        fragment: &str,
    ) -> Result<Self, MapError> {
        let mut map = ReportMap::new(SceneSurface::new(), config, fragment)?;
        map.mount()?;

        Ok(Self {
            map: Mutex::new(map),
            source,
        })
    }

    /// Locks the map.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Poisoned`] if a previous holder panicked.
    pub fn lock(&self) -> Result<MutexGuard<'_, ReportMap<SceneSurface>>, ServerError> {
        self.map.lock().map_err(|_| ServerError::Poisoned)
    }
}

/// Fetches analytics and every layer's points and applies them.
///
/// The lock is released while fetching, so events keep flowing; request
/// ids make sure an overtaken response is dropped instead of applied.
/// A failed points fetch is reported per layer without failing the
/// refresh.
///
/// # Errors
///
/// Returns [`ServerError`] if the analytics fetch fails or the map
/// rejects the analytics.
pub async fn refresh(state: &AppState) -> Result<RefreshSummary, ServerError> {
    let request = state.lock()?.begin_request();
    let analytics = state.source.fetch_report().await?;

    let (status, sources) = {
        let mut map = state.lock()?;
        let status = map.apply_analytics(request, &analytics)?;
        let sources: Vec<String> = map
            .layers()
            .iter()
            .map(|l| l.external_source_id.clone())
            .collect();
        (status, sources)
    };

    let mut layers = Vec::with_capacity(sources.len());
    for source_id in sources {
        let request = state.lock()?.begin_request();
        let refresh = match state.source.fetch_layer_points(&source_id).await {
            Ok(mut points) => {
                if points.external_source_id.is_empty() {
                    points.external_source_id.clone_from(&source_id);
                }
                let count = points.points.features.len();
                match state.lock()?.apply_layer_points(request, points) {
                    Ok(status) => LayerRefresh {
                        external_source_id: source_id,
                        status: Some(status),
                        points: count,
                        error: None,
                    },
                    Err(e) => failed_layer(source_id, &e),
                }
            }
            Err(e) => failed_layer(source_id, &e),
        };
        layers.push(refresh);
    }

    log::info!(
        "Refreshed report from {}: analytics {status:?}, {} layers",
        state.source.describe(),
        layers.len()
    );

    Ok(RefreshSummary {
        analytics: status,
        layers,
    })
}

fn failed_layer(external_source_id: String, error: &dyn std::error::Error) -> LayerRefresh {
    log::warn!("Failed to refresh points for {external_source_id}: {error}");
    LayerRefresh {
        external_source_id,
        status: None,
        points: 0,
        error: Some(error.to_string()),
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/scene", web::get().to(handlers::snapshot))
            .route("/legend", web::get().to(handlers::legend))
            .route("/popup", web::get().to(handlers::popup))
            .route("/events", web::post().to(handlers::event))
            .route("/refresh", web::post().to(handlers::refresh))
            .route("/surface/loaded", web::post().to(handlers::loaded))
            .route("/selection", web::get().to(handlers::selection))
            .route("/selection/area", web::post().to(handlers::select_area))
            .route("/selection/area", web::delete().to(handlers::clear_area))
            .route("/selection/record", web::delete().to(handlers::clear_record))
            .route("/selection/panel", web::put().to(handlers::panel_tab)),
    );
}

/// Starts the report map API server.
///
/// Builds the map, runs an initial refresh and serves the API on
/// `BIND_ADDR:PORT` (default `127.0.0.1:8080`). The caller provides the
/// async runtime and initializes logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the map cannot be built, or the
/// HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(
    config: MapConfig,
    source: Arc<dyn AnalyticsSource>,
) -> std::io::Result<()> {
    let fragment = std::env::var("REPORT_MAP_FRAGMENT").unwrap_or_default();
    let state = AppState::new(config, source, &fragment).map_err(std::io::Error::other)?;

    log::info!("Loading report from {}...", state.source.describe());
    if let Err(e) = refresh(&state).await {
        log::error!("Initial refresh failed: {e}");
    }

    let state = web::Data::new(state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
