//! HTTP handler functions for the report map API.

use actix_web::{HttpResponse, web};
use report_map::MapError;
use report_map_selection::SelectionEffect;
use report_map_server_models::{
    ApiEffects, ApiError, ApiHealth, ApiSelection, PanelTabRequest, SelectAreaRequest,
};
use report_map_surface::SurfaceEvent;
use serde::Deserialize;

use crate::{AppState, ServerError};

/// Query parameters for `POST /api/surface/loaded`.
#[derive(Debug, Deserialize)]
pub struct LoadedParams {
    /// Source that finished loading. Omit for the whole surface.
    pub source: Option<String>,
}

fn error_response(e: &ServerError) -> HttpResponse {
    match e {
        ServerError::Map(MapError::UnknownLayerSource { .. }) => {
            HttpResponse::NotFound().json(ApiError::new(e.to_string()))
        }
        ServerError::Analytics(_) => HttpResponse::BadGateway().json(ApiError::new(e.to_string())),
        _ => {
            log::error!("Request failed: {e}");
            HttpResponse::InternalServerError().json(ApiError::new(e.to_string()))
        }
    }
}

fn effects_response(result: Result<Vec<SelectionEffect>, ServerError>) -> HttpResponse {
    match result {
        Ok(effects) => HttpResponse::Ok().json(ApiEffects { effects }),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/scene`
///
/// The whole map: view, selection, legend and the recorded scene.
pub async fn snapshot(state: web::Data<AppState>) -> HttpResponse {
    match state.lock() {
        Ok(map) => HttpResponse::Ok().json(map.snapshot()),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/legend`
pub async fn legend(state: web::Data<AppState>) -> HttpResponse {
    match state.lock() {
        Ok(map) => HttpResponse::Ok().json(map.legend()),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/popup`
///
/// Popup for the selected record, or `null`.
pub async fn popup(state: web::Data<AppState>) -> HttpResponse {
    match state.lock() {
        Ok(map) => HttpResponse::Ok().json(map.popup()),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/selection`
pub async fn selection(state: web::Data<AppState>) -> HttpResponse {
    match state.lock() {
        Ok(map) => HttpResponse::Ok().json(ApiSelection {
            state: map.selection(),
            panel: map.panel(),
            fragment: map.fragment().to_string(),
            area: map.area_detail(),
        }),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/events`
///
/// Feeds one surface event (load, click, hover, camera move) into the
/// map and returns the selection effects it produced.
pub async fn event(state: web::Data<AppState>, body: web::Json<SurfaceEvent>) -> HttpResponse {
    effects_response(
        state
            .lock()
            .and_then(|mut map| Ok(map.handle_event(body.into_inner())?)),
    )
}

/// `POST /api/surface/loaded`
///
/// Marks sources of the recorded scene as loaded, as a real surface would
/// once its tiles arrive, and delivers the matching readiness event.
pub async fn loaded(
    state: web::Data<AppState>,
    params: web::Query<LoadedParams>,
) -> HttpResponse {
    let result = state.lock().and_then(|mut map| {
        let event = match &params.source {
            Some(source_id) => {
                map.surface_mut().mark_source_loaded(source_id);
                SurfaceEvent::SourceLoaded {
                    source_id: source_id.clone(),
                }
            }
            None => {
                map.surface_mut().mark_all_loaded();
                SurfaceEvent::Load
            }
        };
        Ok(map.handle_event(event)?)
    });
    effects_response(result)
}

/// `POST /api/refresh`
///
/// Re-fetches analytics and points.
pub async fn refresh(state: web::Data<AppState>) -> HttpResponse {
    match crate::refresh(&state).await {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/selection/area`
pub async fn select_area(
    state: web::Data<AppState>,
    body: web::Json<SelectAreaRequest>,
) -> HttpResponse {
    effects_response(
        state
            .lock()
            .and_then(|mut map| Ok(map.select_constituency(&body.code)?)),
    )
}

/// `DELETE /api/selection/area`
pub async fn clear_area(state: web::Data<AppState>) -> HttpResponse {
    effects_response(state.lock().and_then(|mut map| Ok(map.clear_area()?)))
}

/// `DELETE /api/selection/record`
pub async fn clear_record(state: web::Data<AppState>) -> HttpResponse {
    effects_response(state.lock().and_then(|mut map| Ok(map.clear_record()?)))
}

/// `PUT /api/selection/panel`
pub async fn panel_tab(
    state: web::Data<AppState>,
    body: web::Json<PanelTabRequest>,
) -> HttpResponse {
    effects_response(state.lock().map(|mut map| map.set_panel_tab(body.tab)))
}
