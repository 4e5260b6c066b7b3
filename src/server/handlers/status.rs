//! Service status, manual refresh trigger and health probe.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::{debug, info};

use super::super::AppState;
use super::error::ApiError;
use super::iso_timestamp;

const NOT_SCHEDULED: &str = "No programada";

/// `GET /api/v1/status`
pub async fn status(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let total = state
        .repo
        .count()
        .await
        .map_err(|e| ApiError::internal("Error al obtener el estado del servicio", e))?;

    Ok(Json(json!({
        "status": {
            "totalRecords": total,
            "lastUpdate": state.refresh.last_success().map(iso_timestamp),
            "isUpdating": state.refresh.is_updating(),
            "nextUpdate": state.schedule.as_deref().unwrap_or(NOT_SCHEDULED),
        }
    })))
}

/// `POST /api/v1/actualizar`
///
/// Claims the refresh slot before responding, then runs the refresh in the
/// background.
pub async fn trigger_update(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let Some(guard) = state.refresh.try_start() else {
        return Err(ApiError::Conflict {
            message: "Ya hay una actualización en progreso.".to_string(),
            started: state.refresh.started_at(),
        });
    };

    info!("Manual refresh requested");
    let refresh = state.refresh.clone();
    tokio::spawn(async move {
        if refresh.run(guard).await.is_err() {
            debug!("Manual refresh ended with an error");
        }
    });

    Ok(Json(json!({
        "message": "Actualización iniciada en segundo plano",
        "status": "updating",
    })))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": state.started_at.elapsed().as_secs_f64(),
    }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Ruta no encontrada" })),
    )
}
