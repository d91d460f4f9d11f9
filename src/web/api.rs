//! Defines the Axum API routes and handlers.

use crate::thermostat::{ControlError, ThermostatController};
use crate::web::models::{ErrorResponse, ModeRequest, StatusResponse, TargetRequest};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use std::sync::Arc;
use tokio::sync::watch;

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Clone)]
pub struct AppState {
    controller: Arc<ThermostatController>,
    current_temperature: watch::Receiver<Option<f64>>,
}

impl AppState {
    /// Build the API state and take over the controller's temperature-changed callback.
    pub fn attach(controller: Arc<ThermostatController>) -> Self {
        let (temperature_tx, current_temperature) = watch::channel(None);
        controller.register_temperature_changed(move |reading| {
            tracing::debug!("Current temperature did change to {:.2}°C", reading.celsius());
            temperature_tx.send_replace(Some(reading.celsius()));
        });
        Self {
            controller,
            current_temperature,
        }
    }
}

/// Creates the Axum router with all the API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/target", put(set_target))
        .route("/api/v1/mode", put(set_mode))
        .with_state(state)
}

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (status, Json(ErrorResponse { error: error.to_string() }))
}

fn control_error(e: ControlError) -> ApiError {
    match e {
        ControlError::InvalidTarget(_) => api_error(StatusCode::UNPROCESSABLE_ENTITY, e),
        ControlError::ShutDown => api_error(StatusCode::CONFLICT, e),
        _ => {
            tracing::error!("Thermostat command failed: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

fn status(state: &AppState) -> Result<StatusResponse, ApiError> {
    let heating_active = state.controller.is_active().map_err(|e| {
        tracing::error!("Failed to read heating state: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
    })?;
    Ok(StatusResponse {
        current_temperature: *state.current_temperature.borrow(),
        target_temperature: state.controller.target(),
        heating_active,
        mode: state.controller.mode(),
    })
}

/// Handler to get the current thermostat status.
async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    Ok(Json(status(&state)?))
}

/// Handler to change the target temperature.
async fn set_target(
    State(state): State<AppState>,
    Json(payload): Json<TargetRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    tracing::info!("Remote target temperature change to {}°C", payload.celsius);
    state.controller.set_target(payload.celsius).map_err(control_error)?;
    Ok(Json(status(&state)?))
}

/// Handler to change the heating mode.
async fn set_mode(
    State(state): State<AppState>,
    Json(payload): Json<ModeRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    tracing::info!("Remote heating mode change to {}", payload.mode);
    state.controller.apply_mode(payload.mode).await.map_err(control_error)?;
    Ok(Json(status(&state)?))
}
