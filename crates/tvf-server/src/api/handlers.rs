//! Request handlers

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use tvf_core::api::{
    ActiveRequest, FleetStats, HeartbeatRequest, InactiveQuery, LocationRequest, RebootAck,
    TerminalFilter,
};
use tvf_core::time::{now, stale_threshold};
use tvf_core::{Terminal, TerminalId, TerminalPatch, TerminalSpec};
use tvf_probe::ConnectivityTestResult;

use super::error::ApiError;
use crate::fleet::FleetService;
use crate::heartbeat::HeartbeatOutcome;

type Fleet = State<Arc<FleetService>>;
type ApiResult<T> = Result<T, ApiError>;

fn terminal_id(raw: &str) -> ApiResult<TerminalId> {
    raw.parse()
        .map_err(|_| ApiError::invalid(format!("invalid terminal id {:?}", raw)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::invalid(e.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    params
        .map(|Query(value)| value)
        .map_err(|e| ApiError::invalid(e.body_text()))
}

pub(super) async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub(super) async fn list_terminals(
    State(fleet): Fleet,
    filter: Result<Query<TerminalFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<Terminal>>> {
    let filter = query(filter)?;
    Ok(Json(fleet.list_terminals(&filter).await?))
}

pub(super) async fn register_terminal(
    State(fleet): Fleet,
    payload: Result<Json<TerminalSpec>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Terminal>)> {
    let spec = body(payload)?;
    let terminal = fleet.register_terminal(spec).await?;
    Ok((StatusCode::CREATED, Json(terminal)))
}

pub(super) async fn stats(State(fleet): Fleet) -> ApiResult<Json<FleetStats>> {
    Ok(Json(fleet.stats().await?))
}

/// `since` wins over `minutes`; one of them is required
pub(super) async fn list_inactive(
    State(fleet): Fleet,
    params: Result<Query<InactiveQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Terminal>>> {
    let params = query(params)?;
    let threshold = match (params.since, params.minutes) {
        (Some(since), _) => since,
        (None, Some(minutes)) => {
            stale_threshold(now(), std::time::Duration::from_secs(minutes.saturating_mul(60)))
        }
        (None, None) => {
            return Err(ApiError::invalid("either since or minutes is required"));
        }
    };
    Ok(Json(fleet.list_inactive_since(threshold).await?))
}

/// Always answers 204; terminals learn nothing about registry contents
pub(super) async fn heartbeat(
    State(fleet): Fleet,
    payload: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> StatusCode {
    match payload {
        Ok(Json(request)) => match fleet.heartbeat(&request.mac_address).await {
            Ok(HeartbeatOutcome::Recorded(id)) => tracing::trace!("Heartbeat recorded for {}", id),
            Ok(HeartbeatOutcome::Unknown) => {}
            Err(e) => tracing::warn!("Failed to record heartbeat: {}", e),
        },
        Err(e) => tracing::warn!("Malformed heartbeat: {}", e.body_text()),
    }
    StatusCode::NO_CONTENT
}

pub(super) async fn get_terminal(
    State(fleet): Fleet,
    Path(id): Path<String>,
) -> ApiResult<Json<Terminal>> {
    let id = terminal_id(&id)?;
    Ok(Json(fleet.get_terminal(&id).await?))
}

pub(super) async fn update_terminal(
    State(fleet): Fleet,
    Path(id): Path<String>,
    payload: Result<Json<TerminalPatch>, JsonRejection>,
) -> ApiResult<Json<Terminal>> {
    let id = terminal_id(&id)?;
    let patch = body(payload)?;
    Ok(Json(fleet.update_terminal(&id, patch).await?))
}

pub(super) async fn delete_terminal(
    State(fleet): Fleet,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = terminal_id(&id)?;
    fleet.delete_terminal(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn assign_location(
    State(fleet): Fleet,
    Path(id): Path<String>,
    payload: Result<Json<LocationRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let id = terminal_id(&id)?;
    let request = body(payload)?;
    fleet
        .assign_location(&id, request.location_type, &request.location_identifier)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn clear_location(
    State(fleet): Fleet,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = terminal_id(&id)?;
    fleet.clear_location(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn set_active(
    State(fleet): Fleet,
    Path(id): Path<String>,
    payload: Result<Json<ActiveRequest>, JsonRejection>,
) -> ApiResult<Json<Terminal>> {
    let id = terminal_id(&id)?;
    let request = body(payload)?;
    Ok(Json(fleet.set_active(&id, request.active).await?))
}

pub(super) async fn test_connectivity(
    State(fleet): Fleet,
    Path(id): Path<String>,
) -> ApiResult<Json<ConnectivityTestResult>> {
    let id = terminal_id(&id)?;
    Ok(Json(fleet.test_connectivity(&id).await?))
}

pub(super) async fn test_services(
    State(fleet): Fleet,
    Path(id): Path<String>,
) -> ApiResult<Json<ConnectivityTestResult>> {
    let id = terminal_id(&id)?;
    Ok(Json(fleet.test_services(&id).await?))
}

pub(super) async fn reboot(
    State(fleet): Fleet,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<RebootAck>)> {
    let id = terminal_id(&id)?;
    let ack = fleet.reboot(&id).await?;
    Ok((StatusCode::ACCEPTED, Json(ack)))
}
