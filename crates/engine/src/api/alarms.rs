use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::AppState;
use crate::alarm::{AlarmEvent, AlarmState, AlarmStatus};

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 1000;

#[derive(Serialize)]
pub struct StatusResponse {
    pub devices: usize,
    pub rules: usize,
    pub active_alarms: usize,
    pub pending_alarms: usize,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn list_alarms(State(state): State<AppState>) -> Json<Vec<AlarmState>> {
    Json(state.engine.states())
}

pub async fn active_alarms(State(state): State<AppState>) -> Json<Vec<AlarmState>> {
    let active = state
        .engine
        .states()
        .into_iter()
        .filter(|s| matches!(s.status, AlarmStatus::Pending | AlarmStatus::Active))
        .collect();
    Json(active)
}

pub async fn history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<AlarmEvent>>, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
    Ok(Json(state.history.recent(limit).await?))
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let counts = state.engine.status_counts();
    Json(StatusResponse {
        devices: state.engine.cache().device_count(),
        rules: state.engine.catalog().len(),
        active_alarms: counts.active,
        pending_alarms: counts.pending,
    })
}
