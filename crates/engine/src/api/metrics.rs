use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use super::AppState;
use crate::metrics::{render_prometheus, Gauges};

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let counts = state.engine.status_counts();
    let gauges = Gauges {
        rules: state.engine.catalog().len() as u64,
        devices: state.engine.cache().device_count() as u64,
        active_alarms: counts.active as u64,
        pending_alarms: counts.pending as u64,
    };
    let body = render_prometheus(state.engine.metrics(), gauges);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
