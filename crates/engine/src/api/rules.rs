use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use super::error::ApiError;
use super::AppState;
use crate::alarm::{AlarmRule, RuleDraft, RuleKind};

#[derive(Serialize)]
pub struct RuleResponse {
    pub kind: RuleKind,
    #[serde(flatten)]
    pub rule: AlarmRule,
}

fn to_response(rule: Arc<AlarmRule>) -> RuleResponse {
    RuleResponse {
        kind: rule.kind(),
        rule: Arc::unwrap_or_clone(rule),
    }
}

pub async fn list_rules(State(state): State<AppState>) -> Json<Vec<RuleResponse>> {
    Json(state.rules.list().into_iter().map(to_response).collect())
}

pub async fn get_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> Result<Json<RuleResponse>, ApiError> {
    Ok(Json(to_response(state.rules.get(&rule_id)?)))
}

pub async fn create_rule(
    State(state): State<AppState>,
    body: Result<Json<RuleDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<RuleResponse>), ApiError> {
    let Json(draft) = body?;
    let rule = state.rules.create(draft).await?;
    Ok((StatusCode::CREATED, Json(to_response(rule))))
}

pub async fn replace_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
    body: Result<Json<RuleDraft>, JsonRejection>,
) -> Result<Json<RuleResponse>, ApiError> {
    let Json(draft) = body?;
    let rule = state.rules.replace(&rule_id, draft).await?;
    Ok(Json(to_response(rule)))
}

pub async fn delete_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.rules.remove(&rule_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
