use async_trait::async_trait;
use sqlx::PgPool;

use super::{StateStore, StoreError};
use crate::alarm::{AlarmState, AlarmStatus};

#[derive(sqlx::FromRow)]
struct StateRow {
    rule_id: String,
    device_id: String,
    status: String,
    condition_since_ms: Option<i64>,
    last_evaluated_at_ms: Option<i64>,
    triggered_at_ms: Option<i64>,
    cleared_at_ms: Option<i64>,
}

impl TryFrom<StateRow> for AlarmState {
    type Error = StoreError;

    fn try_from(row: StateRow) -> Result<Self, Self::Error> {
        let status: AlarmStatus = row.status.parse().map_err(|reason| StoreError::Corrupt {
            id: row.rule_id.clone(),
            reason,
        })?;
        Ok(AlarmState {
            rule_id: row.rule_id,
            device_id: row.device_id,
            status,
            condition_since_ms: row.condition_since_ms,
            last_evaluated_at_ms: row.last_evaluated_at_ms,
            triggered_at_ms: row.triggered_at_ms,
            cleared_at_ms: row.cleared_at_ms,
        })
    }
}

pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn load_all(&self) -> Result<Vec<AlarmState>, StoreError> {
        let rows: Vec<StateRow> = sqlx::query_as(
            r#"SELECT rule_id, device_id, status, condition_since_ms,
                      last_evaluated_at_ms, triggered_at_ms, cleared_at_ms
               FROM alarm_states"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut states = Vec::with_capacity(rows.len());
        for row in rows {
            match AlarmState::try_from(row) {
                Ok(state) => states.push(state),
                Err(e) => tracing::error!(error = %e, "skipping unreadable alarm state"),
            }
        }
        Ok(states)
    }

    async fn save(&self, state: &AlarmState) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO alarm_states
               (rule_id, device_id, status, condition_since_ms,
                last_evaluated_at_ms, triggered_at_ms, cleared_at_ms, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, now())
               ON CONFLICT (rule_id) DO UPDATE SET
                   device_id = EXCLUDED.device_id,
                   status = EXCLUDED.status,
                   condition_since_ms = EXCLUDED.condition_since_ms,
                   last_evaluated_at_ms = EXCLUDED.last_evaluated_at_ms,
                   triggered_at_ms = EXCLUDED.triggered_at_ms,
                   cleared_at_ms = EXCLUDED.cleared_at_ms,
                   updated_at = now()"#,
        )
        .bind(&state.rule_id)
        .bind(&state.device_id)
        .bind(state.status.as_str())
        .bind(state.condition_since_ms)
        .bind(state.last_evaluated_at_ms)
        .bind(state.triggered_at_ms)
        .bind(state.cleared_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, rule_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM alarm_states WHERE rule_id = $1")
            .bind(rule_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
