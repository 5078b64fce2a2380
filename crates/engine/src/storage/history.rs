use async_trait::async_trait;
use sqlx::PgPool;

use super::{HistoryStore, StoreError};
use crate::alarm::{AlarmEvent, EventStatus};

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: String,
    rule_id: String,
    rule_name: String,
    device_id: String,
    metric: String,
    status: String,
    message: String,
    value: f64,
    threshold: f64,
    shunt_value: Option<f64>,
    timestamp_ms: i64,
    triggered_at_ms: Option<i64>,
    cleared_at_ms: Option<i64>,
}

impl TryFrom<HistoryRow> for AlarmEvent {
    type Error = StoreError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "triggered" => EventStatus::Triggered,
            "cleared" => EventStatus::Cleared,
            other => {
                return Err(StoreError::Corrupt {
                    id: row.id,
                    reason: format!("unknown event status `{other}`"),
                })
            }
        };
        Ok(AlarmEvent {
            id: row.id,
            rule_id: row.rule_id,
            rule_name: row.rule_name,
            device_id: row.device_id,
            metric: row.metric,
            status,
            message: row.message,
            value: row.value,
            threshold: row.threshold,
            shunt_value: row.shunt_value,
            timestamp_ms: row.timestamp_ms,
            triggered_at_ms: row.triggered_at_ms,
            cleared_at_ms: row.cleared_at_ms,
        })
    }
}

pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(&self, event: &AlarmEvent) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO alarm_history
               (id, rule_id, rule_name, device_id, metric, status, message,
                value, threshold, shunt_value, timestamp_ms, triggered_at_ms, cleared_at_ms)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
               ON CONFLICT (id) DO NOTHING"#,
        )
        .bind(&event.id)
        .bind(&event.rule_id)
        .bind(&event.rule_name)
        .bind(&event.device_id)
        .bind(&event.metric)
        .bind(event.status.as_str())
        .bind(&event.message)
        .bind(event.value)
        .bind(event.threshold)
        .bind(event.shunt_value)
        .bind(event.timestamp_ms)
        .bind(event.triggered_at_ms)
        .bind(event.cleared_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AlarmEvent>, StoreError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"SELECT id, rule_id, rule_name, device_id, metric, status, message,
                      value, threshold, shunt_value, timestamp_ms, triggered_at_ms, cleared_at_ms
               FROM alarm_history
               ORDER BY timestamp_ms DESC
               LIMIT $1"#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AlarmEvent::try_from).collect()
    }

    async fn purge_older_than(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM alarm_history WHERE timestamp_ms < $1")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
