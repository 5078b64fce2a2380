use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::{PgPool, Postgres};

use super::{RuleRepository, StoreError};
use crate::alarm::{AlarmRule, Operator, RuleDraft, RuleKind};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: String,
    name: String,
    kind: String,
    device_id: String,
    metric: String,
    operator: String,
    threshold: f64,
    duration_ms: i64,
    shunt_device_id: Option<String>,
    shunt_metric: Option<String>,
    shunt_operator: Option<String>,
    shunt_threshold: Option<f64>,
    message: String,
    enabled: bool,
    created_at_ms: i64,
    updated_at_ms: i64,
}

impl TryFrom<RuleRow> for AlarmRule {
    type Error = StoreError;

    fn try_from(row: RuleRow) -> Result<Self, Self::Error> {
        let id = row.id.clone();
        let corrupt = |reason: String| StoreError::Corrupt {
            id: id.clone(),
            reason,
        };

        let kind: RuleKind = row.kind.parse().map_err(|e: crate::alarm::RuleError| corrupt(e.to_string()))?;
        let operator: Operator = row.operator.parse().map_err(|e: crate::alarm::RuleError| corrupt(e.to_string()))?;
        let shunt_operator = row
            .shunt_operator
            .as_deref()
            .map(str::parse::<Operator>)
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?;

        let draft = RuleDraft {
            id: Some(row.id.clone()),
            name: row.name,
            kind,
            device_id: row.device_id,
            metric: row.metric,
            operator,
            threshold: row.threshold,
            duration_ms: row.duration_ms,
            shunt_device_id: row.shunt_device_id,
            shunt_metric: row.shunt_metric,
            shunt_operator,
            shunt_threshold: row.shunt_threshold,
            message: row.message,
            enabled: row.enabled,
        };
        let mut rule = draft
            .into_rule(row.id, row.created_at_ms)
            .map_err(|e| corrupt(e.to_string()))?;
        rule.updated_at_ms = row.updated_at_ms;
        Ok(rule)
    }
}

pub struct PgRuleRepository {
    pool: PgPool,
}

impl PgRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

macro_rules! insert_rule_sql {
    () => {
        r#"INSERT INTO alarm_rules
               (id, name, kind, device_id, metric, operator, threshold, duration_ms,
                shunt_device_id, shunt_metric, shunt_operator, shunt_threshold,
                message, enabled, created_at_ms, updated_at_ms)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"#
    };
}

fn bind_rule<'q>(query: PgQuery<'q>, rule: &'q AlarmRule) -> PgQuery<'q> {
    let shunt = rule.shunt.as_ref();
    query
        .bind(&rule.id)
        .bind(&rule.name)
        .bind(rule.kind().as_str())
        .bind(&rule.device_id)
        .bind(&rule.metric)
        .bind(rule.operator.symbol())
        .bind(rule.threshold)
        .bind(rule.duration_ms)
        .bind(shunt.map(|s| s.device_id.as_str()))
        .bind(shunt.map(|s| s.metric.as_str()))
        .bind(shunt.map(|s| s.operator.symbol()))
        .bind(shunt.map(|s| s.threshold))
        .bind(&rule.message)
        .bind(rule.enabled)
        .bind(rule.created_at_ms)
        .bind(rule.updated_at_ms)
}

#[async_trait]
impl RuleRepository for PgRuleRepository {
    async fn load_all(&self) -> Result<Vec<AlarmRule>, StoreError> {
        let rows: Vec<RuleRow> = sqlx::query_as(
            r#"SELECT id, name, kind, device_id, metric, operator, threshold, duration_ms,
                      shunt_device_id, shunt_metric, shunt_operator, shunt_threshold,
                      message, enabled, created_at_ms, updated_at_ms
               FROM alarm_rules
               ORDER BY id"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            match AlarmRule::try_from(row) {
                Ok(rule) => rules.push(rule),
                Err(e) => tracing::error!(error = %e, "skipping unreadable alarm rule"),
            }
        }
        Ok(rules)
    }

    async fn insert(&self, rule: &AlarmRule) -> Result<(), StoreError> {
        let result = bind_rule(
            sqlx::query(concat!(insert_rule_sql!(), " ON CONFLICT (id) DO NOTHING")),
            rule,
        )
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(rule.id.clone()));
        }
        Ok(())
    }

    async fn upsert(&self, rule: &AlarmRule) -> Result<(), StoreError> {
        bind_rule(
            sqlx::query(concat!(
                insert_rule_sql!(),
                r#"
               ON CONFLICT (id) DO UPDATE SET
                   name = EXCLUDED.name,
                   kind = EXCLUDED.kind,
                   device_id = EXCLUDED.device_id,
                   metric = EXCLUDED.metric,
                   operator = EXCLUDED.operator,
                   threshold = EXCLUDED.threshold,
                   duration_ms = EXCLUDED.duration_ms,
                   shunt_device_id = EXCLUDED.shunt_device_id,
                   shunt_metric = EXCLUDED.shunt_metric,
                   shunt_operator = EXCLUDED.shunt_operator,
                   shunt_threshold = EXCLUDED.shunt_threshold,
                   message = EXCLUDED.message,
                   enabled = EXCLUDED.enabled,
                   updated_at_ms = EXCLUDED.updated_at_ms"#
            )),
            rule,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, rule_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM alarm_rules WHERE id = $1")
            .bind(rule_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> RuleRow {
        RuleRow {
            id: "r1".into(),
            name: "hot while on".into(),
            kind: "conditional".into(),
            device_id: "device-1".into(),
            metric: "temperature".into(),
            operator: ">".into(),
            threshold: 28.0,
            duration_ms: 180_000,
            shunt_device_id: Some("device-1".into()),
            shunt_metric: Some("current".into()),
            shunt_operator: Some(">".into()),
            shunt_threshold: Some(0.0),
            message: "".into(),
            enabled: true,
            created_at_ms: 10,
            updated_at_ms: 20,
        }
    }

    #[test]
    fn row_maps_to_rule() {
        let rule = AlarmRule::try_from(row()).unwrap();
        assert_eq!(rule.kind(), RuleKind::Conditional);
        assert_eq!(rule.created_at_ms, 10);
        assert_eq!(rule.updated_at_ms, 20);
        assert_eq!(rule.shunt.unwrap().operator, Operator::GreaterThan);
    }

    #[test]
    fn bad_operator_is_corrupt() {
        let mut r = row();
        r.operator = "~".into();
        assert!(matches!(AlarmRule::try_from(r), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn conditional_without_shunt_is_corrupt() {
        let mut r = row();
        r.shunt_metric = None;
        assert!(matches!(AlarmRule::try_from(r), Err(StoreError::Corrupt { .. })));
    }
}
