use serde::{Deserialize, Serialize};

use super::rule::AlarmRule;
use super::state::AlarmState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Triggered,
    Cleared,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triggered => "triggered",
            Self::Cleared => "cleared",
        }
    }
}

/// Notification for one trigger or clear transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub device_id: String,
    pub metric: String,
    pub status: EventStatus,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shunt_value: Option<f64>,
    pub timestamp_ms: i64,
    pub triggered_at_ms: Option<i64>,
    pub cleared_at_ms: Option<i64>,
}

impl AlarmEvent {
    pub fn from_transition(
        rule: &AlarmRule,
        state: &AlarmState,
        status: EventStatus,
        value: f64,
        shunt_value: Option<f64>,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            device_id: rule.device_id.clone(),
            metric: rule.metric.clone(),
            status,
            message: rule.message.clone(),
            value,
            threshold: rule.threshold,
            shunt_value,
            timestamp_ms,
            triggered_at_ms: state.triggered_at_ms,
            cleared_at_ms: state.cleared_at_ms,
        }
    }

    /// Stable key for downstream dedup: the same transition always maps to
    /// the same key even when published twice.
    pub fn idempotency_key(&self) -> String {
        let at = match self.status {
            EventStatus::Triggered => self.triggered_at_ms,
            EventStatus::Cleared => self.cleared_at_ms,
        }
        .unwrap_or(self.timestamp_ms);
        format!("{}:{}:{}", self.rule_id, self.status.as_str(), at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::rule::{Operator, RuleDraft};

    fn rule() -> AlarmRule {
        RuleDraft::simple("temp_high", "device-1", "temperature", Operator::GreaterThan, 25.0, 0, "too hot")
            .into_rule("temp_high".into(), 0)
            .unwrap()
    }

    #[test]
    fn key_uses_transition_instant() {
        let mut st = AlarmState::new("temp_high", "device-1");
        st.advance(true, 6_000, 0, false);
        let ev = AlarmEvent::from_transition(&rule(), &st, EventStatus::Triggered, 26.0, None, 6_000);
        assert_eq!(ev.idempotency_key(), "temp_high:triggered:6000");

        st.advance(false, 7_000, 0, false);
        let ev = AlarmEvent::from_transition(&rule(), &st, EventStatus::Cleared, 20.0, None, 7_000);
        assert_eq!(ev.idempotency_key(), "temp_high:cleared:7000");
        assert_eq!(ev.triggered_at_ms, Some(6_000));
    }

    #[test]
    fn json_shape() {
        let st = AlarmState::new("temp_high", "device-1");
        let ev = AlarmEvent::from_transition(&rule(), &st, EventStatus::Triggered, 26.0, None, 1);
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["status"], "triggered");
        assert_eq!(v["message"], "too hot");
        assert!(v.get("shunt_value").is_none());
    }
}
