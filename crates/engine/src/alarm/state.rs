use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmStatus {
    Inactive,
    Pending,
    Active,
    Cleared,
}

impl AlarmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Cleared => "cleared",
        }
    }

    pub fn is_timing(&self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }
}

impl fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(Self::Inactive),
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "cleared" => Ok(Self::Cleared),
            other => Err(format!("unknown alarm status `{other}`")),
        }
    }
}

/// What a single decision point did to an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing durable changed.
    Unchanged,
    /// Decision point older than the last one seen; state untouched.
    Stale,
    /// Condition became true; the duration timer started.
    Armed,
    /// Condition went false before the duration elapsed.
    Disarmed,
    Triggered,
    Cleared,
}

impl Transition {
    pub fn needs_persist(&self) -> bool {
        matches!(
            self,
            Self::Armed | Self::Disarmed | Self::Triggered | Self::Cleared
        )
    }

    pub fn emits_event(&self) -> bool {
        matches!(self, Self::Triggered | Self::Cleared)
    }
}

/// Evaluation state of one rule. `condition_since_ms` is set exactly
/// while the status is Pending or Active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmState {
    pub rule_id: String,
    pub device_id: String,
    pub status: AlarmStatus,
    pub condition_since_ms: Option<i64>,
    pub last_evaluated_at_ms: Option<i64>,
    pub triggered_at_ms: Option<i64>,
    pub cleared_at_ms: Option<i64>,
}

impl AlarmState {
    pub fn new(rule_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            device_id: device_id.into(),
            status: AlarmStatus::Inactive,
            condition_since_ms: None,
            last_evaluated_at_ms: None,
            triggered_at_ms: None,
            cleared_at_ms: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AlarmStatus::Active
    }

    /// Advances the machine for one decision point.
    ///
    /// With `duration_ms == 0` the arm and trigger steps collapse into one
    /// call and the result is `Triggered`. With `retain_cleared` the alarm
    /// rests in Cleared after clearing instead of returning to Inactive.
    pub fn advance(
        &mut self,
        condition: bool,
        now_ms: i64,
        duration_ms: i64,
        retain_cleared: bool,
    ) -> Transition {
        if self.last_evaluated_at_ms.is_some_and(|last| now_ms < last) {
            return Transition::Stale;
        }
        self.last_evaluated_at_ms = Some(now_ms);

        match (self.status, condition) {
            (AlarmStatus::Inactive | AlarmStatus::Cleared, true) => {
                self.status = AlarmStatus::Pending;
                self.condition_since_ms = Some(now_ms);
                if duration_ms <= 0 {
                    self.trigger(now_ms);
                    Transition::Triggered
                } else {
                    Transition::Armed
                }
            }
            (AlarmStatus::Inactive | AlarmStatus::Cleared, false) => Transition::Unchanged,

            (AlarmStatus::Pending, true) => {
                let since = self.condition_since_ms.unwrap_or(now_ms);
                if now_ms - since >= duration_ms {
                    self.trigger(now_ms);
                    Transition::Triggered
                } else {
                    Transition::Unchanged
                }
            }
            (AlarmStatus::Pending, false) => {
                self.status = AlarmStatus::Inactive;
                self.condition_since_ms = None;
                Transition::Disarmed
            }

            (AlarmStatus::Active, true) => Transition::Unchanged,
            (AlarmStatus::Active, false) => {
                self.cleared_at_ms = Some(now_ms);
                self.condition_since_ms = None;
                self.status = if retain_cleared {
                    AlarmStatus::Cleared
                } else {
                    AlarmStatus::Inactive
                };
                Transition::Cleared
            }
        }
    }

    fn trigger(&mut self, now_ms: i64) {
        self.status = AlarmStatus::Active;
        self.triggered_at_ms = Some(now_ms);
        self.cleared_at_ms = None;
    }

    /// Checks the `condition_since` / status coupling.
    pub fn is_consistent(&self) -> bool {
        self.condition_since_ms.is_some() == self.status.is_timing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AlarmState {
        AlarmState::new("temp_high", "device-1")
    }

    #[test]
    fn starts_inactive() {
        let s = state();
        assert_eq!(s.status, AlarmStatus::Inactive);
        assert!(s.condition_since_ms.is_none());
        assert!(s.is_consistent());
    }

    #[test]
    fn inactive_to_pending() {
        let mut s = state();
        assert_eq!(s.advance(true, 1_000, 5_000, false), Transition::Armed);
        assert_eq!(s.status, AlarmStatus::Pending);
        assert_eq!(s.condition_since_ms, Some(1_000));
    }

    #[test]
    fn inactive_stays_on_false() {
        let mut s = state();
        assert_eq!(s.advance(false, 1_000, 5_000, false), Transition::Unchanged);
        assert_eq!(s.last_evaluated_at_ms, Some(1_000));
    }

    #[test]
    fn zero_duration_triggers_immediately() {
        let mut s = state();
        assert_eq!(s.advance(true, 1_000, 0, false), Transition::Triggered);
        assert!(s.is_active());
        assert_eq!(s.condition_since_ms, Some(1_000));
        assert_eq!(s.triggered_at_ms, Some(1_000));
    }

    #[test]
    fn pending_holds_until_duration() {
        let mut s = state();
        s.advance(true, 0, 5_000, false);
        assert_eq!(s.advance(true, 4_999, 5_000, false), Transition::Unchanged);
        assert_eq!(s.status, AlarmStatus::Pending);
        assert_eq!(s.advance(true, 5_000, 5_000, false), Transition::Triggered);
        assert_eq!(s.triggered_at_ms, Some(5_000));
        assert_eq!(s.condition_since_ms, Some(0));
    }

    #[test]
    fn pending_resets_on_false() {
        let mut s = state();
        s.advance(true, 0, 5_000, false);
        assert_eq!(s.advance(false, 3_000, 5_000, false), Transition::Disarmed);
        assert_eq!(s.status, AlarmStatus::Inactive);
        assert!(s.condition_since_ms.is_none());

        s.advance(true, 4_000, 5_000, false);
        assert_eq!(s.condition_since_ms, Some(4_000));
        assert_eq!(s.advance(true, 8_000, 5_000, false), Transition::Unchanged);
    }

    #[test]
    fn active_does_not_retrigger() {
        let mut s = state();
        s.advance(true, 0, 0, false);
        for t in 1..10 {
            assert_eq!(s.advance(true, t * 1_000, 0, false), Transition::Unchanged);
        }
        assert_eq!(s.triggered_at_ms, Some(0));
    }

    #[test]
    fn active_clears_to_inactive() {
        let mut s = state();
        s.advance(true, 0, 0, false);
        assert_eq!(s.advance(false, 7_000, 0, false), Transition::Cleared);
        assert_eq!(s.status, AlarmStatus::Inactive);
        assert_eq!(s.cleared_at_ms, Some(7_000));
        assert!(s.condition_since_ms.is_none());
        assert!(s.is_consistent());
    }

    #[test]
    fn retained_cleared_rests_then_rearms() {
        let mut s = state();
        s.advance(true, 0, 1_000, true);
        s.advance(true, 1_000, 1_000, true);
        assert_eq!(s.advance(false, 2_000, 1_000, true), Transition::Cleared);
        assert_eq!(s.status, AlarmStatus::Cleared);
        assert!(s.is_consistent());

        assert_eq!(s.advance(false, 3_000, 1_000, true), Transition::Unchanged);
        assert_eq!(s.status, AlarmStatus::Cleared);

        assert_eq!(s.advance(true, 4_000, 1_000, true), Transition::Armed);
        assert_eq!(s.status, AlarmStatus::Pending);
        assert_eq!(s.condition_since_ms, Some(4_000));
    }

    #[test]
    fn stale_decision_point_is_ignored() {
        let mut s = state();
        s.advance(true, 5_000, 10_000, false);
        let before = s.clone();
        assert_eq!(s.advance(false, 4_000, 10_000, false), Transition::Stale);
        assert_eq!(s, before);
    }

    #[test]
    fn new_cycle_resets_cleared_at() {
        let mut s = state();
        s.advance(true, 0, 0, false);
        s.advance(false, 1_000, 0, false);
        s.advance(true, 2_000, 0, false);
        assert_eq!(s.triggered_at_ms, Some(2_000));
        assert!(s.cleared_at_ms.is_none());
    }

    #[test]
    fn status_parses() {
        for st in [
            AlarmStatus::Inactive,
            AlarmStatus::Pending,
            AlarmStatus::Active,
            AlarmStatus::Cleared,
        ] {
            assert_eq!(st.as_str().parse::<AlarmStatus>().unwrap(), st);
        }
        assert!("firing".parse::<AlarmStatus>().is_err());
    }
}
