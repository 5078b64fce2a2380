use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use vigil_common::reading::Reading;

use super::cache::ReadingCache;
use super::catalog::RuleCatalog;
use super::event::{AlarmEvent, EventStatus};
use super::rule::AlarmRule;
use super::state::{AlarmState, AlarmStatus, Transition};
use crate::metrics::EngineMetrics;

/// Durable mirror operation queued for the state writer.
#[derive(Debug, Clone, PartialEq)]
pub enum StateWrite {
    Save(AlarmState),
    Delete(String),
}

impl StateWrite {
    pub fn rule_id(&self) -> &str {
        match self {
            Self::Save(s) => &s.rule_id,
            Self::Delete(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    pub retain_cleared: bool,
}

/// Receiving ends of the engine's output queues.
pub struct EngineOutputs {
    pub writes: mpsc::UnboundedReceiver<StateWrite>,
    pub events: mpsc::UnboundedReceiver<AlarmEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub transition: Transition,
    pub status: AlarmStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub inactive: usize,
    pub pending: usize,
    pub active: usize,
    pub cleared: usize,
}

/// The alarm evaluation core. Owns the in-memory alarm states and the
/// reading cache; evaluation never blocks on I/O, it queues state writes
/// and events for the background writer and notify loop.
pub struct Engine {
    catalog: RuleCatalog,
    cache: ReadingCache,
    states: DashMap<String, AlarmState>,
    writes: mpsc::UnboundedSender<StateWrite>,
    events: mpsc::UnboundedSender<AlarmEvent>,
    options: EngineOptions,
    metrics: Arc<EngineMetrics>,
}

impl Engine {
    pub fn new(
        catalog: RuleCatalog,
        options: EngineOptions,
        metrics: Arc<EngineMetrics>,
    ) -> (Self, EngineOutputs) {
        let (writes_tx, writes_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let engine = Self {
            catalog,
            cache: ReadingCache::new(),
            states: DashMap::new(),
            writes: writes_tx,
            events: events_tx,
            options,
            metrics,
        };
        let outputs = EngineOutputs {
            writes: writes_rx,
            events: events_rx,
        };
        (engine, outputs)
    }

    /// Repopulates alarm states loaded from storage. Must run before the
    /// first reading is evaluated. States of unknown rules are ignored.
    pub fn restore(&self, states: Vec<AlarmState>) -> usize {
        let mut restored = 0;
        for state in states {
            if !self.catalog.contains(&state.rule_id) {
                tracing::debug!(rule_id = %state.rule_id, "skipping state of unknown rule");
                continue;
            }
            self.states.insert(state.rule_id.clone(), state);
            restored += 1;
        }
        restored
    }

    pub fn evaluate(&self, reading: &Reading) -> Vec<RuleOutcome> {
        let start = Instant::now();

        for (metric, value) in &reading.metrics {
            self.cache
                .update(&reading.device_id, metric, *value, reading.timestamp_ms);
        }

        let rules = self.catalog.rules_for(&reading.device_id);
        let mut outcomes = Vec::with_capacity(rules.len());
        for rule in &rules {
            if let Some(outcome) = self.evaluate_rule(rule, reading) {
                outcomes.push(outcome);
            }
        }

        self.metrics.add_evaluations(outcomes.len() as u64);
        self.metrics.record_evaluation_latency(start);
        outcomes
    }

    fn evaluate_rule(&self, rule: &AlarmRule, reading: &Reading) -> Option<RuleOutcome> {
        let primary = if reading.device_id == rule.device_id {
            reading.value(&rule.metric)?
        } else {
            self.cache.get(&rule.device_id, &rule.metric)?.value
        };

        let shunt_value = rule
            .shunt
            .as_ref()
            .and_then(|s| self.cache.get(&s.device_id, &s.metric))
            .map(|c| c.value);

        let condition = effective_condition(rule, primary, shunt_value);

        let mut state = match self.states.entry(rule.id.clone()) {
            Entry::Occupied(e) => e.into_ref(),
            Entry::Vacant(e) => {
                // rule removed between lookup and now
                if !self.catalog.contains(&rule.id) {
                    return None;
                }
                e.insert(AlarmState::new(&rule.id, &rule.device_id))
            }
        };
        if state.device_id != rule.device_id {
            state.device_id = rule.device_id.clone();
        }

        let transition = state.advance(
            condition,
            reading.timestamp_ms,
            rule.duration_ms,
            self.options.retain_cleared,
        );

        if transition == Transition::Stale {
            tracing::debug!(
                rule_id = %rule.id,
                timestamp_ms = reading.timestamp_ms,
                "skipping stale evaluation"
            );
        }

        if transition.needs_persist() {
            self.queue_write(StateWrite::Save(state.clone()));
        }

        match transition {
            Transition::Triggered => {
                self.metrics.inc_alarms_triggered();
                self.emit(AlarmEvent::from_transition(
                    rule,
                    &state,
                    EventStatus::Triggered,
                    primary,
                    shunt_value,
                    reading.timestamp_ms,
                ));
            }
            Transition::Cleared => {
                self.metrics.inc_alarms_cleared();
                self.emit(AlarmEvent::from_transition(
                    rule,
                    &state,
                    EventStatus::Cleared,
                    primary,
                    shunt_value,
                    reading.timestamp_ms,
                ));
            }
            _ => {}
        }

        Some(RuleOutcome {
            rule_id: rule.id.clone(),
            transition,
            status: state.status,
        })
    }

    /// Drops the in-memory state of a rule and its durable record.
    pub fn forget(&self, rule_id: &str) {
        self.states.remove(rule_id);
        self.queue_write(StateWrite::Delete(rule_id.to_string()));
    }

    fn queue_write(&self, write: StateWrite) {
        if self.writes.send(write).is_err() {
            tracing::warn!("state writer closed, dropping state write");
        }
    }

    fn emit(&self, event: AlarmEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!("notify loop closed, dropping alarm event");
        }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &ReadingCache {
        &self.cache
    }

    pub fn state(&self, rule_id: &str) -> Option<AlarmState> {
        self.states.get(rule_id).map(|s| s.clone())
    }

    pub fn states(&self) -> Vec<AlarmState> {
        let mut out: Vec<_> = self.states.iter().map(|s| s.value().clone()).collect();
        out.sort_by(|a, b| a.rule_id.cmp(&b.rule_id));
        out
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for s in self.states.iter() {
            match s.status {
                AlarmStatus::Inactive => counts.inactive += 1,
                AlarmStatus::Pending => counts.pending += 1,
                AlarmStatus::Active => counts.active += 1,
                AlarmStatus::Cleared => counts.cleared += 1,
            }
        }
        counts
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }
}

/// Primary truth alone for simple rules; primary and shunt for conditional
/// ones. A shunt never reported is false.
pub fn effective_condition(rule: &AlarmRule, primary: f64, shunt_value: Option<f64>) -> bool {
    if !rule.primary_holds(primary) {
        return false;
    }
    match &rule.shunt {
        None => true,
        Some(shunt) => shunt_value.is_some_and(|v| shunt.holds(v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::rule::{Operator, RuleDraft, ShuntCondition};

    fn temp_high() -> AlarmRule {
        RuleDraft::simple("temp_high", "device-1", "temperature", Operator::GreaterThan, 25.0, 5_000, "too hot")
            .into_rule("temp_high".into(), 0)
            .unwrap()
    }

    fn hot_while_on(shunt_device: &str) -> AlarmRule {
        RuleDraft::conditional(
            "hot_while_on",
            "device-1",
            "temperature",
            Operator::GreaterThan,
            28.0,
            0,
            ShuntCondition {
                device_id: shunt_device.into(),
                metric: "current".into(),
                operator: Operator::GreaterThan,
                threshold: 0.0,
            },
            "hot while running",
        )
        .into_rule("hot_while_on".into(), 0)
        .unwrap()
    }

    fn engine(rules: Vec<AlarmRule>) -> (Engine, EngineOutputs) {
        Engine::new(RuleCatalog::from_rules(rules), EngineOptions::default(), EngineMetrics::new())
    }

    fn temp(t_ms: i64, value: f64) -> Reading {
        Reading::new("device-1", t_ms).with_metric("temperature", value)
    }

    fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
        let mut out = Vec::new();
        while let Ok(v) = rx.try_recv() {
            out.push(v);
        }
        out
    }

    #[test]
    fn scenario_trigger_then_clear() {
        let (engine, mut out) = engine(vec![temp_high()]);

        engine.evaluate(&temp(0, 26.0));
        assert_eq!(engine.state("temp_high").unwrap().status, AlarmStatus::Pending);
        engine.evaluate(&temp(4_000, 26.0));
        assert_eq!(engine.state("temp_high").unwrap().status, AlarmStatus::Pending);
        engine.evaluate(&temp(6_000, 26.0));
        assert_eq!(engine.state("temp_high").unwrap().status, AlarmStatus::Active);
        engine.evaluate(&temp(7_000, 20.0));
        let st = engine.state("temp_high").unwrap();
        assert_eq!(st.status, AlarmStatus::Inactive);
        assert!(st.condition_since_ms.is_none());

        let events = drain(&mut out.events);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, EventStatus::Triggered);
        assert_eq!(events[0].timestamp_ms, 6_000);
        assert_eq!(events[0].message, "too hot");
        assert_eq!(events[1].status, EventStatus::Cleared);
        assert_eq!(events[1].timestamp_ms, 7_000);
    }

    #[test]
    fn persists_only_on_status_change() {
        let (engine, mut out) = engine(vec![temp_high()]);
        for t in [0, 1_000, 2_000, 3_000] {
            engine.evaluate(&temp(t, 26.0));
        }
        let writes = drain(&mut out.writes);
        assert_eq!(writes.len(), 1);
        match &writes[0] {
            StateWrite::Save(s) => {
                assert_eq!(s.status, AlarmStatus::Pending);
                assert_eq!(s.condition_since_ms, Some(0));
            }
            other => panic!("unexpected write {other:?}"),
        }
    }

    #[test]
    fn reading_without_metric_skips_rule() {
        let (engine, _out) = engine(vec![temp_high()]);
        let outcomes = engine.evaluate(&Reading::new("device-1", 0).with_metric("current", 1.0));
        assert!(outcomes.is_empty());
        assert!(engine.state("temp_high").is_none());
    }

    #[test]
    fn conditional_needs_shunt_value() {
        let (engine, mut out) = engine(vec![hot_while_on("device-2")]);
        engine.evaluate(&temp(0, 30.0));
        assert_eq!(engine.state("hot_while_on").unwrap().status, AlarmStatus::Inactive);
        assert!(drain(&mut out.events).is_empty());
    }

    #[test]
    fn conditional_triggers_from_shunt_device_reading() {
        let (engine, mut out) = engine(vec![hot_while_on("device-2")]);
        engine.evaluate(&temp(0, 30.0));
        engine.evaluate(&Reading::new("device-2", 1_000).with_metric("current", 1.0));
        let st = engine.state("hot_while_on").unwrap();
        assert_eq!(st.status, AlarmStatus::Active);
        let events = drain(&mut out.events);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].shunt_value, Some(1.0));
        assert_eq!(events[0].value, 30.0);
    }

    #[test]
    fn conditional_same_device_reading() {
        let (engine, _out) = engine(vec![hot_while_on("device-1")]);
        engine.evaluate(
            &Reading::new("device-1", 0)
                .with_metric("temperature", 30.0)
                .with_metric("current", 0.0),
        );
        assert_eq!(engine.state("hot_while_on").unwrap().status, AlarmStatus::Inactive);
        engine.evaluate(
            &Reading::new("device-1", 1_000)
                .with_metric("temperature", 30.0)
                .with_metric("current", 1.0),
        );
        assert_eq!(engine.state("hot_while_on").unwrap().status, AlarmStatus::Active);
    }

    #[test]
    fn restore_resumes_without_duplicate_trigger() {
        let mut active = AlarmState::new("temp_high", "device-1");
        active.advance(true, 0, 5_000, false);
        active.advance(true, 6_000, 5_000, false);
        assert!(active.is_active());

        let (engine, mut out) = engine(vec![temp_high()]);
        assert_eq!(engine.restore(vec![active, AlarmState::new("gone", "device-9")]), 1);
        engine.evaluate(&temp(7_000, 26.0));
        assert_eq!(engine.state("temp_high").unwrap().status, AlarmStatus::Active);
        assert!(drain(&mut out.events).is_empty());
    }

    #[test]
    fn forget_removes_state_and_queues_delete() {
        let (engine, mut out) = engine(vec![temp_high()]);
        engine.evaluate(&temp(0, 26.0));
        drain(&mut out.writes);
        engine.forget("temp_high");
        assert!(engine.state("temp_high").is_none());
        assert_eq!(drain(&mut out.writes), vec![StateWrite::Delete("temp_high".into())]);
    }

    #[test]
    fn removed_rule_gets_no_new_state() {
        let (engine, _out) = engine(vec![temp_high()]);
        engine.catalog().remove("temp_high").unwrap();
        assert!(engine.evaluate(&temp(0, 26.0)).is_empty());
        assert!(engine.state("temp_high").is_none());
    }

    #[test]
    fn status_counts_track_states() {
        let mut quick = temp_high();
        quick.id = "quick".into();
        quick.duration_ms = 0;
        let (engine, _out) = engine(vec![temp_high(), quick]);
        engine.evaluate(&temp(0, 26.0));
        let counts = engine.status_counts();
        assert_eq!(counts.active, 1);
        assert_eq!(counts.pending, 1);
    }

    #[test]
    fn closed_outputs_do_not_panic() {
        let (engine, out) = engine(vec![temp_high()]);
        drop(out);
        engine.evaluate(&temp(0, 26.0));
        assert_eq!(engine.state("temp_high").unwrap().status, AlarmStatus::Pending);
    }
}
