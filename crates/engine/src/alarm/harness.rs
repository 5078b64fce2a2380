//! Synchronous replay of a reading sequence through a fresh engine, used by
//! tests to check trigger/clear counts without the async pipeline.

use vigil_common::reading::Reading;

use super::catalog::RuleCatalog;
use super::engine::{Engine, EngineOptions};
use super::event::{AlarmEvent, EventStatus};
use super::rule::AlarmRule;
use super::state::AlarmState;
use crate::metrics::EngineMetrics;

pub struct HarnessResult {
    pub events: Vec<AlarmEvent>,
    pub states: Vec<AlarmState>,
    pub triggered_count: usize,
    pub cleared_count: usize,
}

pub fn run_harness(rules: Vec<AlarmRule>, readings: Vec<Reading>) -> HarnessResult {
    replay(rules, Vec::new(), readings, EngineOptions::default())
}

/// Replays `readings` after restoring `initial` states, as after a restart.
pub fn replay(
    rules: Vec<AlarmRule>,
    initial: Vec<AlarmState>,
    readings: Vec<Reading>,
    options: EngineOptions,
) -> HarnessResult {
    let (engine, mut outputs) = Engine::new(RuleCatalog::from_rules(rules), options, EngineMetrics::new());
    engine.restore(initial);

    let mut events = Vec::new();
    for reading in &readings {
        engine.evaluate(reading);
        while let Ok(event) = outputs.events.try_recv() {
            events.push(event);
        }
    }

    let triggered_count = events
        .iter()
        .filter(|e| e.status == EventStatus::Triggered)
        .count();
    let cleared_count = events
        .iter()
        .filter(|e| e.status == EventStatus::Cleared)
        .count();

    HarnessResult {
        events,
        states: engine.states(),
        triggered_count,
        cleared_count,
    }
}
