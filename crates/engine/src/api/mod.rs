mod alarms;
mod error;
mod health;
mod metrics;
mod rules;
mod server;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::alarm::{AlarmRule, Engine, EngineOptions, EngineOutputs, RuleCatalog, RuleManager};
use crate::metrics::EngineMetrics;
use crate::storage::{HistoryStore, MemoryHistoryStore, MemoryRuleRepository};

pub use error::ApiError;
pub use server::{router, serve};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub rules: Arc<RuleManager>,
    pub history: Arc<dyn HistoryStore>,
    pub ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(
        engine: Arc<Engine>,
        rules: Arc<RuleManager>,
        history: Arc<dyn HistoryStore>,
        ready: Arc<AtomicBool>,
    ) -> Self {
        Self {
            engine,
            rules,
            history,
            ready,
        }
    }

    /// State over fresh in-memory stores, not yet ready.
    pub fn in_memory(rules: Vec<AlarmRule>) -> (Self, EngineOutputs) {
        let repo = Arc::new(MemoryRuleRepository::with_rules(rules.clone()));
        let (engine, outputs) = Engine::new(
            RuleCatalog::from_rules(rules),
            EngineOptions::default(),
            EngineMetrics::new(),
        );
        let engine = Arc::new(engine);
        let manager = Arc::new(RuleManager::new(Arc::clone(&engine), repo));
        let state = Self::new(
            engine,
            manager,
            Arc::new(MemoryHistoryStore::new()),
            Arc::new(AtomicBool::new(false)),
        );
        (state, outputs)
    }
}
