use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use super::{HistoryStore, RuleRepository, StateStore, StoreError};
use crate::alarm::{AlarmEvent, AlarmRule, AlarmState};

/// In-process state store. `set_failing(true)` makes every call return a
/// transient error until switched back.
#[derive(Default)]
pub struct MemoryStateStore {
    states: DashMap<String, AlarmState>,
    failing: AtomicBool,
    saves: AtomicU64,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get(&self, rule_id: &str) -> Option<AlarmState> {
        self.states.get(rule_id).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load_all(&self) -> Result<Vec<AlarmState>, StoreError> {
        self.check()?;
        Ok(self.states.iter().map(|s| s.value().clone()).collect())
    }

    async fn save(&self, state: &AlarmState) -> Result<(), StoreError> {
        self.check()?;
        self.states.insert(state.rule_id.clone(), state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, rule_id: &str) -> Result<(), StoreError> {
        self.check()?;
        self.states.remove(rule_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRuleRepository {
    rules: DashMap<String, AlarmRule>,
}

impl MemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: impl IntoIterator<Item = AlarmRule>) -> Self {
        let repo = Self::new();
        for r in rules {
            repo.rules.insert(r.id.clone(), r);
        }
        repo
    }
}

#[async_trait]
impl RuleRepository for MemoryRuleRepository {
    async fn load_all(&self) -> Result<Vec<AlarmRule>, StoreError> {
        let mut rules: Vec<_> = self.rules.iter().map(|r| r.value().clone()).collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rules)
    }

    async fn insert(&self, rule: &AlarmRule) -> Result<(), StoreError> {
        match self.rules.entry(rule.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(rule.id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(rule.clone());
                Ok(())
            }
        }
    }

    async fn upsert(&self, rule: &AlarmRule) -> Result<(), StoreError> {
        self.rules.insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    async fn delete(&self, rule_id: &str) -> Result<bool, StoreError> {
        Ok(self.rules.remove(rule_id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    events: Mutex<Vec<AlarmEvent>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, event: &AlarmEvent) -> Result<(), StoreError> {
        let mut events = self
            .events
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if !events.iter().any(|e| e.id == event.id) {
            events.push(event.clone());
        }
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AlarmEvent>, StoreError> {
        let events = self
            .events
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut out = events.clone();
        out.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        out.truncate(limit);
        Ok(out)
    }

    async fn purge_older_than(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        let mut events = self
            .events
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let before = events.len();
        events.retain(|e| e.timestamp_ms >= cutoff_ms);
        Ok((before - events.len()) as u64)
    }
}
