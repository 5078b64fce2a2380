use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::engine::Engine;
use super::rule::{AlarmRule, RuleDraft, RuleError};
use crate::storage::{RuleRepository, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Rule management on top of the catalog: every change goes to the
/// repository first, then to the catalog, and deletes cascade to the alarm
/// state. Changes are serialized so concurrent edits of one id cannot
/// interleave.
pub struct RuleManager {
    engine: Arc<Engine>,
    repo: Arc<dyn RuleRepository>,
    lock: Mutex<()>,
}

impl RuleManager {
    pub fn new(engine: Arc<Engine>, repo: Arc<dyn RuleRepository>) -> Self {
        Self {
            engine,
            repo,
            lock: Mutex::new(()),
        }
    }

    pub fn list(&self) -> Vec<Arc<AlarmRule>> {
        self.engine.catalog().list()
    }

    pub fn get(&self, rule_id: &str) -> Result<Arc<AlarmRule>, RuleError> {
        self.engine
            .catalog()
            .get(rule_id)
            .ok_or_else(|| RuleError::NotFound(rule_id.to_string()))
    }

    pub async fn create(&self, draft: RuleDraft) -> Result<Arc<AlarmRule>, RuleError> {
        let _guard = self.lock.lock().await;

        let id = draft
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if self.engine.catalog().contains(&id) {
            return Err(RuleError::Duplicate(id));
        }

        let rule = draft.into_rule(id, crate::now_ms())?;
        self.repo.insert(&rule).await.map_err(|e| match e {
            StoreError::Conflict(id) => RuleError::Duplicate(id),
            other => RuleError::Storage(other),
        })?;
        self.engine.catalog().upsert(rule.clone());
        tracing::info!(rule_id = %rule.id, kind = rule.kind().as_str(), device_id = %rule.device_id, "rule created");
        Ok(Arc::new(rule))
    }

    /// Wholesale replacement. The alarm state is kept.
    pub async fn replace(&self, rule_id: &str, draft: RuleDraft) -> Result<Arc<AlarmRule>, RuleError> {
        let _guard = self.lock.lock().await;

        let existing = self.get(rule_id)?;
        let mut rule = draft.into_rule(rule_id.to_string(), existing.created_at_ms)?;
        rule.updated_at_ms = crate::now_ms();

        self.repo.upsert(&rule).await?;
        self.engine.catalog().upsert(rule.clone());
        tracing::info!(rule_id, "rule replaced");
        Ok(Arc::new(rule))
    }

    pub async fn remove(&self, rule_id: &str) -> Result<(), RuleError> {
        let _guard = self.lock.lock().await;

        self.get(rule_id)?;
        self.repo.delete(rule_id).await?;
        self.engine.catalog().remove(rule_id)?;
        self.engine.forget(rule_id);
        tracing::info!(rule_id, "rule removed");
        Ok(())
    }

    /// Loads the repository contents into the catalog, dropping rules that
    /// were removed elsewhere together with their state.
    pub async fn refresh(&self) -> Result<RefreshSummary, RuleError> {
        let _guard = self.lock.lock().await;

        let rules = self.repo.load_all().await?;
        let catalog = self.engine.catalog();
        let mut summary = RefreshSummary::default();
        let keep: HashSet<String> = rules.iter().map(|r| r.id.clone()).collect();

        for rule in rules {
            match catalog.get(&rule.id) {
                Some(current) if *current == rule => {}
                Some(_) => {
                    catalog.upsert(rule);
                    summary.updated += 1;
                }
                None => {
                    catalog.upsert(rule);
                    summary.added += 1;
                }
            }
        }

        for id in catalog.ids() {
            if !keep.contains(&id) && catalog.remove(&id).is_ok() {
                self.engine.forget(&id);
                summary.removed += 1;
            }
        }

        if summary != RefreshSummary::default() {
            tracing::info!(
                added = summary.added,
                updated = summary.updated,
                removed = summary.removed,
                "rule catalog refreshed"
            );
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{
        AlarmStatus, EngineOptions, EngineOutputs, Operator, RuleCatalog, StateWrite,
    };
    use crate::metrics::EngineMetrics;
    use crate::storage::MemoryRuleRepository;
    use vigil_common::reading::Reading;

    fn setup() -> (RuleManager, Arc<Engine>, Arc<MemoryRuleRepository>, EngineOutputs) {
        let (engine, outputs) = Engine::new(RuleCatalog::new(), EngineOptions::default(), EngineMetrics::new());
        let engine = Arc::new(engine);
        let repo = Arc::new(MemoryRuleRepository::new());
        let manager = RuleManager::new(Arc::clone(&engine), repo.clone());
        (manager, engine, repo, outputs)
    }

    fn draft() -> RuleDraft {
        RuleDraft::simple("temp_high", "device-1", "temperature", Operator::GreaterThan, 25.0, 0, "too hot")
    }

    #[tokio::test]
    async fn create_generates_id_and_persists() {
        let (manager, _engine, repo, _out) = setup();
        let rule = manager.create(draft()).await.unwrap();
        assert!(uuid::Uuid::parse_str(&rule.id).is_ok());
        assert_eq!(repo.load_all().await.unwrap().len(), 1);
        assert_eq!(manager.list().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_id_rejected() {
        let (manager, _engine, _repo, _out) = setup();
        manager.create(draft().with_id("r1")).await.unwrap();
        let err = manager.create(draft().with_id("r1")).await.unwrap_err();
        assert!(matches!(err, RuleError::Duplicate(_)));
    }

    #[tokio::test]
    async fn duplicate_of_stored_rule_rejected() {
        let (manager, _engine, repo, _out) = setup();
        let stored = draft().with_id("r1").into_rule("r1".into(), 5).unwrap();
        repo.upsert(&stored).await.unwrap();

        let mut clash = draft().with_id("r1");
        clash.threshold = 99.0;
        let err = manager.create(clash).await.unwrap_err();
        assert!(matches!(err, RuleError::Duplicate(ref id) if id == "r1"));
        assert_eq!(repo.load_all().await.unwrap(), vec![stored]);
        assert!(manager.list().is_empty());
    }

    #[tokio::test]
    async fn invalid_definition_never_enters_catalog() {
        let (manager, _engine, repo, _out) = setup();
        let mut bad = draft();
        bad.duration_ms = -5;
        assert!(matches!(
            manager.create(bad).await,
            Err(RuleError::InvalidDefinition(_))
        ));
        assert!(manager.list().is_empty());
        assert!(repo.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_keeps_state_and_created_at() {
        let (manager, engine, _repo, _out) = setup();
        let created = manager.create(draft().with_id("r1")).await.unwrap();
        engine.evaluate(&Reading::new("device-1", 0).with_metric("temperature", 30.0));
        assert_eq!(engine.state("r1").unwrap().status, AlarmStatus::Active);

        let mut edited = draft();
        edited.threshold = 40.0;
        let replaced = manager.replace("r1", edited).await.unwrap();
        assert_eq!(replaced.created_at_ms, created.created_at_ms);
        assert_eq!(engine.state("r1").unwrap().status, AlarmStatus::Active);

        engine.evaluate(&Reading::new("device-1", 1_000).with_metric("temperature", 30.0));
        assert_eq!(engine.state("r1").unwrap().status, AlarmStatus::Inactive);
    }

    #[tokio::test]
    async fn replace_missing_is_not_found() {
        let (manager, _engine, _repo, _out) = setup();
        assert!(matches!(
            manager.replace("nope", draft()).await,
            Err(RuleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn remove_cascades_to_state() {
        let (manager, engine, repo, mut out) = setup();
        manager.create(draft().with_id("r1")).await.unwrap();
        engine.evaluate(&Reading::new("device-1", 0).with_metric("temperature", 30.0));
        manager.remove("r1").await.unwrap();

        assert!(engine.state("r1").is_none());
        assert!(repo.load_all().await.unwrap().is_empty());
        let mut last = None;
        while let Ok(w) = out.writes.try_recv() {
            last = Some(w);
        }
        assert_eq!(last, Some(StateWrite::Delete("r1".into())));

        manager.create(draft().with_id("r1")).await.unwrap();
        engine.evaluate(&Reading::new("device-1", 5_000).with_metric("temperature", 20.0));
        assert_eq!(engine.state("r1").unwrap().status, AlarmStatus::Inactive);
    }

    #[tokio::test]
    async fn remove_missing_is_not_found() {
        let (manager, _engine, _repo, _out) = setup();
        assert!(matches!(manager.remove("nope").await, Err(RuleError::NotFound(_))));
    }

    #[tokio::test]
    async fn refresh_syncs_with_repository() {
        let (manager, engine, repo, _out) = setup();
        manager.create(draft().with_id("keep")).await.unwrap();
        manager.create(draft().with_id("gone")).await.unwrap();
        engine.evaluate(&Reading::new("device-1", 0).with_metric("temperature", 30.0));

        repo.delete("gone").await.unwrap();
        let added = draft().into_rule("new".into(), 0).unwrap();
        repo.upsert(&added).await.unwrap();

        let summary = manager.refresh().await.unwrap();
        assert_eq!(summary, RefreshSummary { added: 1, updated: 0, removed: 1 });
        assert!(engine.state("gone").is_none());
        assert!(engine.catalog().contains("new"));

        assert_eq!(manager.refresh().await.unwrap(), RefreshSummary::default());
    }
}
