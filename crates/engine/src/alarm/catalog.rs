use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::rule::{AlarmRule, RuleError};

/// In-memory view of the rule set, indexed by every device a rule reads.
///
/// Each rule is stored behind an `Arc` and swapped as a whole, so a reader
/// either sees the old definition or the new one. The device index may
/// briefly lag a swap; `rules_for` re-checks each candidate against the
/// device it was asked about.
#[derive(Clone, Default)]
pub struct RuleCatalog {
    rules: Arc<DashMap<String, Arc<AlarmRule>>>,
    by_device: Arc<DashMap<String, BTreeSet<String>>>,
}

impl RuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: impl IntoIterator<Item = AlarmRule>) -> Self {
        let catalog = Self::new();
        for rule in rules {
            catalog.upsert(rule);
        }
        catalog
    }

    /// Enabled rules whose primary or shunt device is `device_id`, by id.
    pub fn rules_for(&self, device_id: &str) -> Vec<Arc<AlarmRule>> {
        let ids: Vec<String> = match self.by_device.get(device_id) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return Vec::new(),
        };
        ids.iter()
            .filter_map(|id| self.rules.get(id).map(|r| Arc::clone(r.value())))
            .filter(|r| r.enabled && r.references(device_id))
            .collect()
    }

    /// Inserts or atomically replaces a rule. Returns the previous definition.
    pub fn upsert(&self, rule: AlarmRule) -> Option<Arc<AlarmRule>> {
        let id = rule.id.clone();
        let new_devices: Vec<String> = rule.devices().into_iter().map(String::from).collect();

        for device in &new_devices {
            self.by_device
                .entry(device.clone())
                .or_default()
                .insert(id.clone());
        }

        let previous = self.rules.insert(id.clone(), Arc::new(rule));

        if let Some(prev) = &previous {
            for device in prev.devices() {
                if !new_devices.iter().any(|d| d == device) {
                    self.unindex(device, &id);
                }
            }
        }
        previous
    }

    pub fn remove(&self, rule_id: &str) -> Result<Arc<AlarmRule>, RuleError> {
        let (_, rule) = self
            .rules
            .remove(rule_id)
            .ok_or_else(|| RuleError::NotFound(rule_id.to_string()))?;
        for device in rule.devices() {
            self.unindex(device, rule_id);
        }
        Ok(rule)
    }

    fn unindex(&self, device_id: &str, rule_id: &str) {
        self.by_device.remove_if_mut(device_id, |_, ids| {
            ids.remove(rule_id);
            ids.is_empty()
        });
    }

    pub fn get(&self, rule_id: &str) -> Option<Arc<AlarmRule>> {
        self.rules.get(rule_id).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, rule_id: &str) -> bool {
        self.rules.contains_key(rule_id)
    }

    pub fn list(&self) -> Vec<Arc<AlarmRule>> {
        let mut out: Vec<_> = self.rules.iter().map(|r| Arc::clone(r.value())).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn ids(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::rule::{Operator, RuleDraft, ShuntCondition};

    fn simple(id: &str, device: &str) -> AlarmRule {
        RuleDraft::simple(id, device, "temperature", Operator::GreaterThan, 25.0, 0, "")
            .into_rule(id.into(), 0)
            .unwrap()
    }

    fn conditional(id: &str, device: &str, shunt_device: &str) -> AlarmRule {
        RuleDraft::conditional(
            id,
            device,
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
            "",
        )
        .into_rule(id.into(), 0)
        .unwrap()
    }

    #[test]
    fn rules_for_matches_primary_device() {
        let catalog = RuleCatalog::from_rules([simple("b", "d1"), simple("a", "d1"), simple("c", "d2")]);
        let ids: Vec<_> = catalog.rules_for("d1").iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(catalog.rules_for("d9").is_empty());
    }

    #[test]
    fn rules_for_cross_indexes_shunt_device() {
        let catalog = RuleCatalog::from_rules([conditional("r1", "d1", "d2")]);
        assert_eq!(catalog.rules_for("d1").len(), 1);
        assert_eq!(catalog.rules_for("d2").len(), 1);
    }

    #[test]
    fn disabled_rules_skipped() {
        let mut rule = simple("r1", "d1");
        rule.enabled = false;
        let catalog = RuleCatalog::from_rules([rule]);
        assert!(catalog.rules_for("d1").is_empty());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn upsert_replaces_and_reindexes() {
        let catalog = RuleCatalog::new();
        catalog.upsert(simple("r1", "d1"));
        let prev = catalog.upsert(simple("r1", "d2"));
        assert_eq!(prev.unwrap().device_id, "d1");
        assert!(catalog.rules_for("d1").is_empty());
        assert_eq!(catalog.rules_for("d2").len(), 1);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn remove_missing_is_not_found() {
        let catalog = RuleCatalog::new();
        assert!(matches!(catalog.remove("nope"), Err(RuleError::NotFound(_))));
    }

    #[test]
    fn remove_unindexes() {
        let catalog = RuleCatalog::from_rules([conditional("r1", "d1", "d2")]);
        catalog.remove("r1").unwrap();
        assert!(catalog.rules_for("d1").is_empty());
        assert!(catalog.rules_for("d2").is_empty());
        assert!(catalog.is_empty());
    }

    #[test]
    fn list_sorted_by_id() {
        let catalog = RuleCatalog::from_rules([simple("z", "d1"), simple("m", "d1"), simple("a", "d2")]);
        let ids: Vec<_> = catalog.list().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }
}
