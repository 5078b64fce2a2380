use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;

#[derive(Clone, Hash, Eq, PartialEq, Debug)]
pub struct MetricKey {
    pub device_id: String,
    pub metric: String,
}

impl MetricKey {
    pub fn new(device_id: &str, metric: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            metric: metric.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedValue {
    pub value: f64,
    pub timestamp_ms: i64,
}

/// Latest value per (device, metric). Last write wins by timestamp; writes to
/// the same key are serialized by the shard lock.
#[derive(Default)]
pub struct ReadingCache {
    values: DashMap<MetricKey, CachedValue>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the update was older than the cached value.
    pub fn update(&self, device_id: &str, metric: &str, value: f64, timestamp_ms: i64) -> bool {
        let next = CachedValue {
            value,
            timestamp_ms,
        };
        match self.values.entry(MetricKey::new(device_id, metric)) {
            Entry::Occupied(mut e) => {
                if timestamp_ms < e.get().timestamp_ms {
                    return false;
                }
                e.insert(next);
                true
            }
            Entry::Vacant(e) => {
                e.insert(next);
                true
            }
        }
    }

    pub fn get(&self, device_id: &str, metric: &str) -> Option<CachedValue> {
        self.values
            .get(&MetricKey::new(device_id, metric))
            .map(|v| *v)
    }

    pub fn device_count(&self) -> usize {
        self.values
            .iter()
            .map(|e| e.key().device_id.clone())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
