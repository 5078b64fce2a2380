//! Persistence contracts and their PostgreSQL / in-memory implementations.

mod error;
mod history;
mod memory;
pub mod migrator;
mod pool;
mod rule_repo;
mod state_store;
mod writer;

pub use error::{PersistError, StoreError};
pub use history::PgHistoryStore;
pub use memory::{MemoryHistoryStore, MemoryRuleRepository, MemoryStateStore};
pub use pool::create_pool;
pub use rule_repo::PgRuleRepository;
pub use state_store::PgStateStore;
pub use writer::{StateWriter, WriterConfig};

use async_trait::async_trait;

use crate::alarm::{AlarmEvent, AlarmRule, AlarmState};

/// Durable mirror of alarm evaluation state, one record per rule.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<AlarmState>, StoreError>;
    async fn save(&self, state: &AlarmState) -> Result<(), StoreError>;
    async fn delete(&self, rule_id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn load_all(&self) -> Result<Vec<AlarmRule>, StoreError>;
    /// Stores a new rule, failing with `StoreError::Conflict` when the id is taken.
    async fn insert(&self, rule: &AlarmRule) -> Result<(), StoreError>;
    async fn upsert(&self, rule: &AlarmRule) -> Result<(), StoreError>;
    /// Returns false when no rule had this id.
    async fn delete(&self, rule_id: &str) -> Result<bool, StoreError>;
}

/// Append-only log of trigger and clear events.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, event: &AlarmEvent) -> Result<(), StoreError>;
    /// Most recent events first.
    async fn recent(&self, limit: usize) -> Result<Vec<AlarmEvent>, StoreError>;
    /// Deletes events older than `cutoff_ms`, returning how many went.
    async fn purge_older_than(&self, cutoff_ms: i64) -> Result<u64, StoreError>;
}
