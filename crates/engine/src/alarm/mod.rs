mod cache;
mod catalog;
mod engine;
mod event;
pub mod harness;
mod manager;
mod rule;
mod state;

pub use cache::{CachedValue, ReadingCache};
pub use catalog::RuleCatalog;
pub use engine::{
    effective_condition, Engine, EngineOptions, EngineOutputs, RuleOutcome, StateWrite,
    StatusCounts,
};
pub use event::{AlarmEvent, EventStatus};
pub use manager::{RefreshSummary, RuleManager};
pub use rule::{AlarmRule, Operator, RuleDraft, RuleError, RuleKind, ShuntCondition};
pub use state::{AlarmState, AlarmStatus, Transition};
