mod loader;
mod schema;

pub use loader::{
    apply_overrides, load, load_from_file, load_from_str, validate, LoadError, ENV_API_ADDR,
    ENV_DATABASE_URL, ENV_NATS_URL,
};
pub use schema::{
    AlarmsConfig, ApiConfig, DatabaseConfig, EngineConfig, NatsConfig, NotifyConfig,
    PersistenceConfig, ProcessingConfig, WebhookConfig,
};
