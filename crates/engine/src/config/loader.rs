use std::path::Path;

use super::schema::EngineConfig;

pub const ENV_NATS_URL: &str = "VIGIL_NATS_URL";
pub const ENV_DATABASE_URL: &str = "VIGIL_DATABASE_URL";
pub const ENV_API_ADDR: &str = "VIGIL_API_ADDR";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("validation: {0}")]
    Validation(String),
}

/// Reads the YAML file (or starts from defaults), applies environment
/// overrides and validates the result.
pub fn load(path: Option<&Path>) -> Result<EngineConfig, LoadError> {
    let mut cfg = match path {
        Some(p) => parse(&std::fs::read_to_string(p)?)?,
        None => EngineConfig::default(),
    };
    apply_overrides(&mut cfg, |key| std::env::var(key).ok());
    validate(&cfg)?;
    Ok(cfg)
}

pub fn load_from_file(path: &Path) -> Result<EngineConfig, LoadError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

pub fn load_from_str(yaml: &str) -> Result<EngineConfig, LoadError> {
    let cfg = parse(yaml)?;
    validate(&cfg)?;
    Ok(cfg)
}

fn parse(yaml: &str) -> Result<EngineConfig, LoadError> {
    if yaml.trim().is_empty() {
        return Ok(EngineConfig::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn apply_overrides(cfg: &mut EngineConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_NATS_URL) {
        cfg.nats.url = url;
    }
    if let Some(url) = lookup(ENV_DATABASE_URL) {
        cfg.database.url = url;
    }
    if let Some(addr) = lookup(ENV_API_ADDR) {
        cfg.api.addr = addr;
    }
}

pub fn validate(cfg: &EngineConfig) -> Result<(), LoadError> {
    let fail = |msg: &str| Err(LoadError::Validation(msg.into()));

    if cfg.nats.url.trim().is_empty() {
        return fail("nats.url must not be empty");
    }
    if cfg.nats.ack_wait_secs == 0 || cfg.nats.max_deliver < 1 {
        return fail("nats.ack_wait_secs and nats.max_deliver must be > 0");
    }
    if cfg.database.url.trim().is_empty() {
        return fail("database.url must not be empty");
    }
    if cfg.database.max_connections == 0 {
        return fail("database.max_connections must be > 0");
    }
    if cfg.api.addr.parse::<std::net::SocketAddr>().is_err() {
        return fail("api.addr must be a socket address like 0.0.0.0:9090");
    }
    if cfg.processing.max_workers == 0 {
        return fail("processing.max_workers must be > 0");
    }
    if cfg.processing.queue_capacity == 0 {
        return fail("processing.queue_capacity must be > 0");
    }
    if cfg.processing.batch_size == 0 {
        return fail("processing.batch_size must be > 0");
    }
    if cfg.persistence.max_attempts == 0 {
        return fail("persistence.max_attempts must be > 0");
    }
    if cfg.persistence.flush_interval_ms == 0 {
        return fail("persistence.flush_interval_ms must be > 0");
    }
    if cfg.persistence.timeout_ms == 0 {
        return fail("persistence.timeout_ms must be > 0");
    }
    if let Some(hook) = &cfg.notify.webhook {
        if hook.url.trim().is_empty() {
            return fail("notify.webhook.url must not be empty");
        }
    }
    Ok(())
}
