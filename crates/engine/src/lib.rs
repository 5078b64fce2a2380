pub mod alarm;
pub mod api;
pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod metrics;
pub mod notifier;
pub mod run;
pub mod shutdown;
pub mod storage;

/// Wall-clock epoch milliseconds.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
