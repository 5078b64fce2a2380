use async_trait::async_trait;

use crate::alarm::AlarmEvent;
use crate::storage::StoreError;

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, event: &AlarmEvent) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("publish: {0}")]
    Publish(String),
    #[error("http: {0}")]
    Http(String),
    #[error("history: {0}")]
    History(#[from] StoreError),
}
