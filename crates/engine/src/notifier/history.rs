use async_trait::async_trait;
use std::sync::Arc;

use super::channel::{Notifier, NotifyError};
use crate::alarm::AlarmEvent;
use crate::storage::HistoryStore;

/// Records every event in the alarm history table.
pub struct HistoryNotifier {
    store: Arc<dyn HistoryStore>,
}

impl HistoryNotifier {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Notifier for HistoryNotifier {
    fn name(&self) -> &str {
        "history"
    }

    async fn send(&self, event: &AlarmEvent) -> Result<(), NotifyError> {
        self.store.append(event).await?;
        Ok(())
    }
}
