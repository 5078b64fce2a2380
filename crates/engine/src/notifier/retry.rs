use async_trait::async_trait;

use super::channel::{Notifier, NotifyError};
use crate::alarm::AlarmEvent;

/// Retries the inner notifier with exponential backoff; delay doubles from
/// `base_delay_ms` on every failed attempt.
pub struct RetryNotifier<N: Notifier> {
    inner: N,
    max_retries: u32,
    base_delay_ms: u64,
}

impl<N: Notifier> RetryNotifier<N> {
    pub fn new(inner: N, max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            inner,
            max_retries,
            base_delay_ms,
        }
    }
}

#[async_trait]
impl<N: Notifier> Notifier for RetryNotifier<N> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(&self, event: &AlarmEvent) -> Result<(), NotifyError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.send(event).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    let delay = self.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
                    tracing::warn!(
                        notifier = self.inner.name(),
                        attempt = attempt + 1,
                        error = %e,
                        "notification failed, retrying"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
