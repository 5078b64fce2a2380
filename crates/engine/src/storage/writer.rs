use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use vigil_common::retry::{retry_async_if, RetryConfig};

use super::{PersistError, StateStore, StoreError};
use crate::alarm::StateWrite;
use crate::metrics::EngineMetrics;

#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub flush_interval: Duration,
    pub timeout: Duration,
    pub retry: RetryConfig,
    /// Consecutive failed flush rounds between ERROR escalations; 0 never escalates.
    pub escalate_after_failures: u32,
    /// Consecutive failed flush rounds after which the writer stops with
    /// `PersistError::Unavailable`; 0 keeps retrying forever.
    pub shutdown_after_failures: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(2),
            retry: RetryConfig::default(),
            escalate_after_failures: 30,
            shutdown_after_failures: 0,
        }
    }
}

/// Write-behind mirror of the engine's alarm states.
///
/// Writes are coalesced per rule, so a rule that changes several times while
/// storage is slow is written once with its latest state.
pub struct StateWriter {
    store: Arc<dyn StateStore>,
    rx: mpsc::UnboundedReceiver<StateWrite>,
    config: WriterConfig,
    metrics: Arc<EngineMetrics>,
    backlog: HashMap<String, StateWrite>,
}

impl StateWriter {
    pub fn new(
        store: Arc<dyn StateStore>,
        rx: mpsc::UnboundedReceiver<StateWrite>,
        config: WriterConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            store,
            rx,
            config,
            metrics,
            backlog: HashMap::new(),
        }
    }

    /// Runs until the channel closes or `shutdown` fires, then drains and
    /// flushes once more.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), PersistError> {
        let mut ticker = tokio::time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failed_rounds = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    self.rx.close();
                    while let Some(write) = self.rx.recv().await {
                        self.enqueue(write);
                    }
                    break;
                }
                write = self.rx.recv() => {
                    let Some(write) = write else { break };
                    self.enqueue(write);
                    while let Ok(more) = self.rx.try_recv() {
                        self.enqueue(more);
                    }
                    if failed_rounds > 0 {
                        continue;
                    }
                }
                _ = ticker.tick() => {
                    if self.backlog.is_empty() {
                        continue;
                    }
                }
            }

            if self.flush().await {
                failed_rounds = 0;
            } else {
                failed_rounds += 1;
                tracing::warn!(
                    failed_rounds,
                    pending = self.backlog.len(),
                    "state store unavailable, keeping writes queued"
                );
                let escalate = self.config.escalate_after_failures;
                if escalate > 0 && failed_rounds % escalate == 0 {
                    tracing::error!(
                        failed_rounds,
                        pending = self.backlog.len(),
                        "state store still unavailable, alarm state is not durable"
                    );
                }
                if self.config.shutdown_after_failures > 0
                    && failed_rounds >= self.config.shutdown_after_failures
                {
                    tracing::error!(
                        failed_rounds,
                        pending = self.backlog.len(),
                        "state store unavailable, giving up"
                    );
                    return Err(PersistError::Unavailable {
                        rounds: failed_rounds,
                        pending: self.backlog.len(),
                    });
                }
            }
        }

        self.flush().await;
        if !self.backlog.is_empty() {
            tracing::error!(pending = self.backlog.len(), "state writes lost at shutdown");
        }
        Ok(())
    }

    fn enqueue(&mut self, write: StateWrite) {
        self.backlog.insert(write.rule_id().to_string(), write);
    }

    /// Tries every queued write once (with retry). After the first transient
    /// failure the rest stay queued untried. Returns false if anything is
    /// still queued for retry.
    async fn flush(&mut self) -> bool {
        let pending: Vec<StateWrite> = self.backlog.drain().map(|(_, w)| w).collect();
        let mut healthy = true;

        for write in pending {
            if !healthy {
                self.enqueue(write);
                continue;
            }
            match self.apply(&write).await {
                Ok(()) => self.metrics.add_state_writes_ok(1),
                Err(e) if e.is_transient() => {
                    self.metrics.add_state_writes_failed(1);
                    tracing::warn!(rule_id = write.rule_id(), error = %e, "state write failed, will retry");
                    healthy = false;
                    self.enqueue(write);
                }
                Err(e) => {
                    self.metrics.add_state_writes_failed(1);
                    tracing::error!(rule_id = write.rule_id(), error = %e, "dropping state write");
                }
            }
        }
        healthy
    }

    async fn apply(&self, write: &StateWrite) -> Result<(), StoreError> {
        let timeout = self.config.timeout;
        retry_async_if(
            &self.config.retry,
            || async move {
                let op = async {
                    match write {
                        StateWrite::Save(state) => self.store.save(state).await,
                        StateWrite::Delete(rule_id) => self.store.delete(rule_id).await,
                    }
                };
                tokio::time::timeout(timeout, op)
                    .await
                    .map_err(|_| StoreError::Timeout(timeout))?
            },
            StoreError::is_transient,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmState;
    use crate::storage::MemoryStateStore;

    fn fast_config(shutdown_after_failures: u32) -> WriterConfig {
        WriterConfig {
            flush_interval: Duration::from_millis(10),
            timeout: Duration::from_millis(50),
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                backoff_factor: 2.0,
                max_delay: Duration::from_millis(5),
            },
            escalate_after_failures: 2,
            shutdown_after_failures,
        }
    }

    fn pending(rule_id: &str, since: i64) -> AlarmState {
        let mut s = AlarmState::new(rule_id, "device-1");
        s.advance(true, since, 60_000, false);
        s
    }

    #[tokio::test]
    async fn writes_reach_store() {
        let store = Arc::new(MemoryStateStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let writer = StateWriter::new(store.clone(), rx, fast_config(0), EngineMetrics::new());
        let handle = tokio::spawn(writer.run(stop_rx));

        tx.send(StateWrite::Save(pending("r1", 0))).unwrap();
        tx.send(StateWrite::Save(pending("r2", 0))).unwrap();
        tx.send(StateWrite::Delete("r2".into())).unwrap();
        drop(tx);

        handle.await.unwrap().unwrap();
        assert!(store.get("r1").is_some());
        assert!(store.get("r2").is_none());
    }

    #[tokio::test]
    async fn coalesces_per_rule() {
        let store = Arc::new(MemoryStateStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let (_stop_tx, stop_rx) = watch::channel(false);
        for since in 0..5 {
            tx.send(StateWrite::Save(pending("r1", since))).unwrap();
        }
        drop(tx);
        StateWriter::new(store.clone(), rx, fast_config(0), EngineMetrics::new())
            .run(stop_rx)
            .await
            .unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.get("r1").unwrap().condition_since_ms, Some(4));
    }

    #[tokio::test]
    async fn retries_after_outage() {
        let store = Arc::new(MemoryStateStore::new());
        store.set_failing(true);
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let metrics = EngineMetrics::new();
        let handle = tokio::spawn(
            StateWriter::new(store.clone(), rx, fast_config(0), metrics.clone()).run(stop_rx),
        );

        tx.send(StateWrite::Save(pending("r1", 0))).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get("r1").is_none());
        assert!(metrics.state_writes_failed_val() > 0);

        store.set_failing(false);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get("r1").is_some());

        stop_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn default_config_keeps_retrying_through_outage() {
        let store = Arc::new(MemoryStateStore::new());
        store.set_failing(true);
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let metrics = EngineMetrics::new();
        let config = WriterConfig {
            flush_interval: Duration::from_millis(5),
            timeout: Duration::from_millis(20),
            retry: RetryConfig {
                max_attempts: 1,
                ..RetryConfig::default()
            },
            ..WriterConfig::default()
        };
        assert_eq!(config.shutdown_after_failures, 0);
        let mut handle = tokio::spawn(
            StateWriter::new(store.clone(), rx, config, metrics.clone()).run(stop_rx),
        );

        tx.send(StateWrite::Save(pending("r1", 0))).unwrap();
        let early = tokio::time::timeout(Duration::from_millis(400), &mut handle).await;
        assert!(early.is_err(), "writer stopped during outage: {early:?}");
        assert!(metrics.state_writes_failed_val() >= 30);

        store.set_failing(false);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get("r1").is_some());

        stop_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn opt_in_shutdown_when_store_stays_down() {
        let store = Arc::new(MemoryStateStore::new());
        store.set_failing(true);
        let (tx, rx) = mpsc::unbounded_channel();
        let (_stop_tx, stop_rx) = watch::channel(false);
        tx.send(StateWrite::Save(pending("r1", 0))).unwrap();

        let result = StateWriter::new(store, rx, fast_config(3), EngineMetrics::new())
            .run(stop_rx)
            .await;
        assert!(matches!(
            result,
            Err(PersistError::Unavailable { rounds: 3, pending: 1 })
        ));
        drop(tx);
    }

    #[tokio::test]
    async fn shutdown_drains_queue() {
        let store = Arc::new(MemoryStateStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        tx.send(StateWrite::Save(pending("r1", 0))).unwrap();
        tx.send(StateWrite::Save(pending("r2", 0))).unwrap();
        stop_tx.send(true).unwrap();

        StateWriter::new(store.clone(), rx, fast_config(0), EngineMetrics::new())
            .run(stop_rx)
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
        assert!(tx.send(StateWrite::Delete("r1".into())).is_err());
    }
}
