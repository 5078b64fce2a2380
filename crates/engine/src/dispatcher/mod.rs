mod shard;

pub use shard::shard_for;

use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use vigil_common::reading::Reading;

use crate::alarm::Engine;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatcher is shut down")]
    Closed,
}

/// Fixed pool of evaluation workers. Each worker owns one bounded queue and
/// every device hashes to exactly one queue, so readings of a device are
/// evaluated one at a time in submission order while different devices run
/// in parallel.
pub struct Dispatcher {
    queues: RwLock<Vec<mpsc::Sender<Reading>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shards: usize,
}

impl Dispatcher {
    pub fn new(engine: Arc<Engine>, max_workers: usize, queue_capacity: usize) -> Self {
        let shards = max_workers.max(1);
        let mut queues = Vec::with_capacity(shards);
        let mut workers = Vec::with_capacity(shards);

        for shard in 0..shards {
            let (tx, mut rx) = mpsc::channel::<Reading>(queue_capacity.max(1));
            let engine = Arc::clone(&engine);
            workers.push(tokio::spawn(async move {
                while let Some(reading) = rx.recv().await {
                    let outcomes = engine.evaluate(&reading);
                    tracing::trace!(
                        shard,
                        device_id = %reading.device_id,
                        rules = outcomes.len(),
                        "reading evaluated"
                    );
                }
                tracing::debug!(shard, "dispatcher worker stopped");
            }));
            queues.push(tx);
        }

        Self {
            queues: RwLock::new(queues),
            workers: Mutex::new(workers),
            shards,
        }
    }

    /// Queues a reading on its device's worker, waiting while that queue is
    /// full.
    pub async fn submit(&self, reading: Reading) -> Result<(), DispatchError> {
        let tx = {
            let queues = self.queues.read().unwrap_or_else(|e| e.into_inner());
            queues
                .get(shard_for(&reading.device_id, self.shards))
                .cloned()
                .ok_or(DispatchError::Closed)?
        };
        tx.send(reading).await.map_err(|_| DispatchError::Closed)
    }

    pub fn shards(&self) -> usize {
        self.shards
    }

    /// Stops accepting readings and waits until every queued reading has
    /// been evaluated.
    pub async fn shutdown(&self) {
        self.queues
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();

        let workers = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "dispatcher worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{AlarmStatus, EngineOptions, Operator, RuleCatalog, RuleDraft};
    use crate::metrics::EngineMetrics;

    fn engine() -> Arc<Engine> {
        let rule = RuleDraft::simple("temp_high", "device-1", "temperature", Operator::GreaterThan, 25.0, 5_000, "")
            .into_rule("temp_high".into(), 0)
            .unwrap();
        let (engine, _outputs) = Engine::new(
            RuleCatalog::from_rules([rule]),
            EngineOptions::default(),
            EngineMetrics::new(),
        );
        Arc::new(engine)
    }

    #[tokio::test]
    async fn evaluates_in_order_and_drains_on_shutdown() {
        let engine = engine();
        let dispatcher = Dispatcher::new(Arc::clone(&engine), 4, 2);
        for t in 0..10 {
            let reading = Reading::new("device-1", t * 1_000).with_metric("temperature", 26.0);
            dispatcher.submit(reading).await.unwrap();
        }
        dispatcher.shutdown().await;

        let state = engine.state("temp_high").unwrap();
        assert_eq!(state.status, AlarmStatus::Active);
        assert_eq!(state.condition_since_ms, Some(0));
        assert_eq!(state.triggered_at_ms, Some(5_000));
        assert_eq!(state.last_evaluated_at_ms, Some(9_000));
    }

    #[tokio::test]
    async fn submit_after_shutdown_fails() {
        let dispatcher = Dispatcher::new(engine(), 2, 8);
        dispatcher.shutdown().await;
        let err = dispatcher
            .submit(Reading::new("device-1", 0).with_metric("temperature", 1.0))
            .await;
        assert!(matches!(err, Err(DispatchError::Closed)));
    }

    #[tokio::test]
    async fn zero_workers_clamped() {
        let dispatcher = Dispatcher::new(engine(), 0, 0);
        assert_eq!(dispatcher.shards(), 1);
        dispatcher
            .submit(Reading::new("device-1", 0).with_metric("temperature", 1.0))
            .await
            .unwrap();
        dispatcher.shutdown().await;
    }
}
