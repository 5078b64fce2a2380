use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::channel::Notifier;
use crate::alarm::{AlarmEvent, EventStatus};
use crate::dispatcher::shard_for;
use crate::metrics::EngineMetrics;

/// Drains the engine's event queue and fans every event out to the
/// configured notifiers. Events are routed to delivery workers by device, so
/// a device's events keep their order while a slow sink on one device never
/// holds back another. The notifiers for one event run concurrently and a
/// failing notifier never blocks the others.
pub struct NotifyLoop {
    rx: mpsc::UnboundedReceiver<AlarmEvent>,
    notifiers: Arc<Vec<Arc<dyn Notifier>>>,
    metrics: Arc<EngineMetrics>,
    shards: usize,
}

impl NotifyLoop {
    pub fn new(
        rx: mpsc::UnboundedReceiver<AlarmEvent>,
        notifiers: Vec<Arc<dyn Notifier>>,
        metrics: Arc<EngineMetrics>,
        shards: usize,
    ) -> Self {
        Self {
            rx,
            notifiers: Arc::new(notifiers),
            metrics,
            shards: shards.max(1),
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let (queues, workers) = self.spawn_workers();
        let route = |event: AlarmEvent| {
            let shard = shard_for(&event.device_id, queues.len());
            if queues[shard].send(event).is_err() {
                tracing::error!(shard, "notify worker gone, event dropped");
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    self.rx.close();
                    while let Some(event) = self.rx.recv().await {
                        route(event);
                    }
                    break;
                }
                event = self.rx.recv() => match event {
                    Some(event) => route(event),
                    None => break,
                },
            }
        }

        drop(queues);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "notify worker panicked");
            }
        }
        tracing::info!("notify loop stopped");
    }

    fn spawn_workers(&self) -> (Vec<mpsc::UnboundedSender<AlarmEvent>>, Vec<JoinHandle<()>>) {
        let mut queues = Vec::with_capacity(self.shards);
        let mut workers = Vec::with_capacity(self.shards);
        for shard in 0..self.shards {
            let (tx, mut rx) = mpsc::unbounded_channel::<AlarmEvent>();
            let notifiers = Arc::clone(&self.notifiers);
            let metrics = Arc::clone(&self.metrics);
            workers.push(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    deliver(&notifiers, &metrics, &event).await;
                }
                tracing::debug!(shard, "notify worker stopped");
            }));
            queues.push(tx);
        }
        (queues, workers)
    }
}

async fn deliver(notifiers: &[Arc<dyn Notifier>], metrics: &EngineMetrics, event: &AlarmEvent) {
    match event.status {
        EventStatus::Triggered => tracing::warn!(
            rule_id = %event.rule_id,
            device_id = %event.device_id,
            metric = %event.metric,
            value = event.value,
            threshold = event.threshold,
            message = %event.message,
            "alarm triggered"
        ),
        EventStatus::Cleared => tracing::info!(
            rule_id = %event.rule_id,
            device_id = %event.device_id,
            metric = %event.metric,
            value = event.value,
            "alarm cleared"
        ),
    }

    let results = join_all(notifiers.iter().map(|n| n.send(event))).await;
    for (notifier, result) in notifiers.iter().zip(results) {
        match result {
            Ok(()) => metrics.inc_notifications_sent(),
            Err(e) => {
                metrics.inc_notifications_failed();
                tracing::error!(
                    notifier = notifier.name(),
                    rule_id = %event.rule_id,
                    key = %event.idempotency_key(),
                    error = %e,
                    "notification lost after retries"
                );
            }
        }
    }
}
