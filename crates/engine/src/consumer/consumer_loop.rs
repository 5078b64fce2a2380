use async_nats::jetstream::consumer::PullConsumer;
use async_nats::jetstream::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

use super::handler::{accept_payload, extract_header, pull_batch, HandleError};
use crate::dispatcher::Dispatcher;
use crate::metrics::EngineMetrics;

const IDLE_WAIT: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

pub struct ConsumerLoop {
    consumer: PullConsumer,
    batch_size: usize,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<EngineMetrics>,
}

impl ConsumerLoop {
    pub fn new(
        consumer: PullConsumer,
        batch_size: usize,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            consumer,
            batch_size,
            dispatcher,
            metrics,
        }
    }

    /// Pulls until `shutdown` fires. Messages are acked once the dispatcher
    /// accepted them; malformed ones are acked to discard them.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = IDLE_WAIT;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pulled = tokio::select! {
                _ = shutdown.changed() => break,
                r = pull_batch(&self.consumer, self.batch_size) => r,
            };

            let messages = match pulled {
                Ok(messages) => {
                    backoff = IDLE_WAIT;
                    messages
                }
                Err(e) => {
                    tracing::warn!(error = %e, retry_in_ms = backoff.as_millis() as u64, "pull failed");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };

            if messages.is_empty() {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(IDLE_WAIT) => {}
                }
                continue;
            }

            let span = tracing::info_span!("consume_batch", messages = messages.len());
            if !self.handle_batch(messages).instrument(span).await {
                break;
            }
        }
        tracing::info!("consumer loop stopped");
    }

    /// Returns false once the dispatcher stopped accepting readings.
    async fn handle_batch(&self, messages: Vec<Message>) -> bool {
        for msg in messages {
            match accept_payload(&msg.payload, &self.dispatcher, &self.metrics).await {
                Ok(()) => {}
                Err(HandleError::Malformed(e)) => {
                    tracing::warn!(
                        subject = %msg.subject,
                        message_id = extract_header(&msg, "Nats-Msg-Id").as_deref().unwrap_or("-"),
                        error = %e,
                        "dropping malformed reading"
                    );
                }
                Err(HandleError::Dispatch(e)) => {
                    tracing::info!(error = %e, "dispatcher closed, leaving message for redelivery");
                    return false;
                }
            }
            if let Err(e) = msg.ack().await {
                tracing::error!(error = %e, "ack failed");
            }
        }
        true
    }
}
