use async_nats::jetstream::consumer::PullConsumer;
use async_nats::jetstream::Message;
use futures::StreamExt;
use vigil_common::reading::{decode_reading, ReadingError};

use crate::dispatcher::{DispatchError, Dispatcher};
use crate::metrics::EngineMetrics;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("malformed reading: {0}")]
    Malformed(#[from] ReadingError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Decodes one payload and hands it to the dispatcher. A malformed payload
/// is counted and reported but never reaches the engine.
pub async fn accept_payload(
    payload: &[u8],
    dispatcher: &Dispatcher,
    metrics: &EngineMetrics,
) -> Result<(), HandleError> {
    metrics.inc_readings_received();
    let reading = match decode_reading(payload) {
        Ok(r) => r,
        Err(e) => {
            metrics.inc_readings_malformed();
            return Err(e.into());
        }
    };
    dispatcher.submit(reading).await?;
    Ok(())
}

pub fn extract_header(msg: &Message, key: &str) -> Option<String> {
    msg.headers
        .as_ref()?
        .get(key)
        .map(|v| v.to_string())
}

pub async fn pull_batch(
    consumer: &PullConsumer,
    max_messages: usize,
) -> Result<Vec<Message>, BoxError> {
    let mut messages = consumer.fetch().max_messages(max_messages).messages().await?;
    let mut batch = Vec::with_capacity(max_messages);
    while let Some(next) = messages.next().await {
        match next {
            Ok(msg) => batch.push(msg),
            Err(e) => {
                tracing::warn!(error = %e, "message fetch error");
                break;
            }
        }
    }
    Ok(batch)
}
