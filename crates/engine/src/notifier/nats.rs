use async_nats::jetstream;
use async_trait::async_trait;
use vigil_common::nats_config::alarms_subject_for;

use super::channel::{Notifier, NotifyError};
use crate::alarm::AlarmEvent;

/// Publishes alarm events to JetStream and waits for the stream ack.
/// `Nats-Msg-Id` lets the stream drop republished duplicates.
pub struct NatsNotifier {
    js: jetstream::Context,
}

impl NatsNotifier {
    pub fn new(js: jetstream::Context) -> Self {
        Self { js }
    }
}

#[async_trait]
impl Notifier for NatsNotifier {
    fn name(&self) -> &str {
        "nats"
    }

    async fn send(&self, event: &AlarmEvent) -> Result<(), NotifyError> {
        let subject = alarms_subject_for(&event.device_id);
        let payload = serde_json::to_vec(event)?;
        let key = event.idempotency_key();

        let mut headers = async_nats::HeaderMap::new();
        headers.insert("Nats-Msg-Id", key.as_str());
        headers.insert("X-Rule-Id", event.rule_id.as_str());
        headers.insert("X-Alarm-Status", event.status.as_str());

        self.js
            .publish_with_headers(subject, headers, payload.into())
            .await
            .map_err(|e| NotifyError::Publish(e.to_string()))?
            .await
            .map_err(|e| NotifyError::Publish(e.to_string()))?;

        Ok(())
    }
}
