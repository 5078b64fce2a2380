use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use vigil_common::crypto::{sign_payload, SIGNATURE_HEADER};

use super::channel::{Notifier, NotifyError};
use crate::alarm::AlarmEvent;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

pub struct WebhookNotifier {
    url: String,
    secret: Vec<u8>,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: String, secret: Vec<u8>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            url,
            secret,
            client,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, event: &AlarmEvent) -> Result<(), NotifyError> {
        let body = serde_json::to_vec(event)?;
        let signature = sign_payload(&self.secret, &body);

        self.client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, &signature)
            .header(IDEMPOTENCY_HEADER, event.idempotency_key())
            .body(body)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        Ok(())
    }
}
