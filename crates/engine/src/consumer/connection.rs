use std::time::Duration;

use async_nats::jetstream::{self, consumer::PullConsumer, stream::Stream};

use vigil_common::nats_config::{StreamConfig, CONSUMER_NAME, READINGS_STREAM, READINGS_SUBJECT};

use crate::config::NatsConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Connects with unbounded initial retries so the engine can start before the broker.
pub async fn connect_jetstream(url: &str) -> Result<jetstream::Context, BoxError> {
    let client = async_nats::ConnectOptions::new()
        .name(CONSUMER_NAME)
        .retry_on_initial_connect()
        .connect(url)
        .await?;
    Ok(jetstream::new(client))
}

pub async fn ensure_stream(js: &jetstream::Context, config: &StreamConfig) -> Result<Stream, BoxError> {
    let stream = js
        .get_or_create_stream(jetstream::stream::Config {
            name: config.name.clone(),
            subjects: config.subjects.clone(),
            max_bytes: config.max_bytes,
            max_age: Duration::from_secs(config.max_age_secs),
            duplicate_window: Duration::from_secs(config.duplicate_window_secs),
            ..Default::default()
        })
        .await?;
    tracing::debug!(stream = %config.name, "stream ready");
    Ok(stream)
}

pub(crate) fn pull_config(nats: &NatsConfig) -> jetstream::consumer::pull::Config {
    jetstream::consumer::pull::Config {
        durable_name: Some(CONSUMER_NAME.into()),
        filter_subject: READINGS_SUBJECT.into(),
        ack_policy: jetstream::consumer::AckPolicy::Explicit,
        ack_wait: Duration::from_secs(nats.ack_wait_secs),
        max_deliver: nats.max_deliver,
        ..Default::default()
    }
}

/// Durable explicit-ack consumer over the readings stream.
pub async fn create_pull_consumer(
    js: &jetstream::Context,
    nats: &NatsConfig,
) -> Result<PullConsumer, BoxError> {
    let stream = js.get_stream(READINGS_STREAM).await?;
    Ok(stream
        .get_or_create_consumer(CONSUMER_NAME, pull_config(nats))
        .await?)
}
