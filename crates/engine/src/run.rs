use async_nats::jetstream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use vigil_common::nats_config::StreamConfig;

use crate::alarm::{Engine, EngineOptions, RuleCatalog, RuleManager};
use crate::api::{self, AppState};
use crate::config::{EngineConfig, NotifyConfig};
use crate::consumer::{connect_jetstream, create_pull_consumer, ensure_stream, ConsumerLoop};
use crate::dispatcher::Dispatcher;
use crate::metrics::EngineMetrics;
use crate::notifier::{
    HistoryNotifier, NatsNotifier, Notifier, NotifyLoop, RetryNotifier, WebhookNotifier,
};
use crate::storage::{
    create_pool, migrator, HistoryStore, PgHistoryStore, PgRuleRepository,
    PgStateStore, RuleRepository, StateStore, StateWriter,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const MS_PER_DAY: i64 = 86_400_000;

/// Boots the engine, serves until SIGINT/SIGTERM or until the state writer
/// gives up (only when `shutdown_after_failures` is set), then shuts down in order: consumer, dispatcher, state writer and
/// notify loop drains, history purge.
pub async fn run(config: EngineConfig) -> Result<(), BoxError> {
    let metrics = EngineMetrics::new();
    let ready = Arc::new(AtomicBool::new(false));

    tracing::info!(max_connections = config.database.max_connections, "connecting to PostgreSQL");
    let pool = create_pool(&config.database.url, config.database.max_connections).await?;
    let applied = migrator::run_migrations(&pool).await?;
    if !applied.is_empty() {
        tracing::info!(migrations = ?applied, "migrations applied");
    }

    let rule_repo: Arc<dyn RuleRepository> = Arc::new(PgRuleRepository::new(pool.clone()));
    let state_store: Arc<dyn StateStore> = Arc::new(PgStateStore::new(pool.clone()));
    let history: Arc<dyn HistoryStore> = Arc::new(PgHistoryStore::new(pool));

    let rules = rule_repo.load_all().await?;
    let options = EngineOptions {
        retain_cleared: config.alarms.retain_cleared,
    };
    let (engine, outputs) = Engine::new(RuleCatalog::from_rules(rules), options, metrics.clone());
    let engine = Arc::new(engine);
    let restored = engine.restore(state_store.load_all().await?);
    tracing::info!(rules = engine.catalog().len(), states = restored, "alarm state restored");
    let manager = Arc::new(RuleManager::new(Arc::clone(&engine), rule_repo));

    tracing::info!(url = %config.nats.url, "connecting to NATS JetStream");
    let js = connect_jetstream(&config.nats.url).await?;
    ensure_stream(&js, &StreamConfig::readings()).await?;
    ensure_stream(&js, &StreamConfig::alarms()).await?;
    let consumer = create_pull_consumer(&js, &config.nats).await?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let (drain_tx, drain_rx) = watch::channel(false);

    let writer = StateWriter::new(
        state_store,
        outputs.writes,
        config.persistence.writer_config(),
        metrics.clone(),
    );
    let mut writer_handle = tokio::spawn(writer.run(drain_rx.clone()));

    let notifiers = build_notifiers(&config.notify, js, Arc::clone(&history));
    let notify_loop = NotifyLoop::new(
        outputs.events,
        notifiers,
        metrics.clone(),
        config.processing.max_workers,
    );
    let notify_handle = tokio::spawn(notify_loop.run(drain_rx));

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&engine),
        config.processing.max_workers,
        config.processing.queue_capacity,
    ));
    let consumer_loop = ConsumerLoop::new(
        consumer,
        config.processing.batch_size,
        Arc::clone(&dispatcher),
        metrics,
    );
    let consumer_rx = stop_rx.clone();
    let consumer_handle = tokio::spawn(async move { consumer_loop.run(consumer_rx).await });

    let listener = TcpListener::bind(&config.api.addr).await?;
    tracing::info!(addr = %config.api.addr, "admin API listening");
    let state = AppState::new(
        Arc::clone(&engine),
        Arc::clone(&manager),
        Arc::clone(&history),
        Arc::clone(&ready),
    );
    let api_rx = stop_rx.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(listener, state, api_rx).await {
            tracing::error!(error = %e, "admin API error");
        }
    });

    let periodic = vec![
        spawn_status_log(
            Arc::clone(&engine),
            config.processing.status_interval_seconds,
            stop_rx.clone(),
        ),
        spawn_rule_refresh(manager, config.processing.rule_refresh_seconds, stop_rx.clone()),
        spawn_history_purge(
            Arc::clone(&history),
            config.alarms.history_retention_days,
            config.alarms.history_purge_interval_hours,
            stop_rx,
        ),
    ];

    ready.store(true, Ordering::Release);
    tracing::info!(
        workers = dispatcher.shards(),
        devices = engine.cache().device_count(),
        "alarm engine running"
    );

    let early_exit = tokio::select! {
        _ = crate::shutdown::wait_for_shutdown() => {
            tracing::info!("shutdown signal received");
            None
        }
        r = &mut writer_handle => Some(r),
    };

    ready.store(false, Ordering::Release);
    let _ = stop_tx.send(true);
    if let Err(e) = consumer_handle.await {
        tracing::error!(error = %e, "consumer task panicked");
    }
    dispatcher.shutdown().await;
    tracing::info!("dispatcher drained");

    let _ = drain_tx.send(true);
    let writer_result = match early_exit {
        Some(r) => r,
        None => writer_handle.await,
    };
    if let Err(e) = notify_handle.await {
        tracing::error!(error = %e, "notify loop panicked");
    }
    let _ = api_handle.await;
    for handle in periodic {
        let _ = handle.await;
    }

    purge_history(history.as_ref(), config.alarms.history_retention_days).await;

    match writer_result {
        Ok(Ok(())) => {
            tracing::info!("shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "stopping after persistence failure");
            Err(Box::new(e))
        }
        Err(e) => Err(Box::new(e)),
    }
}

fn build_notifiers(
    config: &NotifyConfig,
    js: jetstream::Context,
    history: Arc<dyn HistoryStore>,
) -> Vec<Arc<dyn Notifier>> {
    let retries = config.max_retries;
    let delay = config.base_delay_ms;

    let mut notifiers: Vec<Arc<dyn Notifier>> = vec![
        Arc::new(RetryNotifier::new(NatsNotifier::new(js), retries, delay)),
        Arc::new(RetryNotifier::new(HistoryNotifier::new(history), retries, delay)),
    ];
    if let Some(hook) = &config.webhook {
        let webhook = WebhookNotifier::new(
            hook.url.clone(),
            hook.secret.clone().into_bytes(),
            Duration::from_millis(hook.timeout_ms),
        );
        notifiers.push(Arc::new(RetryNotifier::new(webhook, retries, delay)));
    }
    notifiers
}

fn spawn_status_log(
    engine: Arc<Engine>,
    interval_secs: u64,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if interval_secs == 0 {
            return;
        }
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    let counts = engine.status_counts();
                    tracing::info!(
                        devices = engine.cache().device_count(),
                        rules = engine.catalog().len(),
                        active_alarms = counts.active,
                        pending_alarms = counts.pending,
                        "engine status"
                    );
                }
            }
        }
    })
}

fn spawn_rule_refresh(
    manager: Arc<RuleManager>,
    interval_secs: u64,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if interval_secs == 0 {
            return;
        }
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    if let Err(e) = manager.refresh().await {
                        tracing::warn!(error = %e, "rule refresh failed");
                    }
                }
            }
        }
    })
}

fn spawn_history_purge(
    history: Arc<dyn HistoryStore>,
    retention_days: u64,
    interval_hours: u64,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if interval_hours == 0 {
            return;
        }
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_hours * 3600));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => purge_history(history.as_ref(), retention_days).await,
            }
        }
    })
}

async fn purge_history(history: &dyn HistoryStore, retention_days: u64) {
    let cutoff_ms = crate::now_ms() - retention_days as i64 * MS_PER_DAY;
    match history.purge_older_than(cutoff_ms).await {
        Ok(0) => {}
        Ok(purged) => tracing::info!(purged, retention_days, "alarm history purged"),
        Err(e) => tracing::warn!(error = %e, "alarm history purge failed"),
    }
}
