use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Default)]
pub struct EngineMetrics {
    readings_received: AtomicU64,
    readings_malformed: AtomicU64,
    evaluations: AtomicU64,
    alarms_triggered: AtomicU64,
    alarms_cleared: AtomicU64,
    state_writes_ok: AtomicU64,
    state_writes_failed: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_failed: AtomicU64,
    evaluation_latency_sum_us: AtomicU64,
    evaluation_latency_count: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_readings_received(&self) {
        self.readings_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_readings_malformed(&self) {
        self.readings_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_evaluations(&self, count: u64) {
        self.evaluations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_alarms_triggered(&self) {
        self.alarms_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_alarms_cleared(&self) {
        self.alarms_cleared.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_state_writes_ok(&self, count: u64) {
        self.state_writes_ok.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_state_writes_failed(&self, count: u64) {
        self.state_writes_failed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_notifications_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notifications_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evaluation_latency(&self, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        self.evaluation_latency_sum_us
            .fetch_add(us, Ordering::Relaxed);
        self.evaluation_latency_count
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn readings_received_val(&self) -> u64 {
        self.readings_received.load(Ordering::Relaxed)
    }

    pub fn readings_malformed_val(&self) -> u64 {
        self.readings_malformed.load(Ordering::Relaxed)
    }

    pub fn evaluations_val(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn alarms_triggered_val(&self) -> u64 {
        self.alarms_triggered.load(Ordering::Relaxed)
    }

    pub fn alarms_cleared_val(&self) -> u64 {
        self.alarms_cleared.load(Ordering::Relaxed)
    }

    pub fn state_writes_ok_val(&self) -> u64 {
        self.state_writes_ok.load(Ordering::Relaxed)
    }

    pub fn state_writes_failed_val(&self) -> u64 {
        self.state_writes_failed.load(Ordering::Relaxed)
    }

    pub fn notifications_sent_val(&self) -> u64 {
        self.notifications_sent.load(Ordering::Relaxed)
    }

    pub fn notifications_failed_val(&self) -> u64 {
        self.notifications_failed.load(Ordering::Relaxed)
    }

    pub fn evaluation_latency_vals(&self) -> (u64, u64) {
        (
            self.evaluation_latency_sum_us.load(Ordering::Relaxed),
            self.evaluation_latency_count.load(Ordering::Relaxed),
        )
    }
}
