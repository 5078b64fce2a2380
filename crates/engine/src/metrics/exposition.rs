use std::sync::Arc;

use super::engine_metrics::EngineMetrics;

/// Live gauges sampled at scrape time rather than counted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gauges {
    pub rules: u64,
    pub devices: u64,
    pub active_alarms: u64,
    pub pending_alarms: u64,
}

pub fn render_prometheus(m: &Arc<EngineMetrics>, gauges: Gauges) -> String {
    let mut out = String::with_capacity(1024);

    write_counter(&mut out, "vigil_readings_received_total", m.readings_received_val());
    write_counter(&mut out, "vigil_readings_malformed_total", m.readings_malformed_val());
    write_counter(&mut out, "vigil_rule_evaluations_total", m.evaluations_val());
    write_counter(&mut out, "vigil_alarms_triggered_total", m.alarms_triggered_val());
    write_counter(&mut out, "vigil_alarms_cleared_total", m.alarms_cleared_val());
    write_counter(&mut out, "vigil_state_writes_total", m.state_writes_ok_val());
    write_counter(&mut out, "vigil_state_writes_failed_total", m.state_writes_failed_val());
    write_counter(&mut out, "vigil_notifications_sent_total", m.notifications_sent_val());
    write_counter(&mut out, "vigil_notifications_failed_total", m.notifications_failed_val());

    let (sum, count) = m.evaluation_latency_vals();
    write_summary(&mut out, "vigil_evaluation_latency_us", sum, count);

    write_gauge(&mut out, "vigil_rules", gauges.rules);
    write_gauge(&mut out, "vigil_devices_seen", gauges.devices);
    write_gauge(&mut out, "vigil_alarms_active", gauges.active_alarms);
    write_gauge(&mut out, "vigil_alarms_pending", gauges.pending_alarms);

    out
}

fn write_counter(out: &mut String, name: &str, val: u64) {
    use std::fmt::Write;
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {val}");
}

fn write_gauge(out: &mut String, name: &str, val: u64) {
    use std::fmt::Write;
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {val}");
}

fn write_summary(out: &mut String, name: &str, sum: u64, count: u64) {
    use std::fmt::Write;
    let _ = writeln!(out, "# TYPE {name} summary");
    let _ = writeln!(out, "{name}_sum {sum}");
    let _ = writeln!(out, "{name}_count {count}");
}
