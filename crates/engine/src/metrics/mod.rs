pub mod engine_metrics;
pub mod exposition;

pub use engine_metrics::EngineMetrics;
pub use exposition::{render_prometheus, Gauges};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn counters_increment() {
        let m = EngineMetrics::new();
        m.inc_readings_received();
        m.inc_readings_received();
        m.inc_readings_malformed();
        m.add_evaluations(3);
        assert_eq!(m.readings_received_val(), 2);
        assert_eq!(m.readings_malformed_val(), 1);
        assert_eq!(m.evaluations_val(), 3);
    }

    #[test]
    fn latency_recording() {
        let m = EngineMetrics::new();
        let start = Instant::now();
        std::thread::sleep(std::time::Duration::from_millis(1));
        m.record_evaluation_latency(start);
        let (sum, count) = m.evaluation_latency_vals();
        assert!(sum > 0);
        assert_eq!(count, 1);
    }

    #[test]
    fn prometheus_output_contains_metric_names() {
        let m = EngineMetrics::new();
        m.inc_alarms_triggered();
        m.add_state_writes_ok(4);
        let output = render_prometheus(
            &m,
            Gauges {
                rules: 2,
                active_alarms: 1,
                ..Default::default()
            },
        );
        assert!(output.contains("vigil_alarms_triggered_total 1"));
        assert!(output.contains("vigil_state_writes_total 4"));
        assert!(output.contains("# TYPE vigil_evaluation_latency_us summary"));
        assert!(output.contains("vigil_rules 2"));
        assert!(output.contains("# TYPE vigil_alarms_active gauge"));
    }
}
