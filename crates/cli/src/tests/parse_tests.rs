#[cfg(test)]
mod tests {
    use crate::cmd::alarms::AlarmsCmd;
    use crate::cmd::rules::{self, RulesCmd};
    use crate::cmd::Commands;
    use crate::Opts;
    use clap::Parser;

    fn parse(args: &[&str]) -> Opts {
        let mut full = vec!["vigil"];
        full.extend_from_slice(args);
        Opts::parse_from(full)
    }

    fn try_parse(args: &[&str]) -> Result<Opts, clap::Error> {
        let mut full = vec!["vigil"];
        full.extend_from_slice(args);
        Opts::try_parse_from(full)
    }

    #[test]
    fn parse_version() {
        let opts = parse(&["version"]);
        assert!(matches!(opts.cmd, Commands::Version));
    }

    #[test]
    fn parse_json_flag() {
        let opts = parse(&["--json", "version"]);
        assert!(opts.json);
        assert_eq!(opts.output_mode(), crate::output::OutputMode::Json);
    }

    #[test]
    fn parse_human_flag_default() {
        let opts = parse(&["version"]);
        assert!(!opts.json);
        assert_eq!(opts.output_mode(), crate::output::OutputMode::Human);
    }

    #[test]
    fn parse_server_flag() {
        let opts = parse(&["--server", "http://engine:9090", "status"]);
        assert_eq!(opts.server, "http://engine:9090");
        assert!(matches!(opts.cmd, Commands::Status(_)));
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let opts = parse(&["alarms", "active", "--json", "--server", "engine:9090"]);
        assert!(opts.json);
        assert_eq!(opts.server, "engine:9090");
        assert!(matches!(opts.cmd, Commands::Alarms(AlarmsCmd::Active)));
    }

    #[test]
    fn parse_rules_list_and_get() {
        assert!(matches!(parse(&["rules", "list"]).cmd, Commands::Rules(RulesCmd::List)));
        assert!(matches!(
            parse(&["rules", "get", "temp_high"]).cmd,
            Commands::Rules(RulesCmd::Get(_))
        ));
    }

    #[test]
    fn parse_rules_create_simple_builds_body() {
        let opts = parse(&[
            "rules",
            "create-simple",
            "--id",
            "temp_high",
            "--device",
            "device-1",
            "--metric",
            "temperature",
            "--operator",
            ">",
            "--threshold",
            "25",
            "--duration-secs",
            "5",
            "--message",
            "too hot",
        ]);
        let Commands::Rules(RulesCmd::CreateSimple(args)) = opts.cmd else {
            panic!("expected rules create-simple");
        };
        let body = rules::simple_body(&args);
        assert_eq!(body["kind"], "simple");
        assert_eq!(body["id"], "temp_high");
        assert_eq!(body["device_id"], "device-1");
        assert_eq!(body["operator"], ">");
        assert_eq!(body["threshold"], 25.0);
        assert_eq!(body["duration_ms"], 5000);
        assert_eq!(body["enabled"], true);
    }

    #[test]
    fn create_simple_without_id_leaves_it_to_the_engine() {
        let opts = parse(&[
            "rules",
            "create-simple",
            "--device",
            "freezer-1",
            "--metric",
            "temperature",
            "--operator",
            "<",
            "--threshold",
            "-18.5",
            "--disabled",
        ]);
        let Commands::Rules(RulesCmd::CreateSimple(args)) = opts.cmd else {
            panic!("expected rules create-simple");
        };
        let body = rules::simple_body(&args);
        assert!(body.get("id").is_none());
        assert_eq!(body["threshold"], -18.5);
        assert_eq!(body["duration_ms"], 0);
        assert_eq!(body["enabled"], false);
    }

    #[test]
    fn parse_rules_create_conditional_builds_body() {
        let opts = parse(&[
            "rules",
            "create-conditional",
            "--id",
            "pump_overcurrent",
            "--device",
            "pump-1",
            "--metric",
            "current",
            "--operator",
            ">=",
            "--threshold",
            "10",
            "--shunt-device",
            "valve-1",
            "--shunt-metric",
            "open",
            "--shunt-operator",
            "==",
            "--shunt-threshold",
            "1",
        ]);
        let Commands::Rules(RulesCmd::CreateConditional(args)) = opts.cmd else {
            panic!("expected rules create-conditional");
        };
        let body = rules::conditional_body(&args);
        assert_eq!(body["kind"], "conditional");
        assert_eq!(body["device_id"], "pump-1");
        assert_eq!(body["shunt_device_id"], "valve-1");
        assert_eq!(body["shunt_metric"], "open");
        assert_eq!(body["shunt_operator"], "==");
        assert_eq!(body["shunt_threshold"], 1.0);
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let result = try_parse(&[
            "rules",
            "create-simple",
            "--device",
            "device-1",
            "--metric",
            "temperature",
            "--operator",
            "=>",
            "--threshold",
            "25",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn conditional_requires_shunt_flags() {
        let result = try_parse(&[
            "rules",
            "create-conditional",
            "--device",
            "pump-1",
            "--metric",
            "current",
            "--operator",
            ">",
            "--threshold",
            "10",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_rules_replace_and_delete() {
        let opts = parse(&["rules", "replace", "temp_high", "--data", r#"{"kind":"simple"}"#]);
        assert!(matches!(opts.cmd, Commands::Rules(RulesCmd::Replace(_))));

        let opts = parse(&["rules", "delete", "temp_high", "--yes"]);
        assert!(matches!(opts.cmd, Commands::Rules(RulesCmd::Delete(_))));
    }

    #[test]
    fn parse_alarms_history_limit() {
        let opts = parse(&["alarms", "history", "--limit", "10"]);
        let Commands::Alarms(AlarmsCmd::History(args)) = opts.cmd else {
            panic!("expected alarms history");
        };
        assert_eq!(args.limit, 10);

        let opts = parse(&["alarms", "history"]);
        let Commands::Alarms(AlarmsCmd::History(args)) = opts.cmd else {
            panic!("expected alarms history");
        };
        assert_eq!(args.limit, 50);
    }

    #[test]
    fn parse_alarms_list() {
        let opts = parse(&["alarms", "list"]);
        assert!(matches!(opts.cmd, Commands::Alarms(AlarmsCmd::List)));
    }

    #[test]
    fn parse_health() {
        let opts = parse(&["health"]);
        assert!(matches!(opts.cmd, Commands::Health(_)));
    }

    #[test]
    fn parse_simulate() {
        let opts = parse(&[
            "simulate",
            "--nats-url",
            "nats://broker:4222",
            "--devices",
            "5",
            "--interval-secs",
            "0.5",
            "--rounds",
            "3",
        ]);
        let Commands::Simulate(args) = opts.cmd else {
            panic!("expected simulate");
        };
        assert_eq!(args.nats_url, "nats://broker:4222");
        assert_eq!(args.devices, 5);
        assert_eq!(args.interval_secs, 0.5);
        assert_eq!(args.rounds, Some(3));
    }
}
