#[cfg(test)]
mod tests {
    use crate::cmd::alarms::colored_status;
    use crate::output::{build_table, print_json, OutputMode};

    #[test]
    fn output_modes_differ() {
        assert_ne!(OutputMode::Json, OutputMode::Human);
    }

    #[test]
    fn print_json_valid() {
        let val = serde_json::json!({"rule_id": "temp_high", "status": "active"});
        assert!(print_json(&val).is_ok());
    }

    #[test]
    fn build_table_with_rows() {
        let mut table = build_table(&["Rule", "Status"]);
        table.add_row(vec!["temp_high", "active"]);
        let rendered = table.to_string();
        assert!(rendered.contains("Rule"));
        assert!(rendered.contains("temp_high"));
    }

    #[test]
    fn colored_status_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(colored_status("active"), "active");
        assert_eq!(colored_status("cleared"), "cleared");
        assert_eq!(colored_status("unknown"), "unknown");
    }
}
