use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use serde_json::Value;

use super::helpers;
use crate::output::{build_table, print_json, print_success, spinner, theme, OutputMode};

#[derive(Subcommand)]
pub enum AlarmsCmd {
    /// Alarms currently pending or active
    Active,
    /// Every tracked alarm state
    List,
    /// Most recent trigger and clear events
    History(HistoryArgs),
}

#[derive(clap::Args)]
pub struct HistoryArgs {
    #[arg(long, default_value_t = 50, help = "Maximum number of events (1-1000)")]
    pub limit: u32,
}

pub async fn execute(cmd: AlarmsCmd, mode: OutputMode, base: &str) -> Result<()> {
    match cmd {
        AlarmsCmd::Active => states(&format!("{base}/v1/alarms/active"), "Active Alarms", mode).await,
        AlarmsCmd::List => states(&format!("{base}/v1/alarms"), "Alarm States", mode).await,
        AlarmsCmd::History(args) => history(base, args, mode).await,
    }
}

pub fn colored_status(status: &str) -> String {
    match status {
        "active" | "triggered" => status.red().bold().to_string(),
        "pending" => status.yellow().to_string(),
        "cleared" => status.green().to_string(),
        other => other.dimmed().to_string(),
    }
}

async fn states(url: &str, title: &str, mode: OutputMode) -> Result<()> {
    let sp = match mode {
        OutputMode::Human => Some(spinner::create("Fetching alarms...")),
        OutputMode::Json => None,
    };

    let states: Vec<Value> = helpers::get_json(url).await?;

    if let Some(sp) = sp {
        spinner::finish_clear(&sp);
    }

    match mode {
        OutputMode::Json => print_json(&states)?,
        OutputMode::Human => {
            if states.is_empty() {
                print_success("No alarms");
                return Ok(());
            }
            theme::print_header(title);
            let mut table = build_table(&["Rule", "Device", "Status", "Condition Since", "Triggered", "Last Evaluated"]);
            for s in &states {
                table.add_row(vec![
                    helpers::str_field(s, "rule_id").to_string(),
                    helpers::str_field(s, "device_id").to_string(),
                    colored_status(helpers::str_field(s, "status")),
                    helpers::format_ms(s["condition_since_ms"].as_i64()),
                    helpers::format_ms(s["triggered_at_ms"].as_i64()),
                    helpers::format_ms(s["last_evaluated_at_ms"].as_i64()),
                ]);
            }
            println!("{table}");
        }
    }

    Ok(())
}

async fn history(base: &str, args: HistoryArgs, mode: OutputMode) -> Result<()> {
    let sp = match mode {
        OutputMode::Human => Some(spinner::create("Fetching alarm history...")),
        OutputMode::Json => None,
    };

    let events: Vec<Value> =
        helpers::get_json(&format!("{base}/v1/alarms/history?limit={}", args.limit)).await?;

    if let Some(sp) = sp {
        spinner::finish_clear(&sp);
    }

    match mode {
        OutputMode::Json => print_json(&events)?,
        OutputMode::Human => {
            if events.is_empty() {
                print_success("No alarm events recorded");
                return Ok(());
            }
            theme::print_header("Alarm History");
            let mut table = build_table(&["Time", "Rule", "Device", "Status", "Value", "Threshold", "Message"]);
            for e in &events {
                table.add_row(vec![
                    helpers::format_ms(e["timestamp_ms"].as_i64()),
                    helpers::str_field(e, "rule_name").to_string(),
                    helpers::str_field(e, "device_id").to_string(),
                    colored_status(helpers::str_field(e, "status")),
                    e["value"].to_string(),
                    e["threshold"].to_string(),
                    helpers::str_field(e, "message").to_string(),
                ]);
            }
            println!("{table}");
        }
    }

    Ok(())
}
