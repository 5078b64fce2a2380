use anyhow::Result;
use clap::Args;
use serde_json::Value;

use super::helpers;
use crate::output::{print_json, spinner, theme, OutputMode};

#[derive(Args)]
pub struct StatusArgs;

pub async fn execute(_args: StatusArgs, mode: OutputMode, base: &str) -> Result<()> {
    let sp = match mode {
        OutputMode::Human => Some(spinner::create("Querying engine...")),
        OutputMode::Json => None,
    };

    let result: Result<Value> = helpers::get_json(&format!("{base}/v1/status")).await;

    let summary = match (result, &sp) {
        (Ok(v), Some(sp)) => {
            spinner::finish_clear(sp);
            v
        }
        (Ok(v), None) => v,
        (Err(e), Some(sp)) => {
            spinner::finish_err(sp, "Engine unreachable");
            return Err(e);
        }
        (Err(e), None) => return Err(e),
    };

    match mode {
        OutputMode::Json => print_json(&summary)?,
        OutputMode::Human => {
            theme::print_header("Vigil Engine Status");
            theme::print_kv("Server", base);
            theme::print_section("Catalog");
            theme::print_kv("Devices", &summary["devices"].to_string());
            theme::print_kv("Rules", &summary["rules"].to_string());
            theme::print_section("Alarms");
            let active = summary["active_alarms"].as_u64().unwrap_or(0);
            theme::print_kv_colored("Active alarms", &active.to_string(), active == 0);
            theme::print_kv("Pending alarms", &summary["pending_alarms"].to_string());
            println!();
        }
    }

    Ok(())
}
