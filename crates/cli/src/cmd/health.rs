use anyhow::{Context, Result};
use clap::Args;

use super::helpers;
use crate::output::{print_error, print_json, print_success, OutputMode};

#[derive(Args)]
pub struct HealthArgs;

pub async fn execute(_args: HealthArgs, mode: OutputMode, base: &str) -> Result<()> {
    let healthz = check_endpoint(&format!("{base}/healthz")).await;
    let ready = check_endpoint(&format!("{base}/ready")).await;

    match mode {
        OutputMode::Json => print_json(&serde_json::json!({
            "healthz": healthz.is_ok(),
            "ready": ready.is_ok(),
        }))?,
        OutputMode::Human => {
            match &healthz {
                Ok(_) => print_success("Health check: OK"),
                Err(e) => print_error(&format!("Health check: {e}")),
            }
            match &ready {
                Ok(_) => print_success("Ready check: OK"),
                Err(e) => print_error(&format!("Ready check: {e:#}")),
            }
        }
    }

    if healthz.is_err() || ready.is_err() {
        anyhow::bail!("engine at {base} is not healthy");
    }
    Ok(())
}

async fn check_endpoint(url: &str) -> Result<()> {
    let resp = reqwest::get(url).await.context("connection failed")?;
    helpers::check(resp).await.map(|_| ())
}
