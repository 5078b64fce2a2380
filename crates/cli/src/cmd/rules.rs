use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::{json, Value};

use super::helpers::{self, OPERATORS};
use crate::output::{build_table, confirm, print_json, print_success, spinner, theme, OutputMode};

#[derive(Subcommand)]
pub enum RulesCmd {
    List,
    Get(GetArgs),
    CreateSimple(SimpleArgs),
    CreateConditional(ConditionalArgs),
    Replace(ReplaceArgs),
    Delete(DeleteArgs),
}

#[derive(clap::Args)]
pub struct GetArgs {
    #[arg(help = "Rule ID")]
    id: String,
}

#[derive(clap::Args)]
pub struct SimpleArgs {
    #[arg(long, help = "Rule ID (generated when omitted)")]
    pub id: Option<String>,
    #[arg(long, default_value = "", help = "Display name (defaults to the ID)")]
    pub name: String,
    #[arg(long, help = "Device the rule watches")]
    pub device: String,
    #[arg(long, help = "Metric compared against the threshold")]
    pub metric: String,
    #[arg(long, value_parser = OPERATORS, help = "Comparison operator")]
    pub operator: String,
    #[arg(long, allow_negative_numbers = true)]
    pub threshold: f64,
    #[arg(long, default_value_t = 0.0, help = "Seconds the condition must hold before triggering")]
    pub duration_secs: f64,
    #[arg(long, default_value = "")]
    pub message: String,
    #[arg(long, help = "Create the rule disabled")]
    pub disabled: bool,
}

#[derive(clap::Args)]
pub struct ConditionalArgs {
    #[command(flatten)]
    pub primary: SimpleArgs,
    #[arg(long, help = "Device whose metric gates the alarm")]
    pub shunt_device: String,
    #[arg(long)]
    pub shunt_metric: String,
    #[arg(long, value_parser = OPERATORS)]
    pub shunt_operator: String,
    #[arg(long, allow_negative_numbers = true)]
    pub shunt_threshold: f64,
}

#[derive(clap::Args)]
pub struct ReplaceArgs {
    #[arg(help = "Rule ID")]
    id: String,
    #[arg(long, help = "JSON file path or inline JSON")]
    data: String,
}

#[derive(clap::Args)]
pub struct DeleteArgs {
    #[arg(help = "Rule ID")]
    id: String,
    #[arg(long, help = "Skip confirmation prompt")]
    yes: bool,
}

pub async fn execute(cmd: RulesCmd, mode: OutputMode, base: &str) -> Result<()> {
    match cmd {
        RulesCmd::List => list(base, mode).await,
        RulesCmd::Get(args) => get(base, args, mode).await,
        RulesCmd::CreateSimple(args) => create(base, simple_body(&args), mode).await,
        RulesCmd::CreateConditional(args) => create(base, conditional_body(&args), mode).await,
        RulesCmd::Replace(args) => replace(base, args, mode).await,
        RulesCmd::Delete(args) => delete(base, args, mode).await,
    }
}

pub fn simple_body(args: &SimpleArgs) -> Value {
    let mut body = json!({
        "kind": "simple",
        "name": args.name,
        "device_id": args.device,
        "metric": args.metric,
        "operator": args.operator,
        "threshold": args.threshold,
        "duration_ms": (args.duration_secs * 1000.0).round() as i64,
        "message": args.message,
        "enabled": !args.disabled,
    });
    if let Some(id) = &args.id {
        body["id"] = json!(id);
    }
    body
}

pub fn conditional_body(args: &ConditionalArgs) -> Value {
    let mut body = simple_body(&args.primary);
    body["kind"] = json!("conditional");
    body["shunt_device_id"] = json!(args.shunt_device);
    body["shunt_metric"] = json!(args.shunt_metric);
    body["shunt_operator"] = json!(args.shunt_operator);
    body["shunt_threshold"] = json!(args.shunt_threshold);
    body
}

pub fn describe_condition(rule: &Value) -> String {
    let primary = format!(
        "{} {} {}",
        helpers::str_field(rule, "metric"),
        helpers::str_field(rule, "operator"),
        rule["threshold"]
    );
    match rule.get("shunt") {
        Some(shunt) if shunt.is_object() => format!(
            "{primary} and {}.{} {} {}",
            helpers::str_field(shunt, "device_id"),
            helpers::str_field(shunt, "metric"),
            helpers::str_field(shunt, "operator"),
            shunt["threshold"]
        ),
        _ => primary,
    }
}

async fn list(base: &str, mode: OutputMode) -> Result<()> {
    let sp = match mode {
        OutputMode::Human => Some(spinner::create("Fetching rules...")),
        OutputMode::Json => None,
    };

    let rules: Vec<Value> = helpers::get_json(&format!("{base}/v1/rules")).await?;

    if let Some(sp) = sp {
        spinner::finish_clear(&sp);
    }

    match mode {
        OutputMode::Json => print_json(&rules)?,
        OutputMode::Human => {
            if rules.is_empty() {
                print_success("No alarm rules defined");
                return Ok(());
            }
            theme::print_header("Alarm Rules");
            let mut table = build_table(&["ID", "Name", "Kind", "Device", "Condition", "For", "Enabled"]);
            for r in &rules {
                table.add_row(vec![
                    helpers::str_field(r, "id").to_string(),
                    helpers::str_field(r, "name").to_string(),
                    helpers::str_field(r, "kind").to_string(),
                    helpers::str_field(r, "device_id").to_string(),
                    describe_condition(r),
                    helpers::format_duration_ms(r["duration_ms"].as_i64().unwrap_or(0)),
                    r["enabled"].as_bool().unwrap_or(false).to_string(),
                ]);
            }
            println!("{table}");
        }
    }

    Ok(())
}

async fn get(base: &str, args: GetArgs, mode: OutputMode) -> Result<()> {
    let sp = match mode {
        OutputMode::Human => Some(spinner::create("Fetching rule...")),
        OutputMode::Json => None,
    };

    let result: Result<Value> = helpers::get_json(&format!("{base}/v1/rules/{}", args.id)).await;

    if let Some(sp) = sp {
        spinner::finish_clear(&sp);
    }
    let rule = result?;

    match mode {
        OutputMode::Json => print_json(&rule)?,
        OutputMode::Human => {
            theme::print_header("Rule Details");
            theme::print_kv("ID", helpers::str_field(&rule, "id"));
            theme::print_kv("Name", helpers::str_field(&rule, "name"));
            theme::print_kv("Kind", helpers::str_field(&rule, "kind"));
            theme::print_kv("Device", helpers::str_field(&rule, "device_id"));
            theme::print_kv("Condition", &describe_condition(&rule));
            theme::print_kv(
                "Duration",
                &helpers::format_duration_ms(rule["duration_ms"].as_i64().unwrap_or(0)),
            );
            theme::print_kv("Message", helpers::str_field(&rule, "message"));
            theme::print_kv_colored(
                "Enabled",
                &rule["enabled"].to_string(),
                rule["enabled"].as_bool().unwrap_or(false),
            );
            theme::print_kv("Created", &helpers::format_ms(rule["created_at_ms"].as_i64()));
            theme::print_kv("Updated", &helpers::format_ms(rule["updated_at_ms"].as_i64()));
            println!();
        }
    }

    Ok(())
}

async fn create(base: &str, body: Value, mode: OutputMode) -> Result<()> {
    let sp = match mode {
        OutputMode::Human => Some(spinner::create("Creating rule...")),
        OutputMode::Json => None,
    };

    let client = reqwest::Client::new();
    let sent = client
        .post(format!("{base}/v1/rules"))
        .json(&body)
        .send()
        .await
        .context("failed to reach engine");
    let result = match sent {
        Ok(resp) => helpers::check(resp).await,
        Err(e) => Err(e),
    };

    let resp = match (result, &sp) {
        (Ok(resp), _) => resp,
        (Err(e), Some(sp)) => {
            spinner::finish_err(sp, &e.to_string());
            return Err(e);
        }
        (Err(e), None) => return Err(e),
    };
    let created: Value = resp.json().await?;

    if let Some(sp) = sp {
        spinner::finish_ok(&sp, "Rule created");
    }

    match mode {
        OutputMode::Json => print_json(&created)?,
        OutputMode::Human => {
            theme::print_kv("ID", helpers::str_field(&created, "id"));
            theme::print_kv("Condition", &describe_condition(&created));
        }
    }

    Ok(())
}

async fn replace(base: &str, args: ReplaceArgs, mode: OutputMode) -> Result<()> {
    let body = helpers::parse_json_data(&args.data)?;

    let sp = match mode {
        OutputMode::Human => Some(spinner::create("Replacing rule...")),
        OutputMode::Json => None,
    };

    let client = reqwest::Client::new();
    let resp = client
        .put(format!("{base}/v1/rules/{}", args.id))
        .json(&body)
        .send()
        .await
        .context("failed to reach engine")?;
    let replaced: Value = helpers::check(resp).await?.json().await?;

    if let Some(sp) = sp {
        spinner::finish_ok(&sp, &format!("Rule {} replaced", args.id));
    }

    if mode == OutputMode::Json {
        print_json(&replaced)?;
    }

    Ok(())
}

async fn delete(base: &str, args: DeleteArgs, mode: OutputMode) -> Result<()> {
    if mode == OutputMode::Human && !args.yes {
        let msg = format!("Delete rule '{}' and its alarm state?", args.id);
        if !confirm::confirm_action(&msg) {
            theme::print_dim("  Cancelled.");
            return Ok(());
        }
    }

    let sp = match mode {
        OutputMode::Human => Some(spinner::create("Deleting rule...")),
        OutputMode::Json => None,
    };

    let client = reqwest::Client::new();
    let resp = client
        .delete(format!("{base}/v1/rules/{}", args.id))
        .send()
        .await
        .context("failed to reach engine")?;
    helpers::check(resp).await?;

    if let Some(sp) = sp {
        spinner::finish_ok(&sp, &format!("Rule '{}' deleted", args.id));
    }

    if mode == OutputMode::Json {
        print_json(&json!({"deleted": true, "id": args.id}))?;
    }

    Ok(())
}
