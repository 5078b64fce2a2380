use anyhow::{Context, Result};
use serde_json::Value;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:9090";

pub const OPERATORS: [&str; 6] = [">", "<", ">=", "<=", "==", "!="];

pub fn base_url(server: &str) -> String {
    let trimmed = server.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Passes successful responses through; otherwise fails with the API's
/// `error` message when it sent one.
pub async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body: Option<Value> = resp.json().await.ok();
    anyhow::bail!("HTTP {}: {}", status.as_u16(), error_message(body.as_ref(), status))
}

pub fn error_message(body: Option<&Value>, status: reqwest::StatusCode) -> String {
    body.and_then(|b| b["error"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string())
}

pub async fn get_json<T: serde::de::DeserializeOwned>(url: &str) -> Result<T> {
    let resp = reqwest::get(url)
        .await
        .context("failed to reach engine")?;
    Ok(check(resp).await?.json().await?)
}

/// Epoch milliseconds rendered as UTC, `-` when unset.
pub fn format_ms(ms: Option<i64>) -> String {
    ms.and_then(chrono::DateTime::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "-".into())
}

pub fn format_duration_ms(ms: i64) -> String {
    if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{:.3}s", ms as f64 / 1000.0)
    }
}

pub fn str_field<'a>(v: &'a Value, key: &str) -> &'a str {
    v[key].as_str().unwrap_or("-")
}

/// Accepts a path to a JSON file or inline JSON.
pub fn parse_json_data(data: &str) -> Result<Value> {
    if std::path::Path::new(data).exists() {
        let content = std::fs::read_to_string(data)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(data)?)
    }
}
