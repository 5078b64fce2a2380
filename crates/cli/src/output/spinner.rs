use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "];

fn message_only() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn create(msg: &str) -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner:.cyan.bold} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS);
    let sp = ProgressBar::new_spinner().with_style(style);
    sp.set_message(msg.to_string());
    sp.enable_steady_tick(Duration::from_millis(80));
    sp
}

pub fn finish_ok(sp: &ProgressBar, msg: &str) {
    sp.set_style(message_only());
    sp.finish_with_message(format!("{} {msg}", "✓".green().bold()));
}

pub fn finish_err(sp: &ProgressBar, msg: &str) {
    sp.set_style(message_only());
    sp.finish_with_message(format!("{} {msg}", "✗".red().bold()));
}

pub fn finish_clear(sp: &ProgressBar) {
    sp.finish_and_clear();
}
