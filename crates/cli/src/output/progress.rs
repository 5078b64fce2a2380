use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Bounded bar for a known number of steps.
pub fn create(total: u64, msg: &str) -> ProgressBar {
    let style = ProgressStyle::with_template("  {spinner:.cyan} [{bar:40.cyan/dim}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─");
    let pb = ProgressBar::new(total).with_style(style);
    pb.set_message(msg.to_string());
    pb
}

pub fn finish(pb: &ProgressBar, msg: &str) {
    if let Ok(style) = ProgressStyle::with_template("  {msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(format!("{} {msg}", "✓".green().bold()));
}
