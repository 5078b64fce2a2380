mod cmd;
mod output;
#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use cmd::Commands;
use output::OutputMode;

/// Operator CLI for the Vigil alarm engine.
#[derive(Parser)]
#[command(name = "vigil", version, about = "Manage alarm rules and inspect alarms on a Vigil engine")]
pub struct Opts {
    #[command(subcommand)]
    cmd: Commands,

    #[arg(long, global = true, help = "Print machine-readable JSON")]
    json: bool,

    #[arg(
        long,
        global = true,
        env = "VIGIL_SERVER",
        default_value = cmd::helpers::DEFAULT_SERVER,
        help = "Engine admin API base URL"
    )]
    server: String,
}

impl Opts {
    pub fn output_mode(&self) -> OutputMode {
        match self.json {
            true => OutputMode::Json,
            false => OutputMode::Human,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    cmd::run(Opts::parse()).await
}
