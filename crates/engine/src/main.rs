use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vigil_engine::config;

#[derive(Parser)]
#[command(name = "vigil-engine", version, about = "Vigil alarm evaluation engine")]
struct Args {
    /// YAML configuration file; defaults apply when omitted
    #[arg(short, long, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let args = Args::parse();
    let cfg = config::load(args.config.as_deref())?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        workers = cfg.processing.max_workers,
        retain_cleared = cfg.alarms.retain_cleared,
        "Vigil engine starting"
    );

    vigil_engine::run::run(cfg).await
}
