pub(crate) mod alarms;
mod health;
pub(crate) mod helpers;
pub(crate) mod rules;
pub(crate) mod simulate;
mod status;
mod version;

use anyhow::Result;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    #[command(subcommand)]
    Rules(rules::RulesCmd),
    #[command(subcommand)]
    Alarms(alarms::AlarmsCmd),
    Status(status::StatusArgs),
    Health(health::HealthArgs),
    Simulate(simulate::SimulateArgs),
    Version,
}

pub async fn run(opts: crate::Opts) -> Result<()> {
    let mode = opts.output_mode();
    let base = helpers::base_url(&opts.server);
    match opts.cmd {
        Commands::Rules(cmd) => rules::execute(cmd, mode, &base).await,
        Commands::Alarms(cmd) => alarms::execute(cmd, mode, &base).await,
        Commands::Status(args) => status::execute(args, mode, &base).await,
        Commands::Health(args) => health::execute(args, mode, &base).await,
        Commands::Simulate(args) => simulate::execute(args, mode).await,
        Commands::Version => {
            version::execute(mode);
            Ok(())
        }
    }
}
