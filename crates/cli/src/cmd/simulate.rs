use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use rand::Rng;

use vigil_common::nats_config::readings_subject_for;
use vigil_common::reading::Reading;

use crate::output::{print_json, progress, theme, OutputMode};

#[derive(Args)]
pub struct SimulateArgs {
    #[arg(long, env = "VIGIL_NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,
    #[arg(long, default_value_t = 3, help = "Number of simulated devices")]
    pub devices: u32,
    #[arg(long, default_value_t = 1.0, help = "Seconds between publishing rounds")]
    pub interval_secs: f64,
    #[arg(long, help = "Stop after this many rounds (runs until interrupted when omitted)")]
    pub rounds: Option<u64>,
}

pub fn device_name(index: u32) -> String {
    format!("device-{index}")
}

/// Random reading carrying a `temperature` and a `current` metric.
pub fn random_reading<R: Rng>(rng: &mut R, device_id: &str, timestamp_ms: i64) -> Reading {
    let temperature = (rng.gen_range(15.0..35.0_f64) * 10.0).round() / 10.0;
    let current = (rng.gen_range(0.0..15.0_f64) * 100.0).round() / 100.0;
    Reading::new(device_id, timestamp_ms)
        .with_metric("temperature", temperature)
        .with_metric("current", current)
}

pub async fn execute(args: SimulateArgs, mode: OutputMode) -> Result<()> {
    if args.devices == 0 {
        anyhow::bail!("--devices must be at least 1");
    }
    if !(args.interval_secs.is_finite() && args.interval_secs > 0.0) {
        anyhow::bail!("--interval-secs must be positive");
    }

    let client = async_nats::connect(&args.nats_url)
        .await
        .with_context(|| format!("failed to connect to NATS at {}", args.nats_url))?;
    let js = async_nats::jetstream::new(client);

    if mode == OutputMode::Human {
        theme::print_header("Reading Simulator");
        theme::print_kv("NATS", &args.nats_url);
        theme::print_kv("Devices", &args.devices.to_string());
        theme::print_kv("Interval", &format!("{}s", args.interval_secs));
        println!();
    }

    let pb = match (mode, args.rounds) {
        (OutputMode::Human, Some(rounds)) => Some(progress::create(rounds, "rounds published")),
        _ => None,
    };

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(args.interval_secs));
    let mut published: u64 = 0;
    let mut round: u64 = 0;

    loop {
        if args.rounds.is_some_and(|limit| round >= limit) {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        let now = chrono::Utc::now().timestamp_millis();
        let readings: Vec<Reading> = {
            let mut rng = rand::thread_rng();
            (1..=args.devices)
                .map(|i| random_reading(&mut rng, &device_name(i), now))
                .collect()
        };

        for reading in &readings {
            let payload = serde_json::to_vec(&reading.to_payload())?;
            js.publish(readings_subject_for(&reading.device_id), payload.into())
                .await
                .context("publish failed")?
                .await
                .context("stream did not acknowledge reading")?;
            published += 1;

            if mode == OutputMode::Json {
                print_json(&reading.to_payload())?;
            }
        }

        round += 1;
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }

    if let Some(pb) = pb {
        progress::finish(&pb, &format!("Published {published} readings"));
    } else if mode == OutputMode::Human {
        theme::print_dim(&format!("Published {published} readings over {round} rounds"));
    }

    Ok(())
}
