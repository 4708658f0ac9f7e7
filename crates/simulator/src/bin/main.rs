//! Brokersim CLI
//!
//! Run deterministic broker-cluster simulations from a scenario file or a
//! generated pipeline.
//!
//! # Example
//!
//! ```bash
//! # A producer outpacing one consumer, for two minutes of simulated time
//! brokersim --producer-rate 8 --consumer-rate 5 -d 120
//!
//! # A scripted outage, printed as JSON, with an explanation of failover
//! brokersim --scenario outage.toml --json --explain failover
//! ```

use anyhow::Context;
use brokersim_cluster::Advisor;
use brokersim_simulator::{GlossaryAdvisor, Scenario, Simulator};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Brokersim
///
/// Simulates a small message-broker cluster tick by tick: partition
/// assignment, consumer rebalancing, leader failover and controller
/// election. Reproducible for a given seed.
#[derive(Parser, Debug)]
#[command(name = "brokersim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Scenario file (TOML). When omitted, a single pipeline is generated.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Simulated duration in seconds. Overrides the scenario's duration.
    #[arg(short = 'd', long)]
    duration: Option<u64>,

    /// Seed for replica selection. Overrides the scenario's seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Producer rate of the generated pipeline
    #[arg(long, default_value = "8")]
    producer_rate: f64,

    /// Rate of each consumer in the generated pipeline
    #[arg(long, default_value = "5")]
    consumer_rate: f64,

    /// Number of consumers in the generated pipeline
    #[arg(long, default_value = "1")]
    consumers: u32,

    /// Partition count of the generated pipeline's topic
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    partitions: u32,

    /// Print the report and final snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Explain a concept against the final state (e.g. "lag", "failover")
    #[arg(long)]
    explain: Option<String>,
}

const DEFAULT_DURATION_SECS: u64 = 60;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,brokersim_simulator=info")),
        )
        .init();

    let args = Args::parse();

    let mut scenario = match &args.scenario {
        Some(path) => Scenario::load(path)
            .with_context(|| format!("loading scenario {}", path.display()))?,
        None => Scenario::pipeline(
            args.duration.unwrap_or(DEFAULT_DURATION_SECS),
            args.producer_rate,
            args.consumer_rate,
            args.consumers,
            args.partitions,
        ),
    };
    if let Some(duration) = args.duration {
        anyhow::ensure!(duration > 0, "duration must be positive");
        scenario.duration_secs = duration;
    }
    if let Some(seed) = args.seed {
        scenario.config.seed = Some(seed);
    }

    info!(
        scenario = ?args.scenario,
        duration_secs = scenario.duration_secs,
        steps = scenario.steps.len(),
        "Starting simulation"
    );

    let mut simulator = Simulator::new(&scenario)?;
    let report = simulator.run();
    let snapshot = simulator.snapshot();

    let advice = args
        .explain
        .as_deref()
        .map(|concept| GlossaryAdvisor.advise(&snapshot.advisory(), concept));

    if args.json {
        let output = serde_json::json!({
            "report": report,
            "snapshot": snapshot,
            "advice": advice,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{report}");
        if let Some(advice) = advice {
            println!();
            println!("{advice}");
        }
    }

    Ok(())
}
