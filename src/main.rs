//! Kelly Allocator — Entry Point
//!
//! Wiring sequence:
//! 1. Parse CLI flags
//! 2. Load config.toml (defaults if absent), apply CLI overrides, validate
//! 3. Init tracing (JSON or pretty, on stderr)
//! 4. Run the training loop with a console progress log on stderr
//! 5. Print the report (tables or JSON) on stdout
//!
//! Exit status: 0 when the run converges, 1 on divergence or failure,
//! 2 when the market input is rejected.

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use kelly_allocator::adapters::console::ConsoleLog;
use kelly_allocator::adapters::{input, table};
use kelly_allocator::config::loader::{load_or_default, validate_config};
use kelly_allocator::config::{AppConfig, LogFormat};
use kelly_allocator::usecases::training_loop::{RunOutcome, TrainingLoop};

/// Multi-market Kelly allocation via Monte-Carlo gradient ascent.
#[derive(Parser, Debug)]
#[command(name = "kelly-allocator", version, about)]
struct Cli {
    /// Configuration file; built-in defaults are used if it does not exist.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Market prices, comma-separated (e.g. "0.3, 0.55").
    #[arg(long)]
    prices: Option<String>,

    /// True YES probabilities, comma-separated.
    #[arg(long)]
    probs: Option<String>,

    /// Initial wealth in USDC.
    #[arg(short, long)]
    wealth: Option<f64>,

    /// Adam learning rate.
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Number of optimizer iterations.
    #[arg(short, long)]
    iterations: Option<usize>,

    /// Monte-Carlo samples per iteration.
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// RNG seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    /// Print the outcome as JSON instead of tables.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(prices) = &self.prices {
            config.market.prices.clone_from(prices);
        }
        if let Some(probs) = &self.probs {
            config.market.true_probabilities.clone_from(probs);
        }
        let opt = &mut config.optimizer;
        if let Some(w) = self.wealth {
            opt.initial_wealth = w;
        }
        if let Some(lr) = self.learning_rate {
            opt.learning_rate = lr;
        }
        if let Some(n) = self.iterations {
            opt.iterations = n;
        }
        if let Some(b) = self.batch_size {
            opt.batch_size = b;
        }
        if self.seed.is_some() {
            opt.seed = self.seed;
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.app.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.app.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── 1. Configuration: file, then CLI overrides ──────────
    let mut config = load_or_default(&cli.config).context("Failed to load configuration")?;
    cli.apply(&mut config);
    validate_config(&config).context("Invalid configuration")?;

    // ── 2. Logging ──────────────────────────────────────────
    init_tracing(&config);
    info!(
        name = %config.app.name,
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config,
        "Starting Kelly allocator"
    );

    // ── 3. Run ──────────────────────────────────────────────
    let request = input::run_request(&config);
    let mut controller = TrainingLoop::with_seed(config.optimizer.seed);
    let mut log = ConsoleLog::new(std::io::stderr());
    let outcome = controller.run(&request, &mut log).await;

    // ── 4. Output ───────────────────────────────────────────
    if cli.json {
        println!("{}", table::render_json(&outcome)?);
    } else if let Some(report) = outcome.report() {
        println!("{}", table::render_report(report));
    }

    Ok(match outcome {
        RunOutcome::Converged { .. } => ExitCode::SUCCESS,
        RunOutcome::Rejected(_) => ExitCode::from(2),
        RunOutcome::Diverged { .. } | RunOutcome::Failed { .. } => ExitCode::FAILURE,
    })
}
