//! CLI for telemetrylab: pace a CPU workload and watch its latency and jank live.

mod commands;
mod tui;

use clap::{Parser, Subcommand};

use commands::PacerArgs;

#[derive(Parser)]
#[command(name = "telemetrylab")]
#[command(about = "telemetrylab: frame-paced CPU workload with live latency and jank telemetry")]
#[command(version = telemetrylab_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pacer headless and print every published snapshot
    Run {
        #[command(flatten)]
        pacer: PacerArgs,

        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(long)]
        duration: Option<f64>,

        /// Print snapshots as JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Interactive dashboard: latency chart, load and jank gauges
    Monitor {
        #[command(flatten)]
        pacer: PacerArgs,

        /// Start the pacer immediately instead of waiting for space
        #[arg(long)]
        autostart: bool,
    },

    /// Time the workload at every compute load and check cost grows with load
    Bench {
        /// Timed runs per load level
        #[arg(long, default_value = "30")]
        trials: usize,

        /// Untimed runs per load level before measuring
        #[arg(long, default_value = "3")]
        warmup: usize,

        /// Write machine-readable results as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Show what the power-save signal reports on this machine
    Power {
        /// Print the reading as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve snapshots and run controls over HTTP
    Server {
        #[command(flatten)]
        pacer: PacerArgs,

        /// Port to listen on
        #[arg(long, default_value = "8047")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Start the pacer as soon as the server is up
        #[arg(long)]
        autostart: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            pacer,
            duration,
            json,
        } => commands::run::run(&pacer, duration, json),
        Commands::Monitor { pacer, autostart } => commands::monitor::run(&pacer, autostart),
        Commands::Bench {
            trials,
            warmup,
            output,
        } => commands::bench::run(trials, warmup, output.as_deref()),
        Commands::Power { json } => commands::power::run(json),
        Commands::Server {
            pacer,
            port,
            host,
            autostart,
        } => commands::server::run(&pacer, &host, port, autostart),
    }
}
