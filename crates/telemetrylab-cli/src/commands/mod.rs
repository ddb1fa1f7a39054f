pub mod bench;
pub mod monitor;
pub mod power;
pub mod run;
pub mod server;

use std::sync::Arc;

use clap::Args;
use telemetrylab_core::{
    BackgroundKeeper, FramePacer, ManualPowerSignal, NoopKeeper, PacerConfig,
    PerformanceSnapshot, PowerSaveSignal, StatusFileKeeper, SystemPowerSignal,
};

/// Pacer flags shared by `run`, `monitor` and `server`.
#[derive(Args, Debug, Clone)]
pub struct PacerArgs {
    /// Initial compute load (clamped to 1-5)
    #[arg(long, default_value = "2", allow_negative_numbers = true)]
    pub load: i64,

    /// Target cycles per second
    #[arg(long, default_value = "20")]
    pub rate_hz: u32,

    /// Target cycles per second while power-save is active
    #[arg(long, default_value = "10")]
    pub power_save_rate_hz: u32,

    /// Publish a full snapshot every N cycles
    #[arg(long, default_value = "5")]
    pub publish_every: u64,

    /// Cycles slower than this many milliseconds count as jank
    #[arg(long, default_value = "16")]
    pub jank_ms: u64,

    /// Number of recent latencies kept for the chart
    #[arg(long, default_value = "100")]
    pub history: usize,

    /// Power-save source: auto (read the OS), on, off
    #[arg(long, default_value = "auto", value_parser = ["auto", "on", "off"])]
    pub power_save: String,

    /// Keep a JSON status file at this path while a run is active
    #[arg(long)]
    pub status_file: Option<String>,
}

impl PacerArgs {
    pub fn config(&self) -> PacerConfig {
        PacerConfig {
            normal_rate_hz: self.rate_hz,
            power_save_rate_hz: self.power_save_rate_hz,
            publish_every: self.publish_every,
            jank_threshold_ms: self.jank_ms,
            history_capacity: self.history,
        }
    }
}

/// Where the pacer's power-save flag comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    Auto,
    On,
    Off,
}

/// Parse a power-save mode string into the enum.
pub fn parse_power_mode(s: &str) -> PowerMode {
    match s {
        "auto" => PowerMode::Auto,
        "on" | "true" | "1" => PowerMode::On,
        "off" | "false" | "0" => PowerMode::Off,
        _ => {
            eprintln!("Unknown power-save mode '{s}', using auto");
            PowerMode::Auto
        }
    }
}

pub fn power_signal(mode: PowerMode) -> Arc<dyn PowerSaveSignal> {
    match mode {
        PowerMode::Auto => Arc::new(SystemPowerSignal::new()),
        PowerMode::On => Arc::new(ManualPowerSignal::new(true)),
        PowerMode::Off => Arc::new(ManualPowerSignal::new(false)),
    }
}

/// Build a pacer from the shared flags.
pub fn make_pacer(args: &PacerArgs) -> FramePacer {
    let keeper: Arc<dyn BackgroundKeeper> = match &args.status_file {
        Some(path) => Arc::new(StatusFileKeeper::new(path)),
        None => Arc::new(NoopKeeper),
    };
    FramePacer::with_config(
        args.config(),
        power_signal(parse_power_mode(&args.power_save)),
        keeper,
    )
    .with_compute_load(args.load)
}

/// Column header matching [`format_row`].
pub fn format_header() -> String {
    format!(
        "{:>7} {:>4} {:>8} {:>8} {:>7} {:>6} {:>5}",
        "frame", "load", "last ms", "avg ms", "jank %", "janky", "power"
    )
}

/// One table row per published snapshot.
pub fn format_row(s: &PerformanceSnapshot) -> String {
    format!(
        "{:>7} {:>4} {:>8} {:>8.2} {:>7.1} {:>6} {:>5}",
        s.frame_counter,
        s.compute_load,
        s.current_latency_ms,
        s.average_latency_ms,
        s.jank_percentage,
        s.jank_frame_count,
        if s.is_power_save_mode { "save" } else { "-" }
    )
}
