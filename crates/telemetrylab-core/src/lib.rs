//! # telemetrylab-core
//!
//! **A frame-paced CPU workload with live latency telemetry.**
//!
//! `telemetrylab-core` runs a synthetic convolution workload at a fixed
//! cadence (20 Hz normally, 10 Hz when the machine is in power-save), times
//! every cycle, and keeps rolling metrics: the latest latency, a running
//! average, the share of "jank" cycles slower than 16 ms, and a bounded
//! history for charting.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use telemetrylab_core::{FramePacer, SystemPowerSignal};
//!
//! let pacer = FramePacer::new(Arc::new(SystemPowerSignal::new()));
//! pacer.set_compute_load(3);
//! pacer.start().expect("spawn pacer thread");
//!
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! let snap = pacer.snapshot();
//! println!("{} frames, avg {:.1} ms, jank {:.1}%",
//!     snap.frame_counter, snap.average_latency_ms, snap.jank_percentage);
//!
//! pacer.stop();
//! ```
//!
//! ## Architecture
//!
//! PowerSaveSignal → FramePacer loop → Workload → MetricsAggregator → StateChannel → observers
//!
//! The loop runs on its own thread. Observers read the latest
//! [`PerformanceSnapshot`] from the [`StateChannel`], synchronously or by
//! awaiting the next change on a [`Subscription`]. A full snapshot is
//! published every fifth cycle; the power-save flag is published as soon as
//! it flips.

pub mod cancel;
pub mod channel;
pub mod metrics;
pub mod pacer;
pub mod platform;
pub mod snapshot;
pub mod workload;

pub use cancel::CancelToken;
pub use channel::{StateChannel, Subscription};
pub use metrics::{
    CycleMetrics, DEFAULT_HISTORY_CAPACITY, DEFAULT_JANK_THRESHOLD_MS, MetricsAggregator,
};
pub use pacer::{FramePacer, PacerConfig, effective_load};
pub use platform::{
    BackgroundKeeper, KeeperStatus, ManualPowerSignal, NoopKeeper, PowerSaveSignal,
    StatusFileKeeper, SystemPowerSignal,
};
pub use snapshot::PerformanceSnapshot;
pub use workload::{
    ComputeLoad, ConvolutionWorkload, GRID_SIZE, KERNEL, Workload, convolve, measure_workload,
    run_workload, seed_grid,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
