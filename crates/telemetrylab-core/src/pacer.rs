//! The frame-paced measurement loop.
//!
//! Lifecycle: `Idle` → [`FramePacer::start`] → `Running` → [`FramePacer::stop`]
//! → `Idle`. While running, a dedicated thread repeats one cycle:
//!
//! 1. poll the power-save signal and publish the flag immediately
//! 2. pick the cadence (normal or power-save rate) and effective load
//! 3. run the workload synchronously and time it
//! 4. record the latency, publishing a full snapshot every `publish_every` cycles
//! 5. sleep out the rest of the period, waking early on cancellation
//!
//! Controls and observers talk to the loop only through the [`StateChannel`]
//! and the run's [`CancelToken`]. Metrics live on the loop thread.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::channel::{StateChannel, Subscription};
use crate::metrics::{DEFAULT_HISTORY_CAPACITY, DEFAULT_JANK_THRESHOLD_MS, MetricsAggregator};
use crate::platform::{BackgroundKeeper, NoopKeeper, PowerSaveSignal};
use crate::snapshot::PerformanceSnapshot;
use crate::workload::{ComputeLoad, ConvolutionWorkload, Workload};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for a [`FramePacer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerConfig {
    /// Target cycles per second with power-save off.
    pub normal_rate_hz: u32,
    /// Target cycles per second with power-save on.
    pub power_save_rate_hz: u32,
    /// Publish a full snapshot every this many cycles.
    pub publish_every: u64,
    /// Cycles strictly slower than this count as jank.
    pub jank_threshold_ms: u64,
    /// Recent latencies kept in the snapshot.
    pub history_capacity: usize,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            normal_rate_hz: 20,
            power_save_rate_hz: 10,
            publish_every: 5,
            jank_threshold_ms: DEFAULT_JANK_THRESHOLD_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl PacerConfig {
    /// Target cycle period in whole milliseconds.
    pub fn cycle_period(&self, power_save: bool) -> Duration {
        let hz = if power_save {
            self.power_save_rate_hz
        } else {
            self.normal_rate_hz
        };
        Duration::from_millis(1000 / u64::from(hz.max(1)))
    }

    fn publishes_on(&self, cycle_index: u64) -> bool {
        cycle_index % self.publish_every.max(1) == 0
    }
}

/// Load actually run for a cycle: one level lower under power-save, floored at 1.
pub fn effective_load(load: ComputeLoad, power_save: bool) -> ComputeLoad {
    if power_save {
        load.for_power_save()
    } else {
        load
    }
}

// ---------------------------------------------------------------------------
// FramePacer
// ---------------------------------------------------------------------------

struct RunHandle {
    cancel: CancelToken,
    thread: JoinHandle<()>,
}

/// Owns the measurement loop and its control surface.
///
/// All methods take `&self`; share the pacer across threads with an `Arc`.
/// Dropping a running pacer stops it.
pub struct FramePacer {
    channel: Arc<StateChannel>,
    power: Arc<dyn PowerSaveSignal>,
    keeper: Arc<dyn BackgroundKeeper>,
    workload: Arc<dyn Workload>,
    config: PacerConfig,
    run: Mutex<Option<RunHandle>>,
}

impl FramePacer {
    /// Pacer with default tunables, the convolution workload and no keeper.
    pub fn new(power: Arc<dyn PowerSaveSignal>) -> Self {
        Self::with_config(PacerConfig::default(), power, Arc::new(NoopKeeper))
    }

    pub fn with_config(
        config: PacerConfig,
        power: Arc<dyn PowerSaveSignal>,
        keeper: Arc<dyn BackgroundKeeper>,
    ) -> Self {
        Self {
            channel: Arc::new(StateChannel::new()),
            power,
            keeper,
            workload: Arc::new(ConvolutionWorkload),
            config,
            run: Mutex::new(None),
        }
    }

    /// Replace the per-cycle workload.
    pub fn with_workload(mut self, workload: Arc<dyn Workload>) -> Self {
        self.workload = workload;
        self
    }

    /// Initial compute load, before the first run.
    pub fn with_compute_load(self, level: i64) -> Self {
        self.set_compute_load(level);
        self
    }

    pub fn config(&self) -> &PacerConfig {
        &self.config
    }

    /// Name of the injected power-save signal.
    pub fn power_signal_name(&self) -> &'static str {
        self.power.name()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> PerformanceSnapshot {
        self.channel.current()
    }

    pub fn subscribe(&self) -> Subscription {
        self.channel.subscribe()
    }

    pub fn channel(&self) -> &StateChannel {
        &self.channel
    }

    /// Reads the published run flag, so it never waits on a concurrent `stop`.
    pub fn is_running(&self) -> bool {
        self.channel.is_running()
    }

    pub fn compute_load(&self) -> ComputeLoad {
        self.channel.compute_load()
    }

    /// Set the load used from the next cycle on, clamped to `[1, 5]`.
    pub fn set_compute_load(&self, level: i64) -> ComputeLoad {
        let load = ComputeLoad::new(level);
        self.channel.set_compute_load(load);
        debug!("compute load set to {load} (requested {level})");
        load
    }

    /// Start a fresh run. No-op if already running.
    ///
    /// Only fails if the loop thread cannot be spawned, in which case the
    /// pacer stays idle.
    pub fn start(&self) -> io::Result<()> {
        let mut run = lock(&self.run);
        if let Some(handle) = run.take() {
            if !handle.thread.is_finished() {
                debug!("start ignored: pacer already running");
                *run = Some(handle);
                return Ok(());
            }
            // The previous loop died without a stop().
            self.reap(handle);
        }

        self.channel.begin_run();
        let load = self.channel.compute_load();
        if let Err(e) = self.keeper.engage(load) {
            warn!("background keeper failed to engage: {e}");
        }

        let cancel = CancelToken::new();
        let cycle = CycleLoop {
            channel: Arc::clone(&self.channel),
            power: Arc::clone(&self.power),
            workload: Arc::clone(&self.workload),
            metrics: MetricsAggregator::with_limits(
                self.config.history_capacity,
                self.config.jank_threshold_ms,
            ),
            config: self.config.clone(),
            cancel: cancel.clone(),
        };

        let spawned = thread::Builder::new()
            .name("telemetrylab-pacer".into())
            .spawn(move || cycle.run());

        match spawned {
            Ok(thread) => {
                *run = Some(RunHandle { cancel, thread });
                info!(
                    "pacer started: load {load}, {} Hz ({} Hz power-save)",
                    self.config.normal_rate_hz, self.config.power_save_rate_hz
                );
                Ok(())
            }
            Err(e) => {
                self.channel.set_running(false);
                if let Err(release) = self.keeper.release() {
                    warn!("background keeper failed to release: {release}");
                }
                Err(e)
            }
        }
    }

    /// Stop the current run. No-op if idle; safe to call repeatedly.
    ///
    /// Returns once the loop thread has exited, which takes at most the
    /// remainder of an in-flight workload computation.
    pub fn stop(&self) {
        let mut run = lock(&self.run);
        let Some(handle) = run.take() else {
            return;
        };

        handle.cancel.cancel();
        self.reap(handle);
        info!(
            "pacer stopped after {} cycles",
            self.channel.current().frame_counter
        );
    }
}

impl FramePacer {
    /// Join a cancelled or dead loop thread and end its run.
    fn reap(&self, handle: RunHandle) {
        if handle.thread.join().is_err() {
            error!("pacer loop panicked");
        }
        self.channel.set_running(false);
        if let Err(e) = self.keeper.release() {
            warn!("background keeper failed to release: {e}");
        }
    }
}

impl Drop for FramePacer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Lowers the run flag if the loop thread unwinds, e.g. from a panicking workload.
struct ClearOnPanic(Arc<StateChannel>);

impl Drop for ClearOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.set_running(false);
        }
    }
}

/// State moved onto the loop thread for one run.
struct CycleLoop {
    channel: Arc<StateChannel>,
    power: Arc<dyn PowerSaveSignal>,
    workload: Arc<dyn Workload>,
    metrics: MetricsAggregator,
    config: PacerConfig,
    cancel: CancelToken,
}

impl CycleLoop {
    fn run(mut self) {
        let _unwind = ClearOnPanic(Arc::clone(&self.channel));
        let mut cycle_index: u64 = 0;
        let mut power_save = false;
        let mut signal_failing = false;

        while !self.cancel.is_cancelled() {
            let started = Instant::now();

            let active = self.poll_power_save(&mut signal_failing);
            if active != power_save {
                info!("power-save {}", if active { "engaged" } else { "released" });
                power_save = active;
            }
            self.channel.set_power_save(active);

            let period = self.config.cycle_period(active);
            let load = effective_load(self.channel.compute_load(), active);

            self.workload.run(load);

            let latency = started.elapsed();
            let cycle = self.metrics.record_cycle(latency.as_millis() as u64);
            if self.config.publishes_on(cycle_index) {
                self.channel.publish_metrics(&cycle);
            }
            cycle_index += 1;

            let remaining = period.saturating_sub(latency);
            if !remaining.is_zero() && !self.cancel.sleep(remaining) {
                break;
            }
        }

        debug!("pacer loop exiting after {cycle_index} cycles");
    }

    /// Signal errors read as "not in power-save"; logged once per failure streak.
    fn poll_power_save(&self, failing: &mut bool) -> bool {
        match self.power.is_power_save_active() {
            Ok(active) => {
                *failing = false;
                active
            }
            Err(e) => {
                if !*failing {
                    debug!("power-save signal '{}' unavailable: {e}", self.power.name());
                    *failing = true;
                }
                false
            }
        }
    }
}
