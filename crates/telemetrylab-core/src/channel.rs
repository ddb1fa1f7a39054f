//! Latest-value state holder shared between the pacer loop and its observers.
//!
//! Built on [`tokio::sync::watch`]: writers replace the value under the
//! channel's lock, readers either peek at the current value synchronously or
//! await the next change. Readers that fall behind only ever see the most
//! recent snapshot, never a stale one after a newer one.

use tokio::sync::watch;

use crate::metrics::CycleMetrics;
use crate::snapshot::PerformanceSnapshot;
use crate::workload::ComputeLoad;

/// Single-writer, multi-reader holder of the current [`PerformanceSnapshot`].
#[derive(Debug)]
pub struct StateChannel {
    tx: watch::Sender<PerformanceSnapshot>,
}

impl StateChannel {
    pub fn new() -> Self {
        Self::with_initial(PerformanceSnapshot::default())
    }

    pub fn with_initial(initial: PerformanceSnapshot) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Clone of the current snapshot.
    pub fn current(&self) -> PerformanceSnapshot {
        self.tx.borrow().clone()
    }

    /// New observer positioned at the current value.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live [`Subscription`]s.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn compute_load(&self) -> ComputeLoad {
        self.tx.borrow().compute_load
    }

    pub fn is_running(&self) -> bool {
        self.tx.borrow().is_running
    }

    pub(crate) fn set_compute_load(&self, load: ComputeLoad) {
        self.tx.send_if_modified(|s| {
            let changed = s.compute_load != load;
            s.compute_load = load;
            changed
        });
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.tx.send_if_modified(|s| {
            let changed = s.is_running != running;
            s.is_running = running;
            changed
        });
    }

    /// Fresh run: zero the per-run fields and raise the run flag in one write.
    pub(crate) fn begin_run(&self) {
        self.tx.send_modify(|s| {
            s.clear_run();
            s.is_running = true;
        });
    }

    /// Observers are only woken when the flag actually flips.
    pub(crate) fn set_power_save(&self, active: bool) {
        self.tx.send_if_modified(|s| {
            let changed = s.is_power_save_mode != active;
            s.is_power_save_mode = active;
            changed
        });
    }

    pub(crate) fn publish_metrics(&self, metrics: &CycleMetrics) {
        self.tx.send_modify(|s| s.apply_metrics(metrics));
    }
}

impl Default for StateChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer handle returned by [`StateChannel::subscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    rx: watch::Receiver<PerformanceSnapshot>,
}

impl Subscription {
    /// Current value, marking it as seen.
    pub fn latest(&mut self) -> PerformanceSnapshot {
        self.rx.borrow_and_update().clone()
    }

    /// Whether a value newer than the last one seen has been written.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait for the next write. Returns `None` once the channel is gone.
    pub async fn changed(&mut self) -> Option<PerformanceSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(frame_count: u64) -> CycleMetrics {
        CycleMetrics {
            latency_ms: 12,
            average_latency_ms: 12.0,
            jank_percentage: 0.0,
            jank_count: 0,
            frame_count,
            history: vec![12],
        }
    }

    #[test]
    fn test_new_channel_holds_default() {
        let ch = StateChannel::new();
        assert_eq!(ch.current(), PerformanceSnapshot::default());
        assert_eq!(ch.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_sees_publish() {
        let ch = StateChannel::new();
        let mut sub = ch.subscribe();
        assert!(!sub.has_changed());

        ch.publish_metrics(&metrics(1));
        assert!(sub.has_changed());
        assert_eq!(sub.latest().frame_counter, 1);
        assert!(!sub.has_changed());
    }

    #[test]
    fn test_late_reader_gets_only_latest() {
        let ch = StateChannel::new();
        let mut sub = ch.subscribe();
        for n in 1..=5 {
            ch.publish_metrics(&metrics(n));
        }
        assert_eq!(sub.latest().frame_counter, 5);
    }

    #[test]
    fn test_power_save_only_notifies_on_flip() {
        let ch = StateChannel::new();
        let mut sub = ch.subscribe();
        ch.set_power_save(false);
        assert!(!sub.has_changed());
        ch.set_power_save(true);
        assert!(sub.has_changed());
        assert!(sub.latest().is_power_save_mode);
    }

    #[test]
    fn test_publish_keeps_load_and_flags() {
        let ch = StateChannel::new();
        ch.set_compute_load(ComputeLoad::new(4));
        ch.set_running(true);
        ch.set_power_save(true);
        ch.publish_metrics(&metrics(6));
        let s = ch.current();
        assert_eq!(s.compute_load.get(), 4);
        assert!(s.is_running);
        assert!(s.is_power_save_mode);
        assert_eq!(s.frame_counter, 6);
    }

    #[test]
    fn test_begin_run_resets_counters() {
        let ch = StateChannel::new();
        ch.set_compute_load(ComputeLoad::new(3));
        ch.set_power_save(true);
        ch.publish_metrics(&metrics(40));
        ch.begin_run();
        let s = ch.current();
        assert!(s.is_running);
        assert!(!s.is_power_save_mode);
        assert_eq!(s.frame_counter, 0);
        assert_eq!(s.compute_load.get(), 3);
    }

    #[test]
    fn test_async_changed_returns_new_value() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let ch = StateChannel::new();
        let mut sub = ch.subscribe();
        ch.publish_metrics(&metrics(3));
        let got = rt.block_on(sub.changed()).unwrap();
        assert_eq!(got.frame_counter, 3);
    }

    #[test]
    fn test_changed_none_after_channel_dropped() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let ch = StateChannel::new();
        let mut sub = ch.subscribe();
        drop(ch);
        assert!(rt.block_on(sub.changed()).is_none());
    }
}
