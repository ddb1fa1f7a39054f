//! Rolling per-cycle latency statistics.
//!
//! [`MetricsAggregator`] is owned by the pacer loop thread and rebuilt for
//! every run. It keeps cumulative totals (for the mean and the jank ratio)
//! plus a bounded FIFO of the most recent latencies for charting.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Cycles slower than this many milliseconds count as jank (one 60 fps frame).
pub const DEFAULT_JANK_THRESHOLD_MS: u64 = 16;

/// Number of recent latencies kept for display.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Aggregate view returned after every recorded cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleMetrics {
    /// Latency of the cycle just recorded.
    pub latency_ms: u64,
    /// `total_latency / frame_count`, or 0 before the first cycle.
    pub average_latency_ms: f64,
    /// Jank cycles as a percentage of all cycles.
    pub jank_percentage: f64,
    pub jank_count: u64,
    pub frame_count: u64,
    /// Recent latencies, oldest first.
    pub history: Vec<u64>,
}

/// Cumulative latency bookkeeping for one run.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    history: VecDeque<u64>,
    capacity: usize,
    jank_threshold_ms: u64,
    total_latency_ms: u64,
    jank_count: u64,
    frame_count: u64,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_HISTORY_CAPACITY, DEFAULT_JANK_THRESHOLD_MS)
    }

    /// Aggregator with a custom history capacity and jank threshold.
    ///
    /// A capacity of zero is raised to one so the latest sample is always visible.
    pub fn with_limits(capacity: usize, jank_threshold_ms: u64) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity + 1),
            capacity,
            jank_threshold_ms,
            total_latency_ms: 0,
            jank_count: 0,
            frame_count: 0,
        }
    }

    /// Record one cycle and return the updated aggregate view.
    pub fn record_cycle(&mut self, latency_ms: u64) -> CycleMetrics {
        self.history.push_back(latency_ms);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        self.total_latency_ms = self.total_latency_ms.saturating_add(latency_ms);
        self.frame_count += 1;
        if latency_ms > self.jank_threshold_ms {
            self.jank_count += 1;
        }

        self.view(latency_ms)
    }

    /// Drop all cumulative state and history.
    ///
    /// For callers that keep one aggregator across runs. [`FramePacer`]
    /// builds a fresh aggregator per run and never calls this.
    ///
    /// [`FramePacer`]: crate::FramePacer
    pub fn reset(&mut self) {
        self.history.clear();
        self.total_latency_ms = 0;
        self.jank_count = 0;
        self.frame_count = 0;
    }

    pub fn average_latency_ms(&self) -> f64 {
        if self.frame_count == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.frame_count as f64
        }
    }

    pub fn jank_percentage(&self) -> f64 {
        if self.frame_count == 0 {
            0.0
        } else {
            self.jank_count as f64 / self.frame_count as f64 * 100.0
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn jank_count(&self) -> u64 {
        self.jank_count
    }

    pub fn total_latency_ms(&self) -> u64 {
        self.total_latency_ms
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn jank_threshold_ms(&self) -> u64 {
        self.jank_threshold_ms
    }

    /// Copy of the recent-latency buffer, oldest first.
    pub fn history(&self) -> Vec<u64> {
        self.history.iter().copied().collect()
    }

    fn view(&self, latency_ms: u64) -> CycleMetrics {
        CycleMetrics {
            latency_ms,
            average_latency_ms: self.average_latency_ms(),
            jank_percentage: self.jank_percentage(),
            jank_count: self.jank_count,
            frame_count: self.frame_count,
            history: self.history(),
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(agg: &mut MetricsAggregator, samples: &[u64]) -> Option<CycleMetrics> {
        samples.iter().map(|&s| agg.record_cycle(s)).last()
    }

    // -----------------------------------------------------------------------
    // Aggregate statistics
    // -----------------------------------------------------------------------

    #[test]
    fn test_empty_aggregator_is_zero() {
        let agg = MetricsAggregator::new();
        assert_eq!(agg.frame_count(), 0);
        assert_eq!(agg.average_latency_ms(), 0.0);
        assert_eq!(agg.jank_percentage(), 0.0);
        assert!(agg.history().is_empty());
    }

    #[test]
    fn test_reference_sequence() {
        let mut agg = MetricsAggregator::new();
        let m = feed(&mut agg, &[10, 20, 5, 30]).unwrap();
        assert!((m.average_latency_ms - 16.25).abs() < f64::EPSILON);
        assert_eq!(m.jank_count, 2);
        assert!((m.jank_percentage - 50.0).abs() < f64::EPSILON);
        assert_eq!(m.frame_count, 4);
        assert_eq!(m.latency_ms, 30);
        assert_eq!(m.history, vec![10, 20, 5, 30]);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut agg = MetricsAggregator::new();
        let m = feed(&mut agg, &[16, 16, 17]).unwrap();
        assert_eq!(m.jank_count, 1);
    }

    #[test]
    fn test_average_and_jank_match_definition() {
        let samples: Vec<u64> = (0..500).map(|i| (i * 7919) % 41).collect();
        let mut agg = MetricsAggregator::new();
        let m = feed(&mut agg, &samples).unwrap();

        let sum: u64 = samples.iter().sum();
        let expected_avg = sum as f64 / samples.len() as f64;
        let expected_jank = samples.iter().filter(|&&s| s > 16).count() as u64;

        assert_eq!(m.average_latency_ms, expected_avg);
        assert_eq!(m.jank_count, expected_jank);
        assert!(m.jank_count <= m.frame_count);
        assert_eq!(agg.total_latency_ms(), sum);
    }

    #[test]
    fn test_custom_threshold() {
        let mut agg = MetricsAggregator::with_limits(10, 33);
        let m = feed(&mut agg, &[20, 34, 50]).unwrap();
        assert_eq!(m.jank_count, 2);
        assert_eq!(agg.jank_threshold_ms(), 33);
    }

    // -----------------------------------------------------------------------
    // History buffer
    // -----------------------------------------------------------------------

    #[test]
    fn test_history_keeps_last_100_of_150() {
        let mut agg = MetricsAggregator::new();
        let samples: Vec<u64> = (0..150).collect();
        let m = feed(&mut agg, &samples).unwrap();
        assert_eq!(m.history.len(), 100);
        assert_eq!(m.history, (50..150).collect::<Vec<u64>>());
        // Cumulative stats still cover every sample.
        assert_eq!(m.frame_count, 150);
    }

    #[test]
    fn test_history_never_exceeds_capacity() {
        let mut agg = MetricsAggregator::with_limits(8, 16);
        for i in 0..50 {
            let m = agg.record_cycle(i);
            assert!(m.history.len() <= 8);
        }
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let mut agg = MetricsAggregator::with_limits(0, 16);
        agg.record_cycle(3);
        let m = agg.record_cycle(4);
        assert_eq!(m.history, vec![4]);
        assert_eq!(agg.capacity(), 1);
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    #[test]
    fn test_reset_clears_everything() {
        let mut agg = MetricsAggregator::new();
        feed(&mut agg, &[40, 50, 60]);
        agg.reset();
        assert_eq!(agg.frame_count(), 0);
        assert_eq!(agg.jank_count(), 0);
        assert_eq!(agg.total_latency_ms(), 0);
        assert!(agg.history().is_empty());

        let m = agg.record_cycle(4);
        assert_eq!(m.frame_count, 1);
        assert_eq!(m.average_latency_ms, 4.0);
        assert_eq!(m.jank_count, 0);
    }
}
