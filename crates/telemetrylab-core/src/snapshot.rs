//! The published performance state.

use serde::{Deserialize, Serialize};

use crate::metrics::CycleMetrics;
use crate::workload::ComputeLoad;

/// Everything a display needs, replaced wholesale on each publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub is_running: bool,
    pub compute_load: ComputeLoad,
    /// Duration of the most recently published cycle.
    pub current_latency_ms: u64,
    /// Mean cycle latency since the run started.
    pub average_latency_ms: f64,
    /// Jank cycles / total cycles × 100.
    pub jank_percentage: f64,
    pub jank_frame_count: u64,
    /// Cycles completed since the run started.
    pub frame_counter: u64,
    /// Updated every cycle, ahead of the throttled metric fields.
    pub is_power_save_mode: bool,
    /// Recent cycle latencies, oldest first.
    pub latency_history: Vec<u64>,
}

impl Default for PerformanceSnapshot {
    fn default() -> Self {
        Self {
            is_running: false,
            compute_load: ComputeLoad::default(),
            current_latency_ms: 0,
            average_latency_ms: 0.0,
            jank_percentage: 0.0,
            jank_frame_count: 0,
            frame_counter: 0,
            is_power_save_mode: false,
            latency_history: Vec::new(),
        }
    }
}

impl PerformanceSnapshot {
    /// Copy the aggregate fields of `metrics` into this snapshot.
    ///
    /// Control fields (`is_running`, `compute_load`) and the power-save flag
    /// are left untouched.
    pub fn apply_metrics(&mut self, metrics: &CycleMetrics) {
        self.current_latency_ms = metrics.latency_ms;
        self.average_latency_ms = metrics.average_latency_ms;
        self.jank_percentage = metrics.jank_percentage;
        self.jank_frame_count = metrics.jank_count;
        self.frame_counter = metrics.frame_count;
        self.latency_history.clone_from(&metrics.history);
    }

    /// Zero every per-run field, keeping the configured load.
    ///
    /// The power-save flag is cleared too; the first cycle of the next run
    /// polls the signal again.
    pub fn clear_run(&mut self) {
        *self = Self {
            compute_load: self.compute_load,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metrics() -> CycleMetrics {
        CycleMetrics {
            latency_ms: 30,
            average_latency_ms: 16.25,
            jank_percentage: 50.0,
            jank_count: 2,
            frame_count: 4,
            history: vec![10, 20, 5, 30],
        }
    }

    #[test]
    fn test_default_snapshot() {
        let s = PerformanceSnapshot::default();
        assert!(!s.is_running);
        assert_eq!(s.compute_load.get(), 2);
        assert_eq!(s.frame_counter, 0);
        assert!(s.latency_history.is_empty());
    }

    #[test]
    fn test_apply_metrics_keeps_control_fields() {
        let mut s = PerformanceSnapshot {
            is_running: true,
            compute_load: ComputeLoad::new(4),
            is_power_save_mode: true,
            ..Default::default()
        };
        s.apply_metrics(&sample_metrics());
        assert!(s.is_running);
        assert!(s.is_power_save_mode);
        assert_eq!(s.compute_load.get(), 4);
        assert_eq!(s.current_latency_ms, 30);
        assert_eq!(s.jank_frame_count, 2);
        assert_eq!(s.frame_counter, 4);
        assert_eq!(s.latency_history, vec![10, 20, 5, 30]);
    }

    #[test]
    fn test_clear_run_keeps_load() {
        let mut s = PerformanceSnapshot {
            is_running: true,
            is_power_save_mode: true,
            compute_load: ComputeLoad::new(5),
            ..Default::default()
        };
        s.apply_metrics(&sample_metrics());
        s.clear_run();
        assert!(!s.is_running);
        assert!(!s.is_power_save_mode);
        assert_eq!(s.compute_load.get(), 5);
        assert_eq!(s.frame_counter, 0);
        assert_eq!(s.average_latency_ms, 0.0);
        assert!(s.latency_history.is_empty());
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(PerformanceSnapshot::default()).unwrap();
        for key in [
            "is_running",
            "compute_load",
            "current_latency_ms",
            "average_latency_ms",
            "jank_percentage",
            "jank_frame_count",
            "frame_counter",
            "is_power_save_mode",
            "latency_history",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["compute_load"], 2);
    }
}
