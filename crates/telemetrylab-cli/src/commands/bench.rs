use serde::Serialize;
use statrs::statistics::Statistics;

use telemetrylab_core::{ComputeLoad, measure_workload, run_workload};

/// Timing summary for one compute load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadTiming {
    pub load: u8,
    pub trials: usize,
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Serialize)]
struct BenchReport {
    telemetrylab_version: &'static str,
    trials: usize,
    warmup: usize,
    monotonic: bool,
    loads: Vec<LoadTiming>,
}

/// Summarise raw per-trial timings in milliseconds.
pub fn summarize(load: ComputeLoad, samples_ms: &[f64]) -> LoadTiming {
    let std_dev = if samples_ms.len() > 1 {
        samples_ms.std_dev()
    } else {
        0.0
    };
    LoadTiming {
        load: load.get(),
        trials: samples_ms.len(),
        mean_ms: samples_ms.mean(),
        std_dev_ms: std_dev,
        min_ms: samples_ms.min(),
        max_ms: samples_ms.max(),
    }
}

/// True if mean cost never drops as load rises.
pub fn is_monotonic(timings: &[LoadTiming]) -> bool {
    timings.windows(2).all(|w| w[1].mean_ms >= w[0].mean_ms)
}

pub fn run(trials: usize, warmup: usize, output_path: Option<&str>) {
    let trials = trials.max(1);
    println!("Timing the workload at every compute load ({trials} trials, {warmup} warmup)...\n");

    let mut timings = Vec::new();
    for load in ComputeLoad::all() {
        for _ in 0..warmup {
            run_workload(load);
        }
        let samples: Vec<f64> = measure_workload(load, trials)
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        let t = summarize(load, &samples);
        println!(
            "  load {}  mean {:>8.3} ms  σ {:>7.3}  [{:.3} – {:.3}]",
            t.load, t.mean_ms, t.std_dev_ms, t.min_ms, t.max_ms
        );
        timings.push(t);
    }

    let monotonic = is_monotonic(&timings);

    println!("\n{}", "=".repeat(52));
    println!(
        "{:<6} {:>10} {:>10} {:>10} {:>10}",
        "Load", "Mean ms", "Std dev", "vs load 1", "Jank@16"
    );
    println!("{}", "-".repeat(52));
    let base = timings.first().map_or(0.0, |t| t.mean_ms);
    for t in &timings {
        let ratio = if base > 0.0 { t.mean_ms / base } else { 0.0 };
        println!(
            "{:<6} {:>10.3} {:>10.3} {:>9.2}x {:>10}",
            t.load,
            t.mean_ms,
            t.std_dev_ms,
            ratio,
            if t.mean_ms > 16.0 { "yes" } else { "no" }
        );
    }
    println!();
    if monotonic {
        println!("Cost is non-decreasing in load.");
    } else {
        println!("Cost is NOT monotonic in load; rerun with more --trials on a quieter machine.");
    }

    if let Some(path) = output_path {
        let report = BenchReport {
            telemetrylab_version: telemetrylab_core::VERSION,
            trials,
            warmup,
            monotonic,
            loads: timings,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    eprintln!("Error writing {path}: {e}");
                    std::process::exit(1);
                }
                println!("Results written to {path}");
            }
            Err(e) => {
                eprintln!("Error serializing results: {e}");
                std::process::exit(1);
            }
        }
    }
}
