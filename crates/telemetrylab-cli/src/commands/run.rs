use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::PacerArgs;

/// How often the headless loop checks for a new snapshot.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn run(args: &PacerArgs, duration_secs: Option<f64>, json: bool) {
    let pacer = super::make_pacer(args);
    let max_duration = duration_secs
        .filter(|d| *d > 0.0)
        .map(Duration::from_secs_f64);

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    if !json {
        let config = pacer.config();
        println!("Pacing workload");
        println!("  Load:      {}", pacer.compute_load());
        println!(
            "  Rate:      {} Hz ({} Hz in power-save)",
            config.normal_rate_hz, config.power_save_rate_hz
        );
        println!("  Power:     {}", pacer.power_signal_name());
        match max_duration {
            Some(d) => println!("  Duration:  {:.1}s", d.as_secs_f64()),
            None => println!("  Duration:  until Ctrl+C"),
        }
        println!();
        println!("{}", super::format_header());
    }

    let mut sub = pacer.subscribe();
    if let Err(e) = pacer.start() {
        eprintln!("Error starting pacer: {e}");
        std::process::exit(1);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let start = Instant::now();
    let mut last_frame = 0;

    while running.load(Ordering::SeqCst) {
        if let Some(max) = max_duration
            && start.elapsed() >= max
        {
            break;
        }

        if sub.has_changed() {
            let snap = sub.latest();
            // Flag-only updates (run start, power-save flips) carry no new frame.
            if snap.frame_counter != last_frame {
                last_frame = snap.frame_counter;
                let line = if json {
                    serde_json::to_string(&snap).unwrap_or_default()
                } else {
                    super::format_row(&snap)
                };
                if writeln!(out, "{line}").is_err() {
                    break; // Broken pipe
                }
            }
        }

        std::thread::sleep(POLL_INTERVAL);
    }

    pacer.stop();

    if !json {
        let snap = pacer.snapshot();
        println!();
        println!(
            "{} frames  avg {:.2} ms  jank {:.1}% ({} frames)",
            snap.frame_counter,
            snap.average_latency_ms,
            snap.jank_percentage,
            snap.jank_frame_count
        );
    }
}
