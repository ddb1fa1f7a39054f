//! Basic pacing example.
//!
//! Starts the pacer at load 3, prints every published snapshot for three
//! seconds, then stops.
//!
//! Run: `cargo run --example basic`

use std::sync::Arc;
use std::time::{Duration, Instant};

use telemetrylab_core::{FramePacer, SystemPowerSignal};

fn main() -> std::io::Result<()> {
    let pacer = FramePacer::new(Arc::new(SystemPowerSignal::new())).with_compute_load(3);
    let mut sub = pacer.subscribe();

    pacer.start()?;
    let deadline = Instant::now() + Duration::from_secs(3);
    let mut last_frame = 0;
    while Instant::now() < deadline {
        let snap = sub.latest();
        if snap.frame_counter != last_frame {
            last_frame = snap.frame_counter;
            println!(
                "frame {:>4}  latency {:>3} ms  avg {:>6.2} ms  jank {:>5.1}%{}",
                snap.frame_counter,
                snap.current_latency_ms,
                snap.average_latency_ms,
                snap.jank_percentage,
                if snap.is_power_save_mode { "  [power-save]" } else { "" }
            );
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    pacer.stop();

    let snap = pacer.snapshot();
    println!(
        "\n{} frames, {} janky, last {} latencies kept",
        snap.frame_counter,
        snap.jank_frame_count,
        snap.latency_history.len()
    );
    Ok(())
}
