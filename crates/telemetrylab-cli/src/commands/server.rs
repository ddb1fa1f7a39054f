use std::sync::Arc;

use super::PacerArgs;

pub fn run(args: &PacerArgs, host: &str, port: u16, autostart: bool) {
    let pacer = Arc::new(super::make_pacer(args));

    let base = format!("http://{host}:{port}");

    println!("⏱  Telemetry Lab Server v{}", telemetrylab_core::VERSION);
    println!("   {base}");
    println!(
        "   load {}  {} Hz ({} Hz power-save)  power signal: {}",
        pacer.compute_load(),
        pacer.config().normal_rate_hz,
        pacer.config().power_save_rate_hz,
        pacer.power_signal_name()
    );
    println!();
    println!("   Endpoints:");
    println!("     GET  /                API index (try: curl {base})");
    println!("     GET  /health          Run state");
    println!("     GET  /snapshot        Latest performance snapshot");
    println!("     GET  /snapshot/next   Wait for the next snapshot (timeout_ms=N)");
    println!("     POST /start           Start a run");
    println!("     POST /stop            Stop the run");
    println!("     POST /load            Set compute load (level=1-5)");
    println!();
    println!("   Examples:");
    println!("     curl -X POST {base}/start");
    println!("     curl {base}/snapshot/next?timeout_ms=2000");
    println!("     curl -X POST '{base}/load?level=4'");
    println!();

    if autostart && let Err(e) = pacer.start() {
        eprintln!("Error starting pacer: {e}");
        std::process::exit(1);
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting async runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(telemetrylab_server::run_server(Arc::clone(&pacer), host, port)) {
        eprintln!("Server error: {e}");
        pacer.stop();
        std::process::exit(1);
    }
    pacer.stop();
}
