use serde::Serialize;

use telemetrylab_core::{PacerConfig, PowerSaveSignal, SystemPowerSignal};

#[derive(Serialize)]
struct PowerReading {
    signal: &'static str,
    supported: bool,
    power_save_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    rate_hz: u32,
}

pub fn run(json: bool) {
    let signal = SystemPowerSignal::new();
    let config = PacerConfig::default();

    let (supported, active, error) = match signal.is_power_save_active() {
        Ok(active) => (true, active, None),
        Err(e) => (false, false, Some(e.to_string())),
    };
    let reading = PowerReading {
        signal: signal.name(),
        supported,
        power_save_active: active,
        error,
        rate_hz: if active {
            config.power_save_rate_hz
        } else {
            config.normal_rate_hz
        },
    };

    if json {
        match serde_json::to_string_pretty(&reading) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Error serializing reading: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("Power-save signal: {}", reading.signal);
    match &reading.error {
        Some(e) => {
            println!("  Status:    unavailable ({e})");
            println!("  Treated as power-save OFF; use --power-save on|off to override.");
        }
        None => println!(
            "  Status:    power-save {}",
            if reading.power_save_active { "ON" } else { "off" }
        ),
    }
    println!("  Cadence:   {} Hz", reading.rate_hz);
}
