//! Platform collaborators injected into the frame pacer.
//!
//! Two seams, both best-effort:
//! - [`PowerSaveSignal`] answers "should we back off?" once per cycle. Errors
//!   and missing platform support read as "no".
//! - [`BackgroundKeeper`] brackets a run so the host keeps the loop alive
//!   while it is not in focus. Failures are logged and ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workload::ComputeLoad;

/// Battery charge (percent) at or below which a discharging battery counts as
/// power-save. Matches the usual battery-saver auto trigger.
pub const BATTERY_SAVER_CAPACITY: f64 = 15.0;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Source of the host's power-saving state.
pub trait PowerSaveSignal: Send + Sync {
    /// Whether the host currently asks for reduced resource use.
    fn is_power_save_active(&self) -> io::Result<bool>;

    /// Short label for logs and the CLI.
    fn name(&self) -> &'static str;
}

/// Keeps the host from suspending the loop while a run is active.
pub trait BackgroundKeeper: Send + Sync {
    /// Called when a run starts, with the load it starts at.
    fn engage(&self, intensity_hint: ComputeLoad) -> io::Result<()>;

    /// Called when the run stops.
    fn release(&self) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// Power-save signals
// ---------------------------------------------------------------------------

/// Power-save state set by hand. Used as the test double and for `--power-save on|off`.
#[derive(Debug, Default)]
pub struct ManualPowerSignal {
    active: AtomicBool,
}

impl ManualPowerSignal {
    pub fn new(active: bool) -> Self {
        Self {
            active: AtomicBool::new(active),
        }
    }

    pub fn set(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    /// Flip the state, returning the new value.
    pub fn toggle(&self) -> bool {
        !self.active.fetch_xor(true, Ordering::Relaxed)
    }
}

impl PowerSaveSignal for ManualPowerSignal {
    fn is_power_save_active(&self) -> io::Result<bool> {
        Ok(self.active.load(Ordering::Relaxed))
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

/// Power-save state read from sysfs.
///
/// Active when the ACPI platform profile is `low-power`, or when any battery
/// is discharging at or below [`BATTERY_SAVER_CAPACITY`]. Hosts exposing
/// neither file report [`io::ErrorKind::Unsupported`].
#[derive(Debug, Clone)]
pub struct SystemPowerSignal {
    platform_profile: PathBuf,
    power_supply_root: PathBuf,
    saver_capacity: f64,
}

impl SystemPowerSignal {
    pub fn new() -> Self {
        Self::with_paths("/sys/firmware/acpi/platform_profile", "/sys/class/power_supply")
    }

    /// Read from alternative locations (tests, containers with remapped sysfs).
    pub fn with_paths(
        platform_profile: impl Into<PathBuf>,
        power_supply_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            platform_profile: platform_profile.into(),
            power_supply_root: power_supply_root.into(),
            saver_capacity: BATTERY_SAVER_CAPACITY,
        }
    }

    pub fn with_saver_capacity(mut self, percent: f64) -> Self {
        self.saver_capacity = percent;
        self
    }

    fn low_power_profile(&self) -> Option<bool> {
        read_trimmed(&self.platform_profile).map(|p| p.eq_ignore_ascii_case("low-power"))
    }

    fn battery_saver(&self) -> io::Result<bool> {
        for entry in fs::read_dir(&self.power_supply_root)?.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let is_battery = read_trimmed(&dir.join("type"))
                .is_some_and(|t| t.eq_ignore_ascii_case("battery"));
            if !is_battery {
                continue;
            }
            let discharging = read_trimmed(&dir.join("status"))
                .is_some_and(|s| s.eq_ignore_ascii_case("discharging"));
            let low = read_first_f64(&dir.join("capacity"))
                .is_some_and(|c| c <= self.saver_capacity);
            if discharging && low {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Default for SystemPowerSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerSaveSignal for SystemPowerSignal {
    fn is_power_save_active(&self) -> io::Result<bool> {
        let profile = self.low_power_profile();
        if profile == Some(true) {
            return Ok(true);
        }
        match self.battery_saver() {
            Ok(active) => Ok(active),
            Err(_) if profile.is_some() => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "no platform_profile or power_supply information on this host",
            )),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "sysfs"
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let v = raw.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

fn read_first_f64(path: &Path) -> Option<f64> {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.split_whitespace().next().and_then(|v| v.parse().ok()))
}

// ---------------------------------------------------------------------------
// Background keepers
// ---------------------------------------------------------------------------

/// Keeper that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopKeeper;

impl BackgroundKeeper for NoopKeeper {
    fn engage(&self, _intensity_hint: ComputeLoad) -> io::Result<()> {
        Ok(())
    }

    fn release(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Contents of the status file written by [`StatusFileKeeper`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeeperStatus {
    pub id: String,
    pub pid: u32,
    pub started_unix_ms: u64,
    pub compute_load: ComputeLoad,
    pub message: String,
    pub telemetrylab_version: String,
}

/// Advertises a running measurement by keeping a JSON status file on disk
/// for its duration, so shells, status bars and supervisors can see it.
#[derive(Debug)]
pub struct StatusFileKeeper {
    path: PathBuf,
    engaged: Mutex<Option<String>>,
}

impl StatusFileKeeper {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            engaged: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Id of the current run's status file, if engaged.
    pub fn engaged_id(&self) -> Option<String> {
        self.engaged.lock().ok().and_then(|g| g.clone())
    }
}

impl BackgroundKeeper for StatusFileKeeper {
    fn engage(&self, intensity_hint: ComputeLoad) -> io::Result<()> {
        let status = KeeperStatus {
            id: Uuid::new_v4().to_string(),
            pid: std::process::id(),
            started_unix_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            compute_load: intensity_hint,
            message: "Computing telemetry data...".to_string(),
            telemetrylab_version: crate::VERSION.to_string(),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&status).map_err(io::Error::other)?;
        fs::write(&self.path, json)?;

        if let Ok(mut engaged) = self.engaged.lock() {
            *engaged = Some(status.id);
        }
        Ok(())
    }

    fn release(&self) -> io::Result<()> {
        if let Ok(mut engaged) = self.engaged.lock() {
            *engaged = None;
        }
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn battery(root: &Path, name: &str, status: &str, capacity: u32) {
        let dir = root.join(name);
        write(&dir.join("type"), "Battery\n");
        write(&dir.join("status"), &format!("{status}\n"));
        write(&dir.join("capacity"), &format!("{capacity}\n"));
    }

    // -----------------------------------------------------------------------
    // ManualPowerSignal
    // -----------------------------------------------------------------------

    #[test]
    fn test_manual_signal_fixed_value() {
        assert!(ManualPowerSignal::new(true).is_power_save_active().unwrap());
        assert!(!ManualPowerSignal::new(false).is_power_save_active().unwrap());
    }

    #[test]
    fn test_manual_signal_toggle() {
        let s = ManualPowerSignal::default();
        assert!(s.toggle());
        assert!(s.is_power_save_active().unwrap());
        assert!(!s.toggle());
        s.set(true);
        assert!(s.is_power_save_active().unwrap());
    }

    // -----------------------------------------------------------------------
    // SystemPowerSignal
    // -----------------------------------------------------------------------

    #[test]
    fn test_system_signal_low_power_profile() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = tmp.path().join("platform_profile");
        write(&profile, "low-power\n");
        let s = SystemPowerSignal::with_paths(&profile, tmp.path().join("missing"));
        assert!(s.is_power_save_active().unwrap());
    }

    #[test]
    fn test_system_signal_balanced_profile_no_battery() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = tmp.path().join("platform_profile");
        write(&profile, "balanced\n");
        let s = SystemPowerSignal::with_paths(&profile, tmp.path().join("missing"));
        assert!(!s.is_power_save_active().unwrap());
    }

    #[test]
    fn test_system_signal_low_discharging_battery() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("power_supply");
        battery(&root, "BAT0", "Discharging", 12);
        let s = SystemPowerSignal::with_paths(tmp.path().join("none"), &root);
        assert!(s.is_power_save_active().unwrap());
    }

    #[test]
    fn test_system_signal_charging_battery_not_saver() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("power_supply");
        battery(&root, "BAT0", "Charging", 5);
        battery(&root, "BAT1", "Discharging", 80);
        write(&root.join("AC").join("type"), "Mains\n");
        let s = SystemPowerSignal::with_paths(tmp.path().join("none"), &root);
        assert!(!s.is_power_save_active().unwrap());
    }

    #[test]
    fn test_system_signal_custom_capacity() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("power_supply");
        battery(&root, "BAT0", "Discharging", 30);
        let s = SystemPowerSignal::with_paths(tmp.path().join("none"), &root)
            .with_saver_capacity(35.0);
        assert!(s.is_power_save_active().unwrap());
    }

    #[test]
    fn test_system_signal_unsupported_host() {
        let tmp = tempfile::tempdir().unwrap();
        let s = SystemPowerSignal::with_paths(tmp.path().join("a"), tmp.path().join("b"));
        let err = s.is_power_save_active().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    // -----------------------------------------------------------------------
    // Keepers
    // -----------------------------------------------------------------------

    #[test]
    fn test_noop_keeper() {
        let k = NoopKeeper;
        k.engage(ComputeLoad::default()).unwrap();
        k.release().unwrap();
    }

    #[test]
    fn test_status_file_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run").join("telemetrylab.json");
        let k = StatusFileKeeper::new(&path);

        k.engage(ComputeLoad::new(4)).unwrap();
        assert!(path.exists());
        let status: KeeperStatus =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(status.compute_load.get(), 4);
        assert_eq!(status.pid, std::process::id());
        assert_eq!(Some(status.id), k.engaged_id());

        k.release().unwrap();
        assert!(!path.exists());
        assert!(k.engaged_id().is_none());
    }

    #[test]
    fn test_status_file_release_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let k = StatusFileKeeper::new(tmp.path().join("status.json"));
        k.release().unwrap();
        k.release().unwrap();
    }

    #[test]
    fn test_status_file_engage_fails_on_bad_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let k = StatusFileKeeper::new(blocker.join("status.json"));
        assert!(k.engage(ComputeLoad::default()).is_err());
    }
}
