//! Device condition sampling from the host OS.
//!
//! Linux exposes everything through `/sys` and `/proc`. Missing files are
//! read as "no information" and map to the most permissive answer, so a
//! desktop without a battery counts as charging with a healthy battery.

use std::fs;
use std::path::{Path, PathBuf};

use autocron_protocols::{ConditionProbe, DeviceConditions, NetworkState};
use tracing::{debug, trace};

/// Interface name prefixes of cellular modems.
const CELLULAR_PREFIXES: &[&str] = &["rmnet", "wwan", "ccmni", "ppp", "usb"];

/// Thresholds and roots used by [`SystemProbe`].
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub battery_low_percent: u8,
    pub storage_low_percent: u8,
    pub idle_load_threshold: f64,
    pub storage_path: PathBuf,
    pub sysfs_root: PathBuf,
    pub proc_root: PathBuf,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            battery_low_percent: 15,
            storage_low_percent: 10,
            idle_load_threshold: 0.5,
            storage_path: PathBuf::from("/"),
            sysfs_root: PathBuf::from("/sys"),
            proc_root: PathBuf::from("/proc"),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct PowerState {
    capacity: Option<u8>,
    charging: bool,
}

/// [`ConditionProbe`] reading live host state.
pub struct SystemProbe {
    settings: ProbeSettings,
}

impl SystemProbe {
    pub fn new(settings: ProbeSettings) -> Self {
        Self { settings }
    }

    fn power(&self) -> PowerState {
        let root = self.settings.sysfs_root.join("class/power_supply");
        let Ok(entries) = fs::read_dir(&root) else {
            return PowerState { capacity: None, charging: true };
        };

        let mut has_battery = false;
        let mut state = PowerState::default();
        for entry in entries.flatten() {
            let dir = entry.path();
            match read_trimmed(&dir.join("type")).as_deref() {
                Some("Battery") => {
                    has_battery = true;
                    if let Some(capacity) =
                        read_trimmed(&dir.join("capacity")).and_then(|c| c.parse().ok())
                    {
                        state.capacity = Some(state.capacity.map_or(capacity, |c: u8| c.min(capacity)));
                    }
                    if matches!(read_trimmed(&dir.join("status")).as_deref(), Some("Charging" | "Full")) {
                        state.charging = true;
                    }
                }
                Some("Mains" | "USB") => {
                    if read_trimmed(&dir.join("online")).as_deref() == Some("1") {
                        state.charging = true;
                    }
                }
                _ => {}
            }
        }
        if !has_battery {
            state.charging = true;
        }
        state
    }

    fn network(&self) -> NetworkState {
        let root = self.settings.sysfs_root.join("class/net");
        let Ok(entries) = fs::read_dir(&root) else {
            return NetworkState::default();
        };

        let mut connected = false;
        let mut unmetered = false;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == "lo" {
                continue;
            }
            if read_trimmed(&entry.path().join("operstate")).as_deref() != Some("up") {
                continue;
            }
            connected = true;
            if !is_cellular(&name) {
                unmetered = true;
            }
            trace!(interface = %name, "Interface up");
        }
        NetworkState { connected, metered: connected && !unmetered, roaming: false }
    }

    fn idle(&self) -> bool {
        read_trimmed(&self.settings.proc_root.join("loadavg"))
            .and_then(|s| parse_load(&s))
            .is_none_or(|load| load < self.settings.idle_load_threshold)
    }

    fn storage_low(&self) -> bool {
        match free_percent(&self.settings.storage_path) {
            Some(free) => free < f64::from(self.settings.storage_low_percent),
            None => false,
        }
    }
}

impl ConditionProbe for SystemProbe {
    fn sample(&self) -> DeviceConditions {
        let power = self.power();
        let conditions = DeviceConditions {
            network: self.network(),
            battery_low: power
                .capacity
                .is_some_and(|c| c <= self.settings.battery_low_percent && !power.charging),
            charging: power.charging,
            idle: self.idle(),
            storage_low: self.storage_low(),
        };
        debug!(?conditions, "Sampled device conditions");
        conditions
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn is_cellular(interface: &str) -> bool {
    CELLULAR_PREFIXES.iter().any(|prefix| interface.starts_with(prefix))
}

/// One-minute load average from the contents of `/proc/loadavg`.
fn parse_load(loadavg: &str) -> Option<f64> {
    loadavg.split_whitespace().next()?.parse().ok()
}

#[cfg(unix)]
fn free_percent(path: &Path) -> Option<f64> {
    let stat = nix::sys::statvfs::statvfs(path).ok()?;
    let total = stat.blocks() as f64;
    if total == 0.0 {
        return None;
    }
    Some(stat.blocks_available() as f64 / total * 100.0)
}

#[cfg(not(unix))]
fn free_percent(_path: &Path) -> Option<f64> {
    None
}
