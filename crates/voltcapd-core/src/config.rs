//! Configuration — fixed kernel control paths plus the handful of
//! operator-tunable intervals, all overridable via `VOLTCAPD_*` env vars
//! for testing and non-Tegra deployments.

use std::path::{Path, PathBuf};

/// Default thermal zone label this daemon watches.
pub const DEFAULT_THERMAL_ZONE_LABEL: &str = "CPU-therm";

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

fn env_u64(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Every path and tunable the daemon needs, assembled once at startup.
/// Fixed paths mirror the vendor reference's hardcoded sysfs layout;
/// each is overridable by an environment variable of the same shape so
/// tests and non-Tegra boards can redirect them.
#[derive(Debug, Clone)]
pub struct Config {
    /// Sysfs file the capping actuator writes the voltage ceiling to.
    pub volt_file: PathBuf,
    /// Sysfs file the capping actuator writes the enable flag to.
    pub capping_enable_file: PathBuf,
    /// Sysfs file the rail-stats poller reads.
    pub stats_file: PathBuf,
    /// Base directory under which `thermal_zone{0..10}` are scanned.
    pub thermal_base: PathBuf,
    /// Label identifying this system's CPU thermal zone.
    pub thermal_zone_label: &'static str,
    /// Persisted accounting state file.
    pub data_file: PathBuf,
    /// Debug event log file (only written when `-a`/`-e` is passed).
    pub log_file: PathBuf,
    /// Debug FIFO control path.
    pub fifo_path: PathBuf,
    /// Optional external burn table JSON file; `None` uses the compiled-in
    /// default.
    pub burn_table_file: Option<PathBuf>,

    /// How often the voltage-poll worker samples the rail, in seconds.
    pub volt_poll_seconds: u64,
    /// How often the credit worker runs its short cycle, in seconds.
    pub update_every_seconds: u64,
    /// How often the credit worker runs its long (persistence) cycle, in
    /// seconds.
    pub save_every_seconds: u64,
}

impl Config {
    /// Fixed defaults matching the vendor reference's hardcoded paths,
    /// each overridable by a `VOLTCAPD_*` environment variable.
    pub fn from_env() -> Self {
        Self {
            volt_file: env_path(
                "VOLTCAPD_VOLT_FILE",
                "/sys/kernel/tegra_cpu_volt_cap/vdd_cpu_vmin",
            ),
            capping_enable_file: env_path(
                "VOLTCAPD_CAPPING_ENABLE_FILE",
                "/sys/kernel/tegra_cpu_volt_cap/vdd_cpu_vmin_cap_enable",
            ),
            stats_file: env_path("VOLTCAPD_STATS_FILE", "/sys/power/tegra_rail_stats"),
            thermal_base: env_path("VOLTCAPD_THERMAL_BASE", "/sys/class/thermal"),
            thermal_zone_label: DEFAULT_THERMAL_ZONE_LABEL,
            data_file: env_path("VOLTCAPD_DATA_FILE", "/data/misc/volt_cap/device_config.txt"),
            log_file: env_path("VOLTCAPD_LOG_FILE", "/data/misc/volt_cap/volt_cap_log.txt"),
            fifo_path: env_path("VOLTCAPD_FIFO_PATH", "/data/misc/volt_cap/volt_cap_fifo"),
            burn_table_file: std::env::var("VOLTCAPD_BURN_TABLE_FILE").ok().map(PathBuf::from),

            volt_poll_seconds: env_u64("VOLTCAPD_VOLT_POLL_SECONDS", 5 * 60),
            update_every_seconds: env_u64("VOLTCAPD_UPDATE_EVERY_SECONDS", 60 * 60),
            save_every_seconds: env_u64("VOLTCAPD_SAVE_EVERY_SECONDS", 6 * 60 * 60),
        }
    }

    /// A config rooted under `dir`, for tests — every path lives inside
    /// the given directory instead of the real filesystem root.
    #[cfg(test)]
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            volt_file: dir.join("vdd_cpu_vmin"),
            capping_enable_file: dir.join("vdd_cpu_vmin_cap_enable"),
            stats_file: dir.join("tegra_rail_stats"),
            thermal_base: dir.join("thermal"),
            thermal_zone_label: DEFAULT_THERMAL_ZONE_LABEL,
            data_file: dir.join("device_config.txt"),
            log_file: dir.join("volt_cap_log.txt"),
            fifo_path: dir.join("volt_cap_fifo"),
            burn_table_file: None,
            volt_poll_seconds: 5 * 60,
            update_every_seconds: 60 * 60,
            save_every_seconds: 6 * 60 * 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooted_config_nests_every_path_under_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::rooted_at(dir.path());
        assert!(cfg.volt_file.starts_with(dir.path()));
        assert!(cfg.data_file.starts_with(dir.path()));
        assert!(cfg.fifo_path.starts_with(dir.path()));
        assert!(cfg.burn_table_file.is_none());
    }
}
