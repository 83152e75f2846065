//! The daemon's own event log — distinct from the ambient `log`/`env_logger`
//! plumbing used elsewhere in this crate. Only written when the daemon is
//! started with `-a` or `-e`; every other module logs through `log::*`
//! regardless of these flags.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Which debug-log modes were requested on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugFlags {
    /// `-a`: log every accounting mutation (debit, credit, thermal
    /// transition).
    pub log_all: bool,
    /// `-e`: log only cap engage/disengage events.
    pub log_events: bool,
}

impl DebugFlags {
    pub fn any(&self) -> bool {
        self.log_all || self.log_events
    }
}

/// Appends timestamped lines to a fixed log file. A no-op when neither
/// debug flag was passed, so callers can unconditionally call
/// `log_all`/`log_event` without checking flags themselves.
pub struct DebugLog {
    path: PathBuf,
    flags: DebugFlags,
    enabled: AtomicBool,
    write_lock: Mutex<()>,
}

impl DebugLog {
    pub fn new(path: impl Into<PathBuf>, flags: DebugFlags) -> Self {
        Self {
            path: path.into(),
            flags,
            enabled: AtomicBool::new(true),
            write_lock: Mutex::new(()),
        }
    }

    /// Debug FIFO `write_debug_enable` toggle: suppresses all writes
    /// without discarding the configured flags.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn log_all(&self, message: &str) {
        if self.flags.log_all {
            self.write_line(message);
        }
    }

    pub fn log_event(&self, message: &str) {
        if self.flags.log_all || self.flags.log_events {
            self.write_line(message);
        }
    }

    fn write_line(&self, message: &str) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "[{}.{:09}] {message}", now.as_secs(), now.subsec_nanos()));
        if let Err(e) = result {
            log::warn!("debug log write to {} failed: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_all_writes_only_when_flag_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volt_cap_log.txt");

        let log = DebugLog::new(&path, DebugFlags { log_all: false, log_events: true });
        log.log_all("debit 10 points");
        assert!(!path.exists());

        log.log_event("cap engaged");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("cap engaged"));
    }

    #[test]
    fn log_all_flag_implies_event_logging() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volt_cap_log.txt");
        let log = DebugLog::new(&path, DebugFlags { log_all: true, log_events: false });

        log.log_all("debit 10 points");
        log.log_event("cap engaged");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn disabling_suppresses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volt_cap_log.txt");
        let log = DebugLog::new(&path, DebugFlags { log_all: true, log_events: false });
        log.set_enabled(false);
        log.log_all("should not appear");
        assert!(!path.exists());
    }
}
