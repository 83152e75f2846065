//! Debug FIFO — a named pipe accepting small text commands, for the same
//! field-debugging role the vendor reference's FIFO commands filled.
//!
//! Commands are single lines: `read_data`, `read_points`,
//! `write_points <f64>`, `write_sleep_time <seconds>`,
//! `write_save_time <seconds>`. Unrecognized lines are logged and ignored.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::accounting::AccountingCore;

/// Runtime-mutable copies of the credit worker's sleep/save intervals.
/// The worker reads these every cycle instead of the static [`Config`]
/// values, so a FIFO write takes effect on the next wakeup without a
/// restart.
///
/// [`Config`]: crate::config::Config
pub struct RuntimeTunables {
    pub update_every_seconds: AtomicU64,
    pub save_every_seconds: AtomicU64,
    /// Signed so a debug command authored as a relative offset can't
    /// underflow; the worker clamps to zero before sleeping.
    pub sleep_override_seconds: AtomicI64,
}

impl RuntimeTunables {
    pub fn new(update_every_seconds: u64, save_every_seconds: u64) -> Self {
        Self {
            update_every_seconds: AtomicU64::new(update_every_seconds),
            save_every_seconds: AtomicU64::new(save_every_seconds),
            sleep_override_seconds: AtomicI64::new(-1),
        }
    }
}

/// Result of dispatching one FIFO line, for the caller to write back to
/// the pipe (or log, for commands with no reply).
#[derive(Debug, Clone, PartialEq)]
pub enum FifoReply {
    Data(String),
    Ack,
    Error(String),
}

/// Parse and apply one FIFO command line against the accounting core and
/// runtime tunables.
pub fn dispatch(line: &str, core: &AccountingCore, tunables: &RuntimeTunables) -> FifoReply {
    let mut parts = line.trim().split_whitespace();
    let Some(cmd) = parts.next() else {
        return FifoReply::Error("empty command".to_string());
    };

    match cmd {
        "read_data" => {
            let state = core.snapshot_state();
            FifoReply::Data(format!(
                "balance={} cur_temp_index={}",
                state.balance, state.cur_temp_index
            ))
        }
        "read_points" => FifoReply::Data(format!("{}", core.balance())),
        "write_points" => match parts.next().and_then(|v| v.parse::<f64>().ok()) {
            Some(points) => {
                core.set_balance(points);
                FifoReply::Ack
            }
            None => FifoReply::Error("write_points requires a numeric argument".to_string()),
        },
        "write_sleep_time" => match parts.next().and_then(|v| v.parse::<u64>().ok()) {
            Some(seconds) => {
                tunables
                    .sleep_override_seconds
                    .store(seconds as i64, Ordering::Relaxed);
                FifoReply::Ack
            }
            None => FifoReply::Error("write_sleep_time requires a non-negative integer".to_string()),
        },
        "write_save_time" => match parts.next().and_then(|v| v.parse::<i64>().ok()) {
            Some(seconds) => {
                let clamped = seconds.max(0) as u64;
                tunables.save_every_seconds.store(clamped, Ordering::Relaxed);
                FifoReply::Ack
            }
            None => FifoReply::Error("write_save_time requires an integer".to_string()),
        },
        other => FifoReply::Error(format!("unrecognized command: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capping::mock::MockActuator;
    use crate::model::{BurnTable, TempBreakpoints};
    use std::sync::Arc;

    fn test_core() -> AccountingCore {
        let breakpoints = TempBreakpoints::new(vec![40, 80]).unwrap();
        let cells = vec![900.0, 1.0, 2.0, 1200.0, 4.0, 8.0];
        let table = BurnTable::from_cells(cells, breakpoints.len()).unwrap();
        AccountingCore::new(
            Arc::new(table),
            Arc::new(breakpoints),
            Arc::new(MockActuator::default()),
            500.0,
        )
    }

    #[test]
    fn read_points_reports_current_balance() {
        let core = test_core();
        let tunables = RuntimeTunables::new(3600, 21600);
        assert_eq!(dispatch("read_points", &core, &tunables), FifoReply::Data("500".to_string()));
    }

    #[test]
    fn write_points_overrides_balance() {
        let core = test_core();
        let tunables = RuntimeTunables::new(3600, 21600);
        assert_eq!(dispatch("write_points 42.5", &core, &tunables), FifoReply::Ack);
        assert_eq!(core.balance(), 42.5);
    }

    #[test]
    fn write_sleep_time_updates_tunable() {
        let core = test_core();
        let tunables = RuntimeTunables::new(3600, 21600);
        assert_eq!(dispatch("write_sleep_time 120", &core, &tunables), FifoReply::Ack);
        assert_eq!(tunables.sleep_override_seconds.load(Ordering::Relaxed), 120);
    }

    #[test]
    fn write_save_time_clamps_negative_to_zero() {
        let core = test_core();
        let tunables = RuntimeTunables::new(3600, 21600);
        assert_eq!(dispatch("write_save_time -5", &core, &tunables), FifoReply::Ack);
        assert_eq!(tunables.save_every_seconds.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn unrecognized_command_is_an_error_reply() {
        let core = test_core();
        let tunables = RuntimeTunables::new(3600, 21600);
        assert!(matches!(dispatch("frobnicate", &core, &tunables), FifoReply::Error(_)));
    }

    #[test]
    fn missing_argument_is_an_error_reply() {
        let core = test_core();
        let tunables = RuntimeTunables::new(3600, 21600);
        assert!(matches!(dispatch("write_points", &core, &tunables), FifoReply::Error(_)));
    }
}
