//! Accounting Core — the single source of truth for the points budget.
//!
//! All mutations go through [`AccountingCore`]'s single mutex. Every
//! mutator re-evaluates capping at its tail, inside the same critical
//! section — the one place this system's concurrency contract permits I/O
//! under the lock.

use std::sync::{Arc, Mutex};

use crate::capping::{CappingActuator, CAP_CEILING_MV};
use crate::model::{BurnTable, TempBreakpoints};
use crate::telemetry::{RailSnapshot, ThermalEvent};

/// Balance threshold at or below which capping is engaged.
pub const SAFE_LIMIT: f64 = 100.0;

/// Points credited per day of idle time.
pub const DAILY_POINTS_UPDATE: f64 = 100.0;

/// `{cur_temp_index, last_seen, balance}` — mutated exclusively by
/// [`AccountingCore`]'s methods, each of which holds the core mutex for
/// the whole read-modify-write-and-recap sequence.
#[derive(Debug, Clone)]
pub struct AccountingState {
    pub cur_temp_index: usize,
    pub last_seen: Vec<u64>,
    pub balance: f64,
}

impl AccountingState {
    pub fn new(voltage_bins: usize, initial_balance: f64) -> Self {
        Self {
            cur_temp_index: 0,
            last_seen: vec![0; voltage_bins],
            balance: initial_balance,
        }
    }
}

/// The currently-observable capping state, purely a function of the
/// balance vs. [`SAFE_LIMIT`]. No hysteresis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapState {
    Capped,
    Uncapped,
}

/// Owns the single accounting mutex plus shared references to the
/// (read-only, shared-immutable) model tables and the capping actuator.
///
/// Two independent instances are always constructible — the "singleton"
/// nature described by the data model is a runtime fact of how the daemon
/// is wired up, not a constraint this type enforces.
pub struct AccountingCore {
    state: Mutex<AccountingState>,
    table: Arc<BurnTable>,
    breakpoints: Arc<TempBreakpoints>,
    actuator: Arc<dyn CappingActuator>,
}

impl AccountingCore {
    pub fn new(
        table: Arc<BurnTable>,
        breakpoints: Arc<TempBreakpoints>,
        actuator: Arc<dyn CappingActuator>,
        initial_balance: f64,
    ) -> Self {
        let state = AccountingState::new(table.voltage_bins(), initial_balance);
        Self {
            state: Mutex::new(state),
            table,
            breakpoints,
            actuator,
        }
    }

    pub fn balance(&self) -> f64 {
        self.state.lock().unwrap().balance
    }

    pub fn cap_state(&self) -> CapState {
        if self.balance() <= SAFE_LIMIT {
            CapState::Capped
        } else {
            CapState::Uncapped
        }
    }

    /// Apply a rail snapshot alone (the 5-minute voltage poll path): debit
    /// the balance for every voltage bin's elapsed dwell time at the
    /// current temperature bin.
    pub fn on_rail(&self, snapshot: &RailSnapshot) {
        let mut state = self.state.lock().unwrap();
        self.debit_rail(&mut state, snapshot);
        self.evaluate_cap(&state);
    }

    /// Apply a thermal transition alone.
    pub fn on_thermal(&self, event: ThermalEvent) {
        let mut state = self.state.lock().unwrap();
        self.apply_thermal(&mut state, event);
        self.evaluate_cap(&state);
    }

    /// Apply a rail snapshot and a thermal transition as one atomic update
    /// (the thermal-worker path): the rail debit is posted against the
    /// pre-event temperature bin, then the temperature index advances.
    pub fn on_combined(&self, snapshot: &RailSnapshot, event: ThermalEvent) {
        let mut state = self.state.lock().unwrap();
        self.debit_rail(&mut state, snapshot);
        self.apply_thermal(&mut state, event);
        self.evaluate_cap(&state);
    }

    /// Credit idle time. `credit(a); credit(b)` is equivalent to
    /// `credit(a + b)` since both are plain addition of
    /// `seconds * DAILY_POINTS_UPDATE / 86400`.
    pub fn credit(&self, seconds: f64) {
        let mut state = self.state.lock().unwrap();
        state.balance += seconds * DAILY_POINTS_UPDATE / 86400.0;
        self.evaluate_cap(&state);
    }

    /// Directly overwrite the balance (debug FIFO `write_points`). Bypasses
    /// normal debit/credit accounting — callers are expected to log this
    /// as an operator override.
    pub fn set_balance(&self, balance: f64) {
        let mut state = self.state.lock().unwrap();
        state.balance = balance;
        self.evaluate_cap(&state);
    }

    pub fn snapshot_state(&self) -> AccountingState {
        self.state.lock().unwrap().clone()
    }

    fn debit_rail(&self, state: &mut AccountingState, snapshot: &RailSnapshot) {
        let temp_col = state.cur_temp_index + 1;
        for &(mv, t_now) in &snapshot.readings {
            let Some(v) = self.table.volt_bin(mv) else {
                continue;
            };
            let prev = state.last_seen[v];
            let delta = t_now.saturating_sub(prev);
            state.last_seen[v] = t_now;
            let rate = self.table.rate(v, temp_col) as f64;
            state.balance -= rate * delta as f64 / 100.0;
        }
    }

    fn apply_thermal(&self, state: &mut AccountingState, event: ThermalEvent) {
        let mut i = self.breakpoints.temp_bin(event.temp);
        if !event.is_rise {
            i = i.saturating_sub(1);
        }
        state.cur_temp_index = i;
    }

    fn evaluate_cap(&self, state: &AccountingState) {
        if state.balance <= SAFE_LIMIT {
            self.actuator.apply(true, CAP_CEILING_MV);
        } else {
            self.actuator.apply(false, CAP_CEILING_MV);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capping::mock::MockActuator;

    fn spec_example() -> (Arc<BurnTable>, Arc<TempBreakpoints>) {
        let breakpoints = TempBreakpoints::new(vec![40, 80]).unwrap();
        let cells = vec![900.0, 1.0, 2.0, 1200.0, 4.0, 8.0];
        let table = BurnTable::from_cells(cells, breakpoints.len()).unwrap();
        (Arc::new(table), Arc::new(breakpoints))
    }

    #[test]
    fn s1_baseline_debit() {
        let (table, bp) = spec_example();
        let actuator = Arc::new(MockActuator::default());
        let core = AccountingCore::new(table, bp, actuator.clone(), 500.0);

        core.on_rail(&RailSnapshot {
            readings: vec![(900, 1000), (1200, 2000)],
        });

        assert_eq!(core.balance(), 410.0);
        assert_eq!(
            actuator.calls.lock().unwrap().last(),
            Some(&(false, CAP_CEILING_MV))
        );
    }

    #[test]
    fn s2_cross_into_cap() {
        let (table, bp) = spec_example();
        let actuator = Arc::new(MockActuator::default());
        let core = AccountingCore::new(table, bp, actuator.clone(), 500.0);

        core.on_rail(&RailSnapshot {
            readings: vec![(900, 1000), (1200, 2000)],
        });
        assert_eq!(core.balance(), 410.0);

        core.on_rail(&RailSnapshot {
            readings: vec![(900, 5000), (1200, 6000)],
        });
        assert_eq!(core.balance(), 210.0);
        assert_eq!(core.cap_state(), CapState::Uncapped);

        core.on_rail(&RailSnapshot {
            readings: vec![(900, 8000), (1200, 8000)],
        });
        assert!(core.balance() <= 100.0);
        assert_eq!(core.cap_state(), CapState::Capped);
        let calls = actuator.calls.lock().unwrap();
        assert_eq!(calls.last(), Some(&(true, CAP_CEILING_MV)));
    }

    #[test]
    fn s3_credit_recovery() {
        let (table, bp) = spec_example();
        let actuator = Arc::new(MockActuator::default());
        let core = AccountingCore::new(table, bp, actuator.clone(), 50.0);
        assert_eq!(core.cap_state(), CapState::Capped);

        core.credit(86400.0);
        assert_eq!(core.balance(), 150.0);
        assert_eq!(core.cap_state(), CapState::Uncapped);
        assert_eq!(
            actuator.calls.lock().unwrap().last(),
            Some(&(false, CAP_CEILING_MV))
        );
    }

    #[test]
    fn credit_is_additive() {
        let (table, bp) = spec_example();
        let actuator = Arc::new(MockActuator::default());
        let core_a = AccountingCore::new(table.clone(), bp.clone(), actuator.clone(), 0.0);
        core_a.credit(30.0);
        core_a.credit(70.0);

        let actuator_b = Arc::new(MockActuator::default());
        let core_b = AccountingCore::new(table, bp, actuator_b, 0.0);
        core_b.credit(100.0);

        assert_eq!(core_a.balance(), core_b.balance());
    }

    #[test]
    fn s4_thermal_transition_selects_higher_column() {
        let (table, bp) = spec_example();
        let actuator = Arc::new(MockActuator::default());
        let core = AccountingCore::new(table, bp, actuator, 500.0);

        core.on_thermal(ThermalEvent {
            temp: 85,
            is_rise: true,
        });
        assert_eq!(core.snapshot_state().cur_temp_index, 1);

        core.on_rail(&RailSnapshot {
            readings: vec![(900, 1000)],
        });
        // column 2 (index+1=2) rate is 2.0, not column 1's 1.0.
        assert_eq!(core.balance(), 500.0 - 2.0 * 1000.0 / 100.0);
    }

    #[test]
    fn rail_counter_decrease_is_clamped_not_credited() {
        let (table, bp) = spec_example();
        let actuator = Arc::new(MockActuator::default());
        let core = AccountingCore::new(table, bp, actuator, 500.0);

        core.on_rail(&RailSnapshot {
            readings: vec![(900, 5000)],
        });
        let after_first = core.balance();

        // Counter resets lower (kernel counter reset) — must not
        // produce a spurious credit.
        core.on_rail(&RailSnapshot {
            readings: vec![(900, 100)],
        });
        assert_eq!(core.balance(), after_first);
    }

    #[test]
    fn unknown_voltage_bin_is_skipped() {
        let (table, bp) = spec_example();
        let actuator = Arc::new(MockActuator::default());
        let core = AccountingCore::new(table, bp, actuator, 500.0);

        core.on_rail(&RailSnapshot {
            readings: vec![(1050, 1000)],
        });
        assert_eq!(core.balance(), 500.0);
    }

    #[test]
    fn on_combined_debits_before_advancing_temp_index() {
        let (table, bp) = spec_example();
        let actuator = Arc::new(MockActuator::default());
        let core = AccountingCore::new(table, bp, actuator, 500.0);

        core.on_combined(
            &RailSnapshot {
                readings: vec![(900, 1000)],
            },
            ThermalEvent {
                temp: 85,
                is_rise: true,
            },
        );

        // Debit used column 1 (pre-event temp index 0), not column 2.
        assert_eq!(core.balance(), 500.0 - 1.0 * 1000.0 / 100.0);
        assert_eq!(core.snapshot_state().cur_temp_index, 1);
    }
}
