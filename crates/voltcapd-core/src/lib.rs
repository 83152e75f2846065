//! Stress-accounting engine for the CPU voltage-rail capping daemon.
//!
//! This crate holds everything that has to be right for the daemon to be
//! correct: the burn-rate model, the accounting state machine, the
//! persistence format, and the capping actuator. The `voltcapd` binary
//! crate is a thin front door that wires these together with a CLI, a
//! logger, and the worker threads.

pub mod accounting;
pub mod capping;
pub mod config;
pub mod debug_log;
pub mod error;
pub mod fifo;
pub mod model;
pub mod persistence;
pub mod supervisor;
pub mod telemetry;

pub use accounting::{AccountingCore, AccountingState, CapState};
pub use capping::{CappingActuator, SysfsCappingActuator, CAP_CEILING_MV};
pub use config::Config;
pub use debug_log::{DebugFlags, DebugLog};
pub use error::VoltCapError;
pub use fifo::{dispatch, FifoReply, RuntimeTunables};
pub use model::{BurnTable, TempBreakpoints};
pub use persistence::{LoadOutcome, PersistedRecord, Store, BOOT_CREDIT};
pub use supervisor::Workers;
pub use telemetry::{discover_thermal_zone, read_rail_snapshot, RailSnapshot, ThermalEvent, ThermalSocket};
