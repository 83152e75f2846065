//! Telemetry Reader — rail-stats parsing and thermal netlink subscription.
//!
//! Both ingestion paths are blocking and decode-only: neither interprets
//! the data semantically, they only turn bytes into [`RailSnapshot`]s and
//! [`ThermalEvent`]s for the accounting core to act on.

pub mod rail;
pub mod thermal;

pub use rail::{read_rail_snapshot, RailSnapshot};
pub use thermal::{discover_thermal_zone, ThermalEvent, ThermalSocket};
