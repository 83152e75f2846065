//! Error taxonomy for the daemon.
//!
//! Only two kinds of failure are distinguished, matching the error handling
//! design: configuration errors are fatal at startup, everything else is
//! transient and handled by the caller as "log and skip" using plain
//! [`std::io::Result`].

use std::path::PathBuf;

/// Fatal startup configuration failure.
///
/// Transient I/O (sysfs reads/writes, netlink receives) never produces this
/// type — callers that can only fail transiently return `std::io::Result`
/// directly and log-and-skip on `Err`.
#[derive(Debug, thiserror::Error)]
pub enum VoltCapError {
    #[error("no thermal zone under {base} reports type {wanted:?}")]
    ThermalZoneNotFound { base: PathBuf, wanted: &'static str },

    #[error("burn table at {path} is invalid: {reason}")]
    InvalidBurnTable { path: PathBuf, reason: String },

    #[error("io error loading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
