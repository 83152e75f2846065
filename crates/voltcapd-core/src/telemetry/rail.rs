//! Rail-stats sysfs parsing.
//!
//! Format (see `/sys/power/tegra_rail_stats`):
//!
//! ```text
//! millivolts   time
//! vdd_cpu (bin: 900.0mV)
//! 900 1000
//! 1200 2000
//! vdd_core (bin: ...)
//! ...
//! ```
//!
//! The header line and the `vdd_cpu (bin: ...)` label line are skipped;
//! `(mV, time_10ms)` pairs are read until a token fails to parse as an
//! integer, which marks the start of the next rail's section.

use std::io;
use std::path::Path;

/// One cumulative-time-per-voltage-bin reading, as reported by the kernel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RailSnapshot {
    pub readings: Vec<(i32, u64)>,
}

/// Read and parse the rail-stats file at `path`.
///
/// On any I/O or format error this logs and returns an empty snapshot
/// rather than propagating — a malformed or momentarily-absent sysfs file
/// must never stall or crash the accounting loop.
pub fn read_rail_snapshot(path: &Path) -> RailSnapshot {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_rail_stats(&text),
        Err(e) => {
            log::warn!("rail stats read failed at {}: {e}", path.display());
            RailSnapshot::default()
        }
    }
}

/// Pure parser, split out from the I/O for testability.
pub fn parse_rail_stats(text: &str) -> RailSnapshot {
    let mut tokens = text.split_whitespace();

    // Header: "millivolts" "time"
    tokens.next();
    tokens.next();
    // Rail label: "vdd_cpu" "(bin:" "900.0mV)"
    tokens.next();
    tokens.next();
    tokens.next();

    let mut readings = Vec::new();
    loop {
        let Some(mv_tok) = tokens.next() else {
            break;
        };
        let Ok(mv) = mv_tok.parse::<i32>() else {
            break;
        };
        let Some(time_tok) = tokens.next() else {
            break;
        };
        let Ok(time_10ms) = time_tok.parse::<u64>() else {
            break;
        };
        readings.push((mv, time_10ms));
    }

    RailSnapshot { readings }
}

/// Parse a standalone `(mV, time_10ms)` pair list with no header/label
/// preamble — exposed for tests and for callers that already split the
/// rail section out of a multi-rail file.
#[allow(dead_code)]
pub(crate) fn parse_pairs_only(text: &str) -> io::Result<Vec<(i32, u64)>> {
    let mut tokens = text.split_whitespace();
    let mut out = Vec::new();
    loop {
        let Some(mv_tok) = tokens.next() else {
            break;
        };
        let mv: i32 = mv_tok
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad mV token"))?;
        let time_tok = tokens
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "missing time token"))?;
        let time: u64 = time_tok
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad time token"))?;
        out.push((mv, time));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_sysfs_format() {
        let text = "millivolts   time\nvdd_cpu (bin: 900.0mV)\n900 1000\n1200 2000\nvdd_core (bin: 800.0mV)\n800 500\n";
        let snap = parse_rail_stats(text);
        assert_eq!(snap.readings, vec![(900, 1000), (1200, 2000)]);
    }

    #[test]
    fn empty_text_yields_empty_snapshot() {
        let snap = parse_rail_stats("");
        assert!(snap.readings.is_empty());
    }

    #[test]
    fn truncated_after_header_yields_empty_snapshot() {
        let snap = parse_rail_stats("millivolts   time\nvdd_cpu (bin: 900.0mV)\n");
        assert!(snap.readings.is_empty());
    }

    #[test]
    fn missing_file_yields_empty_snapshot() {
        let snap = read_rail_snapshot(Path::new("/nonexistent/path/to/rail_stats"));
        assert!(snap.readings.is_empty());
    }
}
