//! Model Tables — the static burn-rate matrix and temperature breakpoints.
//!
//! Read-only after construction. `BurnTable` cells are stored row-major;
//! row `v` has `T + 1` columns where column 0 is the row's voltage label
//! (mV) and columns `1..=T` are burn rates in points per 10 ms for each
//! temperature bin.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VoltCapError;

/// Strictly ascending temperature breakpoints, in whole degrees C.
#[derive(Debug, Clone, PartialEq)]
pub struct TempBreakpoints(Vec<i32>);

impl TempBreakpoints {
    pub fn new(breakpoints: Vec<i32>) -> Result<Self, String> {
        if breakpoints.is_empty() {
            return Err("temperature breakpoints must be non-empty".to_string());
        }
        if !breakpoints.windows(2).all(|w| w[0] < w[1]) {
            return Err("temperature breakpoints must be strictly ascending".to_string());
        }
        Ok(Self(breakpoints))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    /// Smallest index `i` such that `breakpoints[i] >= temp`.
    ///
    /// Out-of-range-high (`temp` exceeds the last breakpoint) returns
    /// `T - 1`. Out-of-range-low is normalized to `0` rather than the
    /// negative sentinel some legacy callers use — a negative index into
    /// the burn table would be a latent fault.
    pub fn temp_bin(&self, temp: i32) -> usize {
        match self.0.iter().position(|&bp| bp >= temp) {
            Some(i) => i,
            None => self.0.len() - 1,
        }
    }
}

/// Read-only voltage/temperature burn-rate matrix.
#[derive(Debug, Clone)]
pub struct BurnTable {
    /// Row-major cells, `(T + 1)` columns per row.
    cells: Vec<f32>,
    voltage_bins: usize,
    temp_bins: usize,
}

/// On-disk representation of a burn table, supplied by an external
/// provider. `rows[v]` is `[label_mV, rate_col_1, ..., rate_col_T]`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BurnTableFile {
    pub temp_breakpoints: Vec<i32>,
    pub rows: Vec<Vec<f32>>,
}

impl BurnTable {
    /// Build directly from row-major cells plus the temperature bin count.
    /// `voltage_bins` is derived as `cells.len() / (temp_bins + 1)`.
    pub fn from_cells(cells: Vec<f32>, temp_bins: usize) -> Result<Self, String> {
        let row_width = temp_bins + 1;
        if row_width == 0 || cells.len() % row_width != 0 {
            return Err(format!(
                "cell count {} is not a multiple of row width {}",
                cells.len(),
                row_width
            ));
        }
        let voltage_bins = cells.len() / row_width;
        if voltage_bins == 0 {
            return Err("burn table has zero voltage bins".to_string());
        }
        Ok(Self {
            cells,
            voltage_bins,
            temp_bins,
        })
    }

    pub fn voltage_bins(&self) -> usize {
        self.voltage_bins
    }

    pub fn temp_bins(&self) -> usize {
        self.temp_bins
    }

    fn row_width(&self) -> usize {
        self.temp_bins + 1
    }

    /// Burn rate (points per 10 ms) at voltage row `v`, table column `col`
    /// (`col` is `temp_index + 1`, i.e. column 0 is the label column and is
    /// never passed here by the accounting core).
    pub fn rate(&self, v: usize, col: usize) -> f32 {
        self.cells[v * self.row_width() + col]
    }

    /// Row `v`'s voltage label (mV), i.e. column 0.
    pub fn label(&self, v: usize) -> f32 {
        self.cells[v * self.row_width()]
    }

    /// Row index whose label column equals `mv`, by exact integral match
    /// (sysfs voltages are already quantized to the table's bins by the
    /// kernel, so labels are compared as rounded integers rather than raw
    /// floats to avoid spurious misses from representation noise).
    pub fn volt_bin(&self, mv: i32) -> Option<usize> {
        (0..self.voltage_bins).find(|&v| self.label(v).round() as i32 == mv)
    }

    pub fn load(path: &Path) -> Result<(Self, TempBreakpoints), VoltCapError> {
        let text = fs::read_to_string(path).map_err(|source| VoltCapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: BurnTableFile =
            serde_json::from_str(&text).map_err(|e| VoltCapError::InvalidBurnTable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::from_file(file).map_err(|reason| VoltCapError::InvalidBurnTable {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn from_file(file: BurnTableFile) -> Result<(Self, TempBreakpoints), String> {
        let breakpoints = TempBreakpoints::new(file.temp_breakpoints)?;
        let row_width = breakpoints.len() + 1;
        let mut cells = Vec::with_capacity(file.rows.len() * row_width);
        for (i, row) in file.rows.iter().enumerate() {
            if row.len() != row_width {
                return Err(format!(
                    "row {i} has {} columns, expected {row_width}",
                    row.len()
                ));
            }
            cells.extend_from_slice(row);
        }
        let table = Self::from_cells(cells, breakpoints.len())?;
        Ok((table, breakpoints))
    }

    /// Compiled-in Tegra hyper-voltaging table, used when no burn table
    /// file is configured. Four voltage bins × three temperature bins,
    /// transcribed from the vendor reference this system's burn-rate model
    /// is descended from.
    pub fn builtin_default() -> (Self, TempBreakpoints) {
        let breakpoints = TempBreakpoints::new(vec![40, 70, 100]).expect("builtin breakpoints");
        #[rustfmt::skip]
        let cells = vec![
            900.0,  0.02,  0.05,  0.12,
            1000.0, 0.05,  0.12,  0.30,
            1100.0, 0.12,  0.30,  0.70,
            1200.0, 0.30,  0.70,  1.60,
        ];
        let table = Self::from_cells(cells, breakpoints.len()).expect("builtin burn table");
        (table, breakpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_example() -> (BurnTable, TempBreakpoints) {
        // T = 2, breakpoints = [40, 80], V = 2 with labels 900 and 1200.
        let breakpoints = TempBreakpoints::new(vec![40, 80]).unwrap();
        let cells = vec![900.0, 1.0, 2.0, 1200.0, 4.0, 8.0];
        let table = BurnTable::from_cells(cells, breakpoints.len()).unwrap();
        (table, breakpoints)
    }

    #[test]
    fn derives_voltage_bins_from_cell_count() {
        let (table, _) = spec_example();
        assert_eq!(table.voltage_bins(), 2);
        assert_eq!(table.temp_bins(), 2);
    }

    #[test]
    fn volt_bin_exact_label_match() {
        let (table, _) = spec_example();
        assert_eq!(table.volt_bin(900), Some(0));
        assert_eq!(table.volt_bin(1200), Some(1));
        assert_eq!(table.volt_bin(1050), None);
    }

    #[test]
    fn rate_lookup_by_row_and_column() {
        let (table, _) = spec_example();
        assert_eq!(table.rate(0, 1), 1.0);
        assert_eq!(table.rate(0, 2), 2.0);
        assert_eq!(table.rate(1, 1), 4.0);
        assert_eq!(table.rate(1, 2), 8.0);
    }

    #[test]
    fn temp_bin_is_monotonic() {
        let (_, bp) = spec_example();
        assert_eq!(bp.temp_bin(-10), 0);
        assert_eq!(bp.temp_bin(0), 0);
        assert_eq!(bp.temp_bin(40), 0);
        assert_eq!(bp.temp_bin(41), 1);
        assert_eq!(bp.temp_bin(80), 1);
        assert_eq!(bp.temp_bin(200), 1);

        let mut prev = bp.temp_bin(-1000);
        for t in -1000..1000 {
            let cur = bp.temp_bin(t);
            assert!(cur >= prev);
            prev = cur;
        }
    }

    #[test]
    fn rejects_non_ascending_breakpoints() {
        assert!(TempBreakpoints::new(vec![80, 40]).is_err());
        assert!(TempBreakpoints::new(vec![40, 40]).is_err());
    }

    #[test]
    fn rejects_malformed_cell_count() {
        assert!(BurnTable::from_cells(vec![1.0, 2.0, 3.0], 2).is_err());
    }

    #[test]
    fn builtin_default_is_well_formed() {
        let (table, breakpoints) = BurnTable::builtin_default();
        assert_eq!(table.temp_bins(), breakpoints.len());
        assert!(table.voltage_bins() > 0);
    }
}
