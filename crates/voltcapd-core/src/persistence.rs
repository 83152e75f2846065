//! Persistence Layer — crash-safe balance storage with CRC-32 integrity
//! checking.
//!
//! `Store` owns its file path and an independent lock so a save can never
//! be interleaved with another save, while still observing a consistent
//! snapshot of the balance taken under the accounting core's own mutex.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Balance assigned when persisted state is absent or corrupt: a 21-day
/// boost credit.
pub const BOOT_CREDIT: f64 = 2100.0;

const RECORD_LEN: usize = 4 + 8 + 8 + 4; // balance(f32) + sec(i64) + nsec(i64) + reserved(u32)
const FILE_LEN: usize = RECORD_LEN + 4; // + crc32(u32)

/// `{balance, saved_time, reserved_device_id}` as written to the data
/// file, immediately followed by a CRC-32 of its bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistedRecord {
    pub balance: f32,
    pub saved_time_sec: i64,
    pub saved_time_nsec: i64,
    /// Declared for wire-format compatibility, never populated.
    pub reserved_device_id: u32,
}

impl PersistedRecord {
    fn to_bytes(self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[0..4].copy_from_slice(&self.balance.to_ne_bytes());
        out[4..12].copy_from_slice(&self.saved_time_sec.to_ne_bytes());
        out[12..20].copy_from_slice(&self.saved_time_nsec.to_ne_bytes());
        out[20..24].copy_from_slice(&self.reserved_device_id.to_ne_bytes());
        out
    }

    fn from_bytes(b: &[u8]) -> Self {
        debug_assert_eq!(b.len(), RECORD_LEN);
        Self {
            balance: f32::from_ne_bytes(b[0..4].try_into().unwrap()),
            saved_time_sec: i64::from_ne_bytes(b[4..12].try_into().unwrap()),
            saved_time_nsec: i64::from_ne_bytes(b[12..20].try_into().unwrap()),
            reserved_device_id: u32::from_ne_bytes(b[20..24].try_into().unwrap()),
        }
    }
}

/// Bit-serial CRC-32 (IEEE polynomial 0xEDB88320, initial value
/// 0xFFFFFFFF, final complement) — the table-less variant the persisted
/// format's integrity check is defined against.
pub fn crc32_bitserial(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = if crc & 1 != 0 { 0xEDB8_8320 } else { 0 };
            crc = (crc >> 1) ^ mask;
        }
    }
    !crc
}

/// Outcome of [`Store::load`]: the balance to seed the accounting core
/// with, and whether elapsed-time credit should additionally be applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOutcome {
    pub balance: f64,
    pub should_credit_elapsed: bool,
    pub saved_time_sec: i64,
}

/// Owns the persisted-state file path and the save critical section.
pub struct Store {
    path: PathBuf,
    save_lock: Mutex<()>,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            save_lock: Mutex::new(()),
        }
    }

    /// Stamp wall-clock time into the record, compute its CRC-32, and
    /// write `record || crc` atomically (write to a sibling temp file,
    /// then rename over the target) so a crash mid-write never leaves a
    /// half-written file behind.
    pub fn save(&self, balance: f64) -> io::Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let record = PersistedRecord {
            balance: balance as f32,
            saved_time_sec: now.as_secs() as i64,
            saved_time_nsec: now.subsec_nanos() as i64,
            reserved_device_id: 0,
        };

        let _guard = self.save_lock.lock().unwrap_or_else(|e| e.into_inner());

        let record_bytes = record.to_bytes();
        let crc = crc32_bitserial(&record_bytes);

        let mut file_bytes = Vec::with_capacity(FILE_LEN);
        file_bytes.extend_from_slice(&record_bytes);
        file_bytes.extend_from_slice(&crc.to_ne_bytes());

        let tmp_path = self.path.with_extension("tmp");
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        {
            let mut tmp = std::fs::File::create(&tmp_path)?;
            tmp.write_all(&file_bytes)?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Validate and load the persisted record.
    ///
    /// - Absent or short file → `(BOOT_CREDIT, false)`.
    /// - CRC mismatch → `(BOOT_CREDIT, false)` (treated as no prior state).
    /// - CRC matches but wall-clock is at or before the saved time (clock
    ///   set backward, or an image update reset it) → `(balance, false)`,
    ///   no elapsed credit.
    /// - CRC matches and wall-clock has advanced → `(balance, true)`; the
    ///   caller computes and applies the elapsed-time credit itself.
    pub fn load(&self) -> LoadOutcome {
        let bytes = match self.read_all() {
            Ok(b) if b.len() >= FILE_LEN => b,
            Ok(_) => {
                log::info!("persisted state file too short, using boot credit");
                return LoadOutcome {
                    balance: BOOT_CREDIT,
                    should_credit_elapsed: false,
                    saved_time_sec: 0,
                };
            }
            Err(e) => {
                log::info!("no persisted state ({e}), using boot credit");
                return LoadOutcome {
                    balance: BOOT_CREDIT,
                    should_credit_elapsed: false,
                    saved_time_sec: 0,
                };
            }
        };

        let record_bytes = &bytes[..RECORD_LEN];
        let stored_crc = u32::from_ne_bytes(bytes[RECORD_LEN..FILE_LEN].try_into().unwrap());
        let calc_crc = crc32_bitserial(record_bytes);
        if calc_crc != stored_crc {
            log::warn!("persisted state CRC mismatch, using boot credit");
            return LoadOutcome {
                balance: BOOT_CREDIT,
                should_credit_elapsed: false,
                saved_time_sec: 0,
            };
        }

        let record = PersistedRecord::from_bytes(record_bytes);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let now_sec = now.as_secs() as i64;

        if now_sec <= record.saved_time_sec {
            log::info!("wall clock at or before saved time, suppressing elapsed credit");
            return LoadOutcome {
                balance: record.balance as f64,
                should_credit_elapsed: false,
                saved_time_sec: record.saved_time_sec,
            };
        }

        LoadOutcome {
            balance: record.balance as f64,
            should_credit_elapsed: true,
            saved_time_sec: record.saved_time_sec,
        }
    }

    fn read_all(&self) -> io::Result<Vec<u8>> {
        let mut file = std::fs::File::open(&self.path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_matches_known_check_value() {
        // The standard CRC-32/ISO-HDLC check value for the ASCII string
        // "123456789".
        assert_eq!(crc32_bitserial(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("device_config.txt"));
        store.save(173.5).unwrap();

        let outcome = store.load();
        assert_eq!(outcome.balance, 173.5);
        assert!(outcome.saved_time_sec > 0);
    }

    #[test]
    fn missing_file_yields_boot_credit() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("does_not_exist.bin"));
        let outcome = store.load();
        assert_eq!(outcome.balance, BOOT_CREDIT);
        assert!(!outcome.should_credit_elapsed);
    }

    #[test]
    fn corrupted_record_yields_boot_credit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device_config.txt");
        let store = Store::new(&path);
        store.save(173.5).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] ^= 0xFF; // flip a bit in the balance field
        std::fs::write(&path, bytes).unwrap();

        let outcome = store.load();
        assert_eq!(outcome.balance, BOOT_CREDIT);
        assert!(!outcome.should_credit_elapsed);
    }

    #[test]
    fn clock_regression_suppresses_elapsed_credit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device_config.txt");
        let store = Store::new(&path);

        // Fabricate a record stamped far in the future so "now" is always
        // at or before it.
        let future = PersistedRecord {
            balance: 200.0,
            saved_time_sec: i64::MAX / 2,
            saved_time_nsec: 0,
            reserved_device_id: 0,
        };
        let record_bytes = future.to_bytes();
        let crc = crc32_bitserial(&record_bytes);
        let mut file_bytes = Vec::new();
        file_bytes.extend_from_slice(&record_bytes);
        file_bytes.extend_from_slice(&crc.to_ne_bytes());
        std::fs::write(&path, &file_bytes).unwrap();

        let outcome = store.load();
        assert_eq!(outcome.balance, 200.0);
        assert!(!outcome.should_credit_elapsed);
    }
}
