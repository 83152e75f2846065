//! Binds the debug FIFO to a real named pipe and drives
//! `voltcapd_core::fifo::dispatch` against each line a client writes to it.
//!
//! Only spawned when `-a` or `-e` is passed — this mirrors the vendor
//! reference's FIFO being a field-debugging tool rather than part of the
//! daemon's always-on surface.

use std::ffi::CString;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use voltcapd_core::{dispatch, AccountingCore, DebugLog, FifoReply, RuntimeTunables};

pub fn spawn(
    path: PathBuf,
    core: Arc<AccountingCore>,
    tunables: Arc<RuntimeTunables>,
    debug_log: Arc<DebugLog>,
) {
    thread::spawn(move || {
        if let Err(e) = ensure_fifo(&path) {
            log::error!("debug FIFO: failed to create {}: {e}", path.display());
            return;
        }
        loop {
            match std::fs::File::open(&path) {
                Ok(file) => {
                    for line in BufReader::new(file).lines() {
                        let Ok(line) = line else { break };
                        if line.trim().is_empty() {
                            continue;
                        }
                        let reply = dispatch(&line, &core, &tunables);
                        log_reply(&debug_log, &line, &reply);
                    }
                }
                Err(e) => {
                    log::warn!("debug FIFO: open {} failed: {e}", path.display());
                }
            }
        }
    });
}

fn log_reply(debug_log: &DebugLog, command: &str, reply: &FifoReply) {
    match reply {
        FifoReply::Data(data) => debug_log.log_event(&format!("fifo {command} -> {data}")),
        FifoReply::Ack => debug_log.log_event(&format!("fifo {command} -> ack")),
        FifoReply::Error(e) => log::warn!("debug FIFO command {command:?} rejected: {e}"),
    }
}

/// Creates the named pipe at `path` if it does not already exist. A plain
/// regular file left over at this path from a prior run is left alone —
/// opening it for read will simply never block, which is a misconfiguration
/// the operator needs to fix, not something this daemon should paper over.
#[cfg(unix)]
fn ensure_fifo(path: &Path) -> std::io::Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let c_path = CString::new(path.as_os_str().to_string_lossy().as_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of
    // this call; 0o644 is a plain permission mode with no aliasing concerns.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_fifo(_path: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "debug FIFO requires a unix platform",
    ))
}
