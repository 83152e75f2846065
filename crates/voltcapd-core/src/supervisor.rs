//! Worker supervision — one OS thread per ingestion/maintenance duty, no
//! async runtime. Mirrors the three-pthread-plus-signal-wait shape of the
//! system this daemon descends from.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};
use signal_hook::iterator::Signals;

use crate::accounting::AccountingCore;
use crate::capping::CappingActuator;
use crate::config::Config;
use crate::debug_log::DebugLog;
use crate::fifo::RuntimeTunables;
use crate::persistence::Store;
use crate::telemetry::{read_rail_snapshot, ThermalSocket};

/// Everything a worker needs, bundled so each `thread::spawn` closure only
/// captures one value.
pub struct Workers {
    pub core: Arc<AccountingCore>,
    pub store: Arc<Store>,
    pub config: Arc<Config>,
    pub tunables: Arc<RuntimeTunables>,
    pub debug_log: Arc<DebugLog>,
}

impl Workers {
    /// Spawn the thermal, voltage-poll, and credit workers. Returns their
    /// join handles; the caller is expected to additionally run
    /// [`wait_for_termination`] on its own thread (typically the main
    /// thread) to drive shutdown.
    pub fn spawn(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        vec![
            self.clone().spawn_thermal_worker(),
            self.clone().spawn_voltage_poll_worker(),
            self.clone().spawn_credit_worker(),
        ]
    }

    fn spawn_thermal_worker(self: Arc<Self>) -> JoinHandle<()> {
        thread::spawn(move || {
            let socket = match ThermalSocket::bind() {
                Ok(s) => s,
                Err(e) => {
                    log::error!("thermal worker: failed to bind netlink socket: {e}");
                    return;
                }
            };
            loop {
                match socket.recv_event() {
                    Ok(event) => {
                        let snapshot = read_rail_snapshot(&self.config.stats_file);
                        self.core.on_combined(&snapshot, event);
                        self.debug_log.log_all(&format!(
                            "thermal event temp={} is_rise={}",
                            event.temp, event.is_rise
                        ));
                    }
                    Err(e) => {
                        log::warn!("thermal worker: recv failed: {e}");
                    }
                }
            }
        })
    }

    fn spawn_voltage_poll_worker(self: Arc<Self>) -> JoinHandle<()> {
        thread::spawn(move || loop {
            thread::sleep(Duration::from_secs(self.config.volt_poll_seconds));
            let snapshot = read_rail_snapshot(&self.config.stats_file);
            self.core.on_rail(&snapshot);
            self.debug_log.log_all("voltage poll applied");
        })
    }

    /// Alternates a short accounting-only cycle with a long
    /// persistence cycle, sleeping in fixed slices so a FIFO-driven
    /// interval change or sleep override takes effect promptly rather
    /// than only after a multi-hour sleep returns.
    fn spawn_credit_worker(self: Arc<Self>) -> JoinHandle<()> {
        thread::spawn(move || {
            const SLICE: Duration = Duration::from_secs(1);
            let mut since_update = Duration::ZERO;
            let mut since_save = Duration::ZERO;
            let mut last_tick = Instant::now();

            loop {
                thread::sleep(SLICE);
                let now = Instant::now();
                let elapsed = now.duration_since(last_tick);
                last_tick = now;
                since_update += elapsed;
                since_save += elapsed;

                let override_secs = self.tunables.sleep_override_seconds.load(Ordering::Relaxed);
                if override_secs >= 0 {
                    self.tunables
                        .sleep_override_seconds
                        .store(-1, Ordering::Relaxed);
                    thread::sleep(Duration::from_secs(override_secs as u64));
                    continue;
                }

                let update_every =
                    Duration::from_secs(self.tunables.update_every_seconds.load(Ordering::Relaxed));
                if since_update >= update_every {
                    self.core.credit(since_update.as_secs_f64());
                    self.debug_log.log_all("credit worker: accrued idle credit");
                    since_update = Duration::ZERO;
                }

                let save_every =
                    Duration::from_secs(self.tunables.save_every_seconds.load(Ordering::Relaxed));
                if since_save >= save_every {
                    if let Err(e) = self.store.save(self.core.balance()) {
                        log::error!("credit worker: periodic save failed: {e}");
                    }
                    since_save = Duration::ZERO;
                }
            }
        })
    }

    /// Block on SIGTERM/SIGINT/SIGUSR1, perform a final save on receipt,
    /// and return. Run this on the thread that should own process
    /// lifetime (typically `main`); worker threads are daemon-style and
    /// are not joined on shutdown.
    pub fn wait_for_termination(&self) -> std::io::Result<()> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGUSR1])?;
        if let Some(sig) = signals.forever().next() {
            log::info!("received signal {sig}, saving and exiting");
            if let Err(e) = self.store.save(self.core.balance()) {
                log::error!("final save failed: {e}");
            }
        }
        Ok(())
    }
}
