//! voltcapd — supervisor daemon for the CPU voltage-rail stress budget.
//!
//! Thin front door: parses CLI flags, initializes logging, loads the burn
//! table and any persisted balance, discovers the CPU thermal zone, wires
//! up the accounting core and its workers, then blocks until a termination
//! signal arrives. All of the actual accounting logic lives in
//! `voltcapd-core`.

mod fifo_listener;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;

use voltcapd_core::{
    discover_thermal_zone, AccountingCore, BurnTable, Config, DebugFlags, DebugLog,
    RuntimeTunables, Store, SysfsCappingActuator, Workers,
};

/// `-a`/`-e` are the only recognized flags; matches the vendor reference's
/// usage-on-anything-else CLI surface (clap prints usage automatically for
/// unrecognized arguments).
#[derive(Parser, Debug)]
#[command(name = "voltcapd")]
#[command(about = "CPU voltage-rail hyper-voltaging stress supervisor")]
struct Cli {
    /// Log every accounting mutation (debit, credit, thermal transition) to
    /// the debug log file.
    #[arg(short = 'a')]
    log_all: bool,

    /// Log only cap engage/disengage events to the debug log file.
    #[arg(short = 'e')]
    log_events: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Arc::new(Config::from_env());

    let (table, breakpoints) = match load_burn_table(&config) {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("failed to load burn table: {e}");
            return ExitCode::FAILURE;
        }
    };

    let thermal_zone = match discover_thermal_zone(&config.thermal_base, config.thermal_zone_label)
    {
        Ok(zone) => zone,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("watching thermal zone {}", thermal_zone.display());

    let store = Arc::new(Store::new(&config.data_file));
    let outcome = store.load();
    log::info!(
        "loaded persisted state: balance={} should_credit_elapsed={}",
        outcome.balance,
        outcome.should_credit_elapsed
    );

    let actuator = Arc::new(SysfsCappingActuator::new(
        config.volt_file.clone(),
        config.capping_enable_file.clone(),
    ));

    let core = Arc::new(AccountingCore::new(
        Arc::new(table),
        Arc::new(breakpoints),
        actuator,
        outcome.balance,
    ));

    if outcome.should_credit_elapsed {
        let now_sec = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(outcome.saved_time_sec);
        let elapsed = (now_sec - outcome.saved_time_sec).max(0);
        log::info!("crediting {elapsed}s elapsed since last save");
        core.credit(elapsed as f64);
    }

    let flags = DebugFlags {
        log_all: cli.log_all,
        log_events: cli.log_events,
    };
    let debug_log = Arc::new(DebugLog::new(&config.log_file, flags));

    let tunables = Arc::new(RuntimeTunables::new(
        config.update_every_seconds,
        config.save_every_seconds,
    ));

    let workers = Arc::new(Workers {
        core: core.clone(),
        store: store.clone(),
        config: config.clone(),
        tunables: tunables.clone(),
        debug_log: debug_log.clone(),
    });
    let _handles = workers.spawn();

    if flags.any() {
        fifo_listener::spawn(config.fifo_path.clone(), core, tunables, debug_log);
    }

    if let Err(e) = workers.wait_for_termination() {
        log::error!("signal handling failed: {e}");
    }

    ExitCode::SUCCESS
}

fn load_burn_table(config: &Config) -> Result<(BurnTable, voltcapd_core::TempBreakpoints), String> {
    match &config.burn_table_file {
        Some(path) => BurnTable::load(path).map_err(|e| e.to_string()),
        None => {
            log::info!("no burn table file configured, using compiled-in default table");
            Ok(BurnTable::builtin_default())
        }
    }
}
