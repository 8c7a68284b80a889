//! Pager slave entry point.
//!
//! # What happens at startup
//!
//! 1. The banner is printed and the command line is parsed.  `-version` and
//!    `-help` exit here.
//! 2. `-nogui` without `-configfile` prints guidance and exits with status 1;
//!    a headless node with no configuration would accept traffic from anyone.
//! 3. Logging is installed (console, log file, or both).  Unrecognised
//!    arguments are logged as errors and otherwise ignored.
//! 4. The configuration file is loaded on the blocking pool.  A file with a
//!    bad header is logged and the run continues on defaults.
//! 5. `-loglevel` overrides whatever level the file set.
//! 6. The lifecycle controller starts the server and joins it.  Ctrl-C halts
//!    the server through the controller's halt handle, after which the
//!    controller shuts everything down and the process exits.  A Ctrl-C that
//!    arrives before the server is up is logged and the next one is honoured.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use pager_core::{ConfigStore, LogLevel, LogSink};
use pager_slave::application::{load_config, AppContext, LifecycleController};
use pager_slave::cli::Cli;
use pager_slave::infrastructure::logging::{self, LogOptions};
use pager_slave::infrastructure::observer::{ConsoleObserver, StatusObserver};
use pager_slave::infrastructure::scheduler::LoggingTransmitter;
use pager_slave::VERSION;

fn banner() -> String {
    format!("Pager Slave - Version {VERSION}\nRelay node for paging networks\n")
}

fn parse_log_level(raw: &str) -> anyhow::Result<LogLevel> {
    let n: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("log level {raw:?} is not a number"))?;
    Ok(LogLevel::from_number(n)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    println!("{}", banner());

    // ── Parse CLI arguments ───────────────────────────────────────────────────
    let (cli, rejected) = Cli::parse_normalized(std::env::args());

    if cli.version {
        println!("pager-slave - Version {VERSION}");
        return Ok(ExitCode::SUCCESS);
    }

    if cli.nogui && cli.configfile.is_none() {
        println!(
            "A configuration file is required to run without a front end: -configfile=/foo/bar"
        );
        return Ok(ExitCode::from(1));
    }

    // ── Logging setup ─────────────────────────────────────────────────────────
    let sink = logging::init(&LogOptions {
        logfile: cli.logfile.clone(),
        verbose: cli.verbose,
        level: LogLevel::default(),
    })
    .context("failed to initialise logging")?;
    let log: Arc<dyn LogSink> = sink;

    for arg in &rejected {
        error!("invalid parameter: {arg}");
    }
    if cli.nogui {
        info!("parameter: nogui");
    }
    if let Some(path) = &cli.logfile {
        info!("parameter: logfile {}", path.display());
    }
    if cli.verbose {
        info!("parameter: verbose");
    }

    // ── Configuration ─────────────────────────────────────────────────────────
    let store = load_config(
        ConfigStore::new(Some(Arc::clone(&log))),
        cli.configfile.clone(),
    )
    .await
    .context("configuration loading was interrupted")?;

    if let Some(raw) = cli.loglevel.as_deref() {
        match parse_log_level(raw) {
            Ok(level) => {
                info!("parameter: loglevel {level}");
                log.set_level(level);
            }
            Err(e) => error!("invalid -loglevel: {e:#}"),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────
    let observer: Option<Arc<dyn StatusObserver>> = if cli.nogui {
        None
    } else {
        Some(Arc::new(ConsoleObserver))
    };

    let ctx = AppContext {
        config: Arc::new(std::sync::RwLock::new(store)),
        log: Some(log),
        observer,
        transmitter: Arc::new(LoggingTransmitter),
    };
    let mut controller = LifecycleController::new(ctx);

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let halt = controller.halt_handle();
    tokio::spawn(async move {
        halt.halt_on_signals(tokio::signal::ctrl_c).await;
    });

    controller.start_server(true).await;

    Ok(ExitCode::SUCCESS)
}
