//! Process-wide `tracing` setup and the runtime log-level control.
//!
//! The subscriber is a `Registry` with three layers:
//!
//! ```text
//! Registry
//!  └─ reload::Layer<EnvFilter>   -- swapped by TracingLogSink::set_level
//!      ├─ fmt (stdout)           -- when -v is given or no log file is set
//!      └─ fmt (log file, no ANSI) -- when -logfile= is given
//! ```
//!
//! [`TracingLogSink`] is the [`LogSink`] handed to the configuration store
//! and the lifecycle controller.  Changing its level rebuilds the filter in
//! place; closing it flushes the log file and detaches it so later events go
//! nowhere instead of to a half-closed file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use pager_core::{LogLevel, LogSink};
use thiserror::Error;
use tracing::{warn, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LogInitError {
    #[error("cannot open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Where log output goes and how verbose it starts out.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Append log lines to this file.
    pub logfile: Option<PathBuf>,
    /// Also print to stdout even when a log file is set.
    pub verbose: bool,
    /// Initial verbosity; the configuration file may change it later.
    pub level: LogLevel,
}

impl LogOptions {
    /// Console output is on when asked for or when there is nowhere else to log.
    pub fn console_enabled(&self) -> bool {
        self.verbose || self.logfile.is_none()
    }
}

/// Log file shared between the fmt layer and the sink that closes it.
#[derive(Debug, Clone)]
struct SharedLogFile(Arc<Mutex<Option<File>>>);

impl SharedLogFile {
    fn new(file: File) -> Self {
        Self(Arc::new(Mutex::new(Some(file))))
    }

    /// Flushes and drops the file.  Returns `false` if it was already closed.
    fn close(&self) -> bool {
        let taken = self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
        match taken {
            Some(mut file) => {
                let _ = file.flush();
                true
            }
            None => false,
        }
    }
}

impl Write for SharedLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
            Some(file) => file.write(buf),
            // Closed: swallow silently.
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.0.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SharedLogFile {
    type Writer = SharedLogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// [`LogSink`] backed by the `tracing` subscriber built in this module.
pub struct TracingLogSink {
    level: AtomicU8,
    filter: reload::Handle<EnvFilter, Registry>,
    file: Option<SharedLogFile>,
    closed: AtomicBool,
}

impl TracingLogSink {
    /// Returns `true` once [`LogSink::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl LogSink for TracingLogSink {
    fn set_level(&self, level: LogLevel) {
        self.level.store(level.as_number(), Ordering::Release);
        if let Err(e) = self.filter.reload(EnvFilter::new(level.filter_directive())) {
            warn!("could not change log level to {level}: {e}");
        }
    }

    fn level(&self) -> LogLevel {
        LogLevel::from_number(i64::from(self.level.load(Ordering::Acquire))).unwrap_or_default()
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(file) = &self.file {
            file.close();
        }
        let _ = io::stdout().flush();
    }
}

/// Builds the subscriber and its control sink without installing anything.
///
/// # Errors
///
/// Returns [`LogInitError::OpenFile`] if the log file cannot be opened for
/// appending.
pub fn build(
    opts: &LogOptions,
) -> Result<(Arc<TracingLogSink>, impl Subscriber + Send + Sync), LogInitError> {
    let file = match &opts.logfile {
        Some(path) => {
            let handle = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LogInitError::OpenFile {
                    path: path.clone(),
                    source,
                })?;
            Some(SharedLogFile::new(handle))
        }
        None => None,
    };

    let (filter, handle) = reload::Layer::new(EnvFilter::new(opts.level.filter_directive()));

    let console = opts.console_enabled().then(fmt::layer);
    let file_layer = file
        .clone()
        .map(|writer| fmt::layer().with_ansi(false).with_writer(writer));

    let subscriber = Registry::default()
        .with(filter)
        .with(console)
        .with(file_layer);

    let sink = Arc::new(TracingLogSink {
        level: AtomicU8::new(opts.level.as_number()),
        filter: handle,
        file,
        closed: AtomicBool::new(false),
    });

    Ok((sink, subscriber))
}

/// Builds the subscriber and installs it as the global default.
///
/// # Errors
///
/// Returns [`LogInitError`] if the log file cannot be opened or a global
/// subscriber is already installed.
pub fn init(opts: &LogOptions) -> Result<Arc<TracingLogSink>, LogInitError> {
    let (sink, subscriber) = build(opts)?;
    subscriber.try_init()?;
    Ok(sink)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
