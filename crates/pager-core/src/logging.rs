//! Log verbosity scale and the log-sink control surface.
//!
//! The configuration file stores the verbosity as a small integer
//! (`loglevel=0`).  [`LogLevel`] is the validated form of that integer and
//! knows how to translate itself into a `tracing` filter directive.
//!
//! Diagnostics themselves are emitted with the ordinary `tracing` macros:
//! the category of a message maps to the macro (`error!`, `info!`) and the
//! minimum verbosity it needs maps to `debug!`/`trace!`.  A [`LogSink`] is the
//! handle through which the active verbosity is changed at runtime and the
//! output is closed on shutdown.

use std::fmt;

use thiserror::Error;
use tracing::Level;

/// Error returned when an integer is outside the valid log level range.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("log level {0} is out of range (expected {min}..={max})", min = LogLevel::MIN, max = LogLevel::MAX)]
pub struct InvalidLogLevel(pub i64);

/// Verbosity of the slave's log output.
///
/// Higher levels let more messages through.  `Normal` is the default and the
/// value every invalid configuration falls back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LogLevel {
    /// Operational messages only (`info` and above).
    #[default]
    Normal = 0,
    /// Adds per-connection and per-message detail (`debug`).
    Verbose = 1,
    /// Everything, including scheduler ticks (`trace`).
    Debug = 2,
}

impl LogLevel {
    /// Smallest integer accepted in the configuration file.
    pub const MIN: i64 = 0;
    /// Largest integer accepted in the configuration file.
    pub const MAX: i64 = 2;

    /// Returns `true` if `n` is a valid log level number.
    pub fn is_valid(n: i64) -> bool {
        (Self::MIN..=Self::MAX).contains(&n)
    }

    /// Converts a configuration-file integer into a level.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidLogLevel`] if `n` fails [`LogLevel::is_valid`].
    pub fn from_number(n: i64) -> Result<Self, InvalidLogLevel> {
        if !Self::is_valid(n) {
            return Err(InvalidLogLevel(n));
        }
        Ok(match n {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        })
    }

    /// The integer written to the configuration file.
    pub fn as_number(self) -> u8 {
        self as u8
    }

    /// The most verbose `tracing` level that passes at this log level.
    pub fn max_tracing_level(self) -> Level {
        match self {
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Debug => Level::TRACE,
        }
    }

    /// Returns `true` if an event at `level` is emitted at this verbosity.
    pub fn allows(self, level: Level) -> bool {
        // `tracing::Level` orders TRACE > DEBUG > INFO > WARN > ERROR.
        level <= self.max_tracing_level()
    }

    /// The `EnvFilter` directive equivalent to this level.
    pub fn filter_directive(self) -> &'static str {
        match self {
            Self::Normal => "info",
            Self::Verbose => "debug",
            Self::Debug => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_number())
    }
}

/// Control surface of the process log output.
///
/// The configuration store pushes level changes here; the lifecycle
/// controller closes it when a headless run shuts down.
pub trait LogSink: Send + Sync {
    /// Changes the active verbosity.
    fn set_level(&self, level: LogLevel);

    /// Returns the active verbosity.
    fn level(&self) -> LogLevel;

    /// Flushes and closes the output.  Subsequent calls are no-ops.
    fn close(&self);
}

/// In-memory log sink that records every call.
///
/// Used by tests in this crate and downstream crates to observe level
/// propagation and shutdown behaviour without installing a subscriber.
pub mod mock {
    use std::sync::Mutex;

    use super::{LogLevel, LogSink};

    /// Records every `set_level` and `close` call.
    #[derive(Debug, Default)]
    pub struct RecordingLogSink {
        /// Every level passed to `set_level`, in call order.
        pub levels: Mutex<Vec<LogLevel>>,
        /// Number of `close` calls.
        pub close_calls: Mutex<u32>,
    }

    impl RecordingLogSink {
        /// Creates an empty recorder.
        pub fn new() -> Self {
            Self::default()
        }

        /// Returns `true` once `close` has been called at least once.
        pub fn is_closed(&self) -> bool {
            *self.close_calls.lock().unwrap() > 0
        }
    }

    impl LogSink for RecordingLogSink {
        fn set_level(&self, level: LogLevel) {
            self.levels.lock().unwrap().push(level);
        }

        fn level(&self) -> LogLevel {
            self.levels.lock().unwrap().last().copied().unwrap_or_default()
        }

        fn close(&self) {
            *self.close_calls.lock().unwrap() += 1;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_accepts_bounded_range_only() {
        assert!(LogLevel::is_valid(0));
        assert!(LogLevel::is_valid(2));
        assert!(!LogLevel::is_valid(-1));
        assert!(!LogLevel::is_valid(3));
    }

    #[test]
    fn test_from_number_rejects_out_of_range() {
        // Arrange / Act
        let result = LogLevel::from_number(99);

        // Assert
        assert_eq!(result, Err(InvalidLogLevel(99)));
    }

    #[test]
    fn test_from_number_agrees_with_is_valid() {
        for n in -3..=5 {
            let parsed = LogLevel::from_number(n);
            assert_eq!(parsed.is_ok(), LogLevel::is_valid(n), "n = {n}");
            if let Ok(level) = parsed {
                assert_eq!(i64::from(level.as_number()), n);
            }
        }
    }

    #[test]
    fn test_default_level_is_normal_zero() {
        assert_eq!(LogLevel::default(), LogLevel::Normal);
        assert_eq!(LogLevel::default().as_number(), 0);
    }

    #[test]
    fn test_normal_level_suppresses_debug_and_trace() {
        let level = LogLevel::Normal;
        assert!(level.allows(Level::ERROR));
        assert!(level.allows(Level::INFO));
        assert!(!level.allows(Level::DEBUG));
        assert!(!level.allows(Level::TRACE));
    }

    #[test]
    fn test_debug_level_allows_everything() {
        assert!(LogLevel::Debug.allows(Level::TRACE));
    }

    #[test]
    fn test_filter_directive_matches_max_tracing_level() {
        for level in [LogLevel::Normal, LogLevel::Verbose, LogLevel::Debug] {
            assert_eq!(
                level.filter_directive(),
                level.max_tracing_level().as_str().to_lowercase()
            );
        }
    }

    #[test]
    fn test_recording_sink_reports_last_level() {
        // Arrange
        let sink = mock::RecordingLogSink::new();

        // Act
        sink.set_level(LogLevel::Verbose);
        sink.set_level(LogLevel::Debug);

        // Assert
        assert_eq!(sink.level(), LogLevel::Debug);
        assert!(!sink.is_closed());
    }
}
