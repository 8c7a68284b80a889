//! `ConfigStore`: load, validate, persist, and mutate the slave configuration.
//!
//! # Fallback policy (for beginners)
//!
//! Apart from a missing header line, nothing in a configuration file is
//! fatal.  A value that cannot be parsed is replaced by its built-in default
//! and the replacement is reported as a pair of diagnostics: an `error!`
//! naming the problem and an `info!` naming the value actually used.  A file
//! that cannot be opened at all is treated the same way: the store keeps
//! going on defaults and says so in the log.
//!
//! The header check is the exception.  A file without the exact
//! `#[slave config]` first line is rejected with [`ConfigError::Format`] so a
//! wrong path (for example a log file) is never silently half-applied.  The
//! caller decides whether to fall back to [`ConfigStore::load_default`].

use std::fmt;
use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::allow_list::AllowList;
use super::resolver::{HostResolver, SystemResolver};
use crate::logging::{LogLevel, LogSink};

/// First line every configuration file must carry.
pub const CONFIG_HEADER: &str = "#[slave config]";

/// Prefix of comment lines.
const COMMENT_PREFIX: char = '#';

/// Built-in display name.
pub const DEFAULT_NAME: &str = "[SDRPager v1.2-SCP-#2345678]";

/// Built-in listen port.
pub const DEFAULT_PORT: u16 = 1337;

/// Built-in log level.
pub const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Normal;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file does not start with the configuration header.
    #[error("{path} is not a valid configuration file (missing \"#[slave config]\" header)")]
    Format { path: PathBuf },

    /// The file could not be written.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A port of zero was supplied.
    #[error("port must be non-zero")]
    ZeroPort,
}

/// Validated operational configuration of the slave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Display identifier; not used by the protocol.
    pub name: String,
    /// Listen port of the network server.  Zero only before defaults apply.
    pub port: u16,
    /// Active log verbosity.
    pub log_level: LogLevel,
    /// Masters allowed to submit traffic.
    pub masters: AllowList,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            port: DEFAULT_PORT,
            log_level: DEFAULT_LOG_LEVEL,
            masters: AllowList::unset(),
        }
    }
}

/// Summary used in diagnostics; mirrors the persisted keys.
impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "configuration")?;
        writeln!(f, "port={}", self.port)?;
        writeln!(f, "master={}", self.masters)?;
        write!(f, "loglevel={}", self.log_level)
    }
}

/// Exclusive owner of the process configuration.
///
/// Every mutation goes through a method on this type so that values are
/// always validated and level changes always reach the attached [`LogSink`].
pub struct ConfigStore {
    config: Config,
    log: Option<Arc<dyn LogSink>>,
    resolver: Arc<dyn HostResolver>,
}

impl ConfigStore {
    /// Creates a store that has not loaded anything yet.
    ///
    /// The port starts at zero and the master list is unset; call
    /// [`ConfigStore::load`] or [`ConfigStore::load_default`] next.
    pub fn new(log: Option<Arc<dyn LogSink>>) -> Self {
        Self::with_resolver(log, Arc::new(SystemResolver))
    }

    /// Creates a store that resolves master host names through `resolver`.
    pub fn with_resolver(log: Option<Arc<dyn LogSink>>, resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            config: Config {
                port: 0,
                ..Config::default()
            },
            log,
            resolver,
        }
    }

    /// Attaches a log sink and pushes the current level to it.
    pub fn set_log_sink(&mut self, log: Arc<dyn LogSink>) {
        log.set_level(self.config.log_level);
        self.log = Some(log);
    }

    /// Reads the configuration file at `path`.
    ///
    /// Rules, in order:
    ///
    /// 1. A file that cannot be read is not an error: defaults are applied,
    ///    the master list is left as it was, and `Ok(())` is returned.
    /// 2. The first line (trimmed) must equal [`CONFIG_HEADER`].
    /// 3. Lines starting with `#` are comments; lines without a `=` after at
    ///    least one key character are ignored.  Both are logged.
    /// 4. `name`, `port`, `master` and `loglevel` are applied; other keys
    ///    are ignored.  A key with an empty value is skipped.
    /// 5. Afterwards an empty name or a zero port are replaced by defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Format`] if the header line is missing.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => self.apply_file(path, &content)?,
            Err(e) => {
                error!("{} could not be found/opened: {e}", path.display());
                info!("using default values ...");
                info!("this configuration does not filter masters");
            }
        }

        self.apply_missing_defaults();
        info!("{}", self.config);
        Ok(())
    }

    fn apply_file(&mut self, path: &Path, content: &str) -> Result<(), ConfigError> {
        let mut lines = content.lines();

        if lines.next().map(str::trim) != Some(CONFIG_HEADER) {
            return Err(ConfigError::Format {
                path: path.to_path_buf(),
            });
        }

        for line in lines {
            if line.starts_with(COMMENT_PREFIX) {
                info!("comment: {line}");
                continue;
            }

            let Some((key, value)) = line.split_once('=').filter(|(k, _)| !k.is_empty()) else {
                info!("line ignored (no =): {line}");
                continue;
            };

            let (key, value) = (key.trim(), value.trim());
            match key {
                "name" if !value.is_empty() => self.config.name = value.to_string(),
                "port" if !value.is_empty() => self.apply_port(value),
                "master" if !value.is_empty() => self.set_master(value),
                "master" => info!("no masters given"),
                "loglevel" if !value.is_empty() => self.apply_log_level(value),
                _ => debug!("key ignored: {key}"),
            }
        }

        Ok(())
    }

    fn apply_port(&mut self, value: &str) {
        match value.parse::<u16>() {
            Ok(port) => self.config.port = port,
            Err(_) => {
                self.config.port = DEFAULT_PORT;
                error!("port is not set to a valid value: {value}");
                info!("using default port ({DEFAULT_PORT}) ...");
            }
        }
    }

    fn apply_log_level(&mut self, value: &str) {
        let parsed = value
            .parse::<i64>()
            .ok()
            .and_then(|n| LogLevel::from_number(n).ok());

        let level = match parsed {
            Some(level) => level,
            None => {
                error!("loglevel is not set to a valid value: {value}");
                info!("using default loglevel ({DEFAULT_LOG_LEVEL}) ...");
                DEFAULT_LOG_LEVEL
            }
        };

        self.set_log_level(level);
    }

    fn apply_missing_defaults(&mut self) {
        if self.config.name.is_empty() {
            self.config.name = DEFAULT_NAME.to_string();
            error!("no name given");
            info!("using default name ({DEFAULT_NAME}) ...");
        }

        if self.config.port == 0 {
            self.config.port = DEFAULT_PORT;
            error!("no port given");
            info!("using default port ({DEFAULT_PORT}) ...");
        }
    }

    /// Writes the configuration to `path`.
    ///
    /// The name is not part of the persisted format; only `port`, `master`
    /// and `loglevel` are written.  A master list that was set but is empty
    /// is written as `master=`, which reloads as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if self.config.masters.denies_all() {
            warn!("master list is empty; the saved file will accept every master");
        }
        let content = format!(
            "{CONFIG_HEADER}\n\
             # Port\n\
             port={}\n\
             # Allowed masters separated by spaces\n\
             master={}\n\
             # LogLevel\n\
             loglevel={}\n",
            self.config.port,
            self.master_to_string(),
            self.config.log_level,
        );

        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("configuration saved to {}", path.display());
        Ok(())
    }

    /// Restores name, port and log level to their defaults.
    ///
    /// The master list is reset to unset only when `reset_master` is `true`.
    pub fn load_default(&mut self, reset_master: bool) {
        self.config.name = DEFAULT_NAME.to_string();
        self.config.port = DEFAULT_PORT;
        self.set_log_level(DEFAULT_LOG_LEVEL);

        if reset_master {
            self.config.masters = AllowList::unset();
        }
    }

    /// Replaces the master list with the resolved form of `raw`.
    ///
    /// See [`AllowList::resolve`] for the resolution and dedup rules.
    pub fn set_master(&mut self, raw: &str) {
        self.config.masters = AllowList::resolve(raw, self.resolver.as_ref());
        if self.config.masters.denies_all() {
            warn!("no master could be registered; every master is rejected");
        }
    }

    /// Returns `true` if `ip` may submit paging traffic.
    pub fn is_authorized(&self, ip: IpAddr) -> bool {
        self.config.masters.is_authorized(ip)
    }

    /// Space-joined master addresses; empty when unset or empty.
    pub fn master_to_string(&self) -> String {
        self.config.masters.to_string()
    }

    /// The current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.config.name = name.into();
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Sets the listen port.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroPort`] for port `0`.
    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        self.config.port = port;
        Ok(())
    }

    pub fn log_level(&self) -> LogLevel {
        self.config.log_level
    }

    /// Sets the log level and forwards it to the attached sink.
    pub fn set_log_level(&mut self, level: LogLevel) {
        self.config.log_level = level;
        if let Some(log) = &self.log {
            log.set_level(level);
        }
    }

    /// The master allow-list.
    pub fn masters(&self) -> &AllowList {
        &self.config.masters
    }
}

impl fmt::Display for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.config.fmt(f)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use super::*;
    use crate::config::resolver::{MockHostResolver, ResolveError};
    use crate::logging::mock::RecordingLogSink;

    /// Writes `content` to a fresh file under the system temp directory.
    fn temp_file(content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("slave_cfg_{}.conf", uuid::Uuid::new_v4()));
        fs::write(&path, content).unwrap();
        path
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    // ── load ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_load_rejects_file_without_header() {
        // Arrange: a perfectly good body, but no header line
        let path = temp_file("port=2000\nmaster=10.0.0.1\nloglevel=1\n");
        let mut store = ConfigStore::new(None);

        // Act
        let result = store.load(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Format { .. })));
        assert_eq!(store.port(), 0, "nothing from the body may be applied");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_rejects_empty_file() {
        let path = temp_file("");
        let mut store = ConfigStore::new(None);
        assert!(matches!(store.load(&path), Err(ConfigError::Format { .. })));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_rejects_near_miss_header() {
        let path = temp_file("# [slave config]\nport=2000\n");
        let mut store = ConfigStore::new(None);
        assert!(store.load(&path).is_err());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_accepts_header_with_surrounding_whitespace() {
        let path = temp_file("  #[slave config]\r\nport=4242\r\n");
        let mut store = ConfigStore::new(None);
        store.load(&path).unwrap();
        assert_eq!(store.port(), 4242);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_file_uses_defaults_and_is_permissive() {
        // Arrange
        let path = std::env::temp_dir().join("definitely_missing_slave.conf");
        let mut store = ConfigStore::new(None);

        // Act
        let result = store.load(&path);

        // Assert
        assert!(result.is_ok());
        assert_eq!(store.port(), DEFAULT_PORT);
        assert_eq!(store.log_level().as_number(), 0);
        assert_eq!(store.name(), DEFAULT_NAME);
        assert!(store.is_authorized(ip("203.0.113.9")));
    }

    #[test]
    fn test_load_applies_all_recognised_keys() {
        // Arrange
        let path = temp_file(
            "#[slave config]\n# a comment\nname=Relay North\nport=2001\nmaster=10.0.0.1 10.0.0.2\nloglevel=2\n",
        );
        let mut store = ConfigStore::new(None);

        // Act
        store.load(&path).unwrap();

        // Assert
        assert_eq!(store.name(), "Relay North");
        assert_eq!(store.port(), 2001);
        assert_eq!(store.log_level(), LogLevel::Debug);
        assert_eq!(store.master_to_string(), "10.0.0.1 10.0.0.2");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_skips_malformed_and_unknown_lines() {
        let path = temp_file("#[slave config]\n\njust text\n=5\ncolour=blue\nport=1500\n");
        let mut store = ConfigStore::new(None);

        store.load(&path).unwrap();

        assert_eq!(store.port(), 1500);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_invalid_port_falls_back_to_default() {
        let path = temp_file("#[slave config]\nport=seventy\n");
        let mut store = ConfigStore::new(None);
        store.load(&path).unwrap();
        assert_eq!(store.port(), DEFAULT_PORT);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_port_out_of_u16_range_falls_back_to_default() {
        let path = temp_file("#[slave config]\nport=70000\n");
        let mut store = ConfigStore::new(None);
        store.load(&path).unwrap();
        assert_eq!(store.port(), DEFAULT_PORT);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_zero_port_gets_default_after_scan() {
        let path = temp_file("#[slave config]\nport=0\n");
        let mut store = ConfigStore::new(None);
        store.load(&path).unwrap();
        assert_eq!(store.port(), DEFAULT_PORT);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_out_of_range_loglevel_falls_back_and_reaches_sink() {
        // Arrange
        let path = temp_file("#[slave config]\nloglevel=99\n");
        let sink = Arc::new(RecordingLogSink::new());
        let mut store = ConfigStore::new(Some(sink.clone()));

        // Act
        store.load(&path).unwrap();

        // Assert
        assert_eq!(store.log_level(), DEFAULT_LOG_LEVEL);
        assert_eq!(*sink.levels.lock().unwrap(), vec![LogLevel::Normal]);
        assert!(!sink.level().allows(tracing::Level::DEBUG));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_valid_loglevel_reaches_sink() {
        let path = temp_file("#[slave config]\nloglevel=1\n");
        let sink = Arc::new(RecordingLogSink::new());
        let mut store = ConfigStore::new(Some(sink.clone()));

        store.load(&path).unwrap();

        assert_eq!(sink.level(), LogLevel::Verbose);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_empty_master_value_keeps_list_unset() {
        let path = temp_file("#[slave config]\nmaster=\n");
        let mut store = ConfigStore::new(None);
        store.load(&path).unwrap();
        assert!(store.masters().is_unset());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_uses_injected_resolver_for_hostnames() {
        // Arrange
        let mut resolver = MockHostResolver::new();
        resolver.expect_resolve().returning(|h| match h {
            "master.example" => Ok("192.0.2.10".parse().unwrap()),
            other => Err(ResolveError::UnknownHost(other.to_string())),
        });
        let path = temp_file("#[slave config]\nmaster=master.example nowhere.example\n");
        let mut store = ConfigStore::with_resolver(None, Arc::new(resolver));

        // Act
        store.load(&path).unwrap();

        // Assert
        assert_eq!(store.master_to_string(), "192.0.2.10");
        assert!(store.is_authorized(ip("192.0.2.10")));
        assert!(!store.is_authorized(ip("192.0.2.11")));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_with_only_unresolvable_masters_denies_everyone() {
        // Arrange
        let mut resolver = MockHostResolver::new();
        resolver
            .expect_resolve()
            .returning(|h| Err(ResolveError::UnknownHost(h.to_string())));
        let path = temp_file("#[slave config]\nmaster=bogus.invalid.host another.invalid\n");
        let mut store = ConfigStore::with_resolver(None, Arc::new(resolver));

        // Act
        store.load(&path).unwrap();

        // Assert
        assert!(!store.masters().is_unset());
        assert!(!store.is_authorized(ip("203.0.113.66")));
        fs::remove_file(&path).ok();
    }

    // ── save ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_save_then_load_round_trips_port_masters_and_level() {
        // Arrange
        let path = std::env::temp_dir().join(format!("slave_cfg_{}.conf", uuid::Uuid::new_v4()));
        let mut original = ConfigStore::new(None);
        original.load_default(true);
        original.set_port(4711).unwrap();
        original.set_master("10.0.0.7 10.0.0.8");
        original.set_log_level(LogLevel::Verbose);
        original.set_name("not persisted");

        // Act
        original.save(&path).unwrap();
        let mut restored = ConfigStore::new(None);
        restored.load(&path).unwrap();

        // Assert
        assert_eq!(restored.port(), 4711);
        assert_eq!(restored.masters(), original.masters());
        assert_eq!(restored.log_level(), LogLevel::Verbose);
        assert_eq!(restored.name(), DEFAULT_NAME, "name is not part of the file");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_save_writes_empty_master_line_when_unset() {
        let path = std::env::temp_dir().join(format!("slave_cfg_{}.conf", uuid::Uuid::new_v4()));
        let mut store = ConfigStore::new(None);
        store.load_default(true);

        store.save(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();

        assert!(written.starts_with(CONFIG_HEADER));
        assert!(written.lines().any(|l| l == "master="));
        assert!(!written.contains("name="));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_save_to_missing_directory_returns_io_error() {
        let store = ConfigStore::new(None);
        let result = store.save("/nonexistent/dir/that/cannot/exist/slave.conf");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    // ── setters ───────────────────────────────────────────────────────────────

    #[test]
    fn test_set_port_rejects_zero() {
        let mut store = ConfigStore::new(None);
        assert!(matches!(store.set_port(0), Err(ConfigError::ZeroPort)));
    }

    #[test]
    fn test_load_default_optionally_resets_masters() {
        // Arrange
        let mut store = ConfigStore::new(None);
        store.set_master("10.0.0.1");

        // Act / Assert
        store.load_default(false);
        assert_eq!(store.masters().len(), 1);
        store.load_default(true);
        assert!(store.masters().is_unset());
    }

    #[test]
    fn test_set_log_sink_pushes_current_level() {
        let mut store = ConfigStore::new(None);
        store.set_log_level(LogLevel::Debug);
        let sink = Arc::new(RecordingLogSink::new());

        store.set_log_sink(sink.clone());

        assert_eq!(sink.level(), LogLevel::Debug);
    }

    #[test]
    fn test_display_lists_persisted_keys() {
        let mut store = ConfigStore::new(None);
        store.load_default(true);
        store.set_master("10.0.0.1");

        let text = store.to_string();

        assert!(text.contains("port=1337"));
        assert!(text.contains("master=10.0.0.1"));
        assert!(text.contains("loglevel=0"));
    }
}
