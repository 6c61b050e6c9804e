//! Task manager and server configuration.
//!
//! Configuration is layered:
//! 1. Built-in defaults
//! 2. TOML file (`.research-tasks.toml`, or an explicit path)
//! 3. Environment variables (with `RESEARCH_TASKS_` prefix)
//!
//! Later layers override earlier ones. The result is validated before use.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! [tasks]
//! slots = 4
//! queue_capacity = 1024
//! default_deadline_secs = 0   # 0 = no deadline
//! retention_secs = 3600       # 0 = keep finished tasks forever
//! sweep_interval_secs = 60
//! shutdown_grace_secs = 10
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! reports_dir = "reports"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_SLOTS,
    DEFAULT_SWEEP_INTERVAL_SECS,
};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".research-tasks.toml";

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "RESEARCH_TASKS_";

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lifecycle manager settings.
    pub tasks: TasksConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

/// Lifecycle manager settings.
///
/// | Field | Default |
/// |-------|---------|
/// | `slots` | 4 |
/// | `queue_capacity` | 1024 |
/// | `default_deadline_secs` | 0 (none) |
/// | `retention_secs` | 0 (never purge) |
/// | `sweep_interval_secs` | 60 |
/// | `shutdown_grace_secs` | 10 |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    /// Number of tasks that may run at once.
    pub slots: usize,
    /// Maximum number of tasks waiting in the `queued` state.
    pub queue_capacity: usize,
    /// Deadline for tasks that do not set one, 0 for none.
    pub default_deadline_secs: u64,
    /// Age at which finished tasks are purged, 0 to keep them.
    pub retention_secs: u64,
    /// Seconds between retention sweeps.
    pub sweep_interval_secs: u64,
    /// Seconds running tasks get to stop before they are aborted.
    pub shutdown_grace_secs: u64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            slots: DEFAULT_SLOTS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            default_deadline_secs: 0,
            retention_secs: 0,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
        }
    }
}

impl TasksConfig {
    /// Sets the number of execution slots.
    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }

    /// Sets the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the deadline applied to tasks that do not carry their own.
    pub fn with_default_deadline_secs(mut self, secs: u64) -> Self {
        self.default_deadline_secs = secs;
        self
    }

    /// Enables the retention sweeper.
    pub fn with_retention(mut self, retention_secs: u64, sweep_interval_secs: u64) -> Self {
        self.retention_secs = retention_secs;
        self.sweep_interval_secs = sweep_interval_secs;
        self
    }

    /// Sets the shutdown grace period.
    pub fn with_shutdown_grace_secs(mut self, secs: u64) -> Self {
        self.shutdown_grace_secs = secs;
        self
    }

    /// Deadline for tasks without their own, `None` when disabled.
    pub fn default_deadline(&self) -> Option<Duration> {
        (self.default_deadline_secs > 0).then(|| Duration::from_secs(self.default_deadline_secs))
    }

    /// Age after which finished tasks are purged, `None` when disabled.
    pub fn retention(&self) -> Option<Duration> {
        (self.retention_secs > 0).then(|| Duration::from_secs(self.retention_secs))
    }

    /// Interval between retention sweeps, never shorter than one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Time granted to running tasks on shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slots == 0 {
            return Err(ConfigError::invalid("tasks.slots", "must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "tasks.queue_capacity",
                "must be at least 1",
            ));
        }
        if self.retention_secs > 0 && self.sweep_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "tasks.sweep_interval_secs",
                "must be at least 1 when retention is enabled",
            ));
        }
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Directory the research worker writes reports into.
    pub reports_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            reports_dir: PathBuf::from("reports"),
        }
    }
}

impl Config {
    /// Loads configuration from the default file (if present) and the
    /// process environment.
    ///
    /// A missing default file is not an error; an explicitly named one is.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            },
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tasks.validate()?;
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::invalid("server.host", "must not be empty"));
        }
        Ok(())
    }

    /// Applies `RESEARCH_TASKS_*` overrides read through `lookup`.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        override_parsed(&get, "SLOTS", &mut self.tasks.slots);
        override_parsed(&get, "QUEUE_CAPACITY", &mut self.tasks.queue_capacity);
        override_parsed(
            &get,
            "DEFAULT_DEADLINE_SECS",
            &mut self.tasks.default_deadline_secs,
        );
        override_parsed(&get, "RETENTION_SECS", &mut self.tasks.retention_secs);
        override_parsed(
            &get,
            "SWEEP_INTERVAL_SECS",
            &mut self.tasks.sweep_interval_secs,
        );
        override_parsed(
            &get,
            "SHUTDOWN_GRACE_SECS",
            &mut self.tasks.shutdown_grace_secs,
        );
        override_parsed(&get, "PORT", &mut self.server.port);

        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(dir) = get("REPORTS_DIR") {
            self.server.reports_dir = PathBuf::from(dir);
        }
    }
}

fn override_parsed<T, G>(get: &G, name: &str, target: &mut T)
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(name) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => {
                let variable = format!("{ENV_PREFIX}{name}");
                tracing::warn!(%variable, value = %raw, "ignoring unparsable environment override");
            },
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading a configuration file.
    #[error("failed to read config file '{path}': {error}")]
    Io {
        /// Path to the configuration file.
        path: String,
        /// Error message.
        error: String,
    },

    /// TOML parse error.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("invalid config value for '{key}': {reason}")]
    Invalid {
        /// Dotted key of the offending value.
        key: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: &'static str) -> Self {
        Self::Invalid { key, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tasks.slots, 4);
        assert_eq!(config.tasks.queue_capacity, 1024);
        assert_eq!(config.tasks.default_deadline(), None);
        assert_eq!(config.tasks.retention(), None);
        assert_eq!(config.server.port, 8000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = Config::from_toml(
            r#"
            [tasks]
            slots = 2
            retention_secs = 600

            [server]
            port = 9100
            "#,
        )
        .unwrap();
        assert_eq!(config.tasks.slots, 2);
        assert_eq!(config.tasks.queue_capacity, 1024);
        assert_eq!(config.tasks.retention(), Some(Duration::from_secs(600)));
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(matches!(
            Config::from_toml("[tasks]\nslots = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tasks]\nqueue_capacity = 8").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.tasks.queue_capacity, 8);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("RESEARCH_TASKS_SLOTS", "8"),
            ("RESEARCH_TASKS_PORT", "9000"),
            ("RESEARCH_TASKS_HOST", "0.0.0.0"),
            ("RESEARCH_TASKS_REPORTS_DIR", "/tmp/reports"),
            ("RESEARCH_TASKS_DEFAULT_DEADLINE_SECS", "30"),
        ]));
        assert_eq!(config.tasks.slots, 8);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.reports_dir, PathBuf::from("/tmp/reports"));
        assert_eq!(config.tasks.default_deadline(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_env_override_ignores_unparsable() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("RESEARCH_TASKS_SLOTS", "lots")]));
        assert_eq!(config.tasks.slots, 4);
    }

    #[test]
    fn test_validation() {
        let config = Config {
            tasks: TasksConfig::default().with_slots(0),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "tasks.slots", .. })
        ));

        let tasks = TasksConfig::default().with_retention(60, 0);
        assert!(tasks.validate().is_err());
    }

    #[test]
    fn test_sweep_interval_is_never_zero() {
        let tasks = TasksConfig::default().with_retention(1, 0);
        assert_eq!(tasks.sweep_interval(), Duration::from_secs(1));
        assert_eq!(
            TasksConfig::default().sweep_interval(),
            Duration::from_secs(60)
        );
    }
}
