//! Application configuration.
//!
//! Read from a YAML file (default `config.yml`, or `CONFIG_PATH`) and then
//! overridden by environment variables. Empty environment values are ignored.
//!
//! ```yaml
//! gemini:
//!   GEMINI_1PSID: "..."
//!   GEMINI_1PSIDTS: "..."
//!   GEMINI_1PSIDCC: "..."
//!   GEMINI_REFRESH_INTERVAL: 5
//! server:
//!   PORT: "3000"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::credentials::{CredentialSet, DEFAULT_REFRESH_INTERVAL_MINUTES};

pub const DEFAULT_CONFIG_PATH: &str = "config.yml";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Environment variables that carry credential settings.
const GEMINI_ENV_KEYS: [&str; 4] = [
    "GEMINI_1PSID",
    "GEMINI_1PSIDTS",
    "GEMINI_1PSIDCC",
    "GEMINI_REFRESH_INTERVAL",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no configuration found: {} does not exist and no GEMINI_* environment variables are set",
        path.display()
    )]
    Missing { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// A YAML scalar that may be written quoted or bare.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Str(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Int(v) => v.to_string(),
            Scalar::Str(s) => s,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    gemini: GeminiSection,
    #[serde(default)]
    server: ServerSection,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiSection {
    #[serde(rename = "GEMINI_1PSID", default)]
    psid: Option<String>,
    #[serde(rename = "GEMINI_1PSIDTS", default)]
    psidts: Option<String>,
    #[serde(rename = "GEMINI_1PSIDCC", default)]
    psidcc: Option<String>,
    #[serde(rename = "GEMINI_REFRESH_INTERVAL", default)]
    refresh_interval: Option<Scalar>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    #[serde(rename = "PORT", default)]
    port: Option<Scalar>,
    #[serde(rename = "BIND_ADDRESS", default)]
    bind_address: Option<String>,
    #[serde(rename = "REQUEST_TIMEOUT_SECS", default)]
    request_timeout_secs: Option<Scalar>,
    #[serde(rename = "SHUTDOWN_GRACE_SECS", default)]
    shutdown_grace_secs: Option<Scalar>,
    #[serde(rename = "LOG_DIR", default)]
    log_dir: Option<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Deadline applied to every request.
    pub request_timeout: Duration,
    /// How long shutdown waits for in-flight work.
    pub shutdown_grace: Duration,
    /// Enables the daily-rolling log file when set.
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: CredentialSet,
    pub server: ServerConfig,
    /// The file the settings came from, if it existed.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    /// Load from the configured file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `env` as the environment lookup.
    pub fn load_with<F>(env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| {
            env(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let path = env("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let file = read_file(&path)?;

        let has_env_credentials = GEMINI_ENV_KEYS.iter().any(|key| env(key).is_some());
        if file.is_none() && !has_env_credentials {
            return Err(ConfigError::Missing { path });
        }

        let source = file.is_some().then(|| path.clone());
        let FileConfig { gemini, server } = file.unwrap_or_default();

        let refresh_interval = env("GEMINI_REFRESH_INTERVAL")
            .and_then(|v| v.parse::<i64>().ok())
            .or_else(|| {
                gemini
                    .refresh_interval
                    .and_then(|v| v.into_string().trim().parse::<i64>().ok())
            })
            .unwrap_or(i64::from(DEFAULT_REFRESH_INTERVAL_MINUTES));

        let credentials = CredentialSet::new(
            env("GEMINI_1PSID").or(gemini.psid).unwrap_or_default(),
            env("GEMINI_1PSIDTS").or(gemini.psidts).unwrap_or_default(),
            env("GEMINI_1PSIDCC").or(gemini.psidcc).unwrap_or_default(),
            refresh_interval,
        );

        let mut config = ServerConfig::default();

        if let Some(port) = env("PORT").or_else(|| server.port.map(Scalar::into_string)) {
            config.port = port.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                message: format!("{port:?} is not a valid port: {e}"),
            })?;
        }

        if let Some(bind_address) = env("API_BIND_ADDRESS")
            .or(server.bind_address)
            .filter(|v| !v.trim().is_empty())
        {
            config.bind_address = bind_address;
        }

        if let Some(secs) = seconds(
            "REQUEST_TIMEOUT_SECS",
            env("REQUEST_TIMEOUT_SECS").or_else(|| server.request_timeout_secs.map(Scalar::into_string)),
        )? {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "REQUEST_TIMEOUT_SECS",
                    message: "must be positive".to_string(),
                });
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = seconds(
            "SHUTDOWN_GRACE_SECS",
            env("SHUTDOWN_GRACE_SECS").or_else(|| server.shutdown_grace_secs.map(Scalar::into_string)),
        )? {
            config.shutdown_grace = Duration::from_secs(secs);
        }

        config.log_dir = env("LOG_DIR")
            .or(server.log_dir)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        debug!(
            source = ?source,
            credentials = ?credentials,
            port = config.port,
            "Configuration loaded"
        );

        Ok(Self {
            credentials,
            server: config,
            source,
        })
    }
}

fn seconds(key: &'static str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    value
        .map(|v| {
            v.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key,
                message: format!("{v:?} is not a number of seconds: {e}"),
            })
        })
        .transpose()
}

fn read_file(path: &Path) -> Result<Option<FileConfig>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if contents.trim().is_empty() {
        return Ok(Some(FileConfig::default()));
    }

    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const FULL_YAML: &str = r#"
gemini:
  GEMINI_1PSID: "psid-value"
  GEMINI_1PSIDTS: "psidts-value"
  GEMINI_1PSIDCC: "psidcc-value"
  GEMINI_REFRESH_INTERVAL: 7
server:
  PORT: "8080"
  REQUEST_TIMEOUT_SECS: 30
  LOG_DIR: "logs"
"#;

    #[test]
    fn test_load_from_file() {
        let file = yaml_file(FULL_YAML);
        let path = file.path().to_string_lossy().to_string();
        let config = AppConfig::load_with(env_from(&[("CONFIG_PATH", &path)])).unwrap();

        assert_eq!(config.credentials.identity_token(), "psid-value");
        assert_eq!(config.credentials.timestamp_token(), "psidts-value");
        assert_eq!(config.credentials.rotation_token(), "psidcc-value");
        assert_eq!(config.credentials.refresh_interval_minutes(), 7);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.request_timeout, Duration::from_secs(30));
        assert_eq!(config.server.shutdown_grace, Duration::from_secs(10));
        assert_eq!(config.server.log_dir, Some(PathBuf::from("logs")));
        assert_eq!(config.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = yaml_file(FULL_YAML);
        let path = file.path().to_string_lossy().to_string();
        let config = AppConfig::load_with(env_from(&[
            ("CONFIG_PATH", &path),
            ("GEMINI_1PSID", "from-env"),
            ("GEMINI_1PSIDTS", ""),
            ("GEMINI_REFRESH_INTERVAL", "soon"),
            ("PORT", "9000"),
            ("API_BIND_ADDRESS", "127.0.0.1"),
        ]))
        .unwrap();

        assert_eq!(config.credentials.identity_token(), "from-env");
        // Empty env values do not override.
        assert_eq!(config.credentials.timestamp_token(), "psidts-value");
        // Non-integer interval is ignored.
        assert_eq!(config.credentials.refresh_interval_minutes(), 7);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "127.0.0.1");
    }

    #[test]
    fn test_env_only_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config.yml").to_string_lossy().to_string();
        let config = AppConfig::load_with(env_from(&[
            ("CONFIG_PATH", &missing),
            ("GEMINI_1PSID", "a"),
            ("GEMINI_REFRESH_INTERVAL", "0"),
        ]))
        .unwrap();

        assert!(config.source.is_none());
        assert_eq!(config.credentials.identity_token(), "a");
        // Empty tokens load fine; init is what rejects them.
        assert!(!config.credentials.is_initializable());
        assert_eq!(config.credentials.refresh_interval_minutes(), 5);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_missing_everything_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yml").to_string_lossy().to_string();
        let err = AppConfig::load_with(env_from(&[("CONFIG_PATH", &missing)])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let file = yaml_file("gemini: [unterminated");
        let path = file.path().to_string_lossy().to_string();
        let err = AppConfig::load_with(env_from(&[("CONFIG_PATH", &path)])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_invalid_port() {
        let file = yaml_file(FULL_YAML);
        let path = file.path().to_string_lossy().to_string();
        let err = AppConfig::load_with(env_from(&[("CONFIG_PATH", &path), ("PORT", "70000")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn test_empty_file_counts_as_present() {
        let file = yaml_file("");
        let path = file.path().to_string_lossy().to_string();
        let config = AppConfig::load_with(env_from(&[("CONFIG_PATH", &path)])).unwrap();
        assert!(config.source.is_some());
        assert_eq!(config.server.port, DEFAULT_PORT);
    }
}
