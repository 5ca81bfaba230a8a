//! Configuration file loading and runtime settings.
//!
//! The optional TOML file at `$XDG_CONFIG_HOME/hostfetch/config.toml` (or
//! `$HOME/.config/hostfetch/config.toml`) supplies defaults; CLI flags
//! override it. The merged [`Settings`] value, including persisted account
//! records, is what providers receive through `Configured::configure`.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::account::AccountsFile;
use crate::resolver::EngineOptions;

const APP_DIR_NAME: &str = "hostfetch";
const CONFIG_FILE_NAME: &str = "config.toml";

const CONNECT_TIMEOUT_SECS: u64 = 10;
const READ_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown keys
    #[error("failed to parse config file: {source}\n  Suggestion: Check the TOML syntax and key names")]
    Parse {
        #[source]
        source: toml::de::Error,
    },

    /// A numeric value is outside its accepted range
    #[error("invalid config value for `{field}`: {value}. Expected range: {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Default output directory for downloads.
    pub output_dir: Option<PathBuf>,
    /// Concurrent provider calls per resolution wave (1..=64).
    pub concurrency: Option<usize>,
    /// Maximum expansion depth for yields/bundles (1..=64).
    pub max_depth: Option<usize>,
    /// HTTP connect timeout in seconds (1..=3600).
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds (1..=3600).
    pub read_timeout_secs: Option<u64>,
    /// Accounts file location (defaults next to the config file).
    pub accounts_file: Option<PathBuf>,
    /// Free-form per-provider options, keyed by provider name.
    #[serde(default)]
    pub providers: BTreeMap<String, toml::Table>,
}

impl FileConfig {
    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::OutOfRange`].
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`; a missing file yields the default (empty) config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Validates values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_range("concurrency", self.concurrency.map(to_u64), 1, 64)?;
        validate_range("max_depth", self.max_depth.map(to_u64), 1, 64)?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600)?;
        validate_range("read_timeout_secs", self.read_timeout_secs, 1, 3600)?;
        Ok(())
    }
}

fn to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn validate_range(
    field: &'static str,
    value: Option<u64>,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    match value {
        Some(value) if !(min..=max).contains(&value) => Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        }),
        _ => Ok(()),
    }
}

/// Timeouts shared by every provider and the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
        }
    }
}

/// Merged runtime settings handed to providers.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub http: HttpSettings,
    pub engine: EngineOptions,
    pub output_dir: Option<PathBuf>,
    accounts: BTreeMap<String, Vec<Value>>,
    provider_options: BTreeMap<String, toml::Table>,
}

impl Settings {
    /// Builds settings from a validated file config.
    #[must_use]
    pub fn from_file_config(config: &FileConfig) -> Self {
        let defaults = HttpSettings::default();
        let mut engine = EngineOptions::default();
        if let Some(concurrency) = config.concurrency {
            engine.concurrency = concurrency;
        }
        if let Some(max_depth) = config.max_depth {
            engine.max_depth = max_depth;
        }
        Self {
            http: HttpSettings {
                connect_timeout: config
                    .connect_timeout_secs
                    .map_or(defaults.connect_timeout, Duration::from_secs),
                read_timeout: config
                    .read_timeout_secs
                    .map_or(defaults.read_timeout, Duration::from_secs),
            },
            engine,
            output_dir: config.output_dir.clone(),
            accounts: BTreeMap::new(),
            provider_options: config.providers.clone(),
        }
    }

    /// Attaches persisted account records.
    #[must_use]
    pub fn with_accounts(mut self, accounts: AccountsFile) -> Self {
        self.accounts = accounts.into_entries();
        self
    }

    /// Appends one raw account record for `provider`.
    #[must_use]
    pub fn with_account_record(mut self, provider: &str, record: Value) -> Self {
        self.accounts
            .entry(provider.to_string())
            .or_default()
            .push(record);
        self
    }

    /// Sets a string provider option.
    #[must_use]
    pub fn with_provider_option(mut self, provider: &str, key: &str, value: &str) -> Self {
        self.provider_options
            .entry(provider.to_string())
            .or_default()
            .insert(key.to_string(), toml::Value::String(value.to_string()));
        self
    }

    /// Raw account records persisted for `provider`.
    #[must_use]
    pub fn account_records(&self, provider: &str) -> &[Value] {
        self.accounts
            .get(provider)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// A string option from `[providers."<provider>"]`.
    #[must_use]
    pub fn provider_option(&self, provider: &str, key: &str) -> Option<&str> {
        self.provider_options
            .get(provider)
            .and_then(|table| table.get(key))
            .and_then(toml::Value::as_str)
    }
}

/// Returns the hostfetch config directory.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/hostfetch`
/// 2. `$HOME/.config/hostfetch`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    resolve_config_dir(
        env_var_non_empty_os("XDG_CONFIG_HOME"),
        env_var_non_empty_os("HOME"),
    )
}

/// Resolves the default config file path.
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

fn resolve_config_dir(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg) = xdg_config_home {
        return Some(PathBuf::from(xdg).join(APP_DIR_NAME));
    }
    home.map(|home| PathBuf::from(home).join(".config").join(APP_DIR_NAME))
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.to_string_lossy().trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let config = FileConfig::from_toml_str(
            r#"
output_dir = "/tmp/downloads"
concurrency = 8
max_depth = 4
connect_timeout_secs = 5
read_timeout_secs = 120
accounts_file = "/tmp/accounts.json"

[providers."uploaded.net"]
api_key = "abc123"
"#,
        )
        .unwrap();
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/downloads")));
        assert_eq!(config.concurrency, Some(8));
        assert_eq!(config.max_depth, Some(4));
        assert_eq!(
            config.providers["uploaded.net"]["api_key"].as_str(),
            Some("abc123")
        );
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(FileConfig::from_toml_str("").unwrap(), FileConfig::default());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = FileConfig::from_toml_str("rate_limit = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        for raw in [
            "concurrency = 0",
            "concurrency = 65",
            "max_depth = 0",
            "read_timeout_secs = 3601",
            "connect_timeout_secs = 0",
        ] {
            let err = FileConfig::from_toml_str(raw).unwrap_err();
            assert!(
                matches!(err, ConfigError::OutOfRange { .. }),
                "expected range error for {raw}"
            );
        }
    }

    #[test]
    fn test_out_of_range_message_names_field() {
        let err = FileConfig::from_toml_str("max_depth = 100").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid config value for `max_depth`: 100. Expected range: 1..=64"
        );
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = FileConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_settings_from_file_config_applies_overrides() {
        let config = FileConfig {
            concurrency: Some(2),
            max_depth: Some(3),
            read_timeout_secs: Some(90),
            ..FileConfig::default()
        };
        let settings = Settings::from_file_config(&config);
        assert_eq!(settings.engine.concurrency, 2);
        assert_eq!(settings.engine.max_depth, 3);
        assert_eq!(settings.http.read_timeout, Duration::from_secs(90));
        assert_eq!(
            settings.http.connect_timeout,
            Duration::from_secs(CONNECT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_settings_accounts_and_options() {
        let settings = Settings::default()
            .with_account_record("basic", json!({"username": "a"}))
            .with_provider_option("uploaded.net", "api_key", "k");
        assert_eq!(settings.account_records("basic").len(), 1);
        assert!(settings.account_records("oboom.com").is_empty());
        assert_eq!(settings.provider_option("uploaded.net", "api_key"), Some("k"));
        assert_eq!(settings.provider_option("uploaded.net", "missing"), None);
    }

    #[test]
    fn test_resolve_config_dir_priority() {
        assert_eq!(
            resolve_config_dir(Some("/xdg".into()), Some("/home/u".into())),
            Some(PathBuf::from("/xdg/hostfetch"))
        );
        assert_eq!(
            resolve_config_dir(None, Some("/home/u".into())),
            Some(PathBuf::from("/home/u/.config/hostfetch"))
        );
        assert_eq!(resolve_config_dir(None, None), None);
    }
}
