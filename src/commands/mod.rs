//! CLI command handlers.

mod accounts;
mod get;
mod providers;
mod resolve;

pub use accounts::{run_accounts_add_command, run_accounts_list_command};
pub use get::run_get_command;
pub use providers::run_providers_command;
pub use resolve::run_resolve_command;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use hostfetch_core::{
    AccountsFile, FileConfig, ProviderRegistry, Settings, build_default_registry,
    default_accounts_path, resolve_default_config_path,
};
use tracing::{debug, warn};
use url::Url;

/// Everything a command needs: merged settings, configured providers and
/// the accounts file they were configured from.
pub struct Context {
    pub settings: Settings,
    pub registry: ProviderRegistry,
    pub accounts: AccountsFile,
    pub accounts_path: Option<PathBuf>,
}

impl Context {
    /// Loads config and accounts, then builds and configures the registry.
    ///
    /// # Errors
    ///
    /// Fails when the config or accounts file exists but cannot be read or parsed.
    pub fn load(config_path: Option<&Path>, accounts_override: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .or_else(resolve_default_config_path);
        let file_config = match &config_path {
            Some(path) => FileConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => FileConfig::default(),
        };

        let accounts_path = accounts_override
            .map(Path::to_path_buf)
            .or_else(|| file_config.accounts_file.clone())
            .or_else(|| default_accounts_path().ok());
        let accounts = match &accounts_path {
            Some(path) => AccountsFile::load(path)
                .with_context(|| format!("failed to load accounts {}", path.display()))?,
            None => {
                warn!("No config directory; running without stored accounts");
                AccountsFile::default()
            }
        };

        let settings = Settings::from_file_config(&file_config).with_accounts(accounts.clone());
        let mut registry = build_default_registry(&settings.http);
        let configured = registry.configure(&settings);
        debug!(
            config = ?config_path,
            providers = registry.len(),
            configured,
            "Context loaded"
        );

        Ok(Self {
            settings,
            registry,
            accounts,
            accounts_path,
        })
    }
}

/// Splits raw arguments into parsed URLs and `(input, reason)` rejects.
fn parse_seeds(raw: &[String]) -> (Vec<Url>, Vec<(String, String)>) {
    let mut seeds = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();
    for input in raw {
        match Url::parse(input.trim()) {
            Ok(url) => seeds.push(url),
            Err(error) => rejected.push((input.clone(), error.to_string())),
        }
    }
    (seeds, rejected)
}

/// First line of an error message; the rest is the suggestion text.
fn headline(error: &impl std::fmt::Display) -> String {
    let message = error.to_string();
    message.lines().next().unwrap_or_default().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seeds_separates_invalid_input() {
        let (seeds, rejected) = parse_seeds(&[
            "https://a.example/x".to_string(),
            "not a url".to_string(),
            " https://b.example/y ".to_string(),
        ]);
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[1].as_str(), "https://b.example/y");
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, "not a url");
    }

    #[test]
    fn test_headline_drops_suggestion() {
        let error = anyhow::anyhow!("first line\n  Suggestion: do something");
        assert_eq!(headline(&error), "first line");
    }

    #[test]
    fn test_context_load_with_explicit_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let context = Context::load(
            Some(&dir.path().join("missing.toml")),
            Some(&dir.path().join("accounts.json")),
        )
        .unwrap();
        assert_eq!(context.registry.len(), 8);
        assert_eq!(context.accounts.providers().count(), 0);
    }

    #[test]
    fn test_context_load_rejects_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "concurrency = 0\n").unwrap();
        let result = Context::load(Some(&path), Some(&dir.path().join("accounts.json")));
        assert!(result.is_err());
    }
}
