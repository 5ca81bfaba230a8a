//! JSON persistence for account records.
//!
//! Accounts live in `~/.config/hostfetch/accounts.json` (or
//! `$XDG_CONFIG_HOME/hostfetch/accounts.json`) as an object mapping provider
//! names to arrays of provider-specific records. The file is written with
//! owner-only permissions since records contain passwords and tokens.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::{AccountError, AccountRecord};
use crate::config::default_config_dir;

const ACCOUNTS_FILE_NAME: &str = "accounts.json";

/// Returns the default accounts file path.
///
/// # Errors
///
/// Returns [`AccountError::ConfigDirUnavailable`] if no usable config dir is found.
pub fn default_accounts_path() -> Result<PathBuf, AccountError> {
    default_config_dir()
        .map(|dir| dir.join(ACCOUNTS_FILE_NAME))
        .ok_or(AccountError::ConfigDirUnavailable)
}

/// In-memory view of the accounts file.
#[derive(Debug, Clone, Default)]
pub struct AccountsFile {
    path: PathBuf,
    entries: BTreeMap<String, Vec<Value>>,
}

impl AccountsFile {
    /// Loads `path`; a missing file yields an empty set of accounts.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Io`] on read failure or
    /// [`AccountError::Malformed`] when the JSON has the wrong shape.
    pub fn load(path: &Path) -> Result<Self, AccountError> {
        let entries = match fs::read_to_string(path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| AccountError::Malformed {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No accounts file; starting empty");
                BTreeMap::new()
            }
            Err(source) => {
                return Err(AccountError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Writes the file atomically (temp file then rename).
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Io`] when the directory or file cannot be written.
    pub fn save(&self) -> Result<(), AccountError> {
        let io_error = |source| AccountError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let payload = serde_json::to_vec_pretty(&self.entries).map_err(|source| {
            AccountError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, payload).map_err(io_error)?;
        set_owner_only_permissions(&temp).map_err(io_error)?;
        fs::rename(&temp, &self.path).map_err(io_error)?;
        debug!(path = %self.path.display(), "Accounts file saved");
        Ok(())
    }

    /// Appends a record under its provider.
    pub fn add(&mut self, record: AccountRecord) {
        self.entries
            .entry(record.provider)
            .or_default()
            .push(record.data);
    }

    /// Raw records persisted for `provider`.
    #[must_use]
    pub fn records(&self, provider: &str) -> &[Value] {
        self.entries.get(provider).map(Vec::as_slice).unwrap_or_default()
    }

    /// Providers with at least one record, alphabetically.
    pub fn providers(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.entries
            .iter()
            .map(|(name, records)| (name.as_str(), records.as_slice()))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consumes the file into its provider-to-records map.
    #[must_use]
    pub fn into_entries(self) -> BTreeMap<String, Vec<Value>> {
        self.entries
    }
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(provider: &str, id: &str) -> AccountRecord {
        AccountRecord {
            provider: provider.to_string(),
            id: id.to_string(),
            data: json!({"username": id, "password": "pw"}),
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = AccountsFile::load(&dir.path().join("accounts.json")).unwrap();
        assert!(file.records("basic").is_empty());
        assert_eq!(file.providers().count(), 0);
    }

    #[test]
    fn test_save_then_load_preserves_records_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("accounts.json");
        let mut file = AccountsFile::load(&path).unwrap();
        file.add(record("basic", "alice"));
        file.add(record("basic", "bob"));
        file.add(record("rapidgator.net", "carol"));
        file.save().unwrap();

        let reloaded = AccountsFile::load(&path).unwrap();
        let basic = reloaded.records("basic");
        assert_eq!(basic.len(), 2);
        assert_eq!(basic[0]["username"], "alice");
        assert_eq!(basic[1]["username"], "bob");
        assert_eq!(reloaded.records("rapidgator.net").len(), 1);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_load_malformed_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        let err = AccountsFile::load(&path).unwrap_err();
        assert!(matches!(err, AccountError::Malformed { .. }));
        assert!(err.to_string().contains("accounts.json"));
    }

    #[cfg(unix)]
    #[test]
    fn test_save_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let mut file = AccountsFile::load(&path).unwrap();
        file.add(record("basic", "alice"));
        file.save().unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
