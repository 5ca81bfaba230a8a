//! Typed per-provider accounts and interactive provisioning.
//!
//! Each provider decodes its own account type from the persisted
//! [`AccountRecord`]s and keeps them in an [`AccountStore`]. Provisioning
//! goes through an [`Accountant`], which asks a [`Prompter`] for the
//! provider's [`Field`]s and, where the hoster allows it, validates the
//! credentials before a record is written.

mod storage;

pub use storage::{AccountsFile, default_accounts_path};

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::provider::ConfigureError;

/// Errors raised while provisioning or persisting accounts.
#[derive(Debug, Error)]
pub enum AccountError {
    /// The prompt was cancelled or could not be shown
    #[error("account prompt failed: {reason}")]
    Prompt {
        /// Prompt failure
        reason: String,
    },

    /// A required field was left empty
    #[error("field `{field}` is required")]
    MissingField {
        /// Field key
        field: String,
    },

    /// The hoster rejected the credentials
    #[error("{provider} rejected the account: {reason}\n  Suggestion: Double-check the credentials and try again")]
    Validation {
        /// Provider name
        provider: String,
        /// Why validation failed
        reason: String,
    },

    /// No provider with that name offers account provisioning
    #[error("unknown provider '{provider}' (or it has no accounts)\n  Suggestion: Run `hostfetch providers` to list providers with the `accounts` capability")]
    UnknownProvider {
        /// Requested provider name
        provider: String,
    },

    /// The accounts file could not be read or written
    #[error("accounts file {path}: {source}")]
    Io {
        /// Accounts file path
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The accounts file is not valid JSON of the expected shape
    #[error("accounts file {path} is malformed: {source}\n  Suggestion: Fix the JSON or move the file aside")]
    Malformed {
        /// Accounts file path
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No usable config directory
    #[error("unable to determine config directory (set XDG_CONFIG_HOME or HOME)")]
    ConfigDirUnavailable,
}

/// Common view of a provider's account type.
pub trait Account {
    /// Identity shown to the user (username, email or account id).
    fn id(&self) -> &str;

    fn is_premium(&self) -> bool;

    /// `None` when the hoster does not report an expiry.
    fn expires_at(&self) -> Option<DateTime<Utc>>;

    /// Premium and not expired at `now`.
    fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_premium() && self.expires_at().is_none_or(|expiry| expiry > now)
    }
}

/// Ordered, typed accounts for one provider.
#[derive(Debug, Clone)]
pub struct AccountStore<A> {
    accounts: Vec<A>,
}

impl<A> Default for AccountStore<A> {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
        }
    }
}

impl<A: Account> AccountStore<A> {
    #[must_use]
    pub fn new(accounts: Vec<A>) -> Self {
        Self { accounts }
    }

    /// Decodes persisted records for `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigureError::InvalidAccount`] naming the first record that
    /// does not decode into `A`.
    pub fn from_records(provider: &str, records: &[Value]) -> Result<Self, ConfigureError>
    where
        A: DeserializeOwned,
    {
        let accounts = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                serde_json::from_value(record.clone()).map_err(|error| {
                    ConfigureError::InvalidAccount {
                        provider: provider.to_string(),
                        index,
                        reason: error.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<A>, _>>()?;
        Ok(Self { accounts })
    }

    /// First premium, non-expired account.
    #[must_use]
    pub fn select_premium(&self, now: DateTime<Utc>) -> Option<&A> {
        self.accounts.iter().find(|account| account.is_usable(now))
    }

    /// First account regardless of status.
    #[must_use]
    pub fn first(&self) -> Option<&A> {
        self.accounts.first()
    }

    pub fn find(&self, predicate: impl Fn(&A) -> bool) -> Option<&A> {
        self.accounts.iter().find(|account| predicate(account))
    }

    pub fn push(&mut self, account: A) {
        self.accounts.push(account);
    }

    pub fn iter(&self) -> impl Iterator<Item = &A> {
        self.accounts.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// One prompted account field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: &'static str,
    pub label: &'static str,
    /// Masked while typing and never echoed back.
    pub sensitive: bool,
    pub default: Option<String>,
}

impl Field {
    #[must_use]
    pub fn text(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            sensitive: false,
            default: None,
        }
    }

    #[must_use]
    pub fn secret(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            sensitive: true,
            default: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Gathers values for account fields.
pub trait Prompter: Send + Sync {
    /// Returns one value per field, keyed by [`Field::key`].
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Prompt`] when input is cancelled or unavailable.
    fn prompt(&self, fields: &[Field]) -> Result<HashMap<String, String>, AccountError>;
}

/// Persisted form of one account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRecord {
    pub provider: String,
    pub id: String,
    pub data: Value,
}

/// Account provisioning capability of a provider.
#[async_trait]
pub trait Accountant: Send + Sync {
    /// Fields to prompt for, in order.
    fn fields(&self) -> Vec<Field>;

    /// A blank record with every field key, for hand-editing the accounts file.
    fn empty_template(&self) -> Value {
        let object: Map<String, Value> = self
            .fields()
            .into_iter()
            .map(|field| {
                let value = field.default.unwrap_or_default();
                (field.key.to_string(), Value::String(value))
            })
            .collect();
        Value::Object(object)
    }

    /// Prompts for the fields, validates them and returns the record to persist.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError`] when prompting fails, a field is missing, or
    /// the hoster rejects the credentials.
    async fn new_account(&self, prompter: &dyn Prompter) -> Result<AccountRecord, AccountError>;
}

/// Takes a required, non-blank value out of prompted answers.
///
/// # Errors
///
/// Returns [`AccountError::MissingField`] when the value is absent or blank.
pub(crate) fn required(
    answers: &mut HashMap<String, String>,
    key: &str,
) -> Result<String, AccountError> {
    answers
        .remove(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AccountError::MissingField {
            field: key.to_string(),
        })
}
