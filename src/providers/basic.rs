//! Generic HTTP(S) provider, the last resort for any link.
//!
//! Resolves by sending a HEAD request and reading the name and size from the
//! response headers. Optional per-host accounts add HTTP Basic credentials to
//! both the probe and the download.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use super::send;
use crate::account::{
    Account, AccountError, AccountRecord, AccountStore, Accountant, Field, Prompter, required,
};
use crate::config::{HttpSettings, Settings};
use crate::download::filename::{name_from_url, parse_content_disposition};
use crate::http_client::{ClientBuildError, ClientOptions, build_http_client};
use crate::provider::{ConfigureError, Configured, Provider};
use crate::resolver::utils::{host_matches, is_http_url, rebase};
use crate::resolver::{File, FileSize, Request, ResolveError, Resolvability, Resolver, Settled};
use crate::retrieve::{FetchRequest, RetrieveError, Retriever};

pub(crate) const NAME: &str = "basic";

/// HTTP Basic credentials for one host.
#[derive(Clone, Serialize, Deserialize)]
pub struct BasicAccount {
    pub username: String,
    pub password: String,
    /// Host the credentials apply to; subdomains match too.
    pub host: String,
    #[serde(skip)]
    id: String,
}

impl BasicAccount {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>, host: impl Into<String>) -> Self {
        let mut account = Self {
            username: username.into(),
            password: password.into(),
            host: host.into(),
            id: String::new(),
        };
        account.id = format!("{}@{}", account.username, account.host);
        account
    }

    fn applies_to(&self, url: &Url) -> bool {
        host_matches(url, &self.host)
    }
}

impl fmt::Debug for BasicAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAccount")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("host", &self.host)
            .finish()
    }
}

impl Account for BasicAccount {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_premium(&self) -> bool {
        true
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Fallback resolver and retriever for plain HTTP(S) links.
pub struct BasicProvider {
    client: Client,
    page_base: Option<Url>,
    accounts: AccountStore<BasicAccount>,
}

impl BasicProvider {
    /// Creates the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] if the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, ClientBuildError> {
        Ok(Self {
            client: build_http_client(NAME, settings, ClientOptions::default())?,
            page_base: None,
            accounts: AccountStore::default(),
        })
    }

    /// Creates the provider with probes sent to `base_url` (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] if the HTTP client cannot be built.
    pub fn with_base_url(settings: &HttpSettings, base_url: Url) -> Result<Self, ClientBuildError> {
        let mut provider = Self::new(settings)?;
        provider.page_base = Some(base_url);
        Ok(provider)
    }

    fn account_for(&self, url: &Url) -> Option<&BasicAccount> {
        self.accounts.find(|account| account.applies_to(url))
    }

    async fn probe(&self, request: Request) -> Result<Settled, ResolveError> {
        let url = request.url().clone();
        let target = self
            .page_base
            .as_ref()
            .map_or_else(|| url.clone(), |base| rebase(&url, base));
        let mut head = self.client.head(target.clone());
        if let Some(account) = self.account_for(&url) {
            head = head.basic_auth(&account.username, Some(&account.password));
        }
        let response = send(NAME, &target, head).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(request.deadend(None));
        }
        if status != StatusCode::OK {
            let error = ResolveError::http(NAME, url.as_str(), status.as_u16());
            return Ok(request.errs(None, error));
        }

        let headers = response.headers();
        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map_or(FileSize::Unknown, FileSize::Known);
        let name = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_disposition)
            .unwrap_or_else(|| name_from_url(&url));

        Ok(request.resolves_to(File::new(NAME, url, name, size)))
    }
}

impl fmt::Debug for BasicProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicProvider")
            .field("page_base", &self.page_base.as_ref().map(Url::as_str))
            .field("accounts", &self.accounts.len())
            .finish_non_exhaustive()
    }
}

impl Provider for BasicProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }

    fn retriever(&self) -> Option<&dyn Retriever> {
        Some(self)
    }

    fn accountant(&self) -> Option<&dyn Accountant> {
        Some(self)
    }

    fn configured(&mut self) -> Option<&mut dyn Configured> {
        Some(self)
    }
}

impl Configured for BasicProvider {
    fn configure(&mut self, settings: &Settings) -> Result<(), ConfigureError> {
        let store: AccountStore<BasicAccount> =
            AccountStore::from_records(NAME, settings.account_records(NAME))?;
        // `id` is derived, not persisted.
        self.accounts = AccountStore::new(
            store
                .iter()
                .map(|a| BasicAccount::new(a.username.clone(), a.password.clone(), a.host.clone()))
                .collect(),
        );
        Ok(())
    }
}

#[async_trait]
impl Resolver for BasicProvider {
    fn can_resolve(&self, url: &Url) -> Resolvability {
        if is_http_url(url) {
            Resolvability::Single
        } else {
            Resolvability::Next
        }
    }

    #[tracing::instrument(skip(self, request), fields(url = %request.url()))]
    async fn resolve_one(&self, request: Request) -> Result<Settled, ResolveError> {
        self.probe(request).await
    }
}

#[async_trait]
impl Retriever for BasicProvider {
    fn can_retrieve(&self, _file: &File) -> u32 {
        1
    }

    async fn retrieve(&self, file: &File) -> Result<FetchRequest, RetrieveError> {
        let request = FetchRequest::get(file.url().clone());
        Ok(match self.account_for(file.url()) {
            Some(account) => request.with_basic_auth(&account.username, &account.password),
            None => request,
        })
    }
}

#[async_trait]
impl Accountant for BasicProvider {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::text("username", "Username"),
            Field::secret("password", "Password"),
            Field::text("host", "Host (e.g. files.example.com)"),
        ]
    }

    async fn new_account(&self, prompter: &dyn Prompter) -> Result<AccountRecord, AccountError> {
        let mut answers = prompter.prompt(&self.fields())?;
        let account = BasicAccount::new(
            required(&mut answers, "username")?,
            required(&mut answers, "password")?,
            required(&mut answers, "host")?.to_ascii_lowercase(),
        );
        let data = serde_json::to_value(&account).map_err(|e| AccountError::Validation {
            provider: NAME.to_string(),
            reason: e.to_string(),
        })?;
        Ok(AccountRecord {
            provider: NAME.to_string(),
            id: account.id,
            data,
        })
    }
}
