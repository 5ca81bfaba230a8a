//! rapidgator.net - per-link lookups through the account API.
//!
//! Every API call needs a session id obtained by logging in with the first
//! configured account. Sessions are short-lived, so the cache refreshes often.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{body_text, parse_size, send};
use crate::account::{
    Account, AccountError, AccountRecord, AccountStore, Accountant, Field, Prompter, required,
};
use crate::config::{HttpSettings, Settings};
use crate::http_client::{ClientBuildError, ClientOptions, build_http_client};
use crate::provider::{ConfigureError, Configured, Provider};
use crate::resolver::utils::{endpoint, host_matches, path_segments};
use crate::resolver::{
    Checksum, File, FileSize, HashAlgorithm, Request, ResolveError, Resolvability, Resolver,
    Settled,
};
use crate::session::{Attempt, Session, SessionCache};

const NAME: &str = "rapidgator.net";
const DEFAULT_BASE: &str = "https://rapidgator.net";
const SESSION_TTL: Duration = Duration::from_secs(5 * 60);

/// Stored rapidgator.net credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct RapidgatorAccount {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub premium: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for RapidgatorAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RapidgatorAccount")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("premium", &self.premium)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Account for RapidgatorAccount {
    fn id(&self) -> &str {
        &self.username
    }

    fn is_premium(&self) -> bool {
        self.premium
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    response_status: u16,
    #[serde(default)]
    response: Value,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    filename: String,
    size: Value,
    #[serde(default)]
    hash: Option<String>,
}

enum Lookup {
    Found(File),
    Missing,
}

/// Resolver for `rapidgator.net` file links.
pub struct RapidgatorProvider {
    client: Client,
    base_url: Url,
    session: SessionCache,
    accounts: AccountStore<RapidgatorAccount>,
}

impl RapidgatorProvider {
    /// Creates the provider against the public API.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] if the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, ClientBuildError> {
        let base_url = Url::parse(DEFAULT_BASE).map_err(|e| ClientBuildError {
            component: NAME.to_string(),
            reason: e.to_string(),
        })?;
        Self::with_base_url(settings, base_url)
    }

    /// Creates the provider with a custom API base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] if the HTTP client cannot be built.
    pub fn with_base_url(settings: &HttpSettings, base_url: Url) -> Result<Self, ClientBuildError> {
        Ok(Self {
            client: build_http_client(NAME, settings, ClientOptions::default())?,
            base_url,
            session: SessionCache::new(NAME),
            accounts: AccountStore::default(),
        })
    }

    async fn login(&self) -> Result<Session, ResolveError> {
        let account = self
            .accounts
            .first()
            .ok_or_else(|| ResolveError::missing_credentials(NAME))?;
        let mut url = endpoint(&self.base_url, "api/user/login");
        url.query_pairs_mut()
            .append_pair("username", &account.username)
            .append_pair("password", &account.password);

        let envelope = self.call(&url).await?;
        if envelope.response_status != 200 {
            return Err(ResolveError::resolution_failed(
                NAME,
                endpoint(&self.base_url, "api/user/login").as_str(),
                &format!("login refused for {} (status {})", account.username, envelope.response_status),
            ));
        }
        let login: LoginResponse = serde_json::from_value(envelope.response)
            .map_err(|e| ResolveError::protocol(NAME, format!("login response: {e}")))?;
        Ok(Session::new(login.session_id, SESSION_TTL))
    }

    async fn file_info(&self, sid: &str, file_url: &Url) -> Result<Attempt<Lookup>, ResolveError> {
        let mut url = endpoint(&self.base_url, "api/file/info");
        url.query_pairs_mut()
            .append_pair("sid", sid)
            .append_pair("url", file_url.as_str());

        let envelope = self.call(&url).await?;
        match envelope.response_status {
            200 => {
                let info: FileInfo = serde_json::from_value(envelope.response)
                    .map_err(|e| ResolveError::protocol(NAME, format!("file info: {e}")))?;
                file_from_info(info, file_url).map(|file| Attempt::Done(Lookup::Found(file)))
            }
            404 => Ok(Attempt::Done(Lookup::Missing)),
            403 => Ok(Attempt::Rejected),
            status => Err(ResolveError::http(NAME, file_url.as_str(), status)),
        }
    }

    async fn call(&self, url: &Url) -> Result<Envelope, ResolveError> {
        let response = send(NAME, url, self.client.get(url.clone())).await?;
        let body = body_text(NAME, url, response).await?;
        parse_envelope(&body)
    }
}

fn parse_envelope(body: &str) -> Result<Envelope, ResolveError> {
    let trimmed = body.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('<') {
        return Err(ResolveError::protocol(NAME, "got non-JSON response"));
    }
    serde_json::from_str(trimmed)
        .map_err(|e| ResolveError::protocol(NAME, format!("response envelope: {e}")))
}

fn file_from_info(info: FileInfo, url: &Url) -> Result<File, ResolveError> {
    let size = parse_size(&info.size)
        .ok_or_else(|| ResolveError::protocol(NAME, format!("unparseable size {}", info.size)))?;
    let mut file = File::new(NAME, url.clone(), info.filename, FileSize::Known(size));
    if let Some(hash) = info.hash.filter(|hash| !hash.trim().is_empty()) {
        let checksum = Checksum::from_hex(HashAlgorithm::Md5, &hash)
            .map_err(|e| ResolveError::protocol(NAME, format!("invalid MD5 '{hash}': {e}")))?;
        file = file.with_checksum(checksum);
    }
    Ok(file)
}

/// `https://rapidgator.net/file/<id>` for the link's second path segment.
fn normalized_url(url: &Url) -> Option<Url> {
    let segments = path_segments(url);
    let id = segments.get(1)?;
    Url::parse(&format!("https://rapidgator.net/file/{id}")).ok()
}

impl fmt::Debug for RapidgatorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RapidgatorProvider")
            .field("base_url", &self.base_url.as_str())
            .field("accounts", &self.accounts.len())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Provider for RapidgatorProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn resolver(&self) -> Option<&dyn Resolver> {
        Some(self)
    }

    fn accountant(&self) -> Option<&dyn Accountant> {
        Some(self)
    }

    fn configured(&mut self) -> Option<&mut dyn Configured> {
        Some(self)
    }
}

impl Configured for RapidgatorProvider {
    fn configure(&mut self, settings: &Settings) -> Result<(), ConfigureError> {
        self.accounts = AccountStore::from_records(NAME, settings.account_records(NAME))?;
        self.session.invalidate();
        Ok(())
    }
}

#[async_trait]
impl Resolver for RapidgatorProvider {
    fn can_resolve(&self, url: &Url) -> Resolvability {
        if host_matches(url, "rapidgator.net") {
            Resolvability::Single
        } else {
            Resolvability::Next
        }
    }

    #[tracing::instrument(skip(self, request), fields(url = %request.url()))]
    async fn resolve_one(&self, request: Request) -> Result<Settled, ResolveError> {
        let normalized = normalized_url(request.url());
        let is_file_link = path_segments(request.url()).first() == Some(&"file");
        let Some(file_url) = normalized.clone().filter(|_| is_file_link) else {
            let error = ResolveError::resolution_failed(
                NAME,
                request.url().as_str(),
                "URL does not point to a file",
            );
            return Ok(request.errs(normalized, error));
        };

        debug!(file_url = %file_url, "Looking up rapidgator file");
        let lookup = self
            .session
            .run(|| self.login(), |sid| {
                let file_url = &file_url;
                async move { self.file_info(&sid, file_url).await }
            })
            .await;

        Ok(match lookup {
            Ok(Lookup::Found(file)) => request.resolves_to(file),
            Ok(Lookup::Missing) => request.deadend(Some(file_url)),
            Err(error) => request.errs(Some(file_url), error),
        })
    }
}

#[async_trait]
impl Accountant for RapidgatorProvider {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::text("username", "Username (e-mail)"),
            Field::secret("password", "Password"),
        ]
    }

    async fn new_account(&self, prompter: &dyn Prompter) -> Result<AccountRecord, AccountError> {
        let mut answers: HashMap<String, String> = prompter.prompt(&self.fields())?;
        let account = RapidgatorAccount {
            username: required(&mut answers, "username")?,
            password: required(&mut answers, "password")?,
            premium: false,
            expires_at: None,
        };
        let data = serde_json::to_value(&account).map_err(|e| AccountError::Validation {
            provider: NAME.to_string(),
            reason: e.to_string(),
        })?;
        Ok(AccountRecord {
            provider: NAME.to_string(),
            id: account.username,
            data,
        })
    }
}
