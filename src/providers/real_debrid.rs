//! real-debrid.com - premium link generator for other hosters.
//!
//! Real-debrid never resolves links itself. With a usable premium account it
//! outbids the origin hosters and turns their file URLs into direct
//! download links via the `unrestrict/link` endpoint.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::account::{
    Account, AccountError, AccountRecord, AccountStore, Accountant, Field, Prompter, required,
};
use crate::config::{HttpSettings, Settings};
use crate::http_client::{ClientBuildError, ClientOptions, build_http_client};
use crate::provider::{ConfigureError, Configured, Provider};
use crate::resolver::File;
use crate::resolver::utils::{endpoint, is_auth_rejected_status};
use crate::retrieve::{FetchRequest, RetrieveError, Retriever};

const NAME: &str = "real-debrid.com";
const DEFAULT_BASE: &str = "https://api.real-debrid.com/rest/1.0";
const RETRIEVE_WEIGHT: u32 = 500;

/// Stored real-debrid.com account.
#[derive(Clone, Serialize, Deserialize)]
pub struct RealDebridAccount {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub premium: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub api_token: String,
}

impl fmt::Debug for RealDebridAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealDebridAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("points", &self.points)
            .field("premium", &self.premium)
            .field("expires_at", &self.expires_at)
            .field("api_token", &"[REDACTED]")
            .finish()
    }
}

impl Account for RealDebridAccount {
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
struct UserResponse {
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    points: i64,
    #[serde(rename = "type", default)]
    kind: String,
    /// Remaining premium time in seconds.
    #[serde(default)]
    premium: i64,
}

#[derive(Debug, Deserialize)]
struct UnrestrictResponse {
    download: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    error: String,
    error_code: i64,
}

/// Human-readable message for a real-debrid API error code.
#[must_use]
pub(crate) fn error_message(code: i64) -> &'static str {
    match code {
        -1 => "internal error",
        1 => "missing parameter",
        2 => "bad parameter value",
        3 => "unknown method",
        4 => "method not allowed",
        5 => "slow down",
        6 => "resource unreachable",
        7 => "resource not found",
        8 => "bad token",
        9 => "permission denied",
        10 => "two-factor authentication needed",
        11 => "two-factor authentication pending",
        12 => "invalid login",
        13 => "invalid password",
        14 => "account locked",
        15 => "account not activated",
        16 => "unsupported hoster",
        17 => "hoster in maintenance",
        18 => "hoster limit reached",
        19 => "hoster temporarily unavailable",
        20 => "hoster not available for free users",
        21 => "too many active downloads",
        22 => "ip address not allowed",
        23 => "traffic exhausted",
        24 => "file unavailable",
        25 => "service unavailable",
        26 => "upload too big",
        27 => "upload error",
        28 => "file not allowed",
        29 => "torrent too big",
        30 => "torrent file invalid",
        31 => "action already done",
        32 => "image resolution error",
        _ => "unknown error",
    }
}

/// Accountant and cross-hoster retriever for real-debrid.com.
pub struct RealDebridProvider {
    client: Client,
    base_url: Url,
    accounts: AccountStore<RealDebridAccount>,
}

impl RealDebridProvider {
    /// Creates the provider against the public REST API.
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
            accounts: AccountStore::default(),
        })
    }

    async fn unrestrict(&self, token: &str, link: &Url) -> Result<Url, RetrieveError> {
        let url = endpoint(&self.base_url, "unrestrict/link");
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(token)
            .form(&[("link", link.as_str())])
            .send()
            .await
            .map_err(|e| RetrieveError::network(NAME, url.as_str(), &e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RetrieveError::network(NAME, url.as_str(), &e))?;

        if status.is_success() {
            let unrestricted: UnrestrictResponse = serde_json::from_str(&body)
                .map_err(|e| RetrieveError::protocol(NAME, format!("unrestrict response: {e}")))?;
            return Url::parse(&unrestricted.download).map_err(|e| {
                RetrieveError::protocol(NAME, format!("bad download URL '{}': {e}", unrestricted.download))
            });
        }

        let api_error = serde_json::from_str::<ApiError>(&body).ok();
        if is_auth_rejected_status(status.as_u16()) {
            let reason = api_error.map_or_else(
                || format!("HTTP {}", status.as_u16()),
                |e| error_message(e.error_code).to_string(),
            );
            return Err(RetrieveError::rejected(NAME, reason));
        }
        match api_error {
            Some(api_error) => {
                debug!(code = api_error.error_code, error = %api_error.error, "real-debrid API error");
                Err(RetrieveError::api(
                    NAME,
                    api_error.error_code,
                    error_message(api_error.error_code),
                ))
            }
            None => Err(RetrieveError::http(NAME, url.as_str(), status.as_u16())),
        }
    }

    async fn fetch_user(&self, token: &str) -> Result<UserResponse, AccountError> {
        let validation = |reason: String| AccountError::Validation {
            provider: NAME.to_string(),
            reason,
        };
        let url = endpoint(&self.base_url, "user");
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| validation(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(validation(format!("HTTP {status}")));
        }
        response
            .json::<UserResponse>()
            .await
            .map_err(|e| validation(format!("unexpected user response: {e}")))
    }
}

impl fmt::Debug for RealDebridProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealDebridProvider")
            .field("base_url", &self.base_url.as_str())
            .field("accounts", &self.accounts.len())
            .finish_non_exhaustive()
    }
}

impl Provider for RealDebridProvider {
    fn name(&self) -> &str {
        NAME
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

impl Configured for RealDebridProvider {
    fn configure(&mut self, settings: &Settings) -> Result<(), ConfigureError> {
        self.accounts = AccountStore::from_records(NAME, settings.account_records(NAME))?;
        Ok(())
    }
}

#[async_trait]
impl Retriever for RealDebridProvider {
    fn can_retrieve(&self, file: &File) -> u32 {
        // Generic links have nothing to unrestrict.
        if matches!(file.origin(), NAME | "basic") {
            return 0;
        }
        if self.accounts.select_premium(Utc::now()).is_some() {
            RETRIEVE_WEIGHT
        } else {
            0
        }
    }

    #[tracing::instrument(skip(self, file), fields(file = file.name(), origin = file.origin()))]
    async fn retrieve(&self, file: &File) -> Result<FetchRequest, RetrieveError> {
        let account = self
            .accounts
            .select_premium(Utc::now())
            .ok_or_else(|| RetrieveError::no_usable_account(NAME))?;
        let download = self.unrestrict(&account.api_token, file.url()).await?;
        debug!(account = %account.username, "Unrestricted link");
        Ok(FetchRequest::get(download))
    }
}

#[async_trait]
impl Accountant for RealDebridProvider {
    fn fields(&self) -> Vec<Field> {
        vec![Field::secret(
            "api_token",
            "API token (from https://real-debrid.com/apitoken)",
        )]
    }

    async fn new_account(&self, prompter: &dyn Prompter) -> Result<AccountRecord, AccountError> {
        let mut answers = prompter.prompt(&self.fields())?;
        let api_token = required(&mut answers, "api_token")?;
        let user = self.fetch_user(&api_token).await?;

        let account = RealDebridAccount {
            username: user.username,
            email: user.email,
            points: user.points,
            premium: user.kind == "premium",
            expires_at: chrono::Duration::try_seconds(user.premium).map(|left| Utc::now() + left),
            api_token,
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
