//! uploaded.net - folder scraping, batch file checks and premium retrieval.
//!
//! Folder links (`/f/`, `/folder/`) are expanded one at a time by scraping
//! the file list. File links are checked in batches through the
//! `filemultiple` API, which needs an API key from the config file.
//! Retrieval requires a premium account: the `login` cookie is cached as the
//! session token and the file page is asked for its download location.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use reqwest::header::{COOKIE, LOCATION};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::{body_text, send};
use crate::account::{
    Account, AccountError, AccountRecord, AccountStore, Accountant, Field, Prompter, required,
};
use crate::config::{HttpSettings, Settings};
use crate::http_client::{ClientBuildError, ClientOptions, build_http_client};
use crate::provider::{ConfigureError, Configured, Provider};
use crate::resolver::utils::{
    absolutize_url, compile_static_regex, endpoint, first_capture, host_matches,
    is_auth_rejected_status, path_segments, rebase,
};
use crate::resolver::{
    Checksum, File, FileSize, HashAlgorithm, Request, ResolveError, Resolvability, Resolver,
    Settled,
};
use crate::retrieve::{FetchRequest, RetrieveError, Retriever};
use crate::session::{Attempt, Session, SessionCache};

const NAME: &str = "uploaded.net";
const DEFAULT_BASE: &str = "https://uploaded.net";
const API_KEY_OPTION: &str = "api_key";
const LOGIN_COOKIE: &str = "login";
const LOGIN_TTL: Duration = Duration::from_secs(6 * 60 * 60);
const RETRIEVE_WEIGHT: u32 = 100;

static FILE_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"(?i)id\s*=\s*["']fileList["']"#));
static ROW_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"(?i)<tr\b[^>]*\bid\s*=\s*["']([^"']+)["']"#));
static DOWNLOAD_FORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)id\s*=\s*["']download["'][^>]*>.*?<form\b[^>]*\baction\s*=\s*["']([^"']*)["']"#,
    )
});
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)id\s*=\s*["']chMail["'][^>]*\bvalue\s*=\s*["']([^"']+)["']"#)
});
static ACCOUNT_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)href\s*=\s*["']register["'][^>]*>\s*<[^>]+>\s*([^<]+)<"#)
});
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)(\d+) weeks? (\d+) days? and (\d+) hours?")
});

/// Stored uploaded.net credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct UploadedAccount {
    pub id: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub premium: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub login_cookie: Option<String>,
}

impl fmt::Debug for UploadedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedAccount")
            .field("id", &self.id)
            .field("password", &"[REDACTED]")
            .field("email", &self.email)
            .field("premium", &self.premium)
            .field("expires_at", &self.expires_at)
            .field("login_cookie", &self.login_cookie.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Account for UploadedAccount {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_premium(&self) -> bool {
        self.premium
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

/// One line of the `filemultiple` CSV answer: `status,id,size,sha1,name`.
#[derive(Debug, PartialEq, Eq)]
struct Row<'a> {
    status: &'a str,
    id: &'a str,
    size: &'a str,
    sha1: &'a str,
    name: &'a str,
}

/// Resolver, retriever and accountant for uploaded.net.
pub struct UploadedProvider {
    client: Client,
    page_client: Client,
    base_url: Url,
    page_base: Option<Url>,
    api_key: Option<String>,
    accounts: AccountStore<UploadedAccount>,
    session: SessionCache,
}

impl UploadedProvider {
    /// Creates the provider against the public site.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] if an HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, ClientBuildError> {
        let base_url = Url::parse(DEFAULT_BASE).map_err(|e| ClientBuildError {
            component: NAME.to_string(),
            reason: e.to_string(),
        })?;
        Self::build(settings, base_url, None)
    }

    /// Creates the provider with API calls and page fetches sent to
    /// `base_url` (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] if an HTTP client cannot be built.
    pub fn with_base_url(settings: &HttpSettings, base_url: Url) -> Result<Self, ClientBuildError> {
        Self::build(settings, base_url.clone(), Some(base_url))
    }

    fn build(
        settings: &HttpSettings,
        base_url: Url,
        page_base: Option<Url>,
    ) -> Result<Self, ClientBuildError> {
        let page_options = ClientOptions {
            no_redirects: true,
            ..ClientOptions::default()
        };
        Ok(Self {
            client: build_http_client(NAME, settings, ClientOptions::default())?,
            page_client: build_http_client(NAME, settings, page_options)?,
            base_url,
            page_base,
            api_key: None,
            accounts: AccountStore::default(),
            session: SessionCache::new(NAME),
        })
    }

    fn page_url(&self, url: &Url) -> Url {
        self.page_base
            .as_ref()
            .map_or_else(|| url.clone(), |base| rebase(url, base))
    }

    async fn resolve_folder(&self, folder: &Url) -> Result<Vec<Url>, ResolveError> {
        let page = self.page_url(folder);
        let response = send(NAME, &page, self.client.get(page.clone())).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::http(NAME, folder.as_str(), status.as_u16()));
        }
        let html = body_text(NAME, &page, response).await?;
        let ids = folder_file_ids(&html)
            .ok_or_else(|| ResolveError::protocol(NAME, "folder page has no file list"))?;
        debug!(folder = %folder, files = ids.len(), "Expanded uploaded.net folder");
        Ok(ids.iter().filter_map(|id| canonical_url(id)).collect())
    }

    async fn check_files(&self, ids: &[&str]) -> Result<String, ResolveError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ResolveError::missing_configuration(NAME, API_KEY_OPTION))?;
        let mut form = vec![("apikey".to_string(), api_key.to_string())];
        form.extend(
            ids.iter()
                .enumerate()
                .map(|(i, id)| (format!("id_{i}"), (*id).to_string())),
        );

        let url = endpoint(&self.base_url, "api/filemultiple");
        let response = send(NAME, &url, self.client.post(url.clone()).form(&form)).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::http(NAME, url.as_str(), status.as_u16()));
        }
        body_text(NAME, &url, response).await
    }

    async fn login(&self, account: &UploadedAccount) -> Result<Session, RetrieveError> {
        if self.session.refresh_count() == 0
            && let Some(cookie) = account.login_cookie.as_deref().filter(|c| !c.is_empty())
        {
            debug!(account = %account.id, "Using stored login cookie");
            return Ok(Session::new(cookie, LOGIN_TTL));
        }
        let cookie = post_login(&self.client, &self.base_url, &account.id, &account.password)
            .await
            .map_err(|e| {
                RetrieveError::network(NAME, endpoint(&self.base_url, "io/login").as_str(), &e)
            })?
            .ok_or_else(|| RetrieveError::rejected(NAME, "login cookie missing; credentials refused"))?;
        Ok(Session::new(cookie, LOGIN_TTL))
    }

    async fn download_request(
        &self,
        cookie: &str,
        page: &Url,
    ) -> Result<Attempt<FetchRequest>, RetrieveError> {
        let response = self
            .page_client
            .get(page.clone())
            .header(COOKIE, format!("{LOGIN_COOKIE}={cookie}"))
            .send()
            .await
            .map_err(|e| RetrieveError::network(NAME, page.as_str(), &e))?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| absolutize_url(value, page))
                .ok_or_else(|| RetrieveError::protocol(NAME, "redirect without a usable Location"))?;
            debug!(location = %location, "File page redirected to download");
            return Ok(Attempt::Done(
                FetchRequest::get(location).with_cookie(LOGIN_COOKIE, cookie),
            ));
        }
        if is_auth_rejected_status(status.as_u16()) {
            return Ok(Attempt::Rejected);
        }
        if !status.is_success() {
            return Err(RetrieveError::http(NAME, page.as_str(), status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| RetrieveError::network(NAME, page.as_str(), &e))?;
        let action = first_capture(&html, &DOWNLOAD_FORM_RE)
            .ok_or_else(|| RetrieveError::protocol(NAME, "download form not found on file page"))?;
        if action == "register" {
            return Err(RetrieveError::rejected(NAME, "premium account expired"));
        }
        let target = absolutize_url(&action, page)
            .ok_or_else(|| RetrieveError::protocol(NAME, format!("bad download action '{action}'")))?;
        Ok(Attempt::Done(
            FetchRequest::get(target).with_cookie(LOGIN_COOKIE, cookie),
        ))
    }

    async fn fill_account_info(&self, account: &mut UploadedAccount, cookie: &str) {
        let page = self.base_url.clone();
        let html = match self
            .client
            .get(page.clone())
            .header(COOKIE, format!("{LOGIN_COOKIE}={cookie}"))
            .send()
            .await
        {
            Ok(response) => response.text().await.unwrap_or_default(),
            Err(error) => {
                warn!(error = %error, "Could not load uploaded.net account page");
                return;
            }
        };
        account.email = first_capture(&html, &EMAIL_RE);
        account.premium = first_capture(&html, &ACCOUNT_TYPE_RE).as_deref() == Some("Premium");
        account.expires_at = parse_remaining(&html).map(|remaining| Utc::now() + remaining);
    }
}

/// Posts credentials and returns the `login` cookie, if the hoster set one.
async fn post_login(
    client: &Client,
    base_url: &Url,
    id: &str,
    password: &str,
) -> Result<Option<String>, reqwest::Error> {
    let url = endpoint(base_url, "io/login");
    let response = client
        .post(url)
        .form(&[("id", id), ("pw", password)])
        .send()
        .await?;
    Ok(response
        .cookies()
        .find(|cookie| cookie.name() == LOGIN_COOKIE)
        .map(|cookie| cookie.value().to_string()))
}

/// Ids of the rows in a folder page's file list, or `None` without a list.
fn folder_file_ids(html: &str) -> Option<Vec<String>> {
    let start = FILE_LIST_RE.find(html)?;
    let rest = &html[start.end()..];
    let list = rest.find("</table>").map_or(rest, |end| &rest[..end]);
    Some(
        ROW_ID_RE
            .captures_iter(list)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect(),
    )
}

fn parse_rows(body: &str) -> Vec<Row<'_>> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut fields = line.splitn(5, ',').map(str::trim);
            Row {
                status: fields.next().unwrap_or_default(),
                id: fields.next().unwrap_or_default(),
                size: fields.next().unwrap_or_default(),
                sha1: fields.next().unwrap_or_default(),
                name: fields.next().unwrap_or_default(),
            }
        })
        .collect()
}

fn parse_remaining(html: &str) -> Option<chrono::Duration> {
    let caps = DURATION_RE.captures(html)?;
    let number = |i: usize| caps.get(i)?.as_str().parse::<i64>().ok();
    let hours = number(3)? + (number(2)? + number(1)? * 7) * 24;
    chrono::Duration::try_hours(hours)
}

fn file_id(url: &Url) -> Option<String> {
    let segments = path_segments(url);
    let id = match segments.as_slice() {
        ["file", id, ..] => *id,
        [id, ..] if host_matches(url, "ul.to") => *id,
        _ => return None,
    };
    Some(id.to_string())
}

fn canonical_url(id: &str) -> Option<Url> {
    Url::parse(&format!("https://uploaded.net/file/{id}")).ok()
}

fn is_folder(url: &Url) -> bool {
    host_matches(url, "uploaded.net")
        && (url.path().starts_with("/f/") || url.path().starts_with("/folder/"))
}

fn settle_row(request: Request, canonical: Url, row: &Row<'_>) -> Settled {
    match row.status {
        "offline" => request.deadend(Some(canonical)),
        "online" => {
            let Ok(size) = row.size.parse::<u64>() else {
                let error = ResolveError::protocol(NAME, format!("bad size '{}'", row.size));
                return request.errs(Some(canonical), error);
            };
            let mut file = File::new(NAME, canonical.clone(), row.name, FileSize::Known(size));
            if !row.sha1.is_empty() {
                match Checksum::from_hex(HashAlgorithm::Sha1, row.sha1) {
                    Ok(checksum) => file = file.with_checksum(checksum),
                    Err(e) => {
                        let error = ResolveError::protocol(NAME, format!("bad SHA-1: {e}"));
                        return request.errs(Some(canonical), error);
                    }
                }
            }
            request.resolves_to(file)
        }
        other => {
            let error = ResolveError::resolution_failed(
                NAME,
                canonical.as_str(),
                &format!("unknown file status '{other}'"),
            );
            request.errs(Some(canonical), error)
        }
    }
}

impl fmt::Debug for UploadedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedProvider")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("accounts", &self.accounts.len())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Provider for UploadedProvider {
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

impl Configured for UploadedProvider {
    fn configure(&mut self, settings: &Settings) -> Result<(), ConfigureError> {
        self.accounts = AccountStore::from_records(NAME, settings.account_records(NAME))?;
        self.api_key = settings
            .provider_option(NAME, API_KEY_OPTION)
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);
        self.session.invalidate();
        Ok(())
    }
}

#[async_trait]
impl Resolver for UploadedProvider {
    fn can_resolve(&self, url: &Url) -> Resolvability {
        if is_folder(url) {
            return Resolvability::Single;
        }
        let uploaded_file = host_matches(url, "uploaded.net") && !url.path().starts_with("/dl/");
        if uploaded_file || host_matches(url, "uploaded.to") || host_matches(url, "ul.to") {
            Resolvability::Multi
        } else {
            Resolvability::Next
        }
    }

    #[tracing::instrument(skip(self, request), fields(url = %request.url()))]
    async fn resolve_one(&self, request: Request) -> Result<Settled, ResolveError> {
        if !is_folder(request.url()) {
            let error = ResolveError::resolution_failed(
                NAME,
                request.url().as_str(),
                "only folder links are resolved one at a time",
            );
            return Ok(request.errs(None, error));
        }
        Ok(match self.resolve_folder(request.url()).await {
            Ok(urls) => request.bundles(urls),
            Err(error) => request.errs(None, error),
        })
    }

    #[tracing::instrument(skip(self, requests), fields(count = requests.len()))]
    async fn resolve_many(&self, requests: Vec<Request>) -> Result<Vec<Settled>, ResolveError> {
        let ids: Vec<Option<String>> = requests.iter().map(|r| file_id(r.url())).collect();
        let wanted: Vec<&str> = ids.iter().flatten().map(String::as_str).collect();
        let body = if wanted.is_empty() {
            String::new()
        } else {
            self.check_files(&wanted).await?
        };
        let rows: HashMap<&str, Row<'_>> = parse_rows(&body)
            .into_iter()
            .map(|row| (row.id, row))
            .collect();

        Ok(requests
            .into_iter()
            .zip(ids)
            .map(|(request, id)| {
                let Some((id, canonical)) = id.and_then(|id| canonical_url(&id).map(|u| (id, u)))
                else {
                    let error = ResolveError::resolution_failed(
                        NAME,
                        request.url().as_str(),
                        "cannot extract a file id from the URL",
                    );
                    return request.errs(None, error);
                };
                match rows.get(id.as_str()) {
                    Some(row) => settle_row(request, canonical, row),
                    None => {
                        let error = ResolveError::protocol(NAME, format!("no status for file {id}"));
                        request.errs(Some(canonical), error)
                    }
                }
            })
            .collect())
    }
}

#[async_trait]
impl Retriever for UploadedProvider {
    fn can_retrieve(&self, file: &File) -> u32 {
        if self.can_resolve(file.url()) == Resolvability::Multi {
            RETRIEVE_WEIGHT
        } else {
            0
        }
    }

    #[tracing::instrument(skip(self, file), fields(file = file.name()))]
    async fn retrieve(&self, file: &File) -> Result<FetchRequest, RetrieveError> {
        let account = self
            .accounts
            .select_premium(Utc::now())
            .ok_or_else(|| RetrieveError::no_usable_account(NAME))?;
        let page = self.page_url(file.url());
        self.session
            .run(|| self.login(account), |cookie| {
                let page = &page;
                async move { self.download_request(&cookie, page).await }
            })
            .await
    }
}

#[async_trait]
impl Accountant for UploadedProvider {
    fn fields(&self) -> Vec<Field> {
        vec![Field::text("id", "Account ID"), Field::secret("password", "Password")]
    }

    async fn new_account(&self, prompter: &dyn Prompter) -> Result<AccountRecord, AccountError> {
        let mut answers = prompter.prompt(&self.fields())?;
        let id = required(&mut answers, "id")?;
        let password = required(&mut answers, "password")?;

        let validation = |reason: String| AccountError::Validation {
            provider: NAME.to_string(),
            reason,
        };
        let cookie = post_login(&self.client, &self.base_url, &id, &password)
            .await
            .map_err(|e| validation(e.to_string()))?
            .ok_or_else(|| validation("no login cookie in response".to_string()))?;

        let mut account = UploadedAccount {
            id,
            password,
            email: None,
            premium: false,
            expires_at: None,
            login_cookie: Some(cookie.clone()),
        };
        self.fill_account_info(&mut account, &cookie).await;

        let data = serde_json::to_value(&account).map_err(|e| validation(e.to_string()))?;
        Ok(AccountRecord {
            provider: NAME.to_string(),
            id: account.id,
            data,
        })
    }
}
