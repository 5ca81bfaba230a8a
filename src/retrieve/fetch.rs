//! Description of the HTTP request that fetches a file's bytes.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Method;
use url::Url;

/// One request header. Sensitive values are redacted from `Debug` output
/// and marked sensitive when sent.
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
    pub sensitive: bool,
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = if self.sensitive {
            "[REDACTED]"
        } else {
            self.value.as_str()
        };
        write!(f, "{}: {value}", self.name)
    }
}

/// Method, URL and headers for the byte transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    method: Method,
    url: Url,
    headers: Vec<Header>,
}

impl FetchRequest {
    /// A plain `GET` of `url`.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header {
            name: name.into(),
            value: value.into(),
            sensitive: false,
        });
        self
    }

    #[must_use]
    pub fn with_basic_auth(self, username: &str, password: &str) -> Self {
        let encoded = BASE64.encode(format!("{username}:{password}"));
        self.with_sensitive_header("Authorization", format!("Basic {encoded}"))
    }

    #[must_use]
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_sensitive_header("Authorization", format!("Bearer {token}"))
    }

    #[must_use]
    pub fn with_cookie(self, name: &str, value: &str) -> Self {
        self.with_sensitive_header("Cookie", format!("{name}={value}"))
    }

    fn with_sensitive_header(mut self, name: &str, value: String) -> Self {
        self.headers.push(Header {
            name: name.to_string(),
            value,
            sensitive: true,
        });
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Returns the first header value named `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }
}
