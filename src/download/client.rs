//! Streaming transport that executes fetch requests.
//!
//! The transport owns one shared `reqwest` client, streams the response body
//! to the output directory, feeds every chunk to the file's incremental
//! hasher and verifies checksum and size before reporting success. Partial
//! or unverified files are removed.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use reqwest::header::{HeaderName, HeaderValue};
use sha2::digest::DynDigest;
use tokio::fs::File as OutputFile;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use super::error::DownloadError;
use super::filename::{name_from_url, parse_content_disposition, resolve_unique_path};
use crate::config::HttpSettings;
use crate::http_client::{ClientBuildError, ClientOptions, build_http_client};
use crate::resolver::File;
use crate::retrieve::FetchRequest;

const BAR_TEMPLATE: &str =
    "{msg:30!} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:30!} {bytes} {bytes_per_sec}";

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Final output path.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
    /// Algorithm of the verified checksum, when the hoster reported one.
    pub verified_with: Option<&'static str>,
}

/// Executes [`FetchRequest`]s.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    show_progress: bool,
}

impl Transport {
    /// Creates a transport using the shared client policy.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] when the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, ClientBuildError> {
        let client = build_http_client("transport", settings, ClientOptions::default())?;
        Ok(Self {
            client,
            show_progress: false,
        })
    }

    /// Enables an indicatif progress bar per transfer.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Downloads `file` into `output_dir` using `request`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on network, HTTP, IO or verification failure.
    /// The partial file is removed in every failure case.
    #[instrument(skip(self, request, file, output_dir), fields(file = file.name(), url = %request.url()))]
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        file: &File,
        output_dir: &Path,
    ) -> Result<DownloadOutcome, DownloadError> {
        let url = request.url().as_str();
        let response = self.send(request).await?;

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| DownloadError::io(output_dir, e))?;
        let name = if file.name().trim().is_empty() {
            response
                .headers()
                .get(reqwest::header::CONTENT_DISPOSITION)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_content_disposition)
                .unwrap_or_else(|| name_from_url(file.url()))
        } else {
            file.name().to_string()
        };
        let path = resolve_unique_path(output_dir, &name);
        debug!(path = %path.display(), "Resolved output path");

        let expected_bytes = file.size().bytes().or_else(|| response.content_length());
        let progress = self.progress_bar(&name, expected_bytes);

        let result = write_verified(response, file, url, &path, &progress).await;
        progress.finish_and_clear();

        match result {
            Ok(outcome) => {
                info!(path = %outcome.path.display(), bytes = outcome.bytes, "Download complete");
                Ok(outcome)
            }
            Err(error) => {
                debug!(path = %path.display(), "Removing partial file after error");
                let _ = tokio::fs::remove_file(&path).await;
                Err(error)
            }
        }
    }

    async fn send(&self, request: &FetchRequest) -> Result<reqwest::Response, DownloadError> {
        let url = request.url().as_str();
        let mut builder = self.client.request(request.method().clone(), url);
        for header in request.headers() {
            let invalid = || DownloadError::InvalidHeader {
                name: header.name.clone(),
                url: url.to_string(),
            };
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|_| invalid())?;
            let mut value = HeaderValue::from_str(&header.value).map_err(|_| invalid())?;
            value.set_sensitive(header.sensitive);
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;
        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }
        Ok(response)
    }

    fn progress_bar(&self, name: &str, total: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template(BAR_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=> "),
                );
                bar
            }
            None => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::with_template(SPINNER_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                spinner
            }
        };
        bar.set_message(name.to_string());
        bar
    }
}

async fn write_verified(
    response: reqwest::Response,
    file: &File,
    url: &str,
    path: &Path,
    progress: &ProgressBar,
) -> Result<DownloadOutcome, DownloadError> {
    let handle = OutputFile::create(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut writer = BufWriter::new(handle);
    let mut hasher: Option<Box<dyn DynDigest + Send>> =
        file.checksum().map(crate::resolver::Checksum::hasher);
    let mut stream = response.bytes_stream();
    let mut bytes: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::from_reqwest(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        if let Some(hasher) = hasher.as_mut() {
            hasher.update(&chunk);
        }
        bytes += chunk.len() as u64;
        progress.set_position(bytes);
    }
    writer.flush().await.map_err(|e| DownloadError::io(path, e))?;

    if let Some(expected_bytes) = file.size().bytes()
        && expected_bytes != bytes
    {
        return Err(DownloadError::SizeMismatch {
            path: path.to_path_buf(),
            expected_bytes,
            actual_bytes: bytes,
        });
    }

    let verified_with = match (file.checksum(), hasher) {
        (Some(checksum), Some(hasher)) => {
            let computed = hasher.finalize();
            if !checksum.matches(&computed) {
                return Err(DownloadError::ChecksumMismatch {
                    path: path.to_path_buf(),
                    algorithm: checksum.algorithm().name(),
                    expected: checksum.to_hex(),
                    actual: hex::encode(&computed),
                });
            }
            Some(checksum.algorithm().name())
        }
        _ => None,
    };

    Ok(DownloadOutcome {
        path: path.to_path_buf(),
        bytes,
        verified_with,
    })
}
