//! Byte transfer for resolved files.
//!
//! A [`Transport`] executes the [`FetchRequest`](crate::retrieve::FetchRequest)
//! chosen by the retrieval router, streaming the body to disk.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Incremental MD5/SHA-1/SHA-256 verification against hoster checksums
//! - Size verification when the hoster reported a size
//! - Duplicate filename handling (adds numeric suffix)
//!
//! # Example
//!
//! ```no_run
//! use hostfetch_core::{FetchRequest, File, FileSize, HttpSettings, Transport};
//! use std::path::Path;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("https://example.com/archive.zip")?;
//! let file = File::new("basic", url.clone(), "archive.zip", FileSize::Unknown);
//! let transport = Transport::new(&HttpSettings::default())?;
//! let outcome = transport
//!     .fetch(&FetchRequest::get(url), &file, Path::new("./downloads"))
//!     .await?;
//! println!("Downloaded: {}", outcome.path.display());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub(crate) mod filename;

pub use client::{DownloadOutcome, Transport};
pub use error::DownloadError;
