//! Resolved file value objects: size sentinels and checksums.

use std::fmt;

use sha2::digest::DynDigest;
use url::Url;

/// Size of a resolved file.
///
/// Hosters either report a byte count or nothing at all; a few APIs also
/// report a file as offline while still returning a record for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSize {
    /// Exact size in bytes.
    Known(u64),
    /// The hoster did not report a size.
    Unknown,
    /// The hoster reported the file as offline.
    Offline,
}

impl FileSize {
    /// Returns the byte count when known.
    #[must_use]
    pub fn bytes(self) -> Option<u64> {
        match self {
            Self::Known(bytes) => Some(bytes),
            Self::Unknown | Self::Offline => None,
        }
    }
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(bytes) => write!(f, "{bytes} bytes"),
            Self::Unknown => f.write_str("unknown size"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// Digest algorithms reported by hoster APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Returns the conventional algorithm name (e.g. `"MD5"`).
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }

    /// Digest length in bytes.
    #[must_use]
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// Creates a fresh incremental hasher for this algorithm.
    #[must_use]
    pub fn hasher(self) -> Box<dyn DynDigest + Send> {
        match self {
            Self::Md5 => Box::new(md5::Md5::default()),
            Self::Sha1 => Box::new(sha1::Sha1::default()),
            Self::Sha256 => Box::new(sha2::Sha256::default()),
        }
    }
}

/// Expected digest of a file as reported by its hoster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl Checksum {
    /// Creates a checksum from raw digest bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, digest: Vec<u8>) -> Self {
        Self { algorithm, digest }
    }

    /// Parses a hex digest, rejecting values of the wrong length for `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns [`hex::FromHexError`] if `value` is not valid hex or has the wrong length.
    pub fn from_hex(algorithm: HashAlgorithm, value: &str) -> Result<Self, hex::FromHexError> {
        let digest = hex::decode(value.trim())?;
        if digest.len() != algorithm.digest_len() {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        Ok(Self { algorithm, digest })
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Lowercase hex rendering of the digest.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.digest)
    }

    /// Creates an incremental hasher able to verify this checksum.
    #[must_use]
    pub fn hasher(&self) -> Box<dyn DynDigest + Send> {
        self.algorithm.hasher()
    }

    /// Returns true if `computed` equals the expected digest.
    #[must_use]
    pub fn matches(&self, computed: &[u8]) -> bool {
        self.digest == computed
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.name(), self.to_hex())
    }
}

/// A concrete, retrievable file produced by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    name: String,
    size: FileSize,
    origin: String,
    url: Url,
    checksum: Option<Checksum>,
}

impl File {
    /// Creates a file resolved by the provider named `origin`.
    #[must_use]
    pub fn new(origin: impl Into<String>, url: Url, name: impl Into<String>, size: FileSize) -> Self {
        Self {
            name: name.into(),
            size,
            origin: origin.into(),
            url,
            checksum: None,
        }
    }

    /// Attaches the hoster-reported checksum.
    #[must_use]
    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = Some(checksum);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn size(&self) -> FileSize {
        self.size
    }

    /// Name of the provider that resolved this file.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Canonical URL of the file on its hoster.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn checksum(&self) -> Option<&Checksum> {
        self.checksum.as_ref()
    }
}
