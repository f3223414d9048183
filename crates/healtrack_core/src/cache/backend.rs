//! Cache storage and network fetch contracts with production impls.
//!
//! # Responsibility
//! - Define the named-cache storage contract the proxy owns.
//! - Define the fetcher contract and its blocking `ureq` implementation.
//!
//! # Invariants
//! - Cached entries are addressed by `(cache_name, url)`; URLs never collide
//!   across cache names.
//! - Backends are safe to share across threads behind `Arc`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Read;
use std::path::PathBuf;

/// One cacheable response, as fetched from the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// True when the fetch was answered from a different URL than requested.
    pub redirected: bool,
}

impl CachedResponse {
    /// A valid direct response: 2xx and not redirected. Only these are
    /// eligible for the cache-first store step.
    pub fn is_direct_success(&self) -> bool {
        (200..300).contains(&self.status) && !self.redirected
    }
}

/// Storage-level cache failures.
#[derive(Debug)]
pub enum CacheError {
    Io(std::io::Error),
    /// A cached entry exists but cannot be decoded.
    InvalidEntry(String),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::InvalidEntry(message) => write!(f, "invalid cache entry: {message}"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::InvalidEntry(_) => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Named-cache storage contract.
///
/// Only the proxy may open, write or delete named caches.
pub trait CacheStorage: Send + Sync {
    fn get(&self, cache_name: &str, url: &str) -> Result<Option<CachedResponse>, CacheError>;
    fn put(&self, cache_name: &str, response: &CachedResponse) -> Result<(), CacheError>;
    fn cache_names(&self) -> Result<Vec<String>, CacheError>;
    fn delete_cache(&self, cache_name: &str) -> Result<(), CacheError>;
}

/// Network failures from a fetcher.
#[derive(Debug)]
pub enum FetchError {
    /// Transport-level failure; the request never produced a response.
    Network(String),
    /// The URL could not be parsed or resolved.
    BadUrl(String),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(message) => write!(f, "network fetch failed: {message}"),
            Self::BadUrl(url) => write!(f, "invalid request url: {url}"),
        }
    }
}

impl Error for FetchError {}

/// Outbound fetch contract, injectable so tests observe network traffic.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<CachedResponse, FetchError>;
}

/// Disk-backed named caches.
///
/// Layout: `root/<cache_name>/<sha256(url)>.json`, one serialized
/// [`CachedResponse`] per file. The digest keeps entry names stable and
/// filesystem-safe regardless of URL shape.
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, cache_name: &str, url: &str) -> PathBuf {
        self.root
            .join(cache_name)
            .join(format!("{}.json", url_digest(url)))
    }
}

impl CacheStorage for DiskCacheStorage {
    fn get(&self, cache_name: &str, url: &str) -> Result<Option<CachedResponse>, CacheError> {
        let path = self.entry_path(cache_name, url);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let response = serde_json::from_str(&raw).map_err(|err| {
            CacheError::InvalidEntry(format!("{}: {err}", path.display()))
        })?;
        Ok(Some(response))
    }

    fn put(&self, cache_name: &str, response: &CachedResponse) -> Result<(), CacheError> {
        let dir = self.root.join(cache_name);
        std::fs::create_dir_all(&dir)?;
        let raw = serde_json::to_string(response)
            .map_err(|err| CacheError::InvalidEntry(err.to_string()))?;
        std::fs::write(self.entry_path(cache_name, &response.url), raw)?;
        Ok(())
    }

    fn cache_names(&self) -> Result<Vec<String>, CacheError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete_cache(&self, cache_name: &str) -> Result<(), CacheError> {
        let dir = self.root.join(cache_name);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn url_digest(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Blocking fetcher over a shared `ureq` agent.
pub struct UreqFetcher {
    agent: ureq::Agent,
}

impl UreqFetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new(),
        }
    }
}

impl Default for UreqFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for UreqFetcher {
    fn fetch(&self, url: &str) -> Result<CachedResponse, FetchError> {
        // 4xx/5xx still carry a response the routing policy may return;
        // only transport failures count as fetch errors.
        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => return Err(FetchError::Network(err.to_string())),
        };

        let redirected = response.get_url() != url;
        let status = response.status();
        let content_type = Some(response.content_type().to_string());

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|err| FetchError::Network(err.to_string()))?;

        Ok(CachedResponse {
            url: url.to_string(),
            status,
            content_type,
            body,
            redirected,
        })
    }
}
