//! Versioned cache manifest.
//!
//! # Responsibility
//! - Name the eagerly cached URL set for one deployed version.
//! - Derive the version-scoped cache name that owns those entries.
//!
//! # Invariants
//! - The cache name embeds the version token; two versions never share a
//!   cache name.

const CACHE_NAME_PREFIX: &str = "healtrack";

/// The named, versioned set of URLs cached eagerly at install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheManifest {
    version: String,
    urls: Vec<String>,
    offline_fallback: Option<String>,
}

impl CacheManifest {
    /// Creates a manifest for one deployed version.
    pub fn new(version: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            version: version.into(),
            urls,
            offline_fallback: None,
        }
    }

    /// Configures the offline fallback resource.
    ///
    /// The fallback is added to the eager install set so it is guaranteed to
    /// be servable from cache when the network is down.
    pub fn with_offline_fallback(mut self, url: impl Into<String>) -> Self {
        self.offline_fallback = Some(url.into());
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Cache name owned by this version, e.g. `healtrack-v2`.
    pub fn cache_name(&self) -> String {
        format!("{CACHE_NAME_PREFIX}-{}", self.version)
    }

    pub fn offline_fallback(&self) -> Option<&str> {
        self.offline_fallback.as_deref()
    }

    /// URLs fetched at install: the manifest set plus the offline fallback.
    pub fn install_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self.urls.iter().map(String::as_str).collect();
        if let Some(fallback) = self.offline_fallback.as_deref() {
            if !urls.contains(&fallback) {
                urls.push(fallback);
            }
        }
        urls
    }
}
