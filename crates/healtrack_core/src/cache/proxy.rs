//! Asset cache proxy lifecycle and routing policy.
//!
//! # Responsibility
//! - Drive the Installing -> Waiting -> Active -> Redundant lifecycle.
//! - Route intercepted GET requests cache-first or network-first per origin.
//!
//! # Invariants
//! - Install fetches the whole manifest or writes nothing.
//! - Activation purges every cache name that is not the current version's.
//! - The cache lookup for a request completes before any network fetch.

use crate::cache::backend::{CacheError, CacheStorage, CachedResponse, FetchError, Fetcher};
use crate::cache::manifest::CacheManifest;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};
use url::{Origin, Url};

/// Lifecycle states of one deployed proxy version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Registered; eager caching has not completed yet.
    Installing,
    /// Install succeeded; not yet routing requests. Callers activate
    /// immediately after install, so this stage is skipped in practice.
    Waiting,
    /// Routing requests; owns the current cache name.
    Active,
    /// Superseded by a newer version. Terminal.
    Redundant,
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Installing => "installing",
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Redundant => "redundant",
        };
        write!(f, "{name}")
    }
}

/// Failures fatal to one version's install.
#[derive(Debug)]
pub enum InstallError {
    /// A manifest URL could not be fetched as a valid direct response.
    ManifestFetch { url: String, reason: String },
    Storage(CacheError),
    /// Install attempted outside the `Installing` state.
    InvalidState(LifecycleState),
}

impl Display for InstallError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ManifestFetch { url, reason } => {
                write!(f, "manifest asset `{url}` unfetchable: {reason}")
            }
            Self::Storage(err) => write!(f, "cache storage failure during install: {err}"),
            Self::InvalidState(state) => {
                write!(f, "install is not valid in the `{state}` state")
            }
        }
    }
}

impl Error for InstallError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CacheError> for InstallError {
    fn from(value: CacheError) -> Self {
        Self::Storage(value)
    }
}

/// Failures fatal to one version's activation.
#[derive(Debug)]
pub enum ActivationError {
    /// Activation attempted before a successful install.
    NotInstalled(LifecycleState),
    Storage(CacheError),
}

impl Display for ActivationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInstalled(state) => {
                write!(f, "cannot activate from the `{state}` state")
            }
            Self::Storage(err) => write!(f, "cache storage failure during activation: {err}"),
        }
    }
}

impl Error for ActivationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::NotInstalled(_) => None,
        }
    }
}

impl From<CacheError> for ActivationError {
    fn from(value: CacheError) -> Self {
        Self::Storage(value)
    }
}

/// Failures of a single routed request.
#[derive(Debug)]
pub enum ProxyError {
    /// The proxy is not in the `Active` state.
    Inactive(LifecycleState),
    InvalidUrl(String),
    Cache(CacheError),
    /// Network failed and no cache entry or fallback could serve the URL.
    Unreachable { url: String, source: FetchError },
}

impl Display for ProxyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive(state) => write!(f, "proxy is not active (state: {state})"),
            Self::InvalidUrl(url) => write!(f, "request url cannot be parsed: {url}"),
            Self::Cache(err) => write!(f, "cache storage failure: {err}"),
            Self::Unreachable { url, source } => {
                write!(f, "`{url}` unreachable with no cached copy: {source}")
            }
        }
    }
}

impl Error for ProxyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Cache(err) => Some(err),
            Self::Unreachable { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<CacheError> for ProxyError {
    fn from(value: CacheError) -> Self {
        Self::Cache(value)
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedVia {
    Cache,
    Network,
    OfflineFallback,
}

/// Result of routing one intercepted request.
#[derive(Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Non-GET requests are not touched by the proxy.
    Passthrough,
    Served {
        response: CachedResponse,
        via: ServedVia,
    },
}

/// One deployed version of the asset cache proxy.
///
/// Independent of the persistence store; communicates only with its cache
/// storage and fetcher.
pub struct AssetCacheProxy {
    manifest: CacheManifest,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    app_origin: Origin,
    state: Mutex<LifecycleState>,
}

impl AssetCacheProxy {
    /// Registers a new proxy version in the `Installing` state.
    ///
    /// `app_origin` is any URL on the application's own origin; requests to
    /// other origins are treated as third-party and routed network-first.
    pub fn new(
        manifest: CacheManifest,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        app_origin: &str,
    ) -> Result<Self, ProxyError> {
        let origin = Url::parse(app_origin)
            .map_err(|_| ProxyError::InvalidUrl(app_origin.to_string()))?
            .origin();
        Ok(Self {
            manifest,
            storage,
            fetcher,
            app_origin: origin,
            state: Mutex::new(LifecycleState::Installing),
        })
    }

    pub fn state(&self) -> LifecycleState {
        *self.lock_state()
    }

    pub fn cache_name(&self) -> String {
        self.manifest.cache_name()
    }

    /// Eagerly caches every manifest URL, all-or-nothing.
    ///
    /// All fetches complete before any write, so a failed install leaves no
    /// partial cache population and the previous version keeps serving.
    pub fn install(&self) -> Result<(), InstallError> {
        {
            let state = self.lock_state();
            if *state != LifecycleState::Installing {
                return Err(InstallError::InvalidState(*state));
            }
        }

        let cache_name = self.manifest.cache_name();
        info!(
            "event=cache_install module=cache status=start cache={cache_name} urls={}",
            self.manifest.install_urls().len()
        );

        let mut fetched = Vec::new();
        for url in self.manifest.install_urls() {
            let response = match self.fetcher.fetch(url) {
                Ok(response) => response,
                Err(err) => {
                    warn!(
                        "event=cache_install module=cache status=error cache={cache_name} url={url} error={err}"
                    );
                    return Err(InstallError::ManifestFetch {
                        url: url.to_string(),
                        reason: err.to_string(),
                    });
                }
            };
            if !response.is_direct_success() {
                warn!(
                    "event=cache_install module=cache status=error cache={cache_name} url={url} http_status={}",
                    response.status
                );
                return Err(InstallError::ManifestFetch {
                    url: url.to_string(),
                    reason: format!("http status {}", response.status),
                });
            }
            fetched.push(response);
        }

        for response in &fetched {
            if let Err(err) = self.storage.put(&cache_name, response) {
                // Undo partial writes so the failed version leaves nothing
                // behind.
                let _ = self.storage.delete_cache(&cache_name);
                return Err(err.into());
            }
        }

        *self.lock_state() = LifecycleState::Waiting;
        info!(
            "event=cache_install module=cache status=ok cache={cache_name} cached={}",
            fetched.len()
        );
        Ok(())
    }

    /// Purges stale cache versions and starts routing through this version.
    ///
    /// Callers invoke this immediately after [`install`](Self::install);
    /// there is no waiting period for old contexts to close.
    pub fn activate(&self) -> Result<(), ActivationError> {
        {
            let state = self.lock_state();
            if *state != LifecycleState::Waiting {
                return Err(ActivationError::NotInstalled(*state));
            }
        }

        let current = self.manifest.cache_name();
        for name in self.storage.cache_names()? {
            if name != current {
                self.storage.delete_cache(&name)?;
                info!("event=cache_activate module=cache status=purged cache={name}");
            }
        }

        *self.lock_state() = LifecycleState::Active;
        info!("event=cache_activate module=cache status=ok cache={current}");
        Ok(())
    }

    /// Marks this version superseded. Terminal.
    pub fn retire(&self) {
        *self.lock_state() = LifecycleState::Redundant;
        info!(
            "event=cache_retire module=cache status=ok cache={}",
            self.manifest.cache_name()
        );
    }

    /// Routes one intercepted request.
    ///
    /// Non-GET requests pass through untouched. Same-origin GETs are served
    /// cache-first; third-party GETs network-first.
    pub fn handle_request(&self, method: &str, url: &str) -> Result<RouteOutcome, ProxyError> {
        {
            let state = self.lock_state();
            if *state != LifecycleState::Active {
                return Err(ProxyError::Inactive(*state));
            }
        }

        if !method.eq_ignore_ascii_case("GET") {
            return Ok(RouteOutcome::Passthrough);
        }

        let parsed = Url::parse(url).map_err(|_| ProxyError::InvalidUrl(url.to_string()))?;
        let outcome = if parsed.origin() == self.app_origin {
            self.cache_first(url)?
        } else {
            self.network_first(url)?
        };

        if let RouteOutcome::Served { via, .. } = &outcome {
            info!("event=route module=cache status=ok url={url} via={via:?}");
        }
        Ok(outcome)
    }

    /// Cache-first: cached entry wins; otherwise fetch, store valid direct
    /// responses, and fall back to the offline resource on total failure.
    fn cache_first(&self, url: &str) -> Result<RouteOutcome, ProxyError> {
        let cache_name = self.manifest.cache_name();
        if let Some(hit) = self.storage.get(&cache_name, url)? {
            return Ok(RouteOutcome::Served {
                response: hit,
                via: ServedVia::Cache,
            });
        }

        match self.fetcher.fetch(url) {
            Ok(response) => {
                if response.is_direct_success() {
                    self.store_clone(&cache_name, &response);
                }
                Ok(RouteOutcome::Served {
                    response,
                    via: ServedVia::Network,
                })
            }
            Err(err) => self.offline_fallback(url, err),
        }
    }

    /// Network-first: fetch wins and refreshes the cache; cached entry is
    /// the fallback; no entry means the request fails.
    fn network_first(&self, url: &str) -> Result<RouteOutcome, ProxyError> {
        let cache_name = self.manifest.cache_name();
        match self.fetcher.fetch(url) {
            Ok(response) => {
                if response.is_direct_success() {
                    self.store_clone(&cache_name, &response);
                }
                Ok(RouteOutcome::Served {
                    response,
                    via: ServedVia::Network,
                })
            }
            Err(err) => match self.storage.get(&cache_name, url)? {
                Some(hit) => Ok(RouteOutcome::Served {
                    response: hit,
                    via: ServedVia::Cache,
                }),
                None => Err(ProxyError::Unreachable {
                    url: url.to_string(),
                    source: err,
                }),
            },
        }
    }

    /// Best-effort store of a response clone. Never gates or fails the
    /// response being returned to the caller.
    fn store_clone(&self, cache_name: &str, response: &CachedResponse) {
        if let Err(err) = self.storage.put(cache_name, response) {
            warn!(
                "event=cache_put module=cache status=error cache={cache_name} url={} error={err}",
                response.url
            );
        }
    }

    fn offline_fallback(&self, url: &str, err: FetchError) -> Result<RouteOutcome, ProxyError> {
        if let Some(fallback) = self.manifest.offline_fallback() {
            if let Some(hit) = self.storage.get(&self.manifest.cache_name(), fallback)? {
                warn!("event=route module=cache status=fallback url={url}");
                return Ok(RouteOutcome::Served {
                    response: hit,
                    via: ServedVia::OfflineFallback,
                });
            }
        }
        Err(ProxyError::Unreachable {
            url: url.to_string(),
            source: err,
        })
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LifecycleState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
