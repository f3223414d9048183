//! Offline asset cache proxy.
//!
//! # Responsibility
//! - Intercept outbound GET fetches and route them cache-first or
//!   network-first per origin.
//! - Manage versioned cache lifecycle: install, activate, purge, retire.
//!
//! # Invariants
//! - Exactly one cache name is current per deployed version; stale names are
//!   purged at activation.
//! - Install is all-or-nothing: no partial cache population survives a
//!   failed manifest fetch.
//! - A network failure is fatal to a single request only, never to the
//!   proxy's running state.

pub mod backend;
pub mod manifest;
pub mod proxy;

pub use backend::{
    CacheError, CacheStorage, CachedResponse, DiskCacheStorage, FetchError, Fetcher, UreqFetcher,
};
pub use manifest::CacheManifest;
pub use proxy::{
    ActivationError, AssetCacheProxy, InstallError, LifecycleState, ProxyError, RouteOutcome,
    ServedVia,
};
