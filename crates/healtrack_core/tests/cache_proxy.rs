use healtrack_core::{
    AssetCacheProxy, CacheError, CacheManifest, CacheStorage, CachedResponse, FetchError,
    Fetcher, InstallError, LifecycleState, ProxyError, RouteOutcome, ServedVia,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const APP_ORIGIN: &str = "https://app.example/";
const INDEX_URL: &str = "https://app.example/index.html";
const STYLE_URL: &str = "https://app.example/style.css";
const OFFLINE_URL: &str = "https://app.example/offline.html";
const CDN_URL: &str = "https://cdn.example/lib.js";

/// In-memory named caches for proxy tests.
#[derive(Default)]
struct MemoryCacheStorage {
    caches: Mutex<BTreeMap<String, BTreeMap<String, CachedResponse>>>,
}

impl CacheStorage for MemoryCacheStorage {
    fn get(&self, cache_name: &str, url: &str) -> Result<Option<CachedResponse>, CacheError> {
        Ok(self
            .caches
            .lock()
            .unwrap()
            .get(cache_name)
            .and_then(|cache| cache.get(url))
            .cloned())
    }

    fn put(&self, cache_name: &str, response: &CachedResponse) -> Result<(), CacheError> {
        self.caches
            .lock()
            .unwrap()
            .entry(cache_name.to_string())
            .or_default()
            .insert(response.url.clone(), response.clone());
        Ok(())
    }

    fn cache_names(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.caches.lock().unwrap().keys().cloned().collect())
    }

    fn delete_cache(&self, cache_name: &str) -> Result<(), CacheError> {
        self.caches.lock().unwrap().remove(cache_name);
        Ok(())
    }
}

/// Fetcher double serving scripted responses and recording every call.
#[derive(Default)]
struct ScriptedFetcher {
    responses: Mutex<BTreeMap<String, CachedResponse>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn serve(&self, response: CachedResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(response.url.clone(), response);
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn calls_for(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|called| called.as_str() == url)
            .count()
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, url: &str) -> Result<CachedResponse, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network("offline".to_string()));
        }
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Network(format!("no route to {url}")))
    }
}

fn ok_response(url: &str) -> CachedResponse {
    CachedResponse {
        url: url.to_string(),
        status: 200,
        content_type: Some("text/html".to_string()),
        body: url.as_bytes().to_vec(),
        redirected: false,
    }
}

fn manifest(version: &str) -> CacheManifest {
    CacheManifest::new(
        version,
        vec![INDEX_URL.to_string(), STYLE_URL.to_string()],
    )
    .with_offline_fallback(OFFLINE_URL)
}

fn scripted_world() -> (Arc<MemoryCacheStorage>, Arc<ScriptedFetcher>) {
    let storage = Arc::new(MemoryCacheStorage::default());
    let fetcher = Arc::new(ScriptedFetcher::default());
    for url in [INDEX_URL, STYLE_URL, OFFLINE_URL] {
        fetcher.serve(ok_response(url));
    }
    (storage, fetcher)
}

fn active_proxy(
    version: &str,
    storage: Arc<MemoryCacheStorage>,
    fetcher: Arc<ScriptedFetcher>,
) -> AssetCacheProxy {
    let proxy = AssetCacheProxy::new(manifest(version), storage, fetcher, APP_ORIGIN).unwrap();
    proxy.install().unwrap();
    proxy.activate().unwrap();
    proxy
}

fn served(outcome: RouteOutcome) -> (CachedResponse, ServedVia) {
    match outcome {
        RouteOutcome::Served { response, via } => (response, via),
        RouteOutcome::Passthrough => panic!("expected a served response"),
    }
}

#[test]
fn lifecycle_runs_install_waiting_active() {
    let (storage, fetcher) = scripted_world();
    let proxy =
        AssetCacheProxy::new(manifest("v1"), storage, fetcher, APP_ORIGIN).unwrap();
    assert_eq!(proxy.state(), LifecycleState::Installing);

    proxy.install().unwrap();
    assert_eq!(proxy.state(), LifecycleState::Waiting);

    // A second install is not a valid transition.
    assert!(matches!(
        proxy.install().unwrap_err(),
        InstallError::InvalidState(LifecycleState::Waiting)
    ));

    proxy.activate().unwrap();
    assert_eq!(proxy.state(), LifecycleState::Active);

    proxy.retire();
    assert_eq!(proxy.state(), LifecycleState::Redundant);
    assert!(matches!(
        proxy.handle_request("GET", INDEX_URL).unwrap_err(),
        ProxyError::Inactive(LifecycleState::Redundant)
    ));
}

#[test]
fn requests_are_rejected_until_active() {
    let (storage, fetcher) = scripted_world();
    let proxy =
        AssetCacheProxy::new(manifest("v1"), storage, fetcher, APP_ORIGIN).unwrap();

    assert!(matches!(
        proxy.handle_request("GET", INDEX_URL).unwrap_err(),
        ProxyError::Inactive(LifecycleState::Installing)
    ));
    assert!(matches!(
        proxy.activate().unwrap_err(),
        healtrack_core::ActivationError::NotInstalled(LifecycleState::Installing)
    ));
}

#[test]
fn warm_cache_first_get_issues_no_network_request() {
    let (storage, fetcher) = scripted_world();
    let proxy = active_proxy("v1", storage, fetcher.clone());

    let install_calls = fetcher.calls_for(INDEX_URL);
    let (response, via) = served(proxy.handle_request("GET", INDEX_URL).unwrap());

    assert_eq!(via, ServedVia::Cache);
    assert_eq!(response.url, INDEX_URL);
    assert_eq!(fetcher.calls_for(INDEX_URL), install_calls);
}

#[test]
fn cache_first_miss_fetches_once_then_serves_from_cache() {
    let (storage, fetcher) = scripted_world();
    let extra_url = "https://app.example/icons/icon-192.png";
    fetcher.serve(ok_response(extra_url));
    let proxy = active_proxy("v1", storage, fetcher.clone());

    let (_, via) = served(proxy.handle_request("GET", extra_url).unwrap());
    assert_eq!(via, ServedVia::Network);
    assert_eq!(fetcher.calls_for(extra_url), 1);

    let (_, via) = served(proxy.handle_request("GET", extra_url).unwrap());
    assert_eq!(via, ServedVia::Cache);
    assert_eq!(fetcher.calls_for(extra_url), 1);
}

#[test]
fn cache_first_does_not_store_error_or_redirected_responses() {
    let (storage, fetcher) = scripted_world();
    let missing_url = "https://app.example/missing.html";
    let moved_url = "https://app.example/moved.html";
    let mut not_found = ok_response(missing_url);
    not_found.status = 404;
    fetcher.serve(not_found);
    let mut moved = ok_response(moved_url);
    moved.redirected = true;
    fetcher.serve(moved);
    let proxy = active_proxy("v1", storage, fetcher.clone());

    let (response, via) = served(proxy.handle_request("GET", missing_url).unwrap());
    assert_eq!(via, ServedVia::Network);
    assert_eq!(response.status, 404);
    served(proxy.handle_request("GET", missing_url).unwrap());
    // Not cached, so the second request fetched again.
    assert_eq!(fetcher.calls_for(missing_url), 2);

    served(proxy.handle_request("GET", moved_url).unwrap());
    served(proxy.handle_request("GET", moved_url).unwrap());
    assert_eq!(fetcher.calls_for(moved_url), 2);
}

#[test]
fn third_party_get_always_hits_network_even_when_cached() {
    let (storage, fetcher) = scripted_world();
    fetcher.serve(ok_response(CDN_URL));
    let proxy = active_proxy("v1", storage, fetcher.clone());

    let (_, via) = served(proxy.handle_request("GET", CDN_URL).unwrap());
    assert_eq!(via, ServedVia::Network);
    // Cached now, but network-first still fetches.
    let (_, via) = served(proxy.handle_request("GET", CDN_URL).unwrap());
    assert_eq!(via, ServedVia::Network);
    assert_eq!(fetcher.calls_for(CDN_URL), 2);
}

#[test]
fn third_party_falls_back_to_cache_when_offline() {
    let (storage, fetcher) = scripted_world();
    fetcher.serve(ok_response(CDN_URL));
    let proxy = active_proxy("v1", storage, fetcher.clone());

    // Warm the dynamic entry, then cut the network.
    served(proxy.handle_request("GET", CDN_URL).unwrap());
    fetcher.set_offline(true);

    let (response, via) = served(proxy.handle_request("GET", CDN_URL).unwrap());
    assert_eq!(via, ServedVia::Cache);
    assert_eq!(response.url, CDN_URL);
}

#[test]
fn third_party_without_cache_entry_fails_when_offline() {
    let (storage, fetcher) = scripted_world();
    let proxy = active_proxy("v1", storage, fetcher.clone());
    fetcher.set_offline(true);

    let err = proxy
        .handle_request("GET", "https://cdn.example/never-seen.js")
        .unwrap_err();
    assert!(matches!(err, ProxyError::Unreachable { .. }));
}

#[test]
fn same_origin_total_failure_serves_offline_fallback() {
    let (storage, fetcher) = scripted_world();
    let proxy = active_proxy("v1", storage, fetcher.clone());
    fetcher.set_offline(true);

    let uncached_url = "https://app.example/stats.html";
    let (response, via) = served(proxy.handle_request("GET", uncached_url).unwrap());
    assert_eq!(via, ServedVia::OfflineFallback);
    assert_eq!(response.url, OFFLINE_URL);
}

#[test]
fn same_origin_total_failure_without_fallback_propagates() {
    let storage = Arc::new(MemoryCacheStorage::default());
    let fetcher = Arc::new(ScriptedFetcher::default());
    for url in [INDEX_URL, STYLE_URL] {
        fetcher.serve(ok_response(url));
    }
    let no_fallback =
        CacheManifest::new("v1", vec![INDEX_URL.to_string(), STYLE_URL.to_string()]);
    let proxy =
        AssetCacheProxy::new(no_fallback, storage, fetcher.clone(), APP_ORIGIN).unwrap();
    proxy.install().unwrap();
    proxy.activate().unwrap();
    fetcher.set_offline(true);

    let err = proxy
        .handle_request("GET", "https://app.example/stats.html")
        .unwrap_err();
    assert!(matches!(err, ProxyError::Unreachable { .. }));
}

#[test]
fn non_get_requests_pass_through_untouched() {
    let (storage, fetcher) = scripted_world();
    let proxy = active_proxy("v1", storage, fetcher.clone());

    let before = fetcher.calls_for(INDEX_URL);
    let outcome = proxy.handle_request("POST", INDEX_URL).unwrap();
    assert_eq!(outcome, RouteOutcome::Passthrough);
    assert_eq!(fetcher.calls_for(INDEX_URL), before);
}

#[test]
fn failed_install_is_atomic_and_previous_version_keeps_serving() {
    let (storage, fetcher) = scripted_world();
    let v1 = active_proxy("v1", storage.clone(), fetcher.clone());

    // v2 adds an asset the fetcher cannot serve.
    let broken = CacheManifest::new(
        "v2",
        vec![
            INDEX_URL.to_string(),
            "https://app.example/new-feature.js".to_string(),
        ],
    );
    let v2 = AssetCacheProxy::new(broken, storage.clone(), fetcher.clone(), APP_ORIGIN).unwrap();

    let err = v2.install().unwrap_err();
    assert!(matches!(err, InstallError::ManifestFetch { .. }));
    assert_eq!(v2.state(), LifecycleState::Installing);

    // No partial v2 population; v1's cache is still the only one.
    assert_eq!(storage.cache_names().unwrap(), vec!["healtrack-v1".to_string()]);
    fetcher.set_offline(true);
    let (_, via) = served(v1.handle_request("GET", INDEX_URL).unwrap());
    assert_eq!(via, ServedVia::Cache);
}

#[test]
fn activation_purges_stale_cache_versions() {
    let (storage, fetcher) = scripted_world();
    let v1 = active_proxy("v1", storage.clone(), fetcher.clone());

    let v2 = AssetCacheProxy::new(manifest("v2"), storage.clone(), fetcher, APP_ORIGIN).unwrap();
    v2.install().unwrap();
    // Until activation both versions' caches coexist.
    assert_eq!(
        storage.cache_names().unwrap(),
        vec!["healtrack-v1".to_string(), "healtrack-v2".to_string()]
    );

    v2.activate().unwrap();
    v1.retire();

    assert_eq!(storage.cache_names().unwrap(), vec!["healtrack-v2".to_string()]);
    let (_, via) = served(v2.handle_request("GET", INDEX_URL).unwrap());
    assert_eq!(via, ServedVia::Cache);
}
