//! The request interceptor.
//!
//! Three lifecycle operations: install precaches the manifest, activate
//! purges stale namespaces and claims clients, intercept serves each
//! request from cache, network, or the offline placeholder, in that order.
//! Intercept never fails; the worst observable outcome is the synthesized
//! 503 response.

use std::sync::Arc;

use url::Url;

use sciops_core::{
    CacheStorage, Error, PersistRules, Request, ResponseSnapshot, WorkerConfig,
};

use crate::fetch::{FetchClient, FetchConfig, Fetcher};
use crate::host::LifecycleHost;

/// Body of the synthesized response returned when a request can be
/// satisfied neither from cache nor from the network.
const OFFLINE_BODY: &str = "Offline - file not cached";

/// Result of intercepting one request.
#[derive(Debug, Clone)]
pub enum InterceptOutcome {
    /// Decline to handle; the host's default dispatch applies.
    Passthrough,
    /// Respond with this snapshot.
    Reply(ResponseSnapshot),
}

/// Offline-caching request interceptor.
///
/// Owns one cache namespace inside the host-provided store. Per-request
/// work shares no mutable state beyond that store, so the host may
/// dispatch intercepts concurrently without coordination.
pub struct RequestInterceptor {
    store: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn LifecycleHost>,
    config: WorkerConfig,
    rules: PersistRules,
}

impl RequestInterceptor {
    pub fn new(
        store: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn LifecycleHost>,
        config: WorkerConfig,
    ) -> Self {
        let rules = config.persist_rules();
        Self { store, fetcher, host, config, rules }
    }

    /// Build an interceptor with a real network client derived from the
    /// configuration.
    pub fn with_network(
        store: Arc<dyn CacheStorage>,
        host: Arc<dyn LifecycleHost>,
        config: WorkerConfig,
    ) -> Result<Self, Error> {
        let client = FetchClient::new(FetchConfig::from(&config))?;
        Ok(Self::new(store, Arc::new(client), host, config))
    }

    /// Install: precache the manifest into the current namespace.
    ///
    /// All-or-nothing: every manifest resource is fetched before anything
    /// is written, so a partially populated namespace never goes live. On
    /// success the host is asked to activate this version immediately;
    /// retrying after failure is the host's responsibility.
    pub async fn on_install(&self) -> Result<(), Error> {
        let namespace = &self.config.cache_version;
        self.store
            .open(namespace)
            .await
            .map_err(|e| Error::PrecacheFailed(format!("failed to open cache {}: {}", namespace, e)))?;

        let base = Url::parse(&self.config.base_url).map_err(|e| {
            Error::PrecacheFailed(format!("invalid base url {}: {}", self.config.base_url, e))
        })?;

        let mut pending = Vec::with_capacity(self.config.precache_manifest.len());
        for path in &self.config.precache_manifest {
            let url = base.join(path).map_err(|e| {
                Error::PrecacheFailed(format!("cannot resolve manifest path {}: {}", path, e))
            })?;
            let request = Request::get(url.as_str());

            let response = self.fetcher.fetch(&request).await.map_err(|e| {
                Error::PrecacheFailed(format!("manifest resource {} unreachable: {}", url, e))
            })?;
            if !response.status.is_success() {
                return Err(Error::PrecacheFailed(format!(
                    "manifest resource {} returned status {}",
                    url,
                    response.status.as_u16()
                )));
            }

            pending.push((request, response.into_snapshot()));
        }

        for (request, snapshot) in pending {
            self.store.put(namespace, request.cache_key(), snapshot).await.map_err(|e| {
                Error::PrecacheFailed(format!("failed to store {}: {}", request.url, e))
            })?;
        }

        tracing::debug!(
            namespace = %namespace,
            resources = self.config.precache_manifest.len(),
            "precache complete"
        );

        self.host.skip_waiting().await;
        Ok(())
    }

    /// Activate: purge every namespace other than the current version,
    /// then take over open clients.
    ///
    /// Best-effort: purge failures are logged and never propagated.
    pub async fn on_activate(&self) {
        let current = &self.config.cache_version;

        match self.store.namespaces().await {
            Ok(names) => {
                for name in names.iter().filter(|name| *name != current) {
                    match self.store.delete_namespace(name).await {
                        Ok(true) => tracing::debug!(namespace = %name, "purged stale cache"),
                        Ok(false) => {}
                        Err(e) => {
                            tracing::warn!(namespace = %name, error = %e, "failed to purge stale cache");
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to enumerate cache namespaces"),
        }

        self.host.claim_clients().await;
    }

    /// Intercept one outgoing request.
    ///
    /// Never fails: every HTTP(S) request resolves to a cached snapshot, a
    /// network response, or the 503 placeholder. Non-HTTP(S) schemes pass
    /// through untouched.
    pub async fn on_intercept(&self, request: &Request) -> InterceptOutcome {
        if !is_http_scheme(&request.url) {
            return InterceptOutcome::Passthrough;
        }

        let namespace = &self.config.cache_version;

        // Cached entries are trusted indefinitely; no freshness check.
        match self.store.get(namespace, request.cache_key()).await {
            Ok(Some(snapshot)) => {
                tracing::debug!(url = %request.url, "cache hit");
                return InterceptOutcome::Reply(snapshot);
            }
            Ok(None) => {}
            Err(e) => {
                // Lookup failure degrades to a miss.
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
            }
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                let status = response.status;
                let snapshot = response.into_snapshot();

                // Only exact 200 responses qualify for persistence; anything
                // else is returned to the caller uncached.
                if status.as_u16() == 200 && self.rules.should_persist(&request.url) {
                    self.persist_detached(request.cache_key().to_string(), snapshot.clone());
                }

                InterceptOutcome::Reply(snapshot)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "fetch failed, falling back to cache");

                // A detached write may have landed since the first lookup.
                if let Ok(Some(snapshot)) = self.store.get(namespace, request.cache_key()).await {
                    return InterceptOutcome::Reply(snapshot);
                }

                InterceptOutcome::Reply(offline_placeholder())
            }
        }
    }

    /// Best-effort background write. Completion is not awaited and failure
    /// never reaches the caller; racing writes are last-write-wins.
    fn persist_detached(&self, key: String, snapshot: ResponseSnapshot) {
        let store = Arc::clone(&self.store);
        let namespace = self.config.cache_version.clone();
        tokio::spawn(async move {
            if let Err(e) = store.put(&namespace, &key, snapshot).await {
                tracing::warn!(key = %key, error = %e, "detached cache write failed");
            }
        });
    }
}

fn is_http_scheme(url: &str) -> bool {
    match Url::parse(url) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Synthesized response returned when offline with nothing cached.
pub fn offline_placeholder() -> ResponseSnapshot {
    ResponseSnapshot::new(
        503,
        "Service Unavailable",
        vec![("content-type".to_string(), "text/plain".to_string())],
        OFFLINE_BODY.as_bytes().to_vec(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::StatusCode;

    use sciops_core::MemoryStore;

    use crate::fetch::FetchResponse;

    const NAMESPACE: &str = "science-ops-v1";

    /// Fetcher that serves scripted routes and fails everything else with
    /// a transport error, counting calls.
    #[derive(Default)]
    struct ScriptedFetcher {
        routes: HashMap<String, (u16, Vec<u8>)>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn offline() -> Self {
            Self::default()
        }

        fn with_route(mut self, url: &str, status: u16, body: &str) -> Self {
            self.routes.insert(url.to_string(), (status, body.as_bytes().to_vec()));
            self
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, request: &Request) -> Result<FetchResponse, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.routes.get(&request.url) {
                Some((status, body)) => {
                    let url = Url::parse(&request.url).unwrap();
                    Ok(FetchResponse {
                        url: url.clone(),
                        final_url: url,
                        status: StatusCode::from_u16(*status).unwrap(),
                        headers: reqwest::header::HeaderMap::new(),
                        bytes: Bytes::from(body.clone()),
                        fetch_ms: 1,
                    })
                }
                None => Err(Error::Fetch("connection refused".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingHost {
        skipped: AtomicBool,
        claimed: AtomicBool,
    }

    #[async_trait]
    impl LifecycleHost for RecordingHost {
        async fn skip_waiting(&self) {
            self.skipped.store(true, Ordering::SeqCst);
        }

        async fn claim_clients(&self) {
            self.claimed.store(true, Ordering::SeqCst);
        }
    }

    fn manifest_fetcher() -> ScriptedFetcher {
        ScriptedFetcher::offline()
            .with_route("http://localhost:8080/", 200, "<html>root</html>")
            .with_route("http://localhost:8080/index.html", 200, "<html>index</html>")
    }

    fn make_interceptor(
        store: &MemoryStore,
        fetcher: ScriptedFetcher,
    ) -> (RequestInterceptor, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        let interceptor = RequestInterceptor::new(
            Arc::new(store.clone()),
            Arc::new(fetcher),
            host.clone(),
            WorkerConfig::default(),
        );
        (interceptor, host)
    }

    fn reply(outcome: InterceptOutcome) -> ResponseSnapshot {
        match outcome {
            InterceptOutcome::Reply(snapshot) => snapshot,
            InterceptOutcome::Passthrough => panic!("expected a reply, got passthrough"),
        }
    }

    /// The detached write races the assertion; poll until it lands.
    async fn wait_for_entry(store: &MemoryStore, key: &str) -> Option<ResponseSnapshot> {
        for _ in 0..100 {
            if let Ok(Some(snapshot)) = store.get(NAMESPACE, key).await {
                return Some(snapshot);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }

    #[tokio::test]
    async fn test_install_precaches_manifest_and_skips_waiting() {
        let store = MemoryStore::new();
        let (interceptor, host) = make_interceptor(&store, manifest_fetcher());

        interceptor.on_install().await.unwrap();

        assert_eq!(store.entry_count(NAMESPACE).await, 2);
        let cached =
            store.get(NAMESPACE, "http://localhost:8080/index.html").await.unwrap().unwrap();
        assert_eq!(cached.body_text(), "<html>index</html>");
        assert!(host.skipped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_install_fails_when_manifest_unreachable() {
        let store = MemoryStore::new();
        let fetcher =
            ScriptedFetcher::offline().with_route("http://localhost:8080/", 200, "root only");
        let (interceptor, host) = make_interceptor(&store, fetcher);

        let result = interceptor.on_install().await;
        assert!(matches!(result, Err(Error::PrecacheFailed(_))));

        // All-or-nothing: nothing was written, the host was not signalled.
        assert_eq!(store.entry_count(NAMESPACE).await, 0);
        assert!(!host.skipped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_install_fails_on_non_success_status() {
        let store = MemoryStore::new();
        let fetcher = manifest_fetcher().with_route("http://localhost:8080/index.html", 404, "gone");
        let (interceptor, _host) = make_interceptor(&store, fetcher);

        let result = interceptor.on_install().await;
        assert!(matches!(result, Err(Error::PrecacheFailed(_))));
        assert_eq!(store.entry_count(NAMESPACE).await, 0);
    }

    #[tokio::test]
    async fn test_install_is_idempotent() {
        let store = MemoryStore::new();
        let (interceptor, _host) = make_interceptor(&store, manifest_fetcher());

        interceptor.on_install().await.unwrap();
        interceptor.on_install().await.unwrap();

        // Re-running overwrites wholesale, no duplication.
        assert_eq!(store.entry_count(NAMESPACE).await, 2);
    }

    #[tokio::test]
    async fn test_activate_purges_only_stale_namespaces() {
        let store = MemoryStore::new();
        store.open("science-ops-v0").await.unwrap();
        store.open(NAMESPACE).await.unwrap();
        let (interceptor, host) = make_interceptor(&store, ScriptedFetcher::offline());

        interceptor.on_activate().await;

        let names = store.namespaces().await.unwrap();
        assert_eq!(names, vec![NAMESPACE.to_string()]);
        assert!(host.claimed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_non_http_scheme_passes_through() {
        let store = MemoryStore::new();
        let (interceptor, _host) = make_interceptor(&store, ScriptedFetcher::offline());

        let request = Request::get("chrome-extension://abcdef/popup.html");
        let outcome = interceptor.on_intercept(&request).await;
        assert!(matches!(outcome, InterceptOutcome::Passthrough));
        assert_eq!(store.entry_count(NAMESPACE).await, 0);
    }

    #[tokio::test]
    async fn test_precached_resource_served_while_offline() {
        let store = MemoryStore::new();
        let (installer, _host) = make_interceptor(&store, manifest_fetcher());
        installer.on_install().await.unwrap();

        // Same store, network gone.
        let (offline, _host) = make_interceptor(&store, ScriptedFetcher::offline());
        let snapshot =
            reply(offline.on_intercept(&Request::get("http://localhost:8080/index.html")).await);
        assert_eq!(snapshot.status, 200);
        assert_eq!(snapshot.body_text(), "<html>index</html>");
    }

    #[tokio::test]
    async fn test_matching_fetch_is_persisted() {
        let store = MemoryStore::new();
        let url = "https://contoso.sharepoint.com/sites/ops/doc.docx";
        let fetcher = ScriptedFetcher::offline().with_route(url, 200, "document bytes");
        let (interceptor, _host) = make_interceptor(&store, fetcher);

        let snapshot = reply(interceptor.on_intercept(&Request::get(url)).await);
        assert_eq!(snapshot.body_text(), "document bytes");

        let cached = wait_for_entry(&store, url).await.expect("detached write never landed");
        assert_eq!(cached.body_text(), "document bytes");

        // Now offline: the cached copy answers.
        let (offline, _host) = make_interceptor(&store, ScriptedFetcher::offline());
        let replayed = reply(offline.on_intercept(&Request::get(url)).await);
        assert_eq!(replayed.body_text(), "document bytes");
    }

    #[tokio::test]
    async fn test_non_matching_fetch_is_not_persisted() {
        let store = MemoryStore::new();
        let url = "https://unrelated.example.com/data.json";
        let fetcher = ScriptedFetcher::offline().with_route(url, 200, "{\"a\":1}");
        let (interceptor, _host) = make_interceptor(&store, fetcher);

        let snapshot = reply(interceptor.on_intercept(&Request::get(url)).await);
        assert_eq!(snapshot.body_text(), "{\"a\":1}");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get(NAMESPACE, url).await.unwrap().is_none());

        // Offline, never cached: the placeholder answers.
        let (offline, _host) = make_interceptor(&store, ScriptedFetcher::offline());
        let placeholder = reply(offline.on_intercept(&Request::get(url)).await);
        assert_eq!(placeholder.status, 503);
        assert!(placeholder.body_text().contains("Offline"));
    }

    #[tokio::test]
    async fn test_non_200_matching_fetch_returned_but_not_persisted() {
        let store = MemoryStore::new();
        let url = "https://contoso.sharepoint.com/missing.pdf";
        let fetcher = ScriptedFetcher::offline().with_route(url, 404, "not found");
        let (interceptor, _host) = make_interceptor(&store, fetcher);

        let snapshot = reply(interceptor.on_intercept(&Request::get(url)).await);
        assert_eq!(snapshot.status, 404);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get(NAMESPACE, url).await.unwrap().is_none());
    }

    /// Store whose first lookup fails, forcing the interceptor onto the
    /// fetch path even though the entry exists.
    struct FlakyStore {
        inner: MemoryStore,
        gets: AtomicUsize,
    }

    #[async_trait]
    impl CacheStorage for FlakyStore {
        async fn open(&self, namespace: &str) -> Result<(), Error> {
            self.inner.open(namespace).await
        }

        async fn get(&self, namespace: &str, key: &str) -> Result<Option<ResponseSnapshot>, Error> {
            if self.gets.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(Error::Storage("transient read failure".to_string()));
            }
            self.inner.get(namespace, key).await
        }

        async fn put(
            &self,
            namespace: &str,
            key: &str,
            snapshot: ResponseSnapshot,
        ) -> Result<(), Error> {
            self.inner.put(namespace, key, snapshot).await
        }

        async fn namespaces(&self) -> Result<Vec<String>, Error> {
            self.inner.namespaces().await
        }

        async fn delete_namespace(&self, namespace: &str) -> Result<bool, Error> {
            self.inner.delete_namespace(namespace).await
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_recheck() {
        let inner = MemoryStore::new();
        let url = "https://www.environment.govt.nz/report.pdf";
        inner
            .put(NAMESPACE, url, ResponseSnapshot::new(200, "OK", Vec::new(), b"report".to_vec()))
            .await
            .unwrap();

        // First lookup errors (degrades to a miss), the fetch fails, the
        // re-check finds the entry.
        let store = FlakyStore { inner, gets: AtomicUsize::new(0) };
        let interceptor = RequestInterceptor::new(
            Arc::new(store),
            Arc::new(ScriptedFetcher::offline()),
            Arc::new(RecordingHost::default()),
            WorkerConfig::default(),
        );

        let snapshot = reply(interceptor.on_intercept(&Request::get(url)).await);
        assert_eq!(snapshot.body_text(), "report");
    }

    #[tokio::test]
    async fn test_fetch_failure_without_cache_yields_503() {
        let store = MemoryStore::new();
        let (interceptor, _host) = make_interceptor(&store, ScriptedFetcher::offline());

        let snapshot =
            reply(interceptor.on_intercept(&Request::get("https://unreachable.example.com/")).await);
        assert_eq!(snapshot.status, 503);
        assert_eq!(snapshot.status_text, "Service Unavailable");
        assert_eq!(snapshot.header("content-type"), Some("text/plain"));
        assert_eq!(snapshot.body_text(), "Offline - file not cached");
    }

    #[tokio::test]
    async fn test_cache_hit_does_not_touch_network() {
        let store = MemoryStore::new();
        let url = "http://localhost:8080/";
        store
            .put(NAMESPACE, url, ResponseSnapshot::new(200, "OK", Vec::new(), b"root".to_vec()))
            .await
            .unwrap();

        let fetcher = Arc::new(ScriptedFetcher::offline().with_route(url, 200, "fresh"));
        let host = Arc::new(RecordingHost::default());
        let interceptor = RequestInterceptor::new(
            Arc::new(store.clone()),
            fetcher.clone(),
            host,
            WorkerConfig::default(),
        );

        let snapshot = reply(interceptor.on_intercept(&Request::get(url)).await);
        assert_eq!(snapshot.body_text(), "root");
        assert_eq!(fetcher.call_count(), 0);
    }

    #[test]
    fn test_offline_placeholder_shape() {
        let snapshot = offline_placeholder();
        assert_eq!(snapshot.status, 503);
        assert_eq!(snapshot.status_text, "Service Unavailable");
        assert_eq!(snapshot.header("content-type"), Some("text/plain"));
        assert_eq!(snapshot.body_text(), "Offline - file not cached");
    }

    #[test]
    fn test_is_http_scheme() {
        assert!(is_http_scheme("http://example.com/"));
        assert!(is_http_scheme("https://example.com/doc.pdf"));
        assert!(!is_http_scheme("chrome-extension://abc/def"));
        assert!(!is_http_scheme("file:///etc/hosts"));
        assert!(!is_http_scheme("not a url"));
    }
}
