//! In-memory page cache with opportunistic background prefetch.
//!
//! Bodies are keyed by the exact URL string used to fetch them (including
//! query and fragment, no normalization). The cache only grows: there is no
//! eviction and no TTL, it lives for the process lifetime. A failed fetch
//! leaves the key absent, so the page stays eligible for retry on the next
//! prefetch or lookup-triggered fetch.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::net::fetch::{DocumentFetcher, FetchError};

/// Page cache shared between the preloader, hover prefetch and navigation.
///
/// Inner state is held behind `Arc` so background fetch threads can keep
/// writing after the spawning call returns.
pub struct PageCache {
    fetcher: Arc<dyn DocumentFetcher>,
    pages: Arc<RwLock<HashMap<String, String>>>,
    /// URLs with a background fetch already running, to avoid issuing
    /// duplicate requests on rapid repeated `ensure_cached` calls.
    in_flight: Arc<Mutex<HashSet<String>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl PageCache {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self {
            fetcher,
            pages: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Whether a body is cached for this exact URL. Never fetches.
    pub fn is_cached(&self, url: &str) -> bool {
        self.pages
            .read()
            .map(|pages| pages.contains_key(url))
            .unwrap_or(false)
    }

    /// Cached body for this exact URL, if any. Never fetches.
    pub fn get_cached(&self, url: &str) -> Option<String> {
        let body = self
            .pages
            .read()
            .ok()
            .and_then(|pages| pages.get(url).cloned());
        match &body {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                log::debug!("Cache HIT: {}", url);
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                log::debug!("Cache MISS: {}", url);
            }
        }
        body
    }

    /// Fetch a document and cache its body on success.
    ///
    /// On failure the cache is left untouched and the error is returned to
    /// the caller.
    pub fn fetch_document(&self, url: &str) -> Result<String, FetchError> {
        let body = self.fetcher.fetch(url)?;
        if let Ok(mut pages) = self.pages.write() {
            pages.insert(url.to_string(), body.clone());
        }
        Ok(body)
    }

    /// Fire-and-forget prefetch: fetch `url` in the background if it is not
    /// cached and no fetch for it is already running.
    ///
    /// No caller is waiting, so failures are logged and swallowed. The body
    /// becomes visible through `is_cached`/`get_cached` once the background
    /// fetch lands; there is no synchronous availability guarantee.
    pub fn ensure_cached(&self, url: &str) {
        if self.is_cached(url) {
            return;
        }
        if let Ok(mut in_flight) = self.in_flight.lock() {
            if !in_flight.insert(url.to_string()) {
                return;
            }
        }

        let fetcher = Arc::clone(&self.fetcher);
        let pages = Arc::clone(&self.pages);
        let in_flight = Arc::clone(&self.in_flight);
        let url = url.to_string();
        std::thread::spawn(move || {
            log::debug!("Prefetching: {}", url);
            match fetcher.fetch(&url) {
                Ok(body) => {
                    if let Ok(mut pages) = pages.write() {
                        pages.insert(url.clone(), body);
                    }
                }
                Err(e) => log::warn!("Failed to prefetch {}: {}", url, e),
            }
            if let Ok(mut in_flight) = in_flight.lock() {
                in_flight.remove(&url);
            }
        });
    }

    /// Number of cached pages.
    pub fn cached_pages(&self) -> usize {
        self.pages.read().map(|pages| pages.len()).unwrap_or(0)
    }

    /// URLs currently cached, in no particular order.
    pub fn cached_urls(&self) -> Vec<String> {
        self.pages
            .read()
            .map(|pages| pages.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Lookup hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::fetch::FetchReason;
    use std::time::Duration;

    struct SlowFetcher {
        calls: AtomicUsize,
    }

    impl DocumentFetcher for SlowFetcher {
        fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(format!("<html>{}</html>", url))
        }
    }

    struct FailingFetcher;

    impl DocumentFetcher for FailingFetcher {
        fn fetch(&self, url: &str) -> Result<String, FetchError> {
            Err(FetchError {
                url: url.to_string(),
                reason: FetchReason::Status(404),
            })
        }
    }

    fn wait_until_cached(cache: &PageCache, url: &str) -> bool {
        for _ in 0..100 {
            if cache.is_cached(url) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_fetch_document_populates_cache() {
        let fetcher = Arc::new(SlowFetcher {
            calls: AtomicUsize::new(0),
        });
        let cache = PageCache::new(fetcher);
        assert!(!cache.is_cached("a.html"));

        let body = cache.fetch_document("a.html").unwrap();
        assert!(cache.is_cached("a.html"));
        assert_eq!(cache.get_cached("a.html"), Some(body));
    }

    #[test]
    fn test_failed_fetch_leaves_cache_untouched() {
        let cache = PageCache::new(Arc::new(FailingFetcher));
        assert!(cache.fetch_document("b.html").is_err());
        assert!(!cache.is_cached("b.html"));
        assert_eq!(cache.cached_pages(), 0);
    }

    #[test]
    fn test_ensure_cached_deduplicates_in_flight() {
        let fetcher = Arc::new(SlowFetcher {
            calls: AtomicUsize::new(0),
        });
        let cache = PageCache::new(Arc::clone(&fetcher) as Arc<dyn DocumentFetcher>);

        cache.ensure_cached("a.html");
        cache.ensure_cached("a.html");
        cache.ensure_cached("a.html");

        assert!(wait_until_cached(&cache, "a.html"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ensure_cached_is_asynchronous() {
        let fetcher = Arc::new(SlowFetcher {
            calls: AtomicUsize::new(0),
        });
        let cache = PageCache::new(fetcher);

        cache.ensure_cached("a.html");
        // The fetch sleeps 50ms, so the body cannot be there yet.
        assert!(!cache.is_cached("a.html"));
        assert!(wait_until_cached(&cache, "a.html"));
    }

    #[test]
    fn test_ensure_cached_swallows_errors_and_allows_retry() {
        let cache = PageCache::new(Arc::new(FailingFetcher));
        cache.ensure_cached("b.html");
        std::thread::sleep(Duration::from_millis(100));
        // No negative caching: the URL stays absent and retryable.
        assert!(!cache.is_cached("b.html"));
        cache.ensure_cached("b.html");
        std::thread::sleep(Duration::from_millis(100));
        assert!(!cache.is_cached("b.html"));
    }

    #[test]
    fn test_hit_rate() {
        let fetcher = Arc::new(SlowFetcher {
            calls: AtomicUsize::new(0),
        });
        let cache = PageCache::new(fetcher);
        cache.fetch_document("a.html").unwrap();

        assert!(cache.get_cached("a.html").is_some());
        assert!(cache.get_cached("missing.html").is_none());
        assert!((cache.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
