//! Bulk preloader: fetch every known page up front, concurrently.
//!
//! The known-URL list is fixed at construction. `preload_all` spawns one
//! fetch thread per URL and waits for every attempt to settle, success or
//! failure, before reporting. One page failing never cancels or delays the
//! others.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::cache::PageCache;
use crate::net::fetch::FetchError;

/// Lifecycle of the bulk preload pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadState {
    /// No fetches issued yet.
    Uninitialized,
    /// `preload_all` in flight; the cache may be partially populated.
    Preloading,
    /// All initial attempts finished. Later `ensure_cached` calls may still
    /// reopen individual fetches without reverting this state.
    Settled,
}

/// Outcome of one preload attempt.
pub type PreloadResult = Result<String, FetchError>;

/// Aggregate outcome of a `preload_all` pass.
#[derive(Debug, Clone)]
pub struct PreloadReport {
    /// URLs whose fetch succeeded, in known-URL order.
    pub cached_pages: Vec<String>,
    /// Wall-clock time for the whole concurrent pass.
    pub duration: Duration,
}

/// Preloads a fixed list of known pages into a shared [`PageCache`].
pub struct Preloader {
    cache: Arc<PageCache>,
    known_urls: Vec<String>,
    settle_delay: Duration,
    hover_delay: Duration,
    state: AtomicU8,
    subscribers: Mutex<Vec<mpsc::Sender<PreloadReport>>>,
}

impl Preloader {
    pub fn new(cache: Arc<PageCache>, known_urls: Vec<String>) -> Self {
        Self {
            cache,
            known_urls,
            settle_delay: Duration::from_secs(1),
            hover_delay: Duration::from_secs(2),
            state: AtomicU8::new(PreloadState::Uninitialized as u8),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Delay before the background bulk pass starts, so it does not compete
    /// with the page's own startup work.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Delay before opportunistic (hover-style) prefetching should begin.
    /// Carried in config for the embedding application; navigation elements
    /// may not exist yet at startup.
    pub fn with_hover_delay(mut self, delay: Duration) -> Self {
        self.hover_delay = delay;
        self
    }

    pub fn known_urls(&self) -> &[String] {
        &self.known_urls
    }

    pub fn hover_delay(&self) -> Duration {
        self.hover_delay
    }

    pub fn cache(&self) -> &Arc<PageCache> {
        &self.cache
    }

    pub fn state(&self) -> PreloadState {
        match self.state.load(Ordering::Acquire) {
            s if s == PreloadState::Preloading as u8 => PreloadState::Preloading,
            s if s == PreloadState::Settled as u8 => PreloadState::Settled,
            _ => PreloadState::Uninitialized,
        }
    }

    /// Subscribe to the completion notification. The report is delivered to
    /// every subscriber exactly once per `preload_all` pass.
    pub fn subscribe(&self) -> mpsc::Receiver<PreloadReport> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }

    /// Fetch every known URL concurrently and wait for all attempts to
    /// settle.
    ///
    /// Individual failures are absorbed: a failed page is simply absent from
    /// the report's success set (and stays retryable). The report always
    /// comes back, and the completion notification fires once after it is
    /// assembled.
    pub fn preload_all(&self) -> PreloadReport {
        log::info!("Preloading {} known pages", self.known_urls.len());
        self.state
            .store(PreloadState::Preloading as u8, Ordering::Release);

        let start = Instant::now();
        let (tx, rx) = mpsc::channel::<(String, PreloadResult)>();

        for url in &self.known_urls {
            let tx = tx.clone();
            let cache = Arc::clone(&self.cache);
            let url = url.clone();
            thread::spawn(move || {
                let outcome = cache.fetch_document(&url);
                match &outcome {
                    Ok(_) => log::debug!("Preloaded: {}", url),
                    Err(e) => log::warn!("Failed to preload {}: {}", url, e),
                }
                let _ = tx.send((url, outcome));
            });
        }
        drop(tx);

        // Wait-all join: the channel closes once every worker has settled.
        let mut succeeded: Vec<String> = Vec::new();
        for (url, outcome) in rx {
            if outcome.is_ok() {
                succeeded.push(url);
            }
        }

        let cached_pages: Vec<String> = self
            .known_urls
            .iter()
            .filter(|u| succeeded.contains(u))
            .cloned()
            .collect();
        let duration = start.elapsed();

        log::info!(
            "Preloading completed in {}ms, cached {} of {} pages",
            duration.as_millis(),
            cached_pages.len(),
            self.known_urls.len()
        );

        let report = PreloadReport {
            cached_pages,
            duration,
        };

        self.state
            .store(PreloadState::Settled as u8, Ordering::Release);
        self.notify(&report);
        report
    }

    /// Run `preload_all` on a background thread after the settle delay.
    pub fn start_background(this: &Arc<Self>) -> thread::JoinHandle<PreloadReport> {
        let preloader = Arc::clone(this);
        thread::spawn(move || {
            thread::sleep(preloader.settle_delay);
            preloader.preload_all()
        })
    }

    fn notify(&self, report: &PreloadReport) {
        if let Ok(mut subs) = self.subscribers.lock() {
            // Drop subscribers whose receiver is gone.
            subs.retain(|tx| tx.send(report.clone()).is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::fetch::{DocumentFetcher, FetchReason};

    struct EchoFetcher;

    impl DocumentFetcher for EchoFetcher {
        fn fetch(&self, url: &str) -> Result<String, FetchError> {
            if url.ends_with("missing.html") {
                return Err(FetchError {
                    url: url.to_string(),
                    reason: FetchReason::Status(404),
                });
            }
            Ok(format!("body of {}", url))
        }
    }

    fn preloader(urls: &[&str]) -> Preloader {
        let cache = Arc::new(PageCache::new(Arc::new(EchoFetcher)));
        Preloader::new(cache, urls.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_state_transitions() {
        let p = preloader(&["a.html"]);
        assert_eq!(p.state(), PreloadState::Uninitialized);
        p.preload_all();
        assert_eq!(p.state(), PreloadState::Settled);
    }

    #[test]
    fn test_report_order_follows_known_urls() {
        let p = preloader(&["c.html", "a.html", "b.html"]);
        let report = p.preload_all();
        assert_eq!(report.cached_pages, vec!["c.html", "a.html", "b.html"]);
    }

    #[test]
    fn test_notification_fires_exactly_once() {
        let p = preloader(&["a.html"]);
        let rx = p.subscribe();
        let report = p.preload_all();

        let delivered = rx.recv().unwrap();
        assert_eq!(delivered.cached_pages, report.cached_pages);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_failed_page_absent_from_report() {
        let p = preloader(&["a.html", "missing.html"]);
        let report = p.preload_all();
        assert_eq!(report.cached_pages, vec!["a.html"]);
    }

    #[test]
    fn test_empty_known_urls() {
        let p = preloader(&[]);
        let report = p.preload_all();
        assert!(report.cached_pages.is_empty());
        assert_eq!(p.state(), PreloadState::Settled);
    }
}
