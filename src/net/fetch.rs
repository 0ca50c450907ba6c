use std::time::Duration;

use url::Url;

/// Why a document fetch failed.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchReason {
    /// Server answered with a non-success status code.
    Status(u16),
    /// Transport-level failure (DNS, connect, timeout, body read).
    Transport(String),
}

/// Error during a document fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchError {
    pub url: String,
    pub reason: FetchReason,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            FetchReason::Status(code) => write!(f, "{}: HTTP status {}", self.url, code),
            FetchReason::Transport(msg) => write!(f, "{}: {}", self.url, msg),
        }
    }
}

/// Fetches a document body as text for a given URL.
///
/// The cache and preloader only depend on this trait, so tests can
/// substitute a scripted fetcher instead of hitting the network.
pub trait DocumentFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Network-backed fetcher (blocking).
///
/// Resolves relative paths against an optional base URL and asks any
/// intermediate HTTP cache for stale-tolerant responses, since prefetched
/// pages do not need to be fresh to the second.
pub struct HttpFetcher {
    base: Option<Url>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self { base: None }
    }

    /// Resolve relative document paths against this base URL.
    pub fn with_base_url(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    fn resolve(&self, url_str: &str) -> Result<Url, FetchError> {
        let resolved = match &self.base {
            Some(base) => base.join(url_str),
            None => Url::parse(url_str),
        };
        resolved.map_err(|e| FetchError {
            url: url_str.to_string(),
            reason: FetchReason::Transport(format!("Invalid URL: {}", e)),
        })
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let resolved = self.resolve(url)?;

        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("prewarm/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError {
                url: url.to_string(),
                reason: FetchReason::Transport(format!("Client error: {}", e)),
            })?;

        let response = client
            .get(resolved)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Cache-Control", "max-stale")
            .send()
            .map_err(|e| FetchError {
                url: url.to_string(),
                reason: FetchReason::Transport(format!("Request failed: {}", e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError {
                url: url.to_string(),
                reason: FetchReason::Status(status.as_u16()),
            });
        }

        response.text().map_err(|e| FetchError {
            url: url.to_string(),
            reason: FetchReason::Transport(format!("Failed to read body: {}", e)),
        })
    }
}
