//! Cache-aware wrapping of an external page loader.
//!
//! A navigation/transition system owns the function that loads page content.
//! Instead of patching that function in place, the cache-aware loader is
//! built as a decorator at composition time: it takes the original loader
//! (if one is registered) and returns a new loader with the same signature.
//! Passing the cache in explicitly also removes any need to poll for
//! initialization order between the two components.

use std::sync::Arc;

use crate::cache::PageCache;
use crate::net::fetch::FetchError;

/// Loads the content of a page by URL. Same shape for the external loader
/// and for the cache-aware wrapper around it.
pub type PageLoader = Box<dyn Fn(&str) -> Result<String, FetchError> + Send + Sync>;

/// Wrap `original` so cached bodies are served without a network call.
///
/// Resolution order:
/// 1. cached body, returned immediately;
/// 2. the original loader, if one was registered at wrap time;
/// 3. last resort, a direct one-off fetch through the cache's fetcher. Its
///    `FetchError` propagates to the caller; there is no further fallback.
pub fn cache_aware_loader(cache: Arc<PageCache>, original: Option<PageLoader>) -> PageLoader {
    Box::new(move |url| {
        if let Some(body) = cache.get_cached(url) {
            return Ok(body);
        }
        if let Some(loader) = &original {
            return loader(url);
        }
        cache.fetch_document(url)
    })
}
