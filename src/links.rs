//! Navigation-link discovery for opportunistic prefetch.
//!
//! The preload list is static, but hover-style prefetching wants the links
//! actually present in a document. This extracts candidate hrefs so the
//! embedding application can feed them to `PageCache::ensure_cached`.

use scraper::Html;

/// Extract hrefs from anchors in `html` whose target contains `filter`
/// (an empty filter matches every link). Document order, deduplicated.
///
/// Fragment-only links and javascript: pseudo-links are skipped; they never
/// name a fetchable document.
pub fn discover_links(html: &str, filter: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = match scraper::Selector::parse("a[href]") {
        Ok(sel) => sel,
        Err(_) => return Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();
    for el in document.select(&selector) {
        let href = match el.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }
        if !href.contains(filter) {
            continue;
        }
        if seen.insert(href.to_string()) {
            links.push(href.to_string());
        }
    }
    links
}
