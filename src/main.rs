use std::sync::Arc;
use std::time::Duration;

use url::Url;

use prewarm::cache::PageCache;
use prewarm::links::discover_links;
use prewarm::net::fetch::{DocumentFetcher, HttpFetcher};
use prewarm::preload::Preloader;

struct Options {
    base_url: String,
    pages: Vec<String>,
    follow: bool,
    filter: String,
}

fn usage() -> ! {
    eprintln!("Usage: prewarm <base-url> [page ...] [--pages FILE] [--follow] [--filter SUBSTR]");
    eprintln!();
    eprintln!("Prefetches the given pages (paths relative to <base-url>) into an");
    eprintln!("in-memory cache and reports what landed. With --follow, links");
    eprintln!("discovered in fetched pages are prefetched one level deep;");
    eprintln!("--filter restricts discovered links to hrefs containing SUBSTR.");
    std::process::exit(2);
}

fn parse_args() -> Options {
    let mut args = std::env::args().skip(1);
    let mut base_url = None;
    let mut pages = Vec::new();
    let mut follow = false;
    let mut filter = String::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--follow" => follow = true,
            "--filter" => match args.next() {
                Some(f) => filter = f,
                None => usage(),
            },
            "--pages" => {
                let path = match args.next() {
                    Some(p) => p,
                    None => usage(),
                };
                match std::fs::read_to_string(&path) {
                    Ok(content) => {
                        for line in content.lines() {
                            let line = line.trim();
                            if !line.is_empty() && !line.starts_with('#') {
                                pages.push(line.to_string());
                            }
                        }
                    }
                    Err(e) => {
                        eprintln!("Cannot read page list {}: {}", path, e);
                        std::process::exit(2);
                    }
                }
            }
            "--help" | "-h" => usage(),
            _ if base_url.is_none() => base_url = Some(arg),
            _ => pages.push(arg),
        }
    }

    match base_url {
        Some(base_url) => Options {
            base_url,
            pages,
            follow,
            filter,
        },
        None => usage(),
    }
}

fn main() {
    env_logger::init();

    let opts = parse_args();
    if opts.pages.is_empty() {
        eprintln!("No pages to preload.");
        usage();
    }

    let base = match Url::parse(&opts.base_url) {
        Ok(base) => base,
        Err(e) => {
            eprintln!("Invalid base URL {}: {}", opts.base_url, e);
            std::process::exit(2);
        }
    };

    let fetcher: Arc<dyn DocumentFetcher> = Arc::new(HttpFetcher::new().with_base_url(base));
    let cache = Arc::new(PageCache::new(fetcher));
    let preloader = Preloader::new(Arc::clone(&cache), opts.pages.clone())
        .with_settle_delay(Duration::ZERO);

    let report = preloader.preload_all();

    for page in preloader.known_urls() {
        let mark = if cache.is_cached(page) { "ok  " } else { "FAIL" };
        println!("  [{}] {}", mark, page);
    }
    println!(
        "Preloaded {} of {} pages in {}ms",
        report.cached_pages.len(),
        opts.pages.len(),
        report.duration.as_millis()
    );

    if opts.follow {
        let mut discovered = Vec::new();
        for page in &report.cached_pages {
            if let Some(body) = cache.get_cached(page) {
                for link in discover_links(&body, &opts.filter) {
                    if !cache.is_cached(&link) && !discovered.contains(&link) {
                        discovered.push(link);
                    }
                }
            }
        }

        if discovered.is_empty() {
            println!("No new links to follow.");
        } else {
            println!("Following {} discovered links...", discovered.len());
            let follow_pass = Preloader::new(Arc::clone(&cache), discovered);
            let follow_report = follow_pass.preload_all();
            println!(
                "Followed {} links in {}ms ({} cached pages total)",
                follow_report.cached_pages.len(),
                follow_report.duration.as_millis(),
                cache.cached_pages()
            );
        }
    }
}
