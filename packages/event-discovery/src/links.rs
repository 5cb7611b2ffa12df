//! Link extraction from listing pages.
//!
//! Pulls anchor hrefs out of fetched HTML, resolves them against the
//! page's origin, and keeps only plausible single-event URLs. Filtering
//! is intentionally loose: a false positive costs one cheap classifier
//! slot, a false negative is an event the run can never recover.

use std::collections::HashSet;

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Path fragments that mark navigation, auth, and other non-event pages.
const BLOCKED_PATH_FRAGMENTS: &[&str] = &[
    "/search",
    "/category",
    "/categories",
    "/tag/",
    "/tags/",
    "/login",
    "/log-in",
    "/signin",
    "/sign-in",
    "/signup",
    "/sign-up",
    "/register",
    "/account",
    "/privacy",
    "/terms",
    "/cookie",
    "/cart",
    "/checkout",
    "/subscribe",
    "/newsletter",
    "/feed",
    "/rss",
    "/sitemap",
    "/wp-admin",
    "/wp-login",
];

/// Social networks never host the event page we want.
const BLOCKED_HOSTS: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "youtube.com",
    "tiktok.com",
    "pinterest.com",
];

const ASSET_EXTENSIONS: &[&str] = &[
    ".css", ".js", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".pdf", ".zip",
    ".xml", ".json", ".mp3", ".mp4", ".woff", ".woff2",
];

fn href_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"href\s*=\s*["']([^"'#]+)["']"#).unwrap())
}

/// Extract candidate event links from a listing page, deduplicated and
/// capped at `cap`.
pub fn extract_event_links(base: &Url, html: &str, cap: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut links = Vec::new();

    for cap_match in href_pattern().captures_iter(html) {
        if links.len() >= cap {
            break;
        }
        let href = cap_match[1].trim();
        if href.is_empty()
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("data:")
        {
            continue;
        }

        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if !keep_event_link(base, &resolved) {
            continue;
        }

        let normalized = resolved.to_string();
        if seen.insert(normalized.clone()) {
            links.push(normalized);
        }
    }

    links
}

/// Loose filter: same-origin, non-root, no blocked path fragment, no
/// static asset, not a social network.
fn keep_event_link(base: &Url, url: &Url) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }
    if url.host_str() != base.host_str() {
        return false;
    }

    if let Some(host) = url.host_str() {
        let host = host.trim_start_matches("www.");
        if BLOCKED_HOSTS
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
        {
            return false;
        }
    }

    let path = url.path();
    // Bare directory roots point back at listings, not single events.
    if path == "/" || path.is_empty() {
        return false;
    }
    if url.as_str() == base.as_str() {
        return false;
    }

    let path_lower = path.to_lowercase();
    if BLOCKED_PATH_FRAGMENTS.iter().any(|f| path_lower.contains(f)) {
        return false;
    }
    if ASSET_EXTENSIONS.iter().any(|ext| path_lower.ends_with(ext)) {
        return false;
    }

    true
}
