//! Discovery of event-detail URLs on venue listing pages. Candidates come
//! from anchor tags, script/data-attribute markup, and embedded JSON, then
//! pass a detail-URL shape check and a same-site-or-ticket-host allow check.

use crate::fetch::Fetcher;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::debug;

/// Third-party ticketing providers trusted as outbound event hosts.
pub const TICKET_HOST_HINTS: [&str; 5] = [
    "etix.com",
    "ticketmaster.com",
    "axs.com",
    "eventbrite.com",
    "seetickets.com",
];

static DETAIL_PATH_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"/event/[^/?#]+|/events/[^/?#]+|/shows/[^/?#]+|/show/[^/?#]+|/concert/[^/?#]+|/calendar/[^/?#]+|/ticket/[pe]/[^/?#]+|/ticket/\d+",
    )
    .unwrap()
});

static TICKETMASTER_EVENT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://www\.ticketmaster\.com/[^"' <>()]+/event/[^"' <>()]+"#).unwrap()
});

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Accepts URLs shaped like a single event's detail page and rejects venue
/// index pages.
pub fn looks_like_event_detail_url(href: &str) -> bool {
    let lowered = href.to_lowercase();
    if lowered.contains("/venue/") {
        return false;
    }
    if lowered.ends_with("-events") {
        return false;
    }
    DETAIL_PATH_SHAPE.is_match(&lowered)
}

fn allow_url(candidate: &Url, base_host: &str) -> bool {
    let host = candidate.host_str().unwrap_or("").to_lowercase();
    let same_site = host == base_host;
    let trusted_ticket_host = TICKET_HOST_HINTS.iter().any(|hint| host.contains(hint));
    same_site || trusted_ticket_host
}

fn normalize_link(href: &str) -> String {
    href.split('#').next().unwrap_or("").trim_end_matches('/').to_string()
}

/// Pure candidate collection over fetched listing-page markup.
pub fn collect_links_from_html(
    html: &str,
    listing_url: &str,
    include_patterns: &[&str],
) -> Vec<String> {
    let Ok(base) = Url::parse(listing_url) else {
        return Vec::new();
    };
    let base_host = base.host_str().unwrap_or("").to_lowercase();
    let mut links: HashSet<String> = HashSet::new();

    let doc = Html::parse_document(html);
    for anchor in doc.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(joined) = base.join(href) else {
            continue;
        };
        if !allow_url(&joined, &base_host) {
            continue;
        }
        let joined = joined.to_string();
        if include_patterns.iter().any(|pattern| joined.contains(pattern))
            && looks_like_event_detail_url(&joined)
        {
            links.insert(normalize_link(&joined));
        }
    }

    // Some venues render event URLs in scripts/data attributes rather than
    // anchors; scan the raw markup with JSON escaping undone.
    let decoded = html.replace("\\/", "/");
    for pattern in include_patterns {
        let escaped = regex::escape(pattern);
        let Ok(absolute) =
            Regex::new(&format!(r#"(?i)https?://[^"' <>()]+{escaped}[^"' <>()]*"#))
        else {
            continue;
        };
        for m in absolute.find_iter(&decoded) {
            if let Ok(joined) = base.join(m.as_str()) {
                if allow_url(&joined, &base_host) && looks_like_event_detail_url(joined.as_str()) {
                    links.insert(normalize_link(joined.as_str()));
                }
            }
        }

        let relative_pattern = regex::escape(pattern.trim_start_matches('/'));
        let Ok(relative) = Regex::new(&format!(
            r#"(?i)"(/{relative_pattern}[^"]*)"|'(/{relative_pattern}[^']*)'"#
        )) else {
            continue;
        };
        for caps in relative.captures_iter(&decoded) {
            let Some(path) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            if let Ok(joined) = base.join(path.as_str()) {
                if allow_url(&joined, &base_host) && looks_like_event_detail_url(joined.as_str()) {
                    links.insert(normalize_link(joined.as_str()));
                }
            }
        }
    }

    // Pages backed by LiveNation only expose Ticketmaster event URLs inside
    // embedded JSON, independent of the venue's include patterns.
    for m in TICKETMASTER_EVENT_URL.find_iter(&decoded) {
        if let Ok(joined) = base.join(m.as_str()) {
            if looks_like_event_detail_url(joined.as_str()) {
                links.insert(normalize_link(joined.as_str()));
            }
        }
    }

    links.into_iter().collect()
}

/// Fetches one listing page and returns its deduplicated candidate links.
pub async fn discover_event_links(
    fetcher: &Fetcher,
    listing_url: &str,
    include_patterns: &[&str],
) -> Vec<String> {
    let Some(html) = fetcher.get_text(listing_url).await else {
        debug!(%listing_url, "listing page unavailable");
        return Vec::new();
    };
    collect_links_from_html(&html, listing_url, include_patterns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_url_shapes() {
        assert!(looks_like_event_detail_url("https://x.com/events/radio-birds"));
        assert!(looks_like_event_detail_url("https://x.com/show/some-show"));
        assert!(looks_like_event_detail_url("https://www.etix.com/ticket/p/123/foo"));
        assert!(looks_like_event_detail_url("https://www.etix.com/ticket/12345"));
        assert!(!looks_like_event_detail_url("https://x.com/venue/events/foo"));
        assert!(!looks_like_event_detail_url("https://x.com/ace-of-spades-events"));
        assert!(!looks_like_event_detail_url("https://x.com/about"));
        assert!(!looks_like_event_detail_url("https://x.com/events/"));
    }

    #[test]
    fn anchors_filtered_by_pattern_and_host() {
        let html = r#"
            <a href="/events/radio-birds/">one</a>
            <a href="/events/radio-birds#tickets">dupe</a>
            <a href="https://elsewhere.com/events/foreign-show">foreign</a>
            <a href="https://www.etix.com/ticket/p/555/show">etix</a>
            <a href="/about">not an event</a>
        "#;
        let links =
            collect_links_from_html(html, "https://venue.com/calendar/", &["/events/", "/ticket/"]);
        assert!(links.contains(&"https://venue.com/events/radio-birds".to_string()));
        assert!(links.contains(&"https://www.etix.com/ticket/p/555/show".to_string()));
        assert!(!links.iter().any(|l| l.contains("elsewhere.com")));
        assert!(!links.iter().any(|l| l.contains("about")));
        assert_eq!(links.iter().filter(|l| l.contains("radio-birds")).count(), 1);
    }

    #[test]
    fn script_markup_urls_found() {
        let html = r#"
            <script>var next = "https:\/\/venue.com\/events\/escaped-show";</script>
            <div data-href='/shows/quoted-show'></div>
        "#;
        let links =
            collect_links_from_html(html, "https://venue.com/", &["/events/", "/shows/"]);
        assert!(links.contains(&"https://venue.com/events/escaped-show".to_string()));
        assert!(links.contains(&"https://venue.com/shows/quoted-show".to_string()));
    }

    #[test]
    fn ticketmaster_urls_found_without_patterns() {
        let html = r#"<script>{"url":"https://www.ticketmaster.com/radio-birds-sacramento/event/11005E"}</script>"#;
        let links = collect_links_from_html(html, "https://venue.com/", &[]);
        assert_eq!(
            links,
            vec!["https://www.ticketmaster.com/radio-birds-sacramento/event/11005E".to_string()]
        );
    }

    #[test]
    fn unparseable_listing_url_yields_nothing() {
        assert!(collect_links_from_html("<a href='/events/x'>x</a>", "not a url", &["/events/"])
            .is_empty());
    }
}
