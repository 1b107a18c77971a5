//! The aggregate feed: every registered source scraped in turn, manual
//! events appended, duplicates collapsed, and the whole list sorted by date.

use crate::domain::Event;
use crate::error::{Result, ScraperError};
use crate::fetch::Fetcher;
use crate::manual::load_manual_events;
use crate::sources::{registry, EventSource};
use crate::text::canonicalize_url;
use crate::venues::VenueTable;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, Instrument};

/// Sort key for events with no date; they sink to the end of the feed.
const FAR_FUTURE_DATE: &str = "9999-12-31";

/// Collapses duplicates and orders the feed. The dedup key is
/// `source|canonical-url`, falling back to `source|id:<id>` for URL-less
/// events; the last occurrence wins. Date-less events sort last.
pub fn dedupe_and_sort(events: Vec<Event>) -> Vec<Event> {
    let mut slots: Vec<Event> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for event in events {
        let key = match event.url.as_deref().and_then(canonicalize_url) {
            Some(url) => format!("{}|{}", event.source, url),
            None => format!("{}|id:{}", event.source, event.id),
        };
        match index.get(&key) {
            Some(&slot) => slots[slot] = event,
            None => {
                index.insert(key, slots.len());
                slots.push(event);
            }
        }
    }

    slots.sort_by(|a, b| {
        let a_key = a.local_date.as_deref().unwrap_or(FAR_FUTURE_DATE);
        let b_key = b.local_date.as_deref().unwrap_or(FAR_FUTURE_DATE);
        a_key.cmp(b_key)
    });
    slots
}

/// Runs a specific set of sources and folds in nothing else. Failures at
/// this level propagate; the caller owns cache fallback.
pub async fn run_sources(
    sources: Vec<Box<dyn EventSource>>,
    fetcher: &Fetcher,
    venues: &VenueTable,
) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for source in sources {
        let span = tracing::info_span!("scrape_source", source = source.slug());
        let batch = source.scrape(fetcher, venues).instrument(span).await.map_err(|e| {
            ScraperError::Source { slug: source.slug().to_string(), message: e.to_string() }
        })?;
        events.extend(batch);
    }
    Ok(events)
}

/// The pipeline's single entry point: scrapes every registered venue,
/// appends the manual events file, and returns the deduplicated,
/// date-ordered feed.
pub async fn scrape_all_sources(
    fetcher: &Fetcher,
    venues: &VenueTable,
    manual_events_path: &Path,
) -> Result<Vec<Event>> {
    let mut events = run_sources(registry(), fetcher, venues).await?;
    events.extend(load_manual_events(manual_events_path));

    let feed = dedupe_and_sort(events);
    info!(count = feed.len(), "aggregate feed assembled");
    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FailingSource;

    #[async_trait]
    impl EventSource for FailingSource {
        fn slug(&self) -> &str {
            "broken"
        }

        async fn scrape(&self, _: &Fetcher, _: &VenueTable) -> Result<Vec<Event>> {
            Err(ScraperError::Config("listing unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn failing_source_error_names_the_source() {
        let fetcher = Fetcher::new();
        let venues = VenueTable::known();
        let err = run_sources(vec![Box::new(FailingSource)], &fetcher, &venues)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Source 'broken' failed"), "unexpected error: {message}");
        assert!(message.contains("listing unreachable"));
    }

    fn event(source: &str, name: &str, url: Option<&str>, date: Option<&str>) -> Event {
        Event::new(
            source,
            name.to_string(),
            url.map(str::to_string),
            date.map(str::to_string),
            None,
        )
    }

    #[test]
    fn same_source_and_url_collapse_to_last() {
        let stale = event("harlows", "Old Title", Some("https://x.com/a"), Some("2025-05-01"));
        let fresh = event("harlows", "New Title", Some("https://x.com/a/"), Some("2025-05-01"));
        let feed = dedupe_and_sort(vec![stale, fresh]);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].name, "New Title");
    }

    #[test]
    fn same_url_different_sources_stay_separate() {
        let a = event("harlows", "Show", Some("https://x.com/a"), Some("2025-05-01"));
        let b = event("channel_24", "Show", Some("https://x.com/a"), Some("2025-05-01"));
        assert_eq!(dedupe_and_sort(vec![a, b]).len(), 2);
    }

    #[test]
    fn url_less_events_key_on_id() {
        let a = event("manual", "One", None, Some("2025-05-01"));
        let b = event("manual", "Two", None, Some("2025-05-01"));
        let duplicate_of_a = event("manual", "One", None, Some("2025-05-01"));
        assert_eq!(dedupe_and_sort(vec![a, b, duplicate_of_a]).len(), 2);
    }

    #[test]
    fn sorted_by_date_with_dateless_last() {
        let may = event("harlows", "May", Some("https://x.com/may"), Some("2025-05-01"));
        let none = event("harlows", "TBA", Some("https://x.com/tba"), None);
        let jan = event("harlows", "Jan", Some("https://x.com/jan"), Some("2025-01-01"));
        let feed = dedupe_and_sort(vec![may, none, jan]);
        let names: Vec<&str> = feed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Jan", "May", "TBA"]);
    }

    #[test]
    fn non_canonical_urls_still_collide() {
        let a = event("harlows", "A", Some("https://x.com/a?page=1"), Some("2025-05-01"));
        let b = event("harlows", "B", Some("https://x.com/a#frag"), Some("2025-05-01"));
        let feed = dedupe_and_sort(vec![a, b]);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].name, "B");
    }
}
