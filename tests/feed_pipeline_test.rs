use anyhow::Result;
use sac_shows::aggregate::dedupe_and_sort;
use sac_shows::cache;
use sac_shows::detail::analyze_event_page;
use sac_shows::manual::load_manual_events;
use sac_shows::venues::VenueTable;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

const STRUCTURED_PAGE: &str = r#"<html><head>
<script type="application/ld+json">
{"@type": "MusicEvent",
 "name": "Radio Birds",
 "startDate": "2025-03-14T19:30:00",
 "url": "https://www.harlows.com/events/radio-birds/",
 "image": "https://cdn.example.com/radio-birds.jpg",
 "offers": {"price": 18, "priceCurrency": "USD"},
 "location": {"name": "Harlow's"}}
</script>
</head><body></body></html>"#;

const FALLBACK_PAGE: &str = r#"<html><head>
<title>Acid Tapes | Channel 24</title>
</head><body>
<h1>Acid Tapes</h1>
<p>Saturday, January 10, 2026. Doors 8pm. Tickets $10 advance.</p>
</body></html>"#;

#[test]
fn pages_resolve_and_aggregate_into_a_sorted_feed() -> Result<()> {
    let venues = VenueTable::known();

    let first = analyze_event_page(
        STRUCTURED_PAGE,
        "https://www.harlows.com/events/radio-birds/",
        "harlows",
        &venues,
    )
    .expect("structured page should resolve")
    .event;

    // The same event discovered under a tracking query string
    let duplicate = analyze_event_page(
        STRUCTURED_PAGE,
        "https://www.harlows.com/events/radio-birds/?utm_source=home",
        "harlows",
        &venues,
    )
    .expect("structured page should resolve")
    .event;

    let second = analyze_event_page(
        FALLBACK_PAGE,
        "https://channel24sac.com/events/acid-tapes",
        "channel_24",
        &venues,
    )
    .expect("fallback page should resolve")
    .event;

    assert_eq!(first.local_date.as_deref(), Some("2025-03-14"));
    assert_eq!(second.name, "Acid Tapes");
    assert_eq!(second.local_date.as_deref(), Some("2026-01-10"));
    assert_eq!(second.local_time.as_deref(), Some("20:00"));
    assert_eq!(second.price_min, Some(10.0));

    let feed = dedupe_and_sort(vec![second.clone(), first.clone(), duplicate]);
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].name, "Radio Birds");
    assert_eq!(feed[1].name, "Acid Tapes");

    // Every event honors the TBA invariants
    for event in &feed {
        assert_eq!(event.date_tba, event.local_date.is_none());
        assert_eq!(event.time_tba, event.local_time.is_none());
    }
    Ok(())
}

#[test]
fn manual_events_merge_and_cache_round_trips() -> Result<()> {
    let venues = VenueTable::known();
    let scraped = analyze_event_page(
        STRUCTURED_PAGE,
        "https://www.harlows.com/events/radio-birds/",
        "harlows",
        &venues,
    )
    .expect("structured page should resolve")
    .event;

    let mut manual_file = NamedTempFile::new()?;
    manual_file.write_all(
        br#"[{"name": "Pop Up Show", "localDate": "2024-12-31",
             "url": "https://example.com/pop-up", "venue": {"city": "Sacramento"}}]"#,
    )?;
    let mut events = vec![scraped];
    events.extend(load_manual_events(manual_file.path()));

    let feed = dedupe_and_sort(events);
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].source, "manual");
    assert_eq!(feed[0].name, "Pop Up Show");

    let dir = tempdir()?;
    let cache_path = dir.path().join("cache.json");
    cache::save(&cache_path, &feed)?;
    let snapshot = cache::load(&cache_path);
    assert_eq!(snapshot.events.len(), 2);
    assert!(snapshot.is_fresh(3600));

    // The feed serializes with the contract's camelCase field names
    let json = serde_json::to_value(&snapshot.events)?;
    let first = &json[0];
    assert!(first.get("localDate").is_some());
    assert!(first.get("priceMin").is_some());
    assert!(first.get("dateTBA").is_some());
    assert!(first["venue"].get("postalCode").is_some());
    Ok(())
}
