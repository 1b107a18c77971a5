//! Operator-curated events merged into the aggregate alongside the scraped
//! sources. The file is loosely typed by design; anything malformed is
//! skipped rather than surfaced as an error.

use crate::domain::{build_id, Event, Venue};
use crate::text::{canonicalize_url, clean_event_name};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

fn string_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn event_from_record(item: &Value) -> Option<Event> {
    if !item.is_object() {
        return None;
    }
    let name = clean_event_name(item.get("name").and_then(Value::as_str).unwrap_or(""));
    if name.is_empty() {
        return None;
    }

    let source = string_field(item, "source").unwrap_or_else(|| "manual".to_string());
    let url = item.get("url").and_then(Value::as_str).and_then(canonicalize_url);
    let local_date = string_field(item, "localDate");
    let local_time = string_field(item, "localTime");

    // An explicit id overrides the deterministic fingerprint
    let id = string_field(item, "id").unwrap_or_else(|| {
        build_id(&source, url.as_deref(), &name, local_date.as_deref())
    });

    let venue = item
        .get("venue")
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value::<Venue>(v.clone()).ok())
        .unwrap_or_default();

    let mut event = Event::new(&source, name, url, local_date, local_time);
    event.id = id;
    event.status = string_field(item, "status");
    event.image = string_field(item, "image");
    event.price_min = item.get("priceMin").and_then(Value::as_f64);
    event.price_max = item.get("priceMax").and_then(Value::as_f64);
    event.currency = string_field(item, "currency");
    event.venue = venue;
    Some(event)
}

/// Loads the manual events file. A missing file, unparseable JSON, or a
/// non-list payload all yield an empty list.
pub fn load_manual_events(path: &Path) -> Vec<Event> {
    let payload = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };
    let parsed: Value = match serde_json::from_str(&payload) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "manual events file is not valid JSON");
            return Vec::new();
        }
    };
    let Some(records) = parsed.as_array() else {
        warn!(path = %path.display(), "manual events payload is not a list");
        return Vec::new();
    };

    let events: Vec<Event> = records.iter().filter_map(event_from_record).collect();
    debug!(path = %path.display(), count = events.len(), "loaded manual events");
    events
}
