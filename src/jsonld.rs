//! Extraction of schema.org event markup embedded in pages as
//! `application/ld+json` script blocks.

use crate::text::numeric_tokens;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;

static LD_JSON_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

/// Collects every structured-data item on the page. Blocks that wrap their
/// items in an `@graph` array are flattened one level; malformed blocks are
/// skipped.
pub fn parse_structured_items(doc: &Html) -> Vec<Value> {
    let mut items = Vec::new();
    for script in doc.select(&LD_JSON_SELECTOR) {
        let raw: String = script.text().collect();
        let Ok(data) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        let entries = match data {
            Value::Array(list) => list,
            other => vec![other],
        };
        for entry in entries {
            match entry.get("@graph").and_then(Value::as_array) {
                Some(graph) => items.extend(graph.iter().cloned()),
                None => items.push(entry),
            }
        }
    }
    items
}

fn item_type(item: &Value) -> Option<&str> {
    match item.get("@type") {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(Value::Array(list)) => list.first().and_then(Value::as_str),
        _ => None,
    }
}

fn is_event_item(item: &Value) -> bool {
    item.is_object() && matches!(item_type(item), Some("Event") | Some("MusicEvent"))
}

fn present(item: &Value, key: &str) -> bool {
    match item.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(list)) => !list.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
    }
}

fn candidate_score(item: &Value) -> u32 {
    let mut score = 0;
    if present(item, "startDate") {
        score += 4;
    }
    if present(item, "offers") {
        score += 2;
    }
    if present(item, "location") {
        score += 1;
    }
    if present(item, "url") {
        score += 1;
    }
    if present(item, "image") {
        score += 1;
    }
    score
}

/// Picks the richest event item by field-presence score. Ties go to the
/// first-encountered candidate.
pub fn pick_best_event_candidate(items: &[Value]) -> Option<&Value> {
    let mut best: Option<(&Value, u32)> = None;
    for item in items.iter().filter(|item| is_event_item(item)) {
        let score = candidate_score(item);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((item, score)),
        }
    }
    best.map(|(item, _)| item)
}

/// Every plausible ticket price on any offer of any item, bounded to
/// (0, 1000] to drop ids and junk that parse as numbers.
pub fn extract_prices_from_structured(items: &[Value]) -> Vec<f64> {
    let mut prices = Vec::new();
    for item in items {
        let offers: Vec<&Value> = match item.get("offers") {
            Some(Value::Array(list)) => list.iter().collect(),
            Some(offer @ Value::Object(_)) => vec![offer],
            _ => Vec::new(),
        };
        for offer in offers {
            for key in ["price", "lowPrice", "highPrice"] {
                match offer.get(key) {
                    Some(Value::Number(n)) => {
                        if let Some(value) = n.as_f64() {
                            if value > 0.0 && value <= 1000.0 {
                                prices.push(value);
                            }
                        }
                    }
                    Some(Value::String(s)) => {
                        for value in numeric_tokens(s) {
                            if value > 0.0 && value <= 1000.0 {
                                prices.push(value);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    prices
}
