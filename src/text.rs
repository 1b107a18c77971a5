//! Pure text normalizers: title cleanup, URL canonicalization, and the
//! free-text date/time/price heuristics the extractors fall back on.

use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static GENERIC_EVENT_TITLES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "events",
        "shows",
        "calendar",
        "the boardwalk",
        "harlow's",
        "harlows",
        "the starlet room",
        "old ironsides",
        "goldfield trading post",
        "ace of spades",
        "channel 24",
        "upcoming events",
        "find the latest shows near you",
    ])
});

const GENERIC_TITLE_SUBSTRINGS: [&str; 2] =
    ["find the latest shows near you", "discover upcoming events"];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static EVENTS_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*events?\s*-\s*").unwrap());
static HTML_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX]?[0-9a-fA-F]+|[a-zA-Z]+);").unwrap());
static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static DOLLAR_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\s?(\d+(?:\.\d{1,2})?)").unwrap());
static TICKET_WINDOW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[^.]{0,80}\b(?:ticket|tickets|adv|advance|door|presale|on sale)\b[^.]{0,120}")
        .unwrap()
});
static TRAILING_TZ: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+[A-Z]{2,5}$").unwrap());
static SLUG_DATE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)-\d{6,8}(?:-[a-z]+)?$").unwrap());
static SLUG_MONTH_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)-(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)$").unwrap());
static HAS_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]").unwrap());
static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(20\d{2})[-/](\d{1,2})[-/](\d{1,2})\b").unwrap());
static MONTH_NAME_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:mon|tue|wed|thu|fri|sat|sun)\w*,?\s+)?(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\w*\.?\s+(\d{1,2})(?:,?\s+(\d{4}))?\b",
    )
    .unwrap()
});
static CLOCK_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*([ap]m)\b").unwrap());

const FREE_ADMISSION_PHRASES: [&str; 5] = [
    "free admission",
    "free show",
    "free event",
    "no cover",
    "free entry",
];

/// Decodes the HTML entities that survive into scraped strings (titles and
/// JSON-LD values). Named basics plus numeric references.
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    HTML_ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            let body = &caps[1];
            let decoded = match body {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => {
                    if let Some(hex_digits) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                        u32::from_str_radix(hex_digits, 16).ok().and_then(char::from_u32)
                    } else if let Some(digits) = body.strip_prefix('#') {
                        digits.parse::<u32>().ok().and_then(char::from_u32)
                    } else {
                        None
                    }
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Cleans a scraped event title: unescape, strip boilerplate prefixes and
/// venue-name suffixes, collapse whitespace.
pub fn clean_event_name(raw: &str) -> String {
    let text = unescape(raw.trim());
    if text.is_empty() {
        return String::new();
    }

    let text = EVENTS_PREFIX.replace(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    let mut text = text.trim_matches(|c| c == ' ' || c == '-' || c == '|').to_string();

    if let Some((left, _)) = text.split_once(" | ") {
        text = left.trim().to_string();
    }
    if let Some((left, right)) = text.split_once(" - ") {
        if GENERIC_EVENT_TITLES.contains(right.trim().to_lowercase().as_str()) {
            text = left.trim().to_string();
        }
    }
    text
}

/// True when a title names the venue or site rather than a specific event.
pub fn is_generic_title(raw: &str) -> bool {
    let cleaned = clean_event_name(raw).to_lowercase();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return true;
    }
    if GENERIC_EVENT_TITLES.contains(cleaned) {
        return true;
    }
    GENERIC_TITLE_SUBSTRINGS.iter().any(|token| cleaned.contains(token))
}

/// Strips fragment, query string, and trailing slash. The result is the
/// stable dedup key for an event URL.
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let without_fragment = raw.split('#').next().unwrap_or("");
    let without_query = without_fragment.split('?').next().unwrap_or("");
    let stripped = without_query.trim_end_matches('/');
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Derives a display title from the last meaningful URL path segment.
/// `/event/the-mountain-goats-20250314` becomes `The Mountain Goats`.
pub fn title_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let path = parsed.path().trim_matches('/');
    if path.is_empty() {
        return None;
    }
    let segments: Vec<&str> = path.split('/').collect();
    let mut slug = *segments.last()?;
    // Ticketing pages shaped /artist-name/event/<id> carry the title two
    // segments up
    if segments.len() >= 3 && segments[segments.len() - 2].eq_ignore_ascii_case("event") {
        slug = segments[segments.len() - 3];
    }
    if slug.is_empty() {
        return None;
    }

    let slug = slug.replace(".html", "");
    let slug = SLUG_DATE_SUFFIX.replace(&slug, "");
    let slug = SLUG_MONTH_SUFFIX.replace(&slug, "");
    let slug = slug.replace('-', " ");
    let slug = slug.trim();
    if slug.is_empty() {
        return None;
    }

    let title = if HAS_LETTER.is_match(slug) {
        slug.split_whitespace().map(capitalize_word).collect::<Vec<_>>().join(" ")
    } else {
        slug.to_string()
    };

    let cleaned = clean_event_name(&title);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Parses a structured-data timestamp into (`YYYY-MM-DD`, `HH:MM`) parts.
/// Strict ISO-8601 first, then a fixed list of relaxed patterns with an
/// optional trailing timezone abbreviation stripped. The time part is only
/// populated when the matched pattern carries an hour token.
pub fn parse_iso_datetime(raw: &str) -> (Option<String>, Option<String>) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return (None, None);
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return (
            Some(dt.date_naive().format("%Y-%m-%d").to_string()),
            Some(dt.time().format("%H:%M").to_string()),
        );
    }

    let stripped = TRAILING_TZ.replace(trimmed, "");
    let raw = stripped.as_ref();

    if let Ok(dt) = chrono::DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return (
            Some(dt.date_naive().format("%Y-%m-%d").to_string()),
            Some(dt.time().format("%H:%M").to_string()),
        );
    }

    const DATETIME_FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %I:%M %p",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, format) {
            return (
                Some(dt.date().format("%Y-%m-%d").to_string()),
                Some(dt.time().format("%H:%M").to_string()),
            );
        }
    }

    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return (Some(date.format("%Y-%m-%d").to_string()), None);
        }
    }

    (None, None)
}

pub(crate) fn numeric_tokens(text: &str) -> Vec<f64> {
    let decommaed = text.replace(',', "");
    NUMERIC_TOKEN
        .find_iter(&decommaed)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

/// Parses a price field from structured data: numbers pass through as a
/// single-point range, strings yield the min/max of their numeric substrings.
pub fn parse_price(value: &serde_json::Value) -> (Option<f64>, Option<f64>) {
    match value {
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(v) => (Some(v), Some(v)),
            None => (None, None),
        },
        serde_json::Value::String(s) => {
            let numbers = numeric_tokens(s);
            if numbers.is_empty() {
                (None, None)
            } else {
                let min = numbers.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                (Some(min), Some(max))
            }
        }
        _ => (None, None),
    }
}

/// All positive `$<amount>` tokens in the text.
pub fn extract_prices_from_text(text: &str) -> Vec<f64> {
    if text.is_empty() {
        return Vec::new();
    }
    let decommaed = text.replace(',', "");
    DOLLAR_AMOUNT
        .captures_iter(&decommaed)
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .filter(|value| *value > 0.0)
        .collect()
}

/// Dollar amounts restricted to short text windows around ticket-purchase
/// keywords, so merch and menu prices on the same page are ignored.
pub fn extract_ticket_prices_from_text(text: &str) -> Vec<f64> {
    if text.is_empty() {
        return Vec::new();
    }
    let compact = WHITESPACE.replace_all(text, " ");
    let mut prices = Vec::new();
    for snippet in TICKET_WINDOW.find_iter(&compact) {
        prices.extend(extract_prices_from_text(snippet.as_str()));
    }
    prices
}

fn month_number(token: &str) -> Option<u32> {
    match token.to_lowercase().as_str() {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}

/// Free-text date/time fallback against today's date.
pub fn extract_datetime_from_text(text: &str) -> (Option<String>, Option<String>) {
    extract_datetime_from_text_at(text, Local::now().date_naive())
}

/// Same as [`extract_datetime_from_text`] with the clock injected, so the
/// year-rolling behavior is testable.
pub fn extract_datetime_from_text_at(
    text: &str,
    today: NaiveDate,
) -> (Option<String>, Option<String>) {
    let compact = WHITESPACE.replace_all(text, " ");
    let compact = compact.trim();
    if compact.is_empty() {
        return (None, None);
    }

    let mut local_date: Option<String> = None;

    // Explicit numeric date wins over prose
    if let Some(caps) = NUMERIC_DATE.captures(compact) {
        let year: i32 = caps[1].parse().unwrap_or(0);
        let month: u32 = caps[2].parse().unwrap_or(0);
        let day: u32 = caps[3].parse().unwrap_or(0);
        local_date =
            NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string());
    }

    if local_date.is_none() {
        if let Some(caps) = MONTH_NAME_DATE.captures(compact) {
            if let (Some(month), Ok(day)) = (month_number(&caps[1]), caps[2].parse::<u32>()) {
                match caps.get(3).map(|m| m.as_str().parse::<i32>()) {
                    Some(Ok(year)) => {
                        local_date = NaiveDate::from_ymd_opt(year, month, day)
                            .map(|d| d.format("%Y-%m-%d").to_string());
                    }
                    _ => {
                        // No year in the text: assume the current year, rolling
                        // forward when the date already passed
                        let mut candidate = NaiveDate::from_ymd_opt(today.year(), month, day);
                        if let Some(date) = candidate {
                            if date < today {
                                candidate = NaiveDate::from_ymd_opt(today.year() + 1, month, day);
                            }
                        }
                        local_date = candidate.map(|d| d.format("%Y-%m-%d").to_string());
                    }
                }
            }
        }
    }

    let mut local_time: Option<String> = None;
    if let Some(caps) = CLOCK_TIME.captures(compact) {
        let mut hour: u32 = caps[1].parse().unwrap_or(0);
        let minute: u32 = caps.get(2).map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let meridiem = caps[3].to_lowercase();
        if meridiem == "pm" && hour != 12 {
            hour += 12;
        }
        if meridiem == "am" && hour == 12 {
            hour = 0;
        }
        if hour < 24 && minute < 60 {
            local_time = Some(format!("{:02}:{:02}", hour, minute));
        }
    }

    (local_date, local_time)
}

/// True when the page text advertises free admission.
pub fn looks_free(text: &str) -> bool {
    let lowered = text.to_lowercase();
    FREE_ADMISSION_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_event_name_strips_boilerplate() {
        assert_eq!(clean_event_name("Events - Radio Birds"), "Radio Birds");
        assert_eq!(clean_event_name("  Radio   Birds  "), "Radio Birds");
        assert_eq!(clean_event_name("Radio Birds | Harlow's Nightclub"), "Radio Birds");
        assert_eq!(clean_event_name("Radio Birds - Harlow's"), "Radio Birds");
        assert_eq!(clean_event_name("Radio Birds - Special Guests"), "Radio Birds - Special Guests");
        assert_eq!(clean_event_name("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(clean_event_name("- Radio Birds -"), "Radio Birds");
    }

    #[test]
    fn clean_event_name_is_idempotent() {
        for raw in [
            "Events - Radio Birds",
            "Radio Birds | Harlow's",
            "  spaced   out  ",
            "Tom &amp; Jerry",
            "",
            "- | -",
        ] {
            let once = clean_event_name(raw);
            assert_eq!(clean_event_name(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn generic_titles_detected() {
        assert!(is_generic_title("Upcoming Events"));
        assert!(is_generic_title("Harlow's"));
        assert!(is_generic_title(""));
        assert!(is_generic_title("Find the latest shows near you tonight"));
        assert!(!is_generic_title("Radio Birds live"));
    }

    #[test]
    fn canonicalize_strips_query_and_fragment() {
        assert_eq!(canonicalize_url("https://x.com/a?b=1#c").as_deref(), Some("https://x.com/a"));
        assert_eq!(canonicalize_url("https://x.com/a/").as_deref(), Some("https://x.com/a"));
        assert_eq!(canonicalize_url(""), None);
    }

    #[test]
    fn title_from_url_cases() {
        assert_eq!(
            title_from_url("https://site.com/event/the-mountain-goats-20250314").as_deref(),
            Some("The Mountain Goats")
        );
        assert_eq!(
            title_from_url("https://site.com/shows/big-show.html").as_deref(),
            Some("Big Show")
        );
        assert_eq!(
            title_from_url("https://tickets.com/radio-birds/event/0A004F").as_deref(),
            Some("Radio Birds")
        );
        assert_eq!(
            title_from_url("https://site.com/events/acid-tapes-oct").as_deref(),
            Some("Acid Tapes")
        );
        assert_eq!(title_from_url("https://site.com/"), None);
    }

    #[test]
    fn parse_iso_datetime_variants() {
        assert_eq!(
            parse_iso_datetime("2025-03-14T19:30:00Z"),
            (Some("2025-03-14".into()), Some("19:30".into()))
        );
        assert_eq!(parse_iso_datetime("2025-03-14"), (Some("2025-03-14".into()), None));
        assert_eq!(
            parse_iso_datetime("03/14/2025 7:30 pm"),
            (Some("2025-03-14".into()), Some("19:30".into()))
        );
        assert_eq!(
            parse_iso_datetime("2025-03-14 19:30:00 PDT"),
            (Some("2025-03-14".into()), Some("19:30".into()))
        );
        assert_eq!(parse_iso_datetime("2025/03/14"), (Some("2025-03-14".into()), None));
        assert_eq!(parse_iso_datetime("soon"), (None, None));
        assert_eq!(parse_iso_datetime(""), (None, None));
    }

    #[test]
    fn parse_price_variants() {
        assert_eq!(parse_price(&json!("$10-$15")), (Some(10.0), Some(15.0)));
        assert_eq!(parse_price(&json!(25)), (Some(25.0), Some(25.0)));
        assert_eq!(parse_price(&json!("1,250.50")), (Some(1250.5), Some(1250.5)));
        assert_eq!(parse_price(&json!("free")), (None, None));
        assert_eq!(parse_price(&json!(null)), (None, None));
    }

    #[test]
    fn dollar_amounts_from_text() {
        assert_eq!(extract_prices_from_text("$10 adv / $ 15 door"), vec![10.0, 15.0]);
        assert_eq!(extract_prices_from_text("$1,000 table"), vec![1000.0]);
        assert!(extract_prices_from_text("$0 cover").is_empty());
        assert!(extract_prices_from_text("no prices here").is_empty());
    }

    #[test]
    fn ticket_windows_exclude_unrelated_amounts() {
        let text = "T-shirts are $25 at the merch table. Tickets $10 advance, $15 at the door.";
        let prices = extract_ticket_prices_from_text(text);
        assert!(prices.contains(&10.0));
        assert!(prices.contains(&15.0));
        assert!(!prices.contains(&25.0));
    }

    #[test]
    fn free_text_datetime() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(
            extract_datetime_from_text_at("Friday, March 14, 2025 doors 7:30pm", today),
            (Some("2025-03-14".into()), Some("19:30".into()))
        );
        assert_eq!(
            extract_datetime_from_text_at("Live music 2025-09-05", today),
            (Some("2025-09-05".into()), None)
        );
        // Year-less date already past rolls to next year
        assert_eq!(
            extract_datetime_from_text_at("Jan 5 doors 8pm", today),
            (Some("2026-01-05".into()), Some("20:00".into()))
        );
        // Year-less date still ahead stays in the current year
        assert_eq!(
            extract_datetime_from_text_at("Sept 12", today).0.as_deref(),
            Some("2025-09-12")
        );
        assert_eq!(
            extract_datetime_from_text_at("doors at 12am", today).1.as_deref(),
            Some("00:00")
        );
        assert_eq!(
            extract_datetime_from_text_at("matinee 12pm", today).1.as_deref(),
            Some("12:00")
        );
        assert_eq!(extract_datetime_from_text_at("", today), (None, None));
    }

    #[test]
    fn free_admission_phrases() {
        assert!(looks_free("FREE ADMISSION all night"));
        assert!(looks_free("no cover before 9"));
        assert!(!looks_free("$5 cover"));
    }
}
