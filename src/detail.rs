//! Resolution of one event-detail page into an [`Event`]: structured-data
//! extraction first, free-text fallback second, then heuristic backfill for
//! image, date/time, and price (including a bounded ticket-link crawl).

use crate::discover::TICKET_HOST_HINTS;
use crate::domain::{Event, Venue};
use crate::fetch::Fetcher;
use crate::jsonld::{extract_prices_from_structured, parse_structured_items, pick_best_event_candidate};
use crate::text::{
    canonicalize_url, clean_event_name, extract_datetime_from_text, extract_prices_from_text,
    extract_ticket_prices_from_text, is_generic_title, looks_free, parse_iso_datetime, parse_price,
    title_from_url, unescape,
};
use crate::venues::VenueTable;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

/// Bounds for the ticket-link price crawl: first hop tries the top-ranked
/// links on the event page, second hop the links found on each of those.
const TICKET_CRAWL_FIRST_HOP: usize = 5;
const TICKET_CRAWL_SECOND_HOP: usize = 3;
const MAX_TICKET_CRAWL_DEPTH: u8 = 2;

static TICKET_PROVIDER_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)https?://[^"' <>()\\]+(?:ticketmaster|etix|axs|eventbrite|seetickets)[^"' <>()\\]*"#,
    )
    .unwrap()
});

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").unwrap());
static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

const EXCLUDED_IMAGE_TOKENS: [&str; 5] = ["logo", "icon", "favicon", "sprite", "placeholder"];

/// Everything the async price crawl needs after the page itself has been
/// parsed, so no DOM handle crosses an await point.
pub struct PageAnalysis {
    pub event: Event,
    pub page_text: String,
    pub ticket_links: Vec<String>,
}

fn meta_content<'a>(doc: &'a Html, selector: &str) -> Option<&'a str> {
    let parsed = Selector::parse(selector).ok()?;
    doc.select(&parsed)
        .next()
        .and_then(|el| el.value().attr("content"))
        .filter(|content| !content.trim().is_empty())
}

fn element_text(el: scraper::ElementRef<'_>) -> String {
    let parts: Vec<&str> =
        el.text().map(str::trim).filter(|part| !part.is_empty()).collect();
    parts.join(" ")
}

fn page_text(doc: &Html) -> String {
    element_text(doc.root_element())
}

/// Resolves a possibly-relative image/link reference against the page URL.
fn absolutize(candidate: &str, page_url: &str) -> Option<String> {
    match Url::parse(page_url) {
        Ok(base) => base.join(candidate).ok().map(|joined| joined.to_string()),
        Err(_) => Some(candidate.to_string()),
    }
}

/// Best page title by preference order: og:title, twitter:title, first h1,
/// then the document title. The first candidate that cleans to a
/// non-generic name wins.
fn extract_best_title(doc: &Html) -> Option<String> {
    let mut candidates: Vec<String> = Vec::new();
    if let Some(content) = meta_content(doc, r#"meta[property="og:title"]"#) {
        candidates.push(content.to_string());
    }
    if let Some(content) = meta_content(doc, r#"meta[name="twitter:title"]"#) {
        candidates.push(content.to_string());
    }
    if let Some(h1) = doc.select(&H1_SELECTOR).next() {
        candidates.push(element_text(h1));
    }
    if let Some(title) = doc.select(&TITLE_SELECTOR).next() {
        candidates.push(element_text(title));
    }

    for candidate in candidates {
        let cleaned = clean_event_name(&candidate);
        if !cleaned.is_empty() && !is_generic_title(&cleaned) {
            return Some(cleaned);
        }
    }
    None
}

/// Largest plausible event image: metadata images plus any sufficiently big
/// `<img>`, skipping logo/icon filenames, preferring an image whose alt text
/// names the event. The winner is resolved to an absolute URL.
fn extract_best_image_url(doc: &Html, event_name: &str, page_url: &str) -> Option<String> {
    let mut candidates: Vec<String> = Vec::new();
    for selector in [
        r#"meta[property="og:image"]"#,
        r#"meta[name="twitter:image"]"#,
        r#"meta[itemprop="image"]"#,
    ] {
        if let Some(content) = meta_content(doc, selector) {
            candidates.push(content.to_string());
        }
    }

    let name_lower = event_name.to_lowercase();
    for image in doc.select(&IMG_SELECTOR) {
        let Some(src) = image.value().attr("src") else {
            continue;
        };
        let alt = image.value().attr("alt").unwrap_or("").to_lowercase();
        let width: u32 =
            image.value().attr("width").and_then(|w| w.parse().ok()).unwrap_or(0);
        let height: u32 =
            image.value().attr("height").and_then(|h| h.parse().ok()).unwrap_or(0);
        if width > 0 && width < 250 {
            continue;
        }
        if height > 0 && height < 250 {
            continue;
        }
        if !name_lower.is_empty() && alt.contains(&name_lower) {
            candidates.insert(0, src.to_string());
        } else {
            candidates.push(src.to_string());
        }
    }

    candidates.into_iter().find_map(|candidate| {
        let lowered = candidate.to_lowercase();
        if candidate.is_empty()
            || EXCLUDED_IMAGE_TOKENS.iter().any(|token| lowered.contains(token))
        {
            return None;
        }
        absolutize(&candidate, page_url)
    })
}

/// Ticket-purchase anchors ranked by text ("buy tickets" > "get tickets" >
/// "tickets" > "buy") with a bonus for known ticketing hosts. Returns
/// absolute URLs, deduplicated, best first.
fn find_ticket_links(doc: &Html, page_url: &str) -> Vec<String> {
    let base = Url::parse(page_url).ok();
    let mut ranked: Vec<(i32, String)> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    for anchor in doc.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !seen.insert(href.to_string()) {
            continue;
        }
        let anchor_text = element_text(anchor).to_lowercase();

        let mut score = 0;
        if anchor_text.contains("buy tickets") {
            score += 6;
        } else if anchor_text.contains("get tickets") {
            score += 5;
        } else if anchor_text.contains("tickets") {
            score += 4;
        } else if anchor_text.contains("buy") {
            score += 3;
        }

        let href_lower = href.to_lowercase();
        if TICKET_HOST_HINTS.iter().any(|host| href_lower.contains(host)) {
            score += 4;
        }

        if score > 0 {
            let absolute = match &base {
                Some(base) => match base.join(href) {
                    Ok(joined) => joined.to_string(),
                    Err(_) => continue,
                },
                None => href.to_string(),
            };
            ranked.push((score, absolute));
        }
    }

    // Stable sort keeps document order within a score tier
    ranked.sort_by_key(|(score, _)| std::cmp::Reverse(*score));
    ranked.into_iter().map(|(_, href)| href).collect()
}

/// Ticketing-provider URLs embedded in raw markup (scripts, data blobs).
fn extract_ticket_links_from_html(raw_html: &str, base_url: &str) -> Vec<String> {
    if raw_html.is_empty() {
        return Vec::new();
    }
    let decoded = raw_html.replace("\\/", "/");
    let base = Url::parse(base_url).ok();
    let mut links = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    for m in TICKET_PROVIDER_URL.find_iter(&decoded) {
        let absolute = match &base {
            Some(base) => match base.join(m.as_str()) {
                Ok(joined) => joined.to_string(),
                Err(_) => continue,
            },
            None => m.as_str().to_string(),
        };
        if seen.insert(absolute.clone()) {
            links.push(absolute);
        }
    }
    links
}

fn first_string(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Array(list) => list.first().and_then(Value::as_str),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Normalizes the winning JSON-LD candidate into an [`Event`], falling back
/// to the static venue table for any missing venue field.
fn event_from_structured(
    source: &str,
    data: &Value,
    fallback_url: &str,
    venues: &VenueTable,
) -> Event {
    let name = clean_event_name(
        non_empty(data.get("name").and_then(Value::as_str)).unwrap_or("Untitled Show"),
    );
    let url = data
        .get("url")
        .and_then(Value::as_str)
        .and_then(canonicalize_url)
        .or_else(|| canonicalize_url(fallback_url));

    let image = data.get("image").and_then(first_string).map(str::to_string);

    let (local_date, local_time) = data
        .get("startDate")
        .and_then(Value::as_str)
        .map(parse_iso_datetime)
        .unwrap_or((None, None));

    let offer = match data.get("offers") {
        Some(Value::Array(list)) => list.first(),
        Some(offer @ Value::Object(_)) => Some(offer),
        _ => None,
    };
    let (price_min, price_max) = offer
        .and_then(|offer| offer.get("price"))
        .map(parse_price)
        .unwrap_or((None, None));
    let currency = offer
        .and_then(|offer| offer.get("priceCurrency"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let location = data.get("location").filter(|v| v.is_object());
    let address = location.and_then(|l| l.get("address")).filter(|v| v.is_object());

    let location_name =
        unescape(location.and_then(|l| l.get("name")).and_then(Value::as_str).unwrap_or(""));
    // Harlow's detail pages host Starlet Room shows under the same domain;
    // route those to the upstairs room's venue record.
    let venue_key = if source == "harlows" && location_name.to_lowercase().contains("starlet") {
        "the_starlet_room"
    } else {
        source
    };
    let fallback = venues.get(venue_key).cloned().unwrap_or_default();

    let address_field = |key: &str, default: Option<&String>| -> Option<String> {
        address
            .and_then(|a| a.get(key))
            .and_then(Value::as_str)
            .map(unescape)
            .filter(|s| !s.is_empty())
            .or_else(|| default.cloned())
    };

    let venue = Venue {
        name: if location_name.is_empty() { fallback.name.clone() } else { Some(location_name) },
        address: address_field("streetAddress", fallback.address.as_ref()),
        city: address_field("addressLocality", fallback.city.as_ref()),
        state: address_field("addressRegion", fallback.state.as_ref()),
        postal_code: address_field("postalCode", fallback.postal_code.as_ref()),
    };

    let genre = match data.get("genre") {
        Some(Value::String(s)) if !s.is_empty() => Some(unescape(s)),
        Some(Value::Array(list)) => {
            let joined = list
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            if joined.is_empty() {
                None
            } else {
                Some(unescape(&joined))
            }
        }
        _ => None,
    };

    let mut event = Event::new(source, name, url, local_date, local_time);
    event.image = image;
    event.price_min = price_min;
    event.price_max = price_max;
    event.currency = currency;
    event.genre = genre;
    event.venue = venue;
    event
}

/// Free-text fallback when a page carries no structured event data. Fails
/// (returns None) when no non-generic title can be recovered.
fn event_from_page_text(
    source: &str,
    doc: &Html,
    url: &str,
    text: &str,
    venues: &VenueTable,
) -> Option<Event> {
    let (local_date, local_time) = extract_datetime_from_text(text);
    let title = extract_best_title(doc)?;

    let mut event = Event::new(source, title, canonicalize_url(url), local_date, local_time);
    event.image =
        meta_content(doc, r#"meta[property="og:image"]"#).and_then(|content| absolutize(content.trim(), url));
    event.currency = Some("USD".to_string());
    event.venue = venues.get(source).cloned().unwrap_or(Venue {
        city: Some("Sacramento".to_string()),
        state: Some("CA".to_string()),
        ..Venue::default()
    });
    Some(event)
}

/// Parses fetched detail-page markup into an event plus the material the
/// async price crawl needs. Returns None when the page yields no usable
/// (non-generic) title.
pub fn analyze_event_page(
    html: &str,
    url: &str,
    source: &str,
    venues: &VenueTable,
) -> Option<PageAnalysis> {
    let doc = Html::parse_document(html);
    let items = parse_structured_items(&doc);
    let text = page_text(&doc);

    let mut event = match pick_best_event_candidate(&items) {
        Some(data) => event_from_structured(source, data, url, venues),
        None => event_from_page_text(source, &doc, url, &text, venues)?,
    };

    // A title naming the venue instead of the show gets one rescue attempt
    // from the URL slug; failing that the page yields nothing.
    if is_generic_title(&event.name) {
        let derived = title_from_url(url)?;
        if is_generic_title(&derived) {
            return None;
        }
        event.name = derived;
        event.recompute_id();
    }

    if event.image.is_none() {
        event.image = extract_best_image_url(&doc, &event.name, url);
    }

    if event.local_date.is_none() || event.local_time.is_none() {
        let (local_date, local_time) = extract_datetime_from_text(&text);
        if event.local_date.is_none() {
            event.set_local_date(local_date);
        }
        if event.local_time.is_none() {
            event.set_local_time(local_time);
        }
    }

    // Price tiers 1 and 2: structured offers, then keyword-windowed page text
    if event.needs_price() {
        let structured_prices = extract_prices_from_structured(&items);
        if let Some(best) = structured_prices.iter().cloned().reduce(f64::min) {
            event.set_price(best);
        }
    }
    if event.needs_price() {
        let page_prices = extract_ticket_prices_from_text(&text);
        if let Some(best) = page_prices.iter().cloned().reduce(f64::min) {
            event.set_price(best);
        }
    }

    // Tier 3 candidates, only gathered while a price is still missing
    let mut ticket_links = Vec::new();
    if event.needs_price() {
        ticket_links = find_ticket_links(&doc, url);
        for link in extract_ticket_links_from_html(html, url) {
            if !ticket_links.contains(&link) {
                ticket_links.push(link);
            }
        }
        // Point the event at its ticketing page even when no price turns up
        if let Some(best_link) = ticket_links.first() {
            event.url = Some(best_link.clone());
        }
    }

    Some(PageAnalysis { event, page_text: text, ticket_links })
}

/// Price and follow-up links from one ticket-purchase page.
fn analyze_ticket_page(html: &str, page_url: &str) -> (Vec<f64>, Vec<String>) {
    let doc = Html::parse_document(html);
    let items = parse_structured_items(&doc);
    let mut prices = extract_prices_from_structured(&items);
    prices.extend(extract_prices_from_text(html));
    prices.extend(extract_ticket_prices_from_text(html));

    let mut links = find_ticket_links(&doc, page_url);
    for link in extract_ticket_links_from_html(html, page_url) {
        if !links.contains(&link) {
            links.push(link);
        }
    }
    (prices, links)
}

struct CrawlItem {
    url: String,
    depth: u8,
}

/// Follows ranked ticket links looking for a price: an explicit worklist
/// bounded by depth and branching factor, stopping at the first price found
/// anywhere.
async fn crawl_ticket_prices(fetcher: &Fetcher, event: &mut Event, ticket_links: &[String]) {
    let mut stack: Vec<CrawlItem> = ticket_links
        .iter()
        .take(TICKET_CRAWL_FIRST_HOP)
        .rev()
        .map(|url| CrawlItem { url: url.clone(), depth: 1 })
        .collect();

    while let Some(item) = stack.pop() {
        let Some(html) = fetcher.get_text(&item.url).await else {
            continue;
        };
        let (prices, nested_links) = analyze_ticket_page(&html, &item.url);
        if let Some(best) = prices.iter().cloned().reduce(f64::min) {
            event.set_price(best);
            return;
        }
        if item.depth < MAX_TICKET_CRAWL_DEPTH {
            for url in nested_links.iter().take(TICKET_CRAWL_SECOND_HOP).rev() {
                stack.push(CrawlItem { url: url.clone(), depth: item.depth + 1 });
            }
        }
    }
}

/// Discards a 0/0 price unless the page text actually advertises a free
/// event; `$0` placeholders are noise, not free admission.
pub fn zero_price_correction(event: &mut Event, page_text: &str) {
    if event.price_min == Some(0.0) && event.price_max == Some(0.0) && !looks_free(page_text) {
        event.price_min = None;
        event.price_max = None;
    }
}

/// Fetches and resolves one event-detail page. None when the page is
/// unfetchable or yields no usable title.
pub async fn scrape_event_page(
    fetcher: &Fetcher,
    url: &str,
    source: &str,
    venues: &VenueTable,
) -> Option<Event> {
    let html = fetcher.get_text(url).await?;
    let Some(mut analysis) = analyze_event_page(&html, url, source, venues) else {
        debug!(%url, "page yielded no usable event");
        return None;
    };

    if analysis.event.needs_price() && !analysis.ticket_links.is_empty() {
        crawl_ticket_prices(fetcher, &mut analysis.event, &analysis.ticket_links).await;
    }
    zero_price_correction(&mut analysis.event, &analysis.page_text);

    Some(analysis.event)
}
