use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Venue fields attached to every event. Populated from structured data when
/// a page supplies them, otherwise from the static reference table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

/// One normalized event as served in the aggregated feed.
///
/// Field names serialize in camelCase to match the feed contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub local_date: Option<String>,
    pub local_time: Option<String>,
    #[serde(rename = "dateTBA")]
    pub date_tba: bool,
    #[serde(rename = "timeTBA")]
    pub time_tba: bool,
    pub status: Option<String>,
    pub image: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub currency: Option<String>,
    pub genre: Option<String>,
    pub sub_genre: Option<String>,
    pub segment: Option<String>,
    pub venue: Venue,
    pub source: String,
}

/// Deterministic event fingerprint. Same inputs always hash to the same id,
/// which keeps re-scrapes idempotent and the cache reproducible.
pub fn build_id(source: &str, url: Option<&str>, name: &str, local_date: Option<&str>) -> String {
    let base = format!(
        "{}|{}|{}|{}",
        source,
        url.unwrap_or(""),
        name,
        local_date.unwrap_or("")
    );
    hex::encode(Sha256::digest(base.as_bytes()))
}

impl Event {
    pub fn new(
        source: &str,
        name: String,
        url: Option<String>,
        local_date: Option<String>,
        local_time: Option<String>,
    ) -> Self {
        let id = build_id(source, url.as_deref(), &name, local_date.as_deref());
        Event {
            id,
            name,
            url,
            date_tba: local_date.is_none(),
            time_tba: local_time.is_none(),
            local_date,
            local_time,
            status: None,
            image: None,
            price_min: None,
            price_max: None,
            currency: None,
            genre: None,
            sub_genre: None,
            segment: None,
            venue: Venue::default(),
            source: source.to_string(),
        }
    }

    /// Recomputes the fingerprint after a field it depends on changed.
    pub fn recompute_id(&mut self) {
        self.id = build_id(
            &self.source,
            self.url.as_deref(),
            &self.name,
            self.local_date.as_deref(),
        );
    }

    pub fn set_local_date(&mut self, local_date: Option<String>) {
        self.date_tba = local_date.is_none();
        self.local_date = local_date;
    }

    pub fn set_local_time(&mut self, local_time: Option<String>) {
        self.time_tba = local_time.is_none();
        self.local_time = local_time;
    }

    /// True while no usable price has been found. A 0 on both ends counts as
    /// unknown so the backfill tiers still run.
    pub fn needs_price(&self) -> bool {
        let unknown = |value: Option<f64>| value.map_or(true, |p| p == 0.0);
        unknown(self.price_min) && unknown(self.price_max)
    }

    /// Records a single observed price as both ends of the range, defaulting
    /// the currency to USD when nothing better is known.
    pub fn set_price(&mut self, value: f64) {
        self.price_min = Some(value);
        self.price_max = Some(value);
        if self.currency.is_none() {
            self.currency = Some("USD".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_id_is_stable() {
        let a = build_id("harlows", Some("https://x.com/a"), "Show", Some("2025-03-14"));
        let b = build_id("harlows", Some("https://x.com/a"), "Show", Some("2025-03-14"));
        assert_eq!(a, b);
        assert_ne!(a, build_id("harlows", Some("https://x.com/a"), "Show", None));
    }

    #[test]
    fn tba_flags_mirror_nullness() {
        let event = Event::new("harlows", "Show".into(), None, Some("2025-03-14".into()), None);
        assert!(!event.date_tba);
        assert!(event.time_tba);

        let mut event = event;
        event.set_local_date(None);
        assert!(event.date_tba);
        event.set_local_time(Some("19:30".into()));
        assert!(!event.time_tba);
    }

    #[test]
    fn zero_price_still_counts_as_needing_price() {
        let mut event = Event::new("harlows", "Show".into(), None, None, None);
        assert!(event.needs_price());
        event.price_min = Some(0.0);
        event.price_max = Some(0.0);
        assert!(event.needs_price());
        event.set_price(15.0);
        assert!(!event.needs_price());
        assert_eq!(event.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn serializes_camel_case() {
        let event = Event::new("harlows", "Show".into(), None, None, None);
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("localDate").is_some());
        assert!(json.get("dateTBA").is_some());
        assert!(json.get("priceMin").is_some());
        assert!(json["venue"].get("postalCode").is_some());
    }
}
