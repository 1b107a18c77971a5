use crate::domain::Venue;
use std::collections::HashMap;

/// Immutable reference table mapping a source slug to its default venue
/// record. Built once and passed into normalization rather than read through
/// a global, so tests can substitute their own table.
#[derive(Debug, Clone)]
pub struct VenueTable {
    venues: HashMap<String, Venue>,
}

fn venue(
    name: &str,
    address: Option<&str>,
    city: &str,
    state: &str,
    postal_code: Option<&str>,
) -> Venue {
    Venue {
        name: Some(name.to_string()),
        address: address.map(str::to_string),
        city: Some(city.to_string()),
        state: Some(state.to_string()),
        postal_code: postal_code.map(str::to_string),
    }
}

impl VenueTable {
    /// The compiled-in table of venues this aggregator scrapes.
    pub fn known() -> Self {
        let mut venues = HashMap::new();
        venues.insert(
            "harlows".to_string(),
            venue("Harlow's", Some("2708 J St"), "Sacramento", "CA", Some("95816")),
        );
        venues.insert(
            "the_starlet_room".to_string(),
            venue("The Starlet Room", Some("2708 J St"), "Sacramento", "CA", Some("95816")),
        );
        venues.insert(
            "ace_of_spades".to_string(),
            venue("Ace of Spades", Some("1417 R St"), "Sacramento", "CA", Some("95811")),
        );
        venues.insert(
            "cafe_colonial".to_string(),
            venue("Cafe Colonial", Some("3522 Stockton Blvd"), "Sacramento", "CA", Some("95820")),
        );
        venues.insert(
            "channel_24".to_string(),
            venue("Channel 24", Some("1800 24th St"), "Sacramento", "CA", Some("95816")),
        );
        venues.insert(
            "goldfield_trading_post".to_string(),
            venue("Goldfield Trading Post", None, "Sacramento", "CA", None),
        );
        venues.insert(
            "old_ironsides".to_string(),
            venue("Old Ironsides", None, "Sacramento", "CA", None),
        );
        venues.insert(
            "the_boardwalk".to_string(),
            venue("The Boardwalk", Some("9426 Greenback Ln"), "Orangevale", "CA", Some("95662")),
        );
        Self { venues }
    }

    /// An arbitrary table, for tests and operator overrides.
    pub fn new(venues: HashMap<String, Venue>) -> Self {
        Self { venues }
    }

    pub fn get(&self, slug: &str) -> Option<&Venue> {
        self.venues.get(slug)
    }
}

impl Default for VenueTable {
    fn default() -> Self {
        Self::known()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_table_covers_all_sources() {
        let table = VenueTable::known();
        for slug in [
            "harlows",
            "the_starlet_room",
            "ace_of_spades",
            "cafe_colonial",
            "channel_24",
            "goldfield_trading_post",
            "old_ironsides",
            "the_boardwalk",
        ] {
            assert!(table.get(slug).is_some(), "missing venue for {slug}");
        }
        assert!(table.get("unknown_venue").is_none());
    }

    #[test]
    fn substitute_tables_are_independent() {
        let mut venues = HashMap::new();
        venues.insert(
            "test_venue".to_string(),
            Venue { name: Some("Test".into()), ..Venue::default() },
        );
        let table = VenueTable::new(venues);
        assert!(table.get("test_venue").is_some());
        assert!(table.get("harlows").is_none());
    }
}
