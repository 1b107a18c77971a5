//! Flat-file snapshot of the last successful scrape. Replaced wholesale on
//! every refresh; corruption or absence just means an empty, stale cache.

use crate::domain::Event;
use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub fetched_at: i64,
    pub events: Vec<Event>,
}

impl CacheSnapshot {
    /// True while the snapshot is younger than the TTL.
    pub fn is_fresh(&self, ttl_seconds: i64) -> bool {
        Utc::now().timestamp() - self.fetched_at < ttl_seconds
    }
}

/// Reads the snapshot; a missing or corrupt file yields an empty stale one.
pub fn load(path: &Path) -> CacheSnapshot {
    let Ok(payload) = fs::read_to_string(path) else {
        return CacheSnapshot::default();
    };
    match serde_json::from_str(&payload) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cache snapshot unreadable, starting empty");
            CacheSnapshot::default()
        }
    }
}

/// Writes a fresh snapshot stamped with the current time.
pub fn save(path: &Path, events: &[Event]) -> Result<()> {
    let snapshot = CacheSnapshot { fetched_at: Utc::now().timestamp(), events: events.to_vec() };
    let payload = serde_json::to_string(&snapshot)?;
    fs::write(path, payload)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Event;
    use tempfile::tempdir;

    #[test]
    fn round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let events =
            vec![Event::new("harlows", "Show".into(), None, Some("2025-05-01".into()), None)];

        save(&path, &events).unwrap();
        let snapshot = load(&path);
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(snapshot.events[0].name, "Show");
        assert!(snapshot.is_fresh(60));
        assert!(!snapshot.is_fresh(0));
    }

    #[test]
    fn missing_or_corrupt_cache_is_empty_and_stale() {
        let dir = tempdir().unwrap();
        let missing = load(&dir.path().join("nope.json"));
        assert!(missing.events.is_empty());
        assert!(!missing.is_fresh(3600));

        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{broken").unwrap();
        let corrupt = load(&path);
        assert!(corrupt.events.is_empty());
        assert_eq!(corrupt.fetched_at, 0);
    }
}
