//! Storage key derivation.
//!
//! Keys are `{owner}:{nanos}:{filename}`. The filename is kept verbatim; the
//! timestamp component is what makes keys unique.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

pub const KEY_SEPARATOR: char = ':';

pub fn derive_storage_key(owner_id: &str, nanos: i64, filename: &str) -> String {
    format!("{owner_id}{KEY_SEPARATOR}{nanos}{KEY_SEPARATOR}{filename}")
}

/// Hands out strictly increasing nanosecond stamps, so two keys derived in the
/// same clock tick (or across a backwards clock step) still differ.
#[derive(Debug, Default)]
pub struct KeyClock {
    last: AtomicI64,
}

impl KeyClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_nanos(&self, now: DateTime<Utc>) -> i64 {
        // timestamp_nanos_opt is None only past year 2262
        let wall = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000));
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    pub fn key_for(&self, owner_id: &str, now: DateTime<Utc>, filename: &str) -> String {
        derive_storage_key(owner_id, self.next_nanos(now), filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn distinct_instants_give_distinct_keys() {
        let a = derive_storage_key("u1", 1_700_000_000_000_000_001, "a.txt");
        let b = derive_storage_key("u1", 1_700_000_000_000_000_002, "a.txt");
        assert_ne!(a, b);
        assert_eq!(a, "u1:1700000000000000001:a.txt");
    }

    #[test]
    fn same_instant_same_name_still_unique() {
        let clock = KeyClock::new();
        let now = Utc.timestamp_opt(1_700_000_000, 5).unwrap();
        let keys: HashSet<String> = (0..1000).map(|_| clock.key_for("u1", now, "a.txt")).collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn clock_never_goes_backwards() {
        let clock = KeyClock::new();
        let later = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        let earlier = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let first = clock.next_nanos(later);
        let second = clock.next_nanos(earlier);
        assert!(second > first);
    }

    #[test]
    fn separator_in_filename_passes_through() {
        let key = derive_storage_key("u1", 7, "odd:name\n.txt");
        assert_eq!(key, "u1:7:odd:name\n.txt");
    }
}
