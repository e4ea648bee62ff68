//! Surrogate and calendar keys for the star schema.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::collections::HashMap;
use std::hash::Hash;

/// Hands out 1-based keys in the order natural keys are first seen.
#[derive(Debug, Clone)]
pub struct KeyAllocator<K> {
    keys: HashMap<K, u32>,
}

impl<K: Hash + Eq> Default for KeyAllocator<K> {
    fn default() -> Self {
        Self { keys: HashMap::new() }
    }
}

impl<K: Hash + Eq> KeyAllocator<K> {
    /// Existing key for `natural`, or the next free one.
    /// The flag is true when the key was just assigned.
    pub fn assign(&mut self, natural: K) -> (u32, bool) {
        let next = self.keys.len() as u32 + 1;
        match self.keys.entry(natural) {
            std::collections::hash_map::Entry::Occupied(e) => (*e.get(), false),
            std::collections::hash_map::Entry::Vacant(e) => (*e.insert(next), true),
        }
    }

    pub fn get<Q>(&self, natural: &Q) -> Option<u32>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.keys.get(natural).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// `YYYYMMDD`
pub fn date_key(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// `hour × 100`; minutes fall into their hour's bucket.
pub fn time_key(at: NaiveDateTime) -> i32 {
    at.hour() as i32 * 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_dense_and_first_seen() {
        let mut keys = KeyAllocator::default();
        assert_eq!(keys.assign("b".to_string()), (1, true));
        assert_eq!(keys.assign("a".to_string()), (2, true));
        assert_eq!(keys.assign("b".to_string()), (1, false));
        assert_eq!(keys.get("a"), Some(2));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn calendar_keys() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(17, 45, 0).unwrap();
        assert_eq!(date_key(at.date()), 20240309);
        assert_eq!(time_key(at), 1700);
    }
}
