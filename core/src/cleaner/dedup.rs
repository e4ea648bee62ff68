use std::collections::HashSet;
use std::hash::Hash;

/// Keep the first row for each key, preserving order.
/// Returns the survivors and how many rows were removed.
pub fn dedup_by_key<T, K, F>(rows: Vec<T>, key: F) -> (Vec<T>, usize)
where
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    let before = rows.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<T> = rows.into_iter().filter(|row| seen.insert(key(row))).collect();
    let removed = before - kept.len();
    (kept, removed)
}
