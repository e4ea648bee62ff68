use crate::error::{EtlError, EtlResult};
use std::collections::HashSet;

/// Drop rows whose meter_number is not in `known`.
///
/// Losing every row of a non-empty table while the meter table has entries
/// means the join key itself is broken, and that is an error.
pub fn retain_known_meters<T, F>(
    entity: &'static str,
    rows: Vec<T>,
    known: &HashSet<String>,
    meter_of: F,
) -> EtlResult<(Vec<T>, usize)>
where
    F: Fn(&T) -> &str,
{
    let before = rows.len();
    let kept: Vec<T> = rows.into_iter().filter(|row| known.contains(meter_of(row))).collect();
    let dropped = before - kept.len();

    if before > 0 && kept.is_empty() && !known.is_empty() {
        return Err(EtlError::JoinKeyMismatch { entity, rows: before });
    }
    if dropped > 0 {
        log::warn!("stage=clean {entity}: {dropped} rows reference unknown meters and were excluded");
    }
    Ok((kept, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn orphans_are_counted_not_fatal() {
        let rows = vec!["m1", "m9", "m2"];
        let (kept, dropped) = retain_known_meters("readings", rows, &known(&["m1", "m2"]), |r| *r).unwrap();
        assert_eq!(kept, vec!["m1", "m2"]);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn total_mismatch_fails_loudly() {
        let rows = vec!["x1", "x2"];
        match retain_known_meters("bills", rows, &known(&["m1"]), |r| *r) {
            Err(EtlError::JoinKeyMismatch { entity, rows }) => {
                assert_eq!(entity, "bills");
                assert_eq!(rows, 2);
            }
            other => panic!("expected JoinKeyMismatch, got {other:?}"),
        }
    }

    #[test]
    fn empty_tables_pass() {
        let (kept, dropped) = retain_known_meters::<&str, _>("payments", vec![], &known(&["m1"]), |r| *r).unwrap();
        assert!(kept.is_empty());
        assert_eq!(dropped, 0);
    }
}
