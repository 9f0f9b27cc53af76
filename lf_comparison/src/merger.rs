use crate::models::{ElementKey, ElementRecord, Measurements, PairedRecord};
use log::debug;
use std::collections::BTreeMap;

/// Index records by key. The first occurrence of a duplicated key wins.
fn index_by_key(records: Vec<ElementRecord>, source: &str) -> BTreeMap<ElementKey, Measurements> {
    let mut index = BTreeMap::new();
    let mut duplicates = 0usize;

    for record in records {
        if index.contains_key(&record.key) {
            duplicates += 1;
            continue;
        }
        index.insert(record.key, record.measurements);
    }

    if duplicates > 0 {
        debug!("{}: ignored {} rows with duplicated keys", source, duplicates);
    }
    index
}

/// Inner join on the element key.
///
/// Only keys present in both sources survive; everything else is dropped.
/// The result is sorted by key ascending.
pub fn merge_common(reference: Vec<ElementRecord>, candidate: Vec<ElementRecord>) -> Vec<PairedRecord> {
    let reference = index_by_key(reference, "reference");
    let mut candidate = index_by_key(candidate, "candidate");

    let unmatched_reference = reference.keys().filter(|k| !candidate.contains_key(*k)).count();

    let merged: Vec<PairedRecord> = reference
        .into_iter()
        .filter_map(|(key, reference)| {
            candidate.remove(&key).map(|candidate| PairedRecord {
                key,
                reference,
                candidate,
            })
        })
        .collect();

    debug!(
        "Merged {} common keys ({} reference-only, {} candidate-only)",
        merged.len(),
        unmatched_reference,
        candidate.len()
    );

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn record(id: &str, side: Option<&str>, current: f64) -> ElementRecord {
        ElementRecord {
            key: ElementKey::new(id, side.map(String::from)),
            measurements: Measurements {
                current: Some(current),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_merge_is_intersection() {
        let reference = vec![
            record("B", Some("1"), 1.0),
            record("A", Some("2"), 2.0),
            record("A", Some("1"), 3.0),
            record("C", Some("1"), 4.0),
        ];
        let candidate = vec![
            record("A", Some("1"), 30.0),
            record("B", Some("1"), 10.0),
            record("D", Some("1"), 40.0),
            record("A", Some("2"), 20.0),
        ];

        let ref_keys: BTreeSet<_> = reference.iter().map(|r| r.key.clone()).collect();
        let cand_keys: BTreeSet<_> = candidate.iter().map(|r| r.key.clone()).collect();
        let expected: Vec<_> = ref_keys.intersection(&cand_keys).cloned().collect();

        let merged = merge_common(reference, candidate);
        let keys: Vec<_> = merged.iter().map(|p| p.key.clone()).collect();
        assert_eq!(keys, expected);

        assert_eq!(merged[0].key.to_string(), "A/1");
        assert_eq!(merged[0].reference.current, Some(3.0));
        assert_eq!(merged[0].candidate.current, Some(30.0));
    }

    #[test]
    fn test_side_is_part_of_the_key() {
        let merged = merge_common(
            vec![record("A", Some("1"), 1.0)],
            vec![record("A", Some("2"), 1.0)],
        );
        assert!(merged.is_empty());
    }

    #[test]
    fn test_duplicate_keys_keep_first() {
        let merged = merge_common(
            vec![record("A", None, 1.0), record("A", None, 99.0)],
            vec![record("A", None, 2.0)],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].reference.current, Some(1.0));
    }
}
