use crate::config::DEFAULT_EPSILON;
use crate::models::{ComparisonRecord, FieldComparison, PairedRecord, Quantity};

/// Computes per-field deviations between the reference and candidate source.
///
/// Values below `epsilon` in magnitude are solver noise and are snapped to
/// zero before anything else. Percentages are relative to the reference
/// value; undefined percentages (zero reference) are reported as zero.
#[derive(Debug, Clone, Copy)]
pub struct Differ {
    epsilon: f64,
}

impl Default for Differ {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON)
    }
}

impl Differ {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon: epsilon.abs() }
    }

    pub fn snap(&self, value: f64) -> f64 {
        if value.abs() < self.epsilon {
            0.0
        } else {
            value
        }
    }

    pub fn compare_field(&self, quantity: Quantity, reference: f64, candidate: f64) -> FieldComparison {
        let reference = finite_or_zero(self.snap(reference));
        let candidate = finite_or_zero(self.snap(candidate));

        let diff = reference - candidate;
        let abs_diff = diff.abs();
        let pct_diff = finite_or_zero(abs_diff / reference.abs() * 100.0);

        FieldComparison {
            quantity,
            reference,
            candidate,
            diff: finite_or_zero(diff),
            abs_diff: finite_or_zero(abs_diff),
            pct_diff,
        }
    }

    /// Compare one joined pair. Returns `None` when every compared value is
    /// zero in both sources, since there is nothing to report.
    pub fn compare(
        &self,
        pair: &PairedRecord,
        quantities: &[Quantity],
        timestamp: &str,
    ) -> Option<ComparisonRecord> {
        let fields: Vec<FieldComparison> = quantities
            .iter()
            .map(|&q| {
                self.compare_field(
                    q,
                    pair.reference.get(q).unwrap_or(0.0),
                    pair.candidate.get(q).unwrap_or(0.0),
                )
            })
            .collect();

        let all_zero = fields.iter().all(|f| f.reference == 0.0 && f.candidate == 0.0);
        if all_zero {
            return None;
        }

        Some(ComparisonRecord {
            key: pair.key.clone(),
            fields,
            timestamp: timestamp.to_string(),
        })
    }

    pub fn compare_all(
        &self,
        pairs: &[PairedRecord],
        quantities: &[Quantity],
        timestamp: &str,
    ) -> Vec<ComparisonRecord> {
        pairs
            .iter()
            .filter_map(|pair| self.compare(pair, quantities, timestamp))
            .collect()
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
