use crate::models::{ComparisonRecord, ElementCategory, ReportSheet};
use crate::schema::CategorySchema;
use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Accumulates per-timestamp sheets into one collection per category.
#[derive(Debug, Default)]
pub struct ReportAggregator {
    sheets: BTreeMap<ElementCategory, Vec<ComparisonRecord>>,
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet, preserving row order across pushes.
    pub fn push(&mut self, sheet: ReportSheet) {
        self.sheets
            .entry(sheet.category)
            .or_insert_with(Vec::new)
            .extend(sheet.records);
    }

    pub fn rows(&self, category: ElementCategory) -> &[ComparisonRecord] {
        self.sheets.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_rows(&self) -> usize {
        self.sheets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_rows() == 0
    }

    /// Write every non-empty category as `<Sheet>.csv` inside `workbook`.
    ///
    /// Returns the categories written. Nothing is created when no category has rows.
    pub fn write(
        &self,
        workbook: &Path,
        reference_label: &str,
        candidate_label: &str,
    ) -> Result<Vec<ElementCategory>> {
        let mut written = Vec::new();

        for category in ElementCategory::ALL {
            let rows = self.rows(category);
            if rows.is_empty() {
                warn!("Sheet {} has no data. Skipping sheet.", category);
                continue;
            }

            if written.is_empty() {
                fs::create_dir_all(workbook)
                    .with_context(|| format!("Failed to create {}", workbook.display()))?;
            }

            let path = sheet_path(workbook, category);
            let schema = CategorySchema::for_category(category);
            write_sheet(&path, schema, rows, reference_label, candidate_label)?;
            info!("Wrote {} rows to {}", rows.len(), path.display());
            written.push(category);
        }

        Ok(written)
    }
}

pub fn sheet_path(workbook: &Path, category: ElementCategory) -> PathBuf {
    workbook.join(format!("{}.csv", category.sheet_name()))
}

fn write_sheet(
    path: &Path,
    schema: &CategorySchema,
    rows: &[ComparisonRecord],
    reference_label: &str,
    candidate_label: &str,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(schema.group_header(reference_label, candidate_label))?;
    writer.write_record(schema.data_header())?;

    for row in rows {
        writer.write_record(row_cells(schema, row))?;
    }

    writer.flush()?;
    Ok(())
}

fn row_cells(schema: &CategorySchema, row: &ComparisonRecord) -> Vec<String> {
    let mut cells = vec![row.key.id.clone()];
    if schema.side_header.is_some() {
        cells.push(row.key.side.clone().unwrap_or_default());
    }
    cells.extend(row.fields.iter().map(|f| f.reference.to_string()));
    cells.extend(row.fields.iter().map(|f| f.candidate.to_string()));
    cells.extend(row.fields.iter().map(|f| f.abs_diff.to_string()));
    cells.extend(row.fields.iter().map(|f| f.pct_diff.to_string()));
    cells.push(row.timestamp.clone());
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::Differ;
    use crate::models::{ElementKey, Measurements, PairedRecord, Quantity};
    use tempfile::TempDir;

    fn node_sheet(timestamp: &str, bus: &str, u_ref: f64, u_cand: f64) -> ReportSheet {
        let pair = PairedRecord {
            key: ElementKey::new(bus, None),
            reference: Measurements {
                voltage: Some(u_ref),
                angle: Some(-1.0),
                ..Default::default()
            },
            candidate: Measurements {
                voltage: Some(u_cand),
                angle: Some(-1.0),
                ..Default::default()
            },
        };
        let quantities = &[Quantity::VoltageMagnitude, Quantity::VoltageAngle];
        ReportSheet {
            category: ElementCategory::Nodes,
            timestamp: timestamp.to_string(),
            records: Differ::default().compare_all(&[pair], quantities, timestamp),
        }
    }

    #[test]
    fn test_push_preserves_order() {
        let mut aggregator = ReportAggregator::new();
        aggregator.push(node_sheet("0030", "GB", 400.0, 399.0));
        aggregator.push(node_sheet("0130", "GA", 400.0, 398.0));

        let rows = aggregator.rows(ElementCategory::Nodes);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, "0030");
        assert_eq!(rows[1].key.id, "GA");
        assert!(aggregator.rows(ElementCategory::Lines).is_empty());
    }

    #[test]
    fn test_write_skips_empty_categories() {
        let dir = TempDir::new().unwrap();
        let workbook = dir.path().join("combined");

        let mut aggregator = ReportAggregator::new();
        aggregator.push(node_sheet("0030", "GABCDE11", 400.0, 396.0));
        let written = aggregator.write(&workbook, "UNICORN", "OPENLF").unwrap();

        assert_eq!(written, vec![ElementCategory::Nodes]);
        assert!(!sheet_path(&workbook, ElementCategory::Lines).exists());

        let content = std::fs::read_to_string(sheet_path(&workbook, ElementCategory::Nodes)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "ID,UNICORN,UNICORN,OPENLF,OPENLF,ABSOLUTE DIFFERENCES,ABSOLUTE DIFFERENCES,PERCENTAGE DIFFERENCES,PERCENTAGE DIFFERENCES,TIMESTAMP"
        );
        assert_eq!(lines[1], "Bus,U,theta,U,theta,U_diff_abs,theta_diff_abs,U_diff_pct,theta_diff_pct,Timestamp");
        assert_eq!(lines[2], "GABCDE11,400,-1,396,-1,4,0,1,0,0030");
    }

    #[test]
    fn test_nothing_written_when_empty() {
        let dir = TempDir::new().unwrap();
        let workbook = dir.path().join("combined");
        let written = ReportAggregator::new().write(&workbook, "A", "B").unwrap();
        assert!(written.is_empty());
        assert!(!workbook.exists());
    }
}
