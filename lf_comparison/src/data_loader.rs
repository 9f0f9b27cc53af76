use crate::models::{ElementRecord, Measurements};
use crate::normalizer::element_key;
use crate::schema::SourceColumns;
use anyhow::{anyhow, Context, Result};
use log::debug;
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// Reads report sheets. A workbook is a directory holding one `<Sheet>.csv` per sheet.
pub struct DataLoader;

impl DataLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn sheet_path(workbook: &Path, sheet: &str) -> PathBuf {
        workbook.join(format!("{}.csv", sheet))
    }

    pub fn load_sheet(&self, workbook: &Path, sheet: &str) -> Result<DataFrame> {
        let path = Self::sheet_path(workbook, sheet);
        let df = CsvReader::from_path(&path)
            .with_context(|| format!("Failed to open sheet {} in {}", sheet, workbook.display()))?
            .has_header(true)
            .infer_schema(None)
            .finish()
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        debug!("Loaded {} rows from {}", df.height(), path.display());
        Ok(df)
    }

    /// Load one source's records for a category, keyed by the canonical key.
    pub fn load_records(&self, workbook: &Path, columns: &SourceColumns) -> Result<Vec<ElementRecord>> {
        let df = self.load_sheet(workbook, columns.sheet)?;
        records_from_frame(&df, columns)
            .with_context(|| format!("Sheet {} in {}", columns.sheet, workbook.display()))
    }
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the first alias present, comparing names with surrounding whitespace removed.
fn find_column<'a>(df: &'a DataFrame, aliases: &[&str]) -> Option<&'a Series> {
    let names = df.get_column_names();
    aliases.iter().find_map(|alias| {
        names
            .iter()
            .find(|name| name.trim() == *alias)
            .and_then(|name| df.column(name).ok())
    })
}

fn require_column<'a>(df: &'a DataFrame, aliases: &[&str]) -> Result<&'a Series> {
    find_column(df, aliases).ok_or_else(|| anyhow!("missing column {:?}", aliases))
}

fn text_values(series: &Series) -> Result<Vec<Option<String>>> {
    let cast = series.cast(&DataType::Utf8)?;
    Ok(cast.utf8()?.into_iter().map(|v| v.map(String::from)).collect())
}

fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

pub fn records_from_frame(df: &DataFrame, columns: &SourceColumns) -> Result<Vec<ElementRecord>> {
    let ids = text_values(require_column(df, columns.id_columns)?)?;
    let sides = match columns.side_columns {
        Some(aliases) => Some(text_values(require_column(df, aliases)?)?),
        None => None,
    };

    let mut quantity_values = Vec::with_capacity(columns.quantity_columns.len());
    for (quantity, aliases) in columns.quantity_columns {
        quantity_values.push((*quantity, numeric_values(require_column(df, aliases)?)?));
    }

    let mut records = Vec::with_capacity(df.height());
    for (idx, id) in ids.iter().enumerate() {
        // rows without an identifier cannot be joined
        let Some(id) = id else { continue };

        let side = sides
            .as_ref()
            .and_then(|values| values.get(idx).cloned().flatten());

        let mut measurements = Measurements::default();
        for (quantity, values) in &quantity_values {
            measurements.set(*quantity, values.get(idx).copied().flatten());
        }

        records.push(ElementRecord {
            key: element_key(columns, id, side.as_deref()),
            measurements,
        });
    }

    Ok(records)
}
