use crate::boundary_visualization::{BoundaryPlotter, DEFAULT_TICKS};
use crate::loadflow_report_processor::DEFAULT_FORMAT;
use crate::network::{report_id, signed_current};
use crate::solver::{LoadFlowParameters, LoadFlowSolver};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use lf_comparison::config::{require_folder, require_non_empty, validate_date, ConfigError};
use lf_comparison::file_naming::{find_highest_version, half_hour_timestamps, snapshot_file_name};
use log::{error, info, warn};
use polars::prelude::*;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

pub const DEFAULT_VERSION_RANGE: RangeInclusive<u32> = 0..=20;

/// One boundary injection at one half-hour.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRow {
    pub id: String,
    pub bus_breaker_id: String,
    pub i: f64,
    pub p: f64,
    pub q: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct BoundaryConfig {
    pub models_dir: PathBuf,
    pub output_dir: PathBuf,
    pub date: String,
    pub file_type: String,
    pub country_code: String,
    pub versions: RangeInclusive<u32>,
    pub area_prefix: String,
    pub area_name: String,
    pub plots: bool,
    pub ticks: u32,
    pub format: String,
    pub parameters: LoadFlowParameters,
}

impl BoundaryConfig {
    pub fn new(
        models_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        date: &str,
        file_type: &str,
        country_code: &str,
    ) -> Result<Self, ConfigError> {
        validate_date(date)?;
        Ok(Self {
            models_dir: require_folder(models_dir.as_ref())?,
            output_dir: output_dir.as_ref().to_path_buf(),
            date: date.trim().to_string(),
            file_type: require_non_empty(file_type, "file type")?,
            country_code: require_non_empty(country_code, "country code")?,
            versions: DEFAULT_VERSION_RANGE,
            area_prefix: "G".to_string(),
            area_name: "GREEK".to_string(),
            plots: true,
            ticks: DEFAULT_TICKS,
            format: DEFAULT_FORMAT.to_string(),
            parameters: LoadFlowParameters::default(),
        })
    }

    pub fn with_versions(mut self, versions: RangeInclusive<u32>) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_area(mut self, prefix: &str, name: &str) -> Result<Self, ConfigError> {
        self.area_prefix = require_non_empty(prefix, "area prefix")?;
        self.area_name = require_non_empty(name, "area name")?;
        Ok(self)
    }

    pub fn with_plots(mut self, plots: bool) -> Self {
        self.plots = plots;
        self
    }

    pub fn with_ticks(mut self, ticks: u32) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn with_format(mut self, format: &str) -> Self {
        let format = format.trim().trim_start_matches('.');
        if !format.is_empty() {
            self.format = format.to_string();
        }
        self
    }

    pub fn with_parameters(mut self, parameters: LoadFlowParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn snapshot_path(&self, time: &str, version: u32) -> PathBuf {
        self.models_dir.join(snapshot_file_name(
            &self.date,
            time,
            &self.file_type,
            &self.country_code,
            version,
            &self.format,
        ))
    }

    pub fn table_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_BOUNDARY_NODES_{}.csv", self.area_name, self.date))
    }
}

#[derive(Debug, Default)]
pub struct BoundarySummary {
    pub table: Option<PathBuf>,
    pub plots: Vec<PathBuf>,
    pub timestamps_skipped: usize,
}

pub struct BoundaryProcessor {
    config: BoundaryConfig,
    solver: Box<dyn LoadFlowSolver>,
}

impl BoundaryProcessor {
    pub fn new(config: BoundaryConfig, solver: Box<dyn LoadFlowSolver>) -> Self {
        Self { config, solver }
    }

    /// Boundary rows for one half-hour. `Ok(None)` when no snapshot version exists.
    pub fn process_timestamp(&self, time: &str) -> Result<Option<Vec<BoundaryRow>>> {
        let Some((version, model)) =
            find_highest_version(self.config.versions.clone(), |v| self.config.snapshot_path(time, v))
        else {
            warn!("No file found for timestamp {}", time);
            return Ok(None);
        };
        info!("Highest version for {}: {}", time, version);

        let network = self
            .solver
            .run_ac(&model, &self.config.parameters)
            .with_context(|| format!("LoadFlow failed for {}", model.display()))?;

        let rows = network
            .dangling_lines
            .iter()
            .filter_map(|dl| {
                let bus = dl.bus_id.as_deref()?;
                if !bus.starts_with(&self.config.area_prefix) {
                    return None;
                }
                let p = dl.p.unwrap_or(0.0);
                let q = dl.q.unwrap_or(0.0);
                Some(BoundaryRow {
                    id: report_id(&dl.id),
                    bus_breaker_id: bus.to_string(),
                    i: signed_current(dl.i.unwrap_or(0.0), p, q),
                    p,
                    q,
                    timestamp: time.to_string(),
                })
            })
            .collect();

        Ok(Some(rows))
    }

    pub fn process_day(&self) -> Result<BoundarySummary> {
        println!("🌐 Boundary nodes for {}", self.config.date);
        println!("{}", "=".repeat(60));

        let timestamps = half_hour_timestamps();
        let pb = ProgressBar::new(timestamps.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")?
                .progress_chars("#>-"),
        );

        let mut summary = BoundarySummary::default();
        let mut rows = Vec::new();
        for time in &timestamps {
            pb.set_message(time.clone());
            match self.process_timestamp(time) {
                Ok(Some(time_rows)) => rows.extend(time_rows),
                Ok(None) => summary.timestamps_skipped += 1,
                Err(e) => {
                    error!("Skipping {}: {:#}", time, e);
                    summary.timestamps_skipped += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_with_message("done");

        if rows.is_empty() {
            println!("⚠️  No boundary data found for {}", self.config.date);
            return Ok(summary);
        }

        sort_rows(&mut rows);
        let table = self.config.table_path();
        write_boundary_table(&table, &rows)?;
        println!("✅ Saved {} rows to {}", rows.len(), table.display());
        summary.table = Some(table);

        if self.config.plots {
            let plotter = BoundaryPlotter::new(self.config.output_dir.join("plots"), self.config.ticks);
            summary.plots = plotter.plot_all(&rows, &timestamps)?;
            println!("📊 Generated {} plots", summary.plots.len());
        }

        Ok(summary)
    }
}

pub fn sort_rows(rows: &mut [BoundaryRow]) {
    rows.sort_by(|a, b| {
        a.bus_breaker_id
            .cmp(&b.bus_breaker_id)
            .then(a.timestamp.cmp(&b.timestamp))
            .then(a.id.cmp(&b.id))
    });
}

pub fn boundary_frame(rows: &[BoundaryRow]) -> Result<DataFrame> {
    let df = df!(
        "id" => rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        "bus_breaker_id" => rows.iter().map(|r| r.bus_breaker_id.as_str()).collect::<Vec<_>>(),
        "I" => rows.iter().map(|r| r.i).collect::<Vec<_>>(),
        "P" => rows.iter().map(|r| r.p).collect::<Vec<_>>(),
        "Q" => rows.iter().map(|r| r.q).collect::<Vec<_>>(),
        "Timestamp" => rows.iter().map(|r| r.timestamp.as_str()).collect::<Vec<_>>(),
    )?;
    Ok(df)
}

fn write_boundary_table(path: &Path, rows: &[BoundaryRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut df = boundary_frame(rows)?;
    CsvWriter::new(fs::File::create(path)?)
        .has_header(true)
        .finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, bus: &str, time: &str) -> BoundaryRow {
        BoundaryRow {
            id: id.to_string(),
            bus_breaker_id: bus.to_string(),
            i: 1.0,
            p: 1.0,
            q: 0.0,
            timestamp: time.to_string(),
        }
    }

    #[test]
    fn test_sort_by_bus_then_timestamp() {
        let mut rows = vec![
            row("X2", "GBUS0002", "0030"),
            row("X1", "GBUS0001", "0130"),
            row("X1", "GBUS0001", "0030"),
        ];
        sort_rows(&mut rows);

        let order: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.bus_breaker_id.as_str(), r.timestamp.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("GBUS0001", "0030"), ("GBUS0001", "0130"), ("GBUS0002", "0030")]
        );
    }

    #[test]
    fn test_boundary_frame() {
        let df = boundary_frame(&[row("X1", "GBUS0001", "0030")]).unwrap();
        assert_eq!(
            df.get_column_names(),
            vec!["id", "bus_breaker_id", "I", "P", "Q", "Timestamp"]
        );
    }

    #[test]
    fn test_config_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = BoundaryConfig::new(dir.path(), dir.path().join("out"), "20240717", "FO3", "GR").unwrap();

        assert_eq!(
            config.snapshot_path("0030", 2),
            dir.path().join("20240717_0030_FO3_GR2.uct")
        );
        assert_eq!(
            config.table_path(),
            dir.path().join("out").join("GREEK_BOUNDARY_NODES_20240717.csv")
        );
        assert_eq!(config.versions, 0..=20);

        let config = config.with_format("UCT");
        assert_eq!(
            config.snapshot_path("0030", 2),
            dir.path().join("20240717_0030_FO3_GR2.UCT")
        );
    }

    #[test]
    fn test_invalid_date_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = BoundaryConfig::new(dir.path(), dir.path(), "2024-07-17", "FO3", "GR");
        assert!(matches!(result, Err(ConfigError::InvalidDate(_))));
    }
}
