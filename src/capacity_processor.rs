use crate::solver::{LoadFlowParameters, LoadFlowSolver};
use anyhow::{Context, Result};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use lf_comparison::config::{require_folder, validate_date, validate_year_month, ConfigError};
use lf_comparison::file_naming::{capacity_snapshot_name, half_hour_timestamps};
use log::{debug, error, info, warn};
use polars::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_DIRECTIONS: [&str; 4] = ["NGR Export", "NGR Import", "SRO Export", "SRO Import"];

/// Boundary buses renamed before any filtering.
pub const BUS_ALIASES: [(&str, &str); 5] = [
    ("RIS1A41_0", "RISAC41"),
    ("RMED141_0", "RMEDG41_0"),
    ("RPDF241_0", "RPDFE41"),
    ("RROS241_0", "RROSI41"),
    ("RTINTA1_0", "RTINTB1"),
];

/// Boundary buses never counted towards a border's capacity.
pub const EXCLUDED_BUSES: [&str; 5] = ["GARACH1_0", "RISAC41", "RARA4D1_0", "RNADA_1_0", "RROSI41"];

const MAX_VARIANT: u32 = 10;

/// Border side selected by a direction label.
#[derive(Debug, Clone, PartialEq)]
pub struct BorderProfile {
    pub label: String,
    pub prefix: &'static str,
}

impl BorderProfile {
    /// `NGR…` labels select `G` buses, `SRO…` labels select `R` buses.
    pub fn from_label(label: &str) -> Option<Self> {
        let prefix = if label.starts_with("NGR") {
            "G"
        } else if label.starts_with("SRO") {
            "R"
        } else {
            return None;
        };
        Some(Self {
            label: label.to_string(),
            prefix,
        })
    }

    pub fn includes(&self, bus_id: &str) -> bool {
        bus_id.starts_with(self.prefix) && !EXCLUDED_BUSES.contains(&bus_id)
    }
}

pub fn canonical_bus(bus_id: &str) -> &str {
    BUS_ALIASES
        .iter()
        .find(|(from, _)| *from == bus_id)
        .map_or(bus_id, |(_, to)| *to)
}

/// Total transfer capacity: magnitude of the summed boundary injections on the border.
pub fn total_transfer_capacity<'a, I>(profile: &BorderProfile, injections: I) -> f64
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    injections
        .into_iter()
        .filter(|(bus, _)| profile.includes(canonical_bus(bus)))
        .map(|(_, p)| p)
        .sum::<f64>()
        .abs()
}

/// `HHMM` → `HH:MM`
pub fn display_time(hhmm: &str) -> String {
    if hhmm.len() == 4 {
        format!("{}:{}", &hhmm[..2], &hhmm[2..])
    } else {
        hhmm.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapacitySnapshot {
    pub time: String,
    pub d: u32,
    pub u: u32,
    pub path: PathBuf,
}

impl CapacitySnapshot {
    pub fn variant(&self) -> String {
        format!("2D{}_UX{}", self.d, self.u)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapacityRow {
    pub date: String,
    pub timestamp: String,
    pub border: String,
    pub variant: String,
    pub tcc: f64,
}

#[derive(Debug, Clone)]
pub struct CapacityConfig {
    pub base_dir: PathBuf,
    pub year_month: String,
    pub dates: Option<Vec<String>>,
    pub directions: Vec<String>,
    pub output_dir: PathBuf,
    pub parameters: LoadFlowParameters,
}

impl CapacityConfig {
    pub fn new(base_dir: impl AsRef<Path>, year_month: &str, output_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        validate_year_month(year_month)?;
        let base_dir = require_folder(base_dir.as_ref())?;
        require_folder(&base_dir.join(year_month.trim()))?;

        Ok(Self {
            base_dir,
            year_month: year_month.trim().to_string(),
            dates: None,
            directions: DEFAULT_DIRECTIONS.iter().map(|s| s.to_string()).collect(),
            output_dir: output_dir.as_ref().to_path_buf(),
            parameters: LoadFlowParameters::default(),
        })
    }

    pub fn with_dates(mut self, dates: Vec<String>) -> Result<Self, ConfigError> {
        for date in &dates {
            validate_date(date)?;
        }
        self.dates = (!dates.is_empty()).then_some(dates);
        Ok(self)
    }

    pub fn with_directions(mut self, directions: Vec<String>) -> Self {
        if !directions.is_empty() {
            self.directions = directions;
        }
        self
    }

    pub fn with_parameters(mut self, parameters: LoadFlowParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn month_dir(&self) -> PathBuf {
        self.base_dir.join(&self.year_month)
    }

    pub fn snapshot_dir(&self, date: &str, direction: &str) -> PathBuf {
        self.month_dir().join(date).join("CGM").join(direction)
    }
}

pub struct CapacityProcessor {
    config: CapacityConfig,
    solver: Box<dyn LoadFlowSolver>,
}

impl CapacityProcessor {
    pub fn new(config: CapacityConfig, solver: Box<dyn LoadFlowSolver>) -> Self {
        Self { config, solver }
    }

    /// Explicit dates, or every 8-digit subfolder of the month folder.
    pub fn dates(&self) -> Result<Vec<String>> {
        if let Some(dates) = &self.config.dates {
            return Ok(dates.clone());
        }

        let mut dates = Vec::new();
        for entry in WalkDir::new(self.config.month_dir()).min_depth(1).max_depth(1) {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_dir() && name.len() == 8 && name.chars().all(|c| c.is_ascii_digit()) {
                dates.push(name.into_owned());
            }
        }
        dates.sort();
        Ok(dates)
    }

    /// Snapshots of one date and direction grouped by half-hour, variants in (d, u) order.
    pub fn discover_snapshots(&self, date: &str, direction: &str) -> Result<BTreeMap<String, Vec<CapacitySnapshot>>> {
        let dir = self.config.snapshot_dir(date, direction);
        let mut found: BTreeMap<String, Vec<CapacitySnapshot>> = BTreeMap::new();
        if !dir.is_dir() {
            warn!("No snapshot folder {}", dir.display());
            return Ok(found);
        }

        let name_re = Regex::new(&format!(r"^{}_(\d{{2}}30)_2D(\d+)_UX(\d+)\.uct$", regex::escape(date)))?;
        let pattern = dir.join(format!("{}_*_2D*_UX*.uct", date));
        let pattern = pattern.to_str().context("snapshot path is not valid UTF-8")?;

        for path in glob(pattern)?.filter_map(Result::ok) {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let Some(caps) = name_re.captures(&name) else {
                debug!("Ignoring {}", name);
                continue;
            };
            let (Ok(d), Ok(u)) = (caps[2].parse::<u32>(), caps[3].parse::<u32>()) else {
                continue;
            };
            if name != capacity_snapshot_name(date, &caps[1], d, u) {
                debug!("Non-canonical snapshot name: {}", name);
                continue;
            }
            if d > MAX_VARIANT || u > MAX_VARIANT {
                debug!("Variant out of range: {}", name);
                continue;
            }
            found.entry(caps[1].to_string()).or_default().push(CapacitySnapshot {
                time: caps[1].to_string(),
                d,
                u,
                path,
            });
        }

        for snapshots in found.values_mut() {
            snapshots.sort_by_key(|s| (s.d, s.u));
        }
        Ok(found)
    }

    fn solve_snapshot(&self, profile: &BorderProfile, date: &str, snapshot: &CapacitySnapshot) -> Result<CapacityRow> {
        let network = self
            .solver
            .run_ac(&snapshot.path, &self.config.parameters)
            .with_context(|| format!("LoadFlow failed for {}", snapshot.path.display()))?;

        let tcc = total_transfer_capacity(
            profile,
            network
                .dangling_lines
                .iter()
                .filter_map(|dl| Some((dl.bus_id.as_deref()?, dl.boundary_p.unwrap_or(0.0)))),
        );

        Ok(CapacityRow {
            date: date.to_string(),
            timestamp: display_time(&snapshot.time),
            border: profile.label.clone(),
            variant: snapshot.variant(),
            tcc,
        })
    }

    pub fn process_date(&self, date: &str) -> Result<Vec<CapacityRow>> {
        let mut rows = Vec::new();

        for direction in &self.config.directions {
            let Some(profile) = BorderProfile::from_label(direction) else {
                warn!("Unknown direction label '{}', no rows produced", direction);
                continue;
            };

            let snapshots = self.discover_snapshots(date, direction)?;
            for time in half_hour_timestamps() {
                let Some(variants) = snapshots.get(&time) else {
                    warn!("No snapshot for {} {} ({})", date, time, direction);
                    continue;
                };

                for snapshot in variants {
                    match self.solve_snapshot(&profile, date, snapshot) {
                        Ok(row) => rows.push(row),
                        Err(e) => error!("Skipping {}: {:#}", snapshot.path.display(), e),
                    }
                }
            }
        }

        Ok(rows)
    }

    /// Solve every snapshot of the month and write `{YYYYMM}_TCCS` as CSV and Parquet.
    /// Returns the CSV path, or `None` when no row was produced.
    pub fn process_month(&self) -> Result<Option<PathBuf>> {
        println!("🔌 Transfer capacity for {}", self.config.year_month);
        println!("{}", "=".repeat(60));

        let dates = self.dates()?;
        info!("Found {} dates", dates.len());

        let pb = ProgressBar::new(dates.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")?
                .progress_chars("#>-"),
        );

        let mut rows = Vec::new();
        for date in &dates {
            pb.set_message(date.clone());
            match self.process_date(date) {
                Ok(date_rows) => rows.extend(date_rows),
                Err(e) => error!("Skipping {}: {:#}", date, e),
            }
            pb.inc(1);
        }
        pb.finish_with_message("done");

        if rows.is_empty() {
            println!("⚠️  No capacity data for {}", self.config.year_month);
            return Ok(None);
        }

        let csv_path = self.save(&rows)?;
        println!("✅ Saved {} rows to {}", rows.len(), csv_path.display());
        Ok(Some(csv_path))
    }

    fn save(&self, rows: &[CapacityRow]) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.output_dir)
            .with_context(|| format!("Failed to create {}", self.config.output_dir.display()))?;

        let mut df = capacity_frame(rows)?;
        let base_name = format!("{}_TCCS", self.config.year_month);

        let csv_path = self.config.output_dir.join(format!("{}.csv", base_name));
        CsvWriter::new(fs::File::create(&csv_path)?)
            .has_header(true)
            .finish(&mut df)?;

        let parquet_path = self.config.output_dir.join(format!("{}.parquet", base_name));
        ParquetWriter::new(fs::File::create(&parquet_path)?).finish(&mut df)?;

        Ok(csv_path)
    }
}

pub fn capacity_frame(rows: &[CapacityRow]) -> Result<DataFrame> {
    let df = df!(
        "Date" => rows.iter().map(|r| r.date.as_str()).collect::<Vec<_>>(),
        "Timestamp" => rows.iter().map(|r| r.timestamp.as_str()).collect::<Vec<_>>(),
        "Border & Direction" => rows.iter().map(|r| r.border.as_str()).collect::<Vec<_>>(),
        "Variant" => rows.iter().map(|r| r.variant.as_str()).collect::<Vec<_>>(),
        "TCC" => rows.iter().map(|r| r.tcc).collect::<Vec<_>>(),
    )?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_profile() {
        let ngr = BorderProfile::from_label("NGR Export").unwrap();
        assert_eq!(ngr.prefix, "G");
        assert!(ngr.includes("GKARDI1_0"));
        assert!(!ngr.includes("GARACH1_0"));
        assert!(!ngr.includes("RMEDG41_0"));

        assert_eq!(BorderProfile::from_label("SRO Import").unwrap().prefix, "R");
        assert!(BorderProfile::from_label("BG Export").is_none());
    }

    #[test]
    fn test_aliases_applied_before_exclusion() {
        let sro = BorderProfile::from_label("SRO Export").unwrap();
        assert_eq!(canonical_bus("RIS1A41_0"), "RISAC41");
        assert_eq!(canonical_bus("RMED141_0"), "RMEDG41_0");
        assert_eq!(canonical_bus("GKARDI1_0"), "GKARDI1_0");

        let tcc = total_transfer_capacity(
            &sro,
            vec![("RIS1A41_0", 500.0), ("RMED141_0", -300.0), ("RTINTA1_0", -150.0), ("GKARDI1_0", 75.0)],
        );
        assert_eq!(tcc, 450.0);
    }

    #[test]
    fn test_display_time() {
        assert_eq!(display_time("0030"), "00:30");
        assert_eq!(display_time("2330"), "23:30");
    }

    #[test]
    fn test_capacity_frame_columns() {
        let rows = vec![CapacityRow {
            date: "20240701".to_string(),
            timestamp: "00:30".to_string(),
            border: "NGR Export".to_string(),
            variant: "2D0_UX0".to_string(),
            tcc: 1200.0,
        }];
        let df = capacity_frame(&rows).unwrap();
        assert_eq!(
            df.get_column_names(),
            vec!["Date", "Timestamp", "Border & Direction", "Variant", "TCC"]
        );
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn test_discover_snapshots_keeps_canonical_names() {
        let dir = tempfile::TempDir::new().unwrap();
        let folder = dir.path().join("202407").join("20240701").join("CGM").join("NGR Export");
        fs::create_dir_all(&folder).unwrap();
        for name in [
            "20240701_0030_2D1_UX0.uct",
            "20240701_0030_2D0_UX1.uct",
            "20240701_0030_2D01_UX0.uct",
            "20240701_0030_2D11_UX0.uct",
            "20240701_0130_2D0_UX0.uct",
            "20240701_0130_2D0_UX0.xml",
        ] {
            fs::write(folder.join(name), "").unwrap();
        }

        let config = CapacityConfig::new(dir.path(), "202407", dir.path().join("out")).unwrap();
        let processor = CapacityProcessor::new(config, Box::new(crate::solver::ExportedStateSolver));
        let found = processor.discover_snapshots("20240701", "NGR Export").unwrap();

        assert_eq!(found.keys().collect::<Vec<_>>(), vec!["0030", "0130"]);
        let variants: Vec<String> = found["0030"].iter().map(|s| s.variant()).collect();
        assert_eq!(variants, vec!["2D0_UX1", "2D1_UX0"]);
        assert_eq!(
            found["0130"][0].path,
            folder.join(capacity_snapshot_name("20240701", "0130", 0, 0))
        );
        assert!(processor.discover_snapshots("20240701", "SRO Import").unwrap().is_empty());
    }
}
