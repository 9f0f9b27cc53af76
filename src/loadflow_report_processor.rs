use crate::network::{node_code, report_id, signed_current, BranchTerminal, BusState, SolvedNetwork};
use crate::solver::{LoadFlowParameters, LoadFlowSolver};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use lf_comparison::config::{require_folder, require_non_empty, validate_date, ConfigError};
use lf_comparison::file_naming::{
    candidate_report_name, find_highest_version, half_hour_timestamps, snapshot_file_name,
};
use log::{error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

pub const DEFAULT_REPORT_VERSIONS: RangeInclusive<u32> = 0..=9;
pub const DEFAULT_FORMAT: &str = "uct";

pub const BUS_HEADER: [&str; 11] = [
    "BUS",
    "v_mag",
    "v_angle",
    "Reference Voltage",
    "Pgen",
    "Qgen",
    "max_q",
    "min_q",
    "voltage_regulator_on",
    "Pload",
    "Qload",
];
pub const LINE_HEADER: [&str; 9] = ["id", "side", "BUS", "v_mag", "v_angle", "I", "I_limit", "P", "Q"];
pub const TRANSFORMER_HEADER: [&str; 10] = [
    "id",
    "side",
    "BUS",
    "Base Voltage",
    "v_mag",
    "v_angle",
    "I",
    "I_limit",
    "P",
    "Q",
];
pub const X_NODE_HEADER: [&str; 12] = [
    "id",
    "BUS",
    "v_mag",
    "v_angle",
    "I",
    "I_limit",
    "P",
    "Q",
    "boundary_v_mag",
    "boundary_v_angle",
    "boundary_p",
    "boundary_q",
];
pub const SWITCH_HEADER: [&str; 6] = [
    "id",
    "bus_breaker_bus1_id",
    "kind",
    "open",
    "retained",
    "bus_breaker_bus2_id",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusRow {
    pub bus: String,
    pub v_mag: Option<f64>,
    pub v_angle: Option<f64>,
    pub reference_voltage: Option<f64>,
    pub p_gen: f64,
    pub q_gen: f64,
    pub max_q: Option<f64>,
    pub min_q: Option<f64>,
    pub voltage_regulator_on: Option<bool>,
    pub p_load: f64,
    pub q_load: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchRow {
    pub id: String,
    pub side: u8,
    pub bus: String,
    pub v_mag: Option<f64>,
    pub v_angle: Option<f64>,
    pub i: f64,
    pub i_limit: Option<f64>,
    pub p: f64,
    pub q: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformerRow {
    pub id: String,
    pub side: u8,
    pub bus: String,
    pub base_voltage: Option<f64>,
    pub v_mag: Option<f64>,
    pub v_angle: Option<f64>,
    pub i: f64,
    pub i_limit: Option<f64>,
    pub p: f64,
    pub q: f64,
}

impl TransformerRow {
    fn from_branch(branch: BranchRow, base_voltage: Option<f64>) -> Self {
        Self {
            id: branch.id,
            side: branch.side,
            bus: branch.bus,
            base_voltage,
            v_mag: branch.v_mag,
            v_angle: branch.v_angle,
            i: branch.i,
            i_limit: branch.i_limit,
            p: branch.p,
            q: branch.q,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XNodeRow {
    pub id: String,
    pub bus: String,
    pub v_mag: Option<f64>,
    pub v_angle: Option<f64>,
    pub i: f64,
    pub i_limit: Option<f64>,
    pub p: f64,
    pub q: f64,
    pub boundary_v_mag: Option<f64>,
    pub boundary_v_angle: Option<f64>,
    pub boundary_p: Option<f64>,
    pub boundary_q: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchRow {
    pub id: String,
    pub bus1: Option<String>,
    pub kind: Option<String>,
    pub open: Option<bool>,
    pub retained: Option<bool>,
    pub bus2: Option<String>,
}

/// Tables of one candidate load-flow report workbook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadFlowReport {
    pub buses: Vec<BusRow>,
    pub lines: Vec<BranchRow>,
    pub transformers: Vec<TransformerRow>,
    pub x_nodes: Vec<XNodeRow>,
    pub switches: Vec<SwitchRow>,
}

impl LoadFlowReport {
    pub fn from_network(network: &SolvedNetwork) -> Self {
        let buses: HashMap<&str, &BusState> =
            network.buses.iter().map(|bus| (bus.id.as_str(), bus)).collect();

        Self {
            buses: bus_rows(network),
            lines: line_rows(network, &buses),
            transformers: transformer_rows(network, &buses),
            x_nodes: x_node_rows(network, &buses),
            switches: network
                .switches
                .iter()
                .map(|s| SwitchRow {
                    id: s.id.clone(),
                    bus1: s.bus1_id.clone(),
                    kind: s.kind.clone(),
                    open: s.open,
                    retained: s.retained,
                    bus2: s.bus2_id.clone(),
                })
                .collect(),
        }
    }

    /// Write every table as `<Sheet>.csv` under `workbook`. Empty tables keep their header.
    pub fn write(&self, workbook: &Path) -> Result<()> {
        fs::create_dir_all(workbook)
            .with_context(|| format!("Failed to create {}", workbook.display()))?;

        write_table(&workbook.join("Bus.csv"), &BUS_HEADER, &self.buses)?;
        write_table(&workbook.join("Line.csv"), &LINE_HEADER, &self.lines)?;
        write_table(&workbook.join("Transformers.csv"), &TRANSFORMER_HEADER, &self.transformers)?;
        write_table(&workbook.join("X-Nodes.csv"), &X_NODE_HEADER, &self.x_nodes)?;
        write_table(&workbook.join("Switches.csv"), &SWITCH_HEADER, &self.switches)?;
        Ok(())
    }
}

fn bus_rows(network: &SolvedNetwork) -> Vec<BusRow> {
    let mut rows: Vec<BusRow> = network
        .buses
        .iter()
        .map(|bus| {
            let code = node_code(&bus.id);
            let generators: Vec<_> = network
                .generators
                .iter()
                .filter(|g| node_code(&g.id) == code)
                .collect();
            let loads: Vec<_> = network.loads.iter().filter(|l| node_code(&l.id) == code).collect();
            let first = generators.first();

            BusRow {
                bus: bus.id.clone(),
                v_mag: bus.v_mag,
                v_angle: bus.v_angle,
                reference_voltage: first.and_then(|g| g.target_v),
                p_gen: generators.iter().map(|g| g.p.unwrap_or(0.0)).sum(),
                q_gen: generators.iter().map(|g| g.q.unwrap_or(0.0)).sum(),
                max_q: first.and_then(|g| g.max_q),
                min_q: first.and_then(|g| g.min_q),
                voltage_regulator_on: first.and_then(|g| g.voltage_regulator_on),
                p_load: loads.iter().map(|l| l.p.unwrap_or(0.0)).sum(),
                q_load: loads.iter().map(|l| l.q.unwrap_or(0.0)).sum(),
            }
        })
        .collect();

    rows.sort_by(|a, b| a.bus.cmp(&b.bus));
    rows
}

fn branch_row(
    id: &str,
    side: u8,
    terminal: &BranchTerminal,
    limit: Option<f64>,
    buses: &HashMap<&str, &BusState>,
) -> Option<BranchRow> {
    let bus = buses.get(terminal.bus_id.as_deref()?)?;
    let p = terminal.p.unwrap_or(0.0);
    let q = terminal.q.unwrap_or(0.0);

    Some(BranchRow {
        id: report_id(id),
        side,
        bus: bus.id.clone(),
        v_mag: bus.v_mag,
        v_angle: bus.v_angle,
        i: signed_current(terminal.i.unwrap_or(0.0), p, q),
        i_limit: limit,
        p,
        q,
    })
}

fn sort_branches(rows: &mut [BranchRow]) {
    rows.sort_by(|a, b| a.id.cmp(&b.id).then(a.side.cmp(&b.side)));
}

fn line_rows(network: &SolvedNetwork, buses: &HashMap<&str, &BusState>) -> Vec<BranchRow> {
    let mut rows: Vec<BranchRow> = network
        .lines
        .iter()
        .flat_map(|line| {
            [
                branch_row(&line.id, 1, &line.side1, network.current_limit(&line.id, Some("ONE")), buses),
                branch_row(&line.id, 2, &line.side2, network.current_limit(&line.id, Some("TWO")), buses),
            ]
        })
        .flatten()
        .collect();

    sort_branches(&mut rows);
    rows
}

fn transformer_rows(network: &SolvedNetwork, buses: &HashMap<&str, &BusState>) -> Vec<TransformerRow> {
    let mut rows: Vec<TransformerRow> = network
        .transformers
        .iter()
        .flat_map(|t| {
            // the bus-1 winding is reported as side 2
            let high = branch_row(&t.id, 2, &t.side1, network.current_limit(&t.id, Some("ONE")), buses)
                .map(|branch| TransformerRow::from_branch(branch, t.rated_u1));
            let low = branch_row(&t.id, 1, &t.side2, network.current_limit(&t.id, Some("TWO")), buses)
                .map(|branch| TransformerRow::from_branch(branch, t.rated_u2));
            [high, low]
        })
        .flatten()
        .filter(|row| row.i != 0.0)
        .collect();

    rows.sort_by(|a, b| a.id.cmp(&b.id).then(a.side.cmp(&b.side)));
    rows
}

fn x_node_rows(network: &SolvedNetwork, buses: &HashMap<&str, &BusState>) -> Vec<XNodeRow> {
    let mut rows: Vec<XNodeRow> = network
        .dangling_lines
        .iter()
        .filter_map(|dl| {
            let bus = buses.get(dl.bus_id.as_deref()?)?;
            let p = dl.p.unwrap_or(0.0);
            let q = dl.q.unwrap_or(0.0);
            Some(XNodeRow {
                id: report_id(&dl.id),
                bus: bus.id.clone(),
                v_mag: bus.v_mag,
                v_angle: bus.v_angle,
                i: signed_current(dl.i.unwrap_or(0.0), p, q),
                i_limit: network.current_limit(&dl.id, None),
                p,
                q,
                boundary_v_mag: dl.boundary_v_mag,
                boundary_v_angle: dl.boundary_v_angle,
                boundary_p: dl.boundary_p,
                boundary_q: dl.boundary_q,
            })
        })
        .collect();

    rows.sort_by(|a, b| a.id.cmp(&b.id));
    rows
}

fn write_table<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Run parameters for daily report generation.
#[derive(Debug, Clone)]
pub struct LoadFlowReportConfig {
    pub models_dir: PathBuf,
    pub output_dir: PathBuf,
    pub date: String,
    pub file_type: String,
    pub country_code: String,
    pub hours: Vec<String>,
    pub versions: Vec<u32>,
    /// Snapshot file extension, matched case-sensitively.
    pub format: String,
    pub parameters: LoadFlowParameters,
}

impl LoadFlowReportConfig {
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
            hours: half_hour_timestamps(),
            versions: DEFAULT_REPORT_VERSIONS.collect(),
            format: DEFAULT_FORMAT.to_string(),
            parameters: LoadFlowParameters::default(),
        })
    }

    pub fn with_hours(mut self, hours: Vec<String>) -> Self {
        if !hours.is_empty() {
            self.hours = hours;
        }
        self
    }

    pub fn with_versions(mut self, versions: Vec<u32>) -> Self {
        if !versions.is_empty() {
            self.versions = versions;
        }
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

    pub fn snapshot_path(&self, hour: &str, version: u32) -> PathBuf {
        self.models_dir.join(snapshot_file_name(
            &self.date,
            hour,
            &self.file_type,
            &self.country_code,
            version,
            &self.format,
        ))
    }

    pub fn report_dir(&self, hour: &str) -> PathBuf {
        self.output_dir
            .join(candidate_report_name(&self.date, hour, &self.file_type, &self.country_code))
    }
}

#[derive(Debug, Default)]
pub struct LoadFlowReportSummary {
    pub reports: Vec<PathBuf>,
    pub hours_skipped: usize,
}

pub struct LoadFlowReportProcessor {
    config: LoadFlowReportConfig,
    solver: Box<dyn LoadFlowSolver>,
}

impl LoadFlowReportProcessor {
    pub fn new(config: LoadFlowReportConfig, solver: Box<dyn LoadFlowSolver>) -> Self {
        Self { config, solver }
    }

    /// Solve and report one hour. `Ok(None)` when no snapshot version exists.
    pub fn process_hour(&self, hour: &str) -> Result<Option<PathBuf>> {
        let Some((version, model)) =
            find_highest_version(self.config.versions.iter().copied(), |v| self.config.snapshot_path(hour, v))
        else {
            warn!("No snapshot found for {} {}", self.config.date, hour);
            return Ok(None);
        };
        info!("Highest version for {}: {}", hour, version);

        let network = self
            .solver
            .run_ac(&model, &self.config.parameters)
            .with_context(|| format!("LoadFlow failed for {}", model.display()))?;

        let report = LoadFlowReport::from_network(&network);
        let workbook = self.config.report_dir(hour);
        report.write(&workbook)?;
        info!(
            "Report for {} written to {} ({} lines, {} x-nodes)",
            hour,
            workbook.display(),
            report.lines.len(),
            report.x_nodes.len()
        );
        Ok(Some(workbook))
    }

    pub fn process_all(&self) -> Result<LoadFlowReportSummary> {
        println!("⚡ Load-flow reports for {}", self.config.date);
        println!("{}", "=".repeat(60));

        let pb = ProgressBar::new(self.config.hours.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")?
                .progress_chars("#>-"),
        );

        let mut summary = LoadFlowReportSummary::default();
        for hour in &self.config.hours {
            pb.set_message(hour.clone());
            match self.process_hour(hour) {
                Ok(Some(workbook)) => summary.reports.push(workbook),
                Ok(None) => summary.hours_skipped += 1,
                Err(e) => {
                    error!("Skipping {}: {:#}", hour, e);
                    summary.hours_skipped += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_with_message("done");

        println!(
            "✅ {} reports written, {} hours skipped",
            summary.reports.len(),
            summary.hours_skipped
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{
        CurrentLimit, DanglingLineState, GeneratorState, LineState, LoadState, SwitchState, TransformerState,
    };

    fn terminal(bus: &str, i: f64, p: f64, q: f64) -> BranchTerminal {
        BranchTerminal {
            bus_id: Some(bus.to_string()),
            i: Some(i),
            p: Some(p),
            q: Some(q),
        }
    }

    fn network() -> SolvedNetwork {
        SolvedNetwork {
            buses: vec![
                BusState {
                    id: "GFGHIJ11_0".to_string(),
                    v_mag: Some(396.0),
                    v_angle: Some(-3.0),
                },
                BusState {
                    id: "GABCDE11_0".to_string(),
                    v_mag: Some(400.0),
                    v_angle: Some(-2.0),
                },
            ],
            generators: vec![
                GeneratorState {
                    id: "GABCDE11_generator".to_string(),
                    target_v: Some(405.0),
                    p: Some(-100.0),
                    q: Some(-20.0),
                    max_q: Some(150.0),
                    min_q: Some(-150.0),
                    voltage_regulator_on: Some(true),
                },
                GeneratorState {
                    id: "GABCDE11_generator2".to_string(),
                    p: Some(-50.0),
                    ..Default::default()
                },
            ],
            loads: vec![LoadState {
                id: "GFGHIJ11_load".to_string(),
                p: Some(60.0),
                q: None,
            }],
            lines: vec![
                LineState {
                    id: "GFGHIJ11 GABCDE11 1".to_string(),
                    side1: terminal("GFGHIJ11_0", 80.0, -49.0, -9.0),
                    side2: terminal("GABCDE11_0", 80.0, 50.0, 10.0),
                },
                LineState {
                    id: "GABCDE11 GOUTSD11 1".to_string(),
                    side1: terminal("GABCDE11_0", 10.0, 5.0, 0.0),
                    side2: terminal("GOUTSD11_0", 10.0, -5.0, 0.0),
                },
            ],
            transformers: vec![TransformerState {
                id: "GABCDE11 GABCDE21 1".to_string(),
                rated_u1: Some(400.0),
                rated_u2: Some(150.0),
                side1: terminal("GABCDE11_0", 50.0, 30.0, 2.0),
                side2: terminal("GFGHIJ11_0", 0.0, 0.0, 0.0),
            }],
            dangling_lines: vec![DanglingLineState {
                id: "XAB_XX11 GABCDE11 1".to_string(),
                bus_id: Some("GABCDE11_0".to_string()),
                i: Some(33.0),
                p: Some(22.0),
                q: Some(0.0),
                boundary_v_mag: Some(402.0),
                boundary_v_angle: Some(-1.5),
                boundary_p: Some(-21.0),
                boundary_q: Some(0.5),
            }],
            switches: vec![SwitchState {
                id: "GABCDE11 GABCDE12 1".to_string(),
                bus1_id: Some("GABCDE11_0".to_string()),
                bus2_id: Some("GABCDE12_0".to_string()),
                kind: Some("BREAKER".to_string()),
                open: Some(false),
                retained: Some(true),
            }],
            current_limits: vec![
                CurrentLimit {
                    element_id: "GFGHIJ11 GABCDE11 1".to_string(),
                    side: Some("TWO".to_string()),
                    value: 1000.0,
                },
                CurrentLimit {
                    element_id: "XAB_XX11 GABCDE11 1".to_string(),
                    side: None,
                    value: 800.0,
                },
            ],
        }
    }

    #[test]
    fn test_bus_rows_attach_generation_and_load() {
        let report = LoadFlowReport::from_network(&network());

        assert_eq!(report.buses[0].bus, "GABCDE11_0");
        assert_eq!(report.buses[0].p_gen, -150.0);
        assert_eq!(report.buses[0].reference_voltage, Some(405.0));
        assert_eq!(report.buses[0].voltage_regulator_on, Some(true));
        assert_eq!(report.buses[1].p_load, 60.0);
        assert_eq!(report.buses[1].q_load, 0.0);
        assert_eq!(report.buses[1].reference_voltage, None);
    }

    #[test]
    fn test_line_rows() {
        let report = LoadFlowReport::from_network(&network());

        // the terminal on the unknown bus is dropped
        assert_eq!(report.lines.len(), 3);
        assert_eq!(report.lines[0].id, "GABCDE11_GOUTSD11_1");
        assert_eq!(report.lines[1].id, "GFGHIJ11_GABCDE11_1");
        assert_eq!(report.lines[1].side, 1);
        assert_eq!(report.lines[1].i, -80.0);
        assert_eq!(report.lines[1].i_limit, None);
        assert_eq!(report.lines[2].side, 2);
        assert_eq!(report.lines[2].i, 80.0);
        assert_eq!(report.lines[2].i_limit, Some(1000.0));
        assert_eq!(report.lines[2].v_mag, Some(400.0));
    }

    #[test]
    fn test_transformer_sides_swapped_and_idle_dropped() {
        let report = LoadFlowReport::from_network(&network());

        assert_eq!(report.transformers.len(), 1);
        let row = &report.transformers[0];
        assert_eq!(row.side, 2);
        assert_eq!(row.bus, "GABCDE11_0");
        assert_eq!(row.base_voltage, Some(400.0));
    }

    #[test]
    fn test_x_node_rows() {
        let report = LoadFlowReport::from_network(&network());

        let row = &report.x_nodes[0];
        assert_eq!(row.id, "XAB_XX11_GABCDE11_1");
        assert_eq!(row.i_limit, Some(800.0));
        assert_eq!(row.boundary_p, Some(-21.0));
        assert_eq!(report.switches[0].kind.as_deref(), Some("BREAKER"));
    }

    #[test]
    fn test_write_keeps_headers_for_empty_tables() {
        let dir = tempfile::TempDir::new().unwrap();
        let workbook = dir.path().join("report");
        LoadFlowReport::default().write(&workbook).unwrap();

        let line = fs::read_to_string(workbook.join("Line.csv")).unwrap();
        assert_eq!(line, "id,side,BUS,v_mag,v_angle,I,I_limit,P,Q\n");
        assert!(workbook.join("Switches.csv").exists());
    }

    #[test]
    fn test_write_transformer_row() {
        let dir = tempfile::TempDir::new().unwrap();
        let report = LoadFlowReport::from_network(&network());
        report.write(dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join("Transformers.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "id,side,BUS,Base Voltage,v_mag,v_angle,I,I_limit,P,Q");
        assert_eq!(lines[1], "GABCDE11_GABCDE21_1,2,GABCDE11_0,400.0,400.0,-2.0,50.0,,30.0,2.0");
    }

    #[test]
    fn test_config_defaults_and_format() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = LoadFlowReportConfig::new(dir.path(), dir.path(), "20240717", "FO3", "GR").unwrap();
        assert_eq!(config.versions, (0..=9).collect::<Vec<u32>>());
        assert!(config
            .snapshot_path("0030", 2)
            .ends_with("20240717_0030_FO3_GR2.uct"));

        let config = config.with_format(".UCT").with_format("");
        assert_eq!(config.format, "UCT");
        assert!(config
            .snapshot_path("0030", 2)
            .ends_with("20240717_0030_FO3_GR2.UCT"));
    }
}
