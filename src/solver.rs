use crate::network::{
    BranchTerminal, BusState, CurrentLimit, DanglingLineState, GeneratorState, LineState, LoadState,
    SolvedNetwork, SwitchState, TransformerState,
};
use anyhow::{bail, Context, Result};
use log::{debug, info};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// AC load-flow settings used for every study run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFlowParameters {
    pub distributed_slack: bool,
    pub transformer_voltage_control_on: bool,
    pub phase_shifter_regulation_on: bool,
    pub shunt_compensator_voltage_control_on: bool,
    pub max_outer_loop_iterations: u32,
    pub low_impedance_branch_mode: String,
    pub slack_bus_ids: Vec<String>,
}

impl Default for LoadFlowParameters {
    fn default() -> Self {
        Self {
            distributed_slack: false,
            transformer_voltage_control_on: false,
            phase_shifter_regulation_on: true,
            shunt_compensator_voltage_control_on: true,
            max_outer_loop_iterations: 30,
            low_impedance_branch_mode: "REPLACE_BY_MIN_IMPEDANCE_LINE".to_string(),
            slack_bus_ids: Vec::new(),
        }
    }
}

impl LoadFlowParameters {
    pub fn with_slack_buses(mut self, ids: Vec<String>) -> Self {
        self.slack_bus_ids = ids;
        self
    }

    /// `key=value` arguments handed to an external solver process.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("distributed_slack={}", self.distributed_slack),
            format!("transformer_voltage_control_on={}", self.transformer_voltage_control_on),
            format!("phase_shifter_regulation_on={}", self.phase_shifter_regulation_on),
            format!(
                "shunt_compensator_voltage_control_on={}",
                self.shunt_compensator_voltage_control_on
            ),
            format!("maxOuterLoopIterations={}", self.max_outer_loop_iterations),
            format!("lowImpedanceBranchMode={}", self.low_impedance_branch_mode),
        ];
        if !self.slack_bus_ids.is_empty() {
            args.push(format!("slackBusesIds={}", self.slack_bus_ids.join(",")));
        }
        args
    }
}

/// Opaque AC load-flow: network model in, converged state out, or failure.
pub trait LoadFlowSolver {
    fn run_ac(&self, model: &Path, params: &LoadFlowParameters) -> Result<SolvedNetwork>;
}

/// Directory holding the exported state of a solved model: `<model stem>_state/`.
pub fn state_dir_for(model: &Path) -> PathBuf {
    let stem = model
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    model.with_file_name(format!("{}_state", stem))
}

/// Reads a state the external solver has already exported next to the model.
#[derive(Debug, Default)]
pub struct ExportedStateSolver;

impl LoadFlowSolver for ExportedStateSolver {
    fn run_ac(&self, model: &Path, _params: &LoadFlowParameters) -> Result<SolvedNetwork> {
        if !model.is_file() {
            bail!("model file not found: {}", model.display());
        }
        load_network_state(&state_dir_for(model))
    }
}

/// Runs an external solver program as `program <model> <state dir> key=value…`,
/// then reads the state it exported.
#[derive(Debug, Clone)]
pub struct CommandSolver {
    program: PathBuf,
}

impl CommandSolver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl LoadFlowSolver for CommandSolver {
    fn run_ac(&self, model: &Path, params: &LoadFlowParameters) -> Result<SolvedNetwork> {
        if !model.is_file() {
            bail!("model file not found: {}", model.display());
        }

        let state_dir = state_dir_for(model);
        std::fs::create_dir_all(&state_dir)
            .with_context(|| format!("Failed to create {}", state_dir.display()))?;

        let output = Command::new(&self.program)
            .arg(model)
            .arg(&state_dir)
            .args(params.to_args())
            .output()
            .with_context(|| format!("Failed to start solver {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "solver exited with {} for {}: {}",
                output.status,
                model.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let report = String::from_utf8_lossy(&output.stdout);
        if !report.trim().is_empty() {
            info!("{}", report.trim());
        }
        info!("LoadFlow completed for {}", model.display());

        load_network_state(&state_dir)
    }
}

fn read_table(dir: &Path, name: &str, required: bool) -> Result<Option<DataFrame>> {
    let path = dir.join(format!("{}.csv", name));
    if !path.is_file() {
        if required {
            bail!("state table {} missing in {}", name, dir.display());
        }
        debug!("Optional state table {} not present", name);
        return Ok(None);
    }

    let df = CsvReader::from_path(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .has_header(true)
        .infer_schema(None)
        .finish()
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(df))
}

fn column<'a>(df: &'a DataFrame, aliases: &[&str]) -> Option<&'a Series> {
    aliases.iter().find_map(|name| df.column(name).ok())
}

fn text(df: &DataFrame, aliases: &[&str]) -> Result<Vec<Option<String>>> {
    match column(df, aliases) {
        Some(series) => {
            let cast = series.cast(&DataType::Utf8)?;
            Ok(cast.utf8()?.into_iter().map(|v| v.map(String::from)).collect())
        }
        None => Ok(vec![None; df.height()]),
    }
}

fn number(df: &DataFrame, aliases: &[&str]) -> Result<Vec<Option<f64>>> {
    match column(df, aliases) {
        Some(series) => {
            let cast = series.cast(&DataType::Float64)?;
            Ok(cast.f64()?.into_iter().collect())
        }
        None => Ok(vec![None; df.height()]),
    }
}

fn flag(df: &DataFrame, aliases: &[&str]) -> Result<Vec<Option<bool>>> {
    Ok(text(df, aliases)?
        .into_iter()
        .map(|v| match v.as_deref().map(str::trim) {
            Some("true") | Some("True") | Some("TRUE") | Some("1") => Some(true),
            Some("false") | Some("False") | Some("FALSE") | Some("0") => Some(false),
            _ => None,
        })
        .collect())
}

fn ids(df: &DataFrame) -> Result<Vec<Option<String>>> {
    if column(df, &["id"]).is_none() {
        bail!("state table has no id column");
    }
    text(df, &["id"])
}

fn terminals(df: &DataFrame, side: u8) -> Result<Vec<BranchTerminal>> {
    let breaker_bus = format!("bus_breaker_bus{}_id", side);
    let bus = format!("bus{}_id", side);
    let (i, p, q) = (format!("i{}", side), format!("p{}", side), format!("q{}", side));

    let bus = text(df, &[breaker_bus.as_str(), bus.as_str()])?;
    let i = number(df, &[i.as_str()])?;
    let p = number(df, &[p.as_str()])?;
    let q = number(df, &[q.as_str()])?;

    Ok((0..df.height())
        .map(|idx| BranchTerminal {
            bus_id: bus[idx].clone(),
            i: i[idx],
            p: p[idx],
            q: q[idx],
        })
        .collect())
}

/// Read every table of an exported state directory.
pub fn load_network_state(dir: &Path) -> Result<SolvedNetwork> {
    if !dir.is_dir() {
        bail!("no exported state at {}", dir.display());
    }

    let mut network = SolvedNetwork::default();

    if let Some(df) = read_table(dir, "buses", true)? {
        let (id, v_mag, v_angle) = (ids(&df)?, number(&df, &["v_mag"])?, number(&df, &["v_angle"])?);
        for idx in 0..df.height() {
            if let Some(id) = &id[idx] {
                network.buses.push(BusState {
                    id: id.clone(),
                    v_mag: v_mag[idx],
                    v_angle: v_angle[idx],
                });
            }
        }
    }

    if let Some(df) = read_table(dir, "generators", false)? {
        let id = ids(&df)?;
        let target_v = number(&df, &["target_v"])?;
        let (p, q) = (number(&df, &["p"])?, number(&df, &["q"])?);
        let (max_q, min_q) = (number(&df, &["max_q"])?, number(&df, &["min_q"])?);
        let regulating = flag(&df, &["voltage_regulator_on"])?;
        for idx in 0..df.height() {
            if let Some(id) = &id[idx] {
                network.generators.push(GeneratorState {
                    id: id.clone(),
                    target_v: target_v[idx],
                    p: p[idx],
                    q: q[idx],
                    max_q: max_q[idx],
                    min_q: min_q[idx],
                    voltage_regulator_on: regulating[idx],
                });
            }
        }
    }

    if let Some(df) = read_table(dir, "loads", false)? {
        let (id, p, q) = (ids(&df)?, number(&df, &["p"])?, number(&df, &["q"])?);
        for idx in 0..df.height() {
            if let Some(id) = &id[idx] {
                network.loads.push(LoadState {
                    id: id.clone(),
                    p: p[idx],
                    q: q[idx],
                });
            }
        }
    }

    if let Some(df) = read_table(dir, "lines", false)? {
        let id = ids(&df)?;
        let (side1, side2) = (terminals(&df, 1)?, terminals(&df, 2)?);
        for (idx, (side1, side2)) in side1.into_iter().zip(side2).enumerate() {
            if let Some(id) = &id[idx] {
                network.lines.push(LineState {
                    id: id.clone(),
                    side1,
                    side2,
                });
            }
        }
    }

    if let Some(df) = read_table(dir, "transformers", false)? {
        let id = ids(&df)?;
        let (rated_u1, rated_u2) = (number(&df, &["rated_u1"])?, number(&df, &["rated_u2"])?);
        let (side1, side2) = (terminals(&df, 1)?, terminals(&df, 2)?);
        for (idx, (side1, side2)) in side1.into_iter().zip(side2).enumerate() {
            if let Some(id) = &id[idx] {
                network.transformers.push(TransformerState {
                    id: id.clone(),
                    rated_u1: rated_u1[idx],
                    rated_u2: rated_u2[idx],
                    side1,
                    side2,
                });
            }
        }
    }

    if let Some(df) = read_table(dir, "dangling_lines", true)? {
        let id = ids(&df)?;
        let bus = text(&df, &["bus_breaker_bus_id", "bus_id"])?;
        let (i, p, q) = (number(&df, &["i"])?, number(&df, &["p"])?, number(&df, &["q"])?);
        let v_mag = number(&df, &["boundary_v_mag"])?;
        let v_angle = number(&df, &["boundary_v_angle"])?;
        let boundary_p = number(&df, &["boundary_p"])?;
        let boundary_q = number(&df, &["boundary_q"])?;
        for idx in 0..df.height() {
            if let Some(id) = &id[idx] {
                network.dangling_lines.push(DanglingLineState {
                    id: id.clone(),
                    bus_id: bus[idx].clone(),
                    i: i[idx],
                    p: p[idx],
                    q: q[idx],
                    boundary_v_mag: v_mag[idx],
                    boundary_v_angle: v_angle[idx],
                    boundary_p: boundary_p[idx],
                    boundary_q: boundary_q[idx],
                });
            }
        }
    }

    if let Some(df) = read_table(dir, "switches", false)? {
        let id = ids(&df)?;
        let bus1 = text(&df, &["bus_breaker_bus1_id"])?;
        let bus2 = text(&df, &["bus_breaker_bus2_id"])?;
        let kind = text(&df, &["kind"])?;
        let (open, retained) = (flag(&df, &["open"])?, flag(&df, &["retained"])?);
        for idx in 0..df.height() {
            if let Some(id) = &id[idx] {
                network.switches.push(SwitchState {
                    id: id.clone(),
                    bus1_id: bus1[idx].clone(),
                    bus2_id: bus2[idx].clone(),
                    kind: kind[idx].clone(),
                    open: open[idx],
                    retained: retained[idx],
                });
            }
        }
    }

    if let Some(df) = read_table(dir, "operational_limits", false)? {
        let element = text(&df, &["element_id"])?;
        let side = text(&df, &["side"])?;
        let kind = text(&df, &["type"])?;
        let duration = number(&df, &["acceptable_duration"])?;
        let value = number(&df, &["value"])?;
        for idx in 0..df.height() {
            let is_current = kind[idx].as_deref().map_or(true, |k| k == "CURRENT");
            // temporary limits carry a finite acceptable duration
            let is_permanent = duration[idx].map_or(true, |d| d < 0.0);
            if let (Some(element_id), Some(value), true, true) =
                (&element[idx], value[idx], is_current, is_permanent)
            {
                network.current_limits.push(CurrentLimit {
                    element_id: element_id.clone(),
                    side: side[idx].clone(),
                    value,
                });
            }
        }
    }

    debug!(
        "Loaded state from {}: {} buses, {} lines, {} transformers, {} dangling lines",
        dir.display(),
        network.buses.len(),
        network.lines.len(),
        network.transformers.len(),
        network.dangling_lines.len()
    );
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_state_dir_for_model() {
        let dir = state_dir_for(Path::new("/data/20240717_0030_FO3_GR3.uct"));
        assert_eq!(dir, PathBuf::from("/data/20240717_0030_FO3_GR3_state"));
    }

    #[test]
    fn test_parameter_args() {
        let args = LoadFlowParameters::default()
            .with_slack_buses(vec!["G5MEGA14".to_string()])
            .to_args();
        assert!(args.contains(&"distributed_slack=false".to_string()));
        assert!(args.contains(&"maxOuterLoopIterations=30".to_string()));
        assert_eq!(args.last().unwrap(), "slackBusesIds=G5MEGA14");
    }

    #[test]
    fn test_exported_state_solver() {
        let dir = TempDir::new().unwrap();
        let model = dir.path().join("snap.uct");
        fs::write(&model, "##C 2007.05.01\n").unwrap();

        let state = state_dir_for(&model);
        fs::create_dir_all(&state).unwrap();
        fs::write(state.join("buses.csv"), "id,v_mag,v_angle\nGABCDE11_0,401.5,-2.25\n").unwrap();
        fs::write(
            state.join("dangling_lines.csv"),
            "id,bus_breaker_bus_id,i,p,q,boundary_v_mag,boundary_v_angle,boundary_p,boundary_q\n\
             XAB_XX11 GABCDE11 1,GABCDE11_0,120.0,-80.0,5.0,402.0,-2.0,81.0,-4.0\n",
        )
        .unwrap();
        fs::write(
            state.join("operational_limits.csv"),
            "element_id,element_type,side,name,type,value,acceptable_duration\n\
             XAB_XX11 GABCDE11 1,DANGLING_LINE,ONE,permanent_limit,CURRENT,1000,-1\n\
             XAB_XX11 GABCDE11 1,DANGLING_LINE,ONE,10',CURRENT,1200,600\n",
        )
        .unwrap();

        let network = ExportedStateSolver
            .run_ac(&model, &LoadFlowParameters::default())
            .unwrap();

        assert_eq!(network.buses.len(), 1);
        assert_eq!(network.buses[0].v_angle, Some(-2.25));
        assert_eq!(network.dangling_lines[0].bus_id.as_deref(), Some("GABCDE11_0"));
        assert_eq!(network.dangling_lines[0].boundary_p, Some(81.0));
        assert_eq!(network.current_limit("XAB_XX11 GABCDE11 1", None), Some(1000.0));
        assert!(network.lines.is_empty());
    }

    #[test]
    fn test_late_fractional_state_value_loads() {
        let dir = TempDir::new().unwrap();
        let mut buses = String::from("id,v_mag,v_angle\n");
        for i in 0..150 {
            buses.push_str(&format!("G{:07}_0,400,-2\n", i));
        }
        buses.push_str("GLATE011_0,401.25,-2.5\n");
        fs::write(dir.path().join("buses.csv"), buses).unwrap();
        fs::write(dir.path().join("dangling_lines.csv"), "id,bus_id,i,p,q\nXAB_XX11 GLATE011 1,GLATE011_0,1.0,1.0,0.0\n").unwrap();

        let network = load_network_state(dir.path()).unwrap();
        assert_eq!(network.buses.len(), 151);
        assert_eq!(network.buses[150].v_mag, Some(401.25));
        assert_eq!(network.buses[0].v_mag, Some(400.0));
    }

    #[test]
    fn test_missing_model_fails() {
        let dir = TempDir::new().unwrap();
        let result = ExportedStateSolver.run_ac(&dir.path().join("none.uct"), &LoadFlowParameters::default());
        assert!(result.is_err());
    }
}
