//! Converged electrical state returned by the load-flow solver.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusState {
    pub id: String,
    pub v_mag: Option<f64>,
    pub v_angle: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorState {
    pub id: String,
    pub target_v: Option<f64>,
    pub p: Option<f64>,
    pub q: Option<f64>,
    pub max_q: Option<f64>,
    pub min_q: Option<f64>,
    pub voltage_regulator_on: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadState {
    pub id: String,
    pub p: Option<f64>,
    pub q: Option<f64>,
}

/// One end of a two-terminal branch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchTerminal {
    pub bus_id: Option<String>,
    pub i: Option<f64>,
    pub p: Option<f64>,
    pub q: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineState {
    pub id: String,
    pub side1: BranchTerminal,
    pub side2: BranchTerminal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformerState {
    pub id: String,
    pub rated_u1: Option<f64>,
    pub rated_u2: Option<f64>,
    pub side1: BranchTerminal,
    pub side2: BranchTerminal,
}

/// Boundary (X-node) injection modelled as a dangling line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DanglingLineState {
    pub id: String,
    pub bus_id: Option<String>,
    pub i: Option<f64>,
    pub p: Option<f64>,
    pub q: Option<f64>,
    pub boundary_v_mag: Option<f64>,
    pub boundary_v_angle: Option<f64>,
    pub boundary_p: Option<f64>,
    pub boundary_q: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwitchState {
    pub id: String,
    pub bus1_id: Option<String>,
    pub bus2_id: Option<String>,
    pub kind: Option<String>,
    pub open: Option<bool>,
    pub retained: Option<bool>,
}

/// Permanent current limit of one element side (`ONE`, `TWO`, or none).
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentLimit {
    pub element_id: String,
    pub side: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolvedNetwork {
    pub buses: Vec<BusState>,
    pub generators: Vec<GeneratorState>,
    pub loads: Vec<LoadState>,
    pub lines: Vec<LineState>,
    pub transformers: Vec<TransformerState>,
    pub dangling_lines: Vec<DanglingLineState>,
    pub switches: Vec<SwitchState>,
    pub current_limits: Vec<CurrentLimit>,
}

impl SolvedNetwork {
    /// Limit for an element side. With `side == None` any side matches.
    pub fn current_limit(&self, element_id: &str, side: Option<&str>) -> Option<f64> {
        self.current_limits
            .iter()
            .find(|limit| {
                limit.element_id == element_id
                    && side.map_or(true, |s| limit.side.as_deref() == Some(s))
            })
            .map(|limit| limit.value)
    }
}

/// The solver reports current magnitudes. The sign follows P, or Q when P is zero.
pub fn signed_current(i: f64, p: f64, q: f64) -> f64 {
    let magnitude = i.abs();
    if p != 0.0 {
        if p < 0.0 {
            -magnitude
        } else {
            magnitude
        }
    } else if q < 0.0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Element ids are written with spaces replaced by underscores.
pub fn report_id(id: &str) -> String {
    id.replace(' ', "_")
}

/// Bus ids are matched to generators and loads by their 8-character node code.
pub fn node_code(id: &str) -> String {
    id.chars().take(8).collect()
}
