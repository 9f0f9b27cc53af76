pub mod boundary_processor;
pub mod boundary_visualization;
pub mod capacity_processor;
pub mod loadflow_report_processor;
pub mod network;
pub mod solver;

pub use boundary_processor::{BoundaryConfig, BoundaryProcessor};
pub use capacity_processor::{CapacityConfig, CapacityProcessor};
pub use loadflow_report_processor::{LoadFlowReport, LoadFlowReportConfig, LoadFlowReportProcessor};
pub use network::SolvedNetwork;
pub use solver::{CommandSolver, ExportedStateSolver, LoadFlowParameters, LoadFlowSolver};
