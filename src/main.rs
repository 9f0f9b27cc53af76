use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use grid_study_processor::{
    BoundaryConfig, BoundaryProcessor, CapacityConfig, CapacityProcessor, CommandSolver, ExportedStateSolver,
    LoadFlowParameters, LoadFlowReportConfig, LoadFlowReportProcessor, LoadFlowSolver,
};
use grid_study_processor::boundary_processor::DEFAULT_VERSION_RANGE;
use grid_study_processor::loadflow_report_processor::{DEFAULT_FORMAT, DEFAULT_REPORT_VERSIONS};
use lf_comparison::config::{parse_timestamps, parse_version_list, parse_version_range, ComparisonConfig};
use lf_comparison::ComparisonRunner;
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grid_study_processor")]
#[command(about = "Load-flow studies over grid-model snapshots: reports, comparison, capacity and boundary flows")]
struct Cli {
    /// External AC load-flow program; without it the exported `<model>_state/` tables are read
    #[arg(long, global = true)]
    solver_command: Option<PathBuf>,

    /// Comma-separated slack bus ids
    #[arg(long, global = true, default_value = "")]
    slack_buses: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Folder holding the grid-model snapshots
    #[arg(long)]
    models_dir: PathBuf,

    #[arg(long)]
    output_dir: PathBuf,

    /// Date (YYYYMMDD)
    #[arg(short, long)]
    date: String,

    /// File type (e.g. FO3)
    #[arg(short, long)]
    file_type: String,

    /// Country code (e.g. GR)
    #[arg(short, long)]
    country_code: String,

    /// Snapshot file extension
    #[arg(long, default_value = DEFAULT_FORMAT)]
    format: String,
}

#[derive(Subcommand)]
enum Command {
    /// Compare the reference and candidate load-flow reports of one day
    Compare {
        #[arg(long)]
        reports_dir: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
        #[arg(short, long)]
        date: String,
        #[arg(short, long)]
        file_type: String,
        #[arg(short, long)]
        country_code: String,
        /// Comma-separated HHMM list; blank for 0030-2330
        #[arg(short, long, default_value = "")]
        timestamps: String,
        /// Comma-separated report versions; blank for 0-14
        #[arg(long, default_value = "")]
        versions: String,
        #[arg(long, default_value = "0.01")]
        epsilon: f64,
    },
    /// Solve every hour of a day and write the candidate load-flow reports
    LoadflowReport {
        #[command(flatten)]
        snapshot: SnapshotArgs,
        /// Comma-separated HHMM list; blank for 0030-2330
        #[arg(short, long, default_value = "")]
        timestamps: String,
        /// Comma-separated snapshot versions; blank for 0-9
        #[arg(long, default_value = "")]
        versions: String,
    },
    /// Monthly transfer capacity per border and direction
    Capacity {
        #[arg(long)]
        base_dir: PathBuf,
        /// Month (YYYYMM)
        #[arg(long)]
        year_month: String,
        #[arg(long)]
        output_dir: PathBuf,
        /// Comma-separated YYYYMMDD dates; blank for every date folder of the month
        #[arg(long, default_value = "")]
        dates: String,
        /// Comma-separated direction labels
        #[arg(long, default_value = "")]
        directions: String,
    },
    /// Boundary-node flows of one day with per-node diagrams
    Boundary {
        #[command(flatten)]
        snapshot: SnapshotArgs,
        /// Version range start-end
        #[arg(long, default_value = "0-20")]
        versions: String,
        #[arg(long, default_value = "G")]
        area_prefix: String,
        #[arg(long, default_value = "GREEK")]
        area_name: String,
        #[arg(long)]
        no_plots: bool,
    },
}

fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn build_solver(command: Option<PathBuf>) -> Box<dyn LoadFlowSolver> {
    match command {
        Some(program) => {
            info!("Using solver program {}", program.display());
            Box::new(CommandSolver::new(program))
        }
        None => Box::new(ExportedStateSolver),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let parameters = LoadFlowParameters::default().with_slack_buses(split_list(&cli.slack_buses));
    let solver = build_solver(cli.solver_command);

    match cli.command {
        Command::Compare {
            reports_dir,
            output_dir,
            date,
            file_type,
            country_code,
            timestamps,
            versions,
            epsilon,
        } => {
            let config = ComparisonConfig::new(&reports_dir, &output_dir, &date, &file_type, &country_code)?
                .with_timestamps(parse_timestamps(&timestamps)?)
                .with_versions(parse_version_list(&versions, 0..=14)?)
                .with_epsilon(epsilon);
            let summary = ComparisonRunner::new(config).run()?;
            if summary.workbook.is_none() {
                bail!("no processable data");
            }
        }
        Command::LoadflowReport {
            snapshot,
            timestamps,
            versions,
        } => {
            let config = LoadFlowReportConfig::new(
                &snapshot.models_dir,
                &snapshot.output_dir,
                &snapshot.date,
                &snapshot.file_type,
                &snapshot.country_code,
            )?
            .with_hours(parse_timestamps(&timestamps)?)
            .with_versions(parse_version_list(&versions, DEFAULT_REPORT_VERSIONS)?)
            .with_format(&snapshot.format)
            .with_parameters(parameters);
            let summary = LoadFlowReportProcessor::new(config, solver).process_all()?;
            if summary.reports.is_empty() {
                bail!("no load-flow report produced");
            }
        }
        Command::Capacity {
            base_dir,
            year_month,
            output_dir,
            dates,
            directions,
        } => {
            let config = CapacityConfig::new(&base_dir, &year_month, &output_dir)?
                .with_dates(split_list(&dates))?
                .with_directions(split_list(&directions))
                .with_parameters(parameters);
            if CapacityProcessor::new(config, solver).process_month()?.is_none() {
                bail!("no capacity data produced");
            }
        }
        Command::Boundary {
            snapshot,
            versions,
            area_prefix,
            area_name,
            no_plots,
        } => {
            let config = BoundaryConfig::new(
                &snapshot.models_dir,
                &snapshot.output_dir,
                &snapshot.date,
                &snapshot.file_type,
                &snapshot.country_code,
            )?
            .with_versions(parse_version_range(&versions, DEFAULT_VERSION_RANGE))
            .with_area(&area_prefix, &area_name)?
            .with_plots(!no_plots)
            .with_format(&snapshot.format)
            .with_parameters(parameters);
            let summary = BoundaryProcessor::new(config, solver).process_day()?;
            if summary.table.is_none() {
                bail!("no boundary data produced");
            }
        }
    }

    Ok(())
}
