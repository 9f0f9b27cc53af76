use anyhow::Result;
use clap::Parser;
use lf_comparison::config::{parse_timestamps, parse_version_list, ComparisonConfig};
use lf_comparison::ComparisonRunner;
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lf_comparison")]
#[command(about = "Compare I, P, Q of lines/X-lines and U, theta of nodes/X-nodes between two load-flow reports")]
struct Args {
    /// Folder holding both load-flow report workbooks
    #[arg(long)]
    reports_dir: PathBuf,

    /// Folder where the combined comparison workbook is written
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

    /// Comma-separated HHMM list; blank for 0030-2330
    #[arg(short, long, default_value = "")]
    timestamps: String,

    /// Comma-separated report versions; blank for 0-14
    #[arg(long, default_value = "")]
    versions: String,

    /// Dead-zone below which values count as zero
    #[arg(long, default_value = "0.01")]
    epsilon: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ComparisonConfig::new(
        &args.reports_dir,
        &args.output_dir,
        &args.date,
        &args.file_type,
        &args.country_code,
    )?
    .with_timestamps(parse_timestamps(&args.timestamps)?)
    .with_versions(parse_version_list(&args.versions, 0..=14)?)
    .with_epsilon(args.epsilon);

    info!("Starting comparison for {} timestamps", config.timestamps.len());
    let summary = ComparisonRunner::new(config).run()?;

    println!(
        "Processed {} timestamps, skipped {}",
        summary.timestamps_processed, summary.timestamps_skipped
    );
    if summary.workbook.is_none() {
        anyhow::bail!("no processable data");
    }

    Ok(())
}
