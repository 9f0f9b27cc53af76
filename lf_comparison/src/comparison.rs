use crate::aggregator::ReportAggregator;
use crate::config::ComparisonConfig;
use crate::data_loader::DataLoader;
use crate::differ::Differ;
use crate::file_naming::{candidate_report_name, find_highest_version, reference_report_name};
use crate::merger::merge_common;
use crate::models::{ElementCategory, ReportSheet};
use crate::schema::CategorySchema;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};

/// Outcome of a reconciliation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonSummary {
    pub timestamps_processed: usize,
    pub timestamps_skipped: usize,
    pub sheets_written: Vec<ElementCategory>,
    /// `None` when nothing was processable and no workbook was produced.
    pub workbook: Option<PathBuf>,
}

pub struct ComparisonRunner {
    config: ComparisonConfig,
    loader: DataLoader,
    differ: Differ,
}

impl ComparisonRunner {
    pub fn new(config: ComparisonConfig) -> Self {
        let differ = Differ::new(config.epsilon);
        Self {
            config,
            loader: DataLoader::new(),
            differ,
        }
    }

    /// Reference and candidate workbooks for one timestamp, if both exist.
    pub fn locate_reports(&self, timestamp: &str) -> Option<(u32, PathBuf, PathBuf)> {
        let c = &self.config;
        let Some((version, reference)) = find_highest_version(c.versions.iter().copied(), |v| {
            c.reports_dir
                .join(reference_report_name(&c.date, timestamp, &c.file_type, &c.country_code, v))
        }) else {
            warn!(
                "No {} report found for {} in versions {:?}",
                c.reference_label, timestamp, c.versions
            );
            return None;
        };

        let candidate = c
            .reports_dir
            .join(candidate_report_name(&c.date, timestamp, &c.file_type, &c.country_code));
        if !candidate.exists() {
            warn!(
                "The following expected report was not found: '{}'. Check the file naming pattern.",
                candidate.display()
            );
            return None;
        }

        Some((version, reference, candidate))
    }

    /// Compare one category for one timestamp.
    pub fn compare_category(
        &self,
        category: ElementCategory,
        timestamp: &str,
        reference: &Path,
        candidate: &Path,
    ) -> Result<ReportSheet> {
        let schema = CategorySchema::for_category(category);
        let reference_records = self.loader.load_records(reference, &schema.reference)?;
        let candidate_records = self.loader.load_records(candidate, &schema.candidate)?;

        let merged = merge_common(reference_records, candidate_records);
        let records = self.differ.compare_all(&merged, schema.quantities, timestamp);

        Ok(ReportSheet {
            category,
            timestamp: timestamp.to_string(),
            records,
        })
    }

    pub fn run(&self) -> Result<ComparisonSummary> {
        println!(
            "🔍 Comparing {} and {} load flows for {}",
            self.config.reference_label, self.config.candidate_label, self.config.date
        );
        println!("{}", "=".repeat(60));

        let mut aggregator = ReportAggregator::new();
        let mut processed = 0;
        let mut skipped = 0;

        let pb = ProgressBar::new(self.config.timestamps.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")?,
        );

        for timestamp in &self.config.timestamps {
            pb.set_message(timestamp.clone());
            pb.inc(1);

            let Some((version, reference, candidate)) = self.locate_reports(timestamp) else {
                skipped += 1;
                continue;
            };
            info!("Highest version for {}: {}", timestamp, version);

            for category in ElementCategory::ALL {
                match self.compare_category(category, timestamp, &reference, &candidate) {
                    Ok(sheet) => aggregator.push(sheet),
                    Err(e) => error!("Skipping {} at {}: {:#}", category, timestamp, e),
                }
            }
            processed += 1;
        }
        pb.finish_with_message("done");

        let workbook = self.config.output_workbook();
        let sheets_written = aggregator.write(
            &workbook,
            &self.config.reference_label,
            &self.config.candidate_label,
        )?;

        let workbook = if sheets_written.is_empty() {
            println!("❌ No comparable data found. No output generated.");
            None
        } else {
            println!("✅ Comparison saved to {}", workbook.display());
            Some(workbook)
        };

        Ok(ComparisonSummary {
            timestamps_processed: processed,
            timestamps_skipped: skipped,
            sheets_written,
            workbook,
        })
    }
}
