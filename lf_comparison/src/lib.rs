pub mod aggregator;
pub mod comparison;
pub mod config;
pub mod data_loader;
pub mod differ;
pub mod file_naming;
pub mod merger;
pub mod models;
pub mod normalizer;
pub mod schema;

pub use aggregator::ReportAggregator;
pub use comparison::{ComparisonRunner, ComparisonSummary};
pub use config::{ComparisonConfig, ConfigError};
pub use data_loader::DataLoader;
pub use differ::Differ;
pub use models::{ComparisonRecord, ElementCategory, ElementKey, ElementRecord, Quantity, ReportSheet};
