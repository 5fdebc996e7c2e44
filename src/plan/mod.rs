//! The global plan: aggregation of module manifests and the build report.
pub mod aggregate;
pub mod report;

pub use aggregate::{Aggregator, GlobalPlan, PlannedFile, PlannedScript, normalize_path};
pub use report::BuildReport;
