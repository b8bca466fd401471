//! Pipeline configuration and execution for resistance association analysis.

mod runner;

pub use runner::{run_analysis, AnalysisConfig, Pipeline};
