//! Data structures for resistance association analysis.

mod feature_matrix;
mod result;
pub(crate) mod serde_nan;

pub use feature_matrix::{FeatureDomain, FeatureMatrix};
pub use result::{BranchResult, BranchStatus, NetworkAnalysis, ResultBundle};
