//! Result bundle produced by a full analysis run.

use crate::correct::CorrectedAssociation;
use crate::error::{AnalysisError, Result};
use crate::network::{CommunityAssignment, CommunitySummary, Network};
use crate::pipeline::AnalysisConfig;
use crate::profile::PrevalenceEstimate;
use crate::rules::AssociationRule;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Outcome of one analysis branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BranchStatus {
    /// The branch ran to completion.
    Completed,
    /// The branch aborted; other branches are unaffected.
    Failed { reason: String },
}

/// Status and value of one branch. `value` is `None` exactly when the branch failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchResult<T> {
    pub status: BranchStatus,
    pub value: Option<T>,
}

impl<T> BranchResult<T> {
    /// A completed branch.
    pub fn completed(value: T) -> Self {
        Self {
            status: BranchStatus::Completed,
            value: Some(value),
        }
    }

    /// A failed branch.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: BranchStatus::Failed {
                reason: reason.into(),
            },
            value: None,
        }
    }

    /// Whether the branch completed.
    pub fn is_completed(&self) -> bool {
        self.status == BranchStatus::Completed
    }

    /// Failure reason, if any.
    pub fn failure(&self) -> Option<&str> {
        match &self.status {
            BranchStatus::Completed => None,
            BranchStatus::Failed { reason } => Some(reason),
        }
    }

    /// Borrow the value of a completed branch.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

impl<T> From<Result<T>> for BranchResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::completed(value),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Output of the association branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAnalysis {
    /// Every tested pair in canonical order, with BH-adjusted p-values.
    pub associations: Vec<CorrectedAssociation>,
    /// Network of significant associations.
    pub network: Network,
    /// Louvain partition of the network.
    pub communities: CommunityAssignment,
    /// Per-community composition.
    pub community_summaries: Vec<CommunitySummary>,
}

impl NetworkAnalysis {
    /// Number of associations significant after correction.
    pub fn n_significant(&self) -> usize {
        self.associations.iter().filter(|a| a.significant).count()
    }
}

/// Complete, serializable record of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    /// Configuration the run used.
    pub config: AnalysisConfig,
    pub n_strains: usize,
    pub n_features: usize,
    /// Bootstrap prevalence estimates.
    pub prevalence: BranchResult<Vec<PrevalenceEstimate>>,
    /// Associations, network and communities.
    pub network: BranchResult<NetworkAnalysis>,
    /// Association rules.
    pub rules: BranchResult<Vec<AssociationRule>>,
}

impl ResultBundle {
    /// Whether every branch completed.
    pub fn is_complete(&self) -> bool {
        self.prevalence.is_completed() && self.network.is_completed() && self.rules.is_completed()
    }

    /// Names of the branches that failed.
    pub fn failed_branches(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if !self.prevalence.is_completed() {
            failed.push("prevalence");
        }
        if !self.network.is_completed() {
            failed.push("network");
        }
        if !self.rules.is_completed() {
            failed.push("rules");
        }
        failed
    }

    /// Serialize to pretty-printed JSON. Non-finite numbers become `null`.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(AnalysisError::from)
    }

    /// Parse a bundle written by [`ResultBundle::to_json`]; `null` numbers read
    /// back as NaN.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(AnalysisError::from)
    }

    /// Read a bundle written by [`ResultBundle::write_json`].
    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(AnalysisError::from)
    }

    /// Write the bundle as JSON.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Display for ResultBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Strains: {}", self.n_strains)?;
        writeln!(f, "Features: {}", self.n_features)?;

        match (&self.prevalence.value, self.prevalence.failure()) {
            (Some(estimates), _) => writeln!(f, "Prevalence: {} estimates", estimates.len())?,
            (None, reason) => writeln!(f, "Prevalence: failed ({})", reason.unwrap_or(""))?,
        }
        match (&self.network.value, self.network.failure()) {
            (Some(analysis), _) => writeln!(
                f,
                "Network: {} pairs tested, {} significant, {} nodes, {} edges, {} communities (Q = {:.4})",
                analysis.associations.len(),
                analysis.n_significant(),
                analysis.network.n_nodes(),
                analysis.network.n_edges(),
                analysis.communities.n_communities,
                analysis.communities.modularity
            )?,
            (None, reason) => writeln!(f, "Network: failed ({})", reason.unwrap_or(""))?,
        }
        match (&self.rules.value, self.rules.failure()) {
            (Some(rules), _) => writeln!(f, "Rules: {}", rules.len())?,
            (None, reason) => writeln!(f, "Rules: failed ({})", reason.unwrap_or(""))?,
        }
        Ok(())
    }
}
