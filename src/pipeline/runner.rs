//! Pipeline runner: configuration, branch orchestration and result assembly.
//!
//! A run has three independent branches over the same read-only matrix:
//!
//! - **prevalence**: bootstrap confidence intervals per feature
//! - **network**: pairwise tests, BH correction, network, communities
//! - **rules**: Apriori association rules
//!
//! The branches run concurrently. A failing branch is recorded in the bundle
//! and leaves the others untouched.

use crate::correct::bh::validate_alpha;
use crate::correct::correct_associations;
use crate::data::{BranchResult, FeatureMatrix, NetworkAnalysis, ResultBundle};
use crate::error::{AnalysisError, Result};
use crate::network::{build_network, detect_communities};
use crate::profile::{bootstrap_prevalence_with_config, BootstrapConfig, PrevalenceEstimate};
use crate::rules::{mine_rules, AssociationRule, RuleConfig};
use crate::test::analyze_pairs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Analysis configuration. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Bootstrap resamples per feature.
    pub bootstrap_iterations: usize,
    /// Confidence level of the prevalence intervals.
    pub confidence_level: f64,
    /// Threshold on BH-adjusted p-values for network edges.
    pub significance_alpha: f64,
    /// Minimum itemset support for rule mining.
    pub min_support: f64,
    /// Minimum rule confidence.
    pub min_confidence: f64,
    /// Top-level random seed.
    pub random_seed: u64,
    /// Search-space limit for rule mining.
    pub max_itemsets: usize,
    /// Largest itemset size for rule mining.
    pub max_itemset_len: Option<usize>,
    /// Limit on candidate rules evaluated by rule mining.
    pub max_rules: usize,
    /// Run branches and per-feature work on the rayon pool.
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bootstrap_iterations: 5000,
            confidence_level: 0.95,
            significance_alpha: 0.05,
            min_support: 0.1,
            min_confidence: 0.5,
            random_seed: 42,
            max_itemsets: 100_000,
            max_itemset_len: None,
            max_rules: 1_000_000,
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    /// Check every parameter range.
    pub fn validate(&self) -> Result<()> {
        self.bootstrap_config().validate()?;
        validate_alpha(self.significance_alpha)?;
        self.rule_config().validate()
    }

    /// Settings for the prevalence branch.
    pub fn bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            n_iterations: self.bootstrap_iterations,
            confidence_level: self.confidence_level,
            seed: self.random_seed,
            parallel: self.parallel,
        }
    }

    /// Settings for the rule branch.
    pub fn rule_config(&self) -> RuleConfig {
        RuleConfig {
            min_support: self.min_support,
            min_confidence: self.min_confidence,
            max_itemsets: self.max_itemsets,
            max_itemset_len: self.max_itemset_len,
            max_rules: self.max_rules,
        }
    }

    /// Load from YAML string. Missing fields take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(AnalysisError::from)
    }

    /// Load from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(AnalysisError::from)
    }
}

/// Builder for configuring and running an analysis.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: AnalysisConfig,
}

impl Pipeline {
    /// Create a pipeline with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a config.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Set the number of bootstrap resamples.
    pub fn bootstrap_iterations(mut self, n: usize) -> Self {
        self.config.bootstrap_iterations = n;
        self
    }

    /// Set the prevalence interval confidence level.
    pub fn confidence_level(mut self, level: f64) -> Self {
        self.config.confidence_level = level;
        self
    }

    /// Set the significance threshold on adjusted p-values.
    pub fn significance_alpha(mut self, alpha: f64) -> Self {
        self.config.significance_alpha = alpha;
        self
    }

    /// Set the minimum itemset support.
    pub fn min_support(mut self, support: f64) -> Self {
        self.config.min_support = support;
        self
    }

    /// Set the minimum rule confidence.
    pub fn min_confidence(mut self, confidence: f64) -> Self {
        self.config.min_confidence = confidence;
        self
    }

    /// Set the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Set the rule-mining search-space limit.
    pub fn max_itemsets(mut self, limit: usize) -> Self {
        self.config.max_itemsets = limit;
        self
    }

    /// Cap the itemset size for rule mining.
    pub fn max_itemset_len(mut self, len: usize) -> Self {
        self.config.max_itemset_len = Some(len);
        self
    }

    /// Set the limit on candidate rules.
    pub fn max_rules(mut self, limit: usize) -> Self {
        self.config.max_rules = limit;
        self
    }

    /// Enable or disable parallel execution.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Run the analysis.
    ///
    /// Configuration errors abort before any computation. Errors inside a
    /// branch are captured as that branch's `Failed` status.
    pub fn run(&self, matrix: &FeatureMatrix) -> Result<ResultBundle> {
        self.config.validate()?;
        let config = &self.config;
        info!(
            "Analysing {} strains × {} features",
            matrix.n_strains(),
            matrix.n_features()
        );

        let (prevalence, (network, rules)) = if config.parallel {
            rayon::join(
                || prevalence_branch(matrix, config),
                || {
                    rayon::join(
                        || network_branch(matrix, config),
                        || rule_branch(matrix, config),
                    )
                },
            )
        } else {
            (
                prevalence_branch(matrix, config),
                (network_branch(matrix, config), rule_branch(matrix, config)),
            )
        };

        Ok(ResultBundle {
            config: config.clone(),
            n_strains: matrix.n_strains(),
            n_features: matrix.n_features(),
            prevalence: record("prevalence", prevalence),
            network: record("network", network),
            rules: record("rules", rules),
        })
    }
}

/// Run the full analysis with an explicit configuration.
pub fn run_analysis(matrix: &FeatureMatrix, config: &AnalysisConfig) -> Result<ResultBundle> {
    Pipeline::from_config(config).run(matrix)
}

fn prevalence_branch(
    matrix: &FeatureMatrix,
    config: &AnalysisConfig,
) -> Result<Vec<PrevalenceEstimate>> {
    bootstrap_prevalence_with_config(matrix, &config.bootstrap_config())
}

fn network_branch(matrix: &FeatureMatrix, config: &AnalysisConfig) -> Result<NetworkAnalysis> {
    let records = analyze_pairs(matrix, config.parallel);
    let associations = correct_associations(&records, config.significance_alpha)?;
    let network = build_network(&associations, config.significance_alpha)?;
    let communities = detect_communities(&network);
    let community_summaries = communities.summarize(&network);
    Ok(NetworkAnalysis {
        associations,
        network,
        communities,
        community_summaries,
    })
}

fn rule_branch(matrix: &FeatureMatrix, config: &AnalysisConfig) -> Result<Vec<AssociationRule>> {
    mine_rules(matrix, &config.rule_config())
}

fn record<T>(branch: &str, result: Result<T>) -> BranchResult<T> {
    match &result {
        Ok(_) => info!("{} branch completed", branch),
        Err(e) => warn!("{} branch failed: {}", branch, e),
    }
    result.into()
}
