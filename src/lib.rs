//! Antimicrobial Resistance Association and Network Library
//!
//! This library turns binary strain × feature tables of resistance phenotypes
//! and resistance genes into prevalence estimates, a co-occurrence network
//! with community structure, and association rules.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (FeatureMatrix, ResultBundle)
//! - **profile**: Prevalence profiling and bootstrap confidence intervals
//! - **test**: Pairwise contingency tests (chi-square / Fisher's exact)
//! - **correct**: Multiple testing correction (Benjamini-Hochberg)
//! - **network**: Co-occurrence network and Louvain communities
//! - **rules**: Apriori association rules
//! - **pipeline**: Configuration and concurrent execution of all branches
//! - **benchmark**: Synthetic strain collections with planted linkage
//!
//! # Example
//!
//! ```no_run
//! use amr_network::prelude::*;
//!
//! // Load data
//! let phenotypes = FeatureMatrix::from_tsv("phenotypes.tsv", FeatureDomain::Phenotype).unwrap();
//! let genes = FeatureMatrix::from_tsv("genes.tsv", FeatureDomain::Gene).unwrap();
//! let matrix = FeatureMatrix::combine(&phenotypes, &genes).unwrap();
//!
//! // Run analysis pipeline
//! let bundle = Pipeline::new()
//!     .bootstrap_iterations(5000)
//!     .significance_alpha(0.05)
//!     .min_support(0.1)
//!     .min_confidence(0.5)
//!     .seed(42)
//!     .run(&matrix)
//!     .unwrap();
//!
//! bundle.write_json("results.json").unwrap();
//! ```

pub mod benchmark;
pub mod correct;
pub mod data;
pub mod error;
pub mod network;
pub mod pipeline;
pub mod profile;
pub mod rules;
pub mod test;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::benchmark::{generate_synthetic, SyntheticConfig, SyntheticData};
    pub use crate::correct::{
        bh_adjust, correct_associations, correct_bh, AssociationStrength, BhCorrected,
        CorrectedAssociation,
    };
    pub use crate::data::{
        BranchResult, BranchStatus, FeatureDomain, FeatureMatrix, NetworkAnalysis, ResultBundle,
    };
    pub use crate::error::{AnalysisError, Result};
    pub use crate::network::{
        build_network, detect_communities, modularity, CommunityAssignment, CommunitySummary,
        Edge, EdgeSign, Network, Node,
    };
    pub use crate::pipeline::{run_analysis, AnalysisConfig, Pipeline};
    pub use crate::profile::{
        bootstrap_prevalence, bootstrap_prevalence_with_config, profile_prevalence,
        BootstrapConfig, PrevalenceEstimate, PrevalenceProfile,
    };
    pub use crate::rules::{
        frequent_itemsets, mine_rules, mine_rules_default, AssociationRule, FrequentItemset,
        RuleConfig,
    };
    pub use crate::test::{analyze_pairs, AssociationRecord, ContingencyTable, TestKind};
}
