//! Synthetic strain collections for benchmarking and testing.
//!
//! Generates binary phenotype/gene matrices with planted linked groups: each
//! group pairs one resistance phenotype with a set of determinant genes, and
//! members of a group follow a shared latent carrier state with probability
//! `linkage`. Everything else is independent background noise.

use crate::data::{FeatureDomain, FeatureMatrix};
use crate::error::{AnalysisError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for synthetic data generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Name/identifier for this dataset.
    pub name: String,
    /// Number of strains.
    pub n_strains: usize,
    /// Number of phenotype features.
    pub n_phenotypes: usize,
    /// Number of gene features.
    pub n_genes: usize,
    /// Number of planted phenotype/gene groups.
    pub n_linked_groups: usize,
    /// Genes per planted group.
    pub genes_per_group: usize,
    /// Probability that a group member copies the group's carrier state.
    pub linkage: f64,
    /// Prevalence of the latent carrier state of each group.
    pub group_prevalence: f64,
    /// Prevalence of unlinked features and of unlinked draws.
    pub background_prevalence: f64,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            n_strains: 200,
            n_phenotypes: 8,
            n_genes: 24,
            n_linked_groups: 3,
            genes_per_group: 2,
            linkage: 0.9,
            group_prevalence: 0.4,
            background_prevalence: 0.15,
            seed: 42,
        }
    }
}

impl SyntheticConfig {
    /// Create a new config with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Set dimensions.
    pub fn with_dimensions(mut self, n_strains: usize, n_phenotypes: usize, n_genes: usize) -> Self {
        self.n_strains = n_strains;
        self.n_phenotypes = n_phenotypes;
        self.n_genes = n_genes;
        self
    }

    /// Set the planted group structure.
    pub fn with_linked_groups(mut self, n_groups: usize, genes_per_group: usize, linkage: f64) -> Self {
        self.n_linked_groups = n_groups;
        self.genes_per_group = genes_per_group;
        self.linkage = linkage.clamp(0.0, 1.0);
        self
    }

    /// Set carrier and background prevalence.
    pub fn with_prevalence(mut self, group: f64, background: f64) -> Self {
        self.group_prevalence = group.clamp(0.0, 1.0);
        self.background_prevalence = background.clamp(0.0, 1.0);
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // Preset configurations

    /// Small collection for quick tests and demos.
    pub fn small() -> Self {
        Self::new("small")
            .with_dimensions(60, 4, 8)
            .with_linked_groups(2, 2, 0.95)
            .with_prevalence(0.4, 0.1)
    }

    /// Surveillance-sized collection with weak linkage.
    pub fn surveillance() -> Self {
        Self::new("surveillance")
            .with_dimensions(1000, 15, 60)
            .with_linked_groups(5, 3, 0.7)
            .with_prevalence(0.3, 0.1)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("linkage", self.linkage),
            ("group_prevalence", self.group_prevalence),
            ("background_prevalence", self.background_prevalence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnalysisError::Config(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Result of synthetic data generation.
#[derive(Debug, Clone)]
pub struct SyntheticData {
    /// Combined phenotype + gene matrix.
    pub matrix: FeatureMatrix,
    /// Feature names of each planted group (phenotype first).
    pub linked_groups: Vec<Vec<String>>,
    /// Configuration used.
    pub config: SyntheticConfig,
}

impl SyntheticData {
    /// Whether two features belong to the same planted group.
    pub fn is_linked(&self, a: &str, b: &str) -> bool {
        self.linked_groups
            .iter()
            .any(|g| g.iter().any(|f| f == a) && g.iter().any(|f| f == b))
    }

    /// Write `phenotypes.tsv`, `genes.tsv` and `config.yaml` to a directory.
    pub fn write_to_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        for (domain, file) in [
            (FeatureDomain::Phenotype, "phenotypes.tsv"),
            (FeatureDomain::Gene, "genes.tsv"),
        ] {
            let indices: Vec<usize> = (0..self.matrix.n_features())
                .filter(|&i| self.matrix.domain(i) == domain)
                .collect();
            self.matrix.subset_features(&indices)?.to_tsv(dir.join(file))?;
        }

        let config_yaml = serde_yaml::to_string(&self.config)?;
        std::fs::write(dir.join("config.yaml"), config_yaml)?;

        Ok(())
    }
}

/// Generate a synthetic strain collection with planted linked groups.
///
/// Groups are clamped to the available phenotypes and genes.
pub fn generate_synthetic(config: &SyntheticConfig) -> Result<SyntheticData> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let genes_per_group = if config.genes_per_group == 0 {
        0
    } else {
        config.genes_per_group.min(config.n_genes)
    };
    let max_groups_by_genes = if genes_per_group == 0 {
        config.n_phenotypes
    } else {
        config.n_genes / genes_per_group
    };
    let n_groups = config
        .n_linked_groups
        .min(config.n_phenotypes)
        .min(max_groups_by_genes);

    let phenotype_names: Vec<String> = (0..config.n_phenotypes)
        .map(|i| format!("PHENO_{:02}", i))
        .collect();
    let gene_names: Vec<String> = (0..config.n_genes)
        .map(|i| format!("gene_{:03}", i))
        .collect();
    let n_features = config.n_phenotypes + config.n_genes;

    // Group of each feature column (phenotypes first, then genes)
    let mut group_of: Vec<Option<usize>> = vec![None; n_features];
    let mut linked_groups = Vec::with_capacity(n_groups);
    for g in 0..n_groups {
        let mut members = vec![phenotype_names[g].clone()];
        group_of[g] = Some(g);
        for k in 0..genes_per_group {
            let gene = g * genes_per_group + k;
            group_of[config.n_phenotypes + gene] = Some(g);
            members.push(gene_names[gene].clone());
        }
        linked_groups.push(members);
    }

    let rows: Vec<Vec<u8>> = (0..config.n_strains)
        .map(|_| {
            let carriers: Vec<bool> = (0..n_groups)
                .map(|_| rng.random::<f64>() < config.group_prevalence)
                .collect();
            group_of
                .iter()
                .map(|group| {
                    let present = match group {
                        Some(g) if rng.random::<f64>() < config.linkage => carriers[*g],
                        _ => rng.random::<f64>() < config.background_prevalence,
                    };
                    u8::from(present)
                })
                .collect()
        })
        .collect();

    let strain_ids: Vec<String> = (0..config.n_strains)
        .map(|i| format!("S{:04}", i))
        .collect();
    let domains: Vec<FeatureDomain> = std::iter::repeat(FeatureDomain::Phenotype)
        .take(config.n_phenotypes)
        .chain(std::iter::repeat(FeatureDomain::Gene).take(config.n_genes))
        .collect();
    let feature_names = phenotype_names.into_iter().chain(gene_names).collect();

    let matrix = FeatureMatrix::from_rows(strain_ids, feature_names, &rows, FeatureDomain::Phenotype)?
        .with_domains(domains)?;

    Ok(SyntheticData {
        matrix,
        linked_groups,
        config: config.clone(),
    })
}
