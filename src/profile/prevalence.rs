//! Prevalence profiling for binary feature matrices.

use crate::data::FeatureMatrix;
use serde::{Deserialize, Serialize};

/// Profile of prevalence characteristics in a feature matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrevalenceProfile {
    /// Number of features.
    pub n_features: usize,
    /// Number of strains.
    pub n_strains: usize,
    /// Prevalence (proportion of strains carrying the feature) per feature.
    pub feature_prevalence: Vec<f64>,
    /// Mean prevalence across features.
    pub mean_prevalence: f64,
    /// Median prevalence across features.
    pub median_prevalence: f64,
    /// Minimum prevalence.
    pub min_prevalence: f64,
    /// Maximum prevalence.
    pub max_prevalence: f64,
    /// Number of features present in all strains.
    pub n_ubiquitous: usize,
    /// Number of features absent from every strain.
    pub n_absent: usize,
    /// Number of features present in only one strain.
    pub n_singletons: usize,
    /// Number of features below 10% prevalence.
    pub n_rare: usize,
}

impl PrevalenceProfile {
    /// Get features above a prevalence threshold.
    pub fn features_above(&self, threshold: f64) -> Vec<usize> {
        self.feature_prevalence
            .iter()
            .enumerate()
            .filter(|(_, &p)| p >= threshold)
            .map(|(i, _)| i)
            .collect()
    }

    /// Features whose prevalence is zero or one; their columns carry no variance.
    pub fn zero_variance_features(&self) -> Vec<usize> {
        self.feature_prevalence
            .iter()
            .enumerate()
            .filter(|(_, &p)| p <= 0.0 || p >= 1.0)
            .map(|(i, _)| i)
            .collect()
    }
}

impl std::fmt::Display for PrevalenceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Prevalence Profile")?;
        writeln!(f, "  Features:      {}", self.n_features)?;
        writeln!(f, "  Strains:       {}", self.n_strains)?;
        writeln!(f, "  Mean prevalence:   {:.2}%", self.mean_prevalence * 100.0)?;
        writeln!(f, "  Median prevalence: {:.2}%", self.median_prevalence * 100.0)?;
        writeln!(f, "  Min prevalence:    {:.2}%", self.min_prevalence * 100.0)?;
        writeln!(f, "  Max prevalence:    {:.2}%", self.max_prevalence * 100.0)?;
        writeln!(f, "  Ubiquitous (100%): {}", self.n_ubiquitous)?;
        writeln!(f, "  Absent (0%):       {}", self.n_absent)?;
        writeln!(f, "  Singletons (1 strain): {}", self.n_singletons)?;
        writeln!(f, "  Rare (<10%):  {}", self.n_rare)?;
        Ok(())
    }
}

/// Profile prevalence characteristics of a feature matrix.
pub fn profile_prevalence(matrix: &FeatureMatrix) -> PrevalenceProfile {
    let n_features = matrix.n_features();
    let n_strains = matrix.n_strains();

    let feature_prevalence: Vec<f64> = (0..n_features)
        .map(|i| {
            if n_strains == 0 {
                0.0
            } else {
                matrix.present_count(i) as f64 / n_strains as f64
            }
        })
        .collect();

    let mean_prevalence = if n_features > 0 {
        feature_prevalence.iter().sum::<f64>() / n_features as f64
    } else {
        0.0
    };

    let median_prevalence = median(&feature_prevalence);
    let min_prevalence = feature_prevalence.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_prevalence = feature_prevalence.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let n_ubiquitous = (0..n_features)
        .filter(|&i| n_strains > 0 && matrix.present_count(i) == n_strains)
        .count();
    let n_absent = (0..n_features).filter(|&i| matrix.present_count(i) == 0).count();
    let n_singletons = (0..n_features).filter(|&i| matrix.present_count(i) == 1).count();
    let n_rare = feature_prevalence.iter().filter(|&&p| p < 0.10).count();

    PrevalenceProfile {
        n_features,
        n_strains,
        feature_prevalence,
        mean_prevalence,
        median_prevalence,
        min_prevalence: if min_prevalence.is_infinite() { 0.0 } else { min_prevalence },
        max_prevalence: if max_prevalence.is_infinite() { 0.0 } else { max_prevalence },
        n_ubiquitous,
        n_absent,
        n_singletons,
        n_rare,
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}
