//! Percentile-bootstrap confidence intervals for feature prevalence.
//!
//! For each feature the strains are resampled with replacement a fixed number
//! of times and the proportion of carriers is recorded per resample. The
//! confidence interval is read off the empirical quantiles of those
//! proportions (percentile method); the point estimate is the prevalence on
//! the original data.
//!
//! # Reproducibility
//!
//! Every feature owns an independent random stream whose seed is derived from
//! the top-level seed and the feature's column index, so results do not depend
//! on how work is split across threads.
//!
//! # Example
//!
//! ```ignore
//! use amr_network::profile::bootstrap_prevalence;
//!
//! let estimates = bootstrap_prevalence(&matrix, 5000, 0.95, 42)?;
//! for e in &estimates {
//!     println!("{}: {:.1}% [{:.1}, {:.1}]", e.feature, e.point_estimate, e.ci_lower, e.ci_upper);
//! }
//! ```

use crate::data::{FeatureDomain, FeatureMatrix};
use crate::error::{AnalysisError, Result};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for bootstrap prevalence estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Number of resamples per feature.
    pub n_iterations: usize,
    /// Confidence level of the interval, in (0, 1).
    pub confidence_level: f64,
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Whether to process features in parallel.
    pub parallel: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            n_iterations: 5000,
            confidence_level: 0.95,
            seed: 42,
            parallel: true,
        }
    }
}

impl BootstrapConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.n_iterations == 0 {
            return Err(AnalysisError::Config(
                "bootstrap_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(AnalysisError::Config(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        Ok(())
    }
}

/// Bootstrap prevalence estimate for one feature. Percentages are on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrevalenceEstimate {
    /// Feature name.
    pub feature: String,
    /// Feature domain.
    pub domain: FeatureDomain,
    /// Number of strains carrying the feature.
    pub n_present: usize,
    /// Number of strains.
    pub n_strains: usize,
    /// Prevalence on the original data (%).
    #[serde(deserialize_with = "crate::data::serde_nan::deserialize")]
    pub point_estimate: f64,
    /// Lower bound of the percentile interval (%).
    #[serde(deserialize_with = "crate::data::serde_nan::deserialize")]
    pub ci_lower: f64,
    /// Upper bound of the percentile interval (%).
    #[serde(deserialize_with = "crate::data::serde_nan::deserialize")]
    pub ci_upper: f64,
    /// Confidence level used for the interval.
    pub confidence_level: f64,
}

impl PrevalenceEstimate {
    /// Interval width in percentage points.
    pub fn ci_width(&self) -> f64 {
        self.ci_upper - self.ci_lower
    }

    /// Whether a prevalence (%) lies inside the interval.
    pub fn contains(&self, percent: f64) -> bool {
        percent >= self.ci_lower && percent <= self.ci_upper
    }
}

/// Estimate prevalence with percentile-bootstrap confidence intervals.
///
/// # Arguments
/// * `matrix` - Binary feature matrix
/// * `n_iterations` - Number of resamples per feature (>= 1)
/// * `confidence_level` - Interval confidence level in (0, 1)
/// * `seed` - Top-level random seed
///
/// # Returns
/// One estimate per feature in column order; empty when the matrix has no strains.
pub fn bootstrap_prevalence(
    matrix: &FeatureMatrix,
    n_iterations: usize,
    confidence_level: f64,
    seed: u64,
) -> Result<Vec<PrevalenceEstimate>> {
    let config = BootstrapConfig {
        n_iterations,
        confidence_level,
        seed,
        parallel: true,
    };
    bootstrap_prevalence_with_config(matrix, &config)
}

/// Estimate prevalence using an explicit configuration.
pub fn bootstrap_prevalence_with_config(
    matrix: &FeatureMatrix,
    config: &BootstrapConfig,
) -> Result<Vec<PrevalenceEstimate>> {
    config.validate()?;

    if matrix.n_strains() == 0 {
        debug!("Bootstrap skipped: matrix has no strains");
        return Ok(Vec::new());
    }

    let estimate = |feature: usize| estimate_feature(matrix, feature, config);
    let estimates = if config.parallel {
        (0..matrix.n_features())
            .into_par_iter()
            .map(estimate)
            .collect()
    } else {
        (0..matrix.n_features()).map(estimate).collect()
    };
    Ok(estimates)
}

fn estimate_feature(
    matrix: &FeatureMatrix,
    feature: usize,
    config: &BootstrapConfig,
) -> PrevalenceEstimate {
    let n_strains = matrix.n_strains();
    let n_present = matrix.present_count(feature);
    let point = n_present as f64 / n_strains as f64;

    let (lower, upper) = if n_present == 0 || n_present == n_strains {
        // Every resample reproduces the original column
        debug!(
            "Zero-variance column '{}' ({} of {} strains)",
            matrix.feature_names()[feature],
            n_present,
            n_strains
        );
        (point, point)
    } else {
        let column = matrix.column_dense(feature);
        let mut rng = StdRng::seed_from_u64(derive_seed(config.seed, feature as u64));
        let mut proportions: Vec<f64> = (0..config.n_iterations)
            .map(|_| {
                let hits = (0..n_strains)
                    .filter(|_| column[rng.random_range(0..n_strains)] == 1)
                    .count();
                hits as f64 / n_strains as f64
            })
            .collect();
        proportions.sort_by(|a, b| a.total_cmp(b));

        let tail = (1.0 - config.confidence_level) / 2.0;
        (
            percentile(&proportions, tail),
            percentile(&proportions, 1.0 - tail),
        )
    };

    PrevalenceEstimate {
        feature: matrix.feature_names()[feature].clone(),
        domain: matrix.domain(feature),
        n_present,
        n_strains,
        point_estimate: point * 100.0,
        ci_lower: lower.min(point) * 100.0,
        ci_upper: upper.max(point) * 100.0,
        confidence_level: config.confidence_level,
    }
}

/// Derive an independent seed for a unit of work from the top-level seed.
///
/// SplitMix64 finalizer over `seed + (index + 1) * golden_gamma`.
pub fn derive_seed(seed: u64, index: u64) -> u64 {
    let mut z = seed.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Empirical quantile of sorted data with linear interpolation between order statistics.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = h - lo as f64;
            sorted[lo] + frac * (sorted[hi] - sorted[lo])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn single_feature(n_strains: usize, present: impl Fn(usize) -> bool) -> FeatureMatrix {
        let rows: Vec<Vec<u8>> = (0..n_strains).map(|i| vec![present(i) as u8]).collect();
        let strains: Vec<String> = (0..n_strains).map(|i| format!("strain_{}", i)).collect();
        FeatureMatrix::from_rows(strains, vec!["blaCTX-M".into()], &rows, FeatureDomain::Gene)
            .unwrap()
    }

    #[test]
    fn test_one_in_fifty() {
        let matrix = single_feature(50, |i| i == 0);
        let estimates = bootstrap_prevalence(&matrix, 5000, 0.95, 42).unwrap();

        assert_eq!(estimates.len(), 1);
        let e = &estimates[0];
        assert_relative_eq!(e.point_estimate, 2.0, epsilon = 1e-10);
        assert!(!e.contains(50.0));
        assert!(e.ci_lower >= 0.0);
        assert!(e.ci_lower <= e.point_estimate && e.point_estimate <= e.ci_upper);
    }

    #[test]
    fn test_zero_variance_columns() {
        for (present, expected) in [(false, 0.0), (true, 100.0)] {
            let matrix = single_feature(20, |_| present);
            let e = &bootstrap_prevalence(&matrix, 500, 0.95, 7).unwrap()[0];
            assert!(!e.ci_lower.is_nan() && !e.ci_upper.is_nan());
            assert_relative_eq!(e.point_estimate, expected);
            assert_relative_eq!(e.ci_lower, expected);
            assert_relative_eq!(e.ci_upper, expected);
        }
    }

    #[test]
    fn test_empty_matrix() {
        let matrix = single_feature(0, |_| true);
        let estimates = bootstrap_prevalence(&matrix, 100, 0.95, 1).unwrap();
        assert!(estimates.is_empty());
    }

    #[test]
    fn test_invalid_config() {
        let matrix = single_feature(10, |i| i % 2 == 0);
        let err = bootstrap_prevalence(&matrix, 0, 0.95, 1).unwrap_err();
        assert!(err.is_config());
        let err = bootstrap_prevalence(&matrix, 100, 1.0, 1).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_deterministic_and_parallel_independent() {
        let rows: Vec<Vec<u8>> = (0..40)
            .map(|i| vec![(i % 3 == 0) as u8, (i % 5 < 2) as u8, (i % 7 == 1) as u8])
            .collect();
        let strains: Vec<String> = (0..40).map(|i| format!("s{}", i)).collect();
        let matrix = FeatureMatrix::from_rows(
            strains,
            vec!["a".into(), "b".into(), "c".into()],
            &rows,
            FeatureDomain::Phenotype,
        )
        .unwrap();

        let parallel = BootstrapConfig {
            n_iterations: 1000,
            seed: 99,
            ..Default::default()
        };
        let sequential = BootstrapConfig {
            parallel: false,
            ..parallel.clone()
        };

        let first = bootstrap_prevalence_with_config(&matrix, &parallel).unwrap();
        let second = bootstrap_prevalence_with_config(&matrix, &parallel).unwrap();
        let third = bootstrap_prevalence_with_config(&matrix, &sequential).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(first[1].feature, "b");
    }

    #[test]
    fn test_width_shrinks_with_sample_size() {
        let small = single_feature(20, |i| i % 10 < 3);
        let large = single_feature(500, |i| i % 10 < 3);

        let small_e = &bootstrap_prevalence(&small, 2000, 0.95, 3).unwrap()[0];
        let large_e = &bootstrap_prevalence(&large, 2000, 0.95, 3).unwrap()[0];

        assert_relative_eq!(small_e.point_estimate, 30.0, epsilon = 1e-10);
        assert_relative_eq!(large_e.point_estimate, 30.0, epsilon = 1e-10);
        assert!(large_e.ci_width() < small_e.ci_width());
    }

    #[test]
    fn test_coverage_near_nominal() {
        let true_p = 0.3;
        let n_trials = 200;
        let mut data_rng = StdRng::seed_from_u64(2024);
        let mut covered = 0;

        for trial in 0..n_trials {
            let draws: Vec<bool> = (0..100).map(|_| data_rng.random::<f64>() < true_p).collect();
            let matrix = single_feature(100, |i| draws[i]);
            let e = &bootstrap_prevalence(&matrix, 1000, 0.95, trial as u64).unwrap()[0];
            if e.contains(true_p * 100.0) {
                covered += 1;
            }
        }

        let coverage = covered as f64 / n_trials as f64;
        assert!(
            (0.85..=0.99).contains(&coverage),
            "coverage {} outside expected band",
            coverage
        );
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile(&sorted, 0.5), 2.0);
        assert_relative_eq!(percentile(&sorted, 0.125), 0.5);
        assert_relative_eq!(percentile(&sorted, 1.0), 4.0);
        assert!(percentile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_derive_seed_distinct() {
        let seeds: Vec<u64> = (0..100).map(|i| derive_seed(42, i)).collect();
        let mut unique = seeds.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), seeds.len());
        assert_eq!(derive_seed(42, 3), derive_seed(42, 3));
    }
}
