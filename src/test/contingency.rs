//! Pairwise 2×2 contingency testing between binary features.
//!
//! Each unordered feature pair is summarised as a 2×2 table and tested for
//! independence. The test is chosen per table with Cochran's rule: Fisher's
//! exact test when expected counts are too small for the chi-square
//! approximation, Pearson's chi-square test otherwise. The phi coefficient is
//! reported as effect size in both cases.

use crate::data::{FeatureDomain, FeatureMatrix};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Discrete, Hypergeometric};

/// Relative tolerance when comparing hypergeometric table probabilities.
const FISHER_RELATIVE_TOLERANCE: f64 = 1e-7;

/// Statistical test used for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// Pearson chi-square test of independence (1 df).
    ChiSquare,
    /// Fisher's exact test (two-sided).
    FisherExact,
}

impl TestKind {
    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChiSquare => "chi_square",
            Self::FisherExact => "fisher_exact",
        }
    }
}

/// A 2×2 table `[[a, b], [c, d]]`.
///
/// Rows split strains by feature A (present, absent), columns by feature B
/// (present, absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyTable {
    pub a: u64,
    pub b: u64,
    pub c: u64,
    pub d: u64,
}

impl ContingencyTable {
    /// Create a table from its four cells.
    pub fn new(a: u64, b: u64, c: u64, d: u64) -> Self {
        Self { a, b, c, d }
    }

    /// Build the table for two features of a matrix.
    pub fn from_features(matrix: &FeatureMatrix, feature_a: usize, feature_b: usize) -> Self {
        let present_a = matrix.present_strains(feature_a);
        let present_b = matrix.present_strains(feature_b);
        let both = sorted_intersection_len(&present_a, &present_b) as u64;
        let n = matrix.n_strains() as u64;
        let a_only = present_a.len() as u64 - both;
        let b_only = present_b.len() as u64 - both;
        Self::new(both, a_only, b_only, n - both - a_only - b_only)
    }

    /// The same table with the roles of the two features swapped.
    pub fn transposed(&self) -> Self {
        Self::new(self.a, self.c, self.b, self.d)
    }

    /// Total count.
    pub fn total(&self) -> u64 {
        self.a + self.b + self.c + self.d
    }

    /// Row sums `(r1, r2)`.
    pub fn row_sums(&self) -> (u64, u64) {
        (self.a + self.b, self.c + self.d)
    }

    /// Column sums `(c1, c2)`.
    pub fn col_sums(&self) -> (u64, u64) {
        (self.a + self.c, self.b + self.d)
    }

    /// Whether any margin is zero.
    pub fn is_degenerate(&self) -> bool {
        let (r1, r2) = self.row_sums();
        let (c1, c2) = self.col_sums();
        r1 == 0 || r2 == 0 || c1 == 0 || c2 == 0
    }

    /// Expected cell counts under independence, in `[a, b, c, d]` order.
    pub fn expected(&self) -> [f64; 4] {
        let n = self.total() as f64;
        if n == 0.0 {
            return [0.0; 4];
        }
        let (r1, r2) = self.row_sums();
        let (c1, c2) = self.col_sums();
        [
            r1 as f64 * c1 as f64 / n,
            r1 as f64 * c2 as f64 / n,
            r2 as f64 * c1 as f64 / n,
            r2 as f64 * c2 as f64 / n,
        ]
    }

    /// Cochran's rule: choose Fisher's exact test when any expected count is
    /// below 1 or fewer than 80% of cells have an expected count of at least 5.
    pub fn select_test(&self) -> TestKind {
        let expected = self.expected();
        let min_expected = expected.iter().cloned().fold(f64::INFINITY, f64::min);
        let n_adequate = expected.iter().filter(|&&e| e >= 5.0).count();
        if min_expected < 1.0 || (n_adequate as f64) < 0.8 * expected.len() as f64 {
            TestKind::FisherExact
        } else {
            TestKind::ChiSquare
        }
    }

    /// Phi coefficient, NaN when a margin is zero.
    pub fn phi(&self) -> f64 {
        if self.is_degenerate() {
            return f64::NAN;
        }
        let (r1, r2) = self.row_sums();
        let (c1, c2) = self.col_sums();
        let numerator = self.a as f64 * self.d as f64 - self.b as f64 * self.c as f64;
        let denominator = (r1 as f64 * r2 as f64 * c1 as f64 * c2 as f64).sqrt();
        (numerator / denominator).clamp(-1.0, 1.0)
    }

    /// Pearson chi-square statistic (no continuity correction).
    pub fn chi_square_statistic(&self) -> f64 {
        if self.is_degenerate() {
            return f64::NAN;
        }
        let observed = [self.a, self.b, self.c, self.d];
        observed
            .iter()
            .zip(self.expected().iter())
            .map(|(&o, &e)| {
                let diff = o as f64 - e;
                diff * diff / e
            })
            .sum()
    }

    /// Upper-tail chi-square p-value with one degree of freedom.
    pub fn chi_square_p(&self) -> f64 {
        let statistic = self.chi_square_statistic();
        if statistic.is_nan() {
            return f64::NAN;
        }
        match ChiSquared::new(1.0) {
            Ok(dist) => dist.sf(statistic),
            Err(_) => f64::NAN,
        }
    }

    /// Two-sided Fisher's exact test p-value.
    ///
    /// Sums the hypergeometric probabilities of every table with the same
    /// margins that is no more likely than the observed one.
    pub fn fisher_exact_p(&self) -> f64 {
        if self.is_degenerate() {
            return f64::NAN;
        }
        let n = self.total();
        let (r1, _) = self.row_sums();
        let (c1, _) = self.col_sums();
        let hyper = match Hypergeometric::new(n, r1, c1) {
            Ok(h) => h,
            Err(_) => return f64::NAN,
        };

        // Log space: the plain pmf overflows its binomials for large collections
        let ln_observed = hyper.ln_pmf(self.a);
        let ln_threshold = ln_observed + FISHER_RELATIVE_TOLERANCE.ln_1p();
        let lo = (r1 + c1).saturating_sub(n);
        let hi = r1.min(c1);
        let relative: f64 = (lo..=hi)
            .map(|k| hyper.ln_pmf(k))
            .filter(|&ln_p| ln_p <= ln_threshold)
            .map(|ln_p| (ln_p - ln_observed).exp())
            .sum();
        (ln_observed + relative.ln()).exp().min(1.0)
    }
}

/// Result of testing one feature pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRecord {
    /// First feature name.
    pub feature_a: String,
    /// Second feature name.
    pub feature_b: String,
    /// Domain of the first feature.
    pub domain_a: FeatureDomain,
    /// Domain of the second feature.
    pub domain_b: FeatureDomain,
    /// Observed 2×2 table.
    pub table: ContingencyTable,
    /// Test selected by Cochran's rule.
    pub test_used: TestKind,
    /// Chi-square statistic (phi² × N when Fisher's test was used).
    #[serde(deserialize_with = "crate::data::serde_nan::deserialize")]
    pub statistic: f64,
    /// Unadjusted p-value.
    #[serde(deserialize_with = "crate::data::serde_nan::deserialize")]
    pub raw_p: f64,
    /// Phi coefficient in [-1, 1].
    #[serde(deserialize_with = "crate::data::serde_nan::deserialize")]
    pub phi: f64,
    /// True when a zero margin made the statistics undefined.
    pub degenerate: bool,
}

impl AssociationRecord {
    /// Whether the pair links a phenotype to a gene.
    pub fn is_cross_domain(&self) -> bool {
        self.domain_a != self.domain_b
    }
}

/// Test a 2×2 table, choosing the test with Cochran's rule.
///
/// Returns `(test_used, statistic, p_value, phi)`; all numbers are NaN for
/// degenerate tables.
pub fn test_table(table: &ContingencyTable) -> (TestKind, f64, f64, f64) {
    let test_used = table.select_test();
    if table.is_degenerate() {
        return (test_used, f64::NAN, f64::NAN, f64::NAN);
    }
    let phi = table.phi();
    match test_used {
        TestKind::ChiSquare => (
            test_used,
            table.chi_square_statistic(),
            table.chi_square_p(),
            phi,
        ),
        TestKind::FisherExact => (
            test_used,
            phi * phi * table.total() as f64,
            table.fisher_exact_p(),
            phi,
        ),
    }
}

/// Test a single feature pair.
pub fn analyze_pair(matrix: &FeatureMatrix, feature_a: usize, feature_b: usize) -> AssociationRecord {
    let table = ContingencyTable::from_features(matrix, feature_a, feature_b);
    let (test_used, statistic, raw_p, phi) = test_table(&table);
    let degenerate = table.is_degenerate();
    if degenerate {
        debug!(
            "Degenerate table for {} / {}: {:?}",
            matrix.feature_names()[feature_a],
            matrix.feature_names()[feature_b],
            table
        );
    }

    AssociationRecord {
        feature_a: matrix.feature_names()[feature_a].clone(),
        feature_b: matrix.feature_names()[feature_b].clone(),
        domain_a: matrix.domain(feature_a),
        domain_b: matrix.domain(feature_b),
        table,
        test_used,
        statistic,
        raw_p,
        phi,
        degenerate,
    }
}

/// All unordered feature pairs `(i, j)` with `i < j`, in canonical order.
pub fn feature_pairs(n_features: usize) -> Vec<(usize, usize)> {
    (0..n_features)
        .flat_map(|i| ((i + 1)..n_features).map(move |j| (i, j)))
        .collect()
}

/// Test every unordered feature pair of a matrix.
///
/// # Arguments
/// * `matrix` - Binary feature matrix
/// * `parallel` - Whether to distribute pairs across the rayon pool
///
/// # Returns
/// n·(n-1)/2 records in canonical pair order, independent of scheduling.
pub fn analyze_pairs(matrix: &FeatureMatrix, parallel: bool) -> Vec<AssociationRecord> {
    let pairs = feature_pairs(matrix.n_features());
    let records: Vec<AssociationRecord> = if parallel {
        pairs
            .par_iter()
            .map(|&(i, j)| analyze_pair(matrix, i, j))
            .collect()
    } else {
        pairs
            .iter()
            .map(|&(i, j)| analyze_pair(matrix, i, j))
            .collect()
    };

    let n_degenerate = records.iter().filter(|r| r.degenerate).count();
    if n_degenerate > 0 {
        debug!("{} of {} pairs have degenerate tables", n_degenerate, records.len());
    }
    records
}

fn sorted_intersection_len(a: &[usize], b: &[usize]) -> usize {
    let (mut i, mut j, mut count) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_chi_square() {
        let table = ContingencyTable::new(50, 30, 20, 40);
        assert_eq!(table.select_test(), TestKind::ChiSquare);

        let (test_used, statistic, p, phi) = test_table(&table);
        assert_eq!(test_used, TestKind::ChiSquare);
        assert_relative_eq!(statistic, 35.0 / 3.0, epsilon = 1e-5);
        assert_relative_eq!(p, 0.000636299, epsilon = 1e-5);
        assert_relative_eq!(phi, 0.288675, epsilon = 1e-5);
        assert!(phi > 0.0);
    }

    #[test]
    fn test_fisher_reference_values() {
        // Classic tea-tasting style tables
        assert_relative_eq!(
            ContingencyTable::new(8, 2, 1, 5).fisher_exact_p(),
            0.034965035,
            epsilon = 1e-8
        );
        assert_relative_eq!(
            ContingencyTable::new(1, 9, 11, 3).fisher_exact_p(),
            0.002759456,
            epsilon = 1e-8
        );
        assert_relative_eq!(
            ContingencyTable::new(3, 0, 0, 3).fisher_exact_p(),
            0.1,
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_fisher_large_collections() {
        // Singleton gene against a feature carried by half of 2000 strains
        let table = ContingencyTable::new(1, 0, 999, 1000);
        assert_eq!(table.select_test(), TestKind::FisherExact);
        assert_relative_eq!(table.fisher_exact_p(), 1.0, epsilon = 1e-9);

        // N = 2202: tables with a = 0 and a = 2 are kept, a = 1 is more likely
        let table = ContingencyTable::new(0, 2, 1100, 1100);
        assert_eq!(table.select_test(), TestKind::FisherExact);
        let expected = (1102.0 * 1101.0 + 1100.0 * 1099.0) / (2202.0 * 2201.0);
        assert_relative_eq!(table.fisher_exact_p(), expected, max_relative = 1e-9);

        // Perfect linkage of a 5-strain gene among 5000 strains
        let table = ContingencyTable::new(5, 0, 0, 4995);
        assert_eq!(table.select_test(), TestKind::FisherExact);
        let expected = 120.0 / (5000.0 * 4999.0 * 4998.0 * 4997.0 * 4996.0);
        let p = table.fisher_exact_p();
        assert!(p > 0.0);
        assert_relative_eq!(p, expected, max_relative = 1e-8);
    }

    #[test]
    fn test_fisher_hundreds_of_strains() {
        // N = 300, row margin 3, column margin 100; observed a = 3 is the rarest table
        let table = ContingencyTable::new(3, 0, 97, 200);
        assert_eq!(table.select_test(), TestKind::FisherExact);
        assert_relative_eq!(table.fisher_exact_p(), 161_700.0 / 4_455_100.0, max_relative = 1e-9);

        // Independent-looking rare feature is not significant
        let table = ContingencyTable::new(1, 2, 99, 198);
        assert_eq!(table.select_test(), TestKind::FisherExact);
        assert_relative_eq!(table.fisher_exact_p(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_small_table_uses_fisher() {
        let table = ContingencyTable::new(8, 2, 1, 5);
        let (test_used, statistic, _, phi) = test_table(&table);
        assert_eq!(test_used, TestKind::FisherExact);
        assert_relative_eq!(statistic, phi * phi * 16.0, epsilon = 1e-12);
    }

    #[test]
    fn test_phi_extremes() {
        assert_relative_eq!(ContingencyTable::new(10, 0, 0, 10).phi(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(ContingencyTable::new(0, 10, 10, 0).phi(), -1.0, epsilon = 1e-12);
        assert_relative_eq!(ContingencyTable::new(25, 25, 25, 25).phi(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_phi_bounded_exhaustive() {
        for a in 0..6u64 {
            for b in 0..6u64 {
                for c in 0..6u64 {
                    for d in 0..6u64 {
                        let table = ContingencyTable::new(a, b, c, d);
                        let phi = table.phi();
                        if table.is_degenerate() {
                            assert!(phi.is_nan());
                            continue;
                        }
                        assert!((-1.0..=1.0).contains(&phi));
                        if phi.abs() > 1.0 - 1e-12 {
                            // Only perfectly collinear tables reach |phi| = 1
                            assert!((b == 0 && c == 0) || (a == 0 && d == 0));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_degenerate_table() {
        let table = ContingencyTable::new(0, 0, 5, 7);
        let (_, statistic, p, phi) = test_table(&table);
        assert!(statistic.is_nan());
        assert!(p.is_nan());
        assert!(phi.is_nan());
    }

    #[test]
    fn test_swap_symmetry() {
        let table = ContingencyTable::new(12, 3, 7, 30);
        let (kind_ab, stat_ab, p_ab, phi_ab) = test_table(&table);
        let (kind_ba, stat_ba, p_ba, phi_ba) = test_table(&table.transposed());
        assert_eq!(kind_ab, kind_ba);
        assert_relative_eq!(stat_ab, stat_ba, epsilon = 1e-12);
        assert_relative_eq!(p_ab, p_ba, epsilon = 1e-12);
        assert_relative_eq!(phi_ab, phi_ba, epsilon = 1e-12);
    }

    #[test]
    fn test_analyze_pairs_matrix() {
        // 6 strains; AMP and blaTEM identical, CIP constant
        let rows = vec![
            vec![1, 1, 1],
            vec![1, 1, 1],
            vec![1, 1, 1],
            vec![0, 0, 1],
            vec![0, 0, 1],
            vec![0, 0, 1],
        ];
        let strains: Vec<String> = (0..6).map(|i| format!("S{}", i)).collect();
        let matrix = FeatureMatrix::from_rows(
            strains,
            vec!["AMP".into(), "blaTEM".into(), "CIP".into()],
            &rows,
            FeatureDomain::Phenotype,
        )
        .unwrap()
        .with_domains(vec![
            FeatureDomain::Phenotype,
            FeatureDomain::Gene,
            FeatureDomain::Phenotype,
        ])
        .unwrap();

        let records = analyze_pairs(&matrix, true);
        assert_eq!(records.len(), 3);
        let sequential = analyze_pairs(&matrix, false);
        for (par, seq) in records.iter().zip(sequential.iter()) {
            assert_eq!(par.feature_a, seq.feature_a);
            assert_eq!(par.feature_b, seq.feature_b);
            assert_eq!(par.table, seq.table);
        }

        assert_eq!(records[0].feature_a, "AMP");
        assert_eq!(records[0].feature_b, "blaTEM");
        assert!(records[0].is_cross_domain());
        assert_eq!(records[0].table, ContingencyTable::new(3, 0, 0, 3));
        assert_relative_eq!(records[0].phi, 1.0, epsilon = 1e-12);
        assert_eq!(records[0].test_used, TestKind::FisherExact);

        // CIP present everywhere -> zero column margin
        assert!(records[1].degenerate);
        assert!(records[2].phi.is_nan());
    }

    #[test]
    fn test_feature_pairs_order() {
        assert_eq!(feature_pairs(3), vec![(0, 1), (0, 2), (1, 2)]);
        assert!(feature_pairs(1).is_empty());
        assert_eq!(feature_pairs(10).len(), 45);
    }
}
