//! Benjamini-Hochberg false discovery rate correction.

use crate::error::{AnalysisError, Result};
use crate::test::AssociationRecord;
use serde::{Deserialize, Serialize};

/// Result of BH correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BhCorrected {
    /// Test identifiers in original order.
    pub ids: Vec<String>,
    /// Original p-values.
    pub p_values: Vec<f64>,
    /// Adjusted p-values (q-values); NaN where the raw p-value is NaN.
    pub q_values: Vec<f64>,
    /// Number of tests with a finite p-value.
    pub n_tests: usize,
}

impl BhCorrected {
    /// Get q-value for a specific test.
    pub fn get_qvalue(&self, id: &str) -> Option<f64> {
        let idx = self.ids.iter().position(|f| f == id)?;
        self.q_values.get(idx).copied()
    }

    /// Count significant results at a threshold.
    pub fn n_significant(&self, alpha: f64) -> usize {
        self.q_values.iter().filter(|&&q| q < alpha).count()
    }

    /// Get indices of significant results.
    pub fn significant_indices(&self, alpha: f64) -> Vec<usize> {
        self.q_values
            .iter()
            .enumerate()
            .filter(|(_, &q)| q < alpha)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Apply Benjamini-Hochberg FDR correction.
///
/// The BH procedure controls the false discovery rate (FDR) at level α.
/// For each p-value, the adjusted p-value (q-value) is calculated as:
/// q[i] = min(p[i] * m / rank[i], q[i+1])
///
/// NaN p-values do not count towards `m` and keep a NaN q-value.
///
/// # Arguments
/// * `p_values` - Raw p-values
/// * `ids` - Test identifiers (same order as p_values)
///
/// # Returns
/// BhCorrected containing q-values in input order.
pub fn correct_bh(p_values: &[f64], ids: &[String]) -> BhCorrected {
    let q_values = bh_adjust(p_values);
    BhCorrected {
        ids: ids.to_vec(),
        p_values: p_values.to_vec(),
        n_tests: p_values.iter().filter(|p| !p.is_nan()).count(),
        q_values,
    }
}

/// BH-adjusted p-values in input order.
pub fn bh_adjust(p_values: &[f64]) -> Vec<f64> {
    let mut q_values = vec![f64::NAN; p_values.len()];

    // Stable sort keeps input order among tied p-values
    let mut indices: Vec<usize> = (0..p_values.len())
        .filter(|&i| !p_values[i].is_nan())
        .collect();
    indices.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let m = indices.len();
    if m == 0 {
        return q_values;
    }
    let m_f64 = m as f64;

    // Work backwards from the largest p-value
    let mut running_min = f64::INFINITY;
    for (i, &orig_idx) in indices.iter().enumerate().rev() {
        let rank = i + 1;
        let adjusted = p_values[orig_idx] * m_f64 / rank as f64;
        running_min = running_min.min(adjusted).min(1.0);
        q_values[orig_idx] = running_min;
    }

    q_values
}

/// An association record with its FDR-adjusted p-value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedAssociation {
    #[serde(flatten)]
    pub record: AssociationRecord,
    /// BH-adjusted p-value.
    #[serde(deserialize_with = "crate::data::serde_nan::deserialize")]
    pub adjusted_p: f64,
    /// `adjusted_p < alpha`.
    pub significant: bool,
    /// Effect size classification from |phi|.
    pub strength: AssociationStrength,
}

/// Effect size classification of the phi coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationStrength {
    /// |phi| < 0.1
    Negligible,
    /// 0.1 <= |phi| < 0.3
    Weak,
    /// 0.3 <= |phi| < 0.5
    Moderate,
    /// |phi| >= 0.5
    Strong,
    /// phi undefined (zero margin)
    Undefined,
}

impl AssociationStrength {
    /// Classify a phi coefficient.
    pub fn from_phi(phi: f64) -> Self {
        let magnitude = phi.abs();
        if magnitude.is_nan() {
            Self::Undefined
        } else if magnitude < 0.1 {
            Self::Negligible
        } else if magnitude < 0.3 {
            Self::Weak
        } else if magnitude < 0.5 {
            Self::Moderate
        } else {
            Self::Strong
        }
    }

    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Negligible => "negligible",
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
            Self::Undefined => "undefined",
        }
    }
}

/// Apply BH correction across a batch of association records.
///
/// # Arguments
/// * `records` - Pairwise association records
/// * `alpha` - Significance threshold on the adjusted p-value, in (0, 1)
///
/// # Returns
/// Corrected associations in input order.
pub fn correct_associations(
    records: &[AssociationRecord],
    alpha: f64,
) -> Result<Vec<CorrectedAssociation>> {
    validate_alpha(alpha)?;

    let p_values: Vec<f64> = records.iter().map(|r| r.raw_p).collect();
    let q_values = bh_adjust(&p_values);

    Ok(records
        .iter()
        .zip(q_values)
        .map(|(record, adjusted_p)| CorrectedAssociation {
            significant: adjusted_p < alpha,
            strength: AssociationStrength::from_phi(record.phi),
            record: record.clone(),
            adjusted_p,
        })
        .collect())
}

pub(crate) fn validate_alpha(alpha: f64) -> Result<()> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(AnalysisError::Config(format!(
            "significance_alpha must be in (0, 1), got {}",
            alpha
        )))
    }
}
