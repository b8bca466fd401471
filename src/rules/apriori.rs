//! Apriori association-rule mining over binary features.
//!
//! Each strain is a transaction and each present feature an item. Frequent
//! itemsets are grown level by level: candidates of size `k + 1` are formed by
//! joining two frequent `k`-itemsets that share their first `k - 1` items, and
//! any candidate with an infrequent `k`-subset is pruned before counting.
//! Support counts come from intersecting the sorted strain lists (tid-sets)
//! of the joined itemsets.

use crate::data::FeatureMatrix;
use crate::error::{AnalysisError, Result};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Configuration for rule mining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Minimum itemset support, in (0, 1].
    pub min_support: f64,
    /// Minimum rule confidence, in (0, 1].
    pub min_confidence: f64,
    /// Maximum number of candidates per level and of frequent itemsets overall.
    pub max_itemsets: usize,
    /// Largest itemset size to explore (at least 2 when set).
    pub max_itemset_len: Option<usize>,
    /// Maximum number of candidate rules (antecedent splits) to evaluate.
    pub max_rules: usize,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            min_support: 0.1,
            min_confidence: 0.5,
            max_itemsets: 100_000,
            max_itemset_len: None,
            max_rules: 1_000_000,
        }
    }
}

impl RuleConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_support > 0.0 && self.min_support <= 1.0) {
            return Err(AnalysisError::Config(format!(
                "min_support must be in (0, 1], got {}",
                self.min_support
            )));
        }
        if !(self.min_confidence > 0.0 && self.min_confidence <= 1.0) {
            return Err(AnalysisError::Config(format!(
                "min_confidence must be in (0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.max_itemsets == 0 {
            return Err(AnalysisError::Config(
                "max_itemsets must be at least 1".to_string(),
            ));
        }
        if self.max_rules == 0 {
            return Err(AnalysisError::Config(
                "max_rules must be at least 1".to_string(),
            ));
        }
        if let Some(len) = self.max_itemset_len {
            if len < 2 {
                return Err(AnalysisError::Config(format!(
                    "max_itemset_len must be at least 2, got {}",
                    len
                )));
            }
        }
        Ok(())
    }
}

/// A frequent itemset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequentItemset {
    /// Feature names in column order.
    pub items: Vec<String>,
    /// Number of strains carrying every item.
    pub count: usize,
    /// `count / n_strains`.
    pub support: f64,
}

/// An association rule `antecedent => consequent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    /// Left-hand side, in column order.
    pub antecedent: Vec<String>,
    /// Right-hand side, in column order; disjoint from the antecedent.
    pub consequent: Vec<String>,
    /// Support of antecedent ∪ consequent.
    pub support: f64,
    /// `support / antecedent_support`.
    pub confidence: f64,
    /// `confidence / consequent_support`.
    pub lift: f64,
    pub antecedent_support: f64,
    pub consequent_support: f64,
    /// `support - antecedent_support * consequent_support`.
    pub leverage: f64,
}

impl std::fmt::Display for AssociationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}} => {{{}}} (support {:.3}, confidence {:.3}, lift {:.3})",
            self.antecedent.join(", "),
            self.consequent.join(", "),
            self.support,
            self.confidence,
            self.lift
        )
    }
}

/// Itemset over column indices with its tid-set.
#[derive(Debug, Clone)]
struct Itemset {
    items: Vec<usize>,
    tids: Vec<usize>,
}

/// Mine association rules.
///
/// # Arguments
/// * `matrix` - Binary feature matrix; strains are transactions
/// * `config` - Support/confidence thresholds and search-space limits
///
/// # Returns
/// Rules sorted by lift (descending), then confidence (descending), then
/// antecedent and consequent in column order. Empty when there are no strains.
///
/// # Errors
/// `Config` for out-of-range thresholds, `SearchSpaceTooLarge` when the number
/// of candidates at a level or of frequent itemsets exceeds `max_itemsets`,
/// `RuleSpaceTooLarge` when the frequent itemsets split into more than
/// `max_rules` candidate rules.
pub fn mine_rules(matrix: &FeatureMatrix, config: &RuleConfig) -> Result<Vec<AssociationRule>> {
    config.validate()?;
    if matrix.n_strains() == 0 {
        return Ok(Vec::new());
    }

    let levels = frequent_levels(matrix, config)?;
    check_rule_limit(&levels, config.max_rules)?;
    let n = matrix.n_strains() as f64;
    let counts: HashMap<&[usize], usize> = levels
        .iter()
        .flatten()
        .map(|s| (s.items.as_slice(), s.tids.len()))
        .collect();

    let mut rules: Vec<(AssociationRule, Vec<usize>, Vec<usize>)> = Vec::new();
    for itemset in levels.iter().skip(1).flatten() {
        let len = itemset.items.len();
        let count = itemset.tids.len();

        // Every non-empty proper subset is an antecedent
        for mask in 1..(1u64 << len) - 1 {
            let mut antecedent = Vec::new();
            let mut consequent = Vec::new();
            for (bit, &item) in itemset.items.iter().enumerate() {
                if (mask >> bit) & 1 == 1 {
                    antecedent.push(item);
                } else {
                    consequent.push(item);
                }
            }
            let (Some(&a_count), Some(&c_count)) = (
                counts.get(antecedent.as_slice()),
                counts.get(consequent.as_slice()),
            ) else {
                continue;
            };

            let confidence = count as f64 / a_count as f64;
            if confidence < config.min_confidence {
                continue;
            }
            let support = count as f64 / n;
            let antecedent_support = a_count as f64 / n;
            let consequent_support = c_count as f64 / n;
            let rule = AssociationRule {
                antecedent: names(matrix, &antecedent),
                consequent: names(matrix, &consequent),
                support,
                confidence,
                lift: confidence / consequent_support,
                antecedent_support,
                consequent_support,
                leverage: support - antecedent_support * consequent_support,
            };
            rules.push((rule, antecedent, consequent));
        }
    }

    rules.sort_by(|(x, xa, xc), (y, ya, yc)| {
        y.lift
            .total_cmp(&x.lift)
            .then(y.confidence.total_cmp(&x.confidence))
            .then_with(|| xa.cmp(ya))
            .then_with(|| xc.cmp(yc))
    });

    debug!("Mined {} rules", rules.len());
    Ok(rules.into_iter().map(|(rule, _, _)| rule).collect())
}

/// Mine rules with default search-space limits.
pub fn mine_rules_default(
    matrix: &FeatureMatrix,
    min_support: f64,
    min_confidence: f64,
) -> Result<Vec<AssociationRule>> {
    let config = RuleConfig {
        min_support,
        min_confidence,
        ..RuleConfig::default()
    };
    mine_rules(matrix, &config)
}

/// All frequent itemsets, by size and then in column order.
pub fn frequent_itemsets(
    matrix: &FeatureMatrix,
    config: &RuleConfig,
) -> Result<Vec<FrequentItemset>> {
    config.validate()?;
    if matrix.n_strains() == 0 {
        return Ok(Vec::new());
    }
    let n = matrix.n_strains() as f64;
    Ok(frequent_levels(matrix, config)?
        .into_iter()
        .flatten()
        .map(|s| FrequentItemset {
            items: names(matrix, &s.items),
            count: s.tids.len(),
            support: s.tids.len() as f64 / n,
        })
        .collect())
}

/// Frequent itemsets grouped by size (index 0 holds singletons).
fn frequent_levels(matrix: &FeatureMatrix, config: &RuleConfig) -> Result<Vec<Vec<Itemset>>> {
    let n = matrix.n_strains() as f64;
    let is_frequent = |s: &Itemset| s.tids.len() as f64 / n >= config.min_support;

    check_limit(1, matrix.n_features(), config.max_itemsets)?;
    let singletons: Vec<Itemset> = (0..matrix.n_features())
        .map(|f| Itemset {
            items: vec![f],
            tids: matrix.present_strains(f),
        })
        .filter(|s| is_frequent(s))
        .collect();

    let mut total = singletons.len();
    let mut levels = vec![singletons];
    debug!("Apriori level 1: {} frequent itemsets", total);

    loop {
        let k = levels.len();
        if config.max_itemset_len.is_some_and(|max| k >= max) {
            break;
        }
        let current = &levels[k - 1];
        let candidates = join_and_prune(current);
        check_limit(k + 1, candidates.len(), config.max_itemsets)?;

        let next: Vec<Itemset> = candidates
            .into_par_iter()
            .map(|(items, i, j)| Itemset {
                items,
                tids: intersect(&current[i].tids, &current[j].tids),
            })
            .filter(|s| is_frequent(s))
            .collect();
        if next.is_empty() {
            break;
        }

        total += next.len();
        check_limit(k + 1, total, config.max_itemsets)?;
        debug!("Apriori level {}: {} frequent itemsets", k + 1, next.len());
        levels.push(next);
    }

    Ok(levels)
}

/// Fail before rule generation when the itemsets split into too many rules.
///
/// An itemset of size `k` yields `2^k - 2` antecedent/consequent splits.
fn check_rule_limit(levels: &[Vec<Itemset>], limit: usize) -> Result<()> {
    let mut candidates = 0usize;
    for itemset in levels.iter().skip(1).flatten() {
        let splits = u32::try_from(itemset.items.len())
            .ok()
            .and_then(|len| 1usize.checked_shl(len))
            .map_or(usize::MAX, |pow| pow - 2);
        candidates = candidates.saturating_add(splits);
        if candidates > limit {
            return Err(AnalysisError::RuleSpaceTooLarge { candidates, limit });
        }
    }
    debug!("{} candidate rules", candidates);
    Ok(())
}

/// Candidates of size `k + 1` with the indices of the two joined parents.
///
/// `level` must be sorted lexicographically; the output is too.
fn join_and_prune(level: &[Itemset]) -> Vec<(Vec<usize>, usize, usize)> {
    let frequent: HashSet<&[usize]> = level.iter().map(|s| s.items.as_slice()).collect();
    let mut candidates = Vec::new();

    for i in 0..level.len() {
        let left = &level[i].items;
        let k = left.len();
        for (j, right) in level.iter().enumerate().skip(i + 1) {
            let right = &right.items;
            if left[..k - 1] != right[..k - 1] {
                break;
            }
            let mut items = left.clone();
            items.push(right[k - 1]);

            // Dropping either of the last two items yields a parent
            let all_subsets_frequent = (0..k.saturating_sub(1)).all(|drop| {
                let subset: Vec<usize> = items
                    .iter()
                    .enumerate()
                    .filter(|&(pos, _)| pos != drop)
                    .map(|(_, &item)| item)
                    .collect();
                frequent.contains(subset.as_slice())
            });
            if all_subsets_frequent {
                candidates.push((items, i, j));
            }
        }
    }
    candidates
}

/// Intersection of two sorted index lists.
fn intersect(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn check_limit(level: usize, candidates: usize, limit: usize) -> Result<()> {
    if candidates > limit {
        return Err(AnalysisError::SearchSpaceTooLarge {
            level,
            candidates,
            limit,
        });
    }
    Ok(())
}

fn names(matrix: &FeatureMatrix, items: &[usize]) -> Vec<String> {
    items
        .iter()
        .map(|&i| matrix.feature_names()[i].clone())
        .collect()
}
