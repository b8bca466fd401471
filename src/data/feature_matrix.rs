//! Binary strain × feature matrix with sparse storage.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Origin of a binary feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureDomain {
    /// Resistance phenotype (e.g. an antibiotic susceptibility call).
    Phenotype,
    /// Resistance gene or other genotypic marker.
    Gene,
}

impl FeatureDomain {
    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Phenotype => "phenotype",
            Self::Gene => "gene",
        }
    }
}

/// A binary presence/absence matrix of features across strains.
///
/// Logically strains are rows and features are columns. Internally the data is
/// stored transposed in CSR format (features × strains) so that the strains
/// carrying a feature are one contiguous, sorted index slice.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Sparse matrix in CSR format (features × strains), only 1s stored.
    data: CsMat<u8>,
    /// Feature names (column names of the logical matrix).
    feature_names: Vec<String>,
    /// Strain identifiers (row names of the logical matrix).
    strain_ids: Vec<String>,
    /// Domain of each feature.
    domains: Vec<FeatureDomain>,
}

impl FeatureMatrix {
    /// Create a new FeatureMatrix from a sparse features × strains matrix.
    ///
    /// All features are tagged with `domain`. Stored values must be 0 or 1;
    /// explicit zeros are dropped.
    pub fn new(
        data: CsMat<u8>,
        feature_names: Vec<String>,
        strain_ids: Vec<String>,
        domain: FeatureDomain,
    ) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_names.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: nrows,
                actual: feature_names.len(),
            });
        }
        if ncols != strain_ids.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: ncols,
                actual: strain_ids.len(),
            });
        }
        check_unique(&feature_names, "feature")?;
        check_unique(&strain_ids, "strain")?;

        // Rebuild so that only 1s are stored and indices are sorted
        let mut tri_mat = TriMat::new((nrows, ncols));
        for (row, row_vec) in data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                match val {
                    0 => {}
                    1 => tri_mat.add_triplet(row, col, 1u8),
                    other => {
                        return Err(AnalysisError::InvalidValue {
                            value: other.to_string(),
                            row,
                            col,
                        })
                    }
                }
            }
        }

        let domains = vec![domain; nrows];
        Ok(Self {
            data: tri_mat.to_csr(),
            feature_names,
            strain_ids,
            domains,
        })
    }

    /// Create from dense strain-major rows (`rows[strain][feature]`).
    pub fn from_rows(
        strain_ids: Vec<String>,
        feature_names: Vec<String>,
        rows: &[Vec<u8>],
        domain: FeatureDomain,
    ) -> Result<Self> {
        if rows.len() != strain_ids.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: strain_ids.len(),
                actual: rows.len(),
            });
        }
        let n_features = feature_names.len();
        let mut tri_mat = TriMat::new((n_features, strain_ids.len()));
        for (strain, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(AnalysisError::DimensionMismatch {
                    expected: n_features,
                    actual: row.len(),
                });
            }
            for (feature, &val) in row.iter().enumerate() {
                match val {
                    0 => {}
                    1 => tri_mat.add_triplet(feature, strain, 1u8),
                    other => {
                        return Err(AnalysisError::InvalidValue {
                            value: other.to_string(),
                            row: strain,
                            col: feature,
                        })
                    }
                }
            }
        }
        Self::new(tri_mat.to_csr(), feature_names, strain_ids, domain)
    }

    /// Replace the per-feature domain tags.
    pub fn with_domains(mut self, domains: Vec<FeatureDomain>) -> Result<Self> {
        if domains.len() != self.n_features() {
            return Err(AnalysisError::DimensionMismatch {
                expected: self.n_features(),
                actual: domains.len(),
            });
        }
        self.domains = domains;
        Ok(self)
    }

    /// Load a feature matrix from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with feature names (first column is the strain ID header)
    /// - Subsequent rows: strain ID followed by 0/1 cells
    pub fn from_tsv<P: AsRef<Path>>(path: P, domain: FeatureDomain) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_path(path)?;

        let header = reader.headers()?.clone();
        if header.len() < 2 {
            return Err(AnalysisError::EmptyData(
                "TSV must have at least one feature column".to_string(),
            ));
        }
        let feature_names: Vec<String> = header.iter().skip(1).map(|s| s.trim().to_string()).collect();

        let mut strain_ids = Vec::new();
        let mut rows = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let strain_id = record.get(0).unwrap_or_default().trim().to_string();
            let row = record
                .iter()
                .skip(1)
                .enumerate()
                .map(|(col_idx, cell)| parse_binary(cell, row_idx, col_idx))
                .collect::<Result<Vec<u8>>>()?;
            strain_ids.push(strain_id);
            rows.push(row);
        }

        if strain_ids.is_empty() {
            return Err(AnalysisError::EmptyData("No strains in TSV".to_string()));
        }

        Self::from_rows(strain_ids, feature_names, &rows, domain)
    }

    /// Write the matrix to a TSV file (strains as rows).
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "strain_id")?;
        for name in &self.feature_names {
            write!(writer, "\t{}", name)?;
        }
        writeln!(writer)?;

        for (strain, strain_id) in self.strain_ids.iter().enumerate() {
            write!(writer, "{}", strain_id)?;
            for feature in 0..self.n_features() {
                write!(writer, "\t{}", self.get(strain, feature))?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }

    /// Combine a phenotype matrix and a gene matrix into one hybrid matrix.
    ///
    /// Strains are aligned by identifier and kept in the phenotype matrix
    /// order. Both matrices must cover exactly the same strains.
    pub fn combine(phenotypes: &FeatureMatrix, genes: &FeatureMatrix) -> Result<Self> {
        if phenotypes.n_strains() != genes.n_strains() {
            return Err(AnalysisError::StrainMismatch(format!(
                "{} phenotype strains vs {} gene strains",
                phenotypes.n_strains(),
                genes.n_strains()
            )));
        }
        let gene_pos: HashMap<&str, usize> = genes
            .strain_ids
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();

        // gene strain index -> phenotype strain index
        let mut remap = vec![0usize; genes.n_strains()];
        for (new_idx, strain) in phenotypes.strain_ids.iter().enumerate() {
            let old_idx = gene_pos.get(strain.as_str()).ok_or_else(|| {
                AnalysisError::StrainMismatch(format!("strain '{}' missing from gene data", strain))
            })?;
            remap[*old_idx] = new_idx;
        }

        let n_pheno = phenotypes.n_features();
        let n_features = n_pheno + genes.n_features();
        let mut tri_mat = TriMat::new((n_features, phenotypes.n_strains()));
        for (row, row_vec) in phenotypes.data.outer_iterator().enumerate() {
            for (col, _) in row_vec.iter() {
                tri_mat.add_triplet(row, col, 1u8);
            }
        }
        for (row, row_vec) in genes.data.outer_iterator().enumerate() {
            for (col, _) in row_vec.iter() {
                tri_mat.add_triplet(n_pheno + row, remap[col], 1u8);
            }
        }

        let feature_names: Vec<String> = phenotypes
            .feature_names
            .iter()
            .chain(genes.feature_names.iter())
            .cloned()
            .collect();
        let domains: Vec<FeatureDomain> = phenotypes
            .domains
            .iter()
            .chain(genes.domains.iter())
            .copied()
            .collect();

        Self::new(
            tri_mat.to_csr(),
            feature_names,
            phenotypes.strain_ids.clone(),
            FeatureDomain::Phenotype,
        )?
        .with_domains(domains)
    }

    /// Get the value for (strain, feature), 0 when absent.
    #[inline]
    pub fn get(&self, strain: usize, feature: usize) -> u8 {
        self.data.get(feature, strain).copied().unwrap_or(0)
    }

    /// Number of strains (logical rows).
    #[inline]
    pub fn n_strains(&self) -> usize {
        self.data.cols()
    }

    /// Number of features (logical columns).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.rows()
    }

    /// Feature names.
    #[inline]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Strain identifiers.
    #[inline]
    pub fn strain_ids(&self) -> &[String] {
        &self.strain_ids
    }

    /// Domain tags, one per feature.
    #[inline]
    pub fn domains(&self) -> &[FeatureDomain] {
        &self.domains
    }

    /// Domain of a single feature.
    #[inline]
    pub fn domain(&self, feature: usize) -> FeatureDomain {
        self.domains[feature]
    }

    /// Column index of a feature by name.
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|f| f == name)
    }

    /// Get the underlying sparse matrix (features × strains).
    #[inline]
    pub fn data(&self) -> &CsMat<u8> {
        &self.data
    }

    /// Number of strains carrying a feature.
    pub fn present_count(&self, feature: usize) -> usize {
        self.data
            .outer_view(feature)
            .map(|v| v.nnz())
            .unwrap_or(0)
    }

    /// Sorted indices of the strains carrying a feature.
    pub fn present_strains(&self, feature: usize) -> Vec<usize> {
        self.data
            .outer_view(feature)
            .map(|v| v.indices().to_vec())
            .unwrap_or_default()
    }

    /// Dense 0/1 vector for one feature across all strains.
    pub fn column_dense(&self, feature: usize) -> Vec<u8> {
        let mut dense = vec![0u8; self.n_strains()];
        for strain in self.present_strains(feature) {
            dense[strain] = 1;
        }
        dense
    }

    /// Fraction of strains carrying a feature (NaN when there are no strains).
    pub fn prevalence(&self, feature: usize) -> f64 {
        let n = self.n_strains();
        if n == 0 {
            return f64::NAN;
        }
        self.present_count(feature) as f64 / n as f64
    }

    /// Subset the matrix to include only specified features (by index).
    pub fn subset_features(&self, indices: &[usize]) -> Result<Self> {
        let mut tri_mat = TriMat::new((indices.len(), self.n_strains()));
        let mut names = Vec::with_capacity(indices.len());
        let mut domains = Vec::with_capacity(indices.len());

        for (new_row, &old_row) in indices.iter().enumerate() {
            if old_row >= self.n_features() {
                return Err(AnalysisError::DimensionMismatch {
                    expected: self.n_features(),
                    actual: old_row + 1,
                });
            }
            names.push(self.feature_names[old_row].clone());
            domains.push(self.domains[old_row]);
            for strain in self.present_strains(old_row) {
                tri_mat.add_triplet(new_row, strain, 1u8);
            }
        }

        Self::new(
            tri_mat.to_csr(),
            names,
            self.strain_ids.clone(),
            FeatureDomain::Phenotype,
        )?
        .with_domains(domains)
    }
}

fn check_unique(ids: &[String], kind: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(AnalysisError::DuplicateId(format!("{} '{}'", kind, id)));
        }
    }
    Ok(())
}

fn parse_binary(cell: &str, row: usize, col: usize) -> Result<u8> {
    let trimmed = cell.trim();
    let invalid = || AnalysisError::InvalidValue {
        value: cell.to_string(),
        row,
        col,
    };
    let value: f64 = trimmed.parse().map_err(|_| invalid())?;
    if value == 0.0 {
        Ok(0)
    } else if value == 1.0 {
        Ok(1)
    } else {
        Err(invalid())
    }
}
