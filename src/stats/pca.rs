//! Principal Component Analysis
//! Standardizes predictors and decomposes their covariance with nalgebra.

use crate::data::NumericMatrix;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PcaError {
    #[error("PCA needs at least 2 rows, got {0}")]
    TooFewRows(usize),
    #[error("PCA needs at least one column")]
    NoColumns,
    #[error("Column '{0}' contains non-finite values")]
    NonFinite(String),
    #[error("Every column is constant, explained variance is undefined")]
    NoVariance,
}

/// Column-wise zero mean / unit variance scaling, fit on the data it transforms.
#[derive(Debug, Clone)]
pub struct Standardizer {
    pub means: DVector<f64>,
    pub scales: DVector<f64>,
}

impl Standardizer {
    /// Population (ddof = 0) statistics. Zero-variance columns keep scale 1.
    pub fn fit(x: &DMatrix<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let means = DVector::from_iterator(x.ncols(), x.column_iter().map(|c| c.sum() / n));
        let scales = DVector::from_iterator(
            x.ncols(),
            x.column_iter().zip(means.iter()).map(|(c, &m)| {
                let var = c.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
                let sd = var.sqrt();
                if sd < 10.0 * f64::EPSILON {
                    1.0
                } else {
                    sd
                }
            }),
        );
        Self { means, scales }
    }

    pub fn transform(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| {
            (x[(i, j)] - self.means[j]) / self.scales[j]
        })
    }
}

/// Fitted decomposition of the standardized predictors.
#[derive(Debug, Clone)]
pub struct PcaResult {
    pub features: Vec<String>,
    pub standardized: DMatrix<f64>,
    /// Feature x component, orthonormal columns ordered by captured variance.
    pub loadings: DMatrix<f64>,
    pub explained_variance: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
    /// Row x component projections.
    pub scores: DMatrix<f64>,
}

impl PcaResult {
    pub fn n_components(&self) -> usize {
        self.loadings.ncols()
    }

    /// Running total of the explained variance ratio, in percent.
    pub fn cumulative_variance_percent(&self) -> Vec<f64> {
        self.explained_variance_ratio
            .iter()
            .scan(0.0, |acc, r| {
                *acc += r * 100.0;
                Some(*acc)
            })
            .collect()
    }

    pub fn component_scores(&self, component: usize) -> Vec<f64> {
        self.scores.column(component).iter().copied().collect()
    }

    pub fn loading(&self, feature: usize, component: usize) -> f64 {
        self.loadings[(feature, component)]
    }

    /// Map scores back to standardized space using every kept component.
    pub fn reconstruct(&self) -> DMatrix<f64> {
        &self.scores * self.loadings.transpose()
    }
}

pub struct Pca;

impl Pca {
    pub fn fit(matrix: &NumericMatrix) -> Result<PcaResult, PcaError> {
        let x = &matrix.values;
        let (n, k) = x.shape();
        if k == 0 {
            return Err(PcaError::NoColumns);
        }
        if n < 2 {
            return Err(PcaError::TooFewRows(n));
        }
        for (j, column) in x.column_iter().enumerate() {
            if column.iter().any(|v| !v.is_finite()) {
                let name = matrix
                    .columns
                    .get(j)
                    .cloned()
                    .unwrap_or_else(|| j.to_string());
                return Err(PcaError::NonFinite(name));
            }
        }

        let standardized = Standardizer::fit(x).transform(x);
        let cov = standardized.transpose() * &standardized / (n as f64 - 1.0);
        let eigen = SymmetricEigen::new(cov);

        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(Ordering::Equal)
        });

        let explained_variance: Vec<f64> = order
            .iter()
            .map(|&idx| eigen.eigenvalues[idx].max(0.0))
            .collect();
        let total: f64 = explained_variance.iter().sum();
        if total <= 0.0 {
            return Err(PcaError::NoVariance);
        }
        let explained_variance_ratio = explained_variance.iter().map(|v| v / total).collect();

        let mut loadings = DMatrix::zeros(k, k);
        for (component, &idx) in order.iter().enumerate() {
            let mut direction = eigen.eigenvectors.column(idx).clone_owned();
            // Deterministic sign: largest-magnitude entry positive.
            let pivot = direction.iamax();
            if direction[pivot] < 0.0 {
                direction.neg_mut();
            }
            loadings.set_column(component, &direction);
        }

        let scores = &standardized * &loadings;

        Ok(PcaResult {
            features: matrix.columns.clone(),
            standardized,
            loadings,
            explained_variance,
            explained_variance_ratio,
            scores,
        })
    }
}
