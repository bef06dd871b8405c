//! Statistics module - descriptive statistics, PCA and least squares

mod calculator;
mod pca;
mod regression;

pub use calculator::{BoxStats, CorrelationMatrix, QualityCounts, StatsCalculator};
pub use pca::{Pca, PcaError, PcaResult, Standardizer};
pub use regression::{
    DesignMatrix, FitWarning, OlsFit, OlsFitter, RegressionError, CONSTANT_COLUMN,
};
