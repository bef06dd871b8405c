//! Analysis Configuration
//! Every tunable of a run lives here and is handed to each component explicitly.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const RED_WINE_URL: &str =
    "https://archive.ics.uci.edu/ml/machine-learning-databases/wine-quality/winequality-red.csv";
pub const WHITE_WINE_URL: &str =
    "https://archive.ics.uci.edu/ml/machine-learning-databases/wine-quality/winequality-white.csv";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("At least one data source is required")]
    NoSources,
    #[error("Source labels must be unique, '{0}' appears twice")]
    DuplicateLabel(String),
    #[error("Point alpha must be in (0, 1], got {0}")]
    InvalidAlpha(f64),
    #[error("Biplot arrow scale must be positive, got {0}")]
    InvalidArrowScale(f64),
    #[error("Jitter width must be in [0, 0.5), got {0}")]
    InvalidJitter(f64),
    #[error("Regression needs at least one numeric predictor")]
    NoPredictors,
}

/// One delimited table and the label tagged onto each of its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    pub label: String,
    pub location: String,
}

impl SourceSpec {
    pub fn new(label: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            location: location.into(),
        }
    }
}

/// Configuration for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub sources: Vec<SourceSpec>,
    pub output_dir: PathBuf,
    pub separator: u8,
    pub target_column: String,
    /// Float copy of the target used as the regression response.
    pub target_numeric_column: String,
    pub label_column: String,
    pub scatter_column: String,
    pub boxplot_attributes: Vec<String>,
    pub regression_predictors: Vec<String>,
    pub point_alpha: f64,
    pub jitter_width: f64,
    pub jitter_seed: u64,
    pub arrow_scale: f64,
    pub request_timeout: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                SourceSpec::new("red", RED_WINE_URL),
                SourceSpec::new("white", WHITE_WINE_URL),
            ],
            output_dir: PathBuf::from("figures"),
            separator: b';',
            target_column: "quality".to_string(),
            target_numeric_column: "quality_num".to_string(),
            label_column: "type".to_string(),
            scatter_column: "alcohol".to_string(),
            boxplot_attributes: ["pH", "residual sugar", "citric acid", "sulphates"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            regression_predictors: ["alcohol", "sulphates", "pH"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            point_alpha: 0.5,
            jitter_width: 0.25,
            jitter_seed: 42,
            arrow_scale: 5.0,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl AnalysisConfig {
    pub fn with_sources(mut self, sources: Vec<SourceSpec>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_boxplot_attributes(mut self, attributes: Vec<String>) -> Self {
        self.boxplot_attributes = attributes;
        self
    }

    pub fn with_regression_predictors(mut self, predictors: Vec<String>) -> Self {
        self.regression_predictors = predictors;
        self
    }

    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = seed;
        self
    }

    /// Check value ranges before any work starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        for (i, source) in self.sources.iter().enumerate() {
            if self.sources[..i].iter().any(|s| s.label == source.label) {
                return Err(ConfigError::DuplicateLabel(source.label.clone()));
            }
        }
        if !(self.point_alpha > 0.0 && self.point_alpha <= 1.0) {
            return Err(ConfigError::InvalidAlpha(self.point_alpha));
        }
        if !(self.arrow_scale > 0.0) {
            return Err(ConfigError::InvalidArrowScale(self.arrow_scale));
        }
        if !(0.0..0.5).contains(&self.jitter_width) {
            return Err(ConfigError::InvalidJitter(self.jitter_width));
        }
        if self.regression_predictors.is_empty() {
            return Err(ConfigError::NoPredictors);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.output_dir, PathBuf::from("figures"));
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let config = AnalysisConfig::default().with_sources(vec![
            SourceSpec::new("red", "a.csv"),
            SourceSpec::new("red", "b.csv"),
        ]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateLabel("red".to_string()))
        );
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let mut config = AnalysisConfig::default();
        config.point_alpha = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidAlpha(0.0)));

        let mut config = AnalysisConfig::default();
        config.arrow_scale = -1.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidArrowScale(-1.0)));

        let config = AnalysisConfig::default().with_sources(Vec::new());
        assert_eq!(config.validate(), Err(ConfigError::NoSources));
    }
}
