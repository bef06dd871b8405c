//! Regression Fitter
//! Regresses the numeric target on type indicators and chemical predictors.

use super::AnalysisError;
use crate::charts::{ChartSink, Figure, RenderReport};
use crate::config::AnalysisConfig;
use crate::data::{DataProcessor, ProcessorError};
use crate::stats::{DesignMatrix, OlsFit, OlsFitter};
use polars::prelude::DataFrame;
use tracing::{info, warn};

pub struct Fitter {
    target: String,
    response: String,
    label: String,
    predictors: Vec<String>,
}

impl Fitter {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            target: config.target_column.clone(),
            response: config.target_numeric_column.clone(),
            label: config.label_column.clone(),
            predictors: config.regression_predictors.clone(),
        }
    }

    /// Fit `response ~ dummies(label) + predictors`. The Float64 response
    /// column is (re)derived from the target first.
    pub fn fit(&self, df: &DataFrame) -> Result<OlsFit, AnalysisError> {
        let df = DataProcessor::with_numeric_target(df.clone(), &self.target, &self.response)?;
        let y = DataProcessor::column_f64(&df, &self.response)?;
        let categories = DataProcessor::column_str(&df, &self.label)?;
        let numeric = self
            .predictors
            .iter()
            .map(|name| Ok((name.clone(), DataProcessor::column_f64(&df, name)?)))
            .collect::<Result<Vec<_>, ProcessorError>>()?;

        let design = DesignMatrix::build(&categories, &numeric)?;
        let fit = OlsFitter::fit(&design, &y, &self.response)?;

        info!(
            "OLS on {} rows: rank {} of {}, R-squared {:.3}",
            fit.nobs,
            fit.rank,
            fit.columns.len(),
            fit.r_squared
        );
        for warning in &fit.warnings {
            warn!("{}", warning);
        }
        Ok(fit)
    }

    pub fn render(&self, fit: &OlsFit, sink: &dyn ChartSink) -> RenderReport {
        let mut report = RenderReport::default();
        report.emit(sink, Figure::ResidualsVsFitted(fit));
        report.emit(sink, Figure::FittedVsActual(fit));
        report
    }
}
