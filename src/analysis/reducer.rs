//! Dimensionality Reducer
//! Runs PCA over every numeric predictor.

use super::AnalysisError;
use crate::charts::{ChartSink, Figure, RenderReport};
use crate::config::AnalysisConfig;
use crate::data::DataProcessor;
use crate::stats::{Pca, PcaResult};
use polars::prelude::DataFrame;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Reduction {
    pub pca: PcaResult,
    /// Target value of each row, used to color the biplot.
    pub levels: Vec<i64>,
}

pub struct Reducer {
    target: String,
    excluded: Vec<String>,
}

impl Reducer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            target: config.target_column.clone(),
            excluded: vec![
                config.target_column.clone(),
                config.target_numeric_column.clone(),
            ],
        }
    }

    pub fn reduce(&self, df: &DataFrame) -> Result<Reduction, AnalysisError> {
        let excluded: Vec<&str> = self.excluded.iter().map(String::as_str).collect();
        let features = DataProcessor::numeric_columns(df, &excluded);
        let matrix = DataProcessor::numeric_matrix(df, &features)?;
        let pca = Pca::fit(&matrix)?;
        let levels = DataProcessor::column_i64(df, &self.target)?;

        if let (Some(first), Some(second)) = (
            pca.explained_variance_ratio.first(),
            pca.explained_variance_ratio.get(1),
        ) {
            info!(
                "PCA over {} features: PC1 {:.1}%, PC2 {:.1}%",
                pca.features.len(),
                first * 100.0,
                second * 100.0
            );
        }

        Ok(Reduction { pca, levels })
    }

    pub fn render(&self, reduction: &Reduction, sink: &dyn ChartSink) -> RenderReport {
        let mut report = RenderReport::default();
        report.emit(sink, Figure::PcaScree(&reduction.pca));
        report.emit(
            sink,
            Figure::PcaBiplot {
                pca: &reduction.pca,
                levels: &reduction.levels,
            },
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{wine_frame, RecordingSink};
    use crate::stats::PcaError;
    use polars::prelude::*;

    #[test]
    fn test_reduce_uses_numeric_predictors() {
        let reduction = Reducer::new(&AnalysisConfig::default())
            .reduce(&wine_frame())
            .unwrap();
        assert_eq!(reduction.pca.n_components(), 5);
        assert_eq!(reduction.pca.features[0], "alcohol");
        assert_eq!(reduction.levels, vec![5, 6, 5, 7, 6, 5, 7, 6]);
        assert_eq!(reduction.pca.scores.nrows(), 8);

        let sum: f64 = reduction.pca.explained_variance_ratio.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_numeric_target_copy_is_not_a_feature() {
        let df = DataProcessor::with_numeric_target(wine_frame(), "quality", "quality_num").unwrap();
        let reduction = Reducer::new(&AnalysisConfig::default()).reduce(&df).unwrap();
        assert!(!reduction.pca.features.iter().any(|f| f.starts_with("quality")));
    }

    #[test]
    fn test_no_predictors_fails() {
        let df = df!(
            "quality" => [5i64, 6, 7],
            "type" => ["red", "red", "white"]
        )
        .unwrap();
        let err = Reducer::new(&AnalysisConfig::default()).reduce(&df).unwrap_err();
        assert!(matches!(err, AnalysisError::Pca(PcaError::NoColumns)));
    }

    #[test]
    fn test_render_scree_then_biplot() {
        let reducer = Reducer::new(&AnalysisConfig::default());
        let reduction = reducer.reduce(&wine_frame()).unwrap();
        let sink = RecordingSink::default();
        let report = reducer.render(&reduction, &sink);

        assert_eq!(report.written.len(), 2);
        assert_eq!(
            *sink.rendered.borrow(),
            vec!["pca_scree.png", "pca_biplot.png"]
        );
    }
}
