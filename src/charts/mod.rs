//! Charts module - figure descriptions and static rendering

mod plotter;
mod renderer;

pub use plotter::{
    category_color, coolwarm, jitter_offsets, padded_range, viridis, AttributeBoxes, StripPoint,
    StripSeries, PALETTE,
};
pub use renderer::StaticChartRenderer;

use crate::stats::{CorrelationMatrix, OlsFit, PcaResult, QualityCounts};
use plotters::drawing::DrawingAreaErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Cannot prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Drawing failed: {0}")]
    Drawing(String),
    #[error("Nothing to draw: {0}")]
    EmptyData(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for RenderError {
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        RenderError::Drawing(err.to_string())
    }
}

/// Every figure the analysis produces, borrowing the data it shows.
#[derive(Debug, Clone, Copy)]
pub enum Figure<'a> {
    QualityCounts(&'a QualityCounts),
    QualityScatter(&'a StripSeries),
    AttributeBoxplots(&'a [AttributeBoxes]),
    CorrelationHeatmap(&'a CorrelationMatrix),
    PcaScree(&'a PcaResult),
    PcaBiplot {
        pca: &'a PcaResult,
        levels: &'a [i64],
    },
    ResidualsVsFitted(&'a OlsFit),
    FittedVsActual(&'a OlsFit),
}

impl Figure<'_> {
    pub fn file_name(&self) -> &'static str {
        match self {
            Figure::QualityCounts(_) => "wine_quality_counts.png",
            Figure::QualityScatter(_) => "alcohol_vs_quality.png",
            Figure::AttributeBoxplots(_) => "attributes_by_quality.png",
            Figure::CorrelationHeatmap(_) => "correlation_heatmap.png",
            Figure::PcaScree(_) => "pca_scree.png",
            Figure::PcaBiplot { .. } => "pca_biplot.png",
            Figure::ResidualsVsFitted(_) => "residuals_vs_fitted.png",
            Figure::FittedVsActual(_) => "fitted_vs_actual.png",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Figure::QualityCounts(_) => "Wine Quality Counts by Type",
            Figure::QualityScatter(_) => "Alcohol Content vs. Quality",
            Figure::AttributeBoxplots(_) => "Chemical Attributes by Wine Quality",
            Figure::CorrelationHeatmap(_) => "Correlation Matrix of Wine Attributes",
            Figure::PcaScree(_) => "PCA Scree Plot",
            Figure::PcaBiplot { .. } => "PCA Biplot",
            Figure::ResidualsVsFitted(_) => "Residuals vs Fitted",
            Figure::FittedVsActual(_) => "Fitted vs Actual Quality",
        }
    }
}

/// Side-effecting sink that turns a figure into an artifact.
pub trait ChartSink {
    fn render(&self, figure: &Figure<'_>) -> Result<PathBuf, RenderError>;
}

/// Outcome of rendering a batch of independent figures.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub written: Vec<PathBuf>,
    /// (file name, error message)
    pub failed: Vec<(String, String)>,
}

impl RenderReport {
    /// Render one figure; a failure is logged and recorded, never propagated.
    pub fn emit(&mut self, sink: &dyn ChartSink, figure: Figure<'_>) {
        match sink.render(&figure) {
            Ok(path) => {
                info!("Saved {}", path.display());
                self.written.push(path);
            }
            Err(e) => {
                warn!("Could not render {}: {}", figure.file_name(), e);
                self.failed
                    .push((figure.file_name().to_string(), e.to_string()));
            }
        }
    }

    pub fn merge(&mut self, other: RenderReport) {
        self.written.extend(other.written);
        self.failed.extend(other.failed);
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatsCalculator;
    use std::cell::RefCell;

    struct FlakySink {
        fail_on: &'static str,
        seen: RefCell<Vec<String>>,
    }

    impl ChartSink for FlakySink {
        fn render(&self, figure: &Figure<'_>) -> Result<PathBuf, RenderError> {
            self.seen.borrow_mut().push(figure.file_name().to_string());
            if figure.file_name() == self.fail_on {
                return Err(RenderError::Drawing("disk full".into()));
            }
            Ok(PathBuf::from(figure.file_name()))
        }
    }

    #[test]
    fn test_failure_does_not_stop_siblings() {
        let counts = StatsCalculator::group_counts(&[5, 6], &["a".into(), "b".into()]);
        let boxes: Vec<AttributeBoxes> = Vec::new();
        let sink = FlakySink {
            fail_on: "wine_quality_counts.png",
            seen: RefCell::new(Vec::new()),
        };

        let mut report = RenderReport::default();
        report.emit(&sink, Figure::QualityCounts(&counts));
        report.emit(&sink, Figure::AttributeBoxplots(&boxes));

        assert_eq!(sink.seen.borrow().len(), 2);
        assert_eq!(report.written, vec![PathBuf::from("attributes_by_quality.png")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "wine_quality_counts.png");
        assert!(!report.is_complete());
    }
}
