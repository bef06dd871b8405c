//! Descriptive Summarizer
//! Counts, strip series, grouped box statistics and the correlation matrix.

use super::AnalysisError;
use crate::charts::{AttributeBoxes, ChartSink, Figure, RenderReport, StripPoint, StripSeries};
use crate::config::AnalysisConfig;
use crate::data::DataProcessor;
use crate::stats::{CorrelationMatrix, QualityCounts, StatsCalculator};
use polars::prelude::DataFrame;
use tracing::{debug, info};

/// Everything the descriptive figures show.
#[derive(Debug, Clone)]
pub struct Summary {
    pub counts: QualityCounts,
    pub strip: StripSeries,
    pub boxes: Vec<AttributeBoxes>,
    pub correlation: CorrelationMatrix,
}

pub struct Summarizer {
    target: String,
    label: String,
    scatter_column: String,
    attributes: Vec<String>,
    excluded: Vec<String>,
}

impl Summarizer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            target: config.target_column.clone(),
            label: config.label_column.clone(),
            scatter_column: config.scatter_column.clone(),
            attributes: config.boxplot_attributes.clone(),
            excluded: vec![
                config.target_column.clone(),
                config.target_numeric_column.clone(),
            ],
        }
    }

    /// Read-only pass over the frame.
    pub fn summarize(&self, df: &DataFrame) -> Result<Summary, AnalysisError> {
        let levels = DataProcessor::column_i64(df, &self.target)?;
        let categories = DataProcessor::column_str(df, &self.label)?;
        let counts = StatsCalculator::group_counts(&levels, &categories);
        debug!(
            "{} target levels across {} categories",
            counts.levels.len(),
            counts.categories.len()
        );

        let strip = self.strip_series(df, &levels, &categories, &counts)?;
        let boxes = self.attribute_boxes(df, &counts.levels)?;

        let excluded: Vec<&str> = self.excluded.iter().map(String::as_str).collect();
        let predictors = DataProcessor::numeric_columns(df, &excluded);
        let matrix = DataProcessor::numeric_matrix(df, &predictors)?;
        let correlation = StatsCalculator::correlation_matrix(&matrix);
        info!("Correlation computed over {} columns", correlation.size());

        Ok(Summary {
            counts,
            strip,
            boxes,
            correlation,
        })
    }

    fn strip_series(
        &self,
        df: &DataFrame,
        levels: &[i64],
        categories: &[String],
        counts: &QualityCounts,
    ) -> Result<StripSeries, AnalysisError> {
        let values = DataProcessor::column_f64(df, &self.scatter_column)?;
        let points = levels
            .iter()
            .zip(categories)
            .zip(values)
            .map(|((&level, category), value)| StripPoint {
                level,
                value,
                category: category.clone(),
            })
            .collect();

        Ok(StripSeries {
            column: self.scatter_column.clone(),
            categories: counts.categories.clone(),
            points,
        })
    }

    fn attribute_boxes(
        &self,
        df: &DataFrame,
        levels: &[i64],
    ) -> Result<Vec<AttributeBoxes>, AnalysisError> {
        self.attributes
            .iter()
            .map(|attribute| {
                let groups = levels
                    .iter()
                    .map(|&level| {
                        let values =
                            DataProcessor::values_where_target(df, &self.target, level, attribute)?;
                        Ok((level, StatsCalculator::box_stats(&values)))
                    })
                    .collect::<Result<Vec<_>, AnalysisError>>()?;
                Ok(AttributeBoxes {
                    attribute: attribute.clone(),
                    groups,
                })
            })
            .collect()
    }

    pub fn render(&self, summary: &Summary, sink: &dyn ChartSink) -> RenderReport {
        let mut report = RenderReport::default();
        report.emit(sink, Figure::QualityCounts(&summary.counts));
        report.emit(sink, Figure::QualityScatter(&summary.strip));
        report.emit(sink, Figure::AttributeBoxplots(&summary.boxes));
        report.emit(sink, Figure::CorrelationHeatmap(&summary.correlation));
        report
    }
}
