//! Analysis pipeline
//! Load -> clean -> summarize, reduce, fit. Figures go to the sink, text to `out`.

use crate::analysis::{Fitter, Reducer, Reduction, Summarizer, Summary};
use crate::charts::{ChartSink, RenderReport};
use crate::config::AnalysisConfig;
use crate::data::{DataLoader, DataProcessor, DataSource};
use crate::stats::OlsFit;
use anyhow::Context;
use std::io::Write;
use tracing::{info, warn};

/// Everything one run produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub rows: usize,
    pub summary: Summary,
    pub reduction: Reduction,
    pub fit: OlsFit,
    pub report: RenderReport,
}

pub struct Pipeline {
    config: AnalysisConfig,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Columns that must be present and numeric after loading.
    fn required_numeric(&self) -> Vec<String> {
        let config = &self.config;
        let mut required = vec![config.target_column.clone(), config.scatter_column.clone()];
        for name in config
            .boxplot_attributes
            .iter()
            .chain(&config.regression_predictors)
        {
            if !required.contains(name) {
                required.push(name.clone());
            }
        }
        required
    }

    /// Run every stage once. Load, schema and model errors abort the run;
    /// figure failures are only collected in the returned report.
    pub fn run(
        &self,
        source: &dyn DataSource,
        sink: &dyn ChartSink,
        out: &mut dyn Write,
    ) -> anyhow::Result<PipelineOutcome> {
        let config = &self.config;
        config.validate().context("Invalid analysis configuration")?;

        info!("Loading {} source tables", config.sources.len());
        let loader = DataLoader::new(source, config.separator, &config.label_column);
        let df = loader
            .load_all(&config.sources)
            .context("Failed to load the wine quality tables")?;

        let df = DataProcessor::cast_target(df, &config.target_column)
            .context("Failed to clean the target column")?;
        DataProcessor::validate_schema(&df, &self.required_numeric(), &config.label_column)
            .context("Merged table has an unexpected schema")?;

        let rows = df.height();
        writeln!(out, "Total observations: {}", rows)?;

        let summarizer = Summarizer::new(config);
        let summary = summarizer
            .summarize(&df)
            .context("Descriptive summary failed")?;
        writeln!(out, "Counts by {}:", config.label_column)?;
        for (label, count) in summary.counts.category_totals() {
            writeln!(out, "  {:<10}{:>8}", label, count)?;
        }
        let mut report = summarizer.render(&summary, sink);

        let reducer = Reducer::new(config);
        let reduction = reducer.reduce(&df).context("PCA failed")?;
        report.merge(reducer.render(&reduction, sink));

        let fitter = Fitter::new(config);
        let fit = fitter.fit(&df).context("Regression failed")?;
        writeln!(out)?;
        write!(out, "{}", fit)?;
        report.merge(fitter.render(&fit, sink));

        if report.is_complete() {
            info!("Wrote {} figures", report.written.len());
        } else {
            warn!(
                "{} of {} figures failed",
                report.failed.len(),
                report.failed.len() + report.written.len()
            );
        }

        Ok(PipelineOutcome {
            rows,
            summary,
            reduction,
            fit,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_columns_are_deduplicated() {
        let pipeline = Pipeline::new(AnalysisConfig::default());
        let required = pipeline.required_numeric();
        assert_eq!(
            required,
            vec![
                "quality",
                "alcohol",
                "pH",
                "residual sugar",
                "citric acid",
                "sulphates"
            ]
        );
    }
}
