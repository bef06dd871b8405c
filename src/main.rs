//! Wine EDA - exploratory analysis of the UCI wine quality tables
//!
//! Downloads the red and white tables, prints a summary and writes figures to `figures/`.

use anyhow::{Context, Result};
use tracing::info;
use wine_eda::{AnalysisConfig, HttpSource, Pipeline, StaticChartRenderer};

/// Log to stderr so the console report on stdout stays readable.
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();

    let config = AnalysisConfig::default();
    let source = HttpSource::new(config.request_timeout).context("Failed to build HTTP client")?;
    let renderer = StaticChartRenderer::new(&config).context("Failed to prepare output directory")?;

    let pipeline = Pipeline::new(config);
    let stdout = std::io::stdout();
    let outcome = pipeline.run(&source, &renderer, &mut stdout.lock())?;

    info!(
        "Done: {} rows, {} figures in {}",
        outcome.rows,
        outcome.report.written.len(),
        renderer.output_dir().display()
    );
    Ok(())
}
