//! Wine EDA
//!
//! Exploratory analysis of the UCI wine quality tables: merge the red and
//! white sources, summarize them, run PCA over the chemical measurements,
//! fit a linear model for quality and save every figure as a PNG.

pub mod analysis;
pub mod charts;
pub mod config;
pub mod data;
pub mod pipeline;
pub mod stats;

pub use charts::{ChartSink, Figure, RenderError, RenderReport, StaticChartRenderer};
pub use config::{AnalysisConfig, ConfigError, SourceSpec};
pub use data::{DataSource, FetchError, HttpSource};
pub use pipeline::{Pipeline, PipelineOutcome};
