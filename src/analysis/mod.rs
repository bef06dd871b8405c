//! Analysis components
//! Each one derives its results from the cleaned frame, then hands figures to a sink.

mod fitter;
mod reducer;
mod summarizer;

pub use fitter::Fitter;
pub use reducer::{Reducer, Reduction};
pub use summarizer::{Summarizer, Summary};

use crate::data::ProcessorError;
use crate::stats::{PcaError, RegressionError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    #[error("PCA failed: {0}")]
    Pca(#[from] PcaError),
    #[error("Regression failed: {0}")]
    Regression(#[from] RegressionError),
}
