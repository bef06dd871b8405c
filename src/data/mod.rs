//! Data module - source loading and cleaning

mod loader;
mod processor;

pub use loader::{stack_frames, DataLoader, DataSource, FetchError, HttpSource, LoaderError};
pub use processor::{DataProcessor, NumericMatrix, ProcessorError};
