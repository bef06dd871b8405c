//! CSV Data Loader Module
//! Fetches delimited tables, tags each row with its source label and stacks them using Polars.

use super::processor::is_numeric_dtype;
use crate::config::SourceSpec;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Error type returned by a [`DataSource`].
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Source '{label}' unavailable: {reason}")]
    SourceUnavailable { label: String, reason: String },
    #[error("Sources disagree on schema: {0}")]
    SchemaMismatch(String),
    #[error("No sources to load")]
    NoData,
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Anything that can hand back the raw bytes of a delimited table.
pub trait DataSource {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP retrieval.
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, LoaderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl DataSource for HttpSource {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(location).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

/// Loads and merges the labelled source tables.
pub struct DataLoader<'a> {
    source: &'a dyn DataSource,
    separator: u8,
    label_column: String,
}

impl<'a> DataLoader<'a> {
    pub fn new(source: &'a dyn DataSource, separator: u8, label_column: &str) -> Self {
        Self {
            source,
            separator,
            label_column: label_column.to_string(),
        }
    }

    /// Parse raw bytes as a headed, delimited table.
    pub fn parse_delimited(bytes: Vec<u8>, separator: u8) -> PolarsResult<DataFrame> {
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10000))
            .map_parse_options(|opts| opts.with_separator(separator))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
    }

    /// Fetch one source and append its literal label column.
    pub fn load(&self, spec: &SourceSpec) -> Result<DataFrame, LoaderError> {
        let unavailable = |reason: String| LoaderError::SourceUnavailable {
            label: spec.label.clone(),
            reason,
        };

        debug!("Fetching '{}' from {}", spec.label, spec.location);
        let bytes = self
            .source
            .fetch(&spec.location)
            .map_err(|e| unavailable(e.to_string()))?;

        let mut df = Self::parse_delimited(bytes, self.separator)
            .map_err(|e| unavailable(format!("parse error: {}", e)))?;

        let labels = vec![spec.label.as_str(); df.height()];
        df.with_column(Column::new(self.label_column.as_str().into(), labels))?;

        info!(
            "Loaded {} rows x {} columns from source '{}'",
            df.height(),
            df.width(),
            spec.label
        );
        Ok(df)
    }

    /// Load every source and stack them in order. No row is dropped or added.
    pub fn load_all(&self, specs: &[SourceSpec]) -> Result<DataFrame, LoaderError> {
        let frames = specs
            .iter()
            .map(|spec| self.load(spec))
            .collect::<Result<Vec<_>, _>>()?;
        stack_frames(frames)
    }
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Vertically concatenate frames sharing column names. Numeric columns whose
/// dtypes differ between frames are widened to Float64 first.
pub fn stack_frames(frames: Vec<DataFrame>) -> Result<DataFrame, LoaderError> {
    let mut frames = frames.into_iter();
    let Some(mut merged) = frames.next() else {
        return Err(LoaderError::NoData);
    };

    for mut next in frames {
        let expected = column_names(&merged);
        let found = column_names(&next);
        if expected != found {
            return Err(LoaderError::SchemaMismatch(format!(
                "expected columns [{}], found [{}]",
                expected.join(", "),
                found.join(", ")
            )));
        }

        for name in &expected {
            let left = merged.column(name)?.dtype().clone();
            let right = next.column(name)?.dtype().clone();
            if left == right {
                continue;
            }
            if !(is_numeric_dtype(&left) && is_numeric_dtype(&right)) {
                return Err(LoaderError::SchemaMismatch(format!(
                    "column '{}' is {} in one source and {} in another",
                    name, left, right
                )));
            }
            debug!("Widening column '{}' ({} / {}) to f64", name, left, right);
            let widened = merged.column(name)?.cast(&DataType::Float64)?;
            merged.with_column(widened)?;
            let widened = next.column(name)?.cast(&DataType::Float64)?;
            next.with_column(widened)?;
        }

        merged.vstack_mut(&next)?;
    }

    merged.as_single_chunk();
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapSource(HashMap<String, String>);

    impl DataSource for MapSource {
        fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
            self.0
                .get(location)
                .map(|s| s.as_bytes().to_vec())
                .ok_or_else(|| format!("no such resource: {}", location).into())
        }
    }

    fn source() -> MapSource {
        let mut map = HashMap::new();
        map.insert(
            "red.csv".to_string(),
            "\"alcohol\";\"quality\"\n9.4;5\n9.8;5\n10.0;6\n".to_string(),
        );
        map.insert(
            "white.csv".to_string(),
            "\"alcohol\";\"quality\"\n8;6\n12;7\n".to_string(),
        );
        map.insert("broken.csv".to_string(), "alcohol,quality\n9.4,5\n".to_string());
        MapSource(map)
    }

    #[test]
    fn test_parse_semicolon_table() {
        let df = DataLoader::parse_delimited(b"a;b\n1.5;2\n3.0;4\n".to_vec(), b';').unwrap();
        assert_eq!(df.shape(), (2, 2));
        assert_eq!(df.column("a").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("b").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_load_tags_rows_with_label() {
        let src = source();
        let loader = DataLoader::new(&src, b';', "type");
        let df = loader.load(&SourceSpec::new("red", "red.csv")).unwrap();

        assert_eq!(df.height(), 3);
        let labels: Vec<&str> = df
            .column("type")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(labels, vec!["red", "red", "red"]);
    }

    #[test]
    fn test_load_all_keeps_every_row_and_widens_dtypes() {
        let src = source();
        let loader = DataLoader::new(&src, b';', "type");
        let df = loader
            .load_all(&[
                SourceSpec::new("red", "red.csv"),
                SourceSpec::new("white", "white.csv"),
            ])
            .unwrap();

        assert_eq!(df.height(), 5);
        assert_eq!(df.column("alcohol").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("quality").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_missing_source_is_unavailable() {
        let src = source();
        let loader = DataLoader::new(&src, b';', "type");
        let err = loader
            .load_all(&[
                SourceSpec::new("red", "red.csv"),
                SourceSpec::new("white", "nowhere.csv"),
            ])
            .unwrap_err();

        match err {
            LoaderError::SourceUnavailable { label, .. } => assert_eq!(label, "white"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_disagreeing_headers_rejected() {
        let src = source();
        let loader = DataLoader::new(&src, b';', "type");
        let err = loader
            .load_all(&[
                SourceSpec::new("red", "red.csv"),
                SourceSpec::new("other", "broken.csv"),
            ])
            .unwrap_err();
        assert!(matches!(err, LoaderError::SchemaMismatch(_)));
    }
}
