//! Data Processor Module
//! Cleans the merged frame and extracts typed columns and matrices from it.

use nalgebra::DMatrix;
use polars::prelude::*;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Numeric columns pulled out of a frame as an `n x k` matrix.
#[derive(Debug, Clone)]
pub struct NumericMatrix {
    pub columns: Vec<String>,
    pub values: DMatrix<f64>,
}

impl NumericMatrix {
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }
}

/// Handles data cleaning and column extraction.
pub struct DataProcessor;

impl DataProcessor {
    fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, ProcessorError> {
        df.column(name).map_err(|_| {
            ProcessorError::SchemaMismatch(format!("column '{}' not found", name))
        })
    }

    fn require_numeric<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, ProcessorError> {
        let column = Self::require_column(df, name)?;
        if !is_numeric_dtype(column.dtype()) {
            return Err(ProcessorError::SchemaMismatch(format!(
                "column '{}' is {}, expected a numeric type",
                name,
                column.dtype()
            )));
        }
        Ok(column)
    }

    /// Cast the target column to Int64, truncating fractional values.
    /// Casting an already integer target is a no-op.
    pub fn cast_target(mut df: DataFrame, target: &str) -> Result<DataFrame, ProcessorError> {
        let column = Self::require_numeric(&df, target)?;
        if column.dtype() == &DataType::Int64 {
            return Ok(df);
        }

        let nulls_before = column.null_count();
        let cast = column.cast(&DataType::Int64)?;
        if cast.null_count() > nulls_before {
            return Err(ProcessorError::SchemaMismatch(format!(
                "{} values of '{}' cannot be represented as integers",
                cast.null_count() - nulls_before,
                target
            )));
        }

        debug!("Cast '{}' from {} to i64", target, column.dtype());
        df.with_column(cast)?;
        Ok(df)
    }

    /// Check that every measurement is present and numeric and the label is a string.
    pub fn validate_schema(
        df: &DataFrame,
        numeric: &[String],
        label: &str,
    ) -> Result<(), ProcessorError> {
        for name in numeric {
            Self::require_numeric(df, name)?;
        }
        let label_col = Self::require_column(df, label)?;
        if label_col.dtype() != &DataType::String {
            return Err(ProcessorError::SchemaMismatch(format!(
                "label column '{}' is {}, expected str",
                label,
                label_col.dtype()
            )));
        }
        Ok(())
    }

    /// Append a Float64 copy of the target under a new name.
    pub fn with_numeric_target(
        mut df: DataFrame,
        target: &str,
        name: &str,
    ) -> Result<DataFrame, ProcessorError> {
        let mut copy = Self::require_numeric(&df, target)?.cast(&DataType::Float64)?;
        copy.rename(name.into());
        df.with_column(copy)?;
        Ok(df)
    }

    /// Numeric column names in frame order, minus `exclude`.
    pub fn numeric_columns(df: &DataFrame, exclude: &[&str]) -> Vec<String> {
        df.get_columns()
            .iter()
            .filter(|col| is_numeric_dtype(col.dtype()))
            .map(|col| col.name().to_string())
            .filter(|name| !exclude.contains(&name.as_str()))
            .collect()
    }

    /// Column values as f64; nulls become NaN.
    pub fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>, ProcessorError> {
        let values = Self::require_numeric(df, name)?.cast(&DataType::Float64)?;
        Ok(values
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect())
    }

    pub fn column_i64(df: &DataFrame, name: &str) -> Result<Vec<i64>, ProcessorError> {
        let values = Self::require_numeric(df, name)?.cast(&DataType::Int64)?;
        let ca = values.i64()?;
        if ca.null_count() > 0 {
            return Err(ProcessorError::SchemaMismatch(format!(
                "column '{}' contains missing values",
                name
            )));
        }
        Ok(ca.into_iter().flatten().collect())
    }

    pub fn column_str(df: &DataFrame, name: &str) -> Result<Vec<String>, ProcessorError> {
        let values = Self::require_column(df, name)?.cast(&DataType::String)?;
        Ok(values
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect())
    }

    /// Sorted distinct labels.
    pub fn categories(df: &DataFrame, label: &str) -> Result<Vec<String>, ProcessorError> {
        let unique: BTreeSet<String> = Self::column_str(df, label)?.into_iter().collect();
        Ok(unique.into_iter().collect())
    }

    /// Sorted distinct target values.
    pub fn target_levels(df: &DataFrame, target: &str) -> Result<Vec<i64>, ProcessorError> {
        let unique: BTreeSet<i64> = Self::column_i64(df, target)?.into_iter().collect();
        Ok(unique.into_iter().collect())
    }

    /// Values of `column` on rows whose target equals `level`.
    pub fn values_where_target(
        df: &DataFrame,
        target: &str,
        level: i64,
        column: &str,
    ) -> Result<Vec<f64>, ProcessorError> {
        Self::require_numeric(df, column)?;
        let filtered = df
            .clone()
            .lazy()
            .filter(col(target).eq(lit(level)))
            .select([col(column).cast(DataType::Float64)])
            .collect()?;
        Ok(filtered
            .column(column)?
            .f64()?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Gather the named numeric columns into a matrix.
    pub fn numeric_matrix(
        df: &DataFrame,
        columns: &[String],
    ) -> Result<NumericMatrix, ProcessorError> {
        let data = columns
            .iter()
            .map(|name| Self::column_f64(df, name))
            .collect::<Result<Vec<_>, _>>()?;
        let values = DMatrix::from_fn(df.height(), columns.len(), |i, j| data[j][i]);
        Ok(NumericMatrix {
            columns: columns.to_vec(),
            values,
        })
    }
}
