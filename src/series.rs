// src/series.rs

use crate::error::{Result, SeriesError};
use polars::prelude::*;

/// Name of the time key column: epoch milliseconds, strictly ascending.
pub const TIME_COLUMN: &str = "time";

/// A missing cell is either null or NaN.
pub fn is_missing(value: Option<f64>) -> bool {
    value.map_or(true, f64::is_nan)
}

/// A multi-symbol table keyed by time.
///
/// Holds a `time` column (`Int64`, epoch millis, strictly ascending, no
/// nulls) followed by one `Float64` column per symbol. Integer and other
/// numeric symbol columns are cast to `Float64` on construction.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    df: DataFrame,
}

impl TimeSeries {
    pub fn new(df: DataFrame) -> Result<Self> {
        let time = df.column(TIME_COLUMN).map_err(|_| {
            SeriesError::validation(format!("time series has no '{}' column", TIME_COLUMN))
        })?;

        let time = match time.dtype() {
            DataType::Int64 => time.clone(),
            dtype if dtype.is_integer() => time.cast(&DataType::Int64)?,
            dtype => {
                return Err(SeriesError::validation(format!(
                    "'{}' column must hold integer timestamps, found {}",
                    TIME_COLUMN, dtype
                )))
            }
        };

        if time.null_count() > 0 {
            return Err(SeriesError::validation("time key contains nulls"));
        }

        let mut previous: Option<i64> = None;
        for ts in time.i64()?.into_no_null_iter() {
            if let Some(prev) = previous {
                if ts <= prev {
                    return Err(SeriesError::validation(format!(
                        "time key is not strictly ascending at {} (after {})",
                        ts, prev
                    )));
                }
            }
            previous = Some(ts);
        }

        let mut columns = vec![time];
        for column in df.get_columns() {
            if column.name() == TIME_COLUMN {
                continue;
            }
            let column = match column.dtype() {
                DataType::Float64 => column.clone(),
                dtype if dtype.is_numeric() => column.cast(&DataType::Float64)?,
                dtype => {
                    return Err(SeriesError::validation(format!(
                        "column '{}' is not numeric ({})",
                        column.name(),
                        dtype
                    )))
                }
            };
            columns.push(column);
        }

        if columns.len() < 2 {
            return Err(SeriesError::validation("time series has no symbol columns"));
        }

        Ok(TimeSeries {
            df: DataFrame::new(columns)?,
        })
    }

    /// Builds a series from a time key and `(symbol, values)` pairs.
    pub fn from_columns<S: AsRef<str>>(
        times: Vec<i64>,
        columns: Vec<(S, Vec<Option<f64>>)>,
    ) -> Result<Self> {
        let mut series = Vec::with_capacity(columns.len() + 1);
        series.push(Series::new(TIME_COLUMN, times));
        for (symbol, values) in columns {
            series.push(Series::new(symbol.as_ref(), values));
        }
        Self::new(DataFrame::new(series)?)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_frame(self) -> DataFrame {
        self.df
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.df
            .get_column_names()
            .into_iter()
            .filter(|name| *name != TIME_COLUMN)
            .collect()
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// `(rows, symbol columns)`; the time key is not counted.
    pub fn shape(&self) -> (usize, usize) {
        (self.df.height(), self.df.width() - 1)
    }

    pub fn times(&self) -> Result<&Int64Chunked> {
        Ok(self.df.column(TIME_COLUMN)?.i64()?)
    }

    pub fn time_at(&self, row: usize) -> Option<i64> {
        self.times().ok().and_then(|times| times.get(row))
    }

    pub fn values(&self, symbol: &str) -> Result<&Float64Chunked> {
        Ok(self.df.column(symbol)?.f64()?)
    }

    /// Per row: does any symbol have a value, do all symbols have one.
    pub(crate) fn row_presence(&self) -> Result<(Vec<bool>, Vec<bool>)> {
        let height = self.height();
        let mut any = vec![false; height];
        let mut all = vec![true; height];

        for symbol in self.symbols() {
            for (row, value) in self.values(symbol)?.into_iter().enumerate() {
                if is_missing(value) {
                    all[row] = false;
                } else {
                    any[row] = true;
                }
            }
        }

        Ok((any, all))
    }

    /// First timestamp at which any symbol has a value.
    pub fn first_valid_index(&self) -> Result<Option<i64>> {
        let (any, _) = self.row_presence()?;
        Ok(any.iter().position(|present| *present).and_then(|row| self.time_at(row)))
    }

    /// Last timestamp at which any symbol has a value.
    pub fn last_valid_index(&self) -> Result<Option<i64>> {
        let (any, _) = self.row_presence()?;
        Ok(any.iter().rposition(|present| *present).and_then(|row| self.time_at(row)))
    }

    pub(crate) fn drop_symbol(&self, symbol: &str) -> Result<Self> {
        Ok(TimeSeries {
            df: self.df.drop(symbol)?,
        })
    }

    pub(crate) fn slice_from(&self, row: usize) -> Self {
        let length = self.height().saturating_sub(row);
        TimeSeries {
            df: self.df.slice(row as i64, length),
        }
    }

    pub(crate) fn filter_rows(&self, keep: &[bool]) -> Result<Self> {
        let mask = keep.iter().copied().collect::<BooleanChunked>();
        Ok(TimeSeries {
            df: self.df.filter(&mask)?,
        })
    }
}

impl PartialEq for TimeSeries {
    fn eq(&self, other: &Self) -> bool {
        self.df.equals_missing(&other.df)
    }
}
