// src/consistency.rs

use crate::config::CheckerConfig;
use crate::error::{Result, SeriesError};
use crate::series::{is_missing, TimeSeries};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use std::fmt;
use tracing::{debug, info, warn};

/// Length of the longest run of consecutive missing values.
pub fn max_consecutive_missing<I>(values: I) -> usize
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut longest = 0;
    let mut current = 0;
    for value in values {
        if is_missing(value) {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Number of values exactly equal to zero.
pub fn zero_count<I>(values: I) -> usize
where
    I: IntoIterator<Item = Option<f64>>,
{
    values.into_iter().filter(|value| *value == Some(0.0)).count()
}

fn missing_count<I>(values: I) -> usize
where
    I: IntoIterator<Item = Option<f64>>,
{
    values.into_iter().filter(|value| is_missing(*value)).count()
}

/// Diagnostics collected for one symbol column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolDiagnostics {
    pub symbol: String,
    pub consecutive_missing: usize,
    pub total_zeros: usize,
    /// Longest missing run after trimming; `None` without auto-clean or for
    /// dropped symbols.
    pub clean_consecutive_missing: Option<usize>,
    /// Missing cells left after incomplete rows were dropped.
    pub final_missing: Option<usize>,
}

/// Per-symbol diagnostics, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    rows: Vec<SymbolDiagnostics>,
}

impl ConsistencyReport {
    pub fn get(&self, symbol: &str) -> Option<&SymbolDiagnostics> {
        self.rows.iter().find(|row| row.symbol == symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolDiagnostics> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn get_mut(&mut self, symbol: &str) -> Option<&mut SymbolDiagnostics> {
        self.rows.iter_mut().find(|row| row.symbol == symbol)
    }

    /// Display table: one row per symbol, one column per diagnostic.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let symbols: Vec<&str> = self.rows.iter().map(|row| row.symbol.as_str()).collect();
        let consecutive: Vec<u64> = self.rows.iter().map(|row| row.consecutive_missing as u64).collect();
        let zeros: Vec<u64> = self.rows.iter().map(|row| row.total_zeros as u64).collect();
        let clean: Vec<Option<u64>> = self
            .rows
            .iter()
            .map(|row| row.clean_consecutive_missing.map(|n| n as u64))
            .collect();
        let remaining: Vec<Option<u64>> = self
            .rows
            .iter()
            .map(|row| row.final_missing.map(|n| n as u64))
            .collect();

        Ok(DataFrame::new(vec![
            Series::new("symbol", symbols),
            Series::new("Consecutive NaN", consecutive),
            Series::new("Total Zeros", zeros),
            Series::new("AutoClean: Consecutive NaN", clean),
            Series::new("AutoClean: Final NaN", remaining),
        ])?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimStage {
    Raw,
    PostTrim,
}

impl TrimStage {
    pub fn label(&self) -> &'static str {
        match self {
            TrimStage::Raw => "raw",
            TrimStage::PostTrim => "post-trim",
        }
    }
}

/// Bounds and shape of a series at one stage of the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimEntry {
    pub first_valid: Option<i64>,
    pub last_valid: Option<i64>,
    /// `(rows, symbol columns)`
    pub shape: (usize, usize),
}

impl TrimEntry {
    fn capture(series: &TimeSeries) -> Result<Self> {
        Ok(TrimEntry {
            first_valid: series.first_valid_index()?,
            last_valid: series.last_valid_index()?,
            shape: series.shape(),
        })
    }

    pub fn first_valid_datetime(&self) -> Option<DateTime<Utc>> {
        self.first_valid.and_then(DateTime::from_timestamp_millis)
    }

    pub fn last_valid_datetime(&self) -> Option<DateTime<Utc>> {
        self.last_valid.and_then(DateTime::from_timestamp_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimLog {
    raw: TrimEntry,
    post_trim: Option<TrimEntry>,
    dropped_symbols: Vec<String>,
}

impl TrimLog {
    pub fn get(&self, stage: TrimStage) -> Option<&TrimEntry> {
        match stage {
            TrimStage::Raw => Some(&self.raw),
            TrimStage::PostTrim => self.post_trim.as_ref(),
        }
    }

    pub fn raw(&self) -> &TrimEntry {
        &self.raw
    }

    pub fn post_trim(&self) -> Option<&TrimEntry> {
        self.post_trim.as_ref()
    }

    /// Excluded symbols removed before trimming.
    pub fn dropped_symbols(&self) -> &[String] {
        &self.dropped_symbols
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut stages = vec![(TrimStage::Raw, self.raw)];
        if let Some(entry) = self.post_trim {
            stages.push((TrimStage::PostTrim, entry));
        }

        let render = |dt: Option<DateTime<Utc>>| dt.map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string());
        let dropped = (!self.dropped_symbols.is_empty()).then(|| self.dropped_symbols.join(","));

        Ok(DataFrame::new(vec![
            Series::new("stage", stages.iter().map(|(stage, _)| stage.label()).collect::<Vec<_>>()),
            Series::new(
                "First Index",
                stages.iter().map(|(_, e)| render(e.first_valid_datetime())).collect::<Vec<_>>(),
            ),
            Series::new(
                "Last Index",
                stages.iter().map(|(_, e)| render(e.last_valid_datetime())).collect::<Vec<_>>(),
            ),
            Series::new("Rows", stages.iter().map(|(_, e)| e.shape.0 as u64).collect::<Vec<_>>()),
            Series::new("Columns", stages.iter().map(|(_, e)| e.shape.1 as u64).collect::<Vec<_>>()),
            Series::new(
                "Inconsistent Symbol Dropped",
                stages
                    .iter()
                    .map(|(stage, _)| match stage {
                        TrimStage::PostTrim => dropped.clone(),
                        TrimStage::Raw => None,
                    })
                    .collect::<Vec<_>>(),
            ),
        ])?)
    }
}

/// A data-quality finding. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyWarning {
    /// Some column has more zero values than allowed.
    ExcessZeros { max_zeros: usize, limit: usize, symbols: Vec<String> },
    /// A raw column has a missing run longer than allowed.
    RawMissingRun { max_run: usize, limit: usize, symbols: Vec<String> },
    /// After trimming, a column still has a missing run longer than allowed.
    CleanMissingRun { max_run: usize, limit: usize, symbols: Vec<String> },
    /// No row has every retained symbol present; the cleaned series is empty.
    NoCompleteRows,
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyWarning::ExcessZeros { max_zeros, limit, symbols } => write!(
                f,
                "maximum number of zero values is {} (greater than {}) in {}",
                max_zeros,
                limit,
                symbols.join(", ")
            ),
            ConsistencyWarning::RawMissingRun { max_run, limit, symbols } => write!(
                f,
                "maximum number of consecutive NaN is {} (greater than {}) in {}",
                max_run,
                limit,
                symbols.join(", ")
            ),
            ConsistencyWarning::CleanMissingRun { max_run, limit, symbols } => write!(
                f,
                "after auto-clean, maximum number of consecutive NaN is {} (greater than {}) in {}",
                max_run,
                limit,
                symbols.join(", ")
            ),
            ConsistencyWarning::NoCompleteRows => {
                write!(f, "after auto-clean, no row has values for every symbol")
            }
        }
    }
}

/// Result of a check: the (possibly cleaned) series and its audit trail.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub series: TimeSeries,
    pub report: ConsistencyReport,
    pub trim_log: TrimLog,
    pub warnings: Vec<ConsistencyWarning>,
}

impl CheckOutcome {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// All warnings as one line; empty when nothing fired.
    pub fn error_message(&self) -> String {
        self.warnings
            .iter()
            .map(|warning| format!("Error: {}", warning))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn zero_count_flagged(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ConsistencyWarning::ExcessZeros { .. }))
    }

    pub fn raw_missing_run_flagged(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ConsistencyWarning::RawMissingRun { .. }))
    }

    pub fn clean_missing_run_flagged(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ConsistencyWarning::CleanMissingRun { .. }))
    }
}

/// Returns the maximum and the offending symbols when the maximum is above `limit`.
fn exceeding<F>(report: &ConsistencyReport, limit: usize, measure: F) -> Option<(usize, Vec<String>)>
where
    F: Fn(&SymbolDiagnostics) -> Option<usize>,
{
    let max = report.iter().filter_map(&measure).max()?;
    if max <= limit {
        return None;
    }
    let symbols = report
        .iter()
        .filter(|row| measure(row).map_or(false, |value| value > limit))
        .map(|row| row.symbol.clone())
        .collect();
    Some((max, symbols))
}

/// Validates freshly fetched series before they are cached.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyChecker {
    config: CheckerConfig,
}

impl ConsistencyChecker {
    pub fn new(config: CheckerConfig) -> Self {
        ConsistencyChecker { config }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Reports missing runs and zero values and, with `auto_clean`, drops
    /// excluded symbols, trims the leading incomplete region and keeps only
    /// complete rows.
    ///
    /// Fails only on an empty series or one whose symbols are all excluded.
    pub fn check(&self, series: &TimeSeries, auto_clean: bool) -> Result<CheckOutcome> {
        if series.is_empty() {
            return Err(SeriesError::validation("time series has no rows"));
        }

        let raw = TrimEntry::capture(series)?;
        let mut report = ConsistencyReport::default();
        for symbol in series.symbols() {
            let values = series.values(symbol)?;
            report.rows.push(SymbolDiagnostics {
                symbol: symbol.to_string(),
                consecutive_missing: max_consecutive_missing(values),
                total_zeros: zero_count(values),
                clean_consecutive_missing: None,
                final_missing: None,
            });
        }

        let mut warnings = Vec::new();
        let limit = self.config.max_zero_count;
        if let Some((max_zeros, symbols)) = exceeding(&report, limit, |row| Some(row.total_zeros)) {
            warn!(max_zeros, ?symbols, "zero values above limit");
            warnings.push(ConsistencyWarning::ExcessZeros { max_zeros, limit, symbols });
        }
        let limit = self.config.max_raw_missing_run;
        if let Some((max_run, symbols)) = exceeding(&report, limit, |row| Some(row.consecutive_missing)) {
            warn!(max_run, ?symbols, "raw missing run above limit");
            warnings.push(ConsistencyWarning::RawMissingRun { max_run, limit, symbols });
        }

        if !auto_clean {
            return Ok(CheckOutcome {
                series: series.clone(),
                report,
                trim_log: TrimLog {
                    raw,
                    post_trim: None,
                    dropped_symbols: Vec::new(),
                },
                warnings,
            });
        }

        let dropped_symbols: Vec<String> = series
            .symbols()
            .into_iter()
            .filter(|symbol| self.config.is_excluded(symbol))
            .map(str::to_string)
            .collect();
        if dropped_symbols.len() == series.shape().1 {
            return Err(SeriesError::validation("every symbol in the series is excluded"));
        }

        let mut cleaned = series.clone();
        for symbol in &dropped_symbols {
            info!(symbol = %symbol, "dropping inconsistent symbol");
            cleaned = cleaned.drop_symbol(symbol)?;
        }

        let (_, complete) = cleaned.row_presence()?;
        match complete.iter().position(|row_complete| *row_complete) {
            Some(row) => {
                let trim_from = cleaned.time_at(row);
                if trim_from > raw.first_valid {
                    debug!(?trim_from, first_valid = ?raw.first_valid, "trimming leading incomplete rows");
                    cleaned = cleaned.slice_from(row);
                }
            }
            None => {
                warn!("no complete rows after dropping excluded symbols");
                warnings.push(ConsistencyWarning::NoCompleteRows);
                cleaned = cleaned.slice_from(cleaned.height());
            }
        }

        for symbol in cleaned.symbols() {
            let run = max_consecutive_missing(cleaned.values(symbol)?);
            if let Some(row) = report.get_mut(symbol) {
                row.clean_consecutive_missing = Some(run);
            }
        }
        let limit = self.config.max_clean_missing_run;
        if let Some((max_run, symbols)) = exceeding(&report, limit, |row| row.clean_consecutive_missing) {
            warn!(max_run, ?symbols, "missing run above limit after trimming");
            warnings.push(ConsistencyWarning::CleanMissingRun { max_run, limit, symbols });
        }

        let post_trim = TrimEntry::capture(&cleaned)?;

        let (_, complete) = cleaned.row_presence()?;
        cleaned = cleaned.filter_rows(&complete)?;

        for symbol in cleaned.symbols() {
            let remaining = missing_count(cleaned.values(symbol)?);
            if let Some(row) = report.get_mut(symbol) {
                row.final_missing = Some(remaining);
            }
        }

        info!(
            rows_in = series.height(),
            rows_out = cleaned.height(),
            dropped = dropped_symbols.len(),
            warnings = warnings.len(),
            "consistency check complete"
        );

        Ok(CheckOutcome {
            series: cleaned,
            report,
            trim_log: TrimLog {
                raw,
                post_trim: Some(post_trim),
                dropped_symbols,
            },
            warnings,
        })
    }
}
