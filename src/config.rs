// src/config.rs

use crate::error::{Result, SeriesError};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

pub const POLYGON_BASE_URL: &str = "https://api.polygon.io";
pub const REQUESTS_PER_SECOND: u32 = 5;
pub const MAX_BURST_REQUESTS: u32 = 5;
pub const MAX_CONCURRENT_REQUESTS: usize = 100;
pub const MAX_RETRIES: u32 = 5;
/// First retry delay; each later round doubles it.
pub const RETRY_BACKOFF_SECS: u64 = 2;
pub const RESULT_LIMIT: u32 = 50_000;

pub const DEFAULT_PERIOD: &str = "10y";
pub const DEFAULT_INTERVAL: &str = "1d";
pub const DEFAULT_SOURCE: &str = "polygon";
pub const DEFAULT_STORE_ROOT: &str = "timeseries";
/// How far back a `"max"` period reaches.
pub const MAX_HISTORY_YEARS: u32 = 30;

pub const MAX_RAW_MISSING_RUN: usize = 1;
pub const MAX_ZERO_COUNT: usize = 1;
pub const MAX_CLEAN_MISSING_RUN: usize = 4;

pub const ENV_API_KEY: &str = "POLYGON_API_KEY";
pub const ENV_STORE_ROOT: &str = "TIMESERIES_STORE";
pub const ENV_REQUESTS_PER_SECOND: &str = "POLYGON_REQUESTS_PER_SECOND";

lazy_static! {
    /// Symbols known to be inconsistent with the baskets they are fetched in,
    /// e.g. an index-level ticker mixed into its constituents.
    pub static ref INCONSISTENT_SYMBOLS: BTreeSet<String> =
        ["DOW"].iter().map(|s| s.to_string()).collect();
}

/// Thresholds and exclusions used by the consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub excluded_symbols: BTreeSet<String>,
    pub max_raw_missing_run: usize,
    pub max_zero_count: usize,
    pub max_clean_missing_run: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            excluded_symbols: INCONSISTENT_SYMBOLS.clone(),
            max_raw_missing_run: MAX_RAW_MISSING_RUN,
            max_zero_count: MAX_ZERO_COUNT,
            max_clean_missing_run: MAX_CLEAN_MISSING_RUN,
        }
    }
}

impl CheckerConfig {
    pub fn with_excluded<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_excluded(&self, symbol: &str) -> bool {
        self.excluded_symbols.contains(symbol)
    }
}

/// Process settings read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub polygon_api_key: Option<String>,
    pub store_root: PathBuf,
    pub requests_per_second: u32,
    pub max_burst_requests: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let requests_per_second = match lookup(ENV_REQUESTS_PER_SECOND) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|rps| *rps > 0)
                .ok_or_else(|| {
                    SeriesError::validation(format!(
                        "{} must be a positive integer, got '{}'",
                        ENV_REQUESTS_PER_SECOND, raw
                    ))
                })?,
            None => REQUESTS_PER_SECOND,
        };

        Ok(Settings {
            polygon_api_key: lookup(ENV_API_KEY).filter(|key| !key.is_empty()),
            store_root: lookup(ENV_STORE_ROOT)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_ROOT)),
            requests_per_second,
            max_burst_requests: MAX_BURST_REQUESTS.max(requests_per_second),
        })
    }
}
