// src/loader.rs

use crate::config::{DEFAULT_INTERVAL, DEFAULT_PERIOD};
use crate::consistency::{CheckOutcome, ConsistencyChecker};
use crate::data_extractor::SeriesSource;
use crate::error::{Result, SeriesError};
use crate::poly_agg_info::PolyAggInfo;
use crate::series::{TimeSeries, TIME_COLUMN};
use crate::store::{collection_name, Collection, ItemMetadata, TimeSeriesStore};
use crate::timeframe::{Interval, Period};
use futures::future::join_all;
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{error, info, warn};

/// What to load: tickers, look-back, bar size and which fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    pub tickers: Vec<String>,
    pub period: Period,
    pub interval: Interval,
    /// Fields to keep from each item; empty keeps all of them.
    pub columns: Vec<String>,
    pub auto_clean: bool,
}

impl SeriesRequest {
    /// Request with the default period, interval and auto-clean on.
    /// Duplicate tickers are dropped, keeping first occurrence order.
    pub fn new<I, S>(tickers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let tickers: Vec<String> = tickers
            .into_iter()
            .map(Into::into)
            .filter(|ticker: &String| seen.insert(ticker.clone()))
            .collect();
        if tickers.is_empty() {
            return Err(SeriesError::validation("no tickers requested"));
        }
        Ok(SeriesRequest {
            tickers,
            period: DEFAULT_PERIOD.parse()?,
            interval: DEFAULT_INTERVAL.parse()?,
            columns: Vec::new(),
            auto_clean: true,
        })
    }

    pub fn period(mut self, period: &str) -> Result<Self> {
        self.period = period.parse()?;
        Ok(self)
    }

    pub fn interval(mut self, interval: &str) -> Result<Self> {
        self.interval = interval.parse()?;
        Ok(self)
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn auto_clean(mut self, auto_clean: bool) -> Self {
        self.auto_clean = auto_clean;
        self
    }
}

/// Loads series from the cache, downloading whatever is missing, and runs
/// the consistency check on the aligned result.
pub struct TimeSeriesLoader<'a, S: SeriesSource> {
    store: &'a TimeSeriesStore,
    source: S,
    checker: ConsistencyChecker,
}

impl<'a, S: SeriesSource> TimeSeriesLoader<'a, S> {
    pub fn new(store: &'a TimeSeriesStore, source: S, checker: ConsistencyChecker) -> Self {
        TimeSeriesLoader { store, source, checker }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn collection(&self, interval: &Interval) -> Result<Collection> {
        self.store.collection(&collection_name(self.source.name(), interval))
    }

    pub async fn timeseries(&self, request: &SeriesRequest) -> Result<CheckOutcome> {
        let collection = self.collection(&request.interval)?;
        let stored = collection.list_items()?;
        let not_stored: Vec<String> = request
            .tickers
            .iter()
            .filter(|ticker| !stored.contains(*ticker))
            .cloned()
            .collect();

        if !not_stored.is_empty() {
            self.download_timeseries(&not_stored, Period::Max, request.interval).await?;
        }

        let series = self.load(request)?;
        self.checker.check(&series, request.auto_clean)
    }

    /// Fetches each ticker concurrently and stores it, overwriting what is
    /// cached. Successful downloads are stored even when others fail.
    pub async fn download_timeseries(&self, tickers: &[String], period: Period, interval: Interval) -> Result<Vec<String>> {
        let collection = self.collection(&interval)?;
        let futures = tickers.iter().map(|ticker| {
            let info = PolyAggInfo::for_period(ticker.clone(), period, interval);
            async move { (info.ticker.clone(), self.source.fetch(&info).await) }
        });

        let mut stored = Vec::new();
        let mut failures = Vec::new();
        for (ticker, result) in join_all(futures).await {
            match result {
                Ok(df) if df.height() > 0 => {
                    let metadata = ItemMetadata::new(&ticker, interval.to_string(), self.source.name());
                    collection.write(&ticker, &df, metadata, true)?;
                    stored.push(ticker);
                }
                Ok(_) => {
                    warn!(ticker = %ticker, "source returned no data");
                    failures.push(format!("{}: no data", ticker));
                }
                Err(err) => {
                    error!(ticker = %ticker, error = %err, "download failed");
                    failures.push(format!("{}: {}", ticker, err));
                }
            }
        }

        info!(stored = stored.len(), failed = failures.len(), "download complete");
        if !failures.is_empty() {
            return Err(SeriesError::Download(failures.join("; ")));
        }
        Ok(stored)
    }

    /// Reads the requested items from the cache and aligns them on time.
    pub fn load(&self, request: &SeriesRequest) -> Result<TimeSeries> {
        let collection = self.collection(&request.interval)?;
        let frames = request
            .tickers
            .par_iter()
            .map(|ticker| -> Result<(String, DataFrame)> {
                let item = collection.item(ticker)?;
                Ok((ticker.clone(), item.last(request.period)?))
            })
            .collect::<Result<Vec<(String, DataFrame)>>>()?;

        align(&frames, &request.columns)
    }
}

/// Outer-joins per-ticker frames on `time`: every timestamp seen in any
/// frame becomes a row, and each ticker is left-joined onto that key.
///
/// Column names: the field for a single ticker, the ticker for a single
/// field, `TICKER.field` otherwise.
pub fn align(frames: &[(String, DataFrame)], columns: &[String]) -> Result<TimeSeries> {
    if frames.is_empty() {
        return Err(SeriesError::validation("no frames to align"));
    }

    let single_ticker = frames.len() == 1;
    let single_field = columns.len() == 1;
    let mut keys = Vec::with_capacity(frames.len());
    let mut tables = Vec::with_capacity(frames.len());

    for (ticker, df) in frames {
        let fields: Vec<&str> = if columns.is_empty() {
            df.get_column_names().into_iter().filter(|name| *name != TIME_COLUMN).collect()
        } else {
            columns.iter().map(String::as_str).collect()
        };

        let mut exprs = vec![col(TIME_COLUMN).cast(DataType::Int64)];
        for field in fields {
            if df.column(field).is_err() {
                return Err(SeriesError::validation(format!("'{}' has no column '{}'", ticker, field)));
            }
            let name = if single_ticker {
                field.to_string()
            } else if single_field {
                ticker.clone()
            } else {
                format!("{}.{}", ticker, field)
            };
            exprs.push(col(field).cast(DataType::Float64).alias(&name));
        }

        let table = df
            .clone()
            .lazy()
            .filter(col(TIME_COLUMN).is_not_null())
            .select(exprs);
        keys.push(table.clone().select([col(TIME_COLUMN)]));
        tables.push(table);
    }

    let mut aligned = concat(keys, UnionArgs::default())?.unique(None, UniqueKeepStrategy::Any);
    for table in tables {
        aligned = aligned.left_join(table, col(TIME_COLUMN), col(TIME_COLUMN));
    }

    let mut df = aligned.collect()?;
    df.sort_in_place(&[TIME_COLUMN], SortMultipleOptions::default())?;
    TimeSeries::new(df)
}
