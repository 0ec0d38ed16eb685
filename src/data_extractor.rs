// src/data_extractor.rs

use crate::config::{MAX_CONCURRENT_REQUESTS, MAX_RETRIES, POLYGON_BASE_URL, RESULT_LIMIT, RETRY_BACKOFF_SECS};
use crate::error::{Result, SeriesError};
use crate::poly_agg_info::PolyAggInfo;
use crate::series::TIME_COLUMN;
use crate::session::PolygonHistorySession;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use futures::StreamExt;
use polars::prelude::*;
use reqwest::StatusCode;
use serde_json::{to_string, Value};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Anything that can produce a single ticker's bar table.
///
/// The returned frame has a `time` column (epoch millis) plus numeric
/// field columns.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    /// Source name recorded in cache metadata and collection names.
    fn name(&self) -> &str;

    async fn fetch(&self, info: &PolyAggInfo) -> Result<DataFrame>;
}

/// Extracts aggregate bars from the Polygon API.
pub struct AggDataExtractor {
    session: PolygonHistorySession,
    base_url: String,
    limit: u32,
    max_retries: u32,
    backoff: Duration,
}

/// A query that produced no frame, with whether another attempt can help.
struct FailedRequest {
    query: String,
    error: String,
    retryable: bool,
}

impl FailedRequest {
    fn new(query: String, error: SeriesError) -> Self {
        let retryable = match &error {
            SeriesError::Http(err) => match err.status() {
                Some(status) => !status.is_client_error() || status == StatusCode::TOO_MANY_REQUESTS,
                None => true,
            },
            _ => true,
        };
        FailedRequest {
            query,
            error: error.to_string(),
            retryable,
        }
    }
}

impl AggDataExtractor {
    pub fn new(session: PolygonHistorySession) -> Self {
        AggDataExtractor {
            session,
            base_url: POLYGON_BASE_URL.to_string(),
            limit: RESULT_LIMIT,
            max_retries: MAX_RETRIES,
            backoff: Duration::from_secs(RETRY_BACKOFF_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Retry rounds after the first pass. Round `n` waits `backoff * 2^(n-1)`.
    pub fn with_retry(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    /// Fetches every window of the request and returns one frame sorted by time.
    pub async fn extract(&self, info: &PolyAggInfo) -> Result<DataFrame> {
        let date_range = DateRangeBuilder::create(info);
        let queries = QueryBuilder::build(&self.base_url, info, self.limit, &date_range);
        info!(ticker = %info.ticker, requests = queries.len(), "extracting aggregates");

        let (frames, failed_requests) = self.fetch_all(queries).await;
        let mut combined_df = DataFrame::default();
        DataFrameBuilder::combine(&mut combined_df, frames)?;

        self.retry_failed(failed_requests, &mut combined_df).await?;

        DataFrameBuilder::finalize(&mut combined_df)?;
        Ok(combined_df)
    }

    async fn fetch_all(&self, queries: Vec<String>) -> (Vec<DataFrame>, Vec<FailedRequest>) {
        let mut frames = Vec::new();
        let mut failed_requests = Vec::new();

        let mut response_stream = futures::stream::iter(queries)
            .map(|query| async move {
                let result = self.fetch_one(&query).await;
                (query, result)
            })
            .buffer_unordered(MAX_CONCURRENT_REQUESTS);

        while let Some((query, result)) = response_stream.next().await {
            match result {
                Ok(Some(df)) => frames.push(df),
                Ok(None) => debug!(query = %query, "no results"),
                Err(error) => {
                    warn!(query = %query, %error, "request failed");
                    failed_requests.push(FailedRequest::new(query, error));
                }
            }
        }

        (frames, failed_requests)
    }

    /// A body that is not valid JSON counts as a failed request.
    async fn fetch_one(&self, query: &str) -> Result<Option<DataFrame>> {
        let body = self.session.send_request(query).await?.text().await?;
        DataFrameBuilder::parse(&body)
    }

    /// Retries failed requests with exponential backoff, merging what succeeds.
    /// Client errors other than 429 fail at once.
    async fn retry_failed(&self, failed_requests: Vec<FailedRequest>, combined_df: &mut DataFrame) -> Result<()> {
        let mut remaining_failed_requests = failed_requests;
        let mut retry_count = 0;

        loop {
            if let Some(rejected) = remaining_failed_requests.iter().find(|failed| !failed.retryable) {
                return Err(SeriesError::Download(format!(
                    "request rejected: {} ({})",
                    rejected.query, rejected.error
                )));
            }
            if remaining_failed_requests.is_empty() || retry_count >= self.max_retries {
                break;
            }

            retry_count += 1;
            let backoff_duration = self.backoff.saturating_mul(2u32.saturating_pow(retry_count - 1));
            warn!(
                failed = remaining_failed_requests.len(),
                attempt = retry_count,
                backoff_ms = backoff_duration.as_millis() as u64,
                "retrying failed requests"
            );
            sleep(backoff_duration).await;

            let retry_queries = remaining_failed_requests.into_iter().map(|failed| failed.query).collect();
            let (frames, new_failed_requests) = self.fetch_all(retry_queries).await;
            DataFrameBuilder::combine(combined_df, frames)?;
            remaining_failed_requests = new_failed_requests;
        }

        if let Some(failed) = remaining_failed_requests.first() {
            return Err(SeriesError::Download(format!(
                "{} requests still failing after {} retries; first: {} ({})",
                remaining_failed_requests.len(),
                self.max_retries,
                failed.query,
                failed.error
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl SeriesSource for AggDataExtractor {
    fn name(&self) -> &str {
        "polygon"
    }

    async fn fetch(&self, info: &PolyAggInfo) -> Result<DataFrame> {
        self.extract(info).await
    }
}

/// Splits a request's date span into windows small enough for one call each.
pub struct DateRangeBuilder;

impl DateRangeBuilder {
    pub fn create(poly_agg_info: &PolyAggInfo) -> Vec<(NaiveDate, NaiveDate)> {
        let step = poly_agg_info.interval.window_days();
        let mut windows = Vec::new();
        let mut current_date = poly_agg_info.start_date;
        while current_date <= poly_agg_info.end_date {
            let window_end = std::cmp::min(
                current_date + ChronoDuration::days(step - 1),
                poly_agg_info.end_date,
            );
            windows.push((current_date, window_end));
            current_date = window_end + ChronoDuration::days(1);
        }
        windows
    }
}

pub struct QueryBuilder;

impl QueryBuilder {
    pub fn build(
        base_url: &str,
        poly_agg_info: &PolyAggInfo,
        limit: u32,
        date_range: &[(NaiveDate, NaiveDate)],
    ) -> Vec<String> {
        date_range
            .iter()
            .map(|(start, end)| {
                format!(
                    "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}?adjusted=true&sort=asc&limit={}",
                    base_url,
                    poly_agg_info.ticker,
                    poly_agg_info.interval.multiplier,
                    poly_agg_info.interval.timespan.as_str(),
                    start.format("%Y-%m-%d"),
                    end.format("%Y-%m-%d"),
                    limit
                )
            })
            .collect()
    }
}

/// Builds bar frames from aggregate responses.
pub struct DataFrameBuilder;

impl DataFrameBuilder {
    const MAPPING: &'static [(&'static str, &'static str)] = &[
        ("c", "close"),
        ("o", "open"),
        ("vw", "vwap"),
        ("h", "high"),
        ("l", "low"),
        ("t", "time"),
        ("n", "transactions"),
        ("v", "volume"),
    ];

    /// Output column order; `time` first.
    pub const COLUMNS: &'static [&'static str] =
        &[TIME_COLUMN, "open", "high", "low", "close", "volume", "vwap", "transactions"];

    fn create_schema() -> Arc<Schema> {
        Arc::new(Schema::from_iter(vec![
            Field::new("v", DataType::Float64),
            Field::new("vw", DataType::Float64),
            Field::new("o", DataType::Float64),
            Field::new("c", DataType::Float64),
            Field::new("h", DataType::Float64),
            Field::new("l", DataType::Float64),
            Field::new("t", DataType::Int64),
            Field::new("n", DataType::Int64),
        ]))
    }

    /// Parses a raw response body. `None` when it carries no results.
    pub fn parse(body: &str) -> Result<Option<DataFrame>> {
        let json = serde_json::from_str::<Value>(body)?;
        Self::from_json(&json)
    }

    fn from_json(json: &Value) -> Result<Option<DataFrame>> {
        let results_count = json["resultsCount"].as_u64().unwrap_or(0);
        let results = match json["results"].as_array() {
            Some(results) if results_count > 0 && !results.is_empty() => results,
            _ => return Ok(None),
        };

        let json_string = to_string(results)?;
        let mut df = JsonReader::new(Cursor::new(json_string))
            .with_schema(Self::create_schema())
            .finish()?;
        for (old_name, new_name) in Self::MAPPING {
            df.rename(old_name, new_name)?;
        }
        Ok(Some(df.select(Self::COLUMNS.iter().copied())?))
    }

    fn combine(combined_df: &mut DataFrame, df_vec: Vec<DataFrame>) -> Result<()> {
        for df in df_vec {
            if combined_df.width() == 0 {
                *combined_df = df;
            } else {
                combined_df.vstack_mut(&df)?;
            }
        }
        Ok(())
    }

    fn finalize(combined_df: &mut DataFrame) -> Result<()> {
        if combined_df.width() > 0 {
            combined_df.sort_in_place(&[TIME_COLUMN], SortMultipleOptions::default())?;
            combined_df.as_single_chunk();
        }
        Ok(())
    }
}
