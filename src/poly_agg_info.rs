// src/poly_agg_info.rs

use crate::timeframe::{Interval, MarketTimezone, Period};
use chrono::NaiveDate;

/// One ticker's aggregate request: what to fetch and over which dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolyAggInfo {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub interval: Interval,
}

impl PolyAggInfo {
    /// Request covering `period` up to today's market date.
    pub fn for_period(ticker: impl Into<String>, period: Period, interval: Interval) -> Self {
        let end_date = MarketTimezone::Eastern.today();
        PolyAggInfo {
            ticker: ticker.into(),
            start_date: period.start_from(end_date),
            end_date,
            interval,
        }
    }

    pub fn create_poly_agg_infos<I, S>(
        tickers: I,
        start_date: NaiveDate,
        end_date: NaiveDate,
        interval: Interval,
    ) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        tickers
            .into_iter()
            .map(|ticker| PolyAggInfo {
                ticker: ticker.into(),
                start_date,
                end_date,
                interval,
            })
            .collect()
    }
}
