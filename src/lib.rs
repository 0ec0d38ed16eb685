// src/lib.rs

pub mod config;
pub mod error;
pub mod session;
pub mod data_extractor;
pub mod poly_agg_info;
pub mod timeframe;

pub mod series;
pub mod consistency;
pub mod store;
pub mod loader;

pub mod conventions;
pub mod quotes;
pub mod stats;

pub use config::{CheckerConfig, Settings};
pub use error::{Result, SeriesError, UnknownConventionError};
pub use session::PolygonHistorySession;

pub use data_extractor::{AggDataExtractor, SeriesSource};
pub use poly_agg_info::PolyAggInfo;
pub use timeframe::{Interval, MarketTimezone, Period, Timespan};
pub use series::{TimeSeries, TIME_COLUMN};
pub use consistency::{CheckOutcome, ConsistencyChecker, ConsistencyReport, ConsistencyWarning, TrimLog, TrimStage};
pub use store::{Collection, Item, ItemMetadata, TimeSeriesStore};
pub use loader::{SeriesRequest, TimeSeriesLoader};
pub use conventions::{ConventionSet, CurveConventions};
pub use quotes::{CurveInputs, MarketQuote, QuotedInstrument};
pub use stats::gmean;
