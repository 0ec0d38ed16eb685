// tests/loader_tests.rs

use async_trait::async_trait;
use marketseries::loader::{align, SeriesRequest, TimeSeriesLoader};
use marketseries::store::ItemMetadata;
use marketseries::{
    ConsistencyChecker, Interval, Period, PolyAggInfo, Result, SeriesError, SeriesSource, TimeSeriesStore, TIME_COLUMN,
};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

const DAY_MS: i64 = 86_400_000;
const START_MS: i64 = 1_704_067_200_000;

fn bars(first_day: i64, last_day: i64, base: f64) -> DataFrame {
    let days: Vec<i64> = (first_day..=last_day).collect();
    DataFrame::new(vec![
        Series::new(TIME_COLUMN, days.iter().map(|d| START_MS + d * DAY_MS).collect::<Vec<_>>()),
        Series::new("close", days.iter().map(|d| base + *d as f64).collect::<Vec<_>>()),
        Series::new("volume", days.iter().map(|d| 1000.0 * (*d + 1) as f64).collect::<Vec<_>>()),
    ])
    .unwrap()
}

/// Serves canned frames by ticker and counts fetches.
struct MockSource {
    frames: BTreeMap<String, DataFrame>,
    fetches: AtomicUsize,
}

impl MockSource {
    fn new() -> Self {
        let mut frames = BTreeMap::new();
        frames.insert("A".to_string(), bars(0, 9, 100.0));
        frames.insert("B".to_string(), bars(3, 9, 200.0));
        frames.insert("EMPTY".to_string(), DataFrame::default());
        MockSource {
            frames,
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SeriesSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, info: &PolyAggInfo) -> Result<DataFrame> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.frames
            .get(&info.ticker)
            .cloned()
            .ok_or_else(|| SeriesError::Download(format!("unknown ticker {}", info.ticker)))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("marketseries=debug")
        .with_test_writer()
        .try_init();
}

#[test]
fn test_request_builder() {
    let request = SeriesRequest::new(["A", "B", "A"])
        .unwrap()
        .period("1y")
        .unwrap()
        .interval("1wk")
        .unwrap()
        .columns(["close"])
        .auto_clean(false);

    assert_eq!(request.tickers, vec!["A", "B"]);
    assert_eq!(request.period, Period::Years(1));
    assert_eq!(request.interval.to_string(), "1wk");
    assert!(!request.auto_clean);

    assert!(matches!(SeriesRequest::new(Vec::<String>::new()), Err(SeriesError::Validation(_))));
    assert!(SeriesRequest::new(["A"]).unwrap().period("forever").is_err());
}

#[tokio::test]
async fn test_timeseries_downloads_missing_and_cleans() {
    init_tracing();
    let dir = tempdir().unwrap();
    let store = TimeSeriesStore::open(dir.path()).unwrap();
    let loader = TimeSeriesLoader::new(&store, MockSource::new(), ConsistencyChecker::default());

    let request = SeriesRequest::new(["A", "B"]).unwrap().columns(["close"]);
    let outcome = loader.timeseries(&request).await.unwrap();

    assert_eq!(outcome.series.symbols(), vec!["A", "B"]);
    assert_eq!(outcome.series.height(), 7);
    assert_eq!(outcome.trim_log.post_trim().unwrap().shape, (7, 2));
    assert!(outcome.raw_missing_run_flagged());

    let collection = loader.collection(&Interval::DAILY).unwrap();
    assert_eq!(collection.name(), "timeseries-mock-1d");
    assert!(collection.contains("A") && collection.contains("B"));

    // cached items are not fetched again
    loader.timeseries(&request).await.unwrap();
    assert_eq!(loader_fetches(&loader), 2);
}

fn loader_fetches(loader: &TimeSeriesLoader<'_, MockSource>) -> usize {
    loader.source().fetches.load(Ordering::SeqCst)
}

#[tokio::test]
async fn test_download_failures_keep_successes() {
    let dir = tempdir().unwrap();
    let store = TimeSeriesStore::open(dir.path()).unwrap();
    let loader = TimeSeriesLoader::new(&store, MockSource::new(), ConsistencyChecker::default());

    let tickers = vec!["A".to_string(), "MISSING".to_string(), "EMPTY".to_string()];
    let result = loader.download_timeseries(&tickers, Period::Max, Interval::DAILY).await;

    match result {
        Err(SeriesError::Download(message)) => {
            assert!(message.contains("MISSING"));
            assert!(message.contains("EMPTY: no data"));
        }
        other => panic!("expected a download error, got {:?}", other),
    }
    let collection = loader.collection(&Interval::DAILY).unwrap();
    assert!(collection.contains("A"));
    assert!(!collection.contains("EMPTY"));
}

#[tokio::test]
async fn test_load_respects_period() {
    let dir = tempdir().unwrap();
    let store = TimeSeriesStore::open(dir.path()).unwrap();
    let loader = TimeSeriesLoader::new(&store, MockSource::new(), ConsistencyChecker::default());
    let collection = loader.collection(&Interval::DAILY).unwrap();
    collection
        .write("A", &bars(0, 9, 100.0), ItemMetadata::new("A", "1d", "mock"), true)
        .unwrap();

    let request = SeriesRequest::new(["A"]).unwrap().period("5d").unwrap();
    let series = loader.load(&request).unwrap();

    assert_eq!(series.symbols(), vec!["close", "volume"]);
    assert_eq!(series.height(), 5);
    assert_eq!(series.time_at(0), Some(START_MS + 5 * DAY_MS));
}

#[test]
fn test_align_naming() {
    let frames = vec![("A".to_string(), bars(0, 2, 1.0)), ("B".to_string(), bars(1, 3, 2.0))];

    let all_fields = align(&frames, &[]).unwrap();
    assert_eq!(all_fields.symbols(), vec!["A.close", "A.volume", "B.close", "B.volume"]);
    assert_eq!(all_fields.height(), 4);
    let a_close = all_fields.values("A.close").unwrap();
    assert_eq!(a_close.get(3), None);

    let one_field = align(&frames, &["close".to_string()]).unwrap();
    assert_eq!(one_field.symbols(), vec!["A", "B"]);

    let missing = align(&frames, &["open".to_string()]);
    assert!(matches!(missing, Err(SeriesError::Validation(_))));
}

#[test]
fn test_align_unions_timestamps_in_order() {
    let late = bars(5, 6, 10.0);
    let early = bars(0, 1, 20.0);
    let frames = vec![("LATE".to_string(), late), ("EARLY".to_string(), early)];

    let aligned = align(&frames, &["close".to_string()]).unwrap();
    let times: Vec<i64> = aligned.times().unwrap().into_no_null_iter().collect();
    assert_eq!(times, vec![START_MS, START_MS + DAY_MS, START_MS + 5 * DAY_MS, START_MS + 6 * DAY_MS]);

    let late_close: Vec<Option<f64>> = aligned.values("LATE").unwrap().into_iter().collect();
    assert_eq!(late_close, vec![None, None, Some(15.0), Some(16.0)]);
    let early_close: Vec<Option<f64>> = aligned.values("EARLY").unwrap().into_iter().collect();
    assert_eq!(early_close, vec![Some(20.0), Some(21.0), None, None]);

    assert!(matches!(align(&[], &[]), Err(SeriesError::Validation(_))));
}
