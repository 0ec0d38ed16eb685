// tests/series_tests.rs

use marketseries::series::{is_missing, TimeSeries, TIME_COLUMN};
use marketseries::SeriesError;
use polars::prelude::*;

#[test]
fn test_integer_columns_are_cast_to_float() {
    let df = DataFrame::new(vec![
        Series::new(TIME_COLUMN, &[1i32, 2, 3]),
        Series::new("volume", &[10i64, 20, 30]),
        Series::new("close", &[1.5f64, 2.5, 3.5]),
    ])
    .unwrap();

    let series = TimeSeries::new(df).unwrap();
    assert_eq!(series.frame().column(TIME_COLUMN).unwrap().dtype(), &DataType::Int64);
    assert_eq!(series.frame().column("volume").unwrap().dtype(), &DataType::Float64);
    assert_eq!(series.symbols(), vec!["volume", "close"]);
    assert_eq!(series.shape(), (3, 2));
}

#[test]
fn test_unsorted_time_key_is_rejected() {
    let result = TimeSeries::from_columns(vec![1, 3, 2], vec![("A", vec![Some(1.0); 3])]);
    assert!(matches!(result, Err(SeriesError::Validation(_))));

    let duplicated = TimeSeries::from_columns(vec![1, 1], vec![("A", vec![Some(1.0); 2])]);
    assert!(matches!(duplicated, Err(SeriesError::Validation(_))));
}

#[test]
fn test_non_numeric_and_missing_columns_are_rejected() {
    let text = DataFrame::new(vec![
        Series::new(TIME_COLUMN, &[1i64, 2]),
        Series::new("name", &["a", "b"]),
    ])
    .unwrap();
    assert!(matches!(TimeSeries::new(text), Err(SeriesError::Validation(_))));

    let no_symbols = DataFrame::new(vec![Series::new(TIME_COLUMN, &[1i64, 2])]).unwrap();
    assert!(matches!(TimeSeries::new(no_symbols), Err(SeriesError::Validation(_))));

    let no_time = DataFrame::new(vec![Series::new("A", &[1.0f64, 2.0])]).unwrap();
    assert!(matches!(TimeSeries::new(no_time), Err(SeriesError::Validation(_))));
}

#[test]
fn test_valid_index_treats_nan_as_missing() {
    let series = TimeSeries::from_columns(
        vec![10, 20, 30, 40],
        vec![
            ("A", vec![None, Some(f64::NAN), Some(1.0), None]),
            ("B", vec![Some(f64::NAN), None, Some(2.0), Some(3.0)]),
        ],
    )
    .unwrap();

    assert_eq!(series.first_valid_index().unwrap(), Some(30));
    assert_eq!(series.last_valid_index().unwrap(), Some(40));
    assert!(is_missing(Some(f64::NAN)));
    assert!(is_missing(None));
    assert!(!is_missing(Some(0.0)));
}

#[test]
fn test_all_missing_has_no_valid_index() {
    let series = TimeSeries::from_columns(vec![1, 2], vec![("A", vec![None, None])]).unwrap();
    assert_eq!(series.first_valid_index().unwrap(), None);
    assert_eq!(series.last_valid_index().unwrap(), None);
}
