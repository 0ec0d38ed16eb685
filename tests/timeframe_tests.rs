// tests/timeframe_tests.rs

use chrono::NaiveDate;
use marketseries::poly_agg_info::PolyAggInfo;
use marketseries::{Interval, MarketTimezone, Period, Timespan};

#[test]
fn test_interval_parsing() {
    let daily: Interval = "1d".parse().unwrap();
    assert_eq!(daily, Interval::DAILY);

    let five_minutes: Interval = "5m".parse().unwrap();
    assert_eq!(five_minutes.multiplier, 5);
    assert_eq!(five_minutes.timespan, Timespan::Minute);
    assert_eq!(five_minutes.window_days(), 1);

    let weekly: Interval = "1wk".parse().unwrap();
    assert_eq!(weekly.timespan.as_str(), "week");
    assert_eq!(weekly.to_string(), "1wk");

    assert!("1x".parse::<Interval>().is_err());
    assert!("0d".parse::<Interval>().is_err());
}

#[test]
fn test_period_parsing_and_display() {
    assert_eq!("10y".parse::<Period>().unwrap(), Period::Years(10));
    assert_eq!("6mo".parse::<Period>().unwrap(), Period::Months(6));
    assert_eq!("MAX".parse::<Period>().unwrap(), Period::Max);
    assert_eq!(Period::Weeks(2).to_string(), "2wk");

    let err = "ten years".parse::<Period>().unwrap_err();
    assert_eq!(err.kind, "period");
}

#[test]
fn test_period_start_dates() {
    let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
    assert_eq!(Period::Days(5).start_from(end), NaiveDate::from_ymd_opt(2024, 3, 26).unwrap());
    assert_eq!(Period::Months(1).start_from(end), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    assert_eq!(Period::Years(1).start_from(end), NaiveDate::from_ymd_opt(2023, 3, 31).unwrap());
}

#[test]
fn test_cutoff_millis() {
    let last = 1_704_067_200_000; // 2024-01-01T00:00:00Z
    let day = 86_400_000;
    assert_eq!(Period::Days(2).cutoff_millis(last), Some(last - 2 * day));
    assert_eq!(Period::Max.cutoff_millis(last), None);
}

#[test]
fn test_market_date_of_timestamp() {
    // 2024-01-02T03:00:00Z is still Jan 1st in New York
    let date = MarketTimezone::Eastern.date_of(1_704_164_400_000).unwrap();
    assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
}

#[test]
fn test_poly_agg_info_for_period() {
    let info = PolyAggInfo::for_period("AAPL", Period::Years(1), Interval::DAILY);
    assert_eq!(info.ticker, "AAPL");
    assert_eq!(info.start_date, Period::Years(1).start_from(info.end_date));

    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
    let infos = PolyAggInfo::create_poly_agg_infos(["AAPL", "MSFT"], start, end, Interval::DAILY);
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[1].ticker, "MSFT");
    assert_eq!(infos[1].start_date, start);
}

#[test]
fn test_huge_year_count_clamps_to_calendar_start() {
    let period: Period = "400000000y".parse().unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    assert_eq!(period.start_from(end), NaiveDate::MIN);

    let last = 1_704_067_200_000;
    let cutoff = period.cutoff_millis(last).unwrap();
    assert!(cutoff < 0);
}
