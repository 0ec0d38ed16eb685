// tests/config_tests.rs

use marketseries::config::{
    CheckerConfig, Settings, DEFAULT_STORE_ROOT, ENV_API_KEY, ENV_REQUESTS_PER_SECOND, ENV_STORE_ROOT,
    INCONSISTENT_SYMBOLS, MAX_CLEAN_MISSING_RUN, REQUESTS_PER_SECOND,
};
use marketseries::SeriesError;
use std::collections::HashMap;
use std::path::PathBuf;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn test_checker_defaults() {
    let config = CheckerConfig::default();
    assert!(config.is_excluded("DOW"));
    assert!(INCONSISTENT_SYMBOLS.contains("DOW"));
    assert_eq!(config.max_clean_missing_run, MAX_CLEAN_MISSING_RUN);
    assert_eq!(config.max_zero_count, 1);
    assert_eq!(config.max_raw_missing_run, 1);
}

#[test]
fn test_checker_config_from_json() {
    let config: CheckerConfig =
        serde_json::from_str(r#"{"excluded_symbols": ["SPX"], "max_clean_missing_run": 10}"#).unwrap();
    assert!(config.is_excluded("SPX"));
    assert!(!config.is_excluded("DOW"));
    assert_eq!(config.max_clean_missing_run, 10);
    assert_eq!(config.max_zero_count, 1);
}

#[test]
fn test_settings_defaults() {
    let settings = Settings::from_lookup(lookup(&[])).unwrap();
    assert_eq!(settings.polygon_api_key, None);
    assert_eq!(settings.store_root, PathBuf::from(DEFAULT_STORE_ROOT));
    assert_eq!(settings.requests_per_second, REQUESTS_PER_SECOND);
}

#[test]
fn test_settings_from_lookup() {
    let settings = Settings::from_lookup(lookup(&[
        (ENV_API_KEY, "abc"),
        (ENV_STORE_ROOT, "/var/cache/series"),
        (ENV_REQUESTS_PER_SECOND, "50"),
    ]))
    .unwrap();
    assert_eq!(settings.polygon_api_key.as_deref(), Some("abc"));
    assert_eq!(settings.store_root, PathBuf::from("/var/cache/series"));
    assert_eq!(settings.requests_per_second, 50);
    assert_eq!(settings.max_burst_requests, 50);
}

#[test]
fn test_bad_rate_is_rejected() {
    for raw in ["0", "fast", "-1"] {
        let result = Settings::from_lookup(lookup(&[(ENV_REQUESTS_PER_SECOND, raw)]));
        assert!(matches!(result, Err(SeriesError::Validation(_))), "accepted {}", raw);
    }
}
