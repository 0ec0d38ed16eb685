// src/stats.rs

use crate::error::Result;
use crate::series::{is_missing, TimeSeries};
use statrs::statistics::Statistics;

/// Geometric holding-period return: `(prod(1 + r))^(1/n) - 1`.
///
/// Missing returns are skipped. `None` when nothing is left, or when a
/// return is at or below -100%.
pub fn gmean<I>(returns: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let growth: Vec<f64> = returns
        .into_iter()
        .filter(|r| !is_missing(*r))
        .flatten()
        .map(|r| 1.0 + r)
        .collect();
    if growth.is_empty() || growth.iter().any(|g| *g <= 0.0) {
        return None;
    }
    let mean = growth.geometric_mean();
    mean.is_finite().then(|| mean - 1.0)
}

/// [`gmean`] of every symbol column, in column order.
pub fn column_gmeans(series: &TimeSeries) -> Result<Vec<(String, Option<f64>)>> {
    series
        .symbols()
        .into_iter()
        .map(|symbol| Ok((symbol.to_string(), gmean(series.values(symbol)?.into_iter()))))
        .collect()
}
