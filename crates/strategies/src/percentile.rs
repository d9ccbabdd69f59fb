//! Trailing-window percentile of the latest observation of a series.

use crate::error::StrategyError;
use chrono::{Months, NaiveDate};
use core_types::TimeSeries;

/// Valuation ratios at or above this are treated as data artefacts.
pub const MAX_PLAUSIBLE_RATIO: f64 = 200.0;

/// Which observations take part in the percentile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlierFilter {
    /// Keep every finite observation.
    None,
    /// Keep only ratios strictly between 0 and [`MAX_PLAUSIBLE_RATIO`].
    ValuationRatio,
}

impl OutlierFilter {
    fn accepts(self, value: f64) -> bool {
        match self {
            OutlierFilter::None => value.is_finite(),
            OutlierFilter::ValuationRatio => {
                value.is_finite() && value > 0.0 && value < MAX_PLAUSIBLE_RATIO
            }
        }
    }
}

/// The outcome of a percentile lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileReading {
    /// Date of the as-of observation.
    pub observed_on: NaiveDate,
    pub current: f64,
    /// Fraction of windowed values `<=` the current one, in (0, 1].
    pub percentile: f64,
    pub sample_size: usize,
}

/// Ranks the latest observation at or before `date` against the trailing
/// `years` of history ending at `date` (`date - years < d <= date`).
pub fn trailing_percentile(
    series: &TimeSeries,
    date: NaiveDate,
    years: u32,
    filter: OutlierFilter,
) -> Result<PercentileReading, StrategyError> {
    let (observed_on, current) = series.as_of(date).ok_or_else(|| {
        StrategyError::DataMissing(format!("no observation at or before {date}"))
    })?;
    if !filter.accepts(current) {
        return Err(StrategyError::Calculation(format!(
            "latest observation {current} on {observed_on} is outside the plausible range"
        )));
    }

    let start = date
        .checked_sub_months(Months::new(years.saturating_mul(12)))
        .ok_or_else(|| StrategyError::Calculation(format!("{years}-year window before {date} underflows")))?;

    let window: Vec<f64> = series
        .window(start, date)
        .into_iter()
        .filter(|v| filter.accepts(*v))
        .collect();
    if window.is_empty() {
        return Err(StrategyError::DataMissing(format!(
            "no usable observations between {start} and {date}"
        )));
    }

    let at_or_below = window.iter().filter(|v| **v <= current).count();
    Ok(PercentileReading {
        observed_on,
        current,
        percentile: at_or_below as f64 / window.len() as f64,
        sample_size: window.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn ranks_latest_value_within_window() {
        let series: TimeSeries = [
            (d(2020, 1, 1), 10.0),
            (d(2020, 6, 1), 20.0),
            (d(2021, 1, 1), 30.0),
            (d(2021, 6, 1), 15.0),
        ]
        .into_iter()
        .collect();
        let reading = trailing_percentile(&series, d(2021, 7, 1), 10, OutlierFilter::None).unwrap();
        assert_eq!(reading.observed_on, d(2021, 6, 1));
        assert_eq!(reading.sample_size, 4);
        // 10 and 15 are <= 15
        assert_relative_eq!(reading.percentile, 0.5);
    }

    #[test]
    fn window_drops_observations_older_than_lookback() {
        let series: TimeSeries = [
            (d(2000, 1, 1), 1.0),
            (d(2019, 1, 1), 50.0),
            (d(2020, 1, 1), 40.0),
        ]
        .into_iter()
        .collect();
        let reading = trailing_percentile(&series, d(2020, 1, 1), 10, OutlierFilter::None).unwrap();
        assert_eq!(reading.sample_size, 2);
        assert_relative_eq!(reading.percentile, 0.5);
    }

    #[test]
    fn valuation_filter_discards_implausible_ratios() {
        let series: TimeSeries = [
            (d(2020, 1, 1), -5.0),
            (d(2020, 2, 1), 250.0),
            (d(2020, 3, 1), 18.0),
            (d(2020, 4, 1), 22.0),
            (d(2020, 5, 1), 20.0),
        ]
        .into_iter()
        .collect();
        let reading =
            trailing_percentile(&series, d(2020, 5, 1), 10, OutlierFilter::ValuationRatio).unwrap();
        assert_eq!(reading.sample_size, 3);
        assert_relative_eq!(reading.percentile, 2.0 / 3.0);
    }

    #[test]
    fn empty_series_is_missing_data() {
        let err = trailing_percentile(&TimeSeries::new(), d(2020, 1, 1), 10, OutlierFilter::None)
            .unwrap_err();
        assert!(matches!(err, StrategyError::DataMissing(_)));
    }

    #[test]
    fn implausible_current_ratio_is_a_calculation_error() {
        let series: TimeSeries = [(d(2020, 1, 1), 15.0), (d(2020, 2, 1), 0.0)].into_iter().collect();
        let err = trailing_percentile(&series, d(2020, 2, 1), 10, OutlierFilter::ValuationRatio)
            .unwrap_err();
        assert!(matches!(err, StrategyError::Calculation(_)));
    }
}
