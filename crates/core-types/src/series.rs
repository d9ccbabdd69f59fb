use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;

/// A date-indexed series of observations (closes, valuation ratios, yields).
///
/// Backed by a `BTreeMap` so iteration is always in date order and lookups by
/// date range are cheap. Serializes as a plain `{ "YYYY-MM-DD": value }` map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSeries {
    points: BTreeMap<NaiveDate, f64>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, value: f64) {
        self.points.insert(date, value);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The observation recorded exactly on `date`, if any.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points.get(&date).copied()
    }

    /// The most recent observation at or before `date`.
    pub fn as_of(&self, date: NaiveDate) -> Option<(NaiveDate, f64)> {
        self.points
            .range(..=date)
            .next_back()
            .map(|(d, v)| (*d, *v))
    }

    /// All values observed up to and including `date`, oldest first.
    pub fn until(&self, date: NaiveDate) -> Vec<f64> {
        self.points.range(..=date).map(|(_, v)| *v).collect()
    }

    /// Values with `start < d <= end`.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> Vec<f64> {
        if end <= start {
            return Vec::new();
        }
        self.points
            .range((Bound::Excluded(start), Bound::Included(end)))
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().map(|(d, v)| (*d, *v))
    }

    /// Simple period-over-period returns. The first observation has no return
    /// and is omitted. A zero previous value yields a non-finite return, which
    /// downstream consumers are expected to treat as missing.
    pub fn returns(&self) -> TimeSeries {
        let points = self
            .points
            .iter()
            .zip(self.points.iter().skip(1))
            .map(|((_, prev), (date, curr))| (*date, curr / prev - 1.0))
            .collect();
        Self { points }
    }
}

impl FromIterator<(NaiveDate, f64)> for TimeSeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample() -> TimeSeries {
        [(d(2024, 1, 2), 100.0), (d(2024, 1, 3), 110.0), (d(2024, 1, 5), 99.0)]
            .into_iter()
            .collect()
    }

    #[test]
    fn as_of_finds_latest_observation_not_after_date() {
        let s = sample();
        assert_eq!(s.as_of(d(2024, 1, 4)), Some((d(2024, 1, 3), 110.0)));
        assert_eq!(s.as_of(d(2024, 1, 5)), Some((d(2024, 1, 5), 99.0)));
        assert_eq!(s.as_of(d(2024, 1, 1)), None);
    }

    #[test]
    fn window_excludes_start_and_includes_end() {
        let s = sample();
        assert_eq!(s.window(d(2024, 1, 2), d(2024, 1, 5)), vec![110.0, 99.0]);
        assert!(s.window(d(2024, 1, 5), d(2024, 1, 5)).is_empty());
    }

    #[test]
    fn returns_are_simple_and_skip_first_point() {
        let r = sample().returns();
        assert_eq!(r.len(), 2);
        assert_relative_eq!(r.get(d(2024, 1, 3)).unwrap(), 0.1, epsilon = 1e-12);
        assert_relative_eq!(r.get(d(2024, 1, 5)).unwrap(), -0.1, epsilon = 1e-12);
    }

    #[test]
    fn serializes_as_date_keyed_map() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.starts_with("{\"2024-01-02\":100.0"));
        let back: TimeSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }
}
