//! Weekly and monthly roll-ups of daily attribution results.

use crate::report::AttributionResult;
use chrono::{Datelike, NaiveDate};
use core_types::Granularity;
use std::collections::BTreeMap;

/// The calendar bucket `date` falls in; ISO weeks for weekly, calendar months
/// for monthly. Daily results are never bucketed.
fn bucket_key(granularity: Granularity, date: NaiveDate) -> Option<(i32, u32)> {
    match granularity {
        Granularity::Daily => None,
        Granularity::Weekly => {
            let week = date.iso_week();
            Some((week.year(), week.week()))
        }
        Granularity::Monthly => Some((date.year(), date.month())),
    }
}

/// Rolls daily results up to `granularity`.
///
/// Total returns compound within a bucket; contributions and impacts are
/// summed. Asking for `Daily` returns the input unchanged.
pub fn aggregate(daily: &[AttributionResult], granularity: Granularity) -> Vec<AttributionResult> {
    if granularity == Granularity::Daily {
        return daily.to_vec();
    }

    let mut buckets: Vec<AttributionResult> = Vec::new();
    let mut current_key = None;
    for day in daily {
        let key = bucket_key(granularity, day.date);
        match buckets.last_mut() {
            Some(bucket) if key == current_key => {
                bucket.date = day.date;
                bucket.total_return = (1.0 + bucket.total_return) * (1.0 + day.total_return) - 1.0;
                bucket.weight_change_impact += day.weight_change_impact;
                add_into(&mut bucket.asset_contributions, &day.asset_contributions);
                add_into(&mut bucket.rebalancing_impact, &day.rebalancing_impact);
            }
            _ => {
                current_key = key;
                buckets.push(AttributionResult {
                    granularity,
                    ..day.clone()
                });
            }
        }
    }
    buckets
}

fn add_into(acc: &mut BTreeMap<String, f64>, values: &BTreeMap<String, f64>) {
    for (symbol, value) in values {
        *acc.entry(symbol.clone()).or_insert(0.0) += value;
    }
}
