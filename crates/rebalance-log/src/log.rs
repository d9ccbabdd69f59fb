use crate::error::LogError;
use crate::row::RebalanceLogRow;
use chrono::NaiveDate;
use core_types::{RebalanceEvent, WeightsEvolutionEntry};
use std::collections::BTreeMap;

/// `date -> asset -> realized weight`, the shape the attribution engine consumes.
pub type WeightsSeries = BTreeMap<NaiveDate, BTreeMap<String, f64>>;

/// Append-only store for one run.
///
/// Entries may share a date but never go back in time; anything else is
/// rejected so the log stays a faithful, ordered account of the run.
#[derive(Debug, Clone, Default)]
pub struct RebalanceLog {
    weights: Vec<WeightsEvolutionEntry>,
    rebalances: Vec<RebalanceEvent>,
}

impl RebalanceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_weights(&mut self, entry: WeightsEvolutionEntry) -> Result<(), LogError> {
        if let Some(last) = self.weights.last() {
            if entry.date < last.date {
                return Err(LogError::OutOfOrder {
                    kind: "weights",
                    date: entry.date,
                    last: last.date,
                });
            }
        }
        self.weights.push(entry);
        Ok(())
    }

    pub fn record_rebalance(&mut self, event: RebalanceEvent) -> Result<(), LogError> {
        if let Some(last) = self.rebalances.last() {
            if event.date < last.date {
                return Err(LogError::OutOfOrder {
                    kind: "rebalance",
                    date: event.date,
                    last: last.date,
                });
            }
        }
        tracing::debug!(
            date = %event.date,
            trigger = %event.trigger.trigger_type,
            "rebalance recorded"
        );
        self.rebalances.push(event);
        Ok(())
    }

    pub fn weights_evolution(&self) -> &[WeightsEvolutionEntry] {
        &self.weights
    }

    pub fn rebalances(&self) -> &[RebalanceEvent] {
        &self.rebalances
    }

    /// The weights evolution keyed by date. A later entry on a repeated date
    /// replaces the earlier one.
    pub fn weights_series(&self) -> WeightsSeries {
        self.weights
            .iter()
            .map(|entry| (entry.date, entry.weights.clone()))
            .collect()
    }

    /// One flat row per rebalance event, in log order.
    pub fn rebalance_rows(&self) -> Result<Vec<RebalanceLogRow>, LogError> {
        self.rebalances.iter().map(RebalanceLogRow::from_event).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn entry(day: u32, a: f64) -> WeightsEvolutionEntry {
        WeightsEvolutionEntry {
            date: d(day),
            weights: BTreeMap::from([("A".to_string(), a), ("B".to_string(), 1.0 - a)]),
        }
    }

    #[test]
    fn weights_are_appended_in_date_order() {
        let mut log = RebalanceLog::new();
        log.record_weights(entry(1, 0.6)).unwrap();
        log.record_weights(entry(1, 0.6)).unwrap();
        log.record_weights(entry(4, 0.55)).unwrap();
        assert_eq!(log.weights_evolution().len(), 3);

        let series = log.weights_series();
        assert_eq!(series.len(), 2);
        assert_eq!(series[&d(4)]["A"], 0.55);
    }

    #[test]
    fn entries_going_back_in_time_are_rejected() {
        let mut log = RebalanceLog::new();
        log.record_weights(entry(5, 0.6)).unwrap();
        let err = log.record_weights(entry(4, 0.6)).unwrap_err();
        assert!(matches!(err, LogError::OutOfOrder { kind: "weights", .. }));
        assert_eq!(log.weights_evolution().len(), 1);
    }
}
