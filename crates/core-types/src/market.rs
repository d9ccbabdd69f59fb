use crate::series::TimeSeries;
use crate::structs::AssetRegistry;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Everything the upstream data provider hands to a run. Assumed pre-cleaned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    /// Close prices per symbol.
    pub prices: BTreeMap<String, TimeSeries>,
    /// Valuation ratios (e.g. P/E) per equity symbol.
    #[serde(default)]
    pub valuations: BTreeMap<String, TimeSeries>,
    /// The benchmark yield series, in percent.
    #[serde(default)]
    pub yields: TimeSeries,
}

impl MarketData {
    pub fn price_series(&self, symbol: &str) -> Option<&TimeSeries> {
        self.prices.get(symbol)
    }

    /// Dates on which every one of `symbols` has a close.
    ///
    /// Returns an empty calendar if any symbol has no price series at all.
    pub fn common_dates<'a>(&self, symbols: impl IntoIterator<Item = &'a str>) -> Vec<NaiveDate> {
        let mut common: Option<BTreeSet<NaiveDate>> = None;
        for symbol in symbols {
            let Some(series) = self.prices.get(symbol) else {
                return Vec::new();
            };
            let dates: BTreeSet<NaiveDate> = series.dates().collect();
            common = Some(match common {
                None => dates,
                Some(acc) => acc.intersection(&dates).copied().collect(),
            });
        }
        common.map(|set| set.into_iter().collect()).unwrap_or_default()
    }

    /// The closes of `symbols` on exactly `date`; `None` if any is missing.
    pub fn closes_on<'a>(
        &self,
        date: NaiveDate,
        symbols: impl IntoIterator<Item = &'a str>,
    ) -> Option<BTreeMap<String, f64>> {
        symbols
            .into_iter()
            .map(|s| {
                self.prices
                    .get(s)
                    .and_then(|series| series.get(date))
                    .map(|close| (s.to_string(), close))
            })
            .collect()
    }

    /// Per-date simple returns for `symbols`, keyed `date -> symbol -> return`.
    pub fn asset_returns<'a>(
        &self,
        symbols: impl IntoIterator<Item = &'a str>,
    ) -> BTreeMap<NaiveDate, BTreeMap<String, f64>> {
        let mut frame: BTreeMap<NaiveDate, BTreeMap<String, f64>> = BTreeMap::new();
        for symbol in symbols {
            if let Some(series) = self.prices.get(symbol) {
                for (date, ret) in series.returns().iter() {
                    frame.entry(date).or_default().insert(symbol.to_string(), ret);
                }
            }
        }
        frame
    }
}

/// A read-only view of the market as of one simulated date.
///
/// Calculators only ever see history up to and including `date` through the
/// accessors here, which keeps look-ahead out of every model.
#[derive(Debug, Clone, Copy)]
pub struct MarketContext<'a> {
    date: NaiveDate,
    data: &'a MarketData,
    universe: &'a AssetRegistry,
}

impl<'a> MarketContext<'a> {
    pub fn new(date: NaiveDate, data: &'a MarketData, universe: &'a AssetRegistry) -> Self {
        Self { date, data, universe }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn universe(&self) -> &'a AssetRegistry {
        self.universe
    }

    /// Closes for `symbol` up to and including the context date.
    pub fn price_history(&self, symbol: &str) -> Option<Vec<f64>> {
        self.data.prices.get(symbol).map(|s| s.until(self.date))
    }

    /// The full valuation series for `symbol`; callers window it themselves.
    pub fn valuation_series(&self, symbol: &str) -> Option<&'a TimeSeries> {
        self.data.valuations.get(symbol)
    }

    pub fn yield_series(&self) -> &'a TimeSeries {
        &self.data.yields
    }
}
