use crate::error::CoreError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance on the sum of a set of target weights.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// A fully-invested allocation: every weight is non-negative and the weights
/// sum to 1.0 within [`WEIGHT_TOLERANCE`].
///
/// The only ways to obtain one are [`TargetWeights::normalize`],
/// [`TargetWeights::equal`] and the validating [`TargetWeights::try_from_map`],
/// so a value of this type always satisfies the invariant. Deserialization
/// goes through `try_from_map` too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, f64>",
    into = "BTreeMap<String, f64>"
)]
pub struct TargetWeights {
    weights: BTreeMap<String, f64>,
}

impl TargetWeights {
    /// Scales non-negative raw weights so they sum to one.
    ///
    /// Returns the weights together with the normalization factor (`1 / Σ raw`).
    pub fn normalize(raw: &BTreeMap<String, f64>) -> Result<(Self, f64), CoreError> {
        if let Some((symbol, value)) = raw.iter().find(|(_, v)| !v.is_finite() || **v < 0.0) {
            return Err(CoreError::InvalidInput(
                format!("raw weight of {symbol}"),
                format!("{value} is negative or not finite"),
            ));
        }
        let total: f64 = raw.values().sum();
        if total <= 0.0 {
            return Err(CoreError::Calculation(
                "raw weights sum to zero; cannot normalize".to_string(),
            ));
        }
        let factor = 1.0 / total;
        let weights = raw
            .iter()
            .map(|(symbol, value)| (symbol.clone(), value * factor))
            .collect();
        Ok((Self { weights }, factor))
    }

    /// One equal share per symbol.
    pub fn equal<'a>(symbols: impl IntoIterator<Item = &'a str>) -> Result<Self, CoreError> {
        let symbols: Vec<&str> = symbols.into_iter().collect();
        if symbols.is_empty() {
            return Err(CoreError::InvalidInput(
                "universe".to_string(),
                "cannot equal-weight an empty universe".to_string(),
            ));
        }
        let share = 1.0 / symbols.len() as f64;
        Ok(Self {
            weights: symbols.into_iter().map(|s| (s.to_string(), share)).collect(),
        })
    }

    /// Accepts an already-normalized mapping after checking the invariant.
    pub fn try_from_map(weights: BTreeMap<String, f64>) -> Result<Self, CoreError> {
        let candidate = Self { weights };
        candidate.validate()?;
        Ok(candidate)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some((symbol, value)) = self.weights.iter().find(|(_, v)| !v.is_finite() || **v < 0.0) {
            return Err(CoreError::InvalidInput(
                format!("target weight of {symbol}"),
                format!("{value} is negative or not finite"),
            ));
        }
        let total = self.sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(CoreError::InvalidInput(
                "target weights".to_string(),
                format!("sum to {total}, expected 1.0"),
            ));
        }
        Ok(())
    }

    /// The weight for `symbol`, zero when the symbol is not allocated.
    pub fn get(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(s, w)| (s.as_str(), *w))
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl TryFrom<BTreeMap<String, f64>> for TargetWeights {
    type Error = CoreError;

    fn try_from(weights: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        Self::try_from_map(weights)
    }
}

impl From<TargetWeights> for BTreeMap<String, f64> {
    fn from(target: TargetWeights) -> Self {
        target.weights
    }
}

/// The audit trail of one weight calculation.
///
/// Created once per `calculate` call and handed back alongside the weights;
/// there are no setters, so a recorded provenance cannot drift from what the
/// calculator actually saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationProvenance {
    calculator: String,
    date: NaiveDate,
    /// Named raw inputs, e.g. `"valuation_percentile" -> { "SPY": 0.83 }`.
    signals: BTreeMap<String, BTreeMap<String, f64>>,
    raw_weights: BTreeMap<String, f64>,
    normalization_factor: f64,
    final_weights: TargetWeights,
}

impl CalculationProvenance {
    pub fn new(
        calculator: impl Into<String>,
        date: NaiveDate,
        signals: BTreeMap<String, BTreeMap<String, f64>>,
        raw_weights: BTreeMap<String, f64>,
        normalization_factor: f64,
        final_weights: TargetWeights,
    ) -> Self {
        Self {
            calculator: calculator.into(),
            date,
            signals,
            raw_weights,
            normalization_factor,
            final_weights,
        }
    }

    pub fn calculator(&self) -> &str {
        &self.calculator
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn signals(&self) -> &BTreeMap<String, BTreeMap<String, f64>> {
        &self.signals
    }

    /// A single named signal, if the calculator recorded it.
    pub fn signal(&self, name: &str) -> Option<&BTreeMap<String, f64>> {
        self.signals.get(name)
    }

    pub fn raw_weights(&self) -> &BTreeMap<String, f64> {
        &self.raw_weights
    }

    pub fn normalization_factor(&self) -> f64 {
        self.normalization_factor
    }

    pub fn final_weights(&self) -> &TargetWeights {
        &self.final_weights
    }
}
