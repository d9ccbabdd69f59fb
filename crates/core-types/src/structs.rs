use crate::enums::{AssetClass, OrderSide};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tradable instrument and its semantic class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub class: AssetClass,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, class: AssetClass) -> Self {
        Self {
            symbol: symbol.into(),
            class,
        }
    }
}

/// The set of assets known to a run, in configuration order.
///
/// Used both as the calculators' universe and as the attribution engine's
/// filter for structurally foreign columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRegistry {
    assets: Vec<Asset>,
}

impl AssetRegistry {
    /// Builds a registry, keeping the first occurrence of any duplicated symbol.
    pub fn new(assets: Vec<Asset>) -> Self {
        let mut unique: Vec<Asset> = Vec::with_capacity(assets.len());
        for asset in assets {
            if !unique.iter().any(|a| a.symbol == asset.symbol) {
                unique.push(asset);
            }
        }
        Self { assets: unique }
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(|a| a.symbol.as_str())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.assets.iter().any(|a| a.symbol == symbol)
    }

    pub fn class_of(&self, symbol: &str) -> Option<AssetClass> {
        self.assets
            .iter()
            .find(|a| a.symbol == symbol)
            .map(|a| a.class)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// A fill receipt produced by the broker for a single instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub execution_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub date: NaiveDate,
}

/// A long holding in a single asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub last_updated: NaiveDate,
}
