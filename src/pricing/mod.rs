// Pricing module - materialized price/FX series and as-of lookups

pub mod classify;
pub mod join;
pub mod series;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ledger::AssetId;

pub use classify::{AssetClass, AssetClassifier};
pub use join::{join_prices, ValueSeries};
pub use series::{PricePoint, PriceSeries};

/// Every external series a run needs, fetched before the engine is invoked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketData {
    /// Asset id -> daily closes in the reference currency
    #[serde(default)]
    pub prices: BTreeMap<AssetId, PriceSeries>,
    /// Fiat id -> reference-currency value of one unit of that fiat
    #[serde(default)]
    pub fx: BTreeMap<AssetId, PriceSeries>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(mut self, asset: impl Into<AssetId>, series: PriceSeries) -> Self {
        self.prices.insert(asset.into(), series);
        self
    }

    pub fn with_fx(mut self, currency: impl Into<AssetId>, series: PriceSeries) -> Self {
        self.fx.insert(currency.into(), series);
        self
    }

    /// Latest date present in any series
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.prices
            .values()
            .chain(self.fx.values())
            .filter_map(PriceSeries::last_date)
            .max()
    }
}

/// Read-only pricing view shared by the resolver, the join and the cash-flow tracker
#[derive(Debug, Clone, Copy)]
pub struct PricingContext<'a> {
    pub market: &'a MarketData,
    pub classifier: &'a AssetClassifier,
}

impl<'a> PricingContext<'a> {
    pub fn new(market: &'a MarketData, classifier: &'a AssetClassifier) -> Self {
        Self { market, classifier }
    }

    /// Reference-currency value of one unit of a fiat currency on `date`.
    /// A zero rate is as useless as a missing one and is treated the same.
    pub fn fiat_value(&self, currency: &AssetId, date: NaiveDate) -> Option<Decimal> {
        if currency == self.classifier.reference() {
            return Some(Decimal::ONE);
        }
        self.market
            .fx
            .get(currency)
            .and_then(|series| series.price_as_of(date))
            .filter(|rate| !rate.is_zero())
    }

    /// Factor turning a reference-currency amount into `settlement` on `date`
    pub fn settlement_rate(&self, settlement: &AssetId, date: NaiveDate) -> Option<Decimal> {
        self.fiat_value(settlement, date).map(|v| Decimal::ONE / v)
    }

    /// Reference-currency value of one unit of any asset on `date`
    pub fn unit_value(&self, asset: &AssetId, date: NaiveDate) -> Option<Decimal> {
        match self.classifier.classify(asset) {
            AssetClass::Reference | AssetClass::Fiat => self.fiat_value(asset, date),
            AssetClass::Stablecoin => Some(Decimal::ONE),
            AssetClass::Market => self
                .market
                .prices
                .get(asset)
                .and_then(|series| series.price_as_of(date)),
        }
    }
}
