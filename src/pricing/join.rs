use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::{AssetClass, PricingContext};
use crate::anomaly::{AnomalyLog, MissingSpans};
use crate::ledger::AssetId;
use crate::timeline::QuantityTimeline;

/// Daily mark-to-market portfolio value in one settlement currency
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValueSeries {
    pub currency: AssetId,
    pub points: BTreeMap<NaiveDate, Decimal>,
    /// Per-asset contribution to each day's value, in the reference currency
    pub asset_values: BTreeMap<AssetId, BTreeMap<NaiveDate, Decimal>>,
}

impl ValueSeries {
    /// Portfolio value on `date`; 0 for days outside the series
    pub fn value_on(&self, date: NaiveDate) -> Decimal {
        self.points.get(&date).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Decimal)> + '_ {
        self.points.iter().map(|(d, v)| (*d, *v))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Value every held asset of `timeline` with its as-of close and convert the
/// daily total into `settlement`.
///
/// Fiat balances are cash and stay out of the total. A held asset without any
/// close on or before a day contributes 0 for that day; a missing settlement
/// rate zeroes the whole day. Both are reported once per asset or currency.
pub fn join_prices(
    timeline: &QuantityTimeline,
    ctx: PricingContext<'_>,
    settlement: &AssetId,
    log: &mut AnomalyLog,
) -> ValueSeries {
    let mut missing_prices = MissingSpans::default();
    let mut missing_fx = MissingSpans::default();

    let priced: Vec<(&AssetId, &[Decimal])> = timeline
        .assets()
        .filter(|asset| !ctx.classifier.is_fiat(asset))
        .filter_map(|asset| timeline.series(asset).map(|series| (asset, series)))
        .collect();

    let mut points = BTreeMap::new();
    let mut asset_values: BTreeMap<AssetId, BTreeMap<NaiveDate, Decimal>> = BTreeMap::new();

    for (idx, date) in timeline.dates().iter().enumerate() {
        let mut total = Decimal::ZERO;
        for (asset, series) in &priced {
            let qty = series[idx];
            if qty <= Decimal::ZERO {
                continue;
            }
            let price = match ctx.classifier.classify(asset) {
                AssetClass::Stablecoin => Some(Decimal::ONE),
                _ => ctx.unit_value(asset, *date),
            };
            let value = match price {
                Some(price) => qty * price,
                None => {
                    missing_prices.record(asset, *date);
                    Decimal::ZERO
                }
            };
            asset_values
                .entry((*asset).clone())
                .or_default()
                .insert(*date, value);
            total += value;
        }

        let converted = match ctx.settlement_rate(settlement, *date) {
            Some(rate) => total * rate,
            None => {
                missing_fx.record(settlement, *date);
                Decimal::ZERO
            }
        };
        points.insert(*date, converted);
    }

    missing_prices.into_price_anomalies(log);
    missing_fx.into_fx_anomalies(log);

    debug!(
        "Joined {} assets over {} days into {}",
        priced.len(),
        points.len(),
        settlement
    );

    ValueSeries {
        currency: settlement.clone(),
        points,
        asset_values,
    }
}
