use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::anomaly::AnomalyLog;
use crate::cost_basis::{resolve_cost_basis, CostBasisMethod};
use crate::ledger::{AssetId, Transaction};
use crate::pricing::PricingContext;

/// Open position of one asset, valued in the reference currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionSummary {
    pub asset: AssetId,
    pub open_quantity: Decimal,
    pub average_unit_cost: Decimal,
    pub total_cost: Decimal,
    pub last_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    /// Fraction of total cost; absent for zero-cost positions
    pub pnl_percent: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionsReport {
    pub as_of: NaiveDate,
    pub method: CostBasisMethod,
    pub positions: Vec<PositionSummary>,
    pub total_cost: Decimal,
    pub total_value: Decimal,
    pub total_pnl: Decimal,
    pub total_pnl_percent: Decimal,
}

impl PositionsReport {
    /// Share of the portfolio value held in each position, positions without a price excluded
    pub fn allocation(&self) -> Vec<(&AssetId, Decimal)> {
        if self.total_value <= Decimal::ZERO {
            return Vec::new();
        }
        self.positions
            .iter()
            .filter_map(|p| p.market_value.map(|v| (&p.asset, v / self.total_value)))
            .collect()
    }
}

/// Cost basis and market value of every non-fiat asset still held on `as_of`
pub fn calculate_positions(
    events: &[Transaction],
    as_of: NaiveDate,
    method: CostBasisMethod,
    ctx: PricingContext<'_>,
    log: &mut AnomalyLog,
) -> PositionsReport {
    let replayed: Vec<Transaction> = events
        .iter()
        .take_while(|tx| tx.day() <= as_of)
        .cloned()
        .collect();

    let assets: BTreeSet<&AssetId> = replayed
        .iter()
        .flat_map(Transaction::touched_assets)
        .filter(|asset| !ctx.classifier.is_fiat(asset))
        .collect();

    let mut positions = Vec::new();
    let mut total_cost = Decimal::ZERO;
    let mut total_value = Decimal::ZERO;

    for asset in assets {
        let basis = resolve_cost_basis(asset, &replayed, method, ctx, log);
        if basis.open_quantity <= Decimal::ZERO {
            continue;
        }

        let last_price = ctx.unit_value(asset, as_of);
        let market_value = last_price.map(|price| price * basis.open_quantity);
        let unrealized_pnl = market_value.map(|value| value - basis.total_cost);
        let pnl_percent = unrealized_pnl
            .filter(|_| basis.total_cost > Decimal::ZERO)
            .map(|pnl| pnl / basis.total_cost);

        total_cost += basis.total_cost;
        if let Some(value) = market_value {
            total_value += value;
        }

        positions.push(PositionSummary {
            asset: basis.asset,
            open_quantity: basis.open_quantity,
            average_unit_cost: basis.average_unit_cost,
            total_cost: basis.total_cost,
            last_price,
            market_value,
            unrealized_pnl,
            pnl_percent,
        });
    }

    // Largest positions first
    positions.sort_by(|a, b| {
        let a_val = a.market_value.unwrap_or(a.total_cost);
        let b_val = b.market_value.unwrap_or(b.total_cost);
        b_val.cmp(&a_val).then_with(|| a.asset.cmp(&b.asset))
    });

    let total_pnl = total_value - total_cost;
    let total_pnl_percent = if total_cost > Decimal::ZERO {
        total_pnl / total_cost
    } else {
        Decimal::ZERO
    };

    PositionsReport {
        as_of,
        method,
        positions,
        total_cost,
        total_value,
        total_pnl,
        total_pnl_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TransactionKind;
    use crate::pricing::{AssetClassifier, MarketData, PriceSeries};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    fn buy(d: u32, asset: &str, qty: Decimal, paid: Decimal) -> Transaction {
        Transaction::new(
            Utc.with_ymd_and_hms(2024, 8, d, 12, 0, 0).unwrap(),
            TransactionKind::Buy,
        )
        .acquire(asset, qty)
        .dispose("fiat_usd", paid)
    }

    #[test]
    fn test_positions_value_and_pnl() {
        let events = vec![
            buy(1, "bitcoin", dec!(1), dec!(100)),
            buy(2, "ethereum", dec!(10), dec!(50)),
            buy(3, "tether", dec!(20), dec!(20)),
        ];
        let market = MarketData::new()
            .with_prices("bitcoin", PriceSeries::new(vec![(day(1), dec!(150))]))
            .with_prices("ethereum", PriceSeries::new(vec![(day(1), dec!(4))]));
        let classifier = AssetClassifier::new("fiat_usd".into(), "fiat_", vec!["tether".into()]);
        let mut log = AnomalyLog::new();
        let report = calculate_positions(
            &events,
            day(5),
            CostBasisMethod::Fifo,
            PricingContext::new(&market, &classifier),
            &mut log,
        );

        let assets: Vec<&str> = report.positions.iter().map(|p| p.asset.as_str()).collect();
        assert_eq!(assets, vec!["bitcoin", "ethereum", "tether"]);

        let btc = &report.positions[0];
        assert_eq!(btc.market_value, Some(dec!(150)));
        assert_eq!(btc.unrealized_pnl, Some(dec!(50)));
        assert_eq!(btc.pnl_percent, Some(dec!(0.5)));

        let eth = &report.positions[1];
        assert_eq!(eth.average_unit_cost, dec!(5));
        assert_eq!(eth.unrealized_pnl, Some(dec!(-10)));

        assert_eq!(report.total_cost, dec!(170));
        assert_eq!(report.total_value, dec!(210));
        let weights: Vec<Decimal> = report
            .allocation()
            .iter()
            .map(|(_, w)| w.round_dp(4))
            .collect();
        assert_eq!(weights, vec![dec!(0.7143), dec!(0.1905), dec!(0.0952)]);
    }

    #[test]
    fn test_closed_and_unpriced_positions() {
        let events = vec![
            buy(1, "bitcoin", dec!(1), dec!(100)),
            Transaction::new(
                Utc.with_ymd_and_hms(2024, 8, 2, 12, 0, 0).unwrap(),
                TransactionKind::Sell,
            )
            .acquire("fiat_usd", dec!(120))
            .dispose("bitcoin", dec!(1)),
            buy(3, "obscure-token", dec!(5), dec!(10)),
        ];
        let market = MarketData::new();
        let classifier = AssetClassifier::new("fiat_usd".into(), "fiat_", Vec::new());
        let mut log = AnomalyLog::new();
        let report = calculate_positions(
            &events,
            day(5),
            CostBasisMethod::WeightedAverage,
            PricingContext::new(&market, &classifier),
            &mut log,
        );

        assert_eq!(report.positions.len(), 1);
        let token = &report.positions[0];
        assert_eq!(token.total_cost, dec!(10));
        assert_eq!(token.market_value, None);
        assert_eq!(token.pnl_percent, None);
    }
}
