// Reports module - accounting run orchestration and report builders

pub mod cashflow;
pub mod positions;
pub mod valuation;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::anomaly::{Anomaly, AnomalyLog};
use crate::config::EngineConfig;
use crate::ledger::{normalize_ledger, AssetId, Transaction};
use crate::pricing::{join_prices, AssetClassifier, MarketData, PricingContext};
use crate::timeline::{build_quantity_timeline, QuantityTimeline};

pub use cashflow::{track_cash_flow, CashFlowEvent, CashFlowSeries, CashFlowSummary, FlowDirection};
pub use positions::{calculate_positions, PositionSummary, PositionsReport};
pub use valuation::{aggregate, ValuationRecord};

/// Valuation of one settlement currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyValuation {
    pub currency: AssetId,
    pub records: Vec<ValuationRecord>,
    pub cash_flow: CashFlowSummary,
}

impl CurrencyValuation {
    pub fn latest(&self) -> Option<&ValuationRecord> {
        self.records.last()
    }
}

/// Everything one accounting run produces
#[derive(Debug, Clone, Serialize)]
pub struct AccountingReport {
    pub as_of: NaiveDate,
    pub transaction_count: usize,
    pub valuations: BTreeMap<AssetId, CurrencyValuation>,
    pub positions: PositionsReport,
    #[serde(skip)]
    pub timeline: QuantityTimeline,
    pub anomalies: Vec<Anomaly>,
    /// blake3 of the serialized valuations; equal inputs give equal fingerprints
    pub fingerprint: String,
}

/// Run the whole pipeline: normalize, replay quantities, then per settlement
/// currency join prices, track contributed cash and aggregate; finally value
/// the open positions under the configured method.
///
/// Only a malformed ledger fails the run. Data gaps end up in `anomalies`.
pub fn run_accounting(
    transactions: Vec<Transaction>,
    market: &MarketData,
    config: &EngineConfig,
    as_of: NaiveDate,
) -> Result<AccountingReport> {
    let events = normalize_ledger(transactions)?;
    let classifier = AssetClassifier::from_config(config);
    let ctx = PricingContext::new(market, &classifier);
    let mut log = AnomalyLog::new();

    let timeline = build_quantity_timeline(&events, as_of, &classifier, &mut log);

    let mut valuations = BTreeMap::new();
    for currency in config.settlement_currencies() {
        let values = join_prices(&timeline, ctx, &currency, &mut log);
        let cash_in = track_cash_flow(&events, &currency, ctx, &values, &mut log);
        let records = aggregate(&values, &cash_in);
        valuations.insert(
            currency.clone(),
            CurrencyValuation {
                currency,
                records,
                cash_flow: cash_in.summary(),
            },
        );
    }

    let positions = calculate_positions(&events, as_of, config.method, ctx, &mut log);

    let serialized =
        serde_json::to_vec(&valuations).context("Failed to serialize valuation output")?;
    let fingerprint = blake3::hash(&serialized).to_hex().to_string();

    info!(
        "Accounting run as of {}: {} transactions, {} currencies, {} positions, {} anomalies",
        as_of,
        events.len(),
        valuations.len(),
        positions.positions.len(),
        log.len()
    );

    Ok(AccountingReport {
        as_of,
        transaction_count: events.len(),
        valuations,
        positions,
        timeline,
        anomalies: log.into_vec(),
        fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::ledger::TransactionKind;
    use crate::pricing::PriceSeries;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    fn ledger() -> Vec<Transaction> {
        vec![
            Transaction::new(
                Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap(),
                TransactionKind::Buy,
            )
            .acquire("bitcoin", dec!(2))
            .dispose("fiat_usd", dec!(100)),
        ]
    }

    fn market() -> MarketData {
        MarketData::new()
            .with_prices(
                "bitcoin",
                PriceSeries::new(vec![(day(1), dec!(50)), (day(3), dec!(60))]),
            )
            .with_fx("fiat_eur", PriceSeries::new(vec![(day(1), dec!(1.25))]))
    }

    #[test]
    fn test_run_produces_one_series_per_currency() {
        let report = run_accounting(ledger(), &market(), &EngineConfig::default(), day(3)).unwrap();

        assert_eq!(report.valuations.len(), 2);
        let usd = &report.valuations[&AssetId::from("fiat_usd")];
        assert_eq!(usd.records.len(), 3);
        let last = usd.latest().unwrap();
        assert_eq!(last.total_value, dec!(120));
        assert_eq!(last.cumulative_cash_in, dec!(100));
        assert_eq!(last.performance_percent, dec!(0.2));

        let eur = &report.valuations[&AssetId::from("fiat_eur")];
        assert_eq!(eur.latest().unwrap().total_value, dec!(96));
        assert_eq!(eur.latest().unwrap().cumulative_cash_in, dec!(80));

        assert_eq!(report.positions.positions.len(), 1);
        // The fiat paid was never deposited
        assert!(report
            .anomalies
            .iter()
            .all(|a| a.code() == "FIAT_BALANCE_CLAMPED"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let config = EngineConfig::default();
        let a = run_accounting(ledger(), &market(), &config, day(3)).unwrap();
        let b = run_accounting(ledger(), &market(), &config, day(3)).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn test_malformed_ledger_aborts() {
        let bad = vec![Transaction::new(
            Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap(),
            TransactionKind::Deposit,
        )];
        let err = run_accounting(bad, &market(), &EngineConfig::default(), day(3)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::MalformedTransaction { index: 0, .. })
        ));
    }
}
