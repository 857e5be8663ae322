use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::cashflow::CashFlowSeries;
use crate::pricing::ValueSeries;

/// One day of a settlement currency's valuation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValuationRecord {
    pub date: NaiveDate,
    pub total_value: Decimal,
    pub cumulative_cash_in: Decimal,
    /// `total_value / cumulative_cash_in - 1` as a fraction; 0 when nothing was contributed
    pub performance_percent: Decimal,
}

impl ValuationRecord {
    /// Gain over contributed cash, in currency units
    pub fn pnl(&self) -> Decimal {
        self.total_value - self.cumulative_cash_in
    }
}

pub fn performance_percent(total_value: Decimal, cash_in: Decimal) -> Decimal {
    if cash_in.is_zero() {
        Decimal::ZERO
    } else {
        total_value / cash_in - Decimal::ONE
    }
}

/// Join daily values with the contributed-cash checkpoints (carried forward,
/// 0 before the first one) into one record per day.
pub fn aggregate(values: &ValueSeries, cash_in: &CashFlowSeries) -> Vec<ValuationRecord> {
    values
        .iter()
        .map(|(date, total_value)| {
            let cumulative_cash_in = cash_in.cash_in_on(date);
            ValuationRecord {
                date,
                total_value,
                cumulative_cash_in,
                performance_percent: performance_percent(total_value, cumulative_cash_in),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AssetId;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn inputs() -> (ValueSeries, CashFlowSeries) {
        let values = ValueSeries {
            currency: AssetId::from("fiat_usd"),
            points: [
                (day(1), dec!(0)),
                (day(2), dec!(100)),
                (day(3), dec!(120)),
                (day(4), dec!(90)),
            ]
            .into_iter()
            .collect(),
            asset_values: BTreeMap::new(),
        };
        let cash = CashFlowSeries {
            currency: AssetId::from("fiat_usd"),
            events: Vec::new(),
            checkpoints: [(day(2), dec!(100))].into_iter().collect(),
        };
        (values, cash)
    }

    #[test]
    fn test_aggregate_forward_fills_cash_in() {
        let (values, cash) = inputs();
        let records = aggregate(&values, &cash);

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].cumulative_cash_in, Decimal::ZERO);
        assert_eq!(records[0].performance_percent, Decimal::ZERO);
        assert_eq!(records[2].cumulative_cash_in, dec!(100));
        assert_eq!(records[2].performance_percent, dec!(0.2));
        assert_eq!(records[3].performance_percent, dec!(-0.1));
        assert_eq!(records[3].pnl(), dec!(-10));
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let (values, cash) = inputs();
        assert_eq!(aggregate(&values, &cash), aggregate(&values, &cash));
    }

    #[test]
    fn test_performance_with_zero_cash_in_is_zero() {
        assert_eq!(performance_percent(dec!(500), Decimal::ZERO), Decimal::ZERO);
    }
}
