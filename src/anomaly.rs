//! Soft-error reporting
//!
//! Conditions that degrade a valuation without invalidating it are collected
//! here instead of being raised, so a single bad price series never aborts a
//! whole run. Every recorded anomaly is also emitted as a `warn!` event.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

use crate::ledger::AssetId;

/// A non-fatal data problem found while computing
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// No price at or before the given days for a held asset; valued at 0
    PriceUnavailable {
        asset: AssetId,
        first_date: NaiveDate,
        last_date: NaiveDate,
        days: usize,
        /// Acquisition that could not be costed, when raised by the resolver
        #[serde(skip_serializing_if = "Option::is_none")]
        transaction: Option<String>,
    },
    /// A disposal exceeded the open quantity; the excess was ignored
    OverDisposal {
        asset: AssetId,
        date: NaiveDate,
        requested: Decimal,
        available: Decimal,
        transaction: String,
    },
    /// Fiat spent beyond the running balance; the balance was held at 0.
    /// One entry per currency covering every such event.
    FiatBalanceClamped {
        currency: AssetId,
        first_date: NaiveDate,
        last_date: NaiveDate,
        events: usize,
    },
    /// No exchange rate for a settlement currency; values counted as 0
    FxRateUnavailable {
        currency: AssetId,
        first_date: NaiveDate,
        last_date: NaiveDate,
        days: usize,
    },
    /// A sale happened while the pre-sale portfolio value was 0, so the
    /// contributed cash could not be scaled down
    CashInScalingSkipped {
        currency: AssetId,
        date: NaiveDate,
        sell_value: Decimal,
        transaction: String,
    },
}

impl Anomaly {
    pub fn code(&self) -> &'static str {
        match self {
            Anomaly::PriceUnavailable { .. } => "PRICE_UNAVAILABLE",
            Anomaly::OverDisposal { .. } => "OVER_DISPOSAL",
            Anomaly::FiatBalanceClamped { .. } => "FIAT_BALANCE_CLAMPED",
            Anomaly::FxRateUnavailable { .. } => "FX_RATE_UNAVAILABLE",
            Anomaly::CashInScalingSkipped { .. } => "CASH_IN_SCALING_SKIPPED",
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::PriceUnavailable {
                asset,
                first_date,
                last_date,
                days,
                transaction,
            } => {
                match transaction {
                    Some(tx) => write!(f, "{}: no price to cost {}", tx, asset)?,
                    None => write!(
                        f,
                        "no price for {} on {} held day(s) between {} and {}",
                        asset, days, first_date, last_date
                    )?,
                }
                f.write_str("; valued at 0")
            }
            Anomaly::OverDisposal {
                asset,
                date,
                requested,
                available,
                transaction,
            } => write!(
                f,
                "{}: disposal of {} {} on {} exceeds open quantity {}; excess ignored",
                transaction, requested, asset, date, available
            ),
            Anomaly::FiatBalanceClamped {
                currency,
                first_date,
                last_date,
                events,
            } => write!(
                f,
                "{} spent beyond its running balance by {} event(s) between {} and {}; balance held at 0",
                currency, events, first_date, last_date
            ),
            Anomaly::FxRateUnavailable {
                currency,
                first_date,
                last_date,
                days,
            } => write!(
                f,
                "no {} rate on {} day(s) between {} and {}; values counted as 0",
                currency, days, first_date, last_date
            ),
            Anomaly::CashInScalingSkipped {
                currency,
                date,
                sell_value,
                transaction,
            } => write!(
                f,
                "{}: sale worth {} {} on {} with zero pre-sale portfolio value; cash-in left unchanged",
                transaction, sell_value, currency, date
            ),
        }
    }
}

/// Ordered collection of anomalies threaded through a run.
///
/// Identical entries are kept once: the timeline and the cost-basis resolver
/// both see the same over-disposal of the same transaction.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct AnomalyLog {
    entries: Vec<Anomaly>,
    #[serde(skip)]
    seen: BTreeSet<Anomaly>,
}

impl AnomalyLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an anomaly unless an identical one is already present
    pub fn push(&mut self, anomaly: Anomaly) {
        if !self.seen.insert(anomaly.clone()) {
            return;
        }
        warn!("{}", anomaly);
        self.entries.push(anomaly);
    }

    pub fn extend(&mut self, other: AnomalyLog) {
        for anomaly in other.entries {
            if self.seen.insert(anomaly.clone()) {
                self.entries.push(anomaly);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anomaly> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Anomaly> {
        self.entries
    }

    /// Count anomalies by code for summary reporting
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        let mut summary = BTreeMap::new();
        for anomaly in &self.entries {
            *summary.entry(anomaly.code()).or_insert(0) += 1;
        }
        summary
    }
}

/// Collapses dated occurrences into one span per key, so a missing series (or
/// a fiat balance overdrawn on every buy) yields one anomaly instead of one per day.
#[derive(Debug, Default)]
pub(crate) struct MissingSpans {
    spans: BTreeMap<AssetId, (NaiveDate, NaiveDate, usize)>,
}

impl MissingSpans {
    pub(crate) fn record(&mut self, key: &AssetId, date: NaiveDate) {
        self.spans
            .entry(key.clone())
            .and_modify(|(first, last, days)| {
                *first = (*first).min(date);
                *last = (*last).max(date);
                *days += 1;
            })
            .or_insert((date, date, 1));
    }

    pub(crate) fn into_price_anomalies(self, log: &mut AnomalyLog) {
        for (asset, (first_date, last_date, days)) in self.spans {
            log.push(Anomaly::PriceUnavailable {
                asset,
                first_date,
                last_date,
                days,
                transaction: None,
            });
        }
    }

    /// One `FiatBalanceClamped` per currency; each recorded date is one clamped event
    pub(crate) fn into_fiat_clamp_anomalies(self, log: &mut AnomalyLog) {
        for (currency, (first_date, last_date, events)) in self.spans {
            log.push(Anomaly::FiatBalanceClamped {
                currency,
                first_date,
                last_date,
                events,
            });
        }
    }

    pub(crate) fn into_fx_anomalies(self, log: &mut AnomalyLog) {
        for (currency, (first_date, last_date, days)) in self.spans {
            log.push(Anomaly::FxRateUnavailable {
                currency,
                first_date,
                last_date,
                days,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn test_summary_counts_by_code() {
        let mut log = AnomalyLog::new();
        log.push(Anomaly::OverDisposal {
            asset: AssetId::from("bitcoin"),
            date: day(1),
            requested: dec!(2),
            available: dec!(1),
            transaction: "SELL 2024-05-01 10:00".to_string(),
        });
        log.push(Anomaly::OverDisposal {
            asset: AssetId::from("ethereum"),
            date: day(2),
            requested: dec!(3),
            available: dec!(0),
            transaction: "SWAP 2024-05-02 10:00".to_string(),
        });
        log.push(Anomaly::CashInScalingSkipped {
            currency: AssetId::from("fiat_usd"),
            date: day(3),
            sell_value: dec!(10),
            transaction: "SELL 2024-05-03 10:00".to_string(),
        });

        let summary = log.summary();
        assert_eq!(summary.get("OVER_DISPOSAL"), Some(&2));
        assert_eq!(summary.get("CASH_IN_SCALING_SKIPPED"), Some(&1));
        assert_eq!(log.len(), 3);
    }

    fn over_disposal(transaction: &str) -> Anomaly {
        Anomaly::OverDisposal {
            asset: AssetId::from("bitcoin"),
            date: day(1),
            requested: dec!(2),
            available: dec!(1),
            transaction: transaction.to_string(),
        }
    }

    #[test]
    fn test_identical_anomalies_are_recorded_once() {
        let mut log = AnomalyLog::new();
        log.push(over_disposal("SELL 2024-05-01 10:00 (a)"));
        log.push(over_disposal("SELL 2024-05-01 10:00 (a)"));

        let mut other = AnomalyLog::new();
        other.push(over_disposal("SELL 2024-05-01 10:00 (a)"));
        log.extend(other);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_same_shortfall_in_two_transactions_is_kept_twice() {
        let mut log = AnomalyLog::new();
        log.push(over_disposal("SELL 2024-05-01 10:00 (a)"));
        log.push(over_disposal("SELL 2024-05-01 10:00 (b)"));
        assert_eq!(log.len(), 2);
        assert_eq!(
            log.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec![
                "SELL 2024-05-01 10:00 (a): disposal of 2 bitcoin on 2024-05-01 exceeds open quantity 1; excess ignored",
                "SELL 2024-05-01 10:00 (b): disposal of 2 bitcoin on 2024-05-01 exceeds open quantity 1; excess ignored",
            ]
        );
    }

    #[test]
    fn test_fiat_clamps_fold_into_one_entry() {
        let eur = AssetId::from("fiat_eur");
        let mut spans = MissingSpans::default();
        spans.record(&eur, day(2));
        spans.record(&eur, day(2));
        spans.record(&eur, day(5));

        let mut log = AnomalyLog::new();
        spans.into_fiat_clamp_anomalies(&mut log);
        assert_eq!(
            log.into_vec(),
            vec![Anomaly::FiatBalanceClamped {
                currency: eur,
                first_date: day(2),
                last_date: day(5),
                events: 3,
            }]
        );
    }

    #[test]
    fn test_missing_spans_collapse_per_asset() {
        let mut spans = MissingSpans::default();
        let btc = AssetId::from("bitcoin");
        spans.record(&btc, day(3));
        spans.record(&btc, day(1));
        spans.record(&btc, day(2));

        let mut log = AnomalyLog::new();
        spans.into_price_anomalies(&mut log);
        let all = log.into_vec();
        assert_eq!(
            all,
            vec![Anomaly::PriceUnavailable {
                asset: btc,
                first_date: day(1),
                last_date: day(3),
                days: 3,
                transaction: None,
            }]
        );
    }

    #[test]
    fn test_anomaly_serializes_with_kind_tag() {
        let anomaly = Anomaly::FxRateUnavailable {
            currency: AssetId::from("fiat_eur"),
            first_date: day(1),
            last_date: day(1),
            days: 1,
        };
        let json = serde_json::to_value(&anomaly).unwrap();
        assert_eq!(json["kind"], "fx_rate_unavailable");
        assert_eq!(json["currency"], "fiat_eur");
    }
}
