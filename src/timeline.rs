//! Daily held-quantity reconstruction
//!
//! Replays the normalized ledger once, keeping a running net quantity per
//! asset, and snapshots every asset at the end of every calendar day from the
//! first transaction day to the caller-supplied `as_of` day. Days without
//! events inherit the previous day's quantities.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::anomaly::{Anomaly, AnomalyLog, MissingSpans};
use crate::ledger::{AssetId, Transaction};
use crate::pricing::AssetClassifier;
use crate::utils::days_between;

/// Dense (date × asset) matrix of end-of-day quantities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuantityTimeline {
    dates: Vec<NaiveDate>,
    quantities: BTreeMap<AssetId, Vec<Decimal>>,
}

impl QuantityTimeline {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetId> {
        self.quantities.keys()
    }

    /// Daily quantities of one asset, aligned with [`Self::dates`]
    pub fn series(&self, asset: &AssetId) -> Option<&[Decimal]> {
        self.quantities.get(asset).map(Vec::as_slice)
    }

    fn index_of(&self, date: NaiveDate) -> Option<usize> {
        let start = self.start()?;
        let offset = usize::try_from((date - start).num_days()).ok()?;
        (offset < self.dates.len()).then_some(offset)
    }

    /// Held quantity on `date`; zero outside the timeline or for unknown assets
    pub fn quantity(&self, date: NaiveDate, asset: &AssetId) -> Decimal {
        match (self.index_of(date), self.quantities.get(asset)) {
            (Some(idx), Some(series)) => series[idx],
            _ => Decimal::ZERO,
        }
    }

    /// All (date, asset, quantity) cells, date-major
    pub fn cells(&self) -> impl Iterator<Item = (NaiveDate, &AssetId, Decimal)> + '_ {
        self.dates.iter().enumerate().flat_map(move |(idx, date)| {
            self.quantities
                .iter()
                .map(move |(asset, series)| (*date, asset, series[idx]))
        })
    }

    /// Re-express the timeline over `[start, end]`. Days after the original end
    /// carry its last quantities forward; days before the original start hold 0.
    pub fn reindex(&self, start: NaiveDate, end: NaiveDate) -> QuantityTimeline {
        let dates = days_between(start, end);
        let quantities = self
            .quantities
            .iter()
            .map(|(asset, series)| {
                let values = dates
                    .iter()
                    .map(|date| match self.index_of(*date) {
                        Some(idx) => series[idx],
                        None if self.end().is_some_and(|end| *date > end) => {
                            series.last().copied().unwrap_or(Decimal::ZERO)
                        }
                        None => Decimal::ZERO,
                    })
                    .collect();
                (asset.clone(), values)
            })
            .collect();
        QuantityTimeline { dates, quantities }
    }
}

/// Build the daily quantity timeline of a normalized ledger up to `as_of`.
///
/// A disposal larger than the running quantity clamps the asset to zero and
/// records an `OverDisposal`. Fiat balances are clamped the same way, but
/// buying with fiat that was never deposited is how external cash enters the
/// ledger, so those clamps fold into one `FiatBalanceClamped` per currency.
pub fn build_quantity_timeline(
    events: &[Transaction],
    as_of: NaiveDate,
    classifier: &AssetClassifier,
    log: &mut AnomalyLog,
) -> QuantityTimeline {
    let start = match events.first() {
        Some(first) if first.day() <= as_of => first.day(),
        _ => return QuantityTimeline::default(),
    };

    let replayed: Vec<&Transaction> = events.iter().take_while(|tx| tx.day() <= as_of).collect();

    let mut running: BTreeMap<AssetId, Decimal> = BTreeMap::new();
    for tx in &replayed {
        for asset in tx.touched_assets() {
            running.entry(asset.clone()).or_insert(Decimal::ZERO);
        }
    }

    let dates = days_between(start, as_of);
    let mut quantities: BTreeMap<AssetId, Vec<Decimal>> = running
        .keys()
        .map(|asset| (asset.clone(), Vec::with_capacity(dates.len())))
        .collect();

    let mut fiat_clamps = MissingSpans::default();
    let mut cursor = 0;
    for date in &dates {
        while let Some(tx) = replayed.get(cursor).filter(|tx| tx.day() == *date) {
            apply_transaction(tx, &mut running, classifier, &mut fiat_clamps, log);
            cursor += 1;
        }
        for (asset, series) in quantities.iter_mut() {
            series.push(running.get(asset).copied().unwrap_or(Decimal::ZERO));
        }
    }
    fiat_clamps.into_fiat_clamp_anomalies(log);

    debug!(
        "Built quantity timeline: {} days x {} assets ({} events replayed)",
        dates.len(),
        quantities.len(),
        cursor
    );

    QuantityTimeline { dates, quantities }
}

fn apply_transaction(
    tx: &Transaction,
    running: &mut BTreeMap<AssetId, Decimal>,
    classifier: &AssetClassifier,
    fiat_clamps: &mut MissingSpans,
    log: &mut AnomalyLog,
) {
    let legs = tx.legs();
    if let Some(leg) = legs.acquired {
        *running.entry(leg.asset.clone()).or_insert(Decimal::ZERO) += leg.qty;
    }
    for leg in [legs.disposed, legs.fee].into_iter().flatten() {
        let held = running.entry(leg.asset.clone()).or_insert(Decimal::ZERO);
        if leg.qty > *held {
            if classifier.is_fiat(leg.asset) {
                fiat_clamps.record(leg.asset, tx.day());
            } else {
                log.push(Anomaly::OverDisposal {
                    asset: leg.asset.clone(),
                    date: tx.day(),
                    requested: leg.qty,
                    available: *held,
                    transaction: tx.label(),
                });
            }
            *held = Decimal::ZERO;
        } else {
            *held -= leg.qty;
        }
    }
}
