//! Acquisition cost of open positions
//!
//! Replays one asset's events through a [`LotBook`] under an explicitly chosen
//! [`CostBasisMethod`]. The method is a parameter of every call; nothing here
//! reads shared state.

mod lots;

pub use lots::{Lot, LotBook};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::anomaly::{Anomaly, AnomalyLog};
use crate::ledger::{AssetId, Transaction, TransactionKind};
use crate::pricing::{AssetClass, PricingContext};

/// Order in which open lots are consumed by a disposal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CostBasisMethod {
    /// Every disposal shrinks all lots proportionally
    #[default]
    WeightedAverage,
    Fifo,
    Lifo,
}

impl CostBasisMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostBasisMethod::WeightedAverage => "weighted-average",
            CostBasisMethod::Fifo => "fifo",
            CostBasisMethod::Lifo => "lifo",
        }
    }
}

impl fmt::Display for CostBasisMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CostBasisMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "weighted-average" | "wa" | "average" => Ok(CostBasisMethod::WeightedAverage),
            "fifo" => Ok(CostBasisMethod::Fifo),
            "lifo" => Ok(CostBasisMethod::Lifo),
            other => Err(format!(
                "unknown cost basis method '{}' (expected weighted-average, fifo or lifo)",
                other
            )),
        }
    }
}

/// Open position of one asset after replaying its events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostBasis {
    pub asset: AssetId,
    pub method: CostBasisMethod,
    pub open_quantity: Decimal,
    pub average_unit_cost: Decimal,
    pub total_cost: Decimal,
    pub lots: Vec<Lot>,
}

/// Resolve the open quantity and average unit cost of `asset`.
///
/// `events` must be normalized (date-ordered); events not touching `asset`
/// are skipped. Disposals beyond the open quantity are clamped and reported
/// as `OverDisposal`.
pub fn resolve_cost_basis(
    asset: &AssetId,
    events: &[Transaction],
    method: CostBasisMethod,
    ctx: PricingContext<'_>,
    log: &mut AnomalyLog,
) -> CostBasis {
    let mut book = LotBook::new(method);

    for tx in events {
        let legs = tx.legs();

        if let Some(leg) = legs.acquired.filter(|leg| leg.asset == asset) {
            let unit_cost = acquisition_unit_cost(tx, asset, ctx, log);
            book.add(tx.date, leg.qty, unit_cost);
        }

        for leg in [legs.disposed, legs.fee]
            .into_iter()
            .flatten()
            .filter(|leg| leg.asset == asset)
        {
            let available = book.open_quantity();
            let consumed = book.consume(leg.qty);
            if consumed < leg.qty {
                log.push(Anomaly::OverDisposal {
                    asset: asset.clone(),
                    date: tx.day(),
                    requested: leg.qty,
                    available,
                    transaction: tx.label(),
                });
            }
        }
    }

    let basis = CostBasis {
        asset: asset.clone(),
        method,
        open_quantity: book.open_quantity(),
        average_unit_cost: book.average_unit_cost(),
        total_cost: book.total_cost(),
        lots: book.into_lots(),
    };
    debug!(
        "{} ({}): open {} @ {}",
        asset, method, basis.open_quantity, basis.average_unit_cost
    );
    basis
}

/// Resolve every asset touched by `events`
pub fn resolve_all(
    events: &[Transaction],
    method: CostBasisMethod,
    ctx: PricingContext<'_>,
    log: &mut AnomalyLog,
) -> BTreeMap<AssetId, CostBasis> {
    let assets: BTreeSet<&AssetId> = events.iter().flat_map(Transaction::touched_assets).collect();
    assets
        .into_iter()
        .map(|asset| {
            (
                asset.clone(),
                resolve_cost_basis(asset, events, method, ctx, log),
            )
        })
        .collect()
}

/// Reference-currency cost of one unit acquired by `tx`
fn acquisition_unit_cost(
    tx: &Transaction,
    asset: &AssetId,
    ctx: PricingContext<'_>,
    log: &mut AnomalyLog,
) -> Decimal {
    if tx.kind == TransactionKind::Interest {
        return Decimal::ZERO;
    }

    let day = tx.day();
    match ctx.classifier.classify(asset) {
        AssetClass::Reference => Decimal::ONE,
        AssetClass::Fiat => ctx.fiat_value(asset, day).unwrap_or_else(|| {
            log.push(Anomaly::FxRateUnavailable {
                currency: asset.clone(),
                first_date: day,
                last_date: day,
                days: 1,
            });
            Decimal::ZERO
        }),
        AssetClass::Stablecoin | AssetClass::Market => tx
            .unit_price_acquired
            .or_else(|| cost_from_disposed_leg(tx, ctx))
            .or_else(|| ctx.unit_value(asset, day))
            .unwrap_or_else(|| {
                log.push(Anomaly::PriceUnavailable {
                    asset: asset.clone(),
                    first_date: day,
                    last_date: day,
                    days: 1,
                    transaction: Some(tx.label()),
                });
                Decimal::ZERO
            }),
    }
}

/// What was given up, spread over the units received
fn cost_from_disposed_leg(tx: &Transaction, ctx: PricingContext<'_>) -> Option<Decimal> {
    let disposed = tx.asset_disposed.as_ref()?;
    let qty_disposed = tx.disposed_quantity();
    if tx.qty_acquired <= Decimal::ZERO || qty_disposed <= Decimal::ZERO {
        return None;
    }
    let unit = tx
        .unit_price_disposed
        .or_else(|| ctx.unit_value(disposed, tx.day()))?;
    Some(unit * qty_disposed / tx.qty_acquired)
}
