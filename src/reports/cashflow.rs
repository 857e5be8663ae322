use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::anomaly::{Anomaly, AnomalyLog, MissingSpans};
use crate::ledger::{AssetId, Transaction, TransactionKind};
use crate::pricing::{AssetClass, PricingContext, ValueSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDirection {
    /// Fiat spent buying into the portfolio
    In,
    /// Proceeds of a sale leaving the portfolio
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CashFlowEvent {
    pub date: NaiveDate,
    pub direction: FlowDirection,
    /// Amount in the series' settlement currency
    pub value: Decimal,
    /// Label of the transaction the flow came from
    pub transaction: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CashFlowSummary {
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub net_flow: Decimal,
    pub flow_count: usize,
}

/// Cumulative contributed cash in one settlement currency
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CashFlowSeries {
    pub currency: AssetId,
    pub events: Vec<CashFlowEvent>,
    /// End-of-day contributed cash, one entry per day with qualifying events
    pub checkpoints: BTreeMap<NaiveDate, Decimal>,
}

impl CashFlowSeries {
    /// Contributed cash as of `date`: the latest checkpoint on or before it, else 0
    pub fn cash_in_on(&self, date: NaiveDate) -> Decimal {
        self.checkpoints
            .range(..=date)
            .next_back()
            .map(|(_, v)| *v)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn summary(&self) -> CashFlowSummary {
        let mut total_in = Decimal::ZERO;
        let mut total_out = Decimal::ZERO;
        for event in &self.events {
            match event.direction {
                FlowDirection::In => total_in += event.value,
                FlowDirection::Out => total_out += event.value,
            }
        }
        CashFlowSummary {
            total_in,
            total_out,
            net_flow: total_in - total_out,
            flow_count: self.events.len(),
        }
    }
}

/// Build the contributed-cash curve of `settlement` from the ledger.
///
/// Buys paid in fiat add their value; each sell shrinks the contributed cash
/// by the fraction of the portfolio it took out. The pre-sale portfolio value
/// is reconstructed from `values` (end-of-day) by undoing the day's events in
/// processing order: sells first, then buys, input order within each group.
pub fn track_cash_flow(
    events: &[Transaction],
    settlement: &AssetId,
    ctx: PricingContext<'_>,
    values: &ValueSeries,
    log: &mut AnomalyLog,
) -> CashFlowSeries {
    let Some(last_day) = values.points.keys().next_back().copied() else {
        return CashFlowSeries {
            currency: settlement.clone(),
            ..Default::default()
        };
    };

    let mut missing_fx = MissingSpans::default();
    let mut by_day: BTreeMap<NaiveDate, Vec<CashFlowEvent>> = BTreeMap::new();

    for tx in events.iter().filter(|tx| tx.day() <= last_day) {
        let Some(direction) = flow_direction(tx, ctx) else {
            continue;
        };
        let value = event_value(tx, direction, settlement, ctx, &mut missing_fx);
        by_day.entry(tx.day()).or_default().push(CashFlowEvent {
            date: tx.day(),
            direction,
            value,
            transaction: tx.label(),
        });
    }
    missing_fx.into_fx_anomalies(log);

    let mut cash_in = Decimal::ZERO;
    let mut checkpoints = BTreeMap::new();
    let mut flows = Vec::new();

    for (day, day_events) in by_day {
        let (sells, buys): (Vec<_>, Vec<_>) = day_events
            .into_iter()
            .partition(|e| e.direction == FlowDirection::Out);
        let ordered: Vec<CashFlowEvent> = sells.into_iter().chain(buys).collect();

        let end_value = values.value_on(day);
        let mut net_from_here: Decimal = ordered.iter().map(signed_effect).sum();

        for event in &ordered {
            match event.direction {
                FlowDirection::In => cash_in += event.value,
                FlowDirection::Out => {
                    let pre_sale = (end_value - net_from_here).max(Decimal::ZERO);
                    if pre_sale.is_zero() {
                        log.push(Anomaly::CashInScalingSkipped {
                            currency: settlement.clone(),
                            date: day,
                            sell_value: event.value,
                            transaction: event.transaction.clone(),
                        });
                    } else {
                        cash_in *= Decimal::ONE - event.value / pre_sale;
                        cash_in = cash_in.max(Decimal::ZERO);
                    }
                }
            }
            net_from_here -= signed_effect(event);
        }

        checkpoints.insert(day, cash_in);
        flows.extend(ordered);
    }

    debug!(
        "{}: {} cash flow events over {} days, contributed {}",
        settlement,
        flows.len(),
        checkpoints.len(),
        cash_in
    );

    CashFlowSeries {
        currency: settlement.clone(),
        events: flows,
        checkpoints,
    }
}

/// What an event did to the portfolio value: buys add, sells remove
fn signed_effect(event: &CashFlowEvent) -> Decimal {
    match event.direction {
        FlowDirection::In => event.value,
        FlowDirection::Out => -event.value,
    }
}

fn flow_direction(tx: &Transaction, ctx: PricingContext<'_>) -> Option<FlowDirection> {
    match tx.kind {
        TransactionKind::Buy => tx
            .asset_disposed
            .as_ref()
            .filter(|asset| ctx.classifier.is_fiat(asset))
            .map(|_| FlowDirection::In),
        TransactionKind::Sell => Some(FlowDirection::Out),
        TransactionKind::Swap
        | TransactionKind::Deposit
        | TransactionKind::Withdrawal
        | TransactionKind::Interest
        | TransactionKind::Airdrop
        | TransactionKind::Loan
        | TransactionKind::Repayment
        | TransactionKind::Loss
        | TransactionKind::Transfer => None,
    }
}

/// Value of a qualifying event in `settlement`; 0 when it cannot be converted.
///
/// A fiat buy counts the cash paid, anything else the acquired leg. A fee is
/// added on top unless it was charged in the acquired asset.
fn event_value(
    tx: &Transaction,
    direction: FlowDirection,
    settlement: &AssetId,
    ctx: PricingContext<'_>,
    missing_fx: &mut MissingSpans,
) -> Decimal {
    let day = tx.day();

    let paid = match (direction, tx.asset_disposed.as_ref()) {
        (FlowDirection::In, Some(fiat)) if tx.disposed_quantity() > Decimal::ZERO => Some(
            convert(fiat, tx.disposed_quantity(), None, settlement, ctx, missing_fx, day),
        ),
        _ => None,
    };

    let mut value = match (paid, tx.asset_acquired.as_ref()) {
        (Some(paid), _) => paid,
        (None, Some(asset)) => convert(
            asset,
            tx.qty_acquired,
            tx.unit_price_acquired,
            settlement,
            ctx,
            missing_fx,
            day,
        ),
        (None, None) => Decimal::ZERO,
    };

    if let (Some(fee_asset), Some(fee_qty)) = (tx.fee_asset.as_ref(), tx.fee_qty) {
        if Some(fee_asset) != tx.asset_acquired.as_ref() && fee_qty > Decimal::ZERO {
            value += convert(
                fee_asset,
                fee_qty,
                tx.fee_value,
                settlement,
                ctx,
                missing_fx,
                day,
            );
        }
    }
    value
}

fn convert(
    asset: &AssetId,
    qty: Decimal,
    unit_price: Option<Decimal>,
    settlement: &AssetId,
    ctx: PricingContext<'_>,
    missing_fx: &mut MissingSpans,
    day: NaiveDate,
) -> Decimal {
    if asset == settlement {
        return qty;
    }
    let Some(rate) = ctx.settlement_rate(settlement, day) else {
        missing_fx.record(settlement, day);
        return Decimal::ZERO;
    };

    let unit = match ctx.classifier.classify(asset) {
        AssetClass::Reference | AssetClass::Fiat => match ctx.fiat_value(asset, day) {
            Some(v) => v,
            None => {
                missing_fx.record(asset, day);
                return Decimal::ZERO;
            }
        },
        AssetClass::Stablecoin => Decimal::ONE,
        AssetClass::Market => unit_price
            .or_else(|| ctx.unit_value(asset, day))
            .unwrap_or(Decimal::ZERO),
    };
    qty * unit * rate
}
