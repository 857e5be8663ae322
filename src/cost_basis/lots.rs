use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;

use super::CostBasisMethod;

/// An open acquisition: quantity still held and what one unit cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lot {
    pub acquired_at: DateTime<Utc>,
    pub remaining_qty: Decimal,
    pub unit_cost: Decimal,
}

impl Lot {
    pub fn cost(&self) -> Decimal {
        self.remaining_qty * self.unit_cost
    }
}

/// Open lots of one asset, oldest first, consumed according to `method`
#[derive(Debug, Clone)]
pub struct LotBook {
    method: CostBasisMethod,
    lots: VecDeque<Lot>,
}

impl LotBook {
    pub fn new(method: CostBasisMethod) -> Self {
        Self {
            method,
            lots: VecDeque::new(),
        }
    }

    pub fn add(&mut self, acquired_at: DateTime<Utc>, qty: Decimal, unit_cost: Decimal) {
        if qty <= Decimal::ZERO {
            return;
        }
        self.lots.push_back(Lot {
            acquired_at,
            remaining_qty: qty,
            unit_cost,
        });
    }

    /// Remove up to `qty` units and return how many were actually consumed.
    /// Anything beyond the open quantity is left to the caller to report.
    pub fn consume(&mut self, qty: Decimal) -> Decimal {
        if qty <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let open = self.open_quantity();
        if qty >= open {
            self.lots.clear();
            return open;
        }

        match self.method {
            CostBasisMethod::WeightedAverage => {
                let keep = Decimal::ONE - qty / open;
                for lot in self.lots.iter_mut() {
                    lot.remaining_qty *= keep;
                }
                self.lots.retain(|lot| lot.remaining_qty > Decimal::ZERO);
            }
            CostBasisMethod::Fifo | CostBasisMethod::Lifo => {
                let mut left = qty;
                while left > Decimal::ZERO {
                    let lot = match self.method {
                        CostBasisMethod::Fifo => self.lots.front_mut(),
                        _ => self.lots.back_mut(),
                    };
                    let Some(lot) = lot else { break };

                    if lot.remaining_qty <= left {
                        left -= lot.remaining_qty;
                        match self.method {
                            CostBasisMethod::Fifo => self.lots.pop_front(),
                            _ => self.lots.pop_back(),
                        };
                    } else {
                        lot.remaining_qty -= left;
                        left = Decimal::ZERO;
                    }
                }
            }
        }
        qty
    }

    pub fn open_quantity(&self) -> Decimal {
        self.lots.iter().map(|lot| lot.remaining_qty).sum()
    }

    pub fn total_cost(&self) -> Decimal {
        self.lots.iter().map(Lot::cost).sum()
    }

    /// Σ(qty × unit_cost) / Σ(qty), 0 for an empty book
    pub fn average_unit_cost(&self) -> Decimal {
        let open = self.open_quantity();
        if open > Decimal::ZERO {
            self.total_cost() / open
        } else {
            Decimal::ZERO
        }
    }

    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    pub fn into_lots(self) -> Vec<Lot> {
        self.lots.into()
    }
}
