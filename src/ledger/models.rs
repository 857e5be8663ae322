use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an asset or a fiat currency (e.g. `bitcoin`, `fiat_eur`)
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Transaction kind. Direction of each leg is carried by the kind, never by sign.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Buy,
    Sell,
    Swap,
    Deposit,
    Withdrawal,
    Interest,
    Airdrop,
    Loan,
    Repayment,
    Loss,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
            TransactionKind::Swap => "SWAP",
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdrawal => "WITHDRAWAL",
            TransactionKind::Interest => "INTEREST",
            TransactionKind::Airdrop => "AIRDROP",
            TransactionKind::Loan => "LOAN",
            TransactionKind::Repayment => "REPAYMENT",
            TransactionKind::Loss => "LOSS",
            TransactionKind::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "ACHAT" => Ok(TransactionKind::Buy),
            "SELL" | "VENTE" => Ok(TransactionKind::Sell),
            "SWAP" | "TRADE" => Ok(TransactionKind::Swap),
            "DEPOSIT" | "DEPOT" => Ok(TransactionKind::Deposit),
            "WITHDRAWAL" | "RETRAIT" => Ok(TransactionKind::Withdrawal),
            "INTEREST" | "INTERETS" | "STAKING" => Ok(TransactionKind::Interest),
            "AIRDROP" => Ok(TransactionKind::Airdrop),
            "LOAN" | "EMPRUNT" | "BORROW" => Ok(TransactionKind::Loan),
            "REPAYMENT" | "REMBOURSEMENT" | "REPAY" => Ok(TransactionKind::Repayment),
            "LOSS" | "PERTE" => Ok(TransactionKind::Loss),
            "TRANSFER" | "TRANSFERT" => Ok(TransactionKind::Transfer),
            _ => Err(()),
        }
    }
}

/// One ledger record, as supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub date: DateTime<Utc>,
    pub kind: TransactionKind,
    #[serde(default)]
    pub asset_acquired: Option<AssetId>,
    #[serde(default)]
    pub qty_acquired: Decimal,
    /// Reference-currency value of one acquired unit
    #[serde(default)]
    pub unit_price_acquired: Option<Decimal>,
    #[serde(default)]
    pub asset_disposed: Option<AssetId>,
    #[serde(default)]
    pub qty_disposed: Option<Decimal>,
    #[serde(default)]
    pub unit_price_disposed: Option<Decimal>,
    #[serde(default)]
    pub fee_asset: Option<AssetId>,
    #[serde(default)]
    pub fee_qty: Option<Decimal>,
    /// Reference-currency value of one fee unit
    #[serde(default)]
    pub fee_value: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
}

/// A quantity movement of one asset caused by a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg<'a> {
    pub asset: &'a AssetId,
    pub qty: Decimal,
}

/// The quantity effects of a transaction, in application order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Legs<'a> {
    pub acquired: Option<Leg<'a>>,
    pub disposed: Option<Leg<'a>>,
    pub fee: Option<Leg<'a>>,
}

impl Transaction {
    /// Minimal constructor; the remaining fields are filled with builder methods.
    pub fn new(date: DateTime<Utc>, kind: TransactionKind) -> Self {
        Self {
            id: None,
            date,
            kind,
            asset_acquired: None,
            qty_acquired: Decimal::ZERO,
            unit_price_acquired: None,
            asset_disposed: None,
            qty_disposed: None,
            unit_price_disposed: None,
            fee_asset: None,
            fee_qty: None,
            fee_value: None,
            wallet: None,
        }
    }

    pub fn acquire(mut self, asset: impl Into<AssetId>, qty: Decimal) -> Self {
        self.asset_acquired = Some(asset.into());
        self.qty_acquired = qty;
        self
    }

    pub fn at_price(mut self, unit_price: Decimal) -> Self {
        self.unit_price_acquired = Some(unit_price);
        self
    }

    pub fn dispose(mut self, asset: impl Into<AssetId>, qty: Decimal) -> Self {
        self.asset_disposed = Some(asset.into());
        self.qty_disposed = Some(qty);
        self
    }

    pub fn disposed_at_price(mut self, unit_price: Decimal) -> Self {
        self.unit_price_disposed = Some(unit_price);
        self
    }

    pub fn with_fee(mut self, asset: impl Into<AssetId>, qty: Decimal) -> Self {
        self.fee_asset = Some(asset.into());
        self.fee_qty = Some(qty);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Calendar day of the transaction (UTC midnight-normalized)
    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }

    /// Disposed quantity, derived from the price ratio when not given explicitly
    pub fn disposed_quantity(&self) -> Decimal {
        if let Some(qty) = self.qty_disposed {
            return qty;
        }
        match (self.unit_price_acquired, self.unit_price_disposed) {
            (Some(acquired), Some(disposed)) if !disposed.is_zero() => {
                self.qty_acquired * acquired / disposed
            }
            _ => Decimal::ZERO,
        }
    }

    /// Quantity effects of this transaction according to its kind
    pub fn legs(&self) -> Legs<'_> {
        let acquired = self.asset_acquired.as_ref().map(|asset| Leg {
            asset,
            qty: self.qty_acquired,
        });
        let disposed = self.asset_disposed.as_ref().map(|asset| Leg {
            asset,
            qty: self.disposed_quantity(),
        });
        let fee = match (&self.fee_asset, self.fee_qty) {
            (Some(asset), Some(qty)) if !qty.is_zero() => Some(Leg { asset, qty }),
            _ => None,
        };

        match self.kind {
            TransactionKind::Buy | TransactionKind::Sell | TransactionKind::Swap => Legs {
                acquired,
                disposed,
                fee,
            },
            TransactionKind::Deposit
            | TransactionKind::Interest
            | TransactionKind::Airdrop
            | TransactionKind::Loan => Legs {
                acquired,
                disposed: None,
                fee,
            },
            TransactionKind::Withdrawal | TransactionKind::Loss | TransactionKind::Repayment => {
                let outflow = match &self.asset_disposed {
                    Some(asset) => Some(Leg {
                        asset,
                        qty: self.qty_disposed.unwrap_or(self.qty_acquired),
                    }),
                    None => acquired,
                };
                Legs {
                    acquired: None,
                    disposed: outflow,
                    fee,
                }
            }
            TransactionKind::Transfer => Legs {
                acquired: None,
                disposed: None,
                fee,
            },
        }
    }

    /// Every asset this transaction mentions, including the fee asset
    pub fn touched_assets(&self) -> impl Iterator<Item = &AssetId> {
        self.asset_acquired
            .iter()
            .chain(self.asset_disposed.iter())
            .chain(self.fee_asset.iter())
    }

    /// Short label used in logs and anomaly reports
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("{} {} ({})", self.kind, self.date.format("%Y-%m-%d %H:%M"), id),
            None => format!("{} {}", self.kind, self.date.format("%Y-%m-%d %H:%M")),
        }
    }
}
