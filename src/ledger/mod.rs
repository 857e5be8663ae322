// Ledger module - transaction model and normalization

pub mod models;
pub mod normalizer;

pub use models::{AssetId, Leg, Legs, Transaction, TransactionKind};
pub use normalizer::normalize_ledger;
