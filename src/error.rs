//! Error handling for the accounting engine
//!
//! Only structural ledger violations are fatal and get a typed error here.
//! Everything that degrades gracefully (missing prices, FX gaps, over-disposals)
//! goes through [`crate::anomaly::AnomalyLog`] instead.

use thiserror::Error;

/// Fatal errors that abort an accounting run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("malformed transaction #{index}{}: {reason}", id_suffix(.id))]
    MalformedTransaction {
        /// Position of the record in the caller's input (0-based)
        index: usize,
        id: Option<String>,
        reason: String,
    },
}

fn id_suffix(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" ({})", id),
        None => String::new(),
    }
}

/// Result type alias for engine operations
pub type Result<T> = anyhow::Result<T>;
