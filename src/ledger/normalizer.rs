//! Ledger normalization
//!
//! Validates raw records and orders them into the canonical event stream every
//! other component replays. Ties on identical timestamps keep input order.

use rust_decimal::Decimal;
use tracing::debug;

use super::models::Transaction;
use crate::error::LedgerError;

/// Validate and sort a ledger by date, keeping input order for equal instants.
///
/// Fails on the first structurally invalid record: a ledger with a broken row
/// cannot be valued without corrupting every downstream number.
pub fn normalize_ledger(transactions: Vec<Transaction>) -> Result<Vec<Transaction>, LedgerError> {
    for (index, tx) in transactions.iter().enumerate() {
        validate_transaction(index, tx)?;
    }

    let mut ordered = transactions;
    // `sort_by_key` is stable, which gives the input-order tie-break for free
    ordered.sort_by_key(|tx| tx.date);

    debug!("Normalized ledger of {} transactions", ordered.len());
    Ok(ordered)
}

fn validate_transaction(index: usize, tx: &Transaction) -> Result<(), LedgerError> {
    let malformed = |reason: String| LedgerError::MalformedTransaction {
        index,
        id: tx.id.clone(),
        reason,
    };

    if tx.asset_acquired.is_none() && tx.asset_disposed.is_none() {
        return Err(malformed(
            "neither an acquired nor a disposed asset is set".to_string(),
        ));
    }

    let quantities = [
        ("qty_acquired", Some(tx.qty_acquired)),
        ("qty_disposed", tx.qty_disposed),
        ("fee_qty", tx.fee_qty),
        ("unit_price_acquired", tx.unit_price_acquired),
        ("unit_price_disposed", tx.unit_price_disposed),
        ("fee_value", tx.fee_value),
    ];
    for (field, value) in quantities {
        if let Some(v) = value {
            if v < Decimal::ZERO {
                return Err(malformed(format!("negative {}: {}", field, v)));
            }
        }
    }

    if tx.fee_qty.is_some_and(|q| !q.is_zero()) && tx.fee_asset.is_none() {
        return Err(malformed("fee_qty set without fee_asset".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::TransactionKind;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn buy(day: u32, hour: u32, id: &str) -> Transaction {
        Transaction::new(
            Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
            TransactionKind::Buy,
        )
        .acquire("bitcoin", dec!(1))
        .dispose("fiat_usd", dec!(100))
        .with_id(id)
    }

    #[test]
    fn test_sorts_by_instant() {
        let ledger = vec![buy(5, 10, "c"), buy(1, 9, "a"), buy(3, 8, "b")];
        let ordered = normalize_ledger(ledger).unwrap();
        let ids: Vec<_> = ordered.iter().map(|t| t.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let ledger = vec![buy(2, 10, "first"), buy(1, 10, "early"), buy(2, 10, "second")];
        let ordered = normalize_ledger(ledger).unwrap();
        let ids: Vec<_> = ordered.iter().map(|t| t.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["early", "first", "second"]);
    }

    #[test]
    fn test_rejects_record_without_assets() {
        let tx = Transaction::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            TransactionKind::Transfer,
        );
        let err = normalize_ledger(vec![buy(1, 1, "ok"), tx]).unwrap_err();
        match err {
            LedgerError::MalformedTransaction { index, .. } => assert_eq!(index, 1),
        }
    }

    #[test]
    fn test_rejects_negative_quantity() {
        let mut tx = buy(1, 1, "neg");
        tx.qty_acquired = dec!(-1);
        let err = normalize_ledger(vec![tx]).unwrap_err();
        assert!(err.to_string().contains("negative qty_acquired"));
        assert!(err.to_string().contains("(neg)"));
    }

    #[test]
    fn test_rejects_negative_fee() {
        let tx = buy(1, 1, "fee").with_fee("bitcoin", dec!(-0.1));
        assert!(normalize_ledger(vec![tx]).is_err());
    }

    #[test]
    fn test_empty_ledger_is_valid() {
        assert!(normalize_ledger(Vec::new()).unwrap().is_empty());
    }
}
