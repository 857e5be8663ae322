use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::ledger::{AssetId, Transaction};
use crate::pricing::{MarketData, PriceSeries};

/// Self-contained run input: the ledger plus the series needed to value it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputBundle {
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub prices: BTreeMap<AssetId, PriceSeries>,
    #[serde(default)]
    pub fx: BTreeMap<AssetId, PriceSeries>,
}

impl InputBundle {
    pub fn into_parts(self) -> (Vec<Transaction>, MarketData) {
        (
            self.transactions,
            MarketData {
                prices: self.prices,
                fx: self.fx,
            },
        )
    }
}

pub fn parse_json_bundle<P: AsRef<Path>>(file_path: P) -> Result<InputBundle> {
    let path = file_path.as_ref();
    info!("Parsing JSON bundle: {:?}", path);
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let bundle: InputBundle = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid JSON bundle {}", path.display()))?;
    info!(
        "Loaded {} transactions, {} price series, {} fx series",
        bundle.transactions.len(),
        bundle.prices.len(),
        bundle.fx.len()
    );
    Ok(bundle)
}

/// Market data file holding only `prices` and `fx`
pub fn parse_market_data<P: AsRef<Path>>(file_path: P) -> Result<MarketData> {
    let path = file_path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid market data file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TransactionKind;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bundle_deserializes() {
        let json = r#"{
            "transactions": [
                {"date": "2024-01-01T10:00:00Z", "kind": "buy",
                 "asset_acquired": "bitcoin", "qty_acquired": "1",
                 "asset_disposed": "fiat_usd", "qty_disposed": "40000"}
            ],
            "prices": {"bitcoin": [{"date": "2024-01-01", "close": "40000"}]}
        }"#;
        let bundle: InputBundle = serde_json::from_str(json).unwrap();
        let (transactions, market) = bundle.into_parts();

        assert_eq!(transactions[0].kind, TransactionKind::Buy);
        assert_eq!(transactions[0].qty_disposed, Some(dec!(40000)));
        assert!(market.fx.is_empty());
        assert_eq!(
            market.prices[&AssetId::from("bitcoin")]
                .price_as_of(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
            Some(dec!(40000))
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let json = r#"{"transactions": [{"date": "2024-01-01T10:00:00Z", "kind": "gift"}]}"#;
        assert!(serde_json::from_str::<InputBundle>(json).is_err());
    }
}
