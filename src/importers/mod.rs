// Import module - JSON bundles and CSV ledgers

pub mod csv_ledger;
pub mod json_bundle;

use anyhow::{anyhow, Result};
use std::path::Path;
use tracing::info;

use crate::ledger::Transaction;
use crate::pricing::MarketData;

pub use csv_ledger::parse_csv_ledger;
pub use json_bundle::{parse_json_bundle, parse_market_data, InputBundle};

/// Everything read from disk for one run
#[derive(Debug, Clone, Default)]
pub struct LoadedInput {
    pub transactions: Vec<Transaction>,
    pub market: MarketData,
}

/// Load a ledger (`.json` bundle or `.csv`) and optional separate market data.
///
/// Series from `market_data` replace same-named series from a bundle.
pub fn load_input<P: AsRef<Path>>(path: P, market_data: Option<&Path>) -> Result<LoadedInput> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| anyhow!("File has no extension"))?
        .to_lowercase();

    info!("Importing ledger: {:?} (type: {})", path, extension);

    let (transactions, mut market) = match extension.as_str() {
        "json" => parse_json_bundle(path)?.into_parts(),
        "csv" => (parse_csv_ledger(path)?, MarketData::default()),
        _ => {
            return Err(anyhow!(
                "Unsupported file format: {}. Supported formats: .json, .csv",
                extension
            ))
        }
    };

    if let Some(market_path) = market_data {
        let extra = parse_market_data(market_path)?;
        market.prices.extend(extra.prices);
        market.fx.extend(extra.fx);
    }

    Ok(LoadedInput {
        transactions,
        market,
    })
}
