use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::ledger::{AssetId, Transaction, TransactionKind};

/// Parse a CSV ledger file.
///
/// Columns are matched by header name; both the English names
/// (`asset_acquired`, `qty_acquired`, ...) and the legacy export names
/// (`actif_a_id`, `qty_a`, ...) are recognised. A row that fails to parse
/// aborts the import with its row number.
pub fn parse_csv_ledger<P: AsRef<Path>>(file_path: P) -> Result<Vec<Transaction>> {
    let path = file_path.as_ref();
    info!("Parsing CSV ledger: {:?}", path);

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV ledger {}", path.display()))?;
    parse_csv_reader(file)
}

pub fn parse_csv_reader<R: Read>(input: R) -> Result<Vec<Transaction>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();
    debug!("CSV headers: {:?}", headers);

    let mapping = find_columns(&headers)?;
    debug!("Column mapping: {:?}", mapping);

    let mut transactions = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // Header is row 1
        let row_num = idx + 2;
        let record = result.with_context(|| format!("Failed to read CSV row {}", row_num))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let tx = parse_csv_row(&record, &mapping)
            .with_context(|| format!("Invalid ledger row {}", row_num))?;
        transactions.push(tx);
    }

    info!("Parsed {} transactions from CSV ledger", transactions.len());
    Ok(transactions)
}

#[derive(Debug, Default)]
struct CsvColumnMapping {
    date: usize,
    kind: usize,
    asset_acquired: Option<usize>,
    qty_acquired: Option<usize>,
    unit_price_acquired: Option<usize>,
    asset_disposed: Option<usize>,
    qty_disposed: Option<usize>,
    /// Exchange ratio: disposed units per acquired unit
    price: Option<usize>,
    unit_price_disposed: Option<usize>,
    fee_asset: Option<usize>,
    fee_qty: Option<usize>,
    fee_value: Option<usize>,
    wallet: Option<usize>,
    id: Option<usize>,
}

fn find_columns(headers: &StringRecord) -> Result<CsvColumnMapping> {
    let mut date_idx = None;
    let mut kind_idx = None;
    let mut mapping = CsvColumnMapping::default();

    for (idx, header) in headers.iter().enumerate() {
        let slot = match header.trim().to_lowercase().as_str() {
            "date" | "datetime" => {
                date_idx = Some(idx);
                continue;
            }
            "kind" | "type" => {
                kind_idx = Some(idx);
                continue;
            }
            "asset_acquired" | "actif_a_id" | "actif_a" => &mut mapping.asset_acquired,
            "qty_acquired" | "qty_a" => &mut mapping.qty_acquired,
            "unit_price_acquired" | "value_a" => &mut mapping.unit_price_acquired,
            "asset_disposed" | "actif_v_id" | "actif_v" => &mut mapping.asset_disposed,
            "qty_disposed" | "qty_v" => &mut mapping.qty_disposed,
            "price" => &mut mapping.price,
            "unit_price_disposed" | "value_v" => &mut mapping.unit_price_disposed,
            "fee_asset" | "actif_f_id" | "actif_f" => &mut mapping.fee_asset,
            "fee_qty" | "qty_f" => &mut mapping.fee_qty,
            "fee_value" | "value_f" => &mut mapping.fee_value,
            "wallet" | "destination" => &mut mapping.wallet,
            "id" => &mut mapping.id,
            _ => continue,
        };
        *slot = Some(idx);
    }

    mapping.date = date_idx.ok_or_else(|| anyhow!("Date column not found"))?;
    mapping.kind = kind_idx.ok_or_else(|| anyhow!("Transaction type column not found"))?;
    if mapping.asset_acquired.is_none() && mapping.asset_disposed.is_none() {
        return Err(anyhow!("No asset column found (asset_acquired or asset_disposed)"));
    }
    Ok(mapping)
}

fn cell(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| record.get(i)).filter(|s| !s.is_empty())
}

fn decimal_cell(record: &StringRecord, idx: Option<usize>, column: &str) -> Result<Option<Decimal>> {
    cell(record, idx)
        .map(|s| parse_csv_decimal(s).with_context(|| format!("Invalid {} '{}'", column, s)))
        .transpose()
}

fn parse_csv_row(record: &StringRecord, mapping: &CsvColumnMapping) -> Result<Transaction> {
    let date_str = cell(record, Some(mapping.date)).ok_or_else(|| anyhow!("Missing date"))?;
    let date = parse_csv_date(date_str)?;

    let kind_str = cell(record, Some(mapping.kind)).ok_or_else(|| anyhow!("Missing type"))?;
    let kind = TransactionKind::from_str(kind_str)
        .map_err(|_| anyhow!("Unknown transaction type '{}'", kind_str))?;

    let qty_acquired =
        decimal_cell(record, mapping.qty_acquired, "qty_acquired")?.unwrap_or(Decimal::ZERO);
    let ratio = decimal_cell(record, mapping.price, "price")?;
    let qty_disposed = decimal_cell(record, mapping.qty_disposed, "qty_disposed")?
        .or_else(|| ratio.map(|r| qty_acquired * r));

    Ok(Transaction {
        id: cell(record, mapping.id).map(str::to_string),
        date,
        kind,
        asset_acquired: cell(record, mapping.asset_acquired).map(AssetId::from),
        qty_acquired,
        unit_price_acquired: decimal_cell(
            record,
            mapping.unit_price_acquired,
            "unit_price_acquired",
        )?,
        asset_disposed: cell(record, mapping.asset_disposed).map(AssetId::from),
        qty_disposed,
        unit_price_disposed: decimal_cell(
            record,
            mapping.unit_price_disposed,
            "unit_price_disposed",
        )?,
        fee_asset: cell(record, mapping.fee_asset).map(AssetId::from),
        fee_qty: decimal_cell(record, mapping.fee_qty, "fee_qty")?,
        fee_value: decimal_cell(record, mapping.fee_value, "fee_value")?,
        wallet: cell(record, mapping.wallet).map(str::to_string),
    })
}

fn parse_csv_date(date_str: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Legacy day-first format goes first: "%Y" would happily read "05" as a year
    for format in [
        "%d-%m-%y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(date_str, format) {
            return Ok(naive.and_utc());
        }
    }
    for format in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(date_str, format) {
            return Ok(date.and_time(NaiveTime::MIN).and_utc());
        }
    }
    Err(anyhow!("Could not parse date: {}", date_str))
}

fn parse_csv_decimal(text: &str) -> Result<Decimal> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace() && *c != '_').collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .context("Failed to parse decimal")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_csv_decimal() {
        assert_eq!(parse_csv_decimal("1234.56").unwrap(), dec!(1234.56));
        assert_eq!(parse_csv_decimal(" 1 000.5 ").unwrap(), dec!(1000.5));
        assert_eq!(parse_csv_decimal("1e-8").unwrap(), dec!(0.00000001));
        assert!(parse_csv_decimal("abc").is_err());
    }

    #[test]
    fn test_parse_csv_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        for input in [
            "2024-03-05T10:30:00Z",
            "2024-03-05 10:30:00",
            "05-03-24 10:30:00",
            "2024-03-05",
        ] {
            assert_eq!(parse_csv_date(input).unwrap().date_naive(), expected, "{}", input);
        }
        assert!(parse_csv_date("March 5th").is_err());
    }

    #[test]
    fn test_parse_english_headers() {
        let csv = "\
date,kind,asset_acquired,qty_acquired,asset_disposed,qty_disposed,fee_asset,fee_qty,id
2024-01-02 09:00:00,buy,bitcoin,0.5,fiat_usd,20000,binancecoin,0.01,t1
2024-01-03 09:00:00,deposit,ethereum,2,,,,,t2
";
        let txs = parse_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].kind, TransactionKind::Buy);
        assert_eq!(txs[0].qty_disposed, Some(dec!(20000)));
        assert_eq!(txs[0].fee_qty, Some(dec!(0.01)));
        assert_eq!(txs[0].id.as_deref(), Some("t1"));
        assert_eq!(txs[1].asset_disposed, None);
        assert_eq!(txs[1].fee_asset, None);
    }

    #[test]
    fn test_parse_legacy_headers_with_price_ratio() {
        let csv = "\
date,type,actif_a_id,qty_a,actif_v_id,price,destination
02-01-24 09:00:00,Achat,ethereum,2,bitcoin,0.05,ledger
";
        let txs = parse_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(txs[0].kind, TransactionKind::Buy);
        assert_eq!(txs[0].asset_acquired, Some(AssetId::from("ethereum")));
        assert_eq!(txs[0].qty_disposed, Some(dec!(0.1)));
        assert_eq!(txs[0].wallet.as_deref(), Some("ledger"));
    }

    #[test]
    fn test_bad_row_reports_row_number() {
        let csv = "\
date,kind,asset_acquired,qty_acquired
2024-01-02,deposit,bitcoin,1
2024-01-03,deposit,bitcoin,lots
";
        let err = parse_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("row 3"));
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let csv = "date,kind,asset_acquired,qty_acquired\n2024-01-02,gift,bitcoin,1\n";
        let err = parse_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("Unknown transaction type 'gift'"));
    }

    #[test]
    fn test_missing_date_column() {
        let csv = "kind,asset_acquired\nbuy,bitcoin\n";
        assert!(parse_csv_reader(csv.as_bytes()).is_err());
    }
}
