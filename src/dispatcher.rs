//! Command dispatcher that routes parsed clap Commands to their handlers.
//!
//! Each handler loads the ledger, runs the engine and prints either a table or
//! JSON. Nothing here computes; the numbers come from `reports`.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::anomaly::{Anomaly, AnomalyLog};
use crate::cli::formatters;
use crate::cli::{Commands, InputArgs};
use crate::config::EngineConfig;
use crate::cost_basis::CostBasisMethod;
use crate::importers::{load_input, LoadedInput};
use crate::ledger::{normalize_ledger, AssetId};
use crate::pricing::{AssetClassifier, PricingContext};
use crate::reports::{calculate_positions, run_accounting, CurrencyValuation};
use crate::timeline::build_quantity_timeline;

/// Route a parsed command to its handler
pub fn dispatch_command(
    command: Commands,
    json_output: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = EngineConfig::load(config_path)?;
    match command {
        Commands::Value {
            input,
            currency,
            tail,
        } => dispatch_value(&input, &currency, tail, &config, json_output),
        Commands::Positions { input, method } => {
            dispatch_positions(&input, method.as_deref(), &config, json_output)
        }
        Commands::Timeline { input, asset, tail } => {
            dispatch_timeline(&input, asset.as_deref(), tail, &config, json_output)
        }
        Commands::Check { input } => dispatch_check(&input, json_output),
    }
}

/// Last day of the run: `--as-of` when given, otherwise the latest date seen
/// in either the ledger or the market data.
fn resolve_as_of(args: &InputArgs, input: &LoadedInput) -> Result<Option<NaiveDate>> {
    if let Some(raw) = &args.as_of {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("Invalid --as-of date '{}' (expected YYYY-MM-DD)", raw))?;
        return Ok(Some(date));
    }
    let last_trade = input.transactions.iter().map(|tx| tx.day()).max();
    Ok(last_trade.max(input.market.last_date()).filter(|_| last_trade.is_some()))
}

fn load(args: &InputArgs) -> Result<(LoadedInput, Option<NaiveDate>)> {
    let input = load_input(&args.input, args.market_data.as_deref())?;
    let as_of = resolve_as_of(args, &input)?;
    Ok((input, as_of))
}

#[derive(Serialize)]
struct ValueOutput<'a> {
    as_of: NaiveDate,
    transaction_count: usize,
    valuations: Vec<&'a CurrencyValuation>,
    anomalies: &'a [Anomaly],
    fingerprint: &'a str,
}

fn dispatch_value(
    args: &InputArgs,
    currencies: &[String],
    tail: usize,
    config: &EngineConfig,
    json_output: bool,
) -> Result<()> {
    let (input, as_of) = load(args)?;
    let Some(as_of) = as_of else {
        if !json_output {
            print!("{}", formatters::format_empty_ledger());
        }
        return Ok(());
    };

    let report = run_accounting(input.transactions, &input.market, config, as_of)?;

    let wanted: Vec<AssetId> = currencies.iter().map(|c| AssetId::from(c.as_str())).collect();
    for currency in &wanted {
        if !report.valuations.contains_key(currency) {
            return Err(anyhow!(
                "Currency {} is not a configured settlement currency ({})",
                currency,
                report
                    .valuations
                    .keys()
                    .map(AssetId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    }
    let selected: Vec<&CurrencyValuation> = report
        .valuations
        .values()
        .filter(|v| wanted.is_empty() || wanted.contains(&v.currency))
        .collect();

    if json_output {
        let output = ValueOutput {
            as_of: report.as_of,
            transaction_count: report.transaction_count,
            valuations: selected,
            anomalies: &report.anomalies,
            fingerprint: &report.fingerprint,
        };
        println!("{}", formatters::format_json(&output)?);
        return Ok(());
    }

    for valuation in selected {
        print!("{}", formatters::format_valuation_table(valuation, tail));
    }
    print!("{}", formatters::format_anomalies(&report.anomalies));
    Ok(())
}

fn dispatch_positions(
    args: &InputArgs,
    method: Option<&str>,
    config: &EngineConfig,
    json_output: bool,
) -> Result<()> {
    let method = match method {
        Some(raw) => raw.parse::<CostBasisMethod>().map_err(|e| anyhow!(e))?,
        None => config.method,
    };

    let (input, as_of) = load(args)?;
    let Some(as_of) = as_of else {
        if !json_output {
            print!("{}", formatters::format_empty_ledger());
        }
        return Ok(());
    };

    info!("Calculating positions as of {} ({})", as_of, method);
    let events = normalize_ledger(input.transactions)?;
    let classifier = AssetClassifier::from_config(config);
    let ctx = PricingContext::new(&input.market, &classifier);
    let mut log = AnomalyLog::new();
    let report = calculate_positions(&events, as_of, method, ctx, &mut log);

    if json_output {
        #[derive(Serialize)]
        struct PositionsOutput<'a> {
            #[serde(flatten)]
            report: &'a crate::reports::PositionsReport,
            anomalies: &'a AnomalyLog,
        }
        let output = PositionsOutput {
            report: &report,
            anomalies: &log,
        };
        println!("{}", formatters::format_json(&output)?);
        return Ok(());
    }

    print!(
        "{}",
        formatters::format_positions_table(&report, &config.reference_currency)
    );
    print!("{}", formatters::format_anomalies(&log.into_vec()));
    Ok(())
}

fn dispatch_timeline(
    args: &InputArgs,
    asset: Option<&str>,
    tail: usize,
    config: &EngineConfig,
    json_output: bool,
) -> Result<()> {
    let (input, as_of) = load(args)?;
    let Some(as_of) = as_of else {
        if !json_output {
            print!("{}", formatters::format_empty_ledger());
        }
        return Ok(());
    };

    let events = normalize_ledger(input.transactions)?;
    let classifier = AssetClassifier::from_config(config);
    let mut log = AnomalyLog::new();
    let timeline = build_quantity_timeline(&events, as_of, &classifier, &mut log);

    let asset = asset.map(AssetId::from);
    if let Some(wanted) = &asset {
        if timeline.series(wanted).is_none() {
            return Err(anyhow!("Asset {} never appears in the ledger", wanted));
        }
    }

    if json_output {
        let quantities: BTreeMap<String, BTreeMap<&AssetId, _>> = timeline
            .dates()
            .iter()
            .map(|date| {
                let row = timeline
                    .assets()
                    .filter(|a| asset.as_ref().map_or(true, |wanted| *a == wanted))
                    .map(|a| (a, timeline.quantity(*date, a)))
                    .collect();
                (date.to_string(), row)
            })
            .collect();
        println!("{}", formatters::format_json(&quantities)?);
        return Ok(());
    }

    print!(
        "{}",
        formatters::format_timeline_table(&timeline, asset.as_ref(), tail)
    );
    print!("{}", formatters::format_anomalies(&log.into_vec()));
    Ok(())
}

fn dispatch_check(args: &InputArgs, json_output: bool) -> Result<()> {
    let input = load_input(&args.input, args.market_data.as_deref())?;
    let events = normalize_ledger(input.transactions)?;
    let first = events.first().map(|tx| tx.day());
    let last = events.last().map(|tx| tx.day());

    if json_output {
        let output = serde_json::json!({
            "ok": true,
            "transactions": events.len(),
            "first_date": first,
            "last_date": last,
            "price_series": input.market.prices.len(),
            "fx_series": input.market.fx.len(),
        });
        println!("{}", formatters::format_json(&output)?);
        return Ok(());
    }

    print!("{}", formatters::format_check_ok(events.len(), first, last));
    Ok(())
}
