//! Output formatting module for CLI display
//!
//! Keeps presentation apart from the engine: every function takes a computed
//! report and returns the text to print.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use colored::Colorize;
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    builder::Builder,
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::anomaly::Anomaly;
use crate::ledger::AssetId;
use crate::reports::{CurrencyValuation, PositionsReport};
use crate::timeline::QuantityTimeline;
use crate::utils::{currency_code, format_amount, format_decimal, format_percent};

pub fn format_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("JSON serialization failed")
}

fn colored_signed(text: String, value: Decimal) -> String {
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

fn tail_slice<T>(items: &[T], tail: usize) -> &[T] {
    if tail == 0 || items.len() <= tail {
        items
    } else {
        &items[items.len() - tail..]
    }
}

/// Valuation records of one currency, most recent `tail` days
pub fn format_valuation_table(valuation: &CurrencyValuation, tail: usize) -> String {
    let mut output = String::new();
    let code = currency_code(&valuation.currency);
    output.push_str(&format!(
        "\n{} Portfolio value in {}\n\n",
        "📈".cyan().bold(),
        code
    ));

    #[derive(Tabled)]
    struct ValuationRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Cash In")]
        cash_in: String,
        #[tabled(rename = "P&L")]
        pnl: String,
        #[tabled(rename = "Performance")]
        performance: String,
    }

    let rows: Vec<ValuationRow> = tail_slice(&valuation.records, tail)
        .iter()
        .map(|r| ValuationRow {
            date: r.date.to_string(),
            value: format_decimal(r.total_value),
            cash_in: format_decimal(r.cumulative_cash_in),
            pnl: colored_signed(format_decimal(r.pnl()), r.pnl()),
            performance: colored_signed(
                format_percent(r.performance_percent),
                r.performance_percent,
            ),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    output.push_str(&table.to_string());

    let summary = &valuation.cash_flow;
    output.push_str(&format!(
        "\n{:<16} {}   {:<16} {}   ({} flows)\n",
        "Total bought:".bold(),
        format_amount(summary.total_in, &valuation.currency),
        "Total sold:".bold(),
        format_amount(summary.total_out, &valuation.currency),
        summary.flow_count
    ));
    output
}

pub fn format_positions_table(report: &PositionsReport, reference: &AssetId) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "\n{} Open positions as of {} ({})\n\n",
        "📊".cyan().bold(),
        report.as_of,
        report.method
    ));

    #[derive(Tabled)]
    struct PositionRow {
        #[tabled(rename = "Asset")]
        asset: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Avg Cost")]
        avg_cost: String,
        #[tabled(rename = "Total Cost")]
        total_cost: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "P&L")]
        pnl: String,
        #[tabled(rename = "Return %")]
        return_pct: String,
    }

    let not_available = || "N/A".to_string();
    let rows: Vec<PositionRow> = report
        .positions
        .iter()
        .map(|p| PositionRow {
            asset: p.asset.to_string(),
            quantity: p.open_quantity.normalize().to_string(),
            avg_cost: format_decimal(p.average_unit_cost),
            total_cost: format_decimal(p.total_cost),
            price: p.last_price.map(format_decimal).unwrap_or_else(not_available),
            value: p.market_value.map(format_decimal).unwrap_or_else(not_available),
            pnl: p
                .unrealized_pnl
                .map(|pnl| colored_signed(format_decimal(pnl), pnl))
                .unwrap_or_else(not_available),
            return_pct: p
                .pnl_percent
                .map(|pct| colored_signed(format_percent(pct), pct))
                .unwrap_or_else(not_available),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    output.push_str(&table.to_string());

    output.push_str(&format!("\n\n{} Summary", "━".repeat(80).bright_black()));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total Cost:".bold(),
        format_amount(report.total_cost, reference)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total Value:".bold(),
        format_amount(report.total_value, reference)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total P&L:".bold(),
        colored_signed(format_amount(report.total_pnl, reference), report.total_pnl)
    ));
    output.push_str(&format!(
        "\n{:<20} {}\n",
        "Total Return:".bold(),
        colored_signed(
            format_percent(report.total_pnl_percent),
            report.total_pnl_percent
        )
    ));
    output
}

/// Date × asset quantity grid, optionally restricted to one asset
pub fn format_timeline_table(
    timeline: &QuantityTimeline,
    asset: Option<&AssetId>,
    tail: usize,
) -> String {
    let assets: Vec<&AssetId> = timeline
        .assets()
        .filter(|a| asset.map_or(true, |wanted| *a == wanted))
        .collect();

    let mut builder = Builder::default();
    builder.push_record(
        std::iter::once("Date".to_string()).chain(assets.iter().map(|a| a.to_string())),
    );
    let dates: &[NaiveDate] = tail_slice(timeline.dates(), tail);
    for date in dates {
        builder.push_record(
            std::iter::once(date.to_string()).chain(
                assets
                    .iter()
                    .map(|a| timeline.quantity(*date, a).normalize().to_string()),
            ),
        );
    }

    let mut table = builder.build();
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    format!("\n{}\n", table)
}

/// Warnings block printed after a table; empty when there is nothing to report
pub fn format_anomalies(anomalies: &[Anomaly]) -> String {
    if anomalies.is_empty() {
        return String::new();
    }
    let lines = anomalies
        .iter()
        .map(|a| format!("  {} {}", "•".yellow(), a))
        .join("\n");
    format!(
        "\n{} {} data issue(s):\n{}\n",
        "⚠".yellow().bold(),
        anomalies.len(),
        lines
    )
}

pub fn format_check_ok(count: usize, first: Option<NaiveDate>, last: Option<NaiveDate>) -> String {
    let range = match (first, last) {
        (Some(first), Some(last)) => format!(" from {} to {}", first, last),
        _ => String::new(),
    };
    format!(
        "{} Ledger OK: {} transactions{}\n",
        "✓".green().bold(),
        count,
        range
    )
}

/// Message shown when a ledger has nothing to value
pub fn format_empty_ledger() -> String {
    format!(
        "{} No transactions found\nProvide a ledger: {} value <ledger.json>\n",
        "ℹ".blue().bold(),
        "folio".bold()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::{CashFlowSummary, ValuationRecord};
    use rust_decimal_macros::dec;

    fn no_color() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_empty_ledger_message() {
        let msg = format_empty_ledger();
        assert!(msg.contains("No transactions found"));
        assert!(msg.contains("value"));
    }

    #[test]
    fn test_valuation_table_tail() {
        no_color();
        let records = (1..=5)
            .map(|d| ValuationRecord {
                date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
                total_value: dec!(110),
                cumulative_cash_in: dec!(100),
                performance_percent: dec!(0.1),
            })
            .collect();
        let valuation = CurrencyValuation {
            currency: AssetId::from("fiat_usd"),
            records,
            cash_flow: CashFlowSummary::default(),
        };
        let text = format_valuation_table(&valuation, 2);
        assert!(text.contains("USD"));
        assert!(text.contains("2024-01-05"));
        assert!(text.contains("2024-01-04"));
        assert!(!text.contains("2024-01-03"));
        assert!(text.contains("+10.00%"));
    }

    #[test]
    fn test_anomalies_block() {
        no_color();
        assert!(format_anomalies(&[]).is_empty());
        let text = format_anomalies(&[Anomaly::OverDisposal {
            asset: AssetId::from("bitcoin"),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            requested: dec!(2),
            available: dec!(1),
            transaction: "SELL 2024-01-02 12:00 (tx-9)".to_string(),
        }]);
        assert!(text.contains("1 data issue(s)"));
        assert!(text.contains("bitcoin"));
        assert!(text.contains("tx-9"));
    }

    #[test]
    fn test_check_message() {
        no_color();
        let msg = format_check_ok(
            3,
            NaiveDate::from_ymd_opt(2024, 1, 1),
            NaiveDate::from_ymd_opt(2024, 2, 1),
        );
        assert!(msg.contains("3 transactions from 2024-01-01 to 2024-02-01"));
    }
}
