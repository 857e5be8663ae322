use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "folio")]
#[command(
    version,
    about = "Portfolio accounting: cost basis, daily valuation and contributed cash"
)]
#[command(
    long_about = "Replay a ledger of crypto and fiat transactions against historical prices to get daily portfolio value, contributed cash and performance per settlement currency, plus cost basis of open positions (weighted-average, FIFO or LIFO)."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Engine configuration file (TOML)
    #[arg(long = "config", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Ledger and market data shared by every command
#[derive(clap::Args, Debug, Clone)]
pub struct InputArgs {
    /// Ledger: a .json bundle {transactions, prices, fx} or a .csv ledger
    pub input: PathBuf,

    /// JSON file with `prices` and `fx` series (needed with a .csv ledger)
    #[arg(long = "market-data", value_name = "FILE")]
    pub market_data: Option<PathBuf>,

    /// Last day to compute (YYYY-MM-DD); defaults to the last date in the input
    #[arg(long = "as-of", value_name = "DATE")]
    pub as_of: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Daily portfolio value, contributed cash and performance
    Value {
        #[command(flatten)]
        input: InputArgs,

        /// Settlement currency to show (repeatable); defaults to all configured
        #[arg(long = "currency", value_name = "ID")]
        currency: Vec<String>,

        /// Number of most recent days shown in table mode (0 = all)
        #[arg(long, default_value_t = 10)]
        tail: usize,
    },

    /// Open positions with cost basis and unrealized P&L
    Positions {
        #[command(flatten)]
        input: InputArgs,

        /// Cost basis method: weighted-average, fifo or lifo (overrides config)
        #[arg(long)]
        method: Option<String>,
    },

    /// Daily held quantities
    Timeline {
        #[command(flatten)]
        input: InputArgs,

        /// Only show this asset
        #[arg(long)]
        asset: Option<String>,

        /// Number of most recent days shown in table mode (0 = all)
        #[arg(long, default_value_t = 10)]
        tail: usize,
    },

    /// Validate the ledger without valuing it
    Check {
        #[command(flatten)]
        input: InputArgs,
    },
}
