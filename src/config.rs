//! Engine configuration
//!
//! Loaded from TOML. Lookup order: explicit path, `$FOLIO_CONFIG`, then
//! `<config dir>/folio/config.toml`; when none exists the defaults apply.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cost_basis::CostBasisMethod;
use crate::ledger::AssetId;

pub const CONFIG_ENV_VAR: &str = "FOLIO_CONFIG";

const DEFAULT_STABLECOINS: &[&str] = &[
    "tether",
    "usd-coin",
    "dai",
    "binance-usd",
    "true-usd",
    "first-digital-usd",
    "ethena-usde",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cost basis method used for positions
    pub method: CostBasisMethod,
    /// Currency every price series is quoted in
    pub reference_currency: AssetId,
    /// Currencies the valuation is produced in
    pub settlement_currencies: Vec<AssetId>,
    /// Asset ids starting with this prefix are fiat currencies
    pub fiat_prefix: String,
    /// Assets valued at exactly one reference unit
    pub stablecoins: Vec<AssetId>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            method: CostBasisMethod::WeightedAverage,
            reference_currency: AssetId::from("fiat_usd"),
            settlement_currencies: vec![AssetId::from("fiat_usd"), AssetId::from("fiat_eur")],
            fiat_prefix: "fiat_".to_string(),
            stablecoins: DEFAULT_STABLECOINS.iter().map(|s| AssetId::from(*s)).collect(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys take their default
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(contents).context("Failed to parse engine configuration")?;
        Ok(config.normalized())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Resolve the configuration for a run. An explicitly requested file must
    /// exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading config from {}", path.display());
            return Self::from_file(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from) {
            info!("Loading config from ${} ({})", CONFIG_ENV_VAR, path.display());
            return Self::from_file(&path);
        }
        match default_config_path() {
            Ok(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            Ok(path) => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                debug!("{}; using defaults", e);
                Ok(Self::default())
            }
        }
    }

    /// The reference currency always gets a valuation series, and each
    /// currency appears once.
    fn normalized(mut self) -> Self {
        if !self.settlement_currencies.contains(&self.reference_currency) {
            self.settlement_currencies
                .insert(0, self.reference_currency.clone());
        }
        let mut seen = Vec::with_capacity(self.settlement_currencies.len());
        self.settlement_currencies.retain(|c| {
            if seen.contains(c) {
                false
            } else {
                seen.push(c.clone());
                true
            }
        });
        self
    }

    /// Settlement currencies after applying the reference-currency rule
    pub fn settlement_currencies(&self) -> Vec<AssetId> {
        self.clone().normalized().settlement_currencies
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dir_spec::config_home)
        .ok_or_else(|| anyhow!("Could not determine config directory"))?;
    Ok(config_dir.join("folio").join("config.toml"))
}
