use std::collections::BTreeSet;

use crate::config::EngineConfig;
use crate::ledger::AssetId;

/// How an asset id is priced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    /// The currency every price series is quoted in
    Reference,
    /// Any other fiat currency, priced through its FX series
    Fiat,
    /// Instrument pegged to the reference currency; always worth 1
    Stablecoin,
    /// Priced from its own market series
    Market,
}

/// Read-only lookup table deciding the class of an asset id
#[derive(Debug, Clone)]
pub struct AssetClassifier {
    reference: AssetId,
    fiat_prefix: String,
    stablecoins: BTreeSet<AssetId>,
}

impl AssetClassifier {
    pub fn new(
        reference: AssetId,
        fiat_prefix: impl Into<String>,
        stablecoins: impl IntoIterator<Item = AssetId>,
    ) -> Self {
        Self {
            reference,
            fiat_prefix: fiat_prefix.into(),
            stablecoins: stablecoins.into_iter().collect(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.reference_currency.clone(),
            config.fiat_prefix.clone(),
            config.stablecoins.iter().cloned(),
        )
    }

    pub fn classify(&self, asset: &AssetId) -> AssetClass {
        if *asset == self.reference {
            AssetClass::Reference
        } else if !self.fiat_prefix.is_empty() && asset.as_str().starts_with(&self.fiat_prefix) {
            AssetClass::Fiat
        } else if self.stablecoins.contains(asset) {
            AssetClass::Stablecoin
        } else {
            AssetClass::Market
        }
    }

    pub fn reference(&self) -> &AssetId {
        &self.reference
    }

    /// Fiat holdings (reference currency included) are cash, not invested assets
    pub fn is_fiat(&self, asset: &AssetId) -> bool {
        matches!(
            self.classify(asset),
            AssetClass::Reference | AssetClass::Fiat
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> AssetClassifier {
        AssetClassifier::new(
            AssetId::from("fiat_usd"),
            "fiat_",
            vec![AssetId::from("tether"), AssetId::from("usd-coin")],
        )
    }

    #[test]
    fn test_classify() {
        let c = classifier();
        assert_eq!(c.classify(&"fiat_usd".into()), AssetClass::Reference);
        assert_eq!(c.classify(&"fiat_eur".into()), AssetClass::Fiat);
        assert_eq!(c.classify(&"tether".into()), AssetClass::Stablecoin);
        assert_eq!(c.classify(&"bitcoin".into()), AssetClass::Market);
    }

    #[test]
    fn test_fiat_includes_reference() {
        let c = classifier();
        assert!(c.is_fiat(&"fiat_usd".into()));
        assert!(c.is_fiat(&"fiat_chf".into()));
        assert!(!c.is_fiat(&"tether".into()));
        assert!(!c.is_fiat(&"usd-coin".into()));
    }
}
