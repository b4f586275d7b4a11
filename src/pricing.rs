//! Pricing vocabulary shared by the migration engine and notice rendering.
//!
//! Amounts are minor-currency-unit integers (pence, cents). Price references
//! are the payment provider's price identifiers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Subscription tiers that take part in price migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Basic,
    Standard,
    Pro,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Basic, Tier::Standard, Tier::Pro];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Standard => "standard",
            Tier::Pro => "pro",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Tier::Basic => "Basic",
            Tier::Standard => "Standard",
            Tier::Pro => "Pro",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "basic" => Ok(Tier::Basic),
            "standard" => Ok(Tier::Standard),
            "pro" => Ok(Tier::Pro),
            other => Err(UnknownValue::new("tier", other)),
        }
    }
}

/// Billing currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    Gbp,
    Usd,
    Eur,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Gbp => "gbp",
            Currency::Usd => "usd",
            Currency::Eur => "eur",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Gbp => "£",
            Currency::Usd => "$",
            Currency::Eur => "€",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "gbp" => Ok(Currency::Gbp),
            "usd" => Ok(Currency::Usd),
            "eur" => Ok(Currency::Eur),
            other => Err(UnknownValue::new("currency", other)),
        }
    }
}

/// Returned when a tier or currency string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownValue {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Recurring price of one tier in one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPrice {
    pub monthly: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual: Option<i64>,
}

/// Display pricing for one side (old or new) of a migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSheet {
    #[serde(default)]
    pub tiers: BTreeMap<Tier, BTreeMap<Currency, TierPrice>>,
    /// Price of a single usage credit, per currency.
    #[serde(default)]
    pub credits: BTreeMap<Currency, i64>,
}

impl PriceSheet {
    pub fn tier_price(&self, tier: Tier, currency: Currency) -> Option<TierPrice> {
        self.tiers
            .get(&tier)
            .and_then(|by_currency| by_currency.get(&currency))
            .copied()
    }

    pub fn credit_price(&self, currency: Currency) -> Option<i64> {
        self.credits.get(&currency).copied()
    }

    pub fn with_tier_price(mut self, tier: Tier, currency: Currency, price: TierPrice) -> Self {
        self.tiers.entry(tier).or_default().insert(currency, price);
        self
    }

    pub fn with_credit_price(mut self, currency: Currency, amount: i64) -> Self {
        self.credits.insert(currency, amount);
        self
    }
}

/// Target provider price reference for every (tier, currency) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceMap(BTreeMap<Tier, BTreeMap<Currency, String>>);

impl PriceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tier: Tier, currency: Currency, price_id: impl Into<String>) {
        self.0.entry(tier).or_default().insert(currency, price_id.into());
    }

    pub fn with(mut self, tier: Tier, currency: Currency, price_id: impl Into<String>) -> Self {
        self.insert(tier, currency, price_id);
        self
    }

    pub fn get(&self, tier: Tier, currency: Currency) -> Option<&str> {
        self.0
            .get(&tier)
            .and_then(|by_currency| by_currency.get(&currency))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    /// Iterate over every configured `(tier, currency, price_id)` triple.
    pub fn entries(&self) -> impl Iterator<Item = (Tier, Currency, &str)> + '_ {
        self.0.iter().flat_map(|(tier, by_currency)| {
            by_currency
                .iter()
                .map(move |(currency, price_id)| (*tier, *currency, price_id.as_str()))
        })
    }

    /// Resolve the target price for raw tier/currency strings as stored on an
    /// organisation row.
    pub fn resolve(&self, tier: &str, currency: &str) -> Option<&str> {
        let tier = tier.parse().ok()?;
        let currency = currency.parse().ok()?;
        self.get(tier, currency)
    }
}

/// Format a minor-unit amount for humans, e.g. `1400` in GBP -> `£14.00`.
pub fn format_amount(amount: i64, currency: Currency) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{sign}{}{}.{:02}", currency.symbol(), abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_and_currency_parse_case_insensitively() {
        assert_eq!("Basic".parse::<Tier>(), Ok(Tier::Basic));
        assert_eq!(" PRO ".parse::<Tier>(), Ok(Tier::Pro));
        assert!("enterprise".parse::<Tier>().is_err());
        assert_eq!("GBP".parse::<Currency>(), Ok(Currency::Gbp));
        assert!("jpy".parse::<Currency>().is_err());
    }

    #[test]
    fn price_map_serializes_as_nested_object() {
        let map = PriceMap::new()
            .with(Tier::Basic, Currency::Gbp, "price_basic_gbp")
            .with(Tier::Pro, Currency::Usd, "price_pro_usd");

        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["basic"]["gbp"], "price_basic_gbp");
        assert_eq!(json["pro"]["usd"], "price_pro_usd");

        let back: PriceMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn price_map_resolves_raw_strings() {
        let map = PriceMap::new().with(Tier::Standard, Currency::Eur, "price_std_eur");
        assert_eq!(map.resolve("standard", "EUR"), Some("price_std_eur"));
        assert_eq!(map.resolve("standard", "gbp"), None);
        assert_eq!(map.resolve("free", "eur"), None);
        assert_eq!(map.entries().count(), 1);
    }

    #[test]
    fn empty_price_map_reports_empty() {
        assert!(PriceMap::new().is_empty());
        let parsed: PriceMap = serde_json::from_str(r#"{"basic": {}}"#).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn price_sheet_lookups() {
        let sheet = PriceSheet::default()
            .with_tier_price(
                Tier::Basic,
                Currency::Gbp,
                TierPrice {
                    monthly: 1400,
                    annual: Some(14000),
                },
            )
            .with_credit_price(Currency::Gbp, 3);

        assert_eq!(
            sheet.tier_price(Tier::Basic, Currency::Gbp).map(|p| p.monthly),
            Some(1400)
        );
        assert_eq!(sheet.tier_price(Tier::Basic, Currency::Usd), None);
        assert_eq!(sheet.credit_price(Currency::Gbp), Some(3));
    }

    #[test]
    fn formats_minor_units() {
        assert_eq!(format_amount(1400, Currency::Gbp), "£14.00");
        assert_eq!(format_amount(5, Currency::Usd), "$0.05");
        assert_eq!(format_amount(-250, Currency::Eur), "-€2.50");
    }
}
