//! Location-market tag conventions
//!
//! A tag's prefix alone decides jurisdiction, currency and default tax
//! system: `us_*` is the US, `uae_*` is the UAE, anything else is the UK.

use std::fmt;

use serde::{Deserialize, Serialize};

const US_PREFIX: &str = "us_";
const UAE_PREFIX: &str = "uae_";

pub const UK_TAX_SYSTEM: &str = "uk_income_tax_ni";
pub const US_TAX_SYSTEM: &str = "us_federal";
pub const TAX_FREE_SYSTEM: &str = "tax_free";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Jurisdiction {
    UK,
    US,
    UAE,
}

impl Jurisdiction {
    pub fn from_location(location_market: &str) -> Self {
        if location_market.starts_with(US_PREFIX) {
            Jurisdiction::US
        } else if location_market.starts_with(UAE_PREFIX) {
            Jurisdiction::UAE
        } else {
            Jurisdiction::UK
        }
    }

    /// Currency amounts are authored in for this jurisdiction
    pub fn currency(self) -> Currency {
        match self {
            Jurisdiction::US | Jurisdiction::UAE => Currency::USD,
            Jurisdiction::UK => Currency::GBP,
        }
    }

    /// Tax-system template used when a phase names none explicitly
    pub fn default_tax_system(self) -> &'static str {
        match self {
            Jurisdiction::US => US_TAX_SYSTEM,
            Jurisdiction::UAE => TAX_FREE_SYSTEM,
            Jurisdiction::UK => UK_TAX_SYSTEM,
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Jurisdiction::UK => "UK",
            Jurisdiction::US => "US",
            Jurisdiction::UAE => "UAE",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    GBP,
    USD,
    EUR,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Currency::GBP => "GBP",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_mapping() {
        assert_eq!(Jurisdiction::from_location("us_seattle"), Jurisdiction::US);
        assert_eq!(Jurisdiction::from_location("uae_dubai"), Jurisdiction::UAE);
        assert_eq!(Jurisdiction::from_location("uk"), Jurisdiction::UK);
        assert_eq!(Jurisdiction::from_location("london"), Jurisdiction::UK);
        // the marker must be a prefix followed by an underscore
        assert_eq!(Jurisdiction::from_location("usa"), Jurisdiction::UK);
    }

    #[test]
    fn test_currency_and_tax_defaults() {
        assert_eq!(Jurisdiction::US.currency(), Currency::USD);
        assert_eq!(Jurisdiction::UAE.currency(), Currency::USD);
        assert_eq!(Jurisdiction::UK.currency(), Currency::GBP);
        assert_eq!(Jurisdiction::UAE.default_tax_system(), TAX_FREE_SYSTEM);
        assert_eq!(Jurisdiction::US.default_tax_system(), US_TAX_SYSTEM);
        assert_eq!(Jurisdiction::UK.default_tax_system(), UK_TAX_SYSTEM);
    }
}
