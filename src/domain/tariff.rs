use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One slot of grid price, as supplied by the tariff source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    pub timestamp: DateTime<FixedOffset>,
    pub unit_price: f64,
}

impl Tariff {
    pub fn new(timestamp: DateTime<FixedOffset>, unit_price: f64) -> Self {
        Self {
            timestamp,
            unit_price,
        }
    }
}

/// Retail markup applied on top of a wholesale price: `(price + surcharge) * (1 + vat_rate)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TariffMarkup {
    /// Fixed per-unit surcharge (energy tax, supplier fee)
    pub surcharge: f64,
    /// VAT as a fraction, e.g. 0.21
    pub vat_rate: f64,
}

impl Default for TariffMarkup {
    fn default() -> Self {
        Self::NONE
    }
}

impl TariffMarkup {
    pub const NONE: Self = Self {
        surcharge: 0.0,
        vat_rate: 0.0,
    };

    pub fn new(surcharge: f64, vat_rate: f64) -> Self {
        Self {
            surcharge,
            vat_rate,
        }
    }

    pub fn apply(&self, wholesale: f64) -> f64 {
        (wholesale + self.surcharge) * (1.0 + self.vat_rate)
    }

    /// Consumer-side tariffs for a wholesale series. Timestamps are kept.
    pub fn apply_all(&self, tariffs: &[Tariff]) -> Vec<Tariff> {
        tariffs
            .iter()
            .map(|t| Tariff::new(t.timestamp, self.apply(t.unit_price)))
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.surcharge.is_finite() {
            return Err(format!("surcharge is not finite: {}", self.surcharge));
        }
        if !self.vat_rate.is_finite() || self.vat_rate <= -1.0 {
            return Err(format!("vat_rate must be finite and > -1: {}", self.vat_rate));
        }
        Ok(())
    }
}
