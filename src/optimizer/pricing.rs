//! AC tariff to DC price conversion.
//!
//! Buying one unit into the battery costs `price / charge_efficiency` because
//! losses happen before the energy lands in the cells; selling one unit out
//! earns `price * discharge_efficiency`.

use serde::Serialize;

use crate::domain::{PowerTier, Tariff};
use crate::error::{OptimizerError, Result};

/// DC-side economics of one slot for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourPrice {
    pub charge_cost: f64,
    pub discharge_revenue: f64,
}

impl HourPrice {
    pub fn new(charge_cost: f64, discharge_revenue: f64) -> Self {
        Self {
            charge_cost,
            discharge_revenue,
        }
    }

    pub fn from_ac_price(unit_price: f64, tier: &PowerTier) -> Self {
        Self {
            charge_cost: unit_price / tier.charge.efficiency(),
            discharge_revenue: unit_price * tier.discharge.efficiency(),
        }
    }
}

/// Prices for every (tier, slot) pair of one window, stored tier-major.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    tier_count: usize,
    slot_count: usize,
    prices: Vec<HourPrice>,
}

impl PriceTable {
    pub fn build(tariffs: &[Tariff], tiers: &[PowerTier]) -> Result<Self> {
        let unit_prices: Vec<f64> = tariffs.iter().map(|t| t.unit_price).collect();
        Self::from_unit_prices(&unit_prices, tiers)
    }

    pub fn from_unit_prices(unit_prices: &[f64], tiers: &[PowerTier]) -> Result<Self> {
        if tiers.is_empty() && !unit_prices.is_empty() {
            return Err(OptimizerError::validation("at least one power tier is required"));
        }
        if let Some((slot, price)) = unit_prices.iter().enumerate().find(|(_, p)| !p.is_finite()) {
            return Err(OptimizerError::validation(format!(
                "tariff at slot {slot} is not finite: {price}"
            )));
        }

        let prices = tiers
            .iter()
            .flat_map(|tier| unit_prices.iter().map(|&p| HourPrice::from_ac_price(p, tier)))
            .collect();

        Ok(Self {
            tier_count: tiers.len(),
            slot_count: unit_prices.len(),
            prices,
        })
    }

    pub fn get(&self, tier: usize, slot: usize) -> HourPrice {
        self.prices[tier * self.slot_count + slot]
    }

    pub fn tier_count(&self) -> usize {
        self.tier_count
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn is_empty(&self) -> bool {
        self.slot_count == 0
    }
}
