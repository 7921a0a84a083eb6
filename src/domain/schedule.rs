use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

/// Optimized battery activity for one committed slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizedState {
    pub timestamp: DateTime<FixedOffset>,
    /// AC-side grid price of the slot
    pub grid_price: f64,
    /// Total energy charged over all tiers (DC side)
    pub charge: f64,
    /// Total energy discharged over all tiers (DC side)
    pub discharge: f64,
    /// Net spend: charge cost minus discharge revenue
    pub cost: f64,
    /// State of charge at the end of the slot
    pub end_soc: f64,
}

impl OptimizedState {
    pub fn start_soc(&self) -> f64 {
        self.end_soc + self.discharge - self.charge
    }

    pub fn end_time(&self, slot: Duration) -> DateTime<FixedOffset> {
        self.timestamp + slot
    }

    pub fn profit(&self) -> f64 {
        -self.cost
    }
}
