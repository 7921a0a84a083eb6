use serde::{Deserialize, Serialize};

use crate::error::{OptimizerError, Result};

/// One power band with its own conversion efficiency.
///
/// `max_power` may be `f64::INFINITY` for a band that is only limited by the
/// battery's aggregate power and energy bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EfficiencyTier {
    max_power: f64,
    efficiency: f64,
}

impl EfficiencyTier {
    pub fn new(max_power: f64, efficiency: f64) -> Result<Self> {
        if max_power.is_nan() || max_power < 0.0 {
            return Err(OptimizerError::validation(format!(
                "max_power must be >= 0, got {max_power}"
            )));
        }
        if !(efficiency > 0.0 && efficiency <= 1.0) {
            return Err(OptimizerError::validation(format!(
                "efficiency must be in (0, 1], got {efficiency}"
            )));
        }
        Ok(Self {
            max_power,
            efficiency,
        })
    }

    pub fn max_power(&self) -> f64 {
        self.max_power
    }

    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }
}

/// A power band usable for charging and for discharging.
///
/// The two directions carry independent limits and efficiencies; a
/// charge-only band simply has a discharge `max_power` of zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerTier {
    pub charge: EfficiencyTier,
    pub discharge: EfficiencyTier,
}

impl PowerTier {
    pub fn new(charge: EfficiencyTier, discharge: EfficiencyTier) -> Self {
        Self { charge, discharge }
    }

    /// Split a round-trip efficiency evenly: each direction gets `sqrt(round_trip)`.
    pub fn from_round_trip(
        max_charge_power: f64,
        max_discharge_power: f64,
        round_trip_efficiency: f64,
    ) -> Result<Self> {
        if !(round_trip_efficiency > 0.0 && round_trip_efficiency <= 1.0) {
            return Err(OptimizerError::validation(format!(
                "round-trip efficiency must be in (0, 1], got {round_trip_efficiency}"
            )));
        }
        let one_way = round_trip_efficiency.sqrt();
        Ok(Self {
            charge: EfficiencyTier::new(max_charge_power, one_way)?,
            discharge: EfficiencyTier::new(max_discharge_power, one_way)?,
        })
    }

    /// A single band with no per-band power limit.
    pub fn unbounded(round_trip_efficiency: f64) -> Result<Self> {
        Self::from_round_trip(f64::INFINITY, f64::INFINITY, round_trip_efficiency)
    }

    /// Full-load band plus a half-power part-load band.
    ///
    /// Inverters usually convert more efficiently at part load, so the second
    /// band gets its own round-trip efficiency. Both bands may be used in the
    /// same slot; the aggregate cap in [`BatteryLimits`] still applies.
    pub fn full_and_part_load(
        max_charge_power: f64,
        max_discharge_power: f64,
        full_load_round_trip: f64,
        part_load_round_trip: f64,
    ) -> Result<Vec<Self>> {
        Ok(vec![
            Self::from_round_trip(max_charge_power, max_discharge_power, full_load_round_trip)?,
            Self::from_round_trip(
                0.5 * max_charge_power,
                0.5 * max_discharge_power,
                part_load_round_trip,
            )?,
        ])
    }

    pub fn round_trip_efficiency(&self) -> f64 {
        self.charge.efficiency() * self.discharge.efficiency()
    }
}

/// Physical bounds of the battery, in energy units and energy-per-hour units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryLimits {
    pub max_energy: f64,
    pub max_charge_power: f64,
    pub max_discharge_power: f64,
}

impl BatteryLimits {
    pub fn new(max_energy: f64, max_charge_power: f64, max_discharge_power: f64) -> Self {
        Self {
            max_energy,
            max_charge_power,
            max_discharge_power,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.max_energy.is_finite() || self.max_energy < 0.0 {
            return Err(OptimizerError::validation(format!(
                "max_energy must be finite and >= 0, got {}",
                self.max_energy
            )));
        }
        for (name, value) in [
            ("max_charge_power", self.max_charge_power),
            ("max_discharge_power", self.max_discharge_power),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(OptimizerError::validation(format!(
                    "{name} must be >= 0, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Equivalent full cycles for a total charged energy.
    pub fn cycles(&self, charged_energy: f64) -> f64 {
        if self.max_energy > 0.0 {
            charged_energy / self.max_energy
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(1.5)]
    #[case(0.0)]
    #[case(-0.1)]
    #[case(f64::NAN)]
    fn test_efficiency_out_of_range_is_rejected(#[case] efficiency: f64) {
        let err = EfficiencyTier::new(1.0, efficiency).unwrap_err();
        assert!(matches!(err, OptimizerError::Validation(_)));
    }

    #[rstest]
    #[case(1.0)]
    #[case(0.0001)]
    #[case(0.95)]
    fn test_efficiency_in_range_is_accepted(#[case] efficiency: f64) {
        let tier = EfficiencyTier::new(2.2, efficiency).unwrap();
        assert_eq!(tier.efficiency(), efficiency);
        assert_eq!(tier.max_power(), 2.2);
    }

    #[test]
    fn test_negative_power_is_rejected() {
        assert!(EfficiencyTier::new(-1.0, 0.9).is_err());
        assert!(EfficiencyTier::new(f64::NAN, 0.9).is_err());
    }

    #[test]
    fn test_infinite_power_is_accepted() {
        let tier = EfficiencyTier::new(f64::INFINITY, 1.0).unwrap();
        assert!(tier.max_power().is_infinite());
    }

    #[test]
    fn test_round_trip_split_is_square_root() {
        let tier = PowerTier::from_round_trip(2.2, 1.7, 0.81).unwrap();
        assert_relative_eq!(tier.charge.efficiency(), 0.9, epsilon = 1e-12);
        assert_relative_eq!(tier.discharge.efficiency(), 0.9, epsilon = 1e-12);
        assert_relative_eq!(tier.round_trip_efficiency(), 0.81, epsilon = 1e-12);
        assert_eq!(tier.charge.max_power(), 2.2);
        assert_eq!(tier.discharge.max_power(), 1.7);
    }

    #[test]
    fn test_round_trip_out_of_range_is_rejected() {
        assert!(PowerTier::from_round_trip(1.0, 1.0, 1.2).is_err());
        assert!(PowerTier::unbounded(0.0).is_err());
    }

    #[test]
    fn test_full_and_part_load_halves_power() {
        let tiers = PowerTier::full_and_part_load(2.2, 1.7, 0.9, 0.95).unwrap();
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers[1].charge.max_power(), 1.1);
        assert_eq!(tiers[1].discharge.max_power(), 0.85);
        assert_relative_eq!(tiers[1].round_trip_efficiency(), 0.95, epsilon = 1e-12);
    }

    #[test]
    fn test_limits_validate() {
        assert!(BatteryLimits::new(5.0, 2.2, 1.7).validate().is_ok());
        assert!(BatteryLimits::new(5.0, f64::INFINITY, 1.7).validate().is_ok());
        assert!(BatteryLimits::new(-5.0, 2.2, 1.7).validate().is_err());
        assert!(BatteryLimits::new(5.0, -2.2, 1.7).validate().is_err());
    }

    #[test]
    fn test_cycles_handles_zero_capacity() {
        assert_eq!(BatteryLimits::new(0.0, 1.0, 1.0).cycles(3.0), 0.0);
        assert_eq!(BatteryLimits::new(5.0, 1.0, 1.0).cycles(10.0), 2.0);
    }
}
