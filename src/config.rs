use std::path::PathBuf;
use std::time::Duration as StdDuration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::domain::{BatteryLimits, EfficiencyTier, PowerTier, TariffMarkup};
use crate::optimizer::HorizonPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub battery: BatteryConfig,
    pub tiers: TiersConfig,
    pub horizon: HorizonConfig,
    pub solver: SolverConfig,
    pub tariffs: TariffsConfig,
}

/// Energy in kWh, power in kW.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryConfig {
    pub max_energy: f64,
    pub start_energy: f64,
    /// SoC floor at the end of every optimization window
    pub end_energy: f64,
    pub max_charge_power: f64,
    pub max_discharge_power: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            max_energy: 5.0,
            start_energy: 0.0,
            end_energy: 0.0,
            max_charge_power: 2.2,
            max_discharge_power: 1.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiersConfig {
    pub full_load_round_trip: f64,
    pub part_load_round_trip: f64,
    /// Explicit bands; when non-empty they replace the full/part-load pair.
    #[serde(default)]
    pub custom: Vec<TierConfig>,
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            full_load_round_trip: 0.9,
            part_load_round_trip: 0.9,
            custom: Vec::new(),
        }
    }
}

/// One explicit band. A missing power means the band is only bounded by the
/// battery limits. A round-trip efficiency is split evenly between the two
/// directions unless a direction sets its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    pub max_charge_power: Option<f64>,
    pub max_discharge_power: Option<f64>,
    pub round_trip_efficiency: Option<f64>,
    pub charge_efficiency: Option<f64>,
    pub discharge_efficiency: Option<f64>,
}

impl TierConfig {
    pub fn to_power_tier(&self) -> Result<PowerTier> {
        let one_way = self.round_trip_efficiency.map(f64::sqrt);
        let (Some(charge_efficiency), Some(discharge_efficiency)) = (
            self.charge_efficiency.or(one_way),
            self.discharge_efficiency.or(one_way),
        ) else {
            bail!("tier needs round_trip_efficiency or both per-direction efficiencies");
        };
        Ok(PowerTier::new(
            EfficiencyTier::new(
                self.max_charge_power.unwrap_or(f64::INFINITY),
                charge_efficiency,
            )?,
            EfficiencyTier::new(
                self.max_discharge_power.unwrap_or(f64::INFINITY),
                discharge_efficiency,
            )?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonConfig {
    pub initial_commit_slots: usize,
    pub commit_slots: usize,
    pub lookahead_slots: usize,
    pub slot_minutes: u32,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        let policy = HorizonPolicy::default();
        Self {
            initial_commit_slots: policy.initial_commit_slots,
            commit_slots: policy.commit_slots,
            lookahead_slots: policy.lookahead_slots,
            slot_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub time_limit_ms: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TariffsConfig {
    /// JSON tariff file; the bundled sample day is used when unset
    pub path: Option<PathBuf>,
    pub surcharge: f64,
    pub vat_rate: f64,
}

impl Config {
    /// Defaults, then `config/default.toml`, then the file named by
    /// `ARB_CONFIG`, then `ARB__SECTION__KEY` environment variables.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"));
        if let Ok(path) = std::env::var("ARB_CONFIG") {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("ARB__").split("__"))
    }

    pub fn load() -> Result<Self> {
        Ok(Self::figment().extract()?)
    }

    pub fn validate(&self) -> Result<()> {
        let b = &self.battery;
        self.limits().validate()?;
        if !(0.0..=b.max_energy).contains(&b.start_energy) {
            bail!(
                "battery.start_energy must be within [0, {}], got {}",
                b.max_energy,
                b.start_energy
            );
        }
        if !(0.0..=b.max_energy).contains(&b.end_energy) {
            bail!(
                "battery.end_energy must be within [0, {}], got {}",
                b.max_energy,
                b.end_energy
            );
        }
        self.policy().validate()?;
        if self.horizon.slot_minutes == 0 {
            bail!("horizon.slot_minutes must be positive");
        }
        if self.solver.time_limit_ms == 0 {
            bail!("solver.time_limit_ms must be positive");
        }
        if let Err(msg) = self.markup().validate() {
            bail!("tariffs: {msg}");
        }
        self.power_tiers()?;
        Ok(())
    }

    pub fn limits(&self) -> BatteryLimits {
        BatteryLimits::new(
            self.battery.max_energy,
            self.battery.max_charge_power,
            self.battery.max_discharge_power,
        )
    }

    pub fn power_tiers(&self) -> Result<Vec<PowerTier>> {
        if self.tiers.custom.is_empty() {
            return Ok(PowerTier::full_and_part_load(
                self.battery.max_charge_power,
                self.battery.max_discharge_power,
                self.tiers.full_load_round_trip,
                self.tiers.part_load_round_trip,
            )?);
        }

        self.tiers
            .custom
            .iter()
            .map(TierConfig::to_power_tier)
            .collect()
    }

    pub fn policy(&self) -> HorizonPolicy {
        HorizonPolicy {
            initial_commit_slots: self.horizon.initial_commit_slots,
            commit_slots: self.horizon.commit_slots,
            lookahead_slots: self.horizon.lookahead_slots,
        }
    }

    pub fn slot(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.horizon.slot_minutes))
    }

    pub fn time_limit(&self) -> StdDuration {
        StdDuration::from_millis(self.solver.time_limit_ms)
    }

    pub fn markup(&self) -> TariffMarkup {
        TariffMarkup::new(self.tariffs.surcharge, self.tariffs.vat_rate)
    }
}
