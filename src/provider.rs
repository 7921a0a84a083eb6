//! Tariff sources.
//!
//! The optimizer never reads files or global state; callers pick a provider
//! and pass the loaded series in.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, FixedOffset};
use serde::Deserialize;

use crate::domain::Tariff;

pub trait TariffProvider {
    /// Ordered, gapless tariff series.
    fn tariffs(&self) -> Result<Vec<Tariff>>;
}

/// In-memory series, used for sample days and tests.
#[derive(Debug, Clone)]
pub struct StaticTariffs {
    tariffs: Vec<Tariff>,
}

impl StaticTariffs {
    /// One tariff per `slot`, starting at `start`.
    pub fn from_prices(start: DateTime<FixedOffset>, slot: Duration, prices: &[f64]) -> Self {
        let tariffs = std::iter::successors(Some(start), |t| Some(*t + slot))
            .zip(prices)
            .map(|(timestamp, &price)| Tariff::new(timestamp, price))
            .collect();
        Self { tariffs }
    }
}

impl TariffProvider for StaticTariffs {
    fn tariffs(&self) -> Result<Vec<Tariff>> {
        Ok(self.tariffs.clone())
    }
}

/// easyenergy-style export: `[{"Timestamp": .., "TariffUsage": ..}]`
#[derive(Debug, Deserialize)]
struct TariffRecord {
    #[serde(rename = "Timestamp")]
    timestamp: DateTime<FixedOffset>,
    #[serde(rename = "TariffUsage")]
    tariff_usage: f64,
}

#[derive(Debug, Deserialize)]
struct PricePoint {
    #[serde(rename = "readingDate")]
    reading_date: DateTime<FixedOffset>,
    price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TariffDocument {
    Records(Vec<TariffRecord>),
    PricePoints {
        #[serde(rename = "Prices")]
        prices: Vec<PricePoint>,
    },
}

impl TariffDocument {
    fn into_tariffs(self) -> Vec<Tariff> {
        match self {
            Self::Records(records) => records
                .into_iter()
                .map(|r| Tariff::new(r.timestamp, r.tariff_usage))
                .collect(),
            Self::PricePoints { prices } => prices
                .into_iter()
                .map(|p| Tariff::new(p.reading_date, p.price))
                .collect(),
        }
    }
}

/// JSON file in either supported tariff layout.
#[derive(Debug, Clone)]
pub struct JsonTariffFile {
    path: PathBuf,
    slot: Duration,
}

impl JsonTariffFile {
    pub fn new(path: impl AsRef<Path>, slot: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            slot,
        }
    }

    pub fn parse(json: &str, slot: Duration) -> Result<Vec<Tariff>> {
        let document: TariffDocument =
            serde_json::from_str(json).context("unrecognized tariff document layout")?;
        let mut tariffs = document.into_tariffs();
        tariffs.sort_by_key(|t| t.timestamp);
        ensure_contiguous(&tariffs, slot)?;
        Ok(tariffs)
    }
}

impl TariffProvider for JsonTariffFile {
    fn tariffs(&self) -> Result<Vec<Tariff>> {
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading tariff file {}", self.path.display()))?;
        let tariffs = Self::parse(&json, self.slot)
            .with_context(|| format!("parsing tariff file {}", self.path.display()))?;
        tracing::info!(
            path = %self.path.display(),
            slots = tariffs.len(),
            "loaded tariffs"
        );
        Ok(tariffs)
    }
}

/// Reject series with gaps, duplicates, or non-finite prices.
pub fn ensure_contiguous(tariffs: &[Tariff], slot: Duration) -> Result<()> {
    for (i, t) in tariffs.iter().enumerate() {
        if !t.unit_price.is_finite() {
            bail!("tariff at {} has a non-finite price", t.timestamp);
        }
        if i > 0 {
            let step = t.timestamp - tariffs[i - 1].timestamp;
            if step != slot {
                bail!(
                    "tariff series is not contiguous at {}: step of {} min, expected {} min",
                    t.timestamp,
                    step.num_minutes(),
                    slot.num_minutes()
                );
            }
        }
    }
    Ok(())
}

/// Recorded day-ahead price days, wholesale EUR/kWh.
pub mod sample {
    use super::*;

    pub const OCT_31_2022: [f64; 24] = [
        0.13, 0.13, 0.12, 0.13, 0.13, 0.16, 0.19, 0.19, 0.16, 0.15, 0.15, 0.15, 0.16, 0.17, 0.19,
        0.19, 0.21, 0.2, 0.19, 0.16, 0.15, 0.13, 0.11, 0.1,
    ];

    pub const JUN_07_2023: [f64; 24] = [
        0.08966, 0.07836, 0.07240, 0.08876, 0.07986, 0.08019, 0.07600, 0.09720, 0.11125, 0.09422,
        0.09160, 0.08569, 0.07995, 0.07030, 0.07320, 0.07226, 0.07880, 0.07570, 0.09700, 0.09993,
        0.11780, 0.11230, 0.10489, 0.09490,
    ];

    /// Hourly provider for one recorded day. `midnight` is RFC 3339.
    pub fn day(midnight: &str, prices: &[f64]) -> Result<StaticTariffs> {
        let start = DateTime::parse_from_rfc3339(midnight)
            .with_context(|| format!("invalid sample start {midnight}"))?;
        Ok(StaticTariffs::from_prices(start, Duration::hours(1), prices))
    }

    pub fn jun_07_2023() -> Result<StaticTariffs> {
        day("2023-06-07T00:00:00+02:00", &JUN_07_2023)
    }

    pub fn oct_31_2022() -> Result<StaticTariffs> {
        day("2022-10-31T00:00:00+01:00", &OCT_31_2022)
    }
}
