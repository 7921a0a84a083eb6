use chrono::{DateTime, Duration, FixedOffset};
use itertools::izip;

use super::model::WindowModel;
use crate::domain::OptimizedState;
use crate::error::{OptimizerError, Result};

/// Raw per-slot arrays of one solved window. All five arrays share one length.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialSolution {
    prices: Vec<f64>,
    socs: Vec<f64>,
    costs: Vec<f64>,
    charge: Vec<f64>,
    discharge: Vec<f64>,
}

impl PartialSolution {
    pub fn new(
        prices: Vec<f64>,
        socs: Vec<f64>,
        costs: Vec<f64>,
        charge: Vec<f64>,
        discharge: Vec<f64>,
    ) -> Result<Self> {
        let expected = prices.len();
        for (field, actual) in [
            ("socs", socs.len()),
            ("costs", costs.len()),
            ("charge", charge.len()),
            ("discharge", discharge.len()),
        ] {
            if actual != expected {
                return Err(OptimizerError::LengthMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }
        Ok(Self {
            prices,
            socs,
            costs,
            charge,
            discharge,
        })
    }

    /// Evaluate every per-slot quantity of `model` at a solved assignment.
    pub fn from_assignment(model: &WindowModel, unit_prices: &[f64], values: &[f64]) -> Result<Self> {
        if values.len() != model.lp().variable_count() {
            return Err(OptimizerError::LengthMismatch {
                field: "assignment",
                expected: model.lp().variable_count(),
                actual: values.len(),
            });
        }

        if unit_prices.len() != model.slot_count() {
            return Err(OptimizerError::LengthMismatch {
                field: "prices",
                expected: model.slot_count(),
                actual: unit_prices.len(),
            });
        }

        let slots = 0..model.slot_count();
        Self::new(
            unit_prices.to_vec(),
            slots.clone().map(|h| model.soc_expr(h).eval(values)).collect(),
            slots.clone().map(|h| model.cost_expr(h).eval(values)).collect(),
            slots.clone().map(|h| model.total_charge_expr(h).eval(values)).collect(),
            slots.map(|h| model.total_discharge_expr(h).eval(values)).collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn socs(&self) -> &[f64] {
        &self.socs
    }

    pub fn costs(&self) -> &[f64] {
        &self.costs
    }

    pub fn charge(&self) -> &[f64] {
        &self.charge
    }

    pub fn discharge(&self) -> &[f64] {
        &self.discharge
    }

    /// Attach timestamps walking forward from `anchor` in `slot` steps.
    pub fn to_states(&self, anchor: DateTime<FixedOffset>, slot: Duration) -> Vec<OptimizedState> {
        let timestamps = std::iter::successors(Some(anchor), |t| Some(*t + slot));
        izip!(timestamps, &self.prices, &self.socs, &self.costs, &self.charge, &self.discharge)
            .map(|(timestamp, &grid_price, &end_soc, &cost, &charge, &discharge)| OptimizedState {
                timestamp,
                grid_price,
                charge,
                discharge,
                cost,
                end_soc,
            })
            .collect()
    }
}
