//! LP model for one planning window.
//!
//! The formulation, for tiers `t` and slots `h` in `[0, H)`:
//!
//! - Variables: `charge[t][h]` and `discharge[t][h]`, in `[0, tier max power * slot hours]`
//! - Aggregate caps: `sum_t charge[t][h] <= max_charge_power * slot hours` (same for discharge)
//! - SoC: `soc[h] = start + sum_{k<=h} sum_t (charge[t][k] - discharge[t][k])`,
//!   bounded to `[0, max_energy]` every slot
//! - Terminal floor: `soc[H-1] >= end_energy`
//! - Objective: maximize `sum_h sum_t (revenue * discharge - cost * charge)`
//!
//! SoC is not a variable. Each slot's SoC is an explicit prefix-sum expression
//! over the decision variables, kept next to the per-slot cost expression so
//! the extractor can evaluate both directly against the solved assignment.

use serde::Serialize;

use super::pricing::PriceTable;
use crate::domain::{BatteryLimits, PowerTier};
use crate::error::{OptimizerError, Result};

/// Index of a decision variable in an [`LpModel`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VarBounds {
    pub lower: f64,
    /// May be `f64::INFINITY`
    pub upper: f64,
}

/// `constant + sum(coefficient * variable)`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        self.terms.push((var, coefficient));
    }

    pub fn with_term(mut self, var: VarId, coefficient: f64) -> Self {
        self.add_term(var, coefficient);
        self
    }

    /// Evaluate against a full assignment indexed by [`VarId`].
    pub fn eval(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, (var, coefficient)| {
                acc + coefficient * values[var.0]
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparison {
    LessOrEqual,
    GreaterOrEqual,
    Equal,
}

/// What a constraint encodes, for logging and inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstraintKind {
    ChargePowerCap { slot: usize },
    DischargePowerCap { slot: usize },
    SocCeiling { slot: usize },
    SocFloor { slot: usize },
    TerminalEnergy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearConstraint {
    pub kind: ConstraintKind,
    pub expr: LinearExpr,
    pub comparison: Comparison,
    pub rhs: f64,
}

impl LinearConstraint {
    /// Right-hand side once the expression constant is moved across.
    pub fn effective_rhs(&self) -> f64 {
        self.rhs - self.expr.constant
    }

    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expr.eval(values);
        match self.comparison {
            Comparison::LessOrEqual => lhs <= self.rhs + tolerance,
            Comparison::GreaterOrEqual => lhs >= self.rhs - tolerance,
            Comparison::Equal => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// Solver-agnostic maximization problem: a variable arena, constraints over
/// it, and a linear objective.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LpModel {
    variables: Vec<VarBounds>,
    constraints: Vec<LinearConstraint>,
    objective: LinearExpr,
    /// Known feasible point, returned when a backend runs out of time
    fallback: Option<Vec<f64>>,
}

impl LpModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, lower: f64, upper: f64) -> VarId {
        self.variables.push(VarBounds { lower, upper });
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        expr: LinearExpr,
        comparison: Comparison,
        rhs: f64,
    ) {
        self.constraints.push(LinearConstraint {
            kind,
            expr,
            comparison,
            rhs,
        });
    }

    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    pub fn variables(&self) -> &[VarBounds] {
        &self.variables
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.constraints.is_empty()
    }

    pub fn set_fallback(&mut self, values: Vec<f64>) {
        self.fallback = Some(values);
    }

    pub fn fallback(&self) -> Option<&[f64]> {
        self.fallback.as_deref()
    }

    /// Whether `values` respects every bound and constraint within `tolerance`.
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        values.len() == self.variables.len()
            && self
                .variables
                .iter()
                .zip(values)
                .all(|(b, &v)| v >= b.lower - tolerance && v <= b.upper + tolerance)
            && self
                .constraints
                .iter()
                .all(|c| c.is_satisfied(values, tolerance))
    }
}

/// Boundary inputs for one window.
#[derive(Debug, Clone, Copy)]
pub struct WindowBounds {
    pub limits: BatteryLimits,
    pub start_energy: f64,
    pub end_energy: f64,
    /// Slot length in hours; converts power limits into per-slot energy
    pub slot_hours: f64,
}

/// The LP of one window together with the handles needed to read it back.
#[derive(Debug, Clone)]
pub struct WindowModel {
    lp: LpModel,
    tier_count: usize,
    slot_count: usize,
    /// Tier-major: `charge[tier * slot_count + slot]`
    charge: Vec<VarId>,
    discharge: Vec<VarId>,
    soc: Vec<LinearExpr>,
    cost: Vec<LinearExpr>,
}

impl WindowModel {
    pub fn build(prices: &PriceTable, tiers: &[PowerTier], bounds: &WindowBounds) -> Result<Self> {
        if prices.tier_count() != tiers.len() && !prices.is_empty() {
            return Err(OptimizerError::LengthMismatch {
                field: "tiers",
                expected: prices.tier_count(),
                actual: tiers.len(),
            });
        }
        if !(bounds.slot_hours > 0.0 && bounds.slot_hours.is_finite()) {
            return Err(OptimizerError::validation(format!(
                "slot duration must be positive, got {} h",
                bounds.slot_hours
            )));
        }
        bounds.limits.validate()?;

        let slots = prices.slot_count();
        let tier_count = if slots == 0 { 0 } else { tiers.len() };
        let mut lp = LpModel::new();

        let mut charge = Vec::with_capacity(tier_count * slots);
        let mut discharge = Vec::with_capacity(tier_count * slots);
        for tier in tiers.iter().take(tier_count) {
            let charge_cap = tier.charge.max_power() * bounds.slot_hours;
            let discharge_cap = tier.discharge.max_power() * bounds.slot_hours;
            for _ in 0..slots {
                charge.push(lp.add_variable(0.0, charge_cap));
                discharge.push(lp.add_variable(0.0, discharge_cap));
            }
        }

        let mut model = Self {
            lp,
            tier_count,
            slot_count: slots,
            charge,
            discharge,
            soc: Vec::with_capacity(slots),
            cost: Vec::with_capacity(slots),
        };

        let charge_cap = bounds.limits.max_charge_power * bounds.slot_hours;
        let discharge_cap = bounds.limits.max_discharge_power * bounds.slot_hours;

        for slot in 0..slots {
            if charge_cap.is_finite() {
                let total = model.total_charge_expr(slot);
                model.lp.add_constraint(
                    ConstraintKind::ChargePowerCap { slot },
                    total,
                    Comparison::LessOrEqual,
                    charge_cap,
                );
            }
            if discharge_cap.is_finite() {
                let total = model.total_discharge_expr(slot);
                model.lp.add_constraint(
                    ConstraintKind::DischargePowerCap { slot },
                    total,
                    Comparison::LessOrEqual,
                    discharge_cap,
                );
            }

            let soc = model.prefix_soc_expr(slot, bounds.start_energy);
            model.lp.add_constraint(
                ConstraintKind::SocCeiling { slot },
                soc.clone(),
                Comparison::LessOrEqual,
                bounds.limits.max_energy,
            );
            model.lp.add_constraint(
                ConstraintKind::SocFloor { slot },
                soc.clone(),
                Comparison::GreaterOrEqual,
                0.0,
            );
            model.soc.push(soc);

            let cost = model.slot_cost_expr(prices, slot);
            model.cost.push(cost);
        }

        if let Some(last) = model.soc.last() {
            let terminal = last.clone();
            model.lp.add_constraint(
                ConstraintKind::TerminalEnergy,
                terminal,
                Comparison::GreaterOrEqual,
                bounds.end_energy,
            );
        }

        // profit = -(net cost), summed over the window
        let mut objective = LinearExpr::default();
        for cost in &model.cost {
            for &(var, coefficient) in &cost.terms {
                objective.add_term(var, -coefficient);
            }
        }
        model.lp.set_objective(objective);

        let fallback = model.floor_seeking_schedule(bounds);
        model.lp.set_fallback(fallback);

        Ok(model)
    }

    pub fn lp(&self) -> &LpModel {
        &self.lp
    }

    pub fn tier_count(&self) -> usize {
        self.tier_count
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn charge_var(&self, tier: usize, slot: usize) -> VarId {
        self.charge[tier * self.slot_count + slot]
    }

    pub fn discharge_var(&self, tier: usize, slot: usize) -> VarId {
        self.discharge[tier * self.slot_count + slot]
    }

    pub fn total_charge_expr(&self, slot: usize) -> LinearExpr {
        (0..self.tier_count).fold(LinearExpr::default(), |expr, tier| {
            expr.with_term(self.charge_var(tier, slot), 1.0)
        })
    }

    pub fn total_discharge_expr(&self, slot: usize) -> LinearExpr {
        (0..self.tier_count).fold(LinearExpr::default(), |expr, tier| {
            expr.with_term(self.discharge_var(tier, slot), 1.0)
        })
    }

    /// State of charge at the end of `slot`.
    pub fn soc_expr(&self, slot: usize) -> &LinearExpr {
        &self.soc[slot]
    }

    /// Net spend of `slot`: charge cost minus discharge revenue.
    pub fn cost_expr(&self, slot: usize) -> &LinearExpr {
        &self.cost[slot]
    }

    fn prefix_soc_expr(&self, slot: usize, start_energy: f64) -> LinearExpr {
        let mut expr = LinearExpr::constant(start_energy);
        for k in 0..=slot {
            for tier in 0..self.tier_count {
                expr.add_term(self.charge_var(tier, k), 1.0);
                expr.add_term(self.discharge_var(tier, k), -1.0);
            }
        }
        expr
    }

    /// Charge as early and as fast as possible until the end-energy floor is
    /// met, then idle. Feasible whenever the window is feasible at all.
    fn floor_seeking_schedule(&self, bounds: &WindowBounds) -> Vec<f64> {
        let mut values = vec![0.0; self.lp.variable_count()];
        let aggregate = bounds.limits.max_charge_power * bounds.slot_hours;
        let mut soc = bounds.start_energy;
        for slot in 0..self.slot_count {
            let mut room = (bounds.end_energy - soc)
                .min(bounds.limits.max_energy - soc)
                .min(aggregate);
            for tier in 0..self.tier_count {
                if room <= 0.0 {
                    break;
                }
                let var = self.charge_var(tier, slot);
                let amount = room.min(self.lp.variables()[var.index()].upper);
                values[var.index()] = amount;
                soc += amount;
                room -= amount;
            }
        }
        values
    }

    fn slot_cost_expr(&self, prices: &PriceTable, slot: usize) -> LinearExpr {
        let mut expr = LinearExpr::default();
        for tier in 0..self.tier_count {
            let price = prices.get(tier, slot);
            expr.add_term(self.charge_var(tier, slot), price.charge_cost);
            expr.add_term(self.discharge_var(tier, slot), -price.discharge_revenue);
        }
        expr
    }
}
