//! Rolling-horizon driver.
//!
//! Day-ahead prices are published once a day, so at any moment the schedule
//! can see a little further than it needs to commit. Each iteration solves
//! `commit + lookahead` slots but keeps only the first `commit` slots; the
//! tail exists so the optimizer does not drain or fill the battery just
//! because the visible window ends. The committed prefix's final SoC is the
//! only state handed to the next window.

use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::model::{WindowBounds, WindowModel};
use super::pricing::PriceTable;
use super::solution::PartialSolution;
use super::solver::{LpSolver, SolveStatus, DEFAULT_TIME_LIMIT};
use crate::domain::{BatteryLimits, OptimizedState, PowerTier, Tariff};
use crate::error::{OptimizerError, Result};

/// Window and commit lengths, in slots.
///
/// The defaults fit a market that publishes the next day's prices at noon:
/// a run starting at midnight knows 24 h, commits until noon, and from then
/// on commits a full day while looking 12 h past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizonPolicy {
    pub initial_commit_slots: usize,
    pub commit_slots: usize,
    pub lookahead_slots: usize,
}

impl Default for HorizonPolicy {
    fn default() -> Self {
        Self {
            initial_commit_slots: 12,
            commit_slots: 24,
            lookahead_slots: 12,
        }
    }
}

impl HorizonPolicy {
    /// Solve everything at once; nothing is discarded.
    pub fn one_shot(slots: usize) -> Self {
        Self {
            initial_commit_slots: slots.max(1),
            commit_slots: slots.max(1),
            lookahead_slots: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_commit_slots == 0 || self.commit_slots == 0 {
            return Err(OptimizerError::validation(
                "commit lengths must be at least one slot",
            ));
        }
        Ok(())
    }

    pub fn commit_len(&self, iteration: usize) -> usize {
        if iteration == 0 {
            self.initial_commit_slots
        } else {
            self.commit_slots
        }
    }

    pub fn window_len(&self, iteration: usize) -> usize {
        self.commit_len(iteration) + self.lookahead_slots
    }
}

/// Full solve of one window, before any prefix is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSolution {
    pub states: Vec<OptimizedState>,
    pub status: SolveStatus,
    pub objective_value: f64,
}

/// What happened in one driver iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowReport {
    pub index: usize,
    pub start: DateTime<FixedOffset>,
    pub window_slots: usize,
    pub committed_slots: usize,
    pub status: SolveStatus,
    /// Objective over the whole window, look-ahead included
    pub objective_value: f64,
    pub start_energy: f64,
    /// SoC at the end of the committed prefix
    pub end_energy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Complete,
    /// Stopped at window `window`; everything committed before it stands.
    Aborted { window: usize, error: OptimizerError },
}

/// Committed schedule of a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonRun {
    pub states: Vec<OptimizedState>,
    pub windows: Vec<WindowReport>,
    pub total_profit: f64,
    /// Equivalent full cycles: total charged energy over capacity
    pub cycles: f64,
    pub outcome: RunOutcome,
}

impl HorizonRun {
    pub fn is_complete(&self) -> bool {
        self.outcome == RunOutcome::Complete
    }

    pub fn error(&self) -> Option<&OptimizerError> {
        match &self.outcome {
            RunOutcome::Complete => None,
            RunOutcome::Aborted { error, .. } => Some(error),
        }
    }

    /// Drop partial results of an aborted run and surface its error.
    pub fn into_result(self) -> Result<Self> {
        match self.outcome {
            RunOutcome::Complete => Ok(self),
            RunOutcome::Aborted { error, .. } => Err(error),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DriverState {
    Advancing {
        cursor: usize,
        start_energy: f64,
        iteration: usize,
    },
    Done,
}

pub struct RollingHorizonOptimizer<S> {
    solver: S,
    tiers: Vec<PowerTier>,
    limits: BatteryLimits,
    policy: HorizonPolicy,
    slot: Duration,
    time_limit: StdDuration,
}

impl<S: LpSolver> RollingHorizonOptimizer<S> {
    pub fn new(
        solver: S,
        tiers: Vec<PowerTier>,
        limits: BatteryLimits,
        policy: HorizonPolicy,
    ) -> Result<Self> {
        if tiers.is_empty() {
            return Err(OptimizerError::validation("at least one power tier is required"));
        }
        limits.validate()?;
        policy.validate()?;
        Ok(Self {
            solver,
            tiers,
            limits,
            policy,
            slot: Duration::hours(1),
            time_limit: DEFAULT_TIME_LIMIT,
        })
    }

    pub fn with_slot_duration(mut self, slot: Duration) -> Self {
        self.slot = slot;
        self
    }

    pub fn with_time_limit(mut self, time_limit: StdDuration) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn policy(&self) -> &HorizonPolicy {
        &self.policy
    }

    pub fn limits(&self) -> &BatteryLimits {
        &self.limits
    }

    /// Build, solve and extract a single window.
    pub fn optimize_window(
        &self,
        tariffs: &[Tariff],
        start_energy: f64,
        end_energy: f64,
    ) -> Result<WindowSolution> {
        let prices = PriceTable::build(tariffs, &self.tiers)?;
        let bounds = WindowBounds {
            limits: self.limits,
            start_energy,
            end_energy,
            slot_hours: self.slot.num_seconds() as f64 / 3600.0,
        };
        let model = WindowModel::build(&prices, &self.tiers, &bounds)?;

        let outcome = self.solver.solve(model.lp(), self.time_limit)?.accept()?;
        if outcome.status != SolveStatus::Optimal {
            warn!(
                status = %outcome.status,
                objective = outcome.objective_value,
                "accepting non-optimal window solution"
            );
        }

        let unit_prices: Vec<f64> = tariffs.iter().map(|t| t.unit_price).collect();
        let partial = PartialSolution::from_assignment(&model, &unit_prices, &outcome.values)?;
        let states = match tariffs.first() {
            Some(first) => partial.to_states(first.timestamp, self.slot),
            None => Vec::new(),
        };

        Ok(WindowSolution {
            states,
            status: outcome.status,
            objective_value: outcome.objective_value,
        })
    }

    /// Optimize the whole series window by window.
    ///
    /// `end_energy` is the SoC floor at the end of every window. The series
    /// must be gapless with one tariff per slot.
    pub fn run(&self, tariffs: &[Tariff], start_energy: f64, end_energy: f64) -> HorizonRun {
        let started = Instant::now();
        let mut states: Vec<OptimizedState> = Vec::with_capacity(tariffs.len());
        let mut windows = Vec::new();
        let mut outcome = RunOutcome::Complete;

        let mut state = DriverState::Advancing {
            cursor: 0,
            start_energy,
            iteration: 0,
        };

        while let DriverState::Advancing {
            cursor,
            start_energy,
            iteration,
        } = state
        {
            let remaining = &tariffs[cursor..];
            if remaining.is_empty() {
                state = DriverState::Done;
                continue;
            }

            let window_len = self.policy.window_len(iteration).min(remaining.len());
            let commit_len = self.policy.commit_len(iteration).min(window_len);
            let window = &remaining[..window_len];

            debug!(
                iteration,
                cursor,
                window_len,
                commit_len,
                start_energy,
                "optimizing window"
            );

            match self.optimize_window(window, start_energy, end_energy) {
                Ok(solution) => {
                    let committed = &solution.states[..commit_len];
                    let next_energy = committed.last().map_or(start_energy, |s| s.end_soc);
                    windows.push(WindowReport {
                        index: iteration,
                        start: window[0].timestamp,
                        window_slots: window_len,
                        committed_slots: commit_len,
                        status: solution.status,
                        objective_value: solution.objective_value,
                        start_energy,
                        end_energy: next_energy,
                    });
                    states.extend_from_slice(committed);
                    state = DriverState::Advancing {
                        cursor: cursor + commit_len,
                        start_energy: next_energy,
                        iteration: iteration + 1,
                    };
                }
                Err(err) => {
                    error!(
                        iteration,
                        cursor,
                        error = %err,
                        kind = err.error_type(),
                        "window optimization failed, aborting run"
                    );
                    outcome = RunOutcome::Aborted {
                        window: iteration,
                        error: err,
                    };
                    state = DriverState::Done;
                }
            }
        }

        let total_profit = -states.iter().map(|s| s.cost).sum::<f64>();
        let cycles = self.limits.cycles(states.iter().map(|s| s.charge).sum());

        info!(
            windows = windows.len(),
            committed_slots = states.len(),
            total_profit,
            cycles,
            complete = (outcome == RunOutcome::Complete),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rolling horizon run finished"
        );

        HorizonRun {
            states,
            windows,
            total_profit,
            cycles,
            outcome,
        }
    }
}
