//! Solve adapter.
//!
//! The core only depends on [`LpSolver`]; [`MiniLpSolver`] is the bundled
//! backend (good_lp on top of the pure-Rust minilp simplex), so no native
//! solver library is needed.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use super::model::{Comparison, LinearExpr, LpModel};
use crate::error::{OptimizerError, Result};

/// Default wall-clock budget for one window solve.
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SolveStatus {
    Optimal,
    /// A feasible assignment the backend could not prove optimal
    Feasible,
    Infeasible,
    /// Time budget exhausted; the assignment is the best one found
    Timeout,
    Unbounded,
}

impl SolveStatus {
    pub fn has_assignment(self) -> bool {
        matches!(self, Self::Optimal | Self::Feasible | Self::Timeout)
    }
}

/// Result of one solve: status, one value per model variable, and the
/// objective evaluated at that assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub values: Vec<f64>,
    pub objective_value: f64,
}

impl SolveOutcome {
    pub fn with_assignment(status: SolveStatus, model: &LpModel, values: Vec<f64>) -> Self {
        let objective_value = model.objective().eval(&values);
        Self {
            status,
            values,
            objective_value,
        }
    }

    pub fn without_assignment(status: SolveStatus) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective_value: f64::NAN,
        }
    }

    /// Turn terminal statuses into errors. Feasible and Timeout outcomes are
    /// accepted as they are.
    pub fn accept(self) -> Result<Self> {
        match self.status {
            SolveStatus::Infeasible => Err(OptimizerError::Infeasible),
            SolveStatus::Unbounded => Err(OptimizerError::Unbounded),
            _ => Ok(self),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait LpSolver {
    /// Maximize `model`'s objective within `time_limit`.
    fn solve(&self, model: &LpModel, time_limit: Duration) -> Result<SolveOutcome>;
}

/// Tolerance used when checking a fallback assignment against the model.
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// good_lp + minilp backend.
///
/// minilp has no native time limit, so the solve runs on a worker thread and
/// the caller stops waiting once the budget is spent. minilp never exposes an
/// incumbent; on timeout the model's own fallback assignment is returned with
/// [`SolveStatus::Timeout`], and [`OptimizerError::TimedOut`] is raised only
/// when there is no feasible fallback.
///
/// A timed-out worker cannot be interrupted. Its handle is kept until it
/// finishes and is reaped on the next solve; drop waits for none of them.
#[derive(Debug, Default)]
pub struct MiniLpSolver {
    abandoned: Mutex<Vec<JoinHandle<()>>>,
}

impl MiniLpSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timed-out solves whose worker thread is still running.
    pub fn abandoned_solves(&self) -> usize {
        self.reap();
        self.abandoned.lock().len()
    }

    fn reap(&self) {
        let mut abandoned = self.abandoned.lock();
        let (finished, running): (Vec<_>, Vec<_>) =
            abandoned.drain(..).partition(|h| h.is_finished());
        *abandoned = running;
        for handle in finished {
            if handle.join().is_err() {
                warn!("abandoned minilp solve panicked");
            }
        }
    }
}

impl Drop for MiniLpSolver {
    fn drop(&mut self) {
        let running = self.abandoned_solves();
        if running > 0 {
            warn!(running, "abandoned minilp solves still running at shutdown");
        }
    }
}

impl LpSolver for MiniLpSolver {
    fn solve(&self, model: &LpModel, time_limit: Duration) -> Result<SolveOutcome> {
        self.reap();
        if model.variable_count() == 0 {
            return Ok(SolveOutcome::with_assignment(
                SolveStatus::Optimal,
                model,
                Vec::new(),
            ));
        }

        let started = Instant::now();
        let owned = model.clone();
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("lp-solve".to_string())
            .spawn(move || {
                let result = solve_with_minilp(&owned);
                if tx.send(result).is_err() {
                    debug!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "abandoned minilp solve finished"
                    );
                }
            })
            .map_err(|e| OptimizerError::Solver(format!("failed to spawn solver thread: {e}")))?;

        match rx.recv_timeout(time_limit) {
            Ok(result) => {
                if handle.join().is_err() {
                    warn!("minilp worker panicked after sending its result");
                }
                debug!(
                    variables = model.variable_count(),
                    constraints = model.constraints().len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "minilp solve finished"
                );
                result
            }
            Err(RecvTimeoutError::Timeout) => {
                self.abandoned.lock().push(handle);
                timed_out(model, time_limit)
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                Err(OptimizerError::Solver(
                    "solver thread terminated without a result".to_string(),
                ))
            }
        }
    }
}

/// Best assignment available once the budget is spent.
fn timed_out(model: &LpModel, time_limit: Duration) -> Result<SolveOutcome> {
    match model.fallback() {
        Some(values) if model.is_feasible(values, FEASIBILITY_TOLERANCE) => {
            warn!(
                time_limit_ms = time_limit.as_millis() as u64,
                "minilp did not finish within the time limit, using fallback assignment"
            );
            Ok(SolveOutcome::with_assignment(
                SolveStatus::Timeout,
                model,
                values.to_vec(),
            ))
        }
        _ => {
            warn!(
                time_limit_ms = time_limit.as_millis() as u64,
                "minilp did not finish within the time limit and no feasible fallback exists"
            );
            Err(OptimizerError::TimedOut(time_limit))
        }
    }
}

fn solve_with_minilp(model: &LpModel) -> Result<SolveOutcome> {
    let mut vars = ProblemVariables::new();
    let handles: Vec<good_lp::Variable> = model
        .variables()
        .iter()
        .map(|bounds| {
            let mut definition = variable().min(bounds.lower);
            if bounds.upper.is_finite() {
                definition = definition.max(bounds.upper);
            }
            vars.add(definition)
        })
        .collect();

    let objective = to_expression(model.objective(), &handles);
    let mut problem = vars.maximise(objective).using(good_lp::minilp);

    for c in model.constraints() {
        let lhs = to_expression(&c.expr, &handles);
        let rhs = c.effective_rhs();
        problem = match c.comparison {
            Comparison::LessOrEqual => problem.with(constraint!(lhs <= rhs)),
            Comparison::GreaterOrEqual => problem.with(constraint!(lhs >= rhs)),
            Comparison::Equal => problem.with(constraint!(lhs == rhs)),
        };
    }

    match problem.solve() {
        Ok(solution) => {
            let values = handles.iter().map(|&v| solution.value(v)).collect();
            Ok(SolveOutcome::with_assignment(SolveStatus::Optimal, model, values))
        }
        Err(ResolutionError::Infeasible) => {
            Ok(SolveOutcome::without_assignment(SolveStatus::Infeasible))
        }
        Err(ResolutionError::Unbounded) => {
            Ok(SolveOutcome::without_assignment(SolveStatus::Unbounded))
        }
        Err(other) => Err(OptimizerError::Solver(other.to_string())),
    }
}

/// Variable terms only; constants are folded into the right-hand side.
fn to_expression(expr: &LinearExpr, handles: &[good_lp::Variable]) -> Expression {
    expr.terms
        .iter()
        .map(|&(var, coefficient)| coefficient * handles[var.index()])
        .sum::<Expression>()
}
