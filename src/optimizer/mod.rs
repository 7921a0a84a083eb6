//! Battery arbitrage optimizer
//!
//! Pipeline per window: tariffs -> [`pricing`] -> [`model`] -> [`solver`]
//! -> [`solution`]. [`rolling`] repeats it over the full series and commits
//! the trusted prefix of every window.

pub mod model;
pub mod pricing;
pub mod rolling;
pub mod solution;
pub mod solver;

pub use model::{LpModel, WindowBounds, WindowModel};
pub use pricing::{HourPrice, PriceTable};
pub use rolling::*;
pub use solution::PartialSolution;
pub use solver::{LpSolver, MiniLpSolver, SolveOutcome, SolveStatus, DEFAULT_TIME_LIMIT};
