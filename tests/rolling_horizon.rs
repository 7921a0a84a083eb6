use std::time::Duration as StdDuration;

use approx::assert_relative_eq;
use arbitrage_planner::domain::{BatteryLimits, PowerTier, Tariff, TariffMarkup};
use arbitrage_planner::optimizer::{
    HorizonPolicy, LpModel, LpSolver, MiniLpSolver, RollingHorizonOptimizer, RunOutcome,
    SolveOutcome, SolveStatus,
};
use arbitrage_planner::provider::{sample, TariffProvider};
use arbitrage_planner::{OptimizerError, Result};
use chrono::{DateTime, Duration};
use mockall::mock;

const EPS: f64 = 1e-6;

mock! {
    pub Solver {}

    impl LpSolver for Solver {
        fn solve(&self, model: &LpModel, time_limit: StdDuration) -> Result<SolveOutcome>;
    }
}

fn hourly(prices: &[f64]) -> Vec<Tariff> {
    let start = DateTime::parse_from_rfc3339("2023-06-07T00:00:00+02:00").unwrap();
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| Tariff::new(start + Duration::hours(i as i64), p))
        .collect()
}

fn lossless_optimizer(policy: HorizonPolicy) -> RollingHorizonOptimizer<MiniLpSolver> {
    RollingHorizonOptimizer::new(
        MiniLpSolver::new(),
        vec![PowerTier::from_round_trip(1.0, 1.0, 1.0).unwrap()],
        BatteryLimits::new(1.0, 1.0, 1.0),
        policy,
    )
    .unwrap()
}

fn home_battery(policy: HorizonPolicy) -> RollingHorizonOptimizer<MiniLpSolver> {
    RollingHorizonOptimizer::new(
        MiniLpSolver::new(),
        PowerTier::full_and_part_load(2.2, 1.7, 0.88, 0.92).unwrap(),
        BatteryLimits::new(5.0, 2.2, 1.7),
        policy,
    )
    .unwrap()
}

/// Three consecutive recorded days: Jun 7 prices repeated with a small drift.
fn three_days() -> Vec<Tariff> {
    let prices: Vec<f64> = (0..3)
        .flat_map(|day| sample::JUN_07_2023.iter().map(move |p| p + 0.01 * day as f64))
        .collect();
    hourly(&prices)
}

fn assert_physical(states: &[arbitrage_planner::domain::OptimizedState], max_energy: f64) {
    for pair in states.windows(2) {
        assert_relative_eq!(pair[1].start_soc(), pair[0].end_soc, epsilon = EPS);
    }
    for s in states {
        assert!(s.end_soc >= -EPS && s.end_soc <= max_energy + EPS, "soc {}", s.end_soc);
        assert!(s.charge >= -EPS && s.discharge >= -EPS);
    }
}

#[test]
fn test_lossless_window_matches_buy_low_sell_high() {
    let tariffs = hourly(&[0.10, 0.20, 0.05, 0.25]);
    let window = lossless_optimizer(HorizonPolicy::one_shot(4))
        .optimize_window(&tariffs, 0.0, 0.0)
        .unwrap();

    assert_eq!(window.status, SolveStatus::Optimal);
    assert_relative_eq!(window.objective_value, 0.30, epsilon = EPS);
    let charge: Vec<f64> = window.states.iter().map(|s| s.charge).collect();
    let discharge: Vec<f64> = window.states.iter().map(|s| s.discharge).collect();
    for (got, want) in charge.iter().zip([1.0, 0.0, 1.0, 0.0]) {
        assert_relative_eq!(*got, want, epsilon = EPS);
    }
    for (got, want) in discharge.iter().zip([0.0, 1.0, 0.0, 1.0]) {
        assert_relative_eq!(*got, want, epsilon = EPS);
    }
}

#[test]
fn test_lossless_run_reports_same_profit() {
    let tariffs = hourly(&[0.10, 0.20, 0.05, 0.25]);
    let run = lossless_optimizer(HorizonPolicy::one_shot(4)).run(&tariffs, 0.0, 0.0);
    assert!(run.is_complete());
    assert_relative_eq!(run.total_profit, 0.30, epsilon = EPS);
    assert_relative_eq!(run.cycles, 2.0, epsilon = EPS);
}

#[test]
fn test_zero_length_window_is_trivially_optimal() {
    let window = lossless_optimizer(HorizonPolicy::default())
        .optimize_window(&[], 0.0, 0.0)
        .unwrap();
    assert_eq!(window.status, SolveStatus::Optimal);
    assert!(window.states.is_empty());
    assert_eq!(window.objective_value, 0.0);
}

#[test]
fn test_unreachable_end_energy_is_infeasible() {
    let optimizer = RollingHorizonOptimizer::new(
        MiniLpSolver::new(),
        vec![PowerTier::unbounded(0.9).unwrap()],
        BatteryLimits::new(5.0, 2.0, 2.0),
        HorizonPolicy::default(),
    )
    .unwrap();
    let tariffs = hourly(&[0.1; 6]);

    let err = optimizer.optimize_window(&tariffs, 0.0, 100.0).unwrap_err();
    assert_eq!(err, OptimizerError::Infeasible);

    let run = optimizer.run(&tariffs, 0.0, 100.0);
    assert_eq!(
        run.outcome,
        RunOutcome::Aborted {
            window: 0,
            error: OptimizerError::Infeasible
        }
    );
    assert!(run.states.is_empty());
}

#[test]
fn test_start_above_capacity_is_left_to_the_solver() {
    let err = lossless_optimizer(HorizonPolicy::default())
        .optimize_window(&hourly(&[0.1, 0.2]), 3.0, 0.0)
        .unwrap_err();
    assert_eq!(err, OptimizerError::Infeasible);
}

#[test]
fn test_sample_day_schedule_is_profitable_and_physical() {
    let tariffs = sample::oct_31_2022().unwrap().tariffs().unwrap();
    let run = home_battery(HorizonPolicy::default()).run(&tariffs, 0.0, 0.0);

    assert!(run.is_complete());
    assert_eq!(run.states.len(), 24);
    assert!(run.total_profit >= -EPS);
    assert_physical(&run.states, 5.0);
}

#[test]
fn test_multi_day_run_commits_every_slot_and_carries_soc() {
    let tariffs = three_days();
    let run = home_battery(HorizonPolicy::default()).run(&tariffs, 2.0, 1.0);

    assert!(run.is_complete());
    assert_eq!(run.states.len(), 72);
    let committed: Vec<usize> = run.windows.iter().map(|w| w.committed_slots).collect();
    assert_eq!(committed, vec![12, 24, 24, 12]);
    assert_relative_eq!(run.states[0].start_soc(), 2.0, epsilon = EPS);
    for pair in run.windows.windows(2) {
        assert_relative_eq!(pair[1].start_energy, pair[0].end_energy, epsilon = EPS);
    }
    assert!(run.states[71].end_soc >= 1.0 - EPS);
    assert_physical(&run.states, 5.0);
}

#[test]
fn test_rolling_never_beats_one_shot() {
    let tariffs = three_days();
    let rolling = home_battery(HorizonPolicy::default()).run(&tariffs, 0.0, 0.0);
    let one_shot = home_battery(HorizonPolicy::one_shot(tariffs.len())).run(&tariffs, 0.0, 0.0);

    assert_eq!(one_shot.windows.len(), 1);
    assert!(rolling.total_profit <= one_shot.total_profit + EPS);
}

#[test]
fn test_vat_scales_profit_and_surcharge_erodes_it() {
    let wholesale = sample::jun_07_2023().unwrap().tariffs().unwrap();
    let optimizer = home_battery(HorizonPolicy::one_shot(24));
    let plain = optimizer.run(&wholesale, 0.0, 0.0);

    let with_vat = optimizer.run(&TariffMarkup::new(0.0, 0.21).apply_all(&wholesale), 0.0, 0.0);
    assert_relative_eq!(with_vat.total_profit, 1.21 * plain.total_profit, epsilon = 1e-5);

    // Losses are paid on the surcharge too, so it can only hurt.
    let with_surcharge =
        optimizer.run(&TariffMarkup::new(0.12, 0.0).apply_all(&wholesale), 0.0, 0.0);
    assert!(with_surcharge.total_profit <= plain.total_profit + EPS);
    assert_physical(&with_surcharge.states, 5.0);
}

#[test]
fn test_feasible_status_from_backend_is_surfaced() {
    let mut solver = MockSolver::new();
    solver.expect_solve().returning(|model, limit| {
        let outcome = MiniLpSolver::new().solve(model, limit)?;
        Ok(SolveOutcome::with_assignment(
            SolveStatus::Feasible,
            model,
            outcome.values,
        ))
    });
    let optimizer = RollingHorizonOptimizer::new(
        solver,
        vec![PowerTier::from_round_trip(1.0, 1.0, 1.0).unwrap()],
        BatteryLimits::new(1.0, 1.0, 1.0),
        HorizonPolicy::one_shot(4),
    )
    .unwrap();

    let run = optimizer.run(&hourly(&[0.10, 0.20, 0.05, 0.25]), 0.0, 0.0);
    assert!(run.is_complete());
    assert_eq!(run.windows[0].status, SolveStatus::Feasible);
    assert_relative_eq!(run.total_profit, 0.30, epsilon = EPS);
}

#[test]
fn test_time_limit_is_passed_to_the_backend() {
    let mut solver = MockSolver::new();
    solver
        .expect_solve()
        .withf(|_, limit| *limit == StdDuration::from_millis(40))
        .times(1)
        .returning(|_, limit| Err(OptimizerError::TimedOut(limit)));
    let optimizer = RollingHorizonOptimizer::new(
        solver,
        vec![PowerTier::unbounded(1.0).unwrap()],
        BatteryLimits::new(1.0, 1.0, 1.0),
        HorizonPolicy::default(),
    )
    .unwrap()
    .with_time_limit(StdDuration::from_millis(40));

    let run = optimizer.run(&hourly(&[0.1; 3]), 0.0, 0.0);
    assert_eq!(
        run.error(),
        Some(&OptimizerError::TimedOut(StdDuration::from_millis(40)))
    );
}

#[test]
fn test_tight_time_limit_still_commits_a_feasible_month() {
    let prices: Vec<f64> = (0..30)
        .flat_map(|day| sample::JUN_07_2023.iter().map(move |p| p + 0.001 * day as f64))
        .collect();
    let optimizer = home_battery(HorizonPolicy::one_shot(prices.len()))
        .with_time_limit(StdDuration::from_millis(1));

    let run = optimizer.run(&hourly(&prices), 0.0, 2.0);
    assert!(run.is_complete(), "{:?}", run.error());
    assert_eq!(run.states.len(), 720);
    assert!(matches!(
        run.windows[0].status,
        SolveStatus::Timeout | SolveStatus::Optimal
    ));
    assert_physical(&run.states, 5.0);
    assert!(run.states[719].end_soc >= 2.0 - EPS);
}
