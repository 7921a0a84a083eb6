use arbitrage_planner::domain::{BatteryLimits, EfficiencyTier, PowerTier, Tariff};
use arbitrage_planner::optimizer::{HorizonPolicy, HourPrice, MiniLpSolver, RollingHorizonOptimizer};
use chrono::{DateTime, Duration};
use proptest::prelude::*;

const EPS: f64 = 1e-6;

fn hourly(prices: &[f64]) -> Vec<Tariff> {
    let start = DateTime::parse_from_rfc3339("2022-10-31T00:00:00+01:00").unwrap();
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| Tariff::new(start + Duration::hours(i as i64), p))
        .collect()
}

fn tier(charge_power: f64, discharge_power: f64, (charge_eff, discharge_eff): (f64, f64)) -> PowerTier {
    PowerTier::new(
        EfficiencyTier::new(charge_power, charge_eff).unwrap(),
        EfficiencyTier::new(discharge_power, discharge_eff).unwrap(),
    )
}

#[test]
fn test_negative_prices_keep_soc_within_bounds() {
    let optimizer = RollingHorizonOptimizer::new(
        MiniLpSolver::new(),
        vec![tier(1.0, 0.8, (0.95, 0.9)), tier(1.2, 0.9, (0.85, 0.8))],
        BatteryLimits::new(4.0, 2.2, 1.7),
        HorizonPolicy { initial_commit_slots: 4, commit_slots: 6, lookahead_slots: 4 },
    )
    .unwrap();
    let prices = [-0.25, -0.1, -0.3, -0.05, -0.2, -0.15, -0.02, -0.28, -0.12, -0.07, -0.3, -0.01];

    let run = optimizer.run(&hourly(&prices), 1.0, 2.0);
    assert!(run.is_complete(), "{:?}", run.error());
    assert_eq!(run.states.len(), prices.len());

    let mut soc = 1.0;
    for state in &run.states {
        assert!((state.start_soc() - soc).abs() < EPS);
        assert!(state.end_soc >= -EPS && state.end_soc <= 4.0 + EPS, "soc {}", state.end_soc);
        assert!(state.charge <= 2.2 + EPS && state.discharge <= 1.7 + EPS);
        soc = state.end_soc;
    }
    assert!(soc >= 2.0 - EPS);
    // paid to take energy, so the schedule earns money
    assert!(run.total_profit > 0.0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_soc_stays_within_bounds(
        prices in prop::collection::vec(-0.3f64..0.5, 1..40),
        max_energy in 1.0f64..10.0,
        start_fraction in 0.0f64..1.0,
        max_charge in 0.5f64..3.0,
        max_discharge in 0.5f64..3.0,
        full_load in (0.5f64..=1.0, 0.5f64..=1.0),
        part_load in (0.5f64..=1.0, 0.5f64..=1.0),
    ) {
        let start_energy = start_fraction * max_energy;
        let optimizer = RollingHorizonOptimizer::new(
            MiniLpSolver::new(),
            vec![
                tier(max_charge / 2.0, max_discharge / 2.0, part_load),
                tier(max_charge / 2.0, max_discharge / 2.0, full_load),
            ],
            BatteryLimits::new(max_energy, max_charge, max_discharge),
            HorizonPolicy { initial_commit_slots: 6, commit_slots: 12, lookahead_slots: 6 },
        )
        .unwrap();

        let run = optimizer.run(&hourly(&prices), start_energy, 0.0);
        prop_assert!(run.is_complete());
        prop_assert_eq!(run.states.len(), prices.len());

        let mut soc = start_energy;
        for state in &run.states {
            prop_assert!((state.start_soc() - soc).abs() < EPS);
            prop_assert!(state.end_soc >= -EPS && state.end_soc <= max_energy + EPS);
            prop_assert!(state.charge >= -EPS && state.charge <= max_charge + EPS);
            prop_assert!(state.discharge >= -EPS && state.discharge <= max_discharge + EPS);
            soc = state.end_soc;
        }
    }

    #[test]
    fn test_round_trip_through_one_tier_never_gains_energy(
        price in 0.0f64..1.0,
        charge_eff in 0.5f64..=1.0,
        discharge_eff in 0.5f64..=1.0,
    ) {
        let tier = PowerTier::new(
            EfficiencyTier::new(1.0, charge_eff).unwrap(),
            EfficiencyTier::new(1.0, discharge_eff).unwrap(),
        );
        let hp = HourPrice::from_ac_price(price, &tier);
        prop_assert!(hp.discharge_revenue <= hp.charge_cost + EPS);
        prop_assert!((hp.charge_cost * charge_eff - price).abs() < EPS);
        prop_assert!((hp.discharge_revenue / discharge_eff - price).abs() < EPS);
    }
}
