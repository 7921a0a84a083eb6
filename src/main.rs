use anyhow::{bail, Result};
use arbitrage_planner::{
    config::Config,
    optimizer::{MiniLpSolver, RollingHorizonOptimizer},
    provider::{sample, JsonTariffFile, TariffProvider},
    report, telemetry,
};
use tracing::{info, warn};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::load()?;
    cfg.validate()?;

    let provider: Box<dyn TariffProvider> = match &cfg.tariffs.path {
        Some(path) => Box::new(JsonTariffFile::new(path, cfg.slot())),
        None => {
            warn!("no tariffs.path configured, using the 2023-06-07 sample day");
            Box::new(sample::jun_07_2023()?)
        }
    };
    let tariffs = cfg.markup().apply_all(&provider.tariffs()?);

    let optimizer = RollingHorizonOptimizer::new(
        MiniLpSolver::new(),
        cfg.power_tiers()?,
        cfg.limits(),
        cfg.policy(),
    )?
    .with_slot_duration(cfg.slot())
    .with_time_limit(cfg.time_limit());

    let policy = optimizer.policy();
    info!(
        slots = tariffs.len(),
        start_energy = cfg.battery.start_energy,
        end_energy = cfg.battery.end_energy,
        initial_commit_slots = policy.initial_commit_slots,
        commit_slots = policy.commit_slots,
        lookahead_slots = policy.lookahead_slots,
        "starting arbitrage planning"
    );
    let run = optimizer.run(&tariffs, cfg.battery.start_energy, cfg.battery.end_energy);

    println!("{}", report::schedule_table(&run.states, optimizer.limits().max_energy));
    println!("{}", report::summary(&run));

    if let Some(err) = run.error() {
        bail!("planning stopped early: {err}");
    }
    Ok(())
}
