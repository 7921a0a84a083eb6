use comfy_table::{modifiers, presets, Attribute, Cell, CellAlignment, Color, Table};
use itertools::Itertools;

use crate::domain::OptimizedState;
use crate::optimizer::{HorizonRun, RunOutcome};

const BAR_WIDTH: usize = 20;

/// SoC gauge, e.g. `#####.....` for half full.
pub fn soc_bar(soc: f64, max_energy: f64, width: usize) -> String {
    let fraction = if max_energy > 0.0 {
        (soc / max_energy).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (fraction * width as f64).round() as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(width - filled))
}

pub fn schedule_table(states: &[OptimizedState], max_energy: f64) -> Table {
    let mean_price = if states.is_empty() {
        0.0
    } else {
        states.iter().map(|s| s.grid_price).sum::<f64>() / states.len() as f64
    };

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.set_header(vec![
        "Time", "Price", "Charge", "Discharge", "Cost", "SoC", "",
    ]);
    for state in states {
        table.add_row(vec![
            Cell::new(state.timestamp.format("%m-%d %H:%M")),
            Cell::new(format!("{:.4}", state.grid_price))
                .set_alignment(CellAlignment::Right)
                .fg(if state.grid_price > mean_price {
                    Color::Red
                } else {
                    Color::Green
                }),
            Cell::new(format!("{:.3}", state.charge)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.3}", state.discharge)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:+.4}", state.cost)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.3}", state.end_soc)).set_alignment(CellAlignment::Right),
            Cell::new(soc_bar(state.end_soc, max_energy, BAR_WIDTH)).add_attribute(Attribute::Dim),
        ]);
    }
    table
}

pub fn summary(run: &HorizonRun) -> String {
    let charged: f64 = run.states.iter().map(|s| s.charge).sum();
    let discharged: f64 = run.states.iter().map(|s| s.discharge).sum();
    let statuses = run.windows.iter().map(|w| w.status.to_string()).dedup().join(", ");

    let mut lines = vec![
        format!("Slots committed: {}", run.states.len()),
        format!("Windows solved:  {} ({})", run.windows.len(), statuses),
        format!("Charged:         {charged:.3}"),
        format!("Discharged:      {discharged:.3}"),
        format!("Cycles:          {:.2}", run.cycles),
        format!("Profit:          {:.4}", run.total_profit),
    ];
    if let RunOutcome::Aborted { window, error } = &run.outcome {
        lines.push(format!("Aborted at window {window}: {error}"));
    }
    lines.join("\n")
}
