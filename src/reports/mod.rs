use crate::cmd::design::Attempt;
use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use itertools::Itertools;
use poolforge::optimizer::find_violating_peptides;
use poolforge::solution::Solution;
use poolforge::validity::violations_per_replicate;
use std::collections::BTreeMap;

const HISTORY_EDGE: usize = 6;
const VIOLATION_SAMPLE: usize = 12;

fn right_align(table: &mut Table, columns: std::ops::RangeInclusive<usize>) {
    for i in columns {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
}

pub fn print_attempts_table(attempts: &[Attempt]) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Attempt").add_attribute(Attribute::Bold),
        Cell::new("Status"),
        Cell::new("Start Viol"),
        Cell::new("Start Pools"),
        Cell::new("Iters"),
        Cell::new("Added"),
        Cell::new("Merged"),
        Cell::new("Skipped"),
        Cell::new("End Viol").fg(Color::Red),
        Cell::new("Pools").fg(Color::Cyan),
        Cell::new("Time (s)"),
    ]);
    right_align(&mut table, 2..=10);

    for a in attempts {
        let status = if a.result.success {
            Cell::new("valid").fg(Color::Green)
        } else {
            Cell::new("invalid").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(format!("#{}", a.number)).add_attribute(Attribute::Bold),
            status,
            Cell::new(a.initial_violations),
            Cell::new(a.initial_pools),
            Cell::new(a.result.iterations),
            Cell::new(a.result.pools_added),
            Cell::new(a.result.merges),
            Cell::new(a.result.skipped_repairs),
            Cell::new(a.final_violations).fg(Color::Red),
            Cell::new(a.solution.num_pools()).fg(Color::Cyan),
            Cell::new(format!("{:.2}", a.elapsed.as_secs_f32())),
        ]);
    }
    println!("\n{}", table);
}

pub fn print_solution_summary(solution: &Solution) {
    let violations = violations_per_replicate(solution);

    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Replicate").add_attribute(Attribute::Bold),
        Cell::new("Pools"),
        Cell::new("Peptides"),
        Cell::new("Smallest"),
        Cell::new("Largest"),
        Cell::new("Violations").fg(Color::Red),
    ]);
    right_align(&mut table, 1..=5);

    for (&replicate, pools) in solution.assignments() {
        let sizes: Vec<usize> = pools.values().map(|p| p.len()).collect();
        let count = violations.get(&replicate).copied().unwrap_or(0);
        let count_cell = if count == 0 {
            Cell::new(count).fg(Color::Green)
        } else {
            Cell::new(count).fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(replicate + 1).add_attribute(Attribute::Bold),
            Cell::new(pools.len()),
            Cell::new(sizes.iter().sum::<usize>()),
            Cell::new(sizes.iter().min().copied().unwrap_or(0)),
            Cell::new(sizes.iter().max().copied().unwrap_or(0)),
            count_cell,
        ]);
    }

    table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(solution.num_pools()).add_attribute(Attribute::Bold),
        Cell::new(solution.peptides().len()),
        Cell::new(""),
        Cell::new(format!(
            "{} / {}",
            solution.largest_pool(),
            solution.max_peptides_per_pool()
        )),
        Cell::new(violations.values().sum::<usize>()).add_attribute(Attribute::Bold),
    ]);
    println!("\n{}", table);
}

/// Peptides flagged per pool. Long lists are cut short.
pub fn print_violation_report(solution: &Solution) {
    let scan = find_violating_peptides(solution);
    let mut by_pool: BTreeMap<(usize, usize), Vec<u32>> = BTreeMap::new();
    for v in &scan.needs_swap {
        by_pool.entry((v.replicate, v.pool)).or_default().push(v.peptide);
    }

    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Replicate").add_attribute(Attribute::Bold),
        Cell::new("Pool"),
        Cell::new("Flagged").fg(Color::Red),
        Cell::new("Peptides"),
    ]);
    right_align(&mut table, 1..=2);

    for ((replicate, pool), mut peptides) in by_pool {
        peptides.sort_unstable();
        peptides.dedup();
        let mut listed = peptides.iter().take(VIOLATION_SAMPLE).join(", ");
        if peptides.len() > VIOLATION_SAMPLE {
            listed.push_str(", ...");
        }
        table.add_row(vec![
            Cell::new(replicate + 1).add_attribute(Attribute::Bold),
            Cell::new(pool + 1),
            Cell::new(peptides.len()).fg(Color::Red),
            Cell::new(listed),
        ]);
    }
    println!("\n{}", table);
}

pub fn print_pool_grid(solution: &Solution) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Replicate").add_attribute(Attribute::Bold),
        Cell::new("Pool"),
        Cell::new("Peptides"),
    ]);

    for (&replicate, pools) in solution.assignments() {
        for (&pool, peptides) in pools {
            table.add_row(vec![
                Cell::new(replicate + 1),
                Cell::new(pool + 1).set_alignment(CellAlignment::Right),
                Cell::new(peptides.iter().join(" ")),
            ]);
        }
    }
    println!("\n{}", table);
}

/// One line per run: total violations before the first pass and after each.
pub fn print_history(history: &[usize]) {
    let line = if history.len() <= HISTORY_EDGE * 2 {
        history.iter().join(" -> ")
    } else {
        format!(
            "{} -> ... -> {}",
            history[..HISTORY_EDGE].iter().join(" -> "),
            history[history.len() - HISTORY_EDGE..].iter().join(" -> ")
        )
    };
    println!("\nHistory ({} entries): {}", history.len(), line);
}
