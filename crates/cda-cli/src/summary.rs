//! Run summaries printed after each command.

use std::path::Path;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::types::{
    AggregateResult, CloseResult, HarmonizeResult, MatchResult, MergeResult, PairSummary,
};

pub fn print_aggregate_summary(result: &AggregateResult) {
    let summary = &result.summary;
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Entity"),
        header_cell("Input"),
        header_cell("Output"),
        header_cell("Merged"),
        header_cell("File"),
    ]);
    apply_summary_table_style(&mut table);
    table.add_row(vec![
        Cell::new(&result.entity).fg(Color::Blue).add_attribute(Attribute::Bold),
        Cell::new(summary.input_records),
        Cell::new(summary.output_records),
        count_cell(summary.merged_entities, Color::Green),
        path_cell(&result.output),
    ]);
    for index in 1..=3 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    println!("{table}");
}

pub fn print_merge_summary(result: &MergeResult) {
    let summary = &result.summary;
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Source"),
        header_cell("Rank"),
        header_cell("Records"),
        header_cell("Re-keyed"),
        header_cell("Unmapped"),
    ]);
    apply_summary_table_style(&mut table);
    for (source, records) in &summary.input_records {
        let rank = result
            .hierarchy
            .iter()
            .position(|label| label == source)
            .map_or_else(|| dim_cell("-"), |position| Cell::new(position + 1));
        let rekey = result
            .rekeyed
            .iter()
            .find(|(id, _)| id.as_str() == source)
            .map(|(_, rekey)| rekey);
        table.add_row(vec![
            Cell::new(source).fg(Color::Blue),
            rank,
            Cell::new(records),
            rekey.map_or_else(|| dim_cell("-"), |rekey| Cell::new(rekey.rekeyed)),
            rekey.map_or_else(
                || dim_cell("-"),
                |rekey| count_cell(rekey.unmapped, Color::Yellow),
            ),
        ]);
    }
    let total: usize = summary.input_records.values().sum();
    table.add_row(vec![
        total_cell("Total"),
        Cell::new(""),
        total_cell(total),
        Cell::new(""),
        Cell::new(""),
    ]);
    for index in 1..=4 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    println!("{table}");
    println!(
        "{} {} records ({} merged from several sources) -> {}",
        result.entity,
        summary.output_records,
        summary.merged_entities,
        result.output.display()
    );
    if summary.collapsed_entities > 0 {
        println!(
            "{} entities folded several records of one source together",
            summary.collapsed_entities
        );
    }
}

fn pair_table(pairs: &[PairSummary]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Source"),
        header_cell("Into"),
        header_cell("Candidates"),
        header_cell("Matched"),
        header_cell("Output"),
    ]);
    apply_table_style(&mut table);
    for pair in pairs {
        table.add_row(vec![
            Cell::new(&pair.b_source).fg(Color::Blue),
            Cell::new(&pair.a_source),
            Cell::new(pair.candidates),
            count_cell(pair.matched, Color::Green),
            path_cell(&pair.output),
        ]);
    }
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    table
}

pub fn print_match_summary(result: &MatchResult) {
    println!("{}", pair_table(&result.pairs));
}

pub fn print_close_summary(result: &CloseResult) {
    println!("{}", pair_table(&result.pairs));

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Source"),
        header_cell("Subjects"),
        header_cell("Joined"),
        header_cell("New entities"),
    ]);
    apply_summary_table_style(&mut table);
    for source in &result.sources {
        table.add_row(vec![
            Cell::new(&source.source).fg(Color::Blue),
            Cell::new(source.subjects),
            count_cell(source.joined, Color::Green),
            Cell::new(source.new_entities),
        ]);
    }
    table.add_row(vec![
        total_cell("Total"),
        total_cell(result.subjects),
        Cell::new(""),
        total_cell(result.entities),
    ]);
    for index in 1..=3 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    println!("{table}");
    println!("closure -> {}", result.output.display());
}

pub fn print_harmonize_summary(result: &HarmonizeResult) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Concept"),
        header_cell("Observed"),
        header_cell("Mapped"),
        header_cell("Unassigned"),
        header_cell("Deleted"),
        header_cell("Dropped"),
        header_cell("Conflicts"),
        header_cell("Propagated"),
    ]);
    apply_summary_table_style(&mut table);
    for report in &result.reports {
        table.add_row(vec![
            Cell::new(&report.concept).fg(Color::Blue).add_attribute(Attribute::Bold),
            Cell::new(report.observed),
            count_cell(report.mapped, Color::Green),
            count_cell(report.unassigned, Color::Yellow),
            dim_cell(report.deleted),
            dim_cell(report.dropped),
            count_cell(report.conflicts, Color::Red),
            count_cell(report.propagated, Color::Green),
        ]);
    }
    for index in 1..=7 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    println!("{table}");
    println!("maps -> {}", result.output_dir.display());

    if result.substitutions.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Cells"),
        header_cell("Replaced"),
        header_cell("Deleted"),
        header_cell("Unassigned"),
        header_cell("Output"),
    ]);
    apply_table_style(&mut table);
    for substitution in &result.substitutions {
        let stats = &substitution.stats;
        table.add_row(vec![
            path_cell(&substitution.table),
            Cell::new(stats.cells),
            count_cell(stats.replaced, Color::Green),
            dim_cell(stats.deleted),
            count_cell(stats.unassigned, Color::Yellow),
            path_cell(&substitution.output),
        ]);
    }
    for index in 1..=4 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn total_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).add_attribute(Attribute::Bold)
}

/// Non-zero counts are highlighted, zero is dimmed.
fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn path_cell(path: &Path) -> Cell {
    Cell::new(path.display()).fg(Color::DarkGrey)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
