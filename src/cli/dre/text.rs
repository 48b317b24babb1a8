use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::dre::{aggregate, DreReport};
use crate::fmt::{format_value, PLACEHOLDER};
use crate::models::{AccountRow, MONTHS};
use crate::tree::{self, DisplayRow, ExpansionState, RenderOptions, RowKind};

use super::DreParams;

/// Aggregate, render and format a DRE as a plain-text table.
pub fn report(rows: &[AccountRow], params: &DreParams, expand_all: bool) -> String {
    let report = aggregate(rows, &params.selection);
    let expansion = if expand_all {
        ExpansionState::expanded_all(&report)
    } else {
        ExpansionState::default()
    };
    let display = tree::render_with(
        &report,
        &expansion,
        RenderOptions {
            compact: params.compact,
        },
    );
    let title = format!(
        "DRE - Realizada \u{2014} {} {} (months: {})",
        params.modelo, params.year, params.selection
    );
    if report.is_empty() {
        return format!("{title}\nNo DRE data found.");
    }
    format!(
        "{title}\n{}\n\n{}",
        format_rows(&display),
        format_summary(&report)
    )
}

pub fn format_rows(rows: &[DisplayRow]) -> String {
    let mut table = Table::new();
    let mut header = vec!["DRE".to_string()];
    header.extend((1..=MONTHS).map(|m| m.to_string()));
    header.extend(["Total", "Média", "Var %"].map(String::from));
    table.set_header(header);

    for row in rows {
        if row.gap_before {
            table.add_row(vec![Cell::new(""); MONTHS + 4]);
        }
        let mut cells = vec![Cell::new(label(row))];
        for cell in row.months.iter().chain([&row.total, &row.average, &row.variance]) {
            let text = if cell.negative {
                cell.text.red().to_string()
            } else {
                cell.text.clone()
            };
            cells.push(Cell::new(text).set_alignment(CellAlignment::Right));
        }
        table.add_row(cells);
    }
    table.to_string()
}

fn label(row: &DisplayRow) -> String {
    let marker = match row.expanded {
        Some(true) => "\u{25be} ",
        Some(false) => "\u{25b8} ",
        None => "",
    };
    let text = format!("{}{marker}{}", "  ".repeat(row.depth as usize), row.label);
    match row.kind {
        RowKind::Group | RowKind::Derived => text.bold().to_string(),
        RowKind::Subgroup | RowKind::Item => text,
    }
}

pub fn format_summary(report: &DreReport) -> String {
    let summary = report.summary();
    let money = |v: Option<f64>| v.map_or(PLACEHOLDER.to_string(), |v| format_value(v, "R$"));
    let margin = summary
        .net_margin
        .map_or(PLACEHOLDER.to_string(), |v| format_value(v, "%"));
    format!(
        "Revenue: {}   Net profit: {}   Net margin: {}",
        money(summary.revenue),
        money(summary.net_profit),
        margin
    )
}
