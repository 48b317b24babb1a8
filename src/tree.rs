use std::collections::HashMap;

use crate::dre::{
    Category, DerivedKind, DerivedRow, DreReport, Figures, Level1Group, COST_PREFIX,
    EXPENSE_PREFIX,
};
use crate::fmt::{format_amount, format_pct, format_short, NOT_APPLICABLE, PLACEHOLDER};
use crate::models::MONTHS;

// ---------------------------------------------------------------------------
// Expansion state
// ---------------------------------------------------------------------------

/// Which groups the user has opened. Everything starts collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    level1: HashMap<String, bool>,
    level2: HashMap<(String, String), bool>,
}

impl ExpansionState {
    pub fn is_level1_open(&self, level1: &str) -> bool {
        self.level1.get(level1).copied().unwrap_or(false)
    }

    pub fn is_level2_open(&self, level1: &str, level2: &str) -> bool {
        self.level2
            .get(&(level1.to_string(), level2.to_string()))
            .copied()
            .unwrap_or(false)
    }

    pub fn toggle_level1(&mut self, level1: &str) {
        let open = self.level1.entry(level1.to_string()).or_insert(false);
        *open = !*open;
    }

    pub fn toggle_level2(&mut self, level1: &str, level2: &str) {
        let open = self
            .level2
            .entry((level1.to_string(), level2.to_string()))
            .or_insert(false);
        *open = !*open;
    }

    /// Flip the flag behind a display row. Rows without one are ignored.
    pub fn toggle(&mut self, key: &RowKey) {
        match key {
            RowKey::Level1(l1) => self.toggle_level1(l1),
            RowKey::Level2(l1, l2) => self.toggle_level2(l1, l2),
            RowKey::Item(..) | RowKey::Derived(_) => {}
        }
    }

    /// Every group of the report opened.
    pub fn expanded_all(report: &DreReport) -> Self {
        let mut state = Self::default();
        for group in &report.groups {
            state.level1.insert(group.code.clone(), true);
            for sub in &group.subgroups {
                state
                    .level2
                    .insert((group.code.clone(), sub.code.clone()), true);
            }
        }
        state
    }

    pub fn collapse_all(&mut self) {
        self.level1.clear();
        self.level2.clear();
    }
}

// ---------------------------------------------------------------------------
// Display rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    Level1(String),
    Level2(String, String),
    Item(String, String, usize),
    Derived(DerivedKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Group,
    Subgroup,
    Item,
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub negative: bool,
}

impl Cell {
    fn amount(val: f64, compact: bool) -> Self {
        let text = if compact {
            if val == 0.0 {
                PLACEHOLDER.to_string()
            } else {
                format_short(val)
            }
        } else {
            format_amount(val)
        };
        Self {
            text,
            negative: val < 0.0,
        }
    }

    fn percent(val: Option<f64>) -> Self {
        match val {
            Some(v) if v.is_finite() => Self {
                text: format_pct(v),
                negative: v < 0.0,
            },
            _ => Self::placeholder(),
        }
    }

    fn variance(text: &str) -> Self {
        Self {
            negative: text.starts_with('-') && text != PLACEHOLDER,
            text: text.to_string(),
        }
    }

    fn placeholder() -> Self {
        Self {
            text: PLACEHOLDER.to_string(),
            negative: false,
        }
    }

    fn not_applicable() -> Self {
        Self {
            text: NOT_APPLICABLE.to_string(),
            negative: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRow {
    pub key: RowKey,
    /// 0 for level-1 and derived rows, 1 for level 2, 2 for line items.
    pub depth: u8,
    pub label: String,
    pub months: [Cell; MONTHS],
    pub total: Cell,
    pub average: Cell,
    pub variance: Cell,
    pub category: Category,
    pub kind: RowKind,
    /// `Some(open)` when the row can be toggled.
    pub expanded: Option<bool>,
    /// Visual separation before cost and expense groups.
    pub gap_before: bool,
}

impl DisplayRow {
    pub fn is_toggleable(&self) -> bool {
        self.expanded.is_some()
    }

    fn from_figures(
        key: RowKey,
        depth: u8,
        label: &str,
        figures: &Figures,
        category: Category,
        kind: RowKind,
        compact: bool,
    ) -> Self {
        Self {
            key,
            depth,
            label: label.to_string(),
            months: std::array::from_fn(|i| Cell::amount(figures.monthly[i], compact)),
            total: Cell::amount(figures.total, compact),
            average: Cell::amount(figures.average, compact),
            variance: Cell::variance(&figures.variance),
            category,
            kind,
            expanded: None,
            gap_before: false,
        }
    }

    fn from_derived(row: &DerivedRow) -> Self {
        let (average, category) = match row.kind {
            DerivedKind::Margin => (Cell::percent(row.average), Category::Cost),
            DerivedKind::NetProfit => (Cell::not_applicable(), Category::Profit),
        };
        Self {
            key: RowKey::Derived(row.kind),
            depth: 0,
            label: row.label.to_string(),
            months: std::array::from_fn(|i| Cell::percent(row.monthly[i])),
            total: Cell::percent(row.total),
            average,
            variance: Cell::not_applicable(),
            category,
            kind: RowKind::Derived,
            expanded: None,
            gap_before: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Scaled K/M/B amounts instead of whole numbers.
    pub compact: bool,
}

/// Flatten the report into the rows visible under `expansion`.
pub fn render(report: &DreReport, expansion: &ExpansionState) -> Vec<DisplayRow> {
    render_with(report, expansion, RenderOptions::default())
}

pub fn render_with(
    report: &DreReport,
    expansion: &ExpansionState,
    opts: RenderOptions,
) -> Vec<DisplayRow> {
    let mut out = Vec::new();
    let margin_anchor = report.margin_anchor();

    for (idx, group) in report.groups.iter().enumerate() {
        render_group(group, expansion, opts, &mut out);
        if margin_anchor == Some(idx) {
            if let Some(margin) = &report.margin {
                out.push(DisplayRow::from_derived(margin));
            }
        }
    }

    if let Some(net) = &report.net_profit {
        out.push(DisplayRow::from_derived(net));
    }
    out
}

fn render_group(
    group: &Level1Group,
    expansion: &ExpansionState,
    opts: RenderOptions,
    out: &mut Vec<DisplayRow>,
) {
    let open = group.is_expandable() && expansion.is_level1_open(&group.code);
    let mut row = DisplayRow::from_figures(
        RowKey::Level1(group.code.clone()),
        0,
        &group.code,
        &group.figures,
        group.category,
        RowKind::Group,
        opts.compact,
    );
    row.gap_before = group.code.starts_with(COST_PREFIX) || group.code.starts_with(EXPENSE_PREFIX);
    if group.is_expandable() {
        row.expanded = Some(open);
    }
    out.push(row);

    if !open {
        return;
    }

    for sub in &group.subgroups {
        let sub_open = expansion.is_level2_open(&group.code, &sub.code);
        let mut row = DisplayRow::from_figures(
            RowKey::Level2(group.code.clone(), sub.code.clone()),
            1,
            &sub.code,
            &sub.figures,
            group.category,
            RowKind::Subgroup,
            opts.compact,
        );
        row.expanded = Some(sub_open);
        out.push(row);

        if !sub_open {
            continue;
        }
        for (i, item) in sub.items.iter().enumerate() {
            out.push(DisplayRow::from_figures(
                RowKey::Item(group.code.clone(), sub.code.clone(), i),
                2,
                item.label(),
                &item.figures,
                group.category,
                RowKind::Item,
                opts.compact,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dre::aggregate;
    use crate::dre::tests::{months, sample_rows};
    use crate::models::{AccountRow, MonthSelection};

    fn labels(rows: &[DisplayRow]) -> Vec<&str> {
        rows.iter().map(|r| r.label.as_str()).collect()
    }

    #[test]
    fn test_collapsed_render_shows_level1_and_derived_rows() {
        let report = aggregate(&sample_rows(), &MonthSelection::all());
        let rows = render(&report, &ExpansionState::default());
        assert_eq!(
            labels(&rows),
            vec![
                "1.0 - RECEITA",
                "2.0 - DEDUÇÕES",
                "4.0 - CMV",
                "4.1 - MARGEM %",
                "7.0 - DESPESAS",
                "8.0 - LUCRO LÍQUIDO",
                "8.1 - LUCRO LÍQUIDO %",
            ]
        );
        assert_eq!(rows[4].expanded, Some(false));
        assert_eq!(rows[0].expanded, None);
        assert!(rows[2].gap_before && rows[4].gap_before);
        assert!(!rows[0].gap_before);
    }

    #[test]
    fn test_expanding_expense_group_reveals_sorted_children() {
        let report = aggregate(&sample_rows(), &MonthSelection::all());
        let mut state = ExpansionState::default();
        state.toggle_level1("7.0 - DESPESAS");
        state.toggle_level2("7.0 - DESPESAS", "7.1 - PESSOAL");
        let rows = render(&report, &state);
        let expense_idx = rows.iter().position(|r| r.label == "7.0 - DESPESAS").unwrap();
        let children: Vec<(&str, u8)> = rows[expense_idx + 1..expense_idx + 5]
            .iter()
            .map(|r| (r.label.as_str(), r.depth))
            .collect();
        assert_eq!(
            children,
            vec![
                ("7.1 - PESSOAL", 1),
                ("SALÁRIOS - 18", 2),
                ("ALUGUEL - 44", 2),
                ("7.2 - ADMINISTRATIVAS", 1),
            ]
        );
        assert_eq!(rows[expense_idx + 2].total.text, "-22.513");
        assert_eq!(rows[expense_idx + 3].total.text, "-18.500");
        assert!(rows[expense_idx + 2].total.negative);
    }

    #[test]
    fn test_expanded_expense_group_hides_rows_without_level2() {
        let mut input = sample_rows();
        input.push(AccountRow::new("7.0 - DESPESAS", months(&[(1, -1000.0)])));
        let report = aggregate(&input, &MonthSelection::all());
        let rows = render(&report, &ExpansionState::expanded_all(&report));
        let start = rows.iter().position(|r| r.label == "7.0 - DESPESAS").unwrap();
        assert_eq!(rows[start].total.text, "-42.913");
        let children: Vec<&DisplayRow> = rows[start + 1..]
            .iter()
            .take_while(|r| r.depth > 0)
            .collect();
        assert_eq!(children.len(), 5);
        assert_eq!(
            children.iter().filter(|r| r.depth == 1).map(|r| r.label.as_str()).collect::<Vec<_>>(),
            vec!["7.1 - PESSOAL", "7.2 - ADMINISTRATIVAS"]
        );
        assert!(children.iter().all(|r| r.label != "7.0 - DESPESAS"));
    }

    #[test]
    fn test_row_keys_are_unique() {
        let report = aggregate(&sample_rows(), &MonthSelection::all());
        let rows = render(&report, &ExpansionState::expanded_all(&report));
        let keys: std::collections::HashSet<&RowKey> = rows.iter().map(|r| &r.key).collect();
        assert_eq!(keys.len(), rows.len());
        assert!(keys.contains(&RowKey::Derived(DerivedKind::Margin)));
    }

    #[test]
    fn test_toggle_on_non_expense_group_is_noop() {
        let report = aggregate(&sample_rows(), &MonthSelection::all());
        let before = render(&report, &ExpansionState::default());
        let mut state = ExpansionState::default();
        state.toggle(&RowKey::Level1("1.0 - RECEITA".to_string()));
        assert!(state.is_level1_open("1.0 - RECEITA"));
        assert_eq!(render(&report, &state), before);
    }

    #[test]
    fn test_toggle_twice_restores_collapsed() {
        let mut state = ExpansionState::default();
        state.toggle_level1("7.0 - DESPESAS");
        state.toggle_level1("7.0 - DESPESAS");
        assert!(!state.is_level1_open("7.0 - DESPESAS"));
    }

    #[test]
    fn test_level2_hidden_while_parent_collapsed() {
        let report = aggregate(&sample_rows(), &MonthSelection::all());
        let mut state = ExpansionState::default();
        state.toggle_level2("7.0 - DESPESAS", "7.1 - PESSOAL");
        let rows = render(&report, &state);
        assert!(rows.iter().all(|r| r.depth == 0));
    }

    #[test]
    fn test_margin_cells() {
        let rows = vec![
            AccountRow::new("1.0 - RECEITA", months(&[(1, 10000.0)])),
            AccountRow::new("4.0 - CMV", months(&[(1, -6000.0)])),
        ];
        let report = aggregate(&rows, &MonthSelection::from_months([1]).unwrap());
        let display = render(&report, &ExpansionState::default());
        let margin = display.iter().find(|r| r.label == "4.1 - MARGEM %").unwrap();
        assert_eq!(margin.months[0].text, "40.0%");
        assert_eq!(margin.months[1].text, "-");
        assert_eq!(margin.total.text, "40.0%");
        assert_eq!(margin.variance.text, "–");
        assert_eq!(margin.kind, RowKind::Derived);
    }

    #[test]
    fn test_zero_figures_render_placeholder() {
        let report = aggregate(&sample_rows(), &MonthSelection::none());
        let rows = render(&report, &ExpansionState::default());
        assert_eq!(rows[0].total.text, "-");
        assert_eq!(rows[0].average.text, "-");
        assert_eq!(rows[0].variance.text, "-");
        assert!(!rows[0].variance.negative);
        assert_eq!(rows[0].months[0].text, "10.000");
    }

    #[test]
    fn test_compact_amounts() {
        let report = aggregate(&sample_rows(), &MonthSelection::all());
        let rows = render_with(
            &report,
            &ExpansionState::default(),
            RenderOptions { compact: true },
        );
        assert_eq!(rows[0].months[0].text, "10,0K");
        assert_eq!(rows[0].months[2].text, "-");
    }

    #[test]
    fn test_expanded_all_opens_every_group() {
        let report = aggregate(&sample_rows(), &MonthSelection::all());
        let mut state = ExpansionState::expanded_all(&report);
        assert_eq!(render(&report, &state).len(), 12);
        state.collapse_all();
        assert_eq!(render(&report, &state).len(), 7);
    }

    #[test]
    fn test_empty_report_renders_nothing() {
        let report = aggregate(&[], &MonthSelection::all());
        assert!(render(&report, &ExpansionState::default()).is_empty());
    }
}
