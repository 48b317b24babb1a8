use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::fmt::PLACEHOLDER;
use crate::models::{AccountRow, MonthSelection, MONTHS};

pub const REVENUE_PREFIX: &str = "1.0";
pub const COST_PREFIX: &str = "4.0";
pub const EXPENSE_PREFIX: &str = "7.0";
pub const NET_PROFIT_PREFIX: &str = "8.0";

pub const MARGIN_LABEL: &str = "4.1 - MARGEM %";
pub const NET_PROFIT_LABEL: &str = "8.1 - LUCRO LÍQUIDO %";

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Semantic bucket of a level-1 account, derived from its code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Revenue,
    Cost,
    Expense,
    Profit,
    Other,
}

impl Category {
    pub fn of(level1: &str) -> Self {
        const TABLE: &[(&str, Category)] = &[
            ("1.0", Category::Revenue),
            ("2.0", Category::Revenue),
            ("3.0", Category::Revenue),
            ("4.0", Category::Cost),
            ("4.1", Category::Cost),
            ("5.0", Category::Cost),
            ("7.0", Category::Expense),
            ("8.0", Category::Profit),
        ];
        TABLE
            .iter()
            .find(|(prefix, _)| level1.starts_with(prefix))
            .map(|(_, c)| *c)
            .unwrap_or(Category::Other)
    }
}

// ---------------------------------------------------------------------------
// Arithmetic helpers
// ---------------------------------------------------------------------------

/// Sum of the values of the selected months.
pub fn selected_sum(monthly: &[f64; MONTHS], selection: &MonthSelection) -> f64 {
    selection.iter().map(|m| monthly[(m - 1) as usize]).sum()
}

/// Selected-month sum divided by the number of selected months holding a
/// non-zero value. Zero when no such month exists.
pub fn average(monthly: &[f64; MONTHS], selection: &MonthSelection) -> f64 {
    let count = selection
        .iter()
        .filter(|m| monthly[(m - 1) as usize] != 0.0)
        .count();
    if count == 0 {
        return 0.0;
    }
    selected_sum(monthly, selection) / count as f64
}

/// `value / reference * 100` with one decimal, or the placeholder when
/// either side is zero.
pub fn variance_pct(value: f64, reference: f64) -> String {
    if value == 0.0 || reference == 0.0 || !value.is_finite() || !reference.is_finite() {
        return PLACEHOLDER.to_string();
    }
    format!("{:.1}%", value / reference * 100.0)
}

fn margin_pct(revenue: f64, cost: f64) -> Option<f64> {
    if revenue == 0.0 {
        return None;
    }
    Some((revenue - cost.abs()) / revenue * 100.0)
}

fn share_pct(value: f64, revenue: f64) -> Option<f64> {
    if revenue == 0.0 {
        return None;
    }
    Some(value / revenue * 100.0)
}

/// Leading numeric part of an account code: `"7.0 - DESPESAS"` -> 7.0.
pub fn numeric_prefix(code: &str) -> Option<f64> {
    let end = code
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(code.len());
    let mut candidate = &code[..end];
    while !candidate.is_empty() {
        if let Ok(v) = candidate.parse::<f64>() {
            return Some(v);
        }
        candidate = &candidate[..candidate.len() - 1];
    }
    None
}

fn compare_codes(a: &str, b: &str) -> Ordering {
    match (numeric_prefix(a), numeric_prefix(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

// ---------------------------------------------------------------------------
// Aggregated structure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Figures {
    /// All twelve months, regardless of the selection.
    pub monthly: [f64; MONTHS],
    /// Sum over the selected months.
    pub total: f64,
    pub average: f64,
    pub variance: String,
}

impl Figures {
    fn from_rows<'a>(
        rows: impl IntoIterator<Item = &'a AccountRow>,
        selection: &MonthSelection,
        reference_average: Option<f64>,
    ) -> Self {
        let mut monthly = [0.0; MONTHS];
        for row in rows {
            for (acc, v) in monthly.iter_mut().zip(row.monthly.iter()) {
                *acc += v;
            }
        }
        let average = average(&monthly, selection);
        let variance = match reference_average {
            Some(reference) => variance_pct(average, reference),
            None => PLACEHOLDER.to_string(),
        };
        Self {
            total: selected_sum(&monthly, selection),
            monthly,
            average,
            variance,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub row: AccountRow,
    pub figures: Figures,
}

impl LineItem {
    pub fn label(&self) -> &str {
        self.row
            .level3
            .as_deref()
            .or(self.row.level2.as_deref())
            .unwrap_or(&self.row.level1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Level2Group {
    pub code: String,
    /// Sorted ascending by each row's full-year total.
    pub items: Vec<LineItem>,
    pub figures: Figures,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Level1Group {
    pub code: String,
    pub category: Category,
    /// Rows without a level 2 (the `_totals` bucket).
    pub totals: Vec<AccountRow>,
    pub subgroups: Vec<Level2Group>,
    /// Sum of every member row, `totals` and sub-groups alike.
    pub figures: Figures,
}

impl Level1Group {
    /// Only expense groups open up to show their level-2 breakdown.
    pub fn is_expandable(&self) -> bool {
        self.code.starts_with(EXPENSE_PREFIX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedKind {
    Margin,
    NetProfit,
}

/// Percentage row synthesized from the reference rows. `None` cells render
/// as placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRow {
    pub kind: DerivedKind,
    pub label: &'static str,
    pub monthly: [Option<f64>; MONTHS],
    pub total: Option<f64>,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct References {
    pub revenue: Option<AccountRow>,
    pub cost: Option<AccountRow>,
    pub net_profit: Option<AccountRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DreReport {
    /// Ascending by the numeric prefix of the level-1 code.
    pub groups: Vec<Level1Group>,
    pub margin: Option<DerivedRow>,
    pub net_profit: Option<DerivedRow>,
    pub references: References,
    pub selection: MonthSelection,
}

/// Selected-month totals used for the report footer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub revenue: Option<f64>,
    pub net_profit: Option<f64>,
    pub net_margin: Option<f64>,
}

impl DreReport {
    /// Index of the group the margin row follows.
    pub fn margin_anchor(&self) -> Option<usize> {
        self.margin.as_ref()?;
        self.groups
            .iter()
            .position(|g| g.code.starts_with(COST_PREFIX))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn summary(&self) -> Summary {
        let sel = &self.selection;
        let revenue = self
            .references
            .revenue
            .as_ref()
            .map(|r| selected_sum(&r.monthly, sel));
        let net_profit = self
            .references
            .net_profit
            .as_ref()
            .map(|r| selected_sum(&r.monthly, sel));
        let net_margin = match (revenue, net_profit) {
            (Some(r), Some(p)) => share_pct(p, r),
            _ => None,
        };
        Summary {
            revenue,
            net_profit,
            net_margin,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

fn find_reference(rows: &[AccountRow], prefix: &str) -> Option<AccountRow> {
    rows.iter().find(|r| r.level1.starts_with(prefix)).cloned()
}

#[derive(Default)]
struct Bucket {
    totals: Vec<AccountRow>,
    level2: BTreeMap<String, Vec<AccountRow>>,
}

/// Group flat account rows into the level-1 / level-2 / level-3 tree and
/// compute every figure for the given month selection.
pub fn aggregate(rows: &[AccountRow], selection: &MonthSelection) -> DreReport {
    let mut ordered = rows.to_vec();
    ordered.sort_by(|a, b| a.level1.cmp(&b.level1));

    let references = References {
        revenue: find_reference(&ordered, REVENUE_PREFIX),
        cost: find_reference(&ordered, COST_PREFIX),
        net_profit: find_reference(&ordered, NET_PROFIT_PREFIX),
    };
    let reference_average = references
        .revenue
        .as_ref()
        .map(|r| average(&r.monthly, selection));

    let mut buckets: BTreeMap<String, Bucket> = BTreeMap::new();
    for row in ordered {
        let bucket = buckets.entry(row.level1.clone()).or_default();
        match row.level2.clone() {
            Some(level2) => bucket.level2.entry(level2).or_default().push(row),
            None => bucket.totals.push(row),
        }
    }

    let mut groups: Vec<Level1Group> = buckets
        .into_iter()
        .map(|(code, bucket)| build_level1(code, bucket, selection, reference_average))
        .collect();
    groups.sort_by(|a, b| compare_codes(&a.code, &b.code));

    let margin = groups
        .iter()
        .any(|g| g.code.starts_with(COST_PREFIX))
        .then(|| margin_row(&references, selection));
    let net_profit = (!groups.is_empty()).then(|| net_profit_row(&references, selection));

    DreReport {
        groups,
        margin,
        net_profit,
        references,
        selection: selection.clone(),
    }
}

fn build_level1(
    code: String,
    bucket: Bucket,
    selection: &MonthSelection,
    reference_average: Option<f64>,
) -> Level1Group {
    let mut subgroups: Vec<Level2Group> = bucket
        .level2
        .into_iter()
        .map(|(level2, rows)| build_level2(level2, rows, selection, reference_average))
        .collect();
    subgroups.sort_by(|a, b| full_year(a).total_cmp(&full_year(b)));

    let members = bucket
        .totals
        .iter()
        .chain(subgroups.iter().flat_map(|g| g.items.iter().map(|i| &i.row)));
    let figures = Figures::from_rows(members, selection, reference_average);

    Level1Group {
        category: Category::of(&code),
        code,
        totals: bucket.totals,
        subgroups,
        figures,
    }
}

fn full_year(group: &Level2Group) -> f64 {
    group.items.iter().map(|i| i.row.total).sum()
}

fn build_level2(
    code: String,
    rows: Vec<AccountRow>,
    selection: &MonthSelection,
    reference_average: Option<f64>,
) -> Level2Group {
    let figures = Figures::from_rows(&rows, selection, reference_average);
    let mut items: Vec<LineItem> = rows
        .into_iter()
        .map(|row| LineItem {
            figures: Figures::from_rows(std::iter::once(&row), selection, reference_average),
            row,
        })
        .collect();
    items.sort_by(|a, b| a.row.total.total_cmp(&b.row.total));
    Level2Group {
        code,
        items,
        figures,
    }
}

fn margin_row(refs: &References, selection: &MonthSelection) -> DerivedRow {
    let mut row = DerivedRow {
        kind: DerivedKind::Margin,
        label: MARGIN_LABEL,
        monthly: [None; MONTHS],
        total: None,
        average: None,
    };
    if let (Some(rev), Some(cost)) = (&refs.revenue, &refs.cost) {
        for (month, cell) in (1..).zip(row.monthly.iter_mut()) {
            *cell = margin_pct(rev.value(month), cost.value(month));
        }
        row.total = margin_pct(
            selected_sum(&rev.monthly, selection),
            selected_sum(&cost.monthly, selection),
        );
        row.average = margin_pct(
            average(&rev.monthly, selection),
            average(&cost.monthly, selection),
        );
    }
    row
}

fn net_profit_row(refs: &References, selection: &MonthSelection) -> DerivedRow {
    let mut row = DerivedRow {
        kind: DerivedKind::NetProfit,
        label: NET_PROFIT_LABEL,
        monthly: [None; MONTHS],
        total: None,
        average: None,
    };
    if let (Some(rev), Some(profit)) = (&refs.revenue, &refs.net_profit) {
        for (month, cell) in (1..).zip(row.monthly.iter_mut()) {
            *cell = share_pct(profit.value(month), rev.value(month));
        }
        row.total = share_pct(
            selected_sum(&profit.monthly, selection),
            selected_sum(&rev.monthly, selection),
        );
    }
    row
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn months(values: &[(u32, f64)]) -> [f64; MONTHS] {
        let mut out = [0.0; MONTHS];
        for (m, v) in values {
            out[(*m - 1) as usize] = *v;
        }
        out
    }

    const TOTALS_BUCKET: &str = "_totals";

    /// Rows of one level-2 bucket, or of the rows without a level 2.
    fn bucket<'a>(group: &'a Level1Group, key: &str) -> Option<Vec<&'a AccountRow>> {
        if key == TOTALS_BUCKET {
            return Some(group.totals.iter().collect());
        }
        group
            .subgroups
            .iter()
            .find(|g| g.code == key)
            .map(|g| g.items.iter().map(|i| &i.row).collect())
    }

    pub(crate) fn sample_rows() -> Vec<AccountRow> {
        vec![
            AccountRow::new("8.0 - LUCRO LÍQUIDO", months(&[(1, 1500.0), (2, 500.0)])),
            AccountRow::new("1.0 - RECEITA", months(&[(1, 10000.0), (2, 8000.0)])),
            AccountRow::new("4.0 - CMV", months(&[(1, -6000.0), (2, -4000.0)])),
            AccountRow::new("7.0 - DESPESAS", months(&[(1, -22513.0)]))
                .with_level2("7.1 - PESSOAL")
                .with_level3("SALÁRIOS - 18"),
            AccountRow::new("7.0 - DESPESAS", months(&[(1, -18500.0)]))
                .with_level2("7.1 - PESSOAL")
                .with_level3("ALUGUEL - 44"),
            AccountRow::new("7.0 - DESPESAS", months(&[(2, -900.0)]))
                .with_level2("7.2 - ADMINISTRATIVAS")
                .with_level3("TELEFONE - 12"),
            AccountRow::new("2.0 - DEDUÇÕES", months(&[(1, -300.0)])),
        ]
    }

    fn sel(m: &[u32]) -> MonthSelection {
        MonthSelection::from_months(m.iter().copied()).unwrap()
    }

    #[test]
    fn test_average_ignores_zero_months() {
        let values = months(&[(1, 100.0), (3, 300.0)]);
        assert_eq!(average(&values, &sel(&[1, 2, 3])), 200.0);
        assert_eq!(average(&values, &sel(&[2])), 0.0);
        assert_eq!(average(&values, &MonthSelection::none()), 0.0);
    }

    #[test]
    fn test_variance_pct_placeholder_on_zero() {
        assert_eq!(variance_pct(0.0, 100.0), "-");
        assert_eq!(variance_pct(100.0, 0.0), "-");
        assert_eq!(variance_pct(-250.0, 1000.0), "-25.0%");
    }

    #[test]
    fn test_numeric_prefix() {
        assert_eq!(numeric_prefix("7.0 - DESPESAS"), Some(7.0));
        assert_eq!(numeric_prefix("10.0 - OUTROS"), Some(10.0));
        assert_eq!(numeric_prefix("1.0.1 SUB"), Some(1.0));
        assert_eq!(numeric_prefix("RECEITA"), None);
    }

    #[test]
    fn test_groups_sorted_by_numeric_prefix() {
        let report = aggregate(&sample_rows(), &MonthSelection::all());
        let codes: Vec<&str> = report.groups.iter().map(|g| g.code.as_str()).collect();
        assert_eq!(
            codes,
            vec![
                "1.0 - RECEITA",
                "2.0 - DEDUÇÕES",
                "4.0 - CMV",
                "7.0 - DESPESAS",
                "8.0 - LUCRO LÍQUIDO"
            ]
        );
    }

    #[test]
    fn test_rows_without_level2_land_in_totals_bucket() {
        let report = aggregate(&sample_rows(), &MonthSelection::all());
        let revenue = &report.groups[0];
        assert_eq!(revenue.totals.len(), 1);
        assert!(revenue.subgroups.is_empty());
        assert_eq!(bucket(revenue, TOTALS_BUCKET).map(|b| b.len()), Some(1));

        let expenses = &report.groups[3];
        assert!(expenses.totals.is_empty());
        assert_eq!(bucket(expenses, "7.1 - PESSOAL").map(|b| b.len()), Some(2));
        assert!(bucket(expenses, "7.9 - NADA").is_none());
    }

    #[test]
    fn test_level1_figures_sum_every_member() {
        let report = aggregate(&sample_rows(), &sel(&[1]));
        let expenses = &report.groups[3];
        assert_eq!(expenses.figures.monthly[0], -41013.0);
        // Month 2 is displayed even though it is not selected.
        assert_eq!(expenses.figures.monthly[1], -900.0);
        assert_eq!(expenses.figures.total, -41013.0);
        assert_eq!(expenses.figures.average, -41013.0);
    }

    #[test]
    fn test_expense_rows_without_level2_count_toward_group() {
        let mut rows = sample_rows();
        rows.push(AccountRow::new("7.0 - DESPESAS", months(&[(1, -1000.0)])));
        let report = aggregate(&rows, &sel(&[1]));
        let expenses = &report.groups[3];
        assert_eq!(expenses.totals.len(), 1);
        assert_eq!(expenses.subgroups.len(), 2);
        assert_eq!(expenses.figures.monthly[0], -42013.0);
        assert_eq!(expenses.figures.total, -42013.0);
        assert_eq!(bucket(expenses, TOTALS_BUCKET).map(|b| b.len()), Some(1));
    }

    #[test]
    fn test_month_filter_only_affects_total_average_variance() {
        let all = aggregate(&sample_rows(), &MonthSelection::all());
        let feb = aggregate(&sample_rows(), &sel(&[2]));
        assert_eq!(all.groups[0].figures.monthly, feb.groups[0].figures.monthly);
        assert_eq!(all.groups[0].figures.total, 18000.0);
        assert_eq!(feb.groups[0].figures.total, 8000.0);
        assert_eq!(feb.groups[0].figures.variance, "100.0%");
    }

    #[test]
    fn test_variance_against_revenue_average() {
        let report = aggregate(&sample_rows(), &sel(&[1, 2]));
        // revenue average 9000, CMV average -5000
        assert_eq!(report.groups[2].figures.variance, "-55.6%");
    }

    #[test]
    fn test_variance_placeholder_without_revenue() {
        let rows = vec![AccountRow::new("4.0 - CMV", months(&[(1, -6000.0)]))];
        let report = aggregate(&rows, &sel(&[1]));
        assert_eq!(report.groups[0].figures.variance, "-");
    }

    #[test]
    fn test_level2_and_level3_sorted_ascending() {
        let report = aggregate(&sample_rows(), &MonthSelection::all());
        let expenses = &report.groups[3];
        assert_eq!(expenses.subgroups[0].code, "7.1 - PESSOAL");
        assert_eq!(expenses.subgroups[1].code, "7.2 - ADMINISTRATIVAS");
        let labels: Vec<&str> = expenses.subgroups[0].items.iter().map(|i| i.label()).collect();
        assert_eq!(labels, vec!["SALÁRIOS - 18", "ALUGUEL - 44"]);
    }

    #[test]
    fn test_margin_row_from_revenue_and_cost() {
        let rows = vec![
            AccountRow::new("1.0 - RECEITA", months(&[(1, 10000.0)])),
            AccountRow::new("4.0 - CMV", months(&[(1, -6000.0)])),
        ];
        let report = aggregate(&rows, &sel(&[1]));
        let margin = report.margin.as_ref().unwrap();
        assert!((margin.monthly[0].unwrap() - 40.0).abs() < 1e-9);
        assert!((margin.total.unwrap() - 40.0).abs() < 1e-9);
        assert!((margin.average.unwrap() - 40.0).abs() < 1e-9);
        assert_eq!(margin.monthly[1], None);
        assert_eq!(report.margin_anchor(), Some(1));
    }

    #[test]
    fn test_margin_degrades_without_revenue() {
        let rows = vec![AccountRow::new("4.0 - CMV", months(&[(1, -6000.0)]))];
        let report = aggregate(&rows, &sel(&[1]));
        let margin = report.margin.as_ref().unwrap();
        assert!(margin.monthly.iter().all(|c| c.is_none()));
        assert_eq!(margin.total, None);
    }

    #[test]
    fn test_no_margin_row_without_cost_group() {
        let rows = vec![AccountRow::new("1.0 - RECEITA", months(&[(1, 10000.0)]))];
        let report = aggregate(&rows, &sel(&[1]));
        assert!(report.margin.is_none());
        assert_eq!(report.margin_anchor(), None);
        assert!(report.net_profit.is_some());
    }

    #[test]
    fn test_net_profit_row() {
        let report = aggregate(&sample_rows(), &sel(&[1, 2]));
        let net = report.net_profit.as_ref().unwrap();
        assert!((net.monthly[0].unwrap() - 15.0).abs() < 1e-9);
        assert!((net.monthly[1].unwrap() - 6.25).abs() < 1e-9);
        assert_eq!(net.monthly[2], None);
        // 2000 / 18000
        assert!((net.total.unwrap() - 11.111).abs() < 1e-3);
        assert_eq!(net.average, None);
    }

    #[test]
    fn test_empty_input_gives_empty_report() {
        let report = aggregate(&[], &MonthSelection::all());
        assert!(report.is_empty());
        assert!(report.margin.is_none());
        assert!(report.net_profit.is_none());
        assert_eq!(report.summary().revenue, None);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let rows = sample_rows();
        let selection = sel(&[1, 2, 5]);
        assert_eq!(aggregate(&rows, &selection), aggregate(&rows, &selection));
    }

    #[test]
    fn test_summary_over_selection() {
        let report = aggregate(&sample_rows(), &sel(&[1, 2]));
        let summary = report.summary();
        assert_eq!(summary.revenue, Some(18000.0));
        assert_eq!(summary.net_profit, Some(2000.0));
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(Category::of("1.0 - RECEITA"), Category::Revenue);
        assert_eq!(Category::of("3.0 - RECEITA LÍQUIDA"), Category::Revenue);
        assert_eq!(Category::of("4.1 - MARGEM %"), Category::Cost);
        assert_eq!(Category::of("5.0 - LUCRO BRUTO"), Category::Cost);
        assert_eq!(Category::of("7.0 - DESPESAS"), Category::Expense);
        assert_eq!(Category::of("8.0 - LUCRO"), Category::Profit);
        assert_eq!(Category::of("6.0 - OUTROS"), Category::Other);
    }
}
