use std::sync::mpsc::{self, Receiver, Sender};

use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Layout},
    style::{Modifier, Style},
    text::Span,
    widgets::{Cell, Paragraph, Row, Table},
    Frame,
};

use crate::api::{RequestSequence, Ticket};
use crate::dre::{aggregate, DreReport};
use crate::error::Result;
use crate::models::{AccountRow, MonthSelection, MONTHS};
use crate::tree::{self, DisplayRow, ExpansionState, RenderOptions, RowKind};
use crate::tui::{
    category_style, run_report_view, ReportView, ReportViewAction, AMOUNT_NEG_STYLE,
    ERROR_STYLE, FOOTER_STYLE, HEADER_STYLE, SELECTED_STYLE,
};

use super::{DreParams, Source};

const BOLD: Style = Style::new().add_modifier(Modifier::BOLD);
const HEADER_ROW_STYLE: Style = Style::new()
    .fg(ratatui::style::Color::DarkGray)
    .add_modifier(Modifier::BOLD);

/// Below this width the monthly columns are hidden.
const MONTH_COLUMNS_MIN_WIDTH: u16 = 140;

pub fn run(source: Source, params: DreParams) -> Result<()> {
    let mut view = DreView::new(source, params, chrono::Local::now().date_naive());
    view.request();
    run_report_view(&mut view)
}

/// Result of one background load.
pub(crate) struct Loaded {
    ticket: Ticket,
    result: Result<Vec<AccountRow>>,
}

pub(crate) struct DreView {
    source: Source,
    params: DreParams,
    today: chrono::NaiveDate,
    rows: Vec<AccountRow>,
    report: DreReport,
    expansion: ExpansionState,
    display: Vec<DisplayRow>,
    selected: usize,
    offset: usize,
    /// Terminal lines available to table rows.
    body_height: usize,
    loading: bool,
    status: Option<String>,
    sequence: RequestSequence,
    tx: Sender<Loaded>,
    rx: Receiver<Loaded>,
}

impl DreView {
    pub(crate) fn new(source: Source, params: DreParams, today: chrono::NaiveDate) -> Self {
        let (tx, rx) = mpsc::channel();
        let report = aggregate(&[], &params.selection);
        Self {
            source,
            params,
            today,
            rows: Vec::new(),
            report,
            expansion: ExpansionState::default(),
            display: Vec::new(),
            selected: 0,
            offset: 0,
            body_height: 20,
            loading: false,
            status: None,
            sequence: RequestSequence::default(),
            tx,
            rx,
        }
    }

    /// Start loading the current year/modelo on a worker thread. Any load
    /// still in flight becomes stale.
    pub(crate) fn request(&mut self) {
        let ticket = self.sequence.begin();
        self.loading = true;
        let source = self.source.clone();
        let (modelo, year) = (self.params.modelo, self.params.year);
        let tx = self.tx.clone();
        tracing::debug!(?ticket, year, modelo = %modelo, "starting DRE load");
        std::thread::spawn(move || {
            let result = source.load(modelo, year);
            let _ = tx.send(Loaded { ticket, result });
        });
    }

    pub(crate) fn apply_loaded(&mut self, loaded: Loaded) {
        if !self.sequence.is_current(loaded.ticket) {
            tracing::debug!(ticket = ?loaded.ticket, "discarding stale DRE response");
            return;
        }
        self.loading = false;
        match loaded.result {
            Ok(rows) => {
                self.rows = rows;
                self.status = None;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load DRE");
                self.rows.clear();
                self.status = Some(format!("Load failed: {e}"));
            }
        }
        self.rebuild();
    }

    /// Recompute the aggregation for the current rows and month selection.
    fn rebuild(&mut self) {
        self.report = aggregate(&self.rows, &self.params.selection);
        self.refresh_display();
    }

    /// Re-render after an expansion change; the aggregation is untouched.
    fn refresh_display(&mut self) {
        self.display = tree::render_with(
            &self.report,
            &self.expansion,
            RenderOptions {
                compact: self.params.compact,
            },
        );
        self.selected = self.selected.min(self.display.len().saturating_sub(1));
        self.scroll_to_selected();
    }

    /// Rows from `start` that fit in the body. Gap rows take an extra line.
    fn rows_fitting(&self, start: usize) -> usize {
        let mut used = 0;
        let mut count = 0;
        for row in self.display.iter().skip(start) {
            used += row_lines(row);
            if used > self.body_height {
                break;
            }
            count += 1;
        }
        count.max(1)
    }

    fn scroll_to_selected(&mut self) {
        if self.selected < self.offset {
            self.offset = self.selected;
            return;
        }
        while self.offset < self.selected
            && self.selected >= self.offset + self.rows_fitting(self.offset)
        {
            self.offset += 1;
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.display.is_empty() {
            return;
        }
        let max = self.display.len() - 1;
        self.selected = self.selected.saturating_add_signed(delta).min(max);
        self.scroll_to_selected();
    }

    fn toggle_selected(&mut self) {
        if let Some(row) = self.display.get(self.selected) {
            if row.is_toggleable() {
                let key = row.key.clone();
                self.expansion.toggle(&key);
                self.refresh_display();
            }
        }
    }

    fn toggle_month(&mut self, month: u32) {
        self.params.selection.toggle(month);
        self.rebuild();
    }

    fn change_period(&mut self, year_delta: i32, next_modelo: bool) {
        if self.source.is_fixed() {
            self.status = Some("Year and modelo are fixed by --input".to_string());
            return;
        }
        self.params.year += year_delta;
        if next_modelo {
            self.params.modelo = self.params.modelo.next();
        }
        if year_delta != 0 {
            self.params.selection = MonthSelection::default_for(self.params.year, self.today);
        }
        self.status = None;
        self.request();
    }

    fn title(&self) -> String {
        let state = if self.loading { "  loading\u{2026}" } else { "" };
        format!(
            " DRE - Realizada \u{2014} {} {}  months: {}{state}",
            self.params.modelo, self.params.year, self.params.selection
        )
    }

    fn table_row(&self, idx: usize, row: &DisplayRow, show_months: bool) -> Row<'static> {
        let marker = match row.expanded {
            Some(true) => "\u{25be} ",
            Some(false) => "\u{25b8} ",
            None => "  ",
        };
        let label = format!("{}{marker}{}", "  ".repeat(row.depth as usize), row.label);
        let label_style = match row.kind {
            RowKind::Group | RowKind::Derived => category_style(row.category).patch(BOLD),
            RowKind::Subgroup => category_style(row.category),
            RowKind::Item => Style::new(),
        };

        let mut cells = vec![Cell::from(Span::styled(label, label_style))];
        let figures: Vec<&tree::Cell> = if show_months {
            row.months.iter().collect()
        } else {
            Vec::new()
        };
        for c in figures
            .into_iter()
            .chain([&row.total, &row.average, &row.variance])
        {
            let style = if c.negative {
                AMOUNT_NEG_STYLE
            } else {
                Style::new()
            };
            cells.push(Cell::from(Span::styled(format!("{:>9}", c.text), style)));
        }

        let mut out = Row::new(cells);
        if row.gap_before {
            out = out.top_margin(1);
        }
        if idx == self.selected {
            out = out.style(SELECTED_STYLE);
        }
        out
    }
}

impl ReportView for DreView {
    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let [header_area, sep_area, content_area, status_area, footer_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(Paragraph::new(self.title()).style(HEADER_STYLE), header_area);
        frame.render_widget(
            Paragraph::new("\u{2501}".repeat(area.width as usize)).style(FOOTER_STYLE),
            sep_area,
        );

        let show_months = area.width >= MONTH_COLUMNS_MIN_WIDTH;
        let mut widths = vec![Constraint::Fill(1)];
        let mut header = vec![Cell::from("DRE")];
        if show_months {
            widths.extend(std::iter::repeat(Constraint::Length(9)).take(MONTHS));
            header.extend((1..=MONTHS as u32).map(|m| {
                Cell::from(Span::styled(
                    format!("{m:>9}"),
                    month_header_style(&self.params.selection, m),
                ))
            }));
        }
        widths.extend([Constraint::Length(9); 3]);
        header.extend(["Total", "Média", "Var %"].map(|h| Cell::from(format!("{h:>9}"))));

        let header_overhead = 2u16;
        self.body_height = (content_area.height.saturating_sub(header_overhead) as usize).max(1);
        self.scroll_to_selected();

        if self.display.is_empty() {
            let msg = if self.loading { " Loading\u{2026}" } else { " No DRE data found." };
            frame.render_widget(Paragraph::new(msg).style(FOOTER_STYLE), content_area);
        } else {
            let rows: Vec<Row> = self
                .display
                .iter()
                .enumerate()
                .skip(self.offset)
                .take(self.rows_fitting(self.offset))
                .map(|(i, r)| self.table_row(i, r, show_months))
                .collect();
            let table = Table::new(rows, widths)
                .header(Row::new(header).style(HEADER_ROW_STYLE).bottom_margin(1))
                .column_spacing(1);
            frame.render_widget(table, content_area);
        }

        if let Some(status) = &self.status {
            frame.render_widget(
                Paragraph::new(format!(" {status}")).style(ERROR_STYLE),
                status_area,
            );
        }

        frame.render_widget(
            Paragraph::new(
                " \u{2191}/\u{2193}=move  Enter=expand  \u{2190}/\u{2192}=year  m=modelo  \
                 1-9,0,-,==month  a=all  d=default  c=compact  q/Esc=close",
            )
            .style(FOOTER_STYLE),
            footer_area,
        );
    }

    fn handle_key(&mut self, code: KeyCode) -> ReportViewAction {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return ReportViewAction::Close,
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-(self.rows_fitting(self.offset) as isize)),
            KeyCode::PageDown => self.move_selection(self.rows_fitting(self.offset) as isize),
            KeyCode::Home => self.move_selection(isize::MIN / 2),
            KeyCode::End => self.move_selection(isize::MAX / 2),
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_selected(),
            KeyCode::Left => self.change_period(-1, false),
            KeyCode::Right => self.change_period(1, false),
            KeyCode::Char('m') => self.change_period(0, true),
            KeyCode::Char('a') => {
                self.params.selection = MonthSelection::all();
                self.rebuild();
            }
            KeyCode::Char('d') => {
                self.params.selection = MonthSelection::default_for(self.params.year, self.today);
                self.rebuild();
            }
            KeyCode::Char('c') => {
                self.params.compact = !self.params.compact;
                self.refresh_display();
            }
            KeyCode::Char(c) => {
                if let Some(month) = month_key(c) {
                    self.toggle_month(month);
                }
            }
            _ => {}
        }
        ReportViewAction::Continue
    }

    fn tick(&mut self) {
        while let Ok(loaded) = self.rx.try_recv() {
            self.apply_loaded(loaded);
        }
    }
}

/// Months feeding Total / Average / Var% stand out in the header.
fn month_header_style(selection: &MonthSelection, month: u32) -> Style {
    if selection.contains(month) {
        HEADER_STYLE
    } else {
        HEADER_ROW_STYLE
    }
}

fn row_lines(row: &DisplayRow) -> usize {
    1 + usize::from(row.gap_before)
}

/// `1`..`9` are months 1-9; `0`, `-`, `=` are 10, 11, 12.
fn month_key(c: char) -> Option<u32> {
    match c {
        '1'..='9' => c.to_digit(10),
        '0' => Some(10),
        '-' => Some(11),
        '=' => Some(12),
        _ => None,
    }
}
