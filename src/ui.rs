use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use fund_tracker::{format_amount, FundLedger, Rejection, ScoreResult};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Submitter,
    Amount,
    Category,
}

impl Field {
    pub fn next(&self) -> Self {
        match self {
            Field::Submitter => Field::Amount,
            Field::Amount => Field::Category,
            Field::Category => Field::Submitter,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Field::Submitter => Field::Category,
            Field::Amount => Field::Submitter,
            Field::Category => Field::Amount,
        }
    }
}

/// Result of the last form submission, shown under the form
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Accepted { advisory: ScoreResult, remaining: f64 },
    Rejected(Rejection),
    InputError(String),
}

pub struct App {
    pub ledger: FundLedger,
    pub categories: Vec<String>,
    pub category_index: usize,
    /// Typed category, used when the rate table has no entries
    pub custom_category: String,
    pub submitter: String,
    pub amount: String,
    pub focus: Field,
    pub outcome: Option<Outcome>,
    pub state: TableState,
}

impl App {
    pub fn new(ledger: FundLedger) -> Self {
        let categories = ledger
            .rates()
            .categories()
            .into_iter()
            .map(|c| c.to_string())
            .collect();

        Self {
            ledger,
            categories,
            category_index: 0,
            custom_category: String::new(),
            submitter: String::new(),
            amount: String::new(),
            focus: Field::Submitter,
            outcome: None,
            state: TableState::default(),
        }
    }

    pub fn selected_category(&self) -> Option<&str> {
        if self.categories.is_empty() {
            let typed = self.custom_category.trim();
            return (!typed.is_empty()).then_some(typed);
        }
        self.categories.get(self.category_index).map(|c| c.as_str())
    }

    /// No rates loaded: the category is typed instead of picked
    pub fn category_is_free_text(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn next_category(&mut self) {
        if !self.categories.is_empty() {
            self.category_index = (self.category_index + 1) % self.categories.len();
        }
    }

    pub fn previous_category(&mut self) {
        if !self.categories.is_empty() {
            self.category_index = if self.category_index == 0 {
                self.categories.len() - 1
            } else {
                self.category_index - 1
            };
        }
    }

    pub fn push_char(&mut self, ch: char) {
        match self.focus {
            Field::Submitter => self.submitter.push(ch),
            Field::Amount if ch.is_ascii_digit() || ch == '.' || ch == ',' => self.amount.push(ch),
            Field::Category if self.category_is_free_text() => self.custom_category.push(ch),
            _ => {}
        }
    }

    pub fn backspace(&mut self) {
        match self.focus {
            Field::Submitter => {
                self.submitter.pop();
            }
            Field::Amount => {
                self.amount.pop();
            }
            Field::Category => {
                self.custom_category.pop();
            }
        }
    }

    /// Hint for the amount field: the selected category's market rate
    pub fn amount_hint(&self) -> String {
        match self.selected_category() {
            Some(category) => self.ledger.rates().placeholder_hint(category),
            None => "Enter amount".to_string(),
        }
    }

    /// Record the form contents; clears the amount on success
    pub fn submit(&mut self) {
        let category = match self.selected_category() {
            Some(category) => category.to_string(),
            None => {
                self.outcome = Some(Outcome::InputError(
                    "Please enter a project category".to_string(),
                ));
                return;
            }
        };

        let amount = match self.amount.replace(',', "").trim().parse::<f64>() {
            Ok(amount) => amount,
            Err(_) => {
                self.outcome = Some(Outcome::InputError(
                    "Please enter a valid amount".to_string(),
                ));
                return;
            }
        };

        self.outcome = Some(match self.ledger.record(&self.submitter, amount, &category) {
            Ok(receipt) => {
                self.amount.clear();
                self.state.select(Some(self.ledger.transactions().len() - 1));
                Outcome::Accepted {
                    advisory: receipt.advisory,
                    remaining: receipt.remaining,
                }
            }
            Err(rejection) => Outcome::Rejected(rejection),
        });
    }

    pub fn next(&mut self) {
        let len = self.ledger.transactions().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            Some(_) => 0,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.ledger.transactions().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key.code {
                KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Tab => app.focus = app.focus.next(),
                KeyCode::BackTab => app.focus = app.focus.previous(),
                KeyCode::Enter => app.submit(),
                KeyCode::Left if app.focus == Field::Category => app.previous_category(),
                KeyCode::Right if app.focus == Field::Category => app.next_category(),
                KeyCode::Down => app.next(),
                KeyCode::Up => app.previous(),
                KeyCode::Backspace => app.backspace(),
                KeyCode::Char(ch) => app.push_char(ch),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Header
            Constraint::Length(11), // Form + fund chart
            Constraint::Min(0),     // Transactions
            Constraint::Length(3),  // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);

    render_form(f, middle[0], app);
    render_fund_chart(f, middle[1], app);
    render_table(f, chunks[2], app);
    render_status_bar(f, chunks[3]);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let summary = app.ledger.summary();
    let flagged = app.ledger.flagged().len();

    let spans = vec![
        Span::styled(
            "MLA Fund Tracker",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Budget: ₹{}", format_amount(summary.total_budget)),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Transactions: {}", summary.transaction_count),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("  "),
        Span::styled(
            format!("⚠ {}", flagged),
            Style::default().fg(if flagged > 0 { Color::Red } else { Color::DarkGray }),
        ),
    ];

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn field_line<'a>(label: &'a str, value: String, focused: bool) -> Line<'a> {
    let label_style = if focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    Line::from(vec![
        Span::styled(format!("{:<10}", label), label_style),
        Span::raw(value),
        Span::styled(if focused { "▏" } else { "" }, Style::default().fg(Color::Yellow)),
    ])
}

fn render_form(f: &mut Frame, area: Rect, app: &App) {
    let amount = if app.amount.is_empty() && app.focus != Field::Amount {
        app.amount_hint()
    } else {
        app.amount.clone()
    };
    let category = if app.category_is_free_text() {
        if app.custom_category.is_empty() && app.focus != Field::Category {
            "(type a project category)".to_string()
        } else {
            app.custom_category.clone()
        }
    } else {
        app.selected_category()
            .map(|c| format!("◀ {} ▶", c))
            .unwrap_or_default()
    };

    let mut lines = vec![
        field_line("Name", app.submitter.clone(), app.focus == Field::Submitter),
        field_line("Amount", amount, app.focus == Field::Amount),
        field_line("Project", category, app.focus == Field::Category),
        Line::from(""),
    ];

    match &app.outcome {
        Some(Outcome::Accepted { advisory, remaining }) => {
            let color = if advisory.is_anomalous { Color::Yellow } else { Color::Green };
            lines.push(Line::from(Span::styled(
                format!("✓ Recorded. Remaining: ₹{}", format_amount(*remaining)),
                Style::default().fg(Color::Green),
            )));
            lines.push(Line::from(Span::styled(
                format!("{} (z = {:.2})", advisory.message, advisory.z_score),
                Style::default().fg(color),
            )));
        }
        Some(Outcome::Rejected(rejection)) => {
            lines.push(Line::from(Span::styled(
                format!("✗ Rejected: {}", rejection),
                Style::default().fg(Color::Red),
            )));
        }
        Some(Outcome::InputError(message)) => {
            lines.push(Line::from(Span::styled(
                message.clone(),
                Style::default().fg(Color::Red),
            )));
        }
        None => {}
    }

    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" New Transaction "),
    );

    f.render_widget(form, area);
}

fn render_fund_chart(f: &mut Frame, area: Rect, app: &App) {
    let summary = app.ledger.summary();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(" Fund Usage ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(inner);

    let ratio = (summary.used_amount / summary.total_budget).clamp(0.0, 1.0);
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Red).bg(Color::Green))
        .ratio(ratio)
        .label(format!("{:.1}% used", summary.used_pct));
    f.render_widget(gauge, rows[0]);

    let [used, available] = summary.slices();
    let legend = vec![
        Line::from(vec![
            Span::styled("■ ", Style::default().fg(Color::Red)),
            Span::raw(format!("{}: ₹{} ({:.1}%)", used.0, format_amount(used.1), summary.used_pct)),
        ]),
        Line::from(vec![
            Span::styled("■ ", Style::default().fg(Color::Green)),
            Span::raw(format!(
                "{}: ₹{} ({:.1}%)",
                available.0,
                format_amount(available.1),
                summary.available_pct
            )),
        ]),
    ];
    f.render_widget(Paragraph::new(legend), rows[1]);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Date", "Name", "Project", "Amount", "z", "Check"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows: Vec<Row> = app
        .ledger
        .transactions()
        .iter()
        .map(|tx| {
            let score = app.ledger.score(tx.amount, &tx.category);
            let color = if score.is_anomalous { Color::Red } else { Color::Green };
            let check = if score.is_unknown_category() {
                "unknown"
            } else if score.is_anomalous {
                "anomalous"
            } else {
                "normal"
            };

            Row::new(vec![
                Cell::from(tx.recorded_at.format("%Y-%m-%d %H:%M").to_string()),
                Cell::from(truncate(&tx.submitter, 20)),
                Cell::from(truncate(&tx.category, 20)),
                Cell::from(format!("₹{}", format_amount(tx.amount))),
                Cell::from(format!("{:.2}", score.z_score)).style(Style::default().fg(color)),
                Cell::from(check).style(Style::default().fg(color)),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(17),
            Constraint::Length(22),
            Constraint::Length(22),
            Constraint::Length(16),
            Constraint::Length(7),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Transactions "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect) {
    let key = Style::default().fg(Color::Yellow);
    let status_spans = vec![
        Span::styled(" Tab", key),
        Span::raw(" Field | "),
        Span::styled("←/→", key),
        Span::raw(" Project | "),
        Span::styled("Enter", key),
        Span::raw(" Submit | "),
        Span::styled("↑/↓", key),
        Span::raw(" History | "),
        Span::styled("Esc", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fund_tracker::RateTable;

    fn app() -> App {
        App::new(FundLedger::new(50_000_000.0, RateTable::embedded()).unwrap())
    }

    #[test]
    fn test_categories_from_rate_table() {
        let app = app();

        assert_eq!(app.categories.len(), 5);
        assert_eq!(app.selected_category(), Some("Hospital Equipment"));
        assert_eq!(app.amount_hint(), "Market rate: ₹1,500,000");
    }

    #[test]
    fn test_category_cycling_wraps() {
        let mut app = app();

        app.previous_category();
        assert_eq!(app.selected_category(), Some("Water Supply"));
        app.next_category();
        assert_eq!(app.selected_category(), Some("Hospital Equipment"));
    }

    #[test]
    fn test_amount_field_only_takes_numbers() {
        let mut app = app();
        app.focus = Field::Amount;

        for ch in "1,2a00.5x".chars() {
            app.push_char(ch);
        }

        assert_eq!(app.amount, "1,200.5");
    }

    #[test]
    fn test_submit_records_transaction() {
        let mut app = app();
        app.submitter = "N. Verma".to_string();
        app.amount = "1,500,000".to_string();

        app.submit();

        assert_eq!(app.ledger.used_amount(), 1_500_000.0);
        assert!(app.amount.is_empty());
        assert_eq!(app.state.selected(), Some(0));
        assert!(matches!(app.outcome, Some(Outcome::Accepted { .. })));
    }

    #[test]
    fn test_submit_rejection_keeps_input() {
        let mut app = app();
        app.submitter = "N. Verma".to_string();
        app.amount = "5000000".to_string();

        app.submit();

        assert_eq!(app.ledger.used_amount(), 0.0);
        assert_eq!(app.amount, "5000000");
        match &app.outcome {
            Some(Outcome::Rejected(rejection)) => {
                assert_eq!(rejection.reason(), "exceeds market rate threshold")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_submit_bad_amount() {
        let mut app = app();
        app.submitter = "N. Verma".to_string();

        app.submit();

        assert_eq!(
            app.outcome,
            Some(Outcome::InputError("Please enter a valid amount".to_string()))
        );
    }

    #[test]
    fn test_records_with_typed_category_when_no_rates() {
        let mut app = App::new(FundLedger::new(50_000_000.0, RateTable::empty()).unwrap());
        app.submitter = "N. Verma".to_string();
        app.amount = "100000".to_string();

        app.submit();
        assert_eq!(
            app.outcome,
            Some(Outcome::InputError("Please enter a project category".to_string()))
        );

        app.focus = Field::Category;
        for ch in "Bridge Repairx".chars() {
            app.push_char(ch);
        }
        app.backspace();
        assert_eq!(app.selected_category(), Some("Bridge Repair"));

        app.submit();

        assert!(matches!(app.outcome, Some(Outcome::Accepted { .. })));
        assert_eq!(app.ledger.used_amount(), 100_000.0);
        assert_eq!(app.ledger.transactions()[0].category, "Bridge Repair");
    }

    #[test]
    fn test_category_is_not_typed_when_rates_loaded() {
        let mut app = app();
        app.focus = Field::Category;

        app.push_char('x');

        assert!(app.custom_category.is_empty());
        assert_eq!(app.selected_category(), Some("Hospital Equipment"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Hospital Equipment", 10), "Hospita...");
    }
}
