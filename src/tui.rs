use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::db::PositionGateway;
use crate::dialog::{DialogController, DialogMode, Field};
use crate::error::{SaveError, ScrapeError, StorageError};
use crate::models::{format_date, Position};
use crate::scrape::PositionScraper;
use crate::shell::{CloseChoice, CloseOutcome, CloseRequest, Shell};

type FillResult = Result<Position, ScrapeError>;

enum Confirm {
    Delete(i64),
    Close,
}

struct Message {
    title: String,
    body: String,
}

struct App<G: PositionGateway> {
    shell: Shell<G>,
    scraper: Arc<PositionScraper>,
    runtime: Handle,
    selected: usize,
    dialog: Option<DialogController>,
    focus: usize,
    pending_fill: Option<oneshot::Receiver<FillResult>>,
    confirm: Option<Confirm>,
    message: Option<Message>,
    status: String,
    quit: bool,
}

impl<G: PositionGateway> App<G> {
    fn new(shell: Shell<G>, scraper: Arc<PositionScraper>, runtime: Handle) -> Self {
        Self {
            shell,
            scraper,
            runtime,
            selected: 0,
            dialog: None,
            focus: 0,
            pending_fill: None,
            confirm: None,
            message: None,
            status: String::new(),
            quit: false,
        }
    }

    fn current(&self) -> Option<&Position> {
        self.shell.store().positions().get(self.selected)
    }

    fn show_message(&mut self, title: &str, body: impl Into<String>) {
        self.message = Some(Message {
            title: title.to_string(),
            body: body.into(),
        });
    }

    fn select_id(&mut self, id: i64) {
        if let Some(idx) = self.shell.store().positions().iter().position(|p| p.id == id) {
            self.selected = idx;
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.shell.store().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    // --- table actions ---

    fn next(&mut self) {
        if self.selected + 1 < self.shell.store().len() {
            self.selected += 1;
        }
    }

    fn prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn open_dialog(&mut self, dialog: DialogController) {
        self.dialog = Some(dialog);
        self.focus = 0;
    }

    fn save(&mut self) {
        match self.shell.save() {
            Ok(()) => self.status = format!("Saved {} positions", self.shell.store().len()),
            Err(e) => self.storage_error(e),
        }
    }

    fn storage_error(&mut self, e: StorageError) {
        tracing::warn!("Storage error: {}", e);
        let hint = match e {
            StorageError::NotLoaded => "Restart once the database is readable again.",
            _ => "Your changes are kept; try saving again.",
        };
        self.show_message("Database error", format!("{}\n\n{}", e, hint));
    }

    fn request_close(&mut self) {
        match self.shell.request_close() {
            CloseRequest::ExitNow => self.quit = true,
            CloseRequest::ConfirmUnsaved => self.confirm = Some(Confirm::Close),
        }
    }

    fn resolve_close(&mut self, choice: CloseChoice) {
        self.confirm = None;
        match self.shell.resolve_close(choice) {
            Ok(CloseOutcome::Exit) => self.quit = true,
            Ok(CloseOutcome::Stay) => {}
            Err(e) => self.storage_error(e),
        }
    }

    // --- dialog actions ---

    fn close_dialog(&mut self) {
        self.dialog = None;
        // Dropping the receiver cancels delivery of an in-flight fill.
        self.pending_fill = None;
    }

    fn start_fill(&mut self) {
        if self.pending_fill.is_some() {
            return;
        }
        let Some(dialog) = &self.dialog else { return };
        let request = dialog.fill_request(self.shell.store());
        let scraper = Arc::clone(&self.scraper);
        let (tx, rx) = oneshot::channel();

        self.runtime.spawn_blocking(move || {
            let result = scraper.fetch(request.id, &request.url);
            if tx.send(result).is_err() {
                tracing::debug!("Fill for #{} finished after its dialog closed", request.id);
            }
        });
        self.pending_fill = Some(rx);
        self.status = "Fetching job posting...".to_string();
    }

    fn poll_fill(&mut self) {
        let Some(rx) = self.pending_fill.as_mut() else { return };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.pending_fill = None;
                return;
            }
        };
        self.pending_fill = None;

        match result {
            Ok(position) => {
                let Some(dialog) = self.dialog.as_mut() else { return };
                if dialog.apply_fill(&position) {
                    let missing = dialog.unfilled_fields();
                    self.status = if missing.is_empty() {
                        "Filled all fields from the web page".to_string()
                    } else {
                        let names: Vec<&str> = missing.iter().map(|f| f.label()).collect();
                        format!("Could not find: {}", names.join(", "))
                    };
                }
            }
            Err(e) => {
                tracing::warn!("Fill failed: {}", e);
                self.status.clear();
                self.show_message(
                    "Connection error",
                    format!("{}\n\nTry again, or fill the fields manually.", e),
                );
            }
        }
    }

    fn save_dialog(&mut self) {
        let Some(dialog) = self.dialog.as_mut() else { return };
        let ignored = dialog.form().unparsed_dates();
        match dialog.handle_save(self.shell.store_mut()) {
            Ok(position) => {
                self.close_dialog();
                self.select_id(position.id);
                self.status = if ignored.is_empty() {
                    format!("Position #{} updated, press s to save", position.id)
                } else {
                    let dropped: Vec<String> = ignored
                        .iter()
                        .map(|(field, text)| format!("{} '{}'", field.label(), text))
                        .collect();
                    format!(
                        "Position #{} updated without unreadable date {}, press s to save",
                        position.id,
                        dropped.join(", ")
                    )
                };
            }
            Err(SaveError::Invalid(e)) => {
                self.show_message("Invalid fields", format!("Please correct invalid fields:\n\n{}", e));
            }
            Err(e) => self.show_message("Cannot save", e.to_string()),
        }
    }

    // --- key handling ---

    fn handle_key(&mut self, key: KeyEvent) {
        if self.message.is_some() {
            self.message = None;
            return;
        }
        if let Some(confirm) = self.confirm.take() {
            self.handle_confirm_key(confirm, key);
            return;
        }
        if self.dialog.is_some() {
            self.handle_dialog_key(key);
        } else {
            self.handle_table_key(key);
        }
    }

    fn handle_confirm_key(&mut self, confirm: Confirm, key: KeyEvent) {
        match (confirm, key.code) {
            (Confirm::Close, KeyCode::Char('y')) => self.resolve_close(CloseChoice::Save),
            (Confirm::Close, KeyCode::Char('n')) => self.resolve_close(CloseChoice::Discard),
            (Confirm::Close, KeyCode::Char('c') | KeyCode::Esc) => {
                self.resolve_close(CloseChoice::Cancel)
            }
            (Confirm::Delete(id), KeyCode::Char('y')) => {
                if self.shell.delete(id).is_some() {
                    self.status = format!("Deleted #{}, press s to save", id);
                }
                self.clamp_selection();
            }
            (Confirm::Delete(_), KeyCode::Char('n') | KeyCode::Esc) => {}
            (confirm, _) => self.confirm = Some(confirm),
        }
    }

    fn handle_table_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.request_close();
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.request_close(),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.prev(),
            KeyCode::Char('a') => {
                let dialog = self.shell.open_add();
                self.open_dialog(dialog);
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                let id = self.current().map(|p| p.id);
                if let Some(dialog) = id.and_then(|id| self.shell.open_edit(id)) {
                    self.open_dialog(dialog);
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.current().map(|p| p.id) {
                    self.confirm = Some(Confirm::Delete(id));
                }
            }
            KeyCode::Char('s') => self.save(),
            _ => {}
        }
    }

    fn handle_dialog_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let field = Field::ALL[self.focus];

        match key.code {
            KeyCode::Esc => {
                if let Some(dialog) = self.dialog.as_mut() {
                    dialog.handle_cancel();
                }
                self.close_dialog();
                self.status = "Cancelled".to_string();
            }
            KeyCode::Char('f') if ctrl => self.start_fill(),
            KeyCode::Char('s') if ctrl => self.save_dialog(),
            KeyCode::Tab | KeyCode::Down => self.focus = (self.focus + 1) % Field::ALL.len(),
            KeyCode::BackTab | KeyCode::Up => {
                self.focus = (self.focus + Field::ALL.len() - 1) % Field::ALL.len()
            }
            KeyCode::Enter if field.is_multiline() => self.edit_field(field, |v| v.push('\n')),
            KeyCode::Enter => self.focus = (self.focus + 1) % Field::ALL.len(),
            KeyCode::Backspace => self.edit_field(field, |v| {
                v.pop();
            }),
            KeyCode::Char(c) if !ctrl => self.edit_field(field, |v| v.push(c)),
            _ => {}
        }
    }

    fn edit_field(&mut self, field: Field, edit: impl FnOnce(&mut String)) {
        if let Some(dialog) = self.dialog.as_mut() {
            edit(dialog.form_mut().value_mut(field));
        }
    }
}

pub fn run<G: PositionGateway>(
    shell: Shell<G>,
    startup_error: Option<StorageError>,
    scraper: PositionScraper,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;

    let mut app = App::new(shell, Arc::new(scraper), runtime.handle().clone());
    if let Some(e) = startup_error {
        app.show_message(
            "Database error",
            format!(
                "{}\n\nStarting with an empty table. Saving is disabled so the stored positions are kept.",
                e
            ),
        );
    }

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    // Do not wait for a fetch nobody is listening to any more.
    runtime.shutdown_background();
    result
}

fn run_loop<G: PositionGateway>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App<G>,
) -> Result<()> {
    while !app.quit {
        terminal.draw(|frame| draw(frame, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }
        app.poll_fill();
    }
    Ok(())
}

// --- drawing ---

fn draw<G: PositionGateway>(frame: &mut Frame, app: &App<G>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),
            Constraint::Length(9),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_table(frame, app, chunks[0]);

    let detail = Paragraph::new(build_detail(app.current()))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false });
    frame.render_widget(detail, chunks[1]);

    let help = if app.status.is_empty() {
        " j/k:navigate  a:add  e:edit  d:delete  s:save  q:quit".to_string()
    } else {
        format!(" {}", app.status)
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );

    if let Some(dialog) = &app.dialog {
        draw_dialog(frame, dialog, app.focus, app.pending_fill.is_some());
    }
    if let Some(confirm) = &app.confirm {
        let (title, body) = match confirm {
            Confirm::Delete(id) => (" Delete ", format!("Delete position #{}? (y/n)", id)),
            Confirm::Close => (
                " Warning! ",
                "Information wasn't saved to the database.\n\
                 Save before closing?\n\n\
                 y: save and exit   n: exit without saving   c: cancel"
                    .to_string(),
            ),
        };
        draw_popup(frame, title, &body, Color::Yellow);
    }
    if let Some(message) = &app.message {
        let title = format!(" {} ", message.title);
        draw_popup(frame, &title, &message.body, Color::Red);
    }
}

fn draw_table<G: PositionGateway>(frame: &mut Frame, app: &App<G>, area: Rect) {
    let store = app.shell.store();
    let header = Row::new(["ID", "RESULT", "COMPANY", "JOB TITLE", "LOCATION", "SENT", "ANSWER"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = store
        .positions()
        .iter()
        .map(|p| {
            Row::new(vec![
                Cell::from(p.id.to_string()),
                Cell::from(p.result.clone()),
                Cell::from(p.company.clone()),
                Cell::from(p.job_title.clone()),
                Cell::from(p.location.clone()),
                Cell::from(format_date(p.request_sent_date)),
                Cell::from(format_date(p.answer_date)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(5),
        Constraint::Length(12),
        Constraint::Percentage(22),
        Constraint::Percentage(28),
        Constraint::Percentage(15),
        Constraint::Length(10),
        Constraint::Length(10),
    ];

    let dirty = if store.is_dirty() { " *" } else { "" };
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" JobStack ({}){} ", store.len(), dirty)),
        )
        .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    let mut state = TableState::default();
    if !store.is_empty() {
        state.select(Some(app.selected));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn build_detail(position: Option<&Position>) -> Text<'_> {
    let Some(p) = position else {
        return Text::raw("No positions yet, press a to add one");
    };

    let label = Style::default().fg(Color::Cyan);
    let mut lines = vec![
        Line::from(vec![Span::styled("Web:    ", label), Span::raw(p.web.as_str())]),
        Line::from(vec![
            Span::styled("Person: ", label),
            Span::raw(format!("{}  {}  {}", p.person, p.phone, p.email)),
        ]),
        Line::from(vec![Span::styled("PDF:    ", label), Span::raw(p.job_title_pdf.as_str())]),
    ];

    if !p.conversation.is_empty() {
        lines.push(Line::from(Span::styled("Conversation:", label)));
        for line in textwrap::fill(&p.conversation, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
    }

    Text::from(lines)
}

fn draw_dialog(frame: &mut Frame, dialog: &DialogController, focus: usize, fetching: bool) {
    let area = centered_rect(80, 80, frame.area());
    frame.render_widget(Clear, area);

    let title = match (dialog.mode(), dialog.form().id) {
        (DialogMode::Add, _) => " Add position ".to_string(),
        (DialogMode::Edit, Some(id)) => format!(" Edit position #{} ", id),
        (DialogMode::Edit, None) => " Edit position ".to_string(),
    };

    let mut lines = vec![Line::from(format!(
        "{:>13}  {}",
        "Id",
        dialog
            .form()
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "new".to_string())
    ))];

    for (idx, field) in Field::ALL.iter().enumerate() {
        let value = dialog.form().value(*field);
        let label_style = if idx == focus {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        let label = Span::styled(format!("{:>13}  ", field.label()), label_style);
        let cursor = if idx == focus { "_" } else { "" };

        if value.is_empty() {
            let prompt = dialog.prompt(*field).unwrap_or("");
            lines.push(Line::from(vec![
                label,
                Span::raw(cursor),
                Span::styled(prompt, Style::default().fg(Color::DarkGray)),
            ]));
            continue;
        }

        let mut value_lines = value.split('\n');
        let first = value_lines.next().unwrap_or("");
        lines.push(Line::from(vec![label, Span::raw(first.to_string())]));
        for rest in value_lines {
            lines.push(Line::from(format!("{:>13}  {}", "", rest)));
        }
        if let Some(last) = lines.last_mut() {
            last.push_span(Span::raw(cursor));
        }
    }

    lines.push(Line::from(""));
    let footer = if fetching {
        "Fetching job posting..."
    } else {
        "Tab/Up/Down: move  Ctrl+F: fill from web  Ctrl+S: save  Esc: cancel"
    };
    lines.push(Line::from(Span::styled(footer, Style::default().fg(Color::DarkGray))));

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn draw_popup(frame: &mut Frame, title: &str, body: &str, color: Color) {
    let area = centered_rect(60, 35, frame.area());
    frame.render_widget(Clear, area);
    let widget = Paragraph::new(body.to_string())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(title.to_string()),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
