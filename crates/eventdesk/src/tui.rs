//! Interactive dashboard.
//!
//! Network calls run as spawned tasks and report back over a channel, so
//! the view keeps handling keys while a request is in flight. RSVP rows are
//! flipped before their request is sent and rolled back if it fails.

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as TermEvent, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use eventdesk_core::dashboard::NO_EVENTS_MESSAGE;
use eventdesk_core::rsvp::RsvpTicket;
use eventdesk_core::{Dashboard, DashboardKind, EventApi, Notice, Session};

use crate::render::{format_time, yes_no};

/// Outcome of a background request.
#[derive(Debug)]
enum TaskResult {
    Rsvp(RsvpTicket, eventdesk_core::Result<()>),
    Visibility(i64, eventdesk_core::Result<bool>),
    EventDeleted(i64, eventdesk_core::Result<()>),
    UserDeleted(i64, eventdesk_core::Result<()>),
    Reloaded(eventdesk_core::Result<Dashboard>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Events,
    Users,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Confirm {
    DeleteEvent(i64),
    DeleteUser(i64),
}

pub async fn run_tui(api: EventApi, session: Session, dashboard: Dashboard) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let app = App::new(api, session, dashboard);
    let res = run_app(&mut terminal, app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{:?}", err)
    }

    Ok(())
}

struct App {
    api: EventApi,
    session: Session,
    dashboard: Dashboard,
    pane: Pane,
    events_state: TableState,
    users_state: TableState,
    notice: Option<Notice>,
    confirm: Option<Confirm>,
    loading: bool,
    tx: mpsc::UnboundedSender<TaskResult>,
    rx: mpsc::UnboundedReceiver<TaskResult>,
}

impl App {
    fn new(api: EventApi, session: Session, dashboard: Dashboard) -> App {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut events_state = TableState::default();
        if !dashboard.events.is_empty() {
            events_state.select(Some(0));
        }
        let mut users_state = TableState::default();
        if !dashboard.users.is_empty() {
            users_state.select(Some(0));
        }
        App {
            api,
            session,
            dashboard,
            pane: Pane::Events,
            events_state,
            users_state,
            notice: None,
            confirm: None,
            loading: false,
            tx,
            rx,
        }
    }

    fn kind(&self) -> DashboardKind {
        self.dashboard.kind
    }

    fn rows(&self) -> usize {
        match self.pane {
            Pane::Events => self.dashboard.events.len(),
            Pane::Users => self.dashboard.users.len(),
        }
    }

    fn table_state(&mut self) -> &mut TableState {
        match self.pane {
            Pane::Events => &mut self.events_state,
            Pane::Users => &mut self.users_state,
        }
    }

    fn next(&mut self) {
        let len = self.rows();
        if len == 0 {
            return;
        }
        let state = self.table_state();
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    fn previous(&mut self) {
        let len = self.rows();
        if len == 0 {
            return;
        }
        let state = self.table_state();
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    fn selected_event(&self) -> Option<i64> {
        self.events_state
            .selected()
            .and_then(|i| self.dashboard.events.get(i))
            .map(|e| e.id)
    }

    fn selected_user(&self) -> Option<i64> {
        self.users_state
            .selected()
            .and_then(|i| self.dashboard.users.get(i))
            .map(|u| u.id)
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = TaskResult> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // receiver gone means the view was closed
            let _ = tx.send(task.await);
        });
    }

    /// Returns true when the app should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        if let Some(confirm) = self.confirm.take() {
            if matches!(code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                self.confirmed(confirm);
            }
            return false;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Tab if self.kind().can_manage_users() => {
                self.pane = match self.pane {
                    Pane::Events => Pane::Users,
                    Pane::Users => Pane::Events,
                };
            }
            KeyCode::Char('r') => self.reload(),
            KeyCode::Enter | KeyCode::Char(' ') if self.pane == Pane::Events => self.toggle_rsvp(),
            KeyCode::Char('p') if self.pane == Pane::Events && self.kind().can_manage_events() => {
                self.toggle_visibility()
            }
            KeyCode::Char('d') => self.ask_delete(),
            _ => {}
        }
        false
    }

    fn toggle_rsvp(&mut self) {
        let Some(id) = self.selected_event() else {
            return;
        };
        match self.dashboard.rsvp.begin(id) {
            Ok(ticket) => {
                let api = self.api.clone();
                self.spawn(async move { TaskResult::Rsvp(ticket, ticket.send(&api).await) });
            }
            // pending row: the control is disabled until it settles
            Err(e) => tracing::debug!(error = %e, "RSVP ignored"),
        }
    }

    fn toggle_visibility(&mut self) {
        let Some(id) = self.selected_event() else {
            return;
        };
        let api = self.api.clone();
        self.spawn(async move { TaskResult::Visibility(id, api.toggle_public(id).await) });
    }

    fn ask_delete(&mut self) {
        self.confirm = match self.pane {
            Pane::Events if self.kind().can_manage_events() => self.selected_event().map(Confirm::DeleteEvent),
            Pane::Users if self.kind().can_manage_users() => self.selected_user().map(Confirm::DeleteUser),
            _ => None,
        };
    }

    fn confirmed(&mut self, confirm: Confirm) {
        let api = self.api.clone();
        match confirm {
            Confirm::DeleteEvent(id) => {
                self.spawn(async move { TaskResult::EventDeleted(id, api.delete_event(id).await) })
            }
            Confirm::DeleteUser(id) => {
                self.spawn(async move { TaskResult::UserDeleted(id, api.delete_user(id).await) })
            }
        }
    }

    fn reload(&mut self) {
        if self.loading {
            return;
        }
        self.loading = true;
        let api = self.api.clone();
        let kind = self.kind();
        self.spawn(async move { TaskResult::Reloaded(Dashboard::load(kind, &api).await) });
    }

    fn apply(&mut self, result: TaskResult) {
        match result {
            TaskResult::Rsvp(ticket, outcome) => {
                self.notice = Some(self.dashboard.rsvp.settle(ticket, outcome));
            }
            TaskResult::Visibility(id, Ok(is_public)) => {
                self.dashboard.set_public(id, is_public);
                let label = if is_public { "public" } else { "private" };
                self.notice = Some(Notice::info(format!("Event is now {}.", label)));
            }
            TaskResult::EventDeleted(id, Ok(())) => {
                self.dashboard.remove_event(id);
                self.clamp_selection();
                self.notice = Some(Notice::info("Event deleted."));
            }
            TaskResult::UserDeleted(id, Ok(())) => {
                self.dashboard.remove_user(id);
                self.clamp_selection();
                self.notice = Some(Notice::info("User deleted."));
            }
            TaskResult::Reloaded(Ok(dashboard)) => {
                self.loading = false;
                let mut rsvp = std::mem::take(&mut self.dashboard.rsvp);
                rsvp.refresh(&dashboard.events);
                self.dashboard = Dashboard { rsvp, ..dashboard };
                self.clamp_selection();
            }
            TaskResult::Reloaded(Err(e)) => {
                self.loading = false;
                self.notice = Some(Notice::error(e.to_string()));
            }
            TaskResult::Visibility(_, Err(e))
            | TaskResult::EventDeleted(_, Err(e))
            | TaskResult::UserDeleted(_, Err(e)) => {
                self.notice = Some(Notice::error(e.to_string()));
            }
        }
    }

    fn clamp_selection(&mut self) {
        for (state, len) in [
            (&mut self.events_state, self.dashboard.events.len()),
            (&mut self.users_state, self.dashboard.users.len()),
        ] {
            let selected = match (state.selected(), len) {
                (_, 0) => None,
                (Some(i), len) => Some(i.min(len - 1)),
                (None, _) => Some(0),
            };
            state.select(selected);
        }
    }

    fn drain(&mut self) {
        while let Ok(result) = self.rx.try_recv() {
            self.apply(result);
        }
    }
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        app.drain();
        terminal.draw(|f| ui(f, &mut app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let TermEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key.code) {
                    return Ok(());
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let show_users = app.kind().can_manage_users();
    let mut constraints = vec![Constraint::Length(3), Constraint::Min(5)];
    if show_users {
        constraints.push(Constraint::Length(10));
    }
    constraints.push(Constraint::Length(3));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.size());

    let header = Paragraph::new(format!("Welcome, {} ({})", app.session.username, app.session.role))
        .block(Block::default().borders(Borders::ALL).title(app.kind().title()));
    f.render_widget(header, chunks[0]);

    let highlight = Style::default().add_modifier(Modifier::REVERSED);

    let events_title = pane_title("Events", app.pane == Pane::Events && show_users);
    if app.dashboard.events.is_empty() {
        let empty = Paragraph::new(NO_EVENTS_MESSAGE).block(Block::default().borders(Borders::ALL).title(events_title));
        f.render_widget(empty, chunks[1]);
    } else {
        let rows: Vec<Row> = app
            .dashboard
            .visible_events()
            .into_iter()
            .map(|e| {
                let rsvp = if app.dashboard.rsvp.is_pending(e.id) {
                    "..."
                } else {
                    yes_no(e.is_rsvped)
                };
                Row::new(vec![
                    Cell::from(e.title.clone()),
                    Cell::from(e.location.clone()),
                    Cell::from(format_time(&e.start_time)),
                    Cell::from(format_time(&e.end_time)),
                    Cell::from(e.owner_name().to_string()),
                    Cell::from(yes_no(e.is_public)),
                    Cell::from(rsvp),
                ])
            })
            .collect();
        let table = Table::new(
            rows,
            [
                Constraint::Percentage(24),
                Constraint::Percentage(16),
                Constraint::Length(16),
                Constraint::Length(16),
                Constraint::Percentage(12),
                Constraint::Length(6),
                Constraint::Length(5),
            ],
        )
        .header(
            Row::new(vec!["Title", "Location", "Start", "End", "Created By", "Public", "RSVP"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(events_title))
        .highlight_style(highlight)
        .highlight_symbol(">> ");
        f.render_stateful_widget(table, chunks[1], &mut app.events_state);
    }

    if show_users {
        let rows: Vec<Row> = app
            .dashboard
            .users
            .iter()
            .map(|u| {
                Row::new(vec![
                    Cell::from(u.username.clone()),
                    Cell::from(u.email.clone()),
                    Cell::from(u.role.to_string()),
                ])
            })
            .collect();
        let table = Table::new(
            rows,
            [
                Constraint::Percentage(30),
                Constraint::Percentage(50),
                Constraint::Percentage(20),
            ],
        )
        .header(Row::new(vec!["Username", "Email", "Role"]).style(Style::default().add_modifier(Modifier::BOLD)))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(pane_title("Users", app.pane == Pane::Users)),
        )
        .highlight_style(highlight)
        .highlight_symbol(">> ");
        f.render_stateful_widget(table, chunks[2], &mut app.users_state);
    }

    let footer_area = chunks[chunks.len() - 1];
    let footer = match (&app.confirm, &app.notice) {
        (Some(Confirm::DeleteEvent(_)), _) => {
            Paragraph::new("Delete this event? (y/n)").style(Style::default().fg(Color::Yellow))
        }
        (Some(Confirm::DeleteUser(_)), _) => {
            Paragraph::new("Delete this user? (y/n)").style(Style::default().fg(Color::Yellow))
        }
        (None, Some(notice)) => {
            let color = if notice.is_error() { Color::Red } else { Color::Green };
            Paragraph::new(notice.message.as_str()).style(Style::default().fg(color))
        }
        (None, None) => Paragraph::new(help_text(app.kind())),
    };
    f.render_widget(footer.block(Block::default().borders(Borders::ALL).title("Help")), footer_area);
}

fn pane_title(name: &str, focused: bool) -> String {
    if focused {
        format!("{} *", name)
    } else {
        name.to_string()
    }
}

fn help_text(kind: DashboardKind) -> &'static str {
    match kind {
        DashboardKind::Admin => "q: Quit | r: Refresh | ↑/↓: Navigate | Tab: Switch pane | Enter: RSVP | p: Public | d: Delete",
        DashboardKind::Manager => "q: Quit | r: Refresh | ↑/↓: Navigate | Enter: RSVP | p: Public | d: Delete",
        DashboardKind::User => "q: Quit | r: Refresh | ↑/↓: Navigate | Enter: RSVP",
    }
}
