use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::browse::{NavContext, Screen, repository_items};
use crate::catalog::CatalogClient;
use crate::config::{Repository, ResolvedConfig};
use crate::domain::{Item, Progress};
use crate::download::{DownloadEvent, DownloadSession, SessionState};
use crate::error::CatalogError;
use crate::fetcher::MetadataFetcher;

const LOGS_MAX: usize = 50;
const PAGE: isize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    None,
    Quit,
    Back,
    OpenRepository(String),
    Download(Item),
    CancelDownload,
}

type ItemsResult = Result<Vec<Item>, CatalogError>;

pub struct Tui<C: CatalogClient + Clone + 'static> {
    config: ResolvedConfig,
    fetcher: MetadataFetcher<C>,
    nav: NavContext,
    items: Vec<Item>,
    loading: Option<Receiver<ItemsResult>>,
    session: Option<DownloadSession>,
    status: String,
    logs: VecDeque<String>,
}

impl<C: CatalogClient + Clone + 'static> Tui<C> {
    pub fn new(config: ResolvedConfig, fetcher: MetadataFetcher<C>) -> Self {
        Self {
            config,
            fetcher,
            nav: NavContext::default(),
            items: Vec::new(),
            loading: None,
            session: None,
            status: "ready".to_string(),
            logs: VecDeque::new(),
        }
    }

    pub fn run(&mut self) -> miette::Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        if let Some(session) = self.session.take() {
            session.cancel();
        }
        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> miette::Result<()> {
        loop {
            self.poll_loading();
            self.poll_session();
            terminal
                .draw(|frame| draw_ui(frame, self))
                .into_diagnostic()?;

            if event::poll(Duration::from_millis(120)).into_diagnostic()?
                && let Event::Key(key) = event::read().into_diagnostic()?
                && self.handle_key(key)
            {
                return Ok(());
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        let downloading = self.session.is_some();
        let action = match self.nav.screen {
            Screen::Repositories => {
                repositories_key(&mut self.nav, &self.config.repositories, key.code)
            }
            Screen::Files => files_key(&mut self.nav, &self.items, downloading, key.code),
        };
        self.apply(action)
    }

    fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::None => {}
            Action::Quit => return true,
            Action::Back => {
                self.nav.back();
                self.items.clear();
                self.loading = None;
                self.status = "ready".to_string();
            }
            Action::OpenRepository(key) => self.open_repository(&key),
            Action::Download(item) => self.start_download(item),
            Action::CancelDownload => {
                if let Some(session) = self.session.take() {
                    session.cancel();
                    self.log(format!("cancelled {}", session.file_name()));
                }
                self.status = "download cancelled".to_string();
            }
        }
        false
    }

    fn open_repository(&mut self, key: &str) {
        let Ok(repository) = self.config.repository(key).cloned() else {
            return;
        };
        self.nav.open_repository(key);
        self.items.clear();
        self.status = format!("loading {}", repository.name);

        let (tx, rx) = mpsc::channel();
        let fetcher = self.fetcher.clone();
        thread::spawn(move || {
            let _ = tx.send(repository_items(&fetcher, &repository));
        });
        self.loading = Some(rx);
    }

    fn start_download(&mut self, item: Item) {
        let Some(repository) = self.current_repository() else {
            return;
        };
        let destination = repository.path.clone();
        match DownloadSession::start(self.fetcher.catalog().clone(), item, destination) {
            Ok(session) => {
                self.status = format!("downloading {}", session.file_name());
                self.log(format!("download {}", session.item().url));
                self.session = Some(session);
            }
            Err(err) => {
                self.status = err.to_string();
                self.log(err.to_string());
            }
        }
    }

    fn poll_loading(&mut self) {
        let Some(rx) = &self.loading else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(CatalogError::Http(
                "listing worker stopped unexpectedly".to_string(),
            )),
        };
        self.loading = None;
        match result {
            Ok(items) => {
                self.status = format!("{} files", items.len());
                self.items = items;
            }
            Err(err) => {
                self.status = format!("failed to load listing: {err}");
                self.log(self.status.clone());
            }
        }
    }

    fn poll_session(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let mut messages = Vec::new();
        for event in session.poll() {
            match event {
                DownloadEvent::Completed(path) => {
                    messages.push(format!("saved {}", path.display()))
                }
                DownloadEvent::Unpacked(dir) => {
                    messages.push(format!("extracted into {}", dir.display()))
                }
                DownloadEvent::Failed(err) => messages.push(format!("failed: {err}")),
                DownloadEvent::Cancelled | DownloadEvent::Progress(_) => {}
            }
        }
        let finished = session.is_done().then(|| session.state().clone());
        for message in messages {
            self.log(message);
        }

        if let Some(state) = finished {
            self.status = match state {
                SessionState::Finished => "download complete".to_string(),
                SessionState::Failed(message) => format!("download failed: {message}"),
                SessionState::Cancelled => "download cancelled".to_string(),
                SessionState::Downloading | SessionState::Unpacking => return,
            };
            self.session = None;
        }
    }

    fn current_repository(&self) -> Option<&Repository> {
        self.nav
            .repository
            .as_deref()
            .and_then(|key| self.config.repository(key).ok())
    }

    fn log(&mut self, message: String) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.logs.push_back(format!("[{stamp}] {message}"));
        while self.logs.len() > LOGS_MAX {
            self.logs.pop_front();
        }
    }
}

fn repositories_key(nav: &mut NavContext, repositories: &[Repository], code: KeyCode) -> Action {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Up | KeyCode::Char('k') => {
            nav.move_selection(-1, repositories.len());
            Action::None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            nav.move_selection(1, repositories.len());
            Action::None
        }
        KeyCode::Enter | KeyCode::Char('a') => repositories
            .get(nav.selected)
            .map(|repo| Action::OpenRepository(repo.key.clone()))
            .unwrap_or(Action::None),
        _ => Action::None,
    }
}

fn files_key(nav: &mut NavContext, items: &[Item], downloading: bool, code: KeyCode) -> Action {
    if matches!(code, KeyCode::Char('b') | KeyCode::Esc | KeyCode::Backspace) {
        return if downloading {
            Action::CancelDownload
        } else {
            Action::Back
        };
    }
    if downloading || items.is_empty() {
        return Action::None;
    }
    match code {
        KeyCode::Up | KeyCode::Char('k') => nav.move_selection(-1, items.len()),
        KeyCode::Down | KeyCode::Char('j') => nav.move_selection(1, items.len()),
        KeyCode::PageUp => nav.move_selection(-PAGE, items.len()),
        KeyCode::PageDown => nav.move_selection(PAGE, items.len()),
        KeyCode::Enter | KeyCode::Char('a') => {
            return items
                .get(nav.selected)
                .cloned()
                .map(Action::Download)
                .unwrap_or(Action::None);
        }
        _ => {}
    }
    Action::None
}

fn draw_ui<C: CatalogClient + Clone + 'static>(frame: &mut ratatui::Frame, tui: &Tui<C>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(5),
        ])
        .split(frame.area());

    let title = match tui.current_repository() {
        Some(repo) => repo.name.clone(),
        None => "Repositories".to_string(),
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "HHCAT",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw("   "),
        Span::styled(title, Style::default().fg(Color::White)),
    ]))
    .alignment(Alignment::Left)
    .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match &tui.session {
        Some(session) => draw_download(frame, session, chunks[1]),
        None => {
            let labels: Vec<&str> = match tui.nav.screen {
                Screen::Repositories => tui
                    .config
                    .repositories
                    .iter()
                    .map(|repo| repo.name.as_str())
                    .collect(),
                Screen::Files => tui.items.iter().map(|item| item.name.as_str()).collect(),
            };
            draw_list(frame, &labels, tui.nav.selected, chunks[1]);
        }
    }

    draw_footer(frame, tui, chunks[2]);
}

fn draw_list(frame: &mut ratatui::Frame, labels: &[&str], selected: usize, area: Rect) {
    let visible = area.height.saturating_sub(2).max(1) as usize;
    let start = selected.saturating_sub(visible.saturating_sub(1));
    let lines: Vec<Line> = labels
        .iter()
        .enumerate()
        .skip(start)
        .take(visible)
        .map(|(index, label)| {
            if index == selected {
                Line::from(Span::styled(
                    format!("> {label}"),
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(format!("  {label}"))
            }
        })
        .collect();
    let title = format!("{}/{}", (selected + 1).min(labels.len()), labels.len());
    let list = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);
}

fn draw_download(frame: &mut ratatui::Frame, session: &DownloadSession, area: Rect) {
    let progress = session.progress();
    let state = match session.state() {
        SessionState::Unpacking => "extracting",
        _ => "downloading",
    };
    let lines = vec![
        Line::from(vec![
            Span::styled(format!("{state}: "), Style::default().fg(Color::Gray)),
            Span::styled(
                session.file_name().to_string(),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(format!("to {}", session.destination().display())),
        Line::from(""),
        Line::from(progress_line(progress)),
    ];
    let view = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Download"))
        .wrap(Wrap { trim: true });
    frame.render_widget(view, area);
}

fn draw_footer<C: CatalogClient + Clone + 'static>(
    frame: &mut ratatui::Frame,
    tui: &Tui<C>,
    area: Rect,
) {
    let hint = if tui.session.is_some() {
        "b/Esc cancel download"
    } else if tui.nav.screen == Screen::Files {
        "Enter download   b back   PgUp/PgDn page   q quit"
    } else {
        "Enter open   q quit"
    };
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::raw(tui.status.clone()),
        ]),
        Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))),
    ];
    for entry in tui.logs.iter().rev().take(2) {
        lines.push(Line::from(Span::styled(
            entry.clone(),
            Style::default().fg(Color::DarkGray),
        )));
    }
    let footer = Paragraph::new(lines)
        .block(Block::default().borders(Borders::TOP))
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, area);
}

fn progress_line(progress: Progress) -> String {
    match progress.percent() {
        Some(percent) => format!(
            "{} {:>3}%  {} / {}",
            progress_bar(percent),
            percent,
            bytes_to_human(progress.downloaded),
            bytes_to_human(progress.total.unwrap_or_default())
        ),
        None => format!("[{:^30}]  {}", "...", bytes_to_human(progress.downloaded)),
    }
}

fn progress_bar(percent: u8) -> String {
    let total = 30;
    let filled = (percent.min(100) as usize * total) / 100;
    let mut out = String::from("[");
    for i in 0..total {
        out.push(if i < filled { '#' } else { '.' });
    }
    out.push(']');
    out
}

fn bytes_to_human(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let value = bytes as f64;
    if value >= GB {
        format!("{:.1} GB", value / GB)
    } else if value >= MB {
        format!("{:.1} MB", value / MB)
    } else if value >= KB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{bytes} B")
    }
}
