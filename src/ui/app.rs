use std::mem;

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use crossterm::event::KeyCode;
use open::that as open_path;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::covers::CoverUpload;
use crate::models::{BookRef, Statistics};

use super::forms::{stars, BookForm, ConfirmBookDelete, IssueForm, LoginForm, PathForm};
use super::helpers::{bar_chart, centered_rect, surface_error};
use super::screens::{BookScreen, ReturnState};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Rows skipped by PageUp/PageDown in lists.
const PAGE_STEP: isize = 10;

/// Who is logged in. Replaced wholesale on logout instead of being cleared
/// field by field.
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub started_at: NaiveDateTime,
}

/// High-level navigation states.
enum Screen {
    Login(LoginForm),
    Books(BookScreen),
    Statistics(Statistics),
}

/// Modal states layered over the current screen.
enum Mode {
    Normal,
    Searching(SearchState),
    AddingBook(BookForm),
    ConfirmDelete(ConfirmBookDelete),
    Issuing(IssueForm),
    Returning(ReturnState),
    Importing(PathForm),
}

/// State for an active inline search.
struct SearchState {
    query: String,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    catalog: Catalog,
    config: Config,
    session: Option<Session>,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    /// Start on the login screen.
    pub fn new(catalog: Catalog, config: Config) -> Self {
        Self {
            catalog,
            config,
            session: None,
            screen: Screen::Login(LoginForm::default()),
            mode: Mode::Normal,
            status: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Route one key press. Returns `true` when the application should exit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mut mode = mem::replace(&mut self.mode, Mode::Normal);

        mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::Searching(state) => self.handle_search(code, state)?,
            Mode::AddingBook(form) => self.handle_add_book(code, form)?,
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm)?,
            Mode::Issuing(form) => self.handle_issue(code, form)?,
            Mode::Returning(state) => self.handle_return(code, state)?,
            Mode::Importing(form) => self.handle_import(code, form)?,
        };

        self.mode = mode;
        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match self.screen {
            Screen::Login(ref mut form) => {
                match code {
                    KeyCode::Esc => *exit = true,
                    KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                        form.toggle_field()
                    }
                    KeyCode::Backspace => form.backspace(),
                    KeyCode::Enter => {
                        let form = form.clone();
                        self.attempt_login(form)?;
                    }
                    KeyCode::Char(ch) => form.push_char(ch),
                    _ => {}
                }
                Ok(Mode::Normal)
            }
            Screen::Statistics(_) => {
                match code {
                    KeyCode::Char('q') => *exit = true,
                    KeyCode::Esc | KeyCode::Char('s') | KeyCode::Char('S') => {
                        self.clear_status();
                        self.open_book_list()?;
                    }
                    KeyCode::Char('L') => self.logout(),
                    _ => {}
                }
                Ok(Mode::Normal)
            }
            Screen::Books(ref mut books) => {
                match code {
                    KeyCode::Char('q') => *exit = true,
                    KeyCode::Up => books.move_selection(-1),
                    KeyCode::Down => books.move_selection(1),
                    KeyCode::PageUp => books.move_selection(-PAGE_STEP),
                    KeyCode::PageDown => books.move_selection(PAGE_STEP),
                    KeyCode::Home => books.move_selection(isize::MIN / 2),
                    KeyCode::End => books.move_selection(isize::MAX / 2),
                    KeyCode::Esc => {
                        if books.filter.is_some() {
                            books.filter = None;
                            self.clear_status();
                            self.reload_books(None)?;
                        }
                    }
                    KeyCode::Char('/') => {
                        let query = books.filter.clone().unwrap_or_default();
                        self.clear_status();
                        return Ok(Mode::Searching(SearchState { query }));
                    }
                    KeyCode::Char('a') | KeyCode::Char('A') => self.toggle_available_only()?,
                    KeyCode::Char('+') => {
                        self.clear_status();
                        return Ok(Mode::AddingBook(BookForm::default()));
                    }
                    KeyCode::Char('-') | KeyCode::Delete => {
                        if let Some(book) = books.current_book() {
                            let confirm = ConfirmBookDelete::new(book, books.issue_for(book.id));
                            self.clear_status();
                            return Ok(Mode::ConfirmDelete(confirm));
                        }
                        self.set_status("No book selected to delete.", StatusKind::Error);
                    }
                    KeyCode::Char('i') | KeyCode::Char('I') => {
                        let Some(book) = books.current_book() else {
                            self.set_status("No book selected to issue.", StatusKind::Error);
                            return Ok(Mode::Normal);
                        };
                        if let Some(issue) = books.issue_for(book.id) {
                            let message = format!(
                                "\"{}\" is already issued to {} until {}.",
                                book.title, issue.issued_to, issue.due_date
                            );
                            self.set_status(message, StatusKind::Error);
                            return Ok(Mode::Normal);
                        }
                        let form = IssueForm::for_book(book, Local::now().date_naive());
                        self.clear_status();
                        return Ok(Mode::Issuing(form));
                    }
                    KeyCode::Char('r') | KeyCode::Char('R') => {
                        let focus = books.current_book().map(|book| book.id);
                        let issues = self.catalog.list_issues()?;
                        if issues.is_empty() {
                            self.set_status("No books are currently issued.", StatusKind::Info);
                            return Ok(Mode::Normal);
                        }
                        self.clear_status();
                        return Ok(Mode::Returning(ReturnState::new(issues, focus)));
                    }
                    KeyCode::Char('o') | KeyCode::Char('O') => self.open_cover(),
                    KeyCode::Char('s') | KeyCode::Char('S') => {
                        self.clear_status();
                        self.open_statistics()?;
                    }
                    KeyCode::Char('x') | KeyCode::Char('X') => self.export_books(),
                    KeyCode::Char('m') | KeyCode::Char('M') => {
                        self.clear_status();
                        return Ok(Mode::Importing(PathForm::default()));
                    }
                    KeyCode::Char('L') => self.logout(),
                    _ => {}
                }
                Ok(Mode::Normal)
            }
        }
    }

    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.apply_filter(None)?;
                Ok(Mode::Normal)
            }
            KeyCode::Enter => {
                let query = state.query.trim().to_string();
                let filter = (!query.is_empty()).then_some(query);
                self.apply_filter(filter)?;
                Ok(Mode::Normal)
            }
            KeyCode::Backspace => {
                state.query.pop();
                self.apply_filter(Some(state.query.clone()))?;
                Ok(Mode::Searching(state))
            }
            KeyCode::Char(ch) if !ch.is_control() => {
                state.query.push(ch);
                self.apply_filter(Some(state.query.clone()))?;
                Ok(Mode::Searching(state))
            }
            _ => Ok(Mode::Searching(state)),
        }
    }

    fn handle_add_book(&mut self, code: KeyCode, mut form: BookForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Add book cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Left => {
                form.adjust(false);
            }
            KeyCode::Right => {
                form.adjust(true);
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_new_book(&form) {
                Ok(()) => return Ok(Mode::Normal),
                Err(err) => form.error = Some(surface_error(&err)),
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::AddingBook(form))
    }

    fn handle_confirm_delete(&mut self, code: KeyCode, confirm: ConfirmBookDelete) -> Result<Mode> {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Err(err) = self.perform_delete(&confirm) {
                    self.set_status(surface_error(&err), StatusKind::Error);
                }
                Ok(Mode::Normal)
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmDelete(confirm)),
        }
    }

    fn handle_issue(&mut self, code: KeyCode, mut form: IssueForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Issue cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_issue(&form) {
                Ok(()) => return Ok(Mode::Normal),
                Err(err) => form.error = Some(surface_error(&err)),
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::Issuing(form))
    }

    fn handle_return(&mut self, code: KeyCode, mut state: ReturnState) -> Result<Mode> {
        match code {
            KeyCode::Esc => Ok(Mode::Normal),
            KeyCode::Up => {
                state.move_selection(-1);
                Ok(Mode::Returning(state))
            }
            KeyCode::Down => {
                state.move_selection(1);
                Ok(Mode::Returning(state))
            }
            KeyCode::Enter => {
                let Some(issue) = state.current().cloned() else {
                    return Ok(Mode::Normal);
                };
                match self.catalog.return_book(&BookRef::Id(issue.book_id)) {
                    Ok(_) => {
                        self.reload_books(Some(issue.book_id))?;
                        self.set_status(
                            format!("\"{}\" returned by {}.", issue.book_title, issue.issued_to),
                            StatusKind::Info,
                        );
                    }
                    Err(err) => self.set_status(surface_error(&err.into()), StatusKind::Error),
                }
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::Returning(state)),
        }
    }

    fn handle_import(&mut self, code: KeyCode, mut form: PathForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Import cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.import_books(&form) {
                Ok(()) => return Ok(Mode::Normal),
                Err(err) => form.error = Some(surface_error(&err)),
            },
            KeyCode::Char(ch) => {
                form.push_char(ch);
                form.error = None;
            }
            _ => {}
        }
        Ok(Mode::Importing(form))
    }

    /// Ctrl+A: flip the available-only filter from anywhere on the book list,
    /// including while a search is being typed.
    pub(crate) fn handle_ctrl_a(&mut self) -> Result<()> {
        if matches!(self.mode, Mode::Normal | Mode::Searching(_)) {
            self.toggle_available_only()?;
        }
        Ok(())
    }

    /// Ctrl+L: log out unless a dialog is open.
    pub(crate) fn handle_ctrl_l(&mut self) -> Result<()> {
        if matches!(self.mode, Mode::Normal) {
            self.logout();
        }
        Ok(())
    }

    fn attempt_login(&mut self, form: LoginForm) -> Result<()> {
        let (username, password) = match form.parse_inputs() {
            Ok(credentials) => credentials,
            Err(err) => {
                self.set_login_error(surface_error(&err));
                return Ok(());
            }
        };

        if !self.catalog.authenticate(&username, &password)? {
            self.set_login_error("Unknown username or wrong password.".to_string());
            return Ok(());
        }

        info!(username = %username, "session started");
        self.session = Some(Session {
            username: username.clone(),
            started_at: Local::now().naive_local(),
        });
        self.open_book_list()?;
        self.set_status(format!("Welcome, {username}!"), StatusKind::Info);
        Ok(())
    }

    fn set_login_error(&mut self, message: String) {
        if let Screen::Login(form) = &mut self.screen {
            form.password.clear();
            form.error = Some(message);
        }
    }

    fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            info!(username = %session.username, "session ended");
        }
        self.mode = Mode::Normal;
        self.screen = Screen::Login(LoginForm::default());
        self.set_status("Logged out.", StatusKind::Info);
    }

    fn open_book_list(&mut self) -> Result<()> {
        if !matches!(self.screen, Screen::Books(_)) {
            self.screen = Screen::Books(BookScreen::new());
        }
        self.reload_books(None)
    }

    fn open_statistics(&mut self) -> Result<()> {
        let stats = self.catalog.statistics()?;
        self.screen = Screen::Statistics(stats);
        Ok(())
    }

    /// Re-query the list with the screen's current filter settings.
    fn reload_books(&mut self, focus_id: Option<i64>) -> Result<()> {
        let Screen::Books(screen) = &mut self.screen else {
            return Ok(());
        };
        let books = self
            .catalog
            .list_books(screen.filter_text(), screen.available_only)?;
        let issues = self.catalog.list_issues()?;
        screen.replace(books, issues, focus_id);
        Ok(())
    }

    fn apply_filter(&mut self, filter: Option<String>) -> Result<()> {
        if let Screen::Books(screen) = &mut self.screen {
            screen.filter = filter.filter(|query| !query.trim().is_empty());
        }
        self.reload_books(None)
    }

    fn toggle_available_only(&mut self) -> Result<()> {
        let Screen::Books(screen) = &mut self.screen else {
            return Ok(());
        };
        screen.available_only = !screen.available_only;
        let message = if screen.available_only {
            "Showing only available books."
        } else {
            "Showing all books."
        };
        self.reload_books(None)?;
        self.set_status(message, StatusKind::Info);
        Ok(())
    }

    fn save_new_book(&mut self, form: &BookForm) -> Result<()> {
        let (book, cover_path) = form.parse_inputs()?;
        let cover = cover_path
            .as_deref()
            .map(CoverUpload::from_path)
            .transpose()?;
        let title = book.title.trim().to_string();
        let id = self.catalog.add_book(book, cover)?;
        self.reload_books(Some(id))?;
        self.set_status(format!("Added \"{title}\"."), StatusKind::Info);
        Ok(())
    }

    fn perform_delete(&mut self, confirm: &ConfirmBookDelete) -> Result<()> {
        self.catalog.delete_book(&BookRef::Id(confirm.id))?;
        self.reload_books(None)?;
        self.set_status(format!("Deleted \"{}\".", confirm.title), StatusKind::Info);
        Ok(())
    }

    fn save_issue(&mut self, form: &IssueForm) -> Result<()> {
        let (borrower, issue_date, due_date) = form.parse_inputs()?;
        self.catalog
            .issue_book(&BookRef::Id(form.book_id), &borrower, issue_date, due_date)?;
        self.reload_books(Some(form.book_id))?;
        self.set_status(
            format!("\"{}\" issued to {borrower} until {due_date}.", form.book_title),
            StatusKind::Info,
        );
        Ok(())
    }

    fn export_books(&mut self) {
        let path = self.config.export_path();
        match self.catalog.export_to_file(&path) {
            Ok(count) => self.set_status(
                format!("Exported {count} book(s) to {}.", path.display()),
                StatusKind::Info,
            ),
            Err(err) => self.set_status(surface_error(&err.into()), StatusKind::Error),
        }
    }

    fn import_books(&mut self, form: &PathForm) -> Result<()> {
        let path = form.parse_inputs()?;
        let count = self.catalog.import_from_file(&path)?;
        self.reload_books(None)?;
        self.set_status(
            format!("Imported {count} book(s) from {}.", path.display()),
            StatusKind::Info,
        );
        Ok(())
    }

    /// Hand the selected book's cover to the system image viewer.
    fn open_cover(&mut self) {
        let Screen::Books(screen) = &self.screen else {
            return;
        };
        let Some(book) = screen.current_book() else {
            self.set_status("No book selected.", StatusKind::Error);
            return;
        };
        let Some(cover) = book.cover_path.clone() else {
            let message = format!("\"{}\" has no cover image.", book.title);
            self.set_status(message, StatusKind::Error);
            return;
        };

        // Relative references (the seeded covers) live in the uploads folder.
        let path = if std::path::Path::new(&cover).is_absolute() {
            std::path::PathBuf::from(&cover)
        } else {
            self.config.uploads_dir().join(&cover)
        };
        match open_path(&path) {
            Ok(()) => self.set_status(format!("Opened {}.", path.display()), StatusKind::Info),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to open cover");
                self.set_status(
                    format!("Could not open {}: {err}", path.display()),
                    StatusKind::Error,
                );
            }
        }
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Login(form) => self.draw_login(frame, content_area, form),
            Screen::Books(books) => self.draw_book_list(frame, content_area, books),
            Screen::Statistics(stats) => self.draw_statistics(frame, content_area, stats),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::Searching(state) => self.draw_search_bar(frame, area, state),
            Mode::AddingBook(form) => self.draw_book_form(frame, area, form),
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::Issuing(form) => self.draw_issue_form(frame, area, form),
            Mode::Returning(state) => self.draw_return(frame, area, state),
            Mode::Importing(form) => self.draw_import(frame, area, form),
            Mode::Normal => {}
        }
    }

    fn draw_login(&self, frame: &mut Frame, area: Rect, form: &LoginForm) {
        let popup_area = centered_rect(50, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Welcome to Book Haven")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = form.lines();
        lines.push(Line::from(""));
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "\"A reader lives a thousand lives before he dies.\"",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);

        let (row, column) = form.cursor();
        frame.set_cursor_position((inner.x + column, inner.y + row));
    }

    fn draw_book_list(&self, frame: &mut Frame, area: Rect, screen: &BookScreen) {
        let user = session_label(self.session.as_ref());
        let mut title = format!("Books ({}) - {user}", screen.books.len());
        if let Some(filter) = screen.filter_text() {
            title.push_str(&format!(" - filter: \"{filter}\""));
        }
        if screen.available_only {
            title.push_str(" - available only");
        }
        let block = Block::default().title(title).borders(Borders::ALL);

        if screen.books.is_empty() {
            let message = if screen.filter.is_some() || screen.available_only {
                "No books match. Press Esc to clear the filter or 'a' to show all books."
            } else {
                "The catalog is empty. Press '+' to add a book or 'm' to import a CSV."
            };
            let paragraph = Paragraph::new(message)
                .block(block)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(4)])
            .split(area);

        let items: Vec<ListItem> = screen
            .books
            .iter()
            .map(|book| {
                let availability = match screen.issue_for(book.id) {
                    Some(issue) => Span::styled(
                        format!("  issued to {}", issue.issued_to),
                        Style::default().fg(Color::Red),
                    ),
                    None => Span::styled("  available", Style::default().fg(Color::Green)),
                };
                ListItem::new(Line::from(vec![
                    Span::styled(
                        book.title.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(format!(" by {} ({})", book.author, book.year)),
                    Span::styled(
                        format!("  [{}]", book.genre),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::styled(
                        format!("  {}", stars(book.rating)),
                        Style::default().fg(Color::Yellow),
                    ),
                    availability,
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("> ");
        let mut state = ListState::default();
        state.select(Some(screen.selected));
        frame.render_stateful_widget(list, chunks[0], &mut state);

        let details = screen.current_book().map(|book| {
            let today = Local::now().date_naive();
            let loan = match screen.issue_for(book.id) {
                Some(issue) if issue.is_overdue(today) => Span::styled(
                    format!(
                        "Issued to {} on {}, OVERDUE since {}",
                        issue.issued_to, issue.issue_date, issue.due_date
                    ),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Some(issue) => Span::raw(format!(
                    "Issued to {} on {}, due {}",
                    issue.issued_to, issue.issue_date, issue.due_date
                )),
                None => Span::raw("On the shelf"),
            };
            vec![
                Line::from(format!(
                    "#{}  {}  Status: {}  Cover: {}",
                    book.id,
                    book.display_title(),
                    book.read_status,
                    book.cover_path.as_deref().unwrap_or("none")
                )),
                Line::from(loan),
            ]
        });
        let paragraph = Paragraph::new(details.unwrap_or_default())
            .block(Block::default().borders(Borders::ALL).title("Details"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, chunks[1]);
    }

    fn draw_statistics(&self, frame: &mut Frame, area: Rect, stats: &Statistics) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(8)])
            .split(area);

        let metrics = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(rows[0]);
        for (idx, (label, value)) in [
            ("Total Books", stats.total),
            ("Issued Books", stats.issued),
            ("Available Books", stats.available),
        ]
        .into_iter()
        .enumerate()
        {
            let paragraph = Paragraph::new(Line::from(Span::styled(
                value.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            )))
            .alignment(Alignment::Center)
            .block(Block::default().title(label).borders(Borders::ALL));
            frame.render_widget(paragraph, metrics[idx]);
        }

        let charts = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(rows[1]);

        let status_data: Vec<(String, u64)> = stats
            .by_status
            .iter()
            .map(|(status, count)| (status.as_str().to_string(), *count as u64))
            .collect();
        frame.render_widget(
            bar_chart("Reading Status", &status_data, Color::LightRed, false),
            charts[0],
        );

        if stats.top_genres.is_empty() {
            let paragraph = Paragraph::new("No genre data available.")
                .block(Block::default().title("Top 5 Genres").borders(Borders::ALL));
            frame.render_widget(paragraph, charts[1]);
        } else {
            let genre_data: Vec<(String, u64)> = stats
                .top_genres
                .iter()
                .map(|(genre, count)| (genre.clone(), *count as u64))
                .collect();
            frame.render_widget(
                bar_chart("Top 5 Genres", &genre_data, Color::LightYellow, true),
                charts[1],
            );
        }

        let rating_data: Vec<(String, u64)> = stats
            .rating_histogram()
            .iter()
            .enumerate()
            .map(|(idx, count)| (stars(idx as i64 + 1), *count))
            .collect();
        frame.render_widget(
            bar_chart("Rating Distribution", &rating_data, Color::Yellow, true),
            charts[2],
        );
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Search by title, author or genre");
        let paragraph = Paragraph::new(Span::raw(format!("Search: {}", state.query)))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + "Search: ".len() as u16 + state.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let keys: &[(&str, &str)] = match (&self.screen, &self.mode) {
            (_, Mode::Searching(_)) => &[("[Enter]", "Keep filter"), ("[Esc]", "Clear")],
            (_, Mode::AddingBook(_)) => &[
                ("[Tab]", "Next field"),
                ("[←→]", "Change status/rating"),
                ("[Enter]", "Save"),
                ("[Esc]", "Cancel"),
            ],
            (_, Mode::Issuing(_)) | (_, Mode::Importing(_)) => {
                &[("[Tab]", "Next field"), ("[Enter]", "Save"), ("[Esc]", "Cancel")]
            }
            (_, Mode::Returning(_)) => {
                &[("[↑↓]", "Navigate"), ("[Enter]", "Return"), ("[Esc]", "Cancel")]
            }
            (_, Mode::ConfirmDelete(_)) => &[("[Y]", "Delete"), ("[N]", "Keep")],
            (Screen::Login(_), _) => {
                &[("[Tab]", "Switch field"), ("[Enter]", "Login"), ("[Esc]", "Quit")]
            }
            (Screen::Statistics(_), _) => {
                &[("[Esc]", "Back"), ("[L]", "Logout"), ("[q]", "Quit")]
            }
            (Screen::Books(_), _) => &[
                ("[/]", "Search"),
                ("[a]", "Available only"),
                ("[+]", "Add"),
                ("[-]", "Delete"),
                ("[i]", "Issue"),
                ("[r]", "Return"),
                ("[o]", "Cover"),
                ("[s]", "Stats"),
                ("[x]", "Export"),
                ("[m]", "Import"),
                ("[L]", "Logout"),
                ("[q]", "Quit"),
            ],
        };

        let mut spans = Vec::with_capacity(keys.len() * 2);
        for (key, action) in keys {
            spans.push(Span::styled(*key, key_style));
            spans.push(Span::raw(format!(" {action}   ")));
        }
        Line::from(spans)
    }

    fn draw_book_form(&self, frame: &mut Frame, area: Rect, form: &BookForm) {
        let popup_area = centered_rect(70, 60, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Add a New Book").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = form.lines();
        lines.push(Line::from(""));
        push_form_hint(&mut lines, form.error.as_deref());

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);

        if let Some((row, column)) = form.cursor() {
            frame.set_cursor_position((inner.x + column, inner.y + row));
        }
    }

    fn draw_issue_form(&self, frame: &mut Frame, area: Rect, form: &IssueForm) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(format!("Issue \"{}\"", form.book_title))
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = form.lines();
        lines.push(Line::from(""));
        push_form_hint(&mut lines, form.error.as_deref());

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);

        let (row, column) = form.cursor();
        frame.set_cursor_position((inner.x + column, inner.y + row));
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmBookDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Confirm Deletion")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![Line::from(format!("Delete \"{}\"?", confirm.title))];
        if let Some(borrower) = &confirm.issued_to {
            lines.push(Line::from(Span::styled(
                format!("It is on loan to {borrower}; the loan record goes with it."),
                Style::default().fg(Color::Red),
            )));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Press Y to confirm or N / Esc to cancel.",
            Style::default().fg(Color::Gray),
        )));

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_return(&self, frame: &mut Frame, area: Rect, state: &ReturnState) {
        let popup_area = centered_rect(70, 60, area);
        frame.render_widget(Clear, popup_area);

        let today = Local::now().date_naive();
        let items: Vec<ListItem> = state
            .issues
            .iter()
            .map(|issue| {
                let style = if issue.is_overdue(today) {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(Span::styled(
                    format!(
                        "{} - {} (due {})",
                        issue.issued_to, issue.book_title, issue.due_date
                    ),
                    style,
                )))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .title("Return a Book")
                    .borders(Borders::ALL),
            )
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("> ");
        let mut list_state = ListState::default();
        list_state.select(Some(state.selected));
        frame.render_stateful_widget(list, popup_area, &mut list_state);
    }

    fn draw_import(&self, frame: &mut Frame, area: Rect, form: &PathForm) {
        let popup_area = centered_rect(70, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Import Books from CSV")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![
            Line::from(format!("File: {}", form.path)),
            Line::from(Span::styled(
                "Columns: title, author, year, genre [, read_status, cover_path, rating]",
                Style::default().fg(Color::Gray),
            )),
            Line::from(""),
        ];
        push_form_hint(&mut lines, form.error.as_deref());

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
        let cursor_x = inner.x + "File: ".len() as u16 + form.path.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }
}

/// `alice (since 2024-01-01 09:30)`, or `guest` before anyone logs in.
fn session_label(session: Option<&Session>) -> String {
    match session {
        Some(session) => format!(
            "{} (since {})",
            session.username,
            session.started_at.format("%Y-%m-%d %H:%M")
        ),
        None => "guest".to_string(),
    }
}

/// Either the form's error in red or the usual key hint in gray.
fn push_form_hint(lines: &mut Vec<Line<'static>>, error: Option<&str>) {
    match error {
        Some(error) => lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        ))),
        None => lines.push(Line::from(Span::styled(
            "Enter to save • Tab to switch fields • Esc to cancel",
            Style::default().fg(Color::Gray),
        ))),
    }
}
