use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{Days, NaiveDate};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{
    Book, IssueRecord, NewBook, ReadStatus, DEFAULT_RATING, MAX_RATING, MIN_RATING,
};

/// Days a loan runs when the issue form is opened.
const DEFAULT_LOAN_DAYS: u64 = 14;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Render `Name: value` with the shared highlighting rules: the focused field
/// is yellow, empty required fields show a gray placeholder.
fn field_line(field_name: &str, value: &str, is_active: bool, placeholder: &str) -> Line<'static> {
    let display = if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    };

    let style = if is_active {
        Style::default().fg(Color::Yellow)
    } else if value.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::raw(format!("{field_name}: ")),
        Span::styled(display, style),
    ])
}

fn parse_date(raw: &str, label: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| anyhow!("{label} must be a date like 2024-01-31."))
}

/// Credentials typed on the login screen.
#[derive(Default, Clone)]
pub(crate) struct LoginForm {
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) active: LoginField,
    pub(crate) error: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum LoginField {
    #[default]
    Username,
    Password,
}

impl LoginForm {
    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }

    pub(crate) fn push_char(&mut self, ch: char) {
        if ch.is_control() {
            return;
        }
        match self.active {
            LoginField::Username => self.username.push(ch),
            LoginField::Password => self.password.push(ch),
        }
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            LoginField::Username => {
                self.username.pop();
            }
            LoginField::Password => {
                self.password.pop();
            }
        }
    }

    pub(crate) fn parse_inputs(&self) -> Result<(String, String)> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(anyhow!("Username is required."));
        }
        if self.password.is_empty() {
            return Err(anyhow!("Password is required."));
        }
        Ok((username.to_string(), self.password.clone()))
    }

    /// The password is shown as one `*` per character.
    pub(crate) fn lines(&self) -> Vec<Line<'static>> {
        let masked = "*".repeat(self.password.chars().count());
        vec![
            field_line(
                "Username",
                &self.username,
                self.active == LoginField::Username,
                "<required>",
            ),
            field_line(
                "Password",
                &masked,
                self.active == LoginField::Password,
                "<required>",
            ),
        ]
    }

    /// Row and column of the text cursor, relative to the form's inner area.
    pub(crate) fn cursor(&self) -> (u16, u16) {
        match self.active {
            LoginField::Username => (0, ("Username: ".len() + self.username.chars().count()) as u16),
            LoginField::Password => (1, ("Password: ".len() + self.password.chars().count()) as u16),
        }
    }
}

/// Internal representation of the "add book" form.
#[derive(Clone)]
pub(crate) struct BookForm {
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) genre: String,
    pub(crate) year: String,
    pub(crate) status: ReadStatus,
    pub(crate) rating: i64,
    pub(crate) cover: String,
    pub(crate) active: BookField,
    pub(crate) error: Option<String>,
}

/// Fields of the add form in tab order.
#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) enum BookField {
    Title,
    Author,
    Genre,
    Year,
    Status,
    Rating,
    Cover,
}

impl BookField {
    const ORDER: [BookField; 7] = [
        BookField::Title,
        BookField::Author,
        BookField::Genre,
        BookField::Year,
        BookField::Status,
        BookField::Rating,
        BookField::Cover,
    ];

    fn index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|field| *field == self)
            .unwrap_or(0)
    }

    fn label(self) -> &'static str {
        match self {
            BookField::Title => "Title",
            BookField::Author => "Author",
            BookField::Genre => "Genre",
            BookField::Year => "Year",
            BookField::Status => "Status",
            BookField::Rating => "Rating",
            BookField::Cover => "Cover image",
        }
    }
}

impl Default for BookForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            genre: String::new(),
            year: String::new(),
            status: ReadStatus::default(),
            rating: DEFAULT_RATING,
            cover: String::new(),
            active: BookField::Title,
            error: None,
        }
    }
}

impl BookForm {
    pub(crate) fn next_field(&mut self) {
        let idx = (self.active.index() + 1) % BookField::ORDER.len();
        self.active = BookField::ORDER[idx];
    }

    pub(crate) fn previous_field(&mut self) {
        let len = BookField::ORDER.len();
        let idx = (self.active.index() + len - 1) % len;
        self.active = BookField::ORDER[idx];
    }

    /// Left/Right on the selector fields. Returns false when the focused
    /// field is free text.
    pub(crate) fn adjust(&mut self, forward: bool) -> bool {
        match self.active {
            BookField::Status => {
                self.status = if forward {
                    self.status.next()
                } else {
                    self.status.previous()
                };
                true
            }
            BookField::Rating => {
                let delta = if forward { 1 } else { -1 };
                self.rating = (self.rating + delta).clamp(MIN_RATING, MAX_RATING);
                true
            }
            _ => false,
        }
    }

    /// Append a character to the active field, validating allowed input.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            BookField::Title => self.title.push(ch),
            BookField::Author => self.author.push(ch),
            BookField::Genre => self.genre.push(ch),
            BookField::Cover => self.cover.push(ch),
            BookField::Year => {
                if !ch.is_ascii_digit() || self.year.len() >= 4 {
                    return false;
                }
                self.year.push(ch);
            }
            BookField::Rating => match ch.to_digit(10).map(i64::from) {
                Some(value) if (MIN_RATING..=MAX_RATING).contains(&value) => self.rating = value,
                _ => return false,
            },
            BookField::Status => match ch {
                ' ' => self.status = self.status.next(),
                _ => return false,
            },
        }
        true
    }

    pub(crate) fn backspace(&mut self) {
        let field = match self.active {
            BookField::Title => &mut self.title,
            BookField::Author => &mut self.author,
            BookField::Genre => &mut self.genre,
            BookField::Year => &mut self.year,
            BookField::Cover => &mut self.cover,
            BookField::Status | BookField::Rating => return,
        };
        field.pop();
    }

    /// Turn the form into a `NewBook` plus the optional cover file to upload.
    /// The catalog repeats the range checks; this only catches what cannot be
    /// expressed as a `NewBook` at all.
    pub(crate) fn parse_inputs(&self) -> Result<(NewBook, Option<PathBuf>)> {
        let year_raw = self.year.trim();
        if year_raw.is_empty() {
            return Err(anyhow!("Publication year is required."));
        }
        let year = year_raw
            .parse::<i64>()
            .map_err(|_| anyhow!("Publication year must be a number."))?;

        let book = NewBook::new(&self.title, &self.author, &self.genre, year)
            .with_status(self.status)
            .with_rating(self.rating);

        let cover = self.cover.trim();
        let cover = (!cover.is_empty()).then(|| PathBuf::from(cover));
        Ok((book, cover))
    }

    pub(crate) fn lines(&self) -> Vec<Line<'static>> {
        BookField::ORDER
            .iter()
            .map(|field| {
                let is_active = self.active == *field;
                match field {
                    BookField::Status => {
                        field_line(field.label(), &format!("< {} >", self.status), is_active, "")
                    }
                    BookField::Rating => {
                        field_line(field.label(), &stars(self.rating), is_active, "")
                    }
                    BookField::Cover => {
                        field_line(field.label(), &self.cover, is_active, "<optional file path>")
                    }
                    _ => field_line(field.label(), self.text_of(*field), is_active, "<required>"),
                }
            })
            .collect()
    }

    fn text_of(&self, field: BookField) -> &str {
        match field {
            BookField::Title => &self.title,
            BookField::Author => &self.author,
            BookField::Genre => &self.genre,
            BookField::Year => &self.year,
            BookField::Cover => &self.cover,
            BookField::Status | BookField::Rating => "",
        }
    }

    /// `None` while a selector field has focus; those have no text cursor.
    pub(crate) fn cursor(&self) -> Option<(u16, u16)> {
        match self.active {
            BookField::Status | BookField::Rating => None,
            field => {
                let prefix = field.label().len() + 2;
                let column = prefix + self.text_of(field).chars().count();
                Some((field.index() as u16, column as u16))
            }
        }
    }
}

/// Rating as filled and empty stars, e.g. `★★★☆☆`.
pub(crate) fn stars(rating: i64) -> String {
    let filled = rating.clamp(0, MAX_RATING) as usize;
    let empty = MAX_RATING as usize - filled;
    format!("{}{}", "★".repeat(filled), "☆".repeat(empty))
}

/// Loan details for the book being issued.
#[derive(Clone)]
pub(crate) struct IssueForm {
    pub(crate) book_id: i64,
    pub(crate) book_title: String,
    pub(crate) borrower: String,
    pub(crate) issue_date: String,
    pub(crate) due_date: String,
    pub(crate) active: IssueField,
    pub(crate) error: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) enum IssueField {
    Borrower,
    IssueDate,
    DueDate,
}

impl IssueForm {
    /// Prefill the dates with `today` and a two-week loan.
    pub(crate) fn for_book(book: &Book, today: NaiveDate) -> Self {
        let due = today
            .checked_add_days(Days::new(DEFAULT_LOAN_DAYS))
            .unwrap_or(today);
        Self {
            book_id: book.id,
            book_title: book.title.clone(),
            borrower: String::new(),
            issue_date: today.format(DATE_FORMAT).to_string(),
            due_date: due.format(DATE_FORMAT).to_string(),
            active: IssueField::Borrower,
            error: None,
        }
    }

    pub(crate) fn next_field(&mut self) {
        self.active = match self.active {
            IssueField::Borrower => IssueField::IssueDate,
            IssueField::IssueDate => IssueField::DueDate,
            IssueField::DueDate => IssueField::Borrower,
        };
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = match self.active {
            IssueField::Borrower => IssueField::DueDate,
            IssueField::IssueDate => IssueField::Borrower,
            IssueField::DueDate => IssueField::IssueDate,
        };
    }

    fn active_value(&mut self) -> &mut String {
        match self.active {
            IssueField::Borrower => &mut self.borrower,
            IssueField::IssueDate => &mut self.issue_date,
            IssueField::DueDate => &mut self.due_date,
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        let allowed = match self.active {
            IssueField::Borrower => !ch.is_control(),
            IssueField::IssueDate | IssueField::DueDate => ch.is_ascii_digit() || ch == '-',
        };
        if allowed {
            self.active_value().push(ch);
        }
        allowed
    }

    pub(crate) fn backspace(&mut self) {
        self.active_value().pop();
    }

    pub(crate) fn parse_inputs(&self) -> Result<(String, NaiveDate, NaiveDate)> {
        let borrower = self.borrower.trim();
        if borrower.is_empty() {
            return Err(anyhow!("Borrower name is required."));
        }
        let issue_date = parse_date(&self.issue_date, "Issue date")?;
        let due_date = parse_date(&self.due_date, "Due date")?;
        Ok((borrower.to_string(), issue_date, due_date))
    }

    pub(crate) fn lines(&self) -> Vec<Line<'static>> {
        vec![
            field_line(
                "Issued to",
                &self.borrower,
                self.active == IssueField::Borrower,
                "<required>",
            ),
            field_line(
                "Issue date",
                &self.issue_date,
                self.active == IssueField::IssueDate,
                "<YYYY-MM-DD>",
            ),
            field_line(
                "Due date",
                &self.due_date,
                self.active == IssueField::DueDate,
                "<YYYY-MM-DD>",
            ),
        ]
    }

    pub(crate) fn cursor(&self) -> (u16, u16) {
        let (row, prefix, value) = match self.active {
            IssueField::Borrower => (0, "Issued to: ", &self.borrower),
            IssueField::IssueDate => (1, "Issue date: ", &self.issue_date),
            IssueField::DueDate => (2, "Due date: ", &self.due_date),
        };
        (row, (prefix.len() + value.chars().count()) as u16)
    }
}

/// Single-line prompt for a file path (CSV import).
#[derive(Default, Clone)]
pub(crate) struct PathForm {
    pub(crate) path: String,
    pub(crate) error: Option<String>,
}

impl PathForm {
    pub(crate) fn push_char(&mut self, ch: char) {
        if !ch.is_control() {
            self.path.push(ch);
        }
    }

    pub(crate) fn backspace(&mut self) {
        self.path.pop();
    }

    pub(crate) fn parse_inputs(&self) -> Result<PathBuf> {
        let path = self.path.trim();
        if path.is_empty() {
            return Err(anyhow!("A CSV file path is required."));
        }
        Ok(PathBuf::from(path))
    }
}

#[derive(Clone)]
pub(crate) struct ConfirmBookDelete {
    pub(crate) id: i64,
    pub(crate) title: String,
    /// Current borrower, when the book is out on loan.
    pub(crate) issued_to: Option<String>,
}

impl ConfirmBookDelete {
    pub(crate) fn new(book: &Book, issue: Option<&IssueRecord>) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            issued_to: issue.map(|issue| issue.issued_to.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_form_builds_a_new_book() {
        let mut form = BookForm::default();
        for ch in "Dune".chars() {
            form.push_char(ch);
        }
        form.next_field();
        for ch in "Frank Herbert".chars() {
            form.push_char(ch);
        }
        form.next_field();
        for ch in "SciFi".chars() {
            form.push_char(ch);
        }
        form.next_field();
        for ch in "19x65".chars() {
            form.push_char(ch);
        }
        form.next_field();
        form.adjust(true);
        form.next_field();
        assert!(form.push_char('5'));
        assert!(!form.push_char('9'));

        let (book, cover) = form.parse_inputs().unwrap();
        assert_eq!(
            book,
            NewBook::new("Dune", "Frank Herbert", "SciFi", 1965)
                .with_status(ReadStatus::Reading)
                .with_rating(5)
        );
        assert!(cover.is_none());
    }

    #[test]
    fn book_form_requires_a_year() {
        let form = BookForm::default();
        assert_eq!(
            form.parse_inputs().unwrap_err().to_string(),
            "Publication year is required."
        );
    }

    #[test]
    fn field_navigation_wraps_around() {
        let mut form = BookForm::default();
        form.previous_field();
        assert!(form.active == BookField::Cover);
        form.next_field();
        assert!(form.active == BookField::Title);
    }

    #[test]
    fn issue_form_defaults_to_a_two_week_loan() {
        let book = Book {
            id: 3,
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            year: 1965,
            genre: "SciFi".into(),
            read_status: ReadStatus::Unread,
            cover_path: None,
            rating: 5,
        };
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut form = IssueForm::for_book(&book, today);
        assert_eq!(form.due_date, "2024-01-15");

        assert!(form.parse_inputs().is_err());
        for ch in "Alice".chars() {
            form.push_char(ch);
        }
        let (borrower, issued, due) = form.parse_inputs().unwrap();
        assert_eq!(borrower, "Alice");
        assert_eq!(issued, today);
        assert_eq!(due, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn stars_show_the_rating() {
        assert_eq!(stars(3), "★★★☆☆");
        assert_eq!(stars(5), "★★★★★");
    }
}
