//! Domain models that mirror the SQLite schema and get passed between the
//! catalog service and the TUI. These stay plain data holders; validation of
//! user input happens once, in `NewBook::validated`, before anything touches
//! the store.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Earliest publication year the add form accepts.
pub const MIN_YEAR: i64 = 1000;
/// Latest publication year the add form accepts.
pub const MAX_YEAR: i64 = 2100;
pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;
pub const DEFAULT_RATING: i64 = 3;

/// Reading progress for a catalog entry. Stored as its variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReadStatus {
    #[default]
    Unread,
    Reading,
    Read,
}

impl ReadStatus {
    /// Every status in display order. Statistics report counts in this order.
    pub const ALL: [ReadStatus; 3] = [ReadStatus::Unread, ReadStatus::Reading, ReadStatus::Read];

    pub fn as_str(self) -> &'static str {
        match self {
            ReadStatus::Unread => "Unread",
            ReadStatus::Reading => "Reading",
            ReadStatus::Read => "Read",
        }
    }

    /// Cycle forward through the statuses; used by the add form's selector.
    pub fn next(self) -> Self {
        match self {
            ReadStatus::Unread => ReadStatus::Reading,
            ReadStatus::Reading => ReadStatus::Read,
            ReadStatus::Read => ReadStatus::Unread,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            ReadStatus::Unread => ReadStatus::Read,
            ReadStatus::Reading => ReadStatus::Unread,
            ReadStatus::Read => ReadStatus::Reading,
        }
    }
}

impl fmt::Display for ReadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadStatus {
    type Err = CatalogError;

    /// Case-insensitive so hand-edited CSV files with `read` or `UNREAD` import
    /// cleanly.
    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        ReadStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                CatalogError::validation(
                    "read_status",
                    format!("unknown reading status \"{trimmed}\" (expected Unread, Reading or Read)"),
                )
            })
    }
}

impl ToSql for ReadStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ReadStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse()
            .map_err(|err: CatalogError| FromSqlError::Other(Box::new(err)))
    }
}

/// A catalog entry as stored in the `books` table. Field order matches the
/// schema column order, which is also the CSV export column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    /// Primary key assigned by SQLite on insert.
    pub id: i64,
    pub title: String,
    pub author: String,
    /// Publication year.
    pub year: i64,
    pub genre: String,
    pub read_status: ReadStatus,
    /// Path or URI of the cover image, when one was uploaded or imported.
    pub cover_path: Option<String>,
    /// Always within `MIN_RATING..=MAX_RATING`; the table has a CHECK for it.
    pub rating: i64,
}

impl Book {
    /// `Title by Author (Year)`, the one-line form used in lists.
    pub fn display_title(&self) -> String {
        format!("{} by {} ({})", self.title, self.author, self.year)
    }
}

/// Input for `add_book` and each imported row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub year: i64,
    pub read_status: ReadStatus,
    pub cover_path: Option<String>,
    pub rating: i64,
}

impl NewBook {
    /// Start from the required fields; status and rating take their defaults.
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        genre: impl Into<String>,
        year: i64,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            genre: genre.into(),
            year,
            read_status: ReadStatus::default(),
            cover_path: None,
            rating: DEFAULT_RATING,
        }
    }

    pub fn with_status(mut self, status: ReadStatus) -> Self {
        self.read_status = status;
        self
    }

    pub fn with_rating(mut self, rating: i64) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_cover(mut self, cover_path: impl Into<String>) -> Self {
        self.cover_path = Some(cover_path.into());
        self
    }

    /// Check every field and return a trimmed copy ready for insertion. An
    /// empty cover path is treated as no cover at all.
    pub fn validated(&self) -> Result<NewBook> {
        let title = required_text("title", &self.title)?;
        let author = required_text("author", &self.author)?;
        let genre = required_text("genre", &self.genre)?;

        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return Err(CatalogError::validation(
                "year",
                format!("must be between {MIN_YEAR} and {MAX_YEAR}, got {}", self.year),
            ));
        }
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(CatalogError::validation(
                "rating",
                format!(
                    "must be between {MIN_RATING} and {MAX_RATING}, got {}",
                    self.rating
                ),
            ));
        }

        let cover_path = self
            .cover_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(str::to_string);

        Ok(NewBook {
            title,
            author,
            genre,
            year: self.year,
            read_status: self.read_status,
            cover_path,
            rating: self.rating,
        })
    }
}

fn required_text(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CatalogError::validation(field, "is required"))
    } else {
        Ok(trimmed.to_string())
    }
}

/// How callers point at a book: by id, or by its exact title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookRef {
    Id(i64),
    Title(String),
}

impl From<i64> for BookRef {
    fn from(id: i64) -> Self {
        BookRef::Id(id)
    }
}

impl From<&str> for BookRef {
    fn from(title: &str) -> Self {
        BookRef::Title(title.to_string())
    }
}

impl From<&Book> for BookRef {
    fn from(book: &Book) -> Self {
        BookRef::Id(book.id)
    }
}

impl fmt::Display for BookRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookRef::Id(id) => write!(f, "book #{id}"),
            BookRef::Title(title) => write!(f, "book \"{title}\""),
        }
    }
}

/// A live loan. The row disappears when the book is returned or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRecord {
    pub id: i64,
    pub book_id: i64,
    /// Title of the referenced book, joined in for display.
    pub book_title: String,
    pub issued_to: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
}

impl IssueRecord {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date < today
    }
}

/// Aggregate snapshot returned by `Catalog::statistics`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statistics {
    pub total: i64,
    pub issued: i64,
    pub available: i64,
    /// One entry per status in `ReadStatus::ALL` order, zero counts included.
    pub by_status: Vec<(ReadStatus, i64)>,
    /// At most five genres, most frequent first; ties keep insertion order.
    pub top_genres: Vec<(String, i64)>,
    /// Every book's rating in insertion order.
    pub ratings: Vec<i64>,
}

impl Statistics {
    /// Bin the ratings into five equal-width buckets over `[1, 5]`. Integer
    /// ratings land one per bucket.
    pub fn rating_histogram(&self) -> [u64; 5] {
        let mut buckets = [0u64; 5];
        for rating in &self.ratings {
            let idx = (rating - MIN_RATING).clamp(0, 4) as usize;
            buckets[idx] += 1;
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_status_parses_any_case() {
        assert_eq!("read".parse::<ReadStatus>().unwrap(), ReadStatus::Read);
        assert_eq!(" UNREAD ".parse::<ReadStatus>().unwrap(), ReadStatus::Unread);
        assert!(matches!(
            "finished".parse::<ReadStatus>(),
            Err(CatalogError::Validation {
                field: "read_status",
                ..
            })
        ));
    }

    #[test]
    fn read_status_cycles_through_all_values() {
        let mut status = ReadStatus::Unread;
        for _ in 0..ReadStatus::ALL.len() {
            status = status.next();
        }
        assert_eq!(status, ReadStatus::Unread);
        assert_eq!(ReadStatus::Unread.previous(), ReadStatus::Read);
    }

    #[test]
    fn validated_trims_and_drops_blank_cover() {
        let book = NewBook::new("  Dune ", "Frank Herbert", "SciFi", 1965).with_cover("   ");
        let clean = book.validated().unwrap();
        assert_eq!(clean.title, "Dune");
        assert_eq!(clean.cover_path, None);
        assert_eq!(clean.rating, DEFAULT_RATING);
        assert_eq!(clean.read_status, ReadStatus::Unread);
    }

    #[test]
    fn validated_rejects_missing_and_out_of_range_fields() {
        let blank_author = NewBook::new("Dune", " ", "SciFi", 1965);
        assert!(matches!(
            blank_author.validated(),
            Err(CatalogError::Validation { field: "author", .. })
        ));

        let bad_rating = NewBook::new("Dune", "Frank Herbert", "SciFi", 1965).with_rating(6);
        assert!(matches!(
            bad_rating.validated(),
            Err(CatalogError::Validation { field: "rating", .. })
        ));

        let bad_year = NewBook::new("Dune", "Frank Herbert", "SciFi", 0);
        assert!(matches!(
            bad_year.validated(),
            Err(CatalogError::Validation { field: "year", .. })
        ));
    }

    #[test]
    fn rating_histogram_bins_each_rating() {
        let stats = Statistics {
            ratings: vec![5, 5, 4, 1, 3, 5],
            ..Statistics::default()
        };
        assert_eq!(stats.rating_histogram(), [1, 0, 1, 1, 3]);
    }

    #[test]
    fn overdue_compares_due_date_with_today() {
        let record = IssueRecord {
            id: 1,
            book_id: 1,
            book_title: "Dune".into(),
            issued_to: "Alice".into(),
            issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        };
        assert!(!record.is_overdue(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()));
        assert!(record.is_overdue(NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()));
    }
}
