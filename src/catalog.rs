//! The catalog service: the only way the front end reaches the store.
//!
//! Each public method opens one transaction, runs its statements through the
//! `db` helpers, and commits. Returning early with `?` drops the transaction,
//! which rolls it back, so a failing operation never leaves partial state.

use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, Transaction};
use tracing::{debug, info, warn};

use crate::covers::{CoverStore, CoverUpload};
use crate::db;
use crate::error::{CatalogError, Result, StorageContext};
use crate::models::{Book, BookRef, IssueRecord, NewBook, Statistics};

pub struct Catalog {
    conn: Connection,
    covers: Box<dyn CoverStore>,
}

impl Catalog {
    /// Wrap a connection that already went through schema initialization.
    pub fn new(conn: Connection, covers: impl CoverStore + 'static) -> Self {
        Self {
            conn,
            covers: Box::new(covers),
        }
    }

    fn begin(&mut self) -> Result<Transaction<'_>> {
        self.conn
            .transaction()
            .context("failed to begin transaction")
    }

    /// Books in insertion order. `filter` matches title, author or genre
    /// without regard to case; `available_only` hides books on loan.
    pub fn list_books(&mut self, filter: Option<&str>, available_only: bool) -> Result<Vec<Book>> {
        let tx = self.begin()?;
        let books = db::fetch_books(&tx, filter, available_only)?;
        tx.commit().context("failed to commit book listing")?;
        debug!(count = books.len(), ?filter, available_only, "listed books");
        Ok(books)
    }

    /// Title/author search.
    pub fn search_books(&mut self, query: &str) -> Result<Vec<Book>> {
        let tx = self.begin()?;
        let books = db::search_books(&tx, query)?;
        tx.commit().context("failed to commit search")?;
        Ok(books)
    }

    pub fn get_book(&mut self, book: &BookRef) -> Result<Book> {
        let tx = self.begin()?;
        let found = db::resolve_book(&tx, book)?;
        tx.commit().context("failed to commit book lookup")?;
        Ok(found)
    }

    /// Validate and insert a book, returning its id. A cover upload is handed
    /// to the cover store first and the reference it returns wins over any
    /// `cover_path` already on `book`. If the insert then fails, the stored
    /// cover is removed again.
    pub fn add_book(&mut self, book: NewBook, cover: Option<CoverUpload>) -> Result<i64> {
        let mut book = book.validated().inspect_err(|err| {
            warn!(error = %err, "rejected new book");
        })?;

        let stored = match cover {
            Some(upload) => {
                let reference = self.covers.store(&upload.name, &upload.bytes)?;
                book.cover_path = Some(reference.clone());
                Some(reference)
            }
            None => None,
        };

        let id = match self.insert_new_book(&book) {
            Ok(id) => id,
            Err(err) => {
                if let Some(reference) = stored {
                    if let Err(cleanup) = self.covers.remove(&reference) {
                        warn!(error = %cleanup, reference, "failed to remove orphaned cover");
                    }
                }
                return Err(err);
            }
        };

        info!(id, title = %book.title, "added book");
        Ok(id)
    }

    fn insert_new_book(&mut self, book: &NewBook) -> Result<i64> {
        let tx = self.begin()?;
        let id = db::insert_book(&tx, book)?;
        tx.commit().context("failed to commit new book")?;
        Ok(id)
    }

    /// Remove a book; its issue records go with it through the FK cascade.
    pub fn delete_book(&mut self, book: &BookRef) -> Result<()> {
        let tx = self.begin()?;
        let found = db::resolve_book(&tx, book)?;
        db::delete_book(&tx, found.id)?;
        tx.commit().context("failed to commit book deletion")?;

        info!(id = found.id, title = %found.title, "deleted book");
        Ok(())
    }

    /// Lend a book out. A book can only be on one loan at a time, and the due
    /// date cannot precede the issue date.
    pub fn issue_book(
        &mut self,
        book: &BookRef,
        borrower: &str,
        issue_date: NaiveDate,
        due_date: NaiveDate,
    ) -> Result<i64> {
        let borrower = borrower.trim();
        if borrower.is_empty() {
            return Err(CatalogError::validation("issued_to", "borrower name is required"));
        }
        if due_date < issue_date {
            return Err(CatalogError::validation(
                "due_date",
                format!("{due_date} is before the issue date {issue_date}"),
            ));
        }

        let tx = self.begin()?;
        let found = db::resolve_book(&tx, book)?;
        if db::count_issues_for_book(&tx, found.id)? > 0 {
            warn!(id = found.id, title = %found.title, "book already issued");
            return Err(CatalogError::AlreadyIssued(found.title));
        }
        let issue_id = db::insert_issue(&tx, found.id, borrower, issue_date, due_date)?;
        tx.commit().context("failed to commit issue record")?;

        info!(issue_id, book_id = found.id, borrower, %due_date, "issued book");
        Ok(issue_id)
    }

    /// Close the loan on a book and return how many issue records were
    /// removed.
    pub fn return_book(&mut self, book: &BookRef) -> Result<usize> {
        let tx = self.begin()?;
        let found = db::resolve_book(&tx, book)?;
        let removed = db::delete_issues_for_book(&tx, found.id)?;
        if removed == 0 {
            return Err(CatalogError::NotIssued(found.title));
        }
        tx.commit().context("failed to commit return")?;

        info!(book_id = found.id, removed, "returned book");
        Ok(removed)
    }

    /// Live loans, soonest due first.
    pub fn list_issues(&mut self) -> Result<Vec<IssueRecord>> {
        let tx = self.begin()?;
        let issues = db::fetch_issues(&tx)?;
        tx.commit().context("failed to commit issue listing")?;
        Ok(issues)
    }

    pub fn statistics(&mut self) -> Result<Statistics> {
        let tx = self.begin()?;
        let stats = db::fetch_statistics(&tx)?;
        tx.commit().context("failed to commit statistics")?;
        Ok(stats)
    }

    /// All books as CSV, header first.
    pub fn export_books(&mut self) -> Result<String> {
        let books = self.books_for_export()?;
        db::write_books_csv(&books)
    }

    /// Write the CSV export to `path`, returning the number of books written.
    pub fn export_to_file(&mut self, path: &Path) -> Result<usize> {
        let books = self.books_for_export()?;
        let csv = db::write_books_csv(&books)?;
        fs::write(path, &csv).map_err(|source| CatalogError::Io {
            action: format!("failed to write {}", path.display()),
            source,
        })?;
        info!(path = %path.display(), count = books.len(), "exported books");
        Ok(books.len())
    }

    fn books_for_export(&mut self) -> Result<Vec<Book>> {
        let tx = self.begin()?;
        let books = db::fetch_books(&tx, None, false)?;
        tx.commit().context("failed to commit export")?;
        Ok(books)
    }

    /// Append every row of a CSV payload as a new book. Either all rows land
    /// or none do.
    pub fn import_books<R: Read>(&mut self, reader: R) -> Result<usize> {
        let books = db::read_import_rows(reader).inspect_err(|err| {
            warn!(error = %err, "rejected import file");
        })?;

        let tx = self.begin()?;
        for book in &books {
            db::insert_book(&tx, book)?;
        }
        tx.commit().context("failed to commit import")?;

        info!(count = books.len(), "imported books");
        Ok(books.len())
    }

    pub fn import_from_file(&mut self, path: &Path) -> Result<usize> {
        let file = fs::File::open(path).map_err(|source| CatalogError::Io {
            action: format!("failed to open {}", path.display()),
            source,
        })?;
        self.import_books(file)
    }

    /// Check a login against the `users` table.
    pub fn authenticate(&mut self, username: &str, password: &str) -> Result<bool> {
        let tx = self.begin()?;
        let ok = db::verify_credentials(&tx, username, password)?;
        tx.commit().context("failed to commit login check")?;
        if !ok {
            warn!(username, "login rejected");
        }
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::db::open_in_memory;
    use crate::models::ReadStatus;

    /// Remembers what it was asked to store and remove.
    #[derive(Clone, Default)]
    struct RecordingCovers {
        stored: Rc<RefCell<Vec<(String, usize)>>>,
        removed: Rc<RefCell<Vec<String>>>,
    }

    impl CoverStore for RecordingCovers {
        fn store(&self, name: &str, bytes: &[u8]) -> Result<String> {
            self.stored.borrow_mut().push((name.to_string(), bytes.len()));
            Ok(format!("memory://{name}"))
        }

        fn remove(&self, reference: &str) -> Result<()> {
            self.removed.borrow_mut().push(reference.to_string());
            Ok(())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn catalog() -> Catalog {
        Catalog::new(open_in_memory().unwrap(), RecordingCovers::default())
    }

    #[test]
    fn cover_upload_reference_is_recorded() {
        let covers = RecordingCovers::default();
        let mut catalog = Catalog::new(open_in_memory().unwrap(), covers.clone());

        let id = catalog
            .add_book(
                NewBook::new("Dune", "Frank Herbert", "SciFi", 1965),
                Some(CoverUpload::new("dune.png", vec![1, 2, 3])),
            )
            .unwrap();

        let book = catalog.get_book(&BookRef::Id(id)).unwrap();
        assert_eq!(book.cover_path.as_deref(), Some("memory://dune.png"));
        assert_eq!(covers.stored.borrow().as_slice(), &[("dune.png".to_string(), 3)]);
    }

    #[test]
    fn invalid_book_never_reaches_the_cover_store() {
        let covers = RecordingCovers::default();
        let mut catalog = Catalog::new(open_in_memory().unwrap(), covers.clone());

        let result = catalog.add_book(
            NewBook::new("", "Frank Herbert", "SciFi", 1965),
            Some(CoverUpload::new("dune.png", vec![1])),
        );
        assert!(matches!(result, Err(CatalogError::Validation { field: "title", .. })));
        assert!(covers.stored.borrow().is_empty());
    }

    #[test]
    fn double_issue_is_rejected() {
        let mut catalog = catalog();
        let id = catalog
            .add_book(NewBook::new("Dune", "Frank Herbert", "SciFi", 1965), None)
            .unwrap();
        let book = BookRef::Id(id);

        catalog
            .issue_book(&book, "Alice", date(2024, 1, 1), date(2024, 1, 15))
            .unwrap();
        let err = catalog
            .issue_book(&book, "Bob", date(2024, 1, 2), date(2024, 1, 16))
            .unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyIssued(title) if title == "Dune"));
        assert_eq!(catalog.list_issues().unwrap().len(), 1);
    }

    #[test]
    fn issue_validates_borrower_and_dates() {
        let mut catalog = catalog();
        let id = catalog
            .add_book(NewBook::new("Dune", "Frank Herbert", "SciFi", 1965), None)
            .unwrap();
        let book = BookRef::Id(id);

        assert!(matches!(
            catalog.issue_book(&book, "  ", date(2024, 1, 1), date(2024, 1, 15)),
            Err(CatalogError::Validation { field: "issued_to", .. })
        ));
        assert!(matches!(
            catalog.issue_book(&book, "Alice", date(2024, 1, 15), date(2024, 1, 1)),
            Err(CatalogError::Validation { field: "due_date", .. })
        ));
        assert!(matches!(
            catalog.issue_book(&BookRef::from("Missing"), "Alice", date(2024, 1, 1), date(2024, 1, 1)),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn returning_a_book_on_the_shelf_is_an_error() {
        let mut catalog = catalog();
        catalog
            .add_book(NewBook::new("Dune", "Frank Herbert", "SciFi", 1965), None)
            .unwrap();
        assert!(matches!(
            catalog.return_book(&BookRef::from("Dune")),
            Err(CatalogError::NotIssued(_))
        ));
    }

    #[test]
    fn failed_import_leaves_the_catalog_untouched() {
        let mut catalog = catalog();
        let payload = "title,author,year,genre,read_status\n\
                       Dune,Frank Herbert,1965,SciFi,Read\n\
                       Emma,Jane Austen,1815,Romance,Skimmed\n";

        assert!(catalog.import_books(payload.as_bytes()).is_err());
        assert!(catalog.list_books(None, false).unwrap().is_empty());
    }

    #[test]
    fn import_keeps_status_and_rating() {
        let mut catalog = catalog();
        let payload = "title,author,year,genre,read_status,rating\nDune,Frank Herbert,1965,SciFi,read,5\n";
        assert_eq!(catalog.import_books(payload.as_bytes()).unwrap(), 1);

        let books = catalog.list_books(None, false).unwrap();
        assert_eq!(books[0].read_status, ReadStatus::Read);
        assert_eq!(books[0].rating, 5);
    }

    #[test]
    fn cover_is_removed_when_the_insert_fails() {
        let covers = RecordingCovers::default();
        let mut catalog = Catalog::new(open_in_memory().unwrap(), covers.clone());
        catalog
            .conn
            .execute_batch("DROP TABLE issued_books; DROP TABLE books;")
            .unwrap();

        let result = catalog.add_book(
            NewBook::new("Dune", "Frank Herbert", "SciFi", 1965),
            Some(CoverUpload::new("dune.png", vec![1, 2])),
        );
        assert!(matches!(result, Err(CatalogError::Storage { .. })));
        assert_eq!(covers.removed.borrow().as_slice(), &["memory://dune.png".to_string()]);
    }

    #[test]
    fn export_counts_books_not_lines() {
        let mut catalog = catalog();
        let payload = "title,author,year,genre\n\"Line1\nLine2\",Someone,2001,Poetry\n";
        assert_eq!(catalog.import_books(payload.as_bytes()).unwrap(), 1);

        let path = std::env::temp_dir().join(format!(
            "book-haven-export-count-{}.csv",
            std::process::id()
        ));
        assert_eq!(catalog.export_to_file(&path).unwrap(), 1);
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"Line1\nLine2\""));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn authenticate_checks_the_users_table() {
        let mut catalog = catalog();
        db::create_user(&catalog.conn, "librarian", "s3cret").unwrap();
        assert!(catalog.authenticate("librarian", "s3cret").unwrap());
        assert!(!catalog.authenticate("librarian", "nope").unwrap());
    }
}
