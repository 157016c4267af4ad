use std::fs;
use std::path::Path;

use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::error::{CatalogError, Result, StorageContext};
use crate::models::ReadStatus;

use super::users::{create_user, user_exists};

/// Username of the account created on first run.
pub const DEFAULT_ADMIN_USER: &str = "admin";

/// Name of the case-folding SQL function installed on every connection.
const FOLD_FUNCTION: &str = "fold";

/// Books inserted when the catalog is empty: title, author, year, genre,
/// status, cover, rating.
const SAMPLE_BOOKS: &[(&str, &str, i64, &str, ReadStatus, &str, i64)] = &[
    (
        "The Great Gatsby",
        "F. Scott Fitzgerald",
        1925,
        "Fiction",
        ReadStatus::Read,
        "gatsby.jpeg",
        5,
    ),
    (
        "To Kill a Mockingbird",
        "Harper Lee",
        1960,
        "Classic",
        ReadStatus::Read,
        "mocking-bird.jpeg",
        5,
    ),
    (
        "1984",
        "George Orwell",
        1949,
        "Dystopian",
        ReadStatus::Unread,
        "1984.jpeg",
        4,
    ),
    (
        "Pride and Prejudice",
        "Jane Austen",
        1813,
        "Romance",
        ReadStatus::Read,
        "prideandprejudice.jpeg",
        5,
    ),
    (
        "The Hobbit",
        "J.R.R. Tolkien",
        1937,
        "Fantasy",
        ReadStatus::Unread,
        "hobbit.jpeg",
        4,
    ),
];

/// Open (or create) the on-disk store, make sure the schema exists, and seed
/// the sample books plus the admin account on first run. Any failure here is
/// fatal for the caller.
pub fn open_store(db_path: &Path, admin_password: &str) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).map_err(|source| CatalogError::Io {
            action: format!("failed to create data directory {}", parent.display()),
            source,
        })?;
    }

    let mut conn = Connection::open(db_path).context("failed to open SQLite database")?;
    configure(&conn)?;
    ensure_schema(&conn)?;
    seed(&mut conn, admin_password)?;

    info!(path = %db_path.display(), "library store ready");
    Ok(conn)
}

/// Schema-only store that lives for the lifetime of the connection. Nothing is
/// seeded so callers start from an empty catalog.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    configure(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// `PRAGMA foreign_keys` is per connection, and the issue-record cascade
/// depends on it.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;
    register_fold(conn)
}

/// `fold(text)`: Unicode lowercase. SQLite's own `LIKE` and `lower()` only
/// fold ASCII, so the search filters compare folded text instead.
fn register_fold(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        FOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text = ctx.get::<Option<String>>(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )
    .context("failed to register fold function")
}

/// Create the three tables if they are missing. Safe to run on every start.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL
        )",
        [],
    )
    .context("failed to create users table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            year INTEGER NOT NULL,
            genre TEXT NOT NULL,
            read_status TEXT NOT NULL DEFAULT 'Unread',
            cover_path TEXT,
            rating INTEGER NOT NULL DEFAULT 3 CHECK (rating BETWEEN 1 AND 5)
        )",
        [],
    )
    .context("failed to create books table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS issued_books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            issued_to TEXT NOT NULL,
            issue_date TEXT NOT NULL,
            due_date TEXT NOT NULL,
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create issued_books table")?;

    // One live loan per book.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS issued_books_book_id
            ON issued_books(book_id)",
        [],
    )
    .context("failed to create issued_books index")?;

    Ok(())
}

/// Insert the sample books when the catalog is empty and the admin account
/// when it does not exist yet. Both checks run inside one transaction so a
/// second call is a no-op.
pub fn seed(conn: &mut Connection, admin_password: &str) -> Result<()> {
    let tx = conn
        .transaction()
        .context("failed to begin seed transaction")?;

    let book_count: i64 = tx
        .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
        .context("failed to count books")?;

    if book_count == 0 {
        let mut stmt = tx
            .prepare(
                "INSERT INTO books (title, author, year, genre, read_status, cover_path, rating)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .context("failed to prepare sample book insert")?;
        for (title, author, year, genre, status, cover, rating) in SAMPLE_BOOKS {
            stmt.execute(params![title, author, year, genre, status, cover, rating])
                .context("failed to insert sample book")?;
        }
        info!(count = SAMPLE_BOOKS.len(), "seeded sample books");
    } else {
        debug!(count = book_count, "catalog already populated, skipping sample books");
    }

    if !user_exists(&tx, DEFAULT_ADMIN_USER)? {
        create_user(&tx, DEFAULT_ADMIN_USER, admin_password)?;
        info!(username = DEFAULT_ADMIN_USER, "created default account");
    }

    tx.commit().context("failed to commit seed data")?;
    Ok(())
}
