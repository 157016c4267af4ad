use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{CatalogError, Result, StorageContext};
use crate::models::{Book, BookRef, NewBook};

const BOOK_COLUMNS: &str = "id, title, author, year, genre, read_status, cover_path, rating";

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        year: row.get(3)?,
        genre: row.get(4)?,
        read_status: row.get(5)?,
        cover_path: row.get(6)?,
        rating: row.get(7)?,
    })
}

/// Turn user text into a case-folded `LIKE` pattern that matches it literally
/// anywhere in a `fold(column)`. `\` is the escape character in the queries
/// below.
fn like_pattern(filter: &str) -> String {
    let mut pattern = String::with_capacity(filter.len() + 2);
    pattern.push('%');
    for ch in filter.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Retrieve books in insertion order, optionally narrowed by a substring of
/// title, author or genre, and optionally hiding anything on loan. Matching
/// ignores case for any script, not just ASCII.
pub fn fetch_books(
    conn: &Connection,
    filter: Option<&str>,
    available_only: bool,
) -> Result<Vec<Book>> {
    let filter = filter.map(str::trim).filter(|f| !f.is_empty());

    let mut sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE 1 = 1");
    if filter.is_some() {
        sql.push_str(
            " AND (fold(title) LIKE ?1 ESCAPE '\\'
                OR fold(author) LIKE ?1 ESCAPE '\\'
                OR fold(genre) LIKE ?1 ESCAPE '\\')",
        );
    }
    if available_only {
        sql.push_str(" AND NOT EXISTS (SELECT 1 FROM issued_books ib WHERE ib.book_id = books.id)");
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = conn.prepare(&sql).context("failed to prepare book query")?;
    let rows = match filter {
        Some(text) => stmt.query_map([like_pattern(text)], book_from_row),
        None => stmt.query_map([], book_from_row),
    }
    .context("failed to load books")?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to collect books")
}

/// Title/author search backing the quick-search box.
pub fn search_books(conn: &Connection, query: &str) -> Result<Vec<Book>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM books
             WHERE fold(title) LIKE ?1 ESCAPE '\\' OR fold(author) LIKE ?1 ESCAPE '\\'
             ORDER BY id"
        ))
        .context("failed to prepare search query")?;

    let books = stmt
        .query_map([like_pattern(query.trim())], book_from_row)
        .context("failed to run search")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to collect search results")?;

    Ok(books)
}

pub fn fetch_book(conn: &Connection, id: i64) -> Result<Option<Book>> {
    conn.query_row(
        &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
        [id],
        book_from_row,
    )
    .optional()
    .context("failed to load book")
}

/// Resolve a `BookRef` to a stored book. Titles must match exactly and
/// identify a single row; two books sharing a title need an id instead.
pub fn resolve_book(conn: &Connection, book: &BookRef) -> Result<Book> {
    match book {
        BookRef::Id(id) => {
            fetch_book(conn, *id)?.ok_or_else(|| CatalogError::NotFound(book.to_string()))
        }
        BookRef::Title(title) => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {BOOK_COLUMNS} FROM books WHERE title = ?1 ORDER BY id LIMIT 2"
                ))
                .context("failed to prepare title lookup")?;
            let mut matches = stmt
                .query_map([title.trim()], book_from_row)
                .context("failed to look up title")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("failed to collect title matches")?;

            match matches.len() {
                0 => Err(CatalogError::NotFound(book.to_string())),
                1 => Ok(matches.remove(0)),
                _ => Err(CatalogError::validation(
                    "title",
                    format!("\"{title}\" matches more than one book; use its id"),
                )),
            }
        }
    }
}

/// Insert an already validated book and return its new id.
pub fn insert_book(conn: &Connection, book: &NewBook) -> Result<i64> {
    conn.execute(
        "INSERT INTO books (title, author, year, genre, read_status, cover_path, rating)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            book.title,
            book.author,
            book.year,
            book.genre,
            book.read_status,
            book.cover_path,
            book.rating
        ],
    )
    .context("failed to insert book")?;

    Ok(conn.last_insert_rowid())
}

/// Permanently delete a book. The schema cascades to `issued_books`, so
/// outstanding loans go with it.
pub fn delete_book(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM books WHERE id = ?1", [id])
        .context("failed to delete book")?;

    if deleted == 0 {
        Err(CatalogError::NotFound(BookRef::Id(id).to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn insert(conn: &Connection, title: &str, author: &str, genre: &str) -> i64 {
        insert_book(conn, &NewBook::new(title, author, genre, 1990)).unwrap()
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("c:\\"), "%c:\\\\%");
        assert_eq!(like_pattern("ÉMILE"), "%émile%");
    }

    #[test]
    fn filter_folds_non_ascii_case() {
        let conn = open_in_memory().unwrap();
        insert(&conn, "Émile", "Jean-Jacques Rousseau", "Philosophie");
        insert(&conn, "Война и мир", "Лев Толстой", "Роман");
        insert(&conn, "Dune", "Frank Herbert", "SciFi");

        let titles = |filter: &str| -> Vec<String> {
            fetch_books(&conn, Some(filter), false)
                .unwrap()
                .into_iter()
                .map(|b| b.title)
                .collect()
        };
        assert_eq!(titles("émile"), vec!["Émile"]);
        assert_eq!(titles("ÉMILE"), vec!["Émile"]);
        assert_eq!(titles("РОМАН"), vec!["Война и мир"]);

        let found: Vec<String> = search_books(&conn, "ТОЛСТОЙ")
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(found, vec!["Война и мир"]);
    }

    #[test]
    fn filter_matches_title_author_or_genre_ignoring_case() {
        let conn = open_in_memory().unwrap();
        insert(&conn, "Dune", "Frank Herbert", "SciFi");
        insert(&conn, "Emma", "Jane Austen", "Romance");
        insert(&conn, "Neuromancer", "William Gibson", "Cyberpunk");

        let titles = |filter: &str| -> Vec<String> {
            fetch_books(&conn, Some(filter), false)
                .unwrap()
                .into_iter()
                .map(|b| b.title)
                .collect()
        };

        assert_eq!(titles("dune"), vec!["Dune"]);
        assert_eq!(titles("AUSTEN"), vec!["Emma"]);
        assert_eq!(titles("punk"), vec!["Neuromancer"]);
        assert_eq!(titles("an"), vec!["Dune", "Emma", "Neuromancer"]);
        assert!(titles("%").is_empty());
    }

    #[test]
    fn blank_filter_returns_everything_in_insertion_order() {
        let conn = open_in_memory().unwrap();
        let first = insert(&conn, "B", "x", "y");
        let second = insert(&conn, "A", "x", "y");

        let ids: Vec<i64> = fetch_books(&conn, Some("   "), false)
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn search_ignores_genre() {
        let conn = open_in_memory().unwrap();
        insert(&conn, "Dune", "Frank Herbert", "SciFi");
        assert!(search_books(&conn, "scifi").unwrap().is_empty());
        assert_eq!(search_books(&conn, "herb").unwrap().len(), 1);
    }

    #[test]
    fn resolve_by_title_requires_a_unique_match() {
        let conn = open_in_memory().unwrap();
        let id = insert(&conn, "Dune", "Frank Herbert", "SciFi");
        insert(&conn, "Emma", "Jane Austen", "Romance");
        insert(&conn, "Emma", "Someone Else", "Romance");

        assert_eq!(resolve_book(&conn, &BookRef::from("Dune")).unwrap().id, id);
        assert!(matches!(
            resolve_book(&conn, &BookRef::from("Emma")),
            Err(CatalogError::Validation { field: "title", .. })
        ));
        assert!(matches!(
            resolve_book(&conn, &BookRef::from("Missing")),
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            resolve_book(&conn, &BookRef::Id(999)),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn delete_reports_missing_rows() {
        let conn = open_in_memory().unwrap();
        let id = insert(&conn, "Dune", "Frank Herbert", "SciFi");
        delete_book(&conn, id).unwrap();
        assert!(matches!(delete_book(&conn, id), Err(CatalogError::NotFound(_))));
    }
}
