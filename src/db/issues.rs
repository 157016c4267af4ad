use chrono::NaiveDate;
use rusqlite::{params, Connection};

use crate::error::{Result, StorageContext};
use crate::models::IssueRecord;

/// Record a loan for `book_id` and return the new issue id. Availability is
/// checked by the caller; the unique index on `book_id` backs it up.
pub fn insert_issue(
    conn: &Connection,
    book_id: i64,
    issued_to: &str,
    issue_date: NaiveDate,
    due_date: NaiveDate,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO issued_books (book_id, issued_to, issue_date, due_date)
         VALUES (?1, ?2, ?3, ?4)",
        params![book_id, issued_to, issue_date, due_date],
    )
    .context("failed to insert issue record")?;

    Ok(conn.last_insert_rowid())
}

/// Number of live issue records pointing at a book.
pub fn count_issues_for_book(conn: &Connection, book_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM issued_books WHERE book_id = ?1",
        [book_id],
        |row| row.get(0),
    )
    .context("failed to count issue records")
}

/// Remove every live issue record of a book, returning how many went away.
pub fn delete_issues_for_book(conn: &Connection, book_id: i64) -> Result<usize> {
    conn.execute("DELETE FROM issued_books WHERE book_id = ?1", [book_id])
        .context("failed to delete issue records")
}

/// Every live loan with its book title, soonest due first.
pub fn fetch_issues(conn: &Connection) -> Result<Vec<IssueRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT ib.id, ib.book_id, b.title, ib.issued_to, ib.issue_date, ib.due_date
             FROM issued_books ib
             INNER JOIN books b ON b.id = ib.book_id
             ORDER BY ib.due_date, ib.id",
        )
        .context("failed to prepare issue query")?;

    let issues = stmt
        .query_map([], |row| {
            Ok(IssueRecord {
                id: row.get(0)?,
                book_id: row.get(1)?,
                book_title: row.get(2)?,
                issued_to: row.get(3)?,
                issue_date: row.get(4)?,
                due_date: row.get(5)?,
            })
        })
        .context("failed to load issue records")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to collect issue records")?;

    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_book, open_in_memory};
    use crate::models::NewBook;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn dates_round_trip_as_iso_text() {
        let conn = open_in_memory().unwrap();
        let book_id = insert_book(&conn, &NewBook::new("Dune", "Frank Herbert", "SciFi", 1965)).unwrap();
        insert_issue(&conn, book_id, "Alice", date(2024, 1, 1), date(2024, 1, 15)).unwrap();

        let stored: String = conn
            .query_row("SELECT due_date FROM issued_books", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, "2024-01-15");

        let issues = fetch_issues(&conn).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].book_title, "Dune");
        assert_eq!(issues[0].issue_date, date(2024, 1, 1));
    }

    #[test]
    fn unique_index_rejects_a_second_loan() {
        let conn = open_in_memory().unwrap();
        let book_id = insert_book(&conn, &NewBook::new("Dune", "Frank Herbert", "SciFi", 1965)).unwrap();
        insert_issue(&conn, book_id, "Alice", date(2024, 1, 1), date(2024, 1, 15)).unwrap();
        assert!(insert_issue(&conn, book_id, "Bob", date(2024, 1, 2), date(2024, 1, 16)).is_err());
        assert_eq!(count_issues_for_book(&conn, book_id).unwrap(), 1);
    }

    #[test]
    fn issues_are_ordered_by_due_date() {
        let conn = open_in_memory().unwrap();
        let first = insert_book(&conn, &NewBook::new("A", "x", "y", 2000)).unwrap();
        let second = insert_book(&conn, &NewBook::new("B", "x", "y", 2000)).unwrap();
        insert_issue(&conn, first, "Alice", date(2024, 1, 1), date(2024, 3, 1)).unwrap();
        insert_issue(&conn, second, "Bob", date(2024, 1, 1), date(2024, 2, 1)).unwrap();

        let titles: Vec<String> = fetch_issues(&conn)
            .unwrap()
            .into_iter()
            .map(|issue| issue.book_title)
            .collect();
        assert_eq!(titles, vec!["B", "A"]);

        assert_eq!(delete_issues_for_book(&conn, first).unwrap(), 1);
        assert_eq!(delete_issues_for_book(&conn, first).unwrap(), 0);
    }
}
