use std::collections::HashMap;

use rusqlite::Connection;

use crate::error::{Result, StorageContext};
use crate::models::{ReadStatus, Statistics};

/// How many genres the statistics screen charts.
pub const TOP_GENRE_LIMIT: i64 = 5;

/// Compute the aggregate snapshot. Run it inside a transaction so the counts
/// agree with each other.
pub fn fetch_statistics(conn: &Connection) -> Result<Statistics> {
    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
        .context("failed to count books")?;

    // Distinct books, so `available` can never go negative.
    let issued: i64 = conn
        .query_row(
            "SELECT COUNT(DISTINCT book_id) FROM issued_books",
            [],
            |row| row.get(0),
        )
        .context("failed to count issued books")?;

    let mut stmt = conn
        .prepare("SELECT read_status, COUNT(*) FROM books GROUP BY read_status")
        .context("failed to prepare status query")?;
    let status_counts = stmt
        .query_map([], |row| Ok((row.get::<_, ReadStatus>(0)?, row.get::<_, i64>(1)?)))
        .context("failed to count statuses")?
        .collect::<rusqlite::Result<HashMap<_, _>>>()
        .context("failed to collect status counts")?;
    let by_status = ReadStatus::ALL
        .into_iter()
        .map(|status| (status, status_counts.get(&status).copied().unwrap_or(0)))
        .collect();

    let mut stmt = conn
        .prepare(
            "SELECT genre, COUNT(*) AS count
             FROM books
             GROUP BY genre
             ORDER BY count DESC, MIN(id)
             LIMIT ?1",
        )
        .context("failed to prepare genre query")?;
    let top_genres = stmt
        .query_map([TOP_GENRE_LIMIT], |row| Ok((row.get(0)?, row.get(1)?)))
        .context("failed to rank genres")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to collect genres")?;

    let mut stmt = conn
        .prepare("SELECT rating FROM books ORDER BY id")
        .context("failed to prepare rating query")?;
    let ratings = stmt
        .query_map([], |row| row.get(0))
        .context("failed to load ratings")?
        .collect::<rusqlite::Result<Vec<i64>>>()
        .context("failed to collect ratings")?;

    Ok(Statistics {
        total,
        issued,
        available: total - issued,
        by_status,
        top_genres,
        ratings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_book, open_in_memory};
    use crate::models::NewBook;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_catalog_reports_zeroes_for_every_status() {
        let conn = open_in_memory().unwrap();
        let stats = fetch_statistics(&conn).unwrap();
        assert_eq!(
            stats,
            Statistics {
                total: 0,
                issued: 0,
                available: 0,
                by_status: vec![
                    (ReadStatus::Unread, 0),
                    (ReadStatus::Reading, 0),
                    (ReadStatus::Read, 0),
                ],
                top_genres: vec![],
                ratings: vec![],
            }
        );
    }

    #[test]
    fn genre_ties_keep_insertion_order_and_stop_at_five() {
        let conn = open_in_memory().unwrap();
        for genre in ["Poetry", "Drama", "Drama", "Horror", "Essay", "Satire", "Myth", "Poetry"] {
            insert_book(&conn, &NewBook::new("t", "a", genre, 2000)).unwrap();
        }

        let stats = fetch_statistics(&conn).unwrap();
        assert_eq!(
            stats.top_genres,
            vec![
                ("Poetry".to_string(), 2),
                ("Drama".to_string(), 2),
                ("Horror".to_string(), 1),
                ("Essay".to_string(), 1),
                ("Satire".to_string(), 1),
            ]
        );
    }
}
