//! CSV export and import of the `books` table.
//!
//! The export header is the schema column list. Imports accept any column
//! order, ignore `id` (rows are always appended with fresh ids), and require
//! `title`, `author`, `year` and `genre`.

use std::io::{self, Read};

use serde::Deserialize;

use crate::error::{CatalogError, Result};
use crate::models::{Book, NewBook, ReadStatus, DEFAULT_RATING};

/// Columns an import file must carry.
const REQUIRED_COLUMNS: [&str; 4] = ["title", "author", "year", "genre"];

/// One row of an import file. Everything is read as text so a bad value is
/// reported as a validation error on that row instead of a parse failure.
#[derive(Debug, Deserialize)]
struct ImportRow {
    title: Option<String>,
    author: Option<String>,
    year: Option<String>,
    genre: Option<String>,
    read_status: Option<String>,
    cover_path: Option<String>,
    rating: Option<String>,
}

/// Serialize books to CSV with a header row.
pub fn write_books_csv(books: &[Book]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for book in books {
        writer
            .serialize(book)
            .map_err(|err| export_error(err.into()))?;
    }
    // `serialize` only emits the header alongside the first record.
    if books.is_empty() {
        writer
            .write_record([
                "id",
                "title",
                "author",
                "year",
                "genre",
                "read_status",
                "cover_path",
                "rating",
            ])
            .map_err(|err| export_error(err.into()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| export_error(err.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|err| export_error(io::Error::new(io::ErrorKind::InvalidData, err)))
}

fn export_error(source: io::Error) -> CatalogError {
    CatalogError::Io {
        action: "failed to write CSV export".to_string(),
        source,
    }
}

/// Parse and validate every row of an import payload. Nothing is returned
/// unless the whole file is valid. Row numbers in errors count the header as
/// row 1, matching what a spreadsheet shows.
pub fn read_import_rows<R: Read>(reader: R) -> Result<Vec<NewBook>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|err| CatalogError::ImportFormat {
            row: 1,
            message: err.to_string(),
        })?
        .clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|column| !headers.iter().any(|header| header == *column))
        .collect();
    if !missing.is_empty() {
        return Err(CatalogError::ImportFormat {
            row: 1,
            message: format!("missing column(s): {}", missing.join(", ")),
        });
    }

    let mut books = Vec::new();
    for (idx, result) in rdr.deserialize::<ImportRow>().enumerate() {
        let row = idx + 2;
        let record = result.map_err(|err| CatalogError::ImportFormat {
            row,
            message: err.to_string(),
        })?;
        let book = new_book_from_row(record)
            .and_then(|book| book.validated())
            .map_err(|err| match err {
                CatalogError::Validation { field, message } => CatalogError::Validation {
                    field,
                    message: format!("{message} (row {row})"),
                },
                other => other,
            })?;
        books.push(book);
    }

    Ok(books)
}

fn new_book_from_row(row: ImportRow) -> Result<NewBook> {
    let year = parse_number("year", row.year.as_deref())?
        .ok_or_else(|| CatalogError::validation("year", "is required"))?;
    let rating = parse_number("rating", row.rating.as_deref())?.unwrap_or(DEFAULT_RATING);
    let read_status = match row.read_status.as_deref() {
        Some(raw) => raw.parse()?,
        None => ReadStatus::default(),
    };

    Ok(NewBook {
        title: row.title.unwrap_or_default(),
        author: row.author.unwrap_or_default(),
        genre: row.genre.unwrap_or_default(),
        year,
        read_status,
        cover_path: row.cover_path,
        rating,
    })
}

/// Integers may come back from spreadsheets as `1965.0`; accept those as long
/// as there is no fractional part.
fn parse_number(field: &'static str, raw: Option<&str>) -> Result<Option<i64>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(Some(value));
    }
    match raw.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.is_finite() => Ok(Some(value as i64)),
        _ => Err(CatalogError::validation(
            field,
            format!("\"{raw}\" is not a whole number"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn book(id: i64, title: &str) -> Book {
        Book {
            id,
            title: title.to_string(),
            author: "Author, Jr.".to_string(),
            year: 1999,
            genre: "Essay".to_string(),
            read_status: ReadStatus::Reading,
            cover_path: None,
            rating: 4,
        }
    }

    #[test]
    fn export_uses_schema_column_order_and_quotes_commas() {
        let csv = write_books_csv(&[book(7, "Hello")]).unwrap();
        assert_eq!(
            csv,
            "id,title,author,year,genre,read_status,cover_path,rating\n\
             7,Hello,\"Author, Jr.\",1999,Essay,Reading,,4\n"
        );
    }

    #[test]
    fn empty_export_still_has_a_header() {
        let csv = write_books_csv(&[]).unwrap();
        assert_eq!(csv, "id,title,author,year,genre,read_status,cover_path,rating\n");
    }

    #[test]
    fn import_applies_defaults_and_ignores_ids() {
        let payload = "genre,title,author,year,id\nSciFi,Dune,Frank Herbert,1965.0,42\n";
        let books = read_import_rows(payload.as_bytes()).unwrap();
        assert_eq!(books, vec![NewBook::new("Dune", "Frank Herbert", "SciFi", 1965)]);
    }

    #[test]
    fn missing_required_columns_are_a_format_error() {
        let payload = "title,author\nDune,Frank Herbert\n";
        let err = read_import_rows(payload.as_bytes()).unwrap_err();
        match err {
            CatalogError::ImportFormat { row, message } => {
                assert_eq!(row, 1);
                assert_eq!(message, "missing column(s): year, genre");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_row_is_reported_with_its_row_number() {
        let payload = "title,author,year,genre,rating\n\
                       Dune,Frank Herbert,1965,SciFi,5\n\
                       Emma,Jane Austen,1815,Romance,9\n";
        let err = read_import_rows(payload.as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "rating: must be between 1 and 5, got 9 (row 3)");
    }

    #[test]
    fn ragged_rows_are_a_format_error() {
        let payload = "title,author,year,genre\nDune,Frank Herbert\n";
        assert!(matches!(
            read_import_rows(payload.as_bytes()),
            Err(CatalogError::ImportFormat { row: 2, .. })
        ));
    }
}
