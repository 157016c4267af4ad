//! Persistence module split across logical submodules. Every function takes a
//! plain `&Connection` so it runs equally well on a connection or inside a
//! `Transaction` opened by the catalog service.

mod books;
mod connection;
mod issues;
mod stats;
mod transfer;
mod users;

pub use books::{delete_book, fetch_book, fetch_books, insert_book, resolve_book, search_books};
pub use connection::{ensure_schema, open_in_memory, open_store, seed, DEFAULT_ADMIN_USER};
pub use issues::{count_issues_for_book, delete_issues_for_book, fetch_issues, insert_issue};
pub use stats::{fetch_statistics, TOP_GENRE_LIMIT};
pub use transfer::{read_import_rows, write_books_csv};
pub use users::{create_user, hash_password, user_exists, verify_credentials};
