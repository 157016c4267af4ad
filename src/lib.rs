//! Book Haven: a personal library catalog kept in SQLite, with loan tracking,
//! CSV import/export, reading statistics and a terminal front end.
//!
//! [`Catalog`] is the service layer every front end goes through; the `db`
//! module holds the SQL it runs.
pub mod catalog;
pub mod config;
pub mod covers;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod ui;

pub use catalog::Catalog;
pub use config::Config;
pub use covers::{CoverStore, CoverUpload, FsCoverStore};
pub use error::{CatalogError, Result};
pub use models::{Book, BookRef, IssueRecord, NewBook, ReadStatus, Statistics};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
