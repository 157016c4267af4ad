//! Ratatui front end: a login screen, the book list with its dialogs, and the
//! statistics dashboard.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::{App, Session};
pub use terminal::run_app;
