use std::cmp::min;
use std::collections::HashMap;

use crate::models::{Book, IssueRecord};

/// The main catalog list plus the filter state that produced it.
pub(crate) struct BookScreen {
    pub(crate) books: Vec<Book>,
    /// Live loans keyed by book id, for the "issued to" column.
    pub(crate) issues: HashMap<i64, IssueRecord>,
    pub(crate) filter: Option<String>,
    pub(crate) available_only: bool,
    pub(crate) selected: usize,
}

impl BookScreen {
    pub(crate) fn new() -> Self {
        Self {
            books: Vec::new(),
            issues: HashMap::new(),
            filter: None,
            available_only: false,
            selected: 0,
        }
    }

    /// Swap in freshly loaded rows, keeping the cursor on `focus_id` when it
    /// is still listed.
    pub(crate) fn replace(&mut self, books: Vec<Book>, issues: Vec<IssueRecord>, focus_id: Option<i64>) {
        let previous_id = focus_id.or_else(|| self.current_book().map(|book| book.id));
        self.books = books;
        self.issues = issues
            .into_iter()
            .map(|issue| (issue.book_id, issue))
            .collect();

        if let Some(id) = previous_id {
            if let Some(idx) = self.books.iter().position(|book| book.id == id) {
                self.selected = idx;
                return;
            }
        }
        self.ensure_in_bounds();
    }

    pub(crate) fn filter_text(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub(crate) fn current_book(&self) -> Option<&Book> {
        self.books.get(self.selected)
    }

    pub(crate) fn issue_for(&self, book_id: i64) -> Option<&IssueRecord> {
        self.issues.get(&book_id)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.books.is_empty() {
            self.selected = 0;
            return;
        }
        let max = self.books.len() - 1;
        let next = self.selected as isize + offset;
        self.selected = next.clamp(0, max as isize) as usize;
    }

    fn ensure_in_bounds(&mut self) {
        self.selected = if self.books.is_empty() {
            0
        } else {
            min(self.selected, self.books.len() - 1)
        };
    }
}

/// Picker over live loans for the return dialog.
pub(crate) struct ReturnState {
    pub(crate) issues: Vec<IssueRecord>,
    pub(crate) selected: usize,
}

impl ReturnState {
    /// Start on the loan of `focus_book` when it has one.
    pub(crate) fn new(issues: Vec<IssueRecord>, focus_book: Option<i64>) -> Self {
        let selected = focus_book
            .and_then(|id| issues.iter().position(|issue| issue.book_id == id))
            .unwrap_or(0);
        Self { issues, selected }
    }

    pub(crate) fn current(&self) -> Option<&IssueRecord> {
        self.issues.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.issues.is_empty() {
            return;
        }
        let max = self.issues.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, max) as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReadStatus;
    use chrono::NaiveDate;

    fn book(id: i64) -> Book {
        Book {
            id,
            title: format!("Book {id}"),
            author: "A".into(),
            year: 2000,
            genre: "G".into(),
            read_status: ReadStatus::Unread,
            cover_path: None,
            rating: 3,
        }
    }

    fn issue(book_id: i64) -> IssueRecord {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        IssueRecord {
            id: book_id * 10,
            book_id,
            book_title: format!("Book {book_id}"),
            issued_to: "Alice".into(),
            issue_date: day,
            due_date: day,
        }
    }

    #[test]
    fn replace_keeps_the_cursor_on_the_same_book() {
        let mut screen = BookScreen::new();
        screen.replace(vec![book(1), book(2), book(3)], vec![], None);
        screen.move_selection(2);
        assert_eq!(screen.current_book().map(|b| b.id), Some(3));

        screen.replace(vec![book(3), book(4)], vec![issue(3)], None);
        assert_eq!(screen.current_book().map(|b| b.id), Some(3));
        assert!(screen.issue_for(3).is_some());

        screen.replace(vec![book(1)], vec![], None);
        assert_eq!(screen.selected, 0);
    }

    #[test]
    fn selection_is_clamped() {
        let mut screen = BookScreen::new();
        screen.replace(vec![book(1), book(2)], vec![], None);
        screen.move_selection(-5);
        assert_eq!(screen.selected, 0);
        screen.move_selection(10);
        assert_eq!(screen.selected, 1);
    }

    #[test]
    fn return_picker_starts_on_the_focused_book() {
        let state = ReturnState::new(vec![issue(1), issue(2)], Some(2));
        assert_eq!(state.current().map(|i| i.book_id), Some(2));
        let state = ReturnState::new(vec![issue(1)], Some(9));
        assert_eq!(state.selected, 0);
    }
}
