use anyhow::Error;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders};

use crate::error::CatalogError;

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Turn an error into the one line shown in the footer. Catalog errors carry
/// field-specific messages already; storage failures get a prefix so they read
/// as something the operator has to fix, with the driver's message appended.
pub(crate) fn surface_error(err: &Error) -> String {
    match err.downcast_ref::<CatalogError>() {
        Some(catalog_err) if catalog_err.is_storage() => {
            let cause = err
                .chain()
                .last()
                .map(|cause| cause.to_string())
                .unwrap_or_default();
            format!("Storage failure: {catalog_err} ({cause})")
        }
        Some(catalog_err) => catalog_err.to_string(),
        None => err
            .chain()
            .last()
            .map(|cause| cause.to_string())
            .unwrap_or_else(|| err.to_string()),
    }
}

/// Labelled bar chart used by the statistics screen.
pub(crate) fn bar_chart<'a>(
    title: &'a str,
    data: &[(String, u64)],
    color: Color,
    horizontal: bool,
) -> BarChart<'a> {
    let bars: Vec<Bar> = data
        .iter()
        .map(|(label, value)| {
            Bar::default()
                .value(*value)
                .label(Line::from(label.clone()))
                .style(Style::default().fg(color))
        })
        .collect();

    let chart = BarChart::default()
        .block(Block::default().title(title).borders(Borders::ALL))
        .data(BarGroup::default().bars(&bars))
        .bar_gap(1);

    if horizontal {
        chart.direction(Direction::Horizontal).bar_width(1)
    } else {
        chart.bar_width(7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn validation_errors_keep_their_message() {
        let err = Error::from(CatalogError::validation("title", "is required"));
        assert_eq!(surface_error(&err), "title: is required");
    }

    #[test]
    fn storage_errors_are_flagged() {
        let err = Error::from(CatalogError::Storage {
            action: "failed to insert book",
            source: rusqlite::Error::QueryReturnedNoRows,
        });
        assert_eq!(
            surface_error(&err),
            "Storage failure: failed to insert book (Query returned no rows)"
        );
    }

    #[test]
    fn plain_errors_show_their_root_cause() {
        let err = anyhow!("Due date must be a date like 2024-01-31.");
        assert_eq!(surface_error(&err), "Due date must be a date like 2024-01-31.");
    }

    #[test]
    fn centered_rect_stays_inside_the_area() {
        let area = Rect::new(0, 0, 100, 50);
        let rect = centered_rect(60, 40, area);
        assert_eq!(rect.width, 60);
        assert_eq!(rect.height, 20);
        assert_eq!(rect.x, 20);
    }
}
