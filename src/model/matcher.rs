// File: ./src/model/matcher.rs
// Decides which components make it into the outline.
//
// Events are kept when they touch the filter window (for recurring events: when
// any occurrence does). Open to-dos are always kept; finished ones only when
// they were finished inside the window.

use crate::model::item::{CalendarEvent, CalendarTodo, FilterWindow, TodoStatus};
use chrono::NaiveDate;

pub fn date_in_window(date: NaiveDate, window: &FilterWindow) -> bool {
    window.contains(date)
}

pub fn include_event(event: &CalendarEvent, window: &FilterWindow, limit: u16) -> bool {
    if event.recurs() {
        match event.occurrences(window, limit) {
            Ok(occs) if !occs.is_empty() => return true,
            Ok(_) => {}
            Err(e) => {
                log::warn!(
                    "Omitting event with incomprehensible recurrence ({}):\n{}",
                    e,
                    event.source
                );
                return false;
            }
        }
    }

    if let Some(end) = &event.end
        && date_in_window(end.date(), window)
    {
        return true;
    }
    event
        .start
        .as_ref()
        .is_some_and(|start| date_in_window(start.date(), window))
}

pub fn include_todo(todo: &CalendarTodo, window: &FilterWindow) -> bool {
    if !matches!(todo.status, TodoStatus::Completed | TodoStatus::Cancelled) {
        return true;
    }
    todo.completed
        .as_ref()
        .is_some_and(|done| date_in_window(done.date(), window))
}
