// File: ./src/model/mod.rs
pub mod adapter;
pub mod display;
pub mod item;
pub mod matcher;
pub mod recurrence;

pub use adapter::parse_calendars;
pub use display::TimeFormatter;
pub use item::{
    CalendarData, CalendarEvent, CalendarPoint, CalendarTodo, FilterWindow, Frequency,
    Occurrence, RecurrenceRule, RecurrenceSet, TodoStatus,
};
