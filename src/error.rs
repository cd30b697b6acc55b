// File: ./src/error.rs
//! Errors raised while decoding or rendering a single calendar component.

/// Per-item conversion error. The batch driver logs these and moves on.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Missing required property '{0}'")]
    MissingField(&'static str),

    #[error("Invalid value '{value}' for property: {property}")]
    InvalidDate { property: String, value: String },

    #[error("Incomprehensible recurrence: {0}")]
    Recurrence(String),

    #[error("iCalendar parsing error: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
