// File: ./src/model/item.rs
use crate::error::ConvertError;
use crate::model::recurrence::RecurrenceEngine;
use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, Timelike};
use std::fmt;
use std::str::FromStr;
use strum::EnumString;

// --- DATE TYPES ---

/// A point in time as it appeared in the calendar.
///
/// Timezone identifiers are opaque labels: nothing here converts between zones.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CalendarPoint {
    Date(NaiveDate),
    DateTime {
        value: NaiveDateTime,
        tzid: Option<String>,
    },
}

impl CalendarPoint {
    pub fn date(&self) -> NaiveDate {
        match self {
            CalendarPoint::Date(d) => *d,
            CalendarPoint::DateTime { value, .. } => value.date(),
        }
    }

    pub fn has_time(&self) -> bool {
        matches!(self, CalendarPoint::DateTime { .. })
    }

    /// Hour and minute, or `None` for date-only points.
    pub fn hour_minute(&self) -> Option<(u32, u32)> {
        match self {
            CalendarPoint::Date(_) => None,
            CalendarPoint::DateTime { value, .. } => Some((value.hour(), value.minute())),
        }
    }

    pub fn tzid(&self) -> Option<&str> {
        match self {
            CalendarPoint::Date(_) => None,
            CalendarPoint::DateTime { tzid, .. } => tzid.as_deref(),
        }
    }

    pub fn weekday_index(&self) -> usize {
        self.date().weekday().num_days_from_sunday() as usize
    }

    /// Wall-clock value; date-only points map to midnight.
    pub fn naive(&self) -> NaiveDateTime {
        match self {
            CalendarPoint::Date(d) => d.and_time(chrono::NaiveTime::MIN),
            CalendarPoint::DateTime { value, .. } => *value,
        }
    }

    /// Shifts the point, keeping its shape and label. `None` when the result
    /// leaves chrono's date range.
    pub fn checked_shift(&self, delta: Duration) -> Option<CalendarPoint> {
        match self {
            CalendarPoint::Date(d) => d.checked_add_signed(delta).map(CalendarPoint::Date),
            CalendarPoint::DateTime { value, tzid } => {
                value
                    .checked_add_signed(delta)
                    .map(|value| CalendarPoint::DateTime {
                        value,
                        tzid: tzid.clone(),
                    })
            }
        }
    }

    /// Rebuilds a point with this point's shape from a wall-clock value.
    pub fn with_naive(&self, value: NaiveDateTime) -> CalendarPoint {
        match self {
            CalendarPoint::Date(_) => CalendarPoint::Date(value.date()),
            CalendarPoint::DateTime { tzid, .. } => CalendarPoint::DateTime {
                value,
                tzid: tzid.clone(),
            },
        }
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(CalendarPoint::Date)
    }

    pub fn from_ymd_hm(year: i32, month: u32, day: u32, hour: u32, min: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, min, 0))
            .map(|value| CalendarPoint::DateTime { value, tzid: None })
    }

    pub fn with_tzid(self, label: &str) -> Self {
        match self {
            CalendarPoint::Date(d) => CalendarPoint::Date(d),
            CalendarPoint::DateTime { value, .. } => CalendarPoint::DateTime {
                value,
                tzid: Some(label.to_string()),
            },
        }
    }
}

// --- RECURRENCE ---

#[derive(Debug, Clone, Eq, PartialEq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Frequency {
    #[strum(serialize = "SECONDLY")]
    Secondly,
    #[strum(serialize = "MINUTELY")]
    Minutely,
    #[strum(serialize = "HOURLY")]
    Hourly,
    #[strum(serialize = "DAILY")]
    Daily,
    #[strum(serialize = "WEEKLY")]
    Weekly,
    #[strum(serialize = "MONTHLY")]
    Monthly,
    #[strum(serialize = "YEARLY")]
    Yearly,
    #[strum(default)]
    Other(String),
}

impl Frequency {
    pub fn name(&self) -> &str {
        match self {
            Frequency::Secondly => "SECONDLY",
            Frequency::Minutely => "MINUTELY",
            Frequency::Hourly => "HOURLY",
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
            Frequency::Other(s) => s,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One RRULE or EXRULE value, e.g. `FREQ=WEEKLY;INTERVAL=2`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<String>,
    /// Rule text without the `RRULE:` prefix, used for expansion.
    pub raw: String,
}

impl RecurrenceRule {
    pub fn is_bounded(&self) -> bool {
        self.count.is_some() || self.until.is_some()
    }
}

impl FromStr for RecurrenceRule {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let raw = if trimmed.len() >= 6 && trimmed[..6].eq_ignore_ascii_case("RRULE:") {
            trimmed[6..].to_string()
        } else {
            trimmed.to_string()
        };

        let mut frequency = None;
        let mut interval = 1;
        let mut count = None;
        let mut until = None;

        for part in raw.split(';').filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(ConvertError::Recurrence(format!(
                    "malformed rule part '{}' in '{}'",
                    part, raw
                )));
            };
            let bad_number =
                |_| ConvertError::Recurrence(format!("invalid {} '{}' in '{}'", key, value, raw));
            match key.trim().to_uppercase().as_str() {
                "FREQ" => frequency = Frequency::from_str(value.trim()).ok(),
                "INTERVAL" => interval = value.trim().parse::<u32>().map_err(bad_number)?,
                "COUNT" => count = Some(value.trim().parse::<u32>().map_err(bad_number)?),
                "UNTIL" => until = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let frequency = frequency
            .ok_or_else(|| ConvertError::Recurrence(format!("missing FREQ in '{}'", raw)))?;
        if interval == 0 {
            return Err(ConvertError::Recurrence(format!(
                "INTERVAL must be positive in '{}'",
                raw
            )));
        }

        Ok(RecurrenceRule {
            frequency,
            interval,
            count,
            until,
            raw,
        })
    }
}

/// Every recurrence-related property of one component.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RecurrenceSet {
    pub rules: Vec<RecurrenceRule>,
    pub exrules: Vec<RecurrenceRule>,
    pub rdates: Vec<CalendarPoint>,
    pub exdates: Vec<CalendarPoint>,
    /// Rule values that could not be understood, with the reason.
    pub malformed: Vec<String>,
}

impl RecurrenceSet {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.rdates.is_empty() && self.malformed.is_empty()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Occurrence {
    pub start: CalendarPoint,
    pub end: Option<CalendarPoint>,
}

// --- FILTER WINDOW ---

/// Inclusive date range fixed for a whole run.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FilterWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FilterWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn around(today: NaiveDate, past_days: u32, future_days: u32) -> Option<Self> {
        Some(Self {
            start: today.checked_sub_days(Days::new(u64::from(past_days)))?,
            end: today.checked_add_days(Days::new(u64::from(future_days)))?,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

// --- COMPONENTS ---

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CalendarEvent {
    pub uid: String,
    pub summary: String,
    pub status: Option<String>,
    pub start: Option<CalendarPoint>,
    pub end: Option<CalendarPoint>,
    pub recurrence: RecurrenceSet,
    pub location: Option<String>,
    pub organizer: Option<String>,
    pub url: Option<String>,
    pub categories: Vec<String>,
    pub description: Option<String>,
    /// The VEVENT exactly as it was serialized from the input.
    pub source: String,
}

impl CalendarEvent {
    pub fn recurs(&self) -> bool {
        !self.recurrence.is_empty()
    }

    /// Concrete occurrences overlapping `window`.
    pub fn occurrences(
        &self,
        window: &FilterWindow,
        limit: u16,
    ) -> Result<Vec<Occurrence>, ConvertError> {
        RecurrenceEngine::occurrences(self, window, limit)
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum TodoStatus {
    #[default]
    #[strum(disabled)]
    None,
    #[strum(serialize = "NEEDS-ACTION")]
    NeedsAction,
    #[strum(serialize = "IN-PROCESS")]
    InProcess,
    #[strum(serialize = "COMPLETED")]
    Completed,
    #[strum(serialize = "CANCELLED")]
    Cancelled,
}

impl TodoStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Org keyword for this completion state.
    pub fn org_keyword(&self) -> &'static str {
        match self {
            TodoStatus::Completed => "DONE",
            TodoStatus::Cancelled => "CANCELLED",
            TodoStatus::InProcess | TodoStatus::NeedsAction | TodoStatus::None => "TODO",
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CalendarTodo {
    pub uid: String,
    pub summary: String,
    pub due: Option<CalendarPoint>,
    pub start: Option<CalendarPoint>,
    pub status: TodoStatus,
    pub priority: Option<u32>,
    pub completed: Option<CalendarPoint>,
    pub location: Option<String>,
    pub organizer: Option<String>,
    pub url: Option<String>,
    pub categories: Vec<String>,
    pub description: Option<String>,
    pub source: String,
}

/// One `VCALENDAR` container, components in encounter order.
#[derive(Debug, Clone, Default)]
pub struct CalendarData {
    pub events: Vec<CalendarEvent>,
    pub todos: Vec<CalendarTodo>,
}
