// File: ./src/model/display.rs
//! Org-mode timestamp formatting.
//!
//! Everything here is pure apart from the warning emitted when a repeater is
//! combined with a multi-day span, which Org cannot express.
use crate::model::item::CalendarPoint;
use chrono::{Datelike, Duration};

pub const DEFAULT_WEEKDAYS: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];
pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormatter {
    weekdays: [String; 7],
    default_tz: String,
}

impl Default for TimeFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_WEEKDAYS.map(String::from), DEFAULT_TIMEZONE)
    }
}

impl TimeFormatter {
    /// `weekdays` is indexed by day of week, Sunday first.
    pub fn new(weekdays: [String; 7], default_tz: &str) -> Self {
        Self {
            weekdays,
            default_tz: default_tz.to_string(),
        }
    }

    pub fn default_tz(&self) -> &str {
        &self.default_tz
    }

    /// `YYYY-MM-DD Wd`
    pub fn format_date(&self, point: &CalendarPoint) -> String {
        let d = point.date();
        format!(
            "{:04}-{:02}-{:02} {}",
            d.year(),
            d.month(),
            d.day(),
            self.weekdays[point.weekday_index()]
        )
    }

    /// `HH:MM`, for points where [`has_time`] holds.
    pub fn format_time(&self, point: &CalendarPoint) -> String {
        let (hour, min) = point.hour_minute().unwrap_or((0, 0));
        format!("{:02}:{:02}", hour, min)
    }

    pub fn format_timestamp(&self, point: &CalendarPoint, repeater: Option<&str>) -> String {
        let mut res = String::from("<");
        res.push_str(&self.format_date(point));
        if has_time(point) {
            res.push(' ');
            res.push_str(&self.format_time(point));
        }
        if let Some(r) = repeater {
            res.push(' ');
            res.push_str(r);
        }
        res.push('>');
        res
    }

    /// Start and end on the same date: `<date start-end>`.
    pub fn format_same_day_range(
        &self,
        start: &CalendarPoint,
        end: Option<&CalendarPoint>,
        repeater: Option<&str>,
    ) -> String {
        let mut res = String::from("<");
        res.push_str(&self.format_date(start));
        if has_time(start) {
            res.push(' ');
            res.push_str(&self.format_time(start));
        }
        if let Some(e) = end.filter(|e| has_time(e)) {
            res.push('-');
            res.push_str(&self.format_time(e));
        }
        if let Some(r) = repeater {
            res.push(' ');
            res.push_str(r);
        }
        res.push('>');
        res
    }

    /// Time span, possibly over several days.
    pub fn format_span(
        &self,
        start: &CalendarPoint,
        end: Option<&CalendarPoint>,
        repeater: Option<&str>,
    ) -> String {
        if is_same_day_span(start, end) {
            return self.format_same_day_range(start, end, repeater);
        }

        let mut res = self.format_timestamp(start, repeater);
        if let Some(end) = end {
            let end = normalize_end(end);
            match repeater {
                None => {
                    res.push_str("--");
                    res.push_str(&self.format_timestamp(&end, None));
                }
                // Org has no syntax for a repeating multi-day range.
                Some(_) => log::warn!(
                    "Omitting end time to allow repeater: {}--{}",
                    res,
                    self.format_timestamp(&end, None)
                ),
            }
        }
        res
    }

    /// [`format_span`] plus a ` [tzid]` hint when the start is not in the default zone.
    pub fn format_span_with_zone(
        &self,
        start: &CalendarPoint,
        end: Option<&CalendarPoint>,
        repeater: Option<&str>,
    ) -> String {
        let mut res = self.format_span(start, end, repeater);
        if let Some(tzid) = start.tzid()
            && tzid != self.default_tz
        {
            res.push_str(&format!(" [{}]", tzid));
        }
        res
    }
}

pub fn has_time(point: &CalendarPoint) -> bool {
    point.has_time()
}

/// Moves an exclusive end (date-only, or exactly midnight) back onto the last day it covers.
pub fn normalize_end(end: &CalendarPoint) -> CalendarPoint {
    match end.hour_minute() {
        None | Some((0, 0)) => end
            .checked_shift(-Duration::days(1))
            .unwrap_or_else(|| end.clone()),
        Some(_) => end.clone(),
    }
}

/// True when there is no end, or the normalized end falls on the start's date.
pub fn is_same_day_span(start: &CalendarPoint, end: Option<&CalendarPoint>) -> bool {
    match end {
        None => true,
        Some(end) => normalize_end(end).date() == start.date(),
    }
}
