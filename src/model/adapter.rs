// File: src/model/adapter.rs
//! Decodes raw iCalendar text into [`CalendarEvent`]s and [`CalendarTodo`]s.
use crate::error::ConvertError;
use crate::model::item::{
    CalendarData, CalendarEvent, CalendarPoint, CalendarTodo, RecurrenceRule, RecurrenceSet,
    TodoStatus,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use icalendar::{Calendar, CalendarComponent, Component, Event, Property, Todo};
use std::str::FromStr;

/// Parses every `VCALENDAR` container in `raw`, keeping components in encounter order.
///
/// A stream without any container, or a container the parser rejects, is fatal.
pub fn parse_calendars(raw: &str) -> Result<Vec<CalendarData>, ConvertError> {
    let blocks = split_blocks(raw, "VCALENDAR");
    if blocks.is_empty() {
        return Err(ConvertError::Parse("no VCALENDAR found in input".to_string()));
    }

    let mut calendars = Vec::with_capacity(blocks.len());
    for block in blocks {
        let calendar: Calendar = block
            .parse()
            .map_err(|e| ConvertError::Parse(format!("{}", e)))?;

        // Raw text of each top-level component, so the outline carries the input verbatim.
        let inner = strip_container(&block);
        let event_sources = split_blocks(&inner, "VEVENT");
        let todo_sources = split_blocks(&inner, "VTODO");

        let mut data = CalendarData::default();
        for component in &calendar.components {
            match component {
                CalendarComponent::Event(e) => {
                    let source = event_sources
                        .get(data.events.len())
                        .cloned()
                        .unwrap_or_else(|| e.to_string());
                    data.events.push(CalendarEvent::from_ical(e, source));
                }
                CalendarComponent::Todo(t) => {
                    let source = todo_sources
                        .get(data.todos.len())
                        .cloned()
                        .unwrap_or_else(|| t.to_string());
                    data.todos.push(CalendarTodo::from_ical(t, source));
                }
                _ => {}
            }
        }
        log::debug!(
            "Parsed calendar with {} events and {} todos",
            data.events.len(),
            data.todos.len()
        );
        calendars.push(data);
    }
    Ok(calendars)
}

impl CalendarEvent {
    pub fn from_ical(event: &Event, source: String) -> Self {
        let uid = event.get_uid().unwrap_or_default().to_string();

        let start = optional_point(event, "DTSTART", &uid);
        let end = optional_point(event, "DTEND", &uid).or_else(|| {
            let start = start.as_ref()?;
            let duration = find_props(event, "DURATION")
                .first()
                .map(|p| p.value().to_string())?;
            match parse_duration(&duration).and_then(|d| start.checked_shift(d)) {
                Some(end) => Some(end),
                None => {
                    log::warn!("Ignoring invalid DURATION '{}' on {}", duration, uid);
                    None
                }
            }
        });

        CalendarEvent {
            summary: event.get_summary().unwrap_or_default().to_string(),
            status: text_value(event, "STATUS").map(|s| s.to_uppercase()),
            start,
            end,
            recurrence: recurrence_set(event, &source, &uid),
            location: text_value(event, "LOCATION"),
            organizer: text_value(event, "ORGANIZER"),
            url: text_value(event, "URL"),
            categories: categories(event),
            description: event.get_description().map(|d| d.to_string()),
            source,
            uid,
        }
    }
}

impl CalendarTodo {
    pub fn from_ical(todo: &Todo, source: String) -> Self {
        let uid = todo.get_uid().unwrap_or_default().to_string();

        let status = match text_value(todo, "STATUS") {
            Some(val) => TodoStatus::from_str(val.trim()).unwrap_or_else(|_| {
                log::debug!("Unknown STATUS '{}' on {}", val, uid);
                TodoStatus::None
            }),
            None => TodoStatus::None,
        };

        let priority = text_value(todo, "PRIORITY").and_then(|p| match p.trim().parse::<u32>() {
            Ok(n) => Some(n),
            Err(_) => {
                log::warn!("Ignoring invalid PRIORITY '{}' on {}", p, uid);
                None
            }
        });

        CalendarTodo {
            summary: todo.get_summary().unwrap_or_default().to_string(),
            due: optional_point(todo, "DUE", &uid),
            start: optional_point(todo, "DTSTART", &uid),
            completed: optional_point(todo, "COMPLETED", &uid),
            status,
            priority,
            location: text_value(todo, "LOCATION"),
            organizer: text_value(todo, "ORGANIZER"),
            url: text_value(todo, "URL"),
            categories: categories(todo),
            description: todo.get_description().map(|d| d.to_string()),
            source,
            uid,
        }
    }
}

// --- PROPERTY HELPERS ---

/// All instances of `key`, whether the parser stored them as single or multi properties.
fn find_props<'a, C: Component>(component: &'a C, key: &str) -> Vec<&'a Property> {
    let mut props: Vec<&Property> = Vec::new();
    if let Some(p) = component.properties().get(key) {
        props.push(p);
    }
    if let Some(multi) = component.multi_properties().get(key) {
        props.extend(multi.iter());
    }
    props
}

fn text_value<C: Component>(component: &C, key: &str) -> Option<String> {
    find_props(component, key)
        .first()
        .map(|p| p.value().to_string())
        .filter(|v| !v.is_empty())
}

fn categories<C: Component>(component: &C) -> Vec<String> {
    find_props(component, "CATEGORIES")
        .iter()
        .flat_map(|p| split_list(p.value()))
        .map(|s| s.replace("\\,", ","))
        .collect()
}

/// Splits a comma separated value, honouring `\,` escapes.
fn split_list(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in value.chars() {
        match c {
            ',' if !escaped => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
        escaped = c == '\\' && !escaped;
    }
    parts.push(current.trim().to_string());
    parts.retain(|s| !s.is_empty());
    parts
}

fn optional_point<C: Component>(component: &C, key: &str, uid: &str) -> Option<CalendarPoint> {
    let prop = *find_props(component, key).first()?;
    match point_from_property(prop) {
        Ok(point) => Some(point),
        Err(e) => {
            log::warn!("Ignoring {} on {}: {}", key, uid, e);
            None
        }
    }
}

pub fn point_from_property(prop: &Property) -> Result<CalendarPoint, ConvertError> {
    let tzid = prop.params().get("TZID").map(|p| p.value().to_string());
    parse_point(prop.key(), prop.value(), tzid)
}

/// Parses `YYYYMMDD`, `YYYYMMDDTHHMMSS` and `YYYYMMDDTHHMMSSZ`.
///
/// UTC values carry the `UTC` label; floating values carry no label.
pub fn parse_point(
    property: &str,
    value: &str,
    tzid: Option<String>,
) -> Result<CalendarPoint, ConvertError> {
    let val = value.trim();
    let invalid = || ConvertError::InvalidDate {
        property: property.to_string(),
        value: value.to_string(),
    };

    if val.len() == 8 {
        return NaiveDate::parse_from_str(val, "%Y%m%d")
            .map(CalendarPoint::Date)
            .map_err(|_| invalid());
    }

    let (stamp, tzid) = match val.strip_suffix('Z') {
        Some(stripped) => (stripped, Some("UTC".to_string())),
        None => (val, tzid),
    };
    let value = NaiveDateTime::parse_from_str(stamp, "%Y%m%dT%H%M%S")
        .or_else(|_| NaiveDateTime::parse_from_str(stamp, "%Y%m%dT%H%M"))
        .map_err(|_| invalid())?;
    Ok(CalendarPoint::DateTime { value, tzid })
}

/// ISO 8601 durations as used by RFC 5545 (`P1D`, `PT1H30M`, `-P1W`).
pub fn parse_duration(val: &str) -> Option<Duration> {
    let val = val.trim();
    let (negative, body) = match val.as_bytes().first()? {
        b'-' => (true, &val[1..]),
        b'+' => (false, &val[1..]),
        _ => (false, val),
    };
    let body = body.strip_prefix('P')?;

    let mut seconds: i64 = 0;
    let mut num_buf = String::new();
    let mut in_time = false;
    let mut seen_unit = false;
    for c in body.chars() {
        if c == 'T' {
            in_time = true;
        } else if c.is_ascii_digit() {
            num_buf.push(c);
        } else {
            let n: i64 = num_buf.parse().ok()?;
            num_buf.clear();
            let unit: i64 = match (c, in_time) {
                ('W', false) => 7 * 86400,
                ('D', false) => 86400,
                ('H', true) => 3600,
                ('M', true) => 60,
                ('S', true) => 1,
                _ => return None,
            };
            seconds = seconds.checked_add(n.checked_mul(unit)?)?;
            seen_unit = true;
        }
    }
    if !num_buf.is_empty() || !seen_unit {
        return None;
    }
    Duration::try_seconds(if negative { -seconds } else { seconds })
}

fn recurrence_set<C: Component>(component: &C, source: &str, uid: &str) -> RecurrenceSet {
    let mut set = RecurrenceSet::default();

    // The parser keeps only the last RRULE/EXRULE of a component, so rules come from the raw text.
    for (key, target) in [("RRULE", false), ("EXRULE", true)] {
        let mut values = raw_values(source, key);
        if values.is_empty() {
            values = find_props(component, key)
                .iter()
                .map(|p| p.value().to_string())
                .collect();
        }
        for value in values {
            match RecurrenceRule::from_str(&value) {
                Ok(rule) if target => set.exrules.push(rule),
                Ok(rule) => set.rules.push(rule),
                Err(e) => set.malformed.push(format!("{}: {}", key, e)),
            }
        }
    }

    for (key, exclude) in [("RDATE", false), ("EXDATE", true)] {
        for prop in find_props(component, key) {
            let tzid = prop.params().get("TZID").map(|p| p.value().to_string());
            for part in split_list(prop.value()) {
                // RDATE may hold PERIOD values; the start of the period is the occurrence.
                let stamp = part.split('/').next().unwrap_or_default();
                match parse_point(key, stamp, tzid.clone()) {
                    Ok(point) if exclude => set.exdates.push(point),
                    Ok(point) => set.rdates.push(point),
                    Err(e) => {
                        log::warn!("Ignoring {} value on {}: {}", key, uid, e);
                    }
                }
            }
        }
    }

    set
}

// --- RAW TEXT HELPERS ---

/// Top-level `BEGIN:<name>` .. `END:<name>` blocks of `raw`, nested components included.
fn split_blocks(raw: &str, name: &str) -> Vec<String> {
    let begin = format!("BEGIN:{}", name);
    let end = format!("END:{}", name);

    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    let mut depth = 0usize;

    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case(&begin) {
            depth += 1;
            current.get_or_insert_with(Vec::new).push(line);
            continue;
        }
        if let Some(lines) = current.as_mut() {
            lines.push(line);
            if trimmed.eq_ignore_ascii_case(&end) {
                depth -= 1;
                if depth == 0 {
                    blocks.extend(current.take().map(|l| l.join("\n")));
                }
            }
        }
    }
    blocks
}

/// Values of every `key` line directly inside the component in `source`, after unfolding.
/// Lines of nested components are skipped.
fn raw_values(source: &str, key: &str) -> Vec<String> {
    let mut unfolded: Vec<String> = Vec::new();
    for line in source.lines() {
        let line = line.trim_end_matches('\r');
        let continuation = line.strip_prefix(' ').or_else(|| line.strip_prefix('\t'));
        match (continuation, unfolded.last_mut()) {
            (Some(rest), Some(prev)) => prev.push_str(rest),
            _ => unfolded.push(line.to_string()),
        }
    }

    let mut values = Vec::new();
    let mut depth = 0usize;
    for line in &unfolded {
        let Some((head, value)) = line.split_once(':') else {
            continue;
        };
        let name = head.split(';').next().unwrap_or_default().trim();
        if name.eq_ignore_ascii_case("BEGIN") {
            depth += 1;
        } else if name.eq_ignore_ascii_case("END") {
            depth = depth.saturating_sub(1);
        } else if depth == 1 && name.eq_ignore_ascii_case(key) {
            values.push(value.trim().to_string());
        }
    }
    values
}

/// The lines between `BEGIN:VCALENDAR` and `END:VCALENDAR`.
fn strip_container(block: &str) -> String {
    let lines: Vec<&str> = block.lines().collect();
    if lines.len() < 2 {
        return String::new();
    }
    lines[1..lines.len() - 1].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "BEGIN:VCALENDAR\r
VERSION:2.0\r
PRODID:-//test//EN\r
BEGIN:VEVENT\r
UID:ev-1\r
SUMMARY:Standup\r
DTSTART;TZID=America/New_York:20240601T090000\r
DURATION:PT30M\r
CATEGORIES:work,daily\r
LOCATION:Room 1\r
END:VEVENT\r
BEGIN:VTODO\r
UID:todo-1\r
SUMMARY:Write report\r
STATUS:COMPLETED\r
COMPLETED:20240602T120000Z\r
PRIORITY:3\r
DUE;VALUE=DATE:20240605\r
END:VTODO\r
END:VCALENDAR\r
";

    #[test]
    fn test_parse_point_shapes() {
        assert_eq!(
            parse_point("DTSTART", "20240601", None).unwrap(),
            CalendarPoint::from_ymd(2024, 6, 1).unwrap()
        );
        assert_eq!(
            parse_point("DTSTART", "20240601T093000", None).unwrap(),
            CalendarPoint::from_ymd_hm(2024, 6, 1, 9, 30).unwrap()
        );
        let utc = parse_point("DTSTART", "20240601T093000Z", None).unwrap();
        assert_eq!(utc.tzid(), Some("UTC"));
        let zoned = parse_point("DTSTART", "20240601T093000", Some("Asia/Tokyo".into())).unwrap();
        assert_eq!(zoned.tzid(), Some("Asia/Tokyo"));
        assert!(matches!(
            parse_point("DUE", "2024-06-01", None),
            Err(ConvertError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("PT30M"), Some(Duration::minutes(30)));
        assert_eq!(parse_duration("P1DT2H"), Some(Duration::hours(26)));
        assert_eq!(parse_duration("P2W"), Some(Duration::days(14)));
        assert_eq!(parse_duration("-PT15M"), Some(Duration::minutes(-15)));
        assert_eq!(parse_duration("PT"), None);
        assert_eq!(parse_duration("1H"), None);
        assert_eq!(parse_duration("P1H"), None);
        assert_eq!(parse_duration("P99999999999999999D"), None);
        assert_eq!(parse_duration("P9223372036854775807W"), None);
    }

    #[test]
    fn test_huge_duration_leaves_end_unset() {
        let raw = "BEGIN:VCALENDAR\nVERSION:2.0\nBEGIN:VEVENT\nUID:far\nDTSTART:20240601T090000\nDURATION:P999999999D\nEND:VEVENT\nBEGIN:VEVENT\nUID:near\nDTSTART:20240601T090000\nDURATION:PT1H\nEND:VEVENT\nEND:VCALENDAR\n";
        let calendars = parse_calendars(raw).unwrap();
        let events = &calendars[0].events;
        assert_eq!(events.len(), 2);
        assert!(events[0].start.is_some());
        assert_eq!(events[0].end, None);
        assert_eq!(events[1].end, CalendarPoint::from_ymd_hm(2024, 6, 1, 10, 0));
    }

    #[test]
    fn test_every_rule_line_is_kept() {
        let raw = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:two\r\nDTSTART:20240601T090000\r\nRRULE:FREQ=WEEKLY\r\nRRULE:FREQ=DAILY;\r\n INTERVAL=3\r\nEXRULE:FREQ=MONTHLY\r\nEXRULE:FREQ=YEARLY\r\nBEGIN:VALARM\r\nTRIGGER:-PT5M\r\nEND:VALARM\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let calendars = parse_calendars(raw).unwrap();
        let set = &calendars[0].events[0].recurrence;
        let rules: Vec<&str> = set.rules.iter().map(|r| r.raw.as_str()).collect();
        assert_eq!(rules, vec!["FREQ=WEEKLY", "FREQ=DAILY;INTERVAL=3"]);
        assert_eq!(set.rules[1].interval, 3);
        assert_eq!(set.exrules.len(), 2);
    }

    #[test]
    fn test_raw_values_skip_nested_components() {
        let source = "BEGIN:VEVENT\nRRULE:FREQ=DAILY\nBEGIN:VALARM\nRRULE:FREQ=HOURLY\nEND:VALARM\nrrule;X-P=1:FREQ=YEARLY\nEND:VEVENT";
        assert_eq!(
            raw_values(source, "RRULE"),
            vec!["FREQ=DAILY", "FREQ=YEARLY"]
        );
    }

    #[test]
    fn test_split_list_escapes() {
        assert_eq!(split_list("a, b,,c"), vec!["a", "b", "c"]);
        assert_eq!(split_list("x\\,y,z"), vec!["x\\,y", "z"]);
    }

    #[test]
    fn test_split_blocks_nested() {
        let raw = "BEGIN:VTODO\nUID:a\nBEGIN:VALARM\nEND:VALARM\nEND:VTODO\nBEGIN:VTODO\nUID:b\nEND:VTODO\n";
        let blocks = split_blocks(raw, "VTODO");
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("BEGIN:VALARM"));
        assert!(blocks[1].starts_with("BEGIN:VTODO\nUID:b"));
    }

    #[test]
    fn test_parse_sample() {
        let calendars = parse_calendars(SAMPLE).unwrap();
        assert_eq!(calendars.len(), 1);

        let event = &calendars[0].events[0];
        assert_eq!(event.uid, "ev-1");
        assert_eq!(event.summary, "Standup");
        assert_eq!(event.categories, vec!["work", "daily"]);
        assert_eq!(event.location.as_deref(), Some("Room 1"));
        assert_eq!(
            event.end,
            CalendarPoint::from_ymd_hm(2024, 6, 1, 9, 30).map(|p| p.with_tzid("America/New_York"))
        );
        assert!(!event.recurs());
        assert!(event.source.starts_with("BEGIN:VEVENT\nUID:ev-1"));
        assert!(event.source.ends_with("END:VEVENT"));

        let todo = &calendars[0].todos[0];
        assert_eq!(todo.status, TodoStatus::Completed);
        assert_eq!(todo.priority, Some(3));
        assert_eq!(todo.due, CalendarPoint::from_ymd(2024, 6, 5));
        assert_eq!(
            todo.completed.as_ref().map(|c| c.date()),
            NaiveDate::from_ymd_opt(2024, 6, 2)
        );
    }

    #[test]
    fn test_no_calendar_is_fatal() {
        assert!(matches!(
            parse_calendars("hello"),
            Err(ConvertError::Parse(_))
        ));
    }
}
