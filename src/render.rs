// File: ./src/render.rs
// Turns filtered calendar components into Org outline records.
//
// Every item renders into its own String; a failure is reported and the item
// skipped, so one broken component never takes the rest of the batch down.
use crate::config::Config;
use crate::error::ConvertError;
use crate::model::display::TimeFormatter;
use crate::model::item::{CalendarData, CalendarEvent, CalendarTodo, FilterWindow};
use crate::model::matcher::{include_event, include_todo};
use crate::model::recurrence::{is_simple_recurrence, repeater_clause};
use std::io::{self, Write};

/// Counters for one run, logged once the batch is done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub events: usize,
    pub todos: usize,
    pub excluded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    formatter: TimeFormatter,
    window: FilterWindow,
    occurrence_limit: u16,
}

impl Renderer {
    pub fn new(formatter: TimeFormatter, window: FilterWindow, occurrence_limit: u16) -> Self {
        Self {
            formatter,
            window,
            occurrence_limit,
        }
    }

    pub fn from_config(config: &Config, window: FilterWindow) -> anyhow::Result<Self> {
        Ok(Self::new(
            config.formatter()?,
            window,
            config.max_occurrences,
        ))
    }

    pub fn window(&self) -> &FilterWindow {
        &self.window
    }

    // --- EVENTS ---

    pub fn render_event(&self, ev: &CalendarEvent) -> Result<String, ConvertError> {
        let start = ev
            .start
            .as_ref()
            .ok_or(ConvertError::MissingField("DTSTART"))?;
        let end = ev.end.as_ref();
        let description = chomp(ev.description.as_deref().unwrap_or(""));

        let mut out = String::new();
        out.push_str(&format!("* {}", ev.summary));
        if let Some(status) = &ev.status {
            out.push_str(&format!(" ({})", status));
        }
        out.push('\n');
        push_properties(&mut out, &ev.uid, &ev.categories, None);

        if !ev.recurs() {
            push_line(
                &mut out,
                &self.formatter.format_span_with_zone(start, end, None),
            );
        }
        if let Some(location) = &ev.location {
            push_line(&mut out, &format!("Location: {}", location));
        }
        push_line(&mut out, description);
        if let Some(organizer) = &ev.organizer {
            push_line(&mut out, &format!("Organizer: {}", organizer));
        }
        if let Some(url) = &ev.url {
            push_line(&mut out, url);
        }

        if ev.recurs() {
            if is_simple_recurrence(&ev.recurrence) {
                let repeater = ev.recurrence.rules.first().map(repeater_clause);
                push_line(
                    &mut out,
                    &format!(
                        "Recurs: {}",
                        self.formatter
                            .format_span(start, end, repeater.as_deref())
                    ),
                );
            } else {
                let spans: Vec<String> = ev
                    .occurrences(&self.window, self.occurrence_limit)?
                    .iter()
                    .map(|occ| self.formatter.format_span(&occ.start, occ.end.as_ref(), None))
                    .collect();
                push_line(&mut out, &format!("Occurrences: {}", spans.join(" ")));
            }
        }

        push_source(&mut out, &ev.source);
        Ok(out)
    }

    // --- TODOS ---

    pub fn render_todo(&self, todo: &CalendarTodo) -> Result<String, ConvertError> {
        let mut out = String::new();
        out.push_str(&format!(
            "* {}{}{}\n",
            todo.status.org_keyword(),
            priority_marker(todo.priority),
            todo.summary
        ));

        let mut planning = String::new();
        if let Some(due) = &todo.due {
            planning.push_str(&format!(
                "DEADLINE: {}",
                self.formatter.format_timestamp(due, None)
            ));
        }
        if let Some(start) = &todo.start {
            planning.push_str(&format!(
                " SCHEDULED: {}",
                self.formatter.format_timestamp(start, None)
            ));
        }
        push_line(&mut out, &planning);

        let priority = todo.priority.map(|p| p.to_string()).unwrap_or_default();
        push_properties(&mut out, &todo.uid, &todo.categories, Some(&priority));

        if let Some(location) = &todo.location {
            push_line(&mut out, &format!("Location: {}", location));
        }
        if let Some(organizer) = &todo.organizer {
            push_line(&mut out, &format!("Organizer: {}", organizer));
        }
        if let Some(url) = &todo.url {
            push_line(&mut out, url);
        }
        push_line(&mut out, chomp(todo.description.as_deref().unwrap_or("")));

        push_source(&mut out, &todo.source);
        Ok(out)
    }

    // --- BATCH ---

    /// Writes all included events of every calendar, then all included to-dos.
    ///
    /// Items are written as soon as they are rendered. Only I/O errors on `out`
    /// abort the run.
    pub fn render_all<W: Write>(
        &self,
        calendars: &[CalendarData],
        out: &mut W,
    ) -> io::Result<RenderStats> {
        let mut stats = RenderStats::default();

        for ev in calendars.iter().flat_map(|c| c.events.iter()) {
            if !include_event(ev, &self.window, self.occurrence_limit) {
                log::debug!("Event {} is outside the filter window", ev.uid);
                stats.excluded += 1;
                continue;
            }
            match self.render_event(ev) {
                Ok(text) => {
                    out.write_all(text.as_bytes())?;
                    stats.events += 1;
                }
                Err(e) => {
                    report_failure(&e, &ev.source);
                    stats.failed += 1;
                }
            }
        }

        for todo in calendars.iter().flat_map(|c| c.todos.iter()) {
            if !include_todo(todo, &self.window) {
                log::debug!("Todo {} was finished outside the filter window", todo.uid);
                stats.excluded += 1;
                continue;
            }
            match self.render_todo(todo) {
                Ok(text) => {
                    out.write_all(text.as_bytes())?;
                    stats.todos += 1;
                }
                Err(e) => {
                    report_failure(&e, &todo.source);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}

/// `"#C "` for anything below the top priority, a single space otherwise.
pub fn priority_marker(priority: Option<u32>) -> &'static str {
    match priority {
        Some(p) if p > 1 => "#C ",
        _ => " ",
    }
}

/// Removes one trailing line ending.
fn chomp(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .or_else(|| text.strip_suffix('\r'))
        .unwrap_or(text)
}

fn push_line(out: &mut String, text: &str) {
    out.push_str("  ");
    out.push_str(text);
    out.push('\n');
}

fn push_properties(out: &mut String, uid: &str, categories: &[String], priority: Option<&str>) {
    push_line(out, ":PROPERTIES:");
    push_line(out, &format!(":ID: {}", uid));
    push_line(out, &format!(":icalCategories: {}", categories.join(" ")));
    if let Some(priority) = priority {
        push_line(out, &format!(":icalPriority: {}", priority));
    }
    push_line(out, ":END:");
}

fn push_source(out: &mut String, source: &str) {
    push_line(out, ":ICALENDAR:");
    out.push_str(source);
    if !source.ends_with('\n') {
        out.push('\n');
    }
    push_line(out, ":END:");
}

fn report_failure(err: &ConvertError, source: &str) {
    log::error!(
        "{}\n------ (ical) --------\n{}\n----------------------",
        err,
        source
    );
}
