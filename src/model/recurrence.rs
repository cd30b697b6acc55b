// File: ./src/model/recurrence.rs
use crate::error::ConvertError;
use crate::model::item::{
    CalendarEvent, FilterWindow, Frequency, Occurrence, RecurrenceRule, RecurrenceSet,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rrule::{RRuleSet, Tz};
use std::collections::HashSet;

/// Can the recurrence be written as a single Org repeater such as `+2w`?
pub fn is_simple_recurrence(set: &RecurrenceSet) -> bool {
    if !set.exrules.is_empty()
        || !set.exdates.is_empty()
        || !set.rdates.is_empty()
        || !set.malformed.is_empty()
    {
        return false;
    }
    let [rule] = set.rules.as_slice() else {
        return false;
    };
    if rule.is_bounded() {
        return false;
    }
    matches!(
        rule.frequency,
        Frequency::Daily | Frequency::Weekly | Frequency::Monthly | Frequency::Yearly
    )
}

/// Org repeater for a rule already known to be simple, e.g. `+2w`.
pub fn repeater_clause(rule: &RecurrenceRule) -> String {
    let unit = rule
        .frequency
        .name()
        .chars()
        .next()
        .map(|c| c.to_ascii_lowercase())
        .unwrap_or('d');
    format!("+{}{}", rule.interval, unit)
}

pub struct RecurrenceEngine;

impl RecurrenceEngine {
    /// Expands the event's recurrence and keeps the occurrences overlapping `window`.
    ///
    /// Wall-clock values are expanded as if they were UTC: timezone labels are
    /// carried through untouched, never converted.
    pub fn occurrences(
        event: &CalendarEvent,
        window: &FilterWindow,
        limit: u16,
    ) -> Result<Vec<Occurrence>, ConvertError> {
        let start = event
            .start
            .as_ref()
            .ok_or(ConvertError::MissingField("DTSTART"))?;
        if let Some(reason) = event.recurrence.malformed.first() {
            return Err(ConvertError::Recurrence(reason.clone()));
        }
        let seed = start.naive();
        let length = event
            .end
            .as_ref()
            .map(|e| e.naive() - seed)
            .unwrap_or_else(Duration::zero);

        let floor = window
            .start
            .and_time(NaiveTime::MIN)
            .checked_sub_signed(length.max(Duration::zero()) + Duration::seconds(1))
            .unwrap_or(NaiveDateTime::MIN);
        let ceiling = window
            .end
            .succ_opt()
            .map_or(NaiveDateTime::MAX, |d| d.and_time(NaiveTime::MIN));

        let mut rrule_string = format!("DTSTART:{}\n", utc_stamp(seed));
        for rule in &event.recurrence.rules {
            rrule_string.push_str(&format!("RRULE:{}\n", sanitize_rule(&rule.raw)));
        }
        // RDATE/EXDATE values are de-duplicated before they reach the rrule parser.
        let mut seen = HashSet::new();
        for rdate in &event.recurrence.rdates {
            let stamp = utc_stamp(rdate.naive());
            if seen.insert(("RDATE", stamp.clone())) {
                rrule_string.push_str(&format!("RDATE:{}\n", stamp));
            }
        }
        for exdate in &event.recurrence.exdates {
            let stamp = utc_stamp(exdate.naive());
            if seen.insert(("EXDATE", stamp.clone())) {
                rrule_string.push_str(&format!("EXDATE:{}\n", stamp));
            }
        }

        let (dates, limited) = expand(&rrule_string, floor, ceiling, limit)?;
        if limited {
            log::warn!(
                "Recurrence of '{}' truncated after {} occurrences",
                event.uid,
                limit
            );
        }

        // EXRULE is deprecated in RFC 5545; expand each one on its own and subtract.
        let mut excluded = HashSet::new();
        for exrule in &event.recurrence.exrules {
            let ex_string = format!(
                "DTSTART:{}\nRRULE:{}\n",
                utc_stamp(seed),
                sanitize_rule(&exrule.raw)
            );
            let (ex_dates, _) = expand(&ex_string, floor, ceiling, limit)?;
            excluded.extend(ex_dates);
        }

        let occurrences = dates
            .into_iter()
            .filter(|d| !excluded.contains(d))
            .map(|d| Occurrence {
                start: start.with_naive(d),
                end: event
                    .end
                    .as_ref()
                    .and_then(|e| d.checked_add_signed(length).map(|v| e.with_naive(v))),
            })
            .filter(|occ| overlaps(occ, window))
            .collect();

        Ok(occurrences)
    }
}

fn utc_stamp(value: NaiveDateTime) -> String {
    value.format("%Y%m%dT%H%M%SZ").to_string()
}

fn to_rrule_tz(value: NaiveDateTime) -> DateTime<Tz> {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc).with_timezone(&Tz::UTC)
}

fn expand(
    rrule_string: &str,
    floor: NaiveDateTime,
    ceiling: NaiveDateTime,
    limit: u16,
) -> Result<(Vec<NaiveDateTime>, bool), ConvertError> {
    let set: RRuleSet = rrule_string
        .parse()
        .map_err(|e: rrule::RRuleError| ConvertError::Recurrence(e.to_string()))?;
    let result = set
        .after(to_rrule_tz(floor))
        .before(to_rrule_tz(ceiling))
        .all(limit);
    let dates = result.dates.iter().map(|d| d.naive_utc()).collect();
    Ok((dates, result.limited))
}

/// Strips a stray `RRULE:` prefix and makes UNTIL match the UTC DTSTART
/// the expansion is seeded with.
fn sanitize_rule(raw: &str) -> String {
    let clean = raw.trim();
    let mut rule = if clean.len() >= 6 && clean[..6].eq_ignore_ascii_case("RRULE:") {
        clean[6..].to_string()
    } else {
        clean.to_string()
    };

    if let Some(idx) = rule.to_uppercase().find("UNTIL=") {
        let value_start = idx + 6;
        let value_end = rule[value_start..]
            .find(';')
            .map(|i| value_start + i)
            .unwrap_or(rule.len());
        let value = rule[value_start..value_end].to_string();

        let upgraded = if value.len() == 8 && !value.contains('T') {
            Some(format!("{}T235959Z", value))
        } else if !value.ends_with('Z') {
            Some(format!("{}Z", value))
        } else {
            None
        };
        if let Some(new_value) = upgraded {
            rule.replace_range(value_start..value_end, &new_value);
        }
    }
    rule
}

/// Last calendar date an occurrence covers, treating a date-only or midnight end as exclusive.
fn last_covered_date(occ: &Occurrence) -> NaiveDate {
    let first = occ.start.date();
    let Some(end) = &occ.end else {
        return first;
    };
    let last = match end.hour_minute() {
        None | Some((0, 0)) => end.date().pred_opt().unwrap_or(first),
        Some(_) => end.date(),
    };
    last.max(first)
}

fn overlaps(occ: &Occurrence, window: &FilterWindow) -> bool {
    occ.start.date() <= window.end && last_covered_date(occ) >= window.start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::CalendarPoint;

    fn rule(s: &str) -> RecurrenceRule {
        s.parse().unwrap()
    }

    fn set_of(rules: &[&str]) -> RecurrenceSet {
        RecurrenceSet {
            rules: rules.iter().map(|r| rule(r)).collect(),
            ..Default::default()
        }
    }

    fn window() -> FilterWindow {
        FilterWindow::new(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        )
    }

    #[test]
    fn test_simple_recurrence() {
        assert!(is_simple_recurrence(&set_of(&["FREQ=DAILY"])));
        assert!(is_simple_recurrence(&set_of(&["FREQ=WEEKLY;INTERVAL=2"])));
        assert!(is_simple_recurrence(&set_of(&["FREQ=MONTHLY"])));
        assert!(is_simple_recurrence(&set_of(&["FREQ=YEARLY"])));
    }

    #[test]
    fn test_not_simple_recurrence() {
        assert!(!is_simple_recurrence(&set_of(&[])));
        assert!(!is_simple_recurrence(&set_of(&["FREQ=HOURLY"])));
        assert!(!is_simple_recurrence(&set_of(&["FREQ=DAILY;COUNT=5"])));
        assert!(!is_simple_recurrence(&set_of(&["FREQ=DAILY;UNTIL=20241231"])));
        assert!(!is_simple_recurrence(&set_of(&["FREQ=DAILY", "FREQ=WEEKLY"])));

        let mut with_exrule = set_of(&["FREQ=DAILY"]);
        with_exrule.exrules.push(rule("FREQ=WEEKLY"));
        assert!(!is_simple_recurrence(&with_exrule));

        let mut with_exdate = set_of(&["FREQ=DAILY"]);
        with_exdate
            .exdates
            .push(CalendarPoint::from_ymd(2024, 6, 3).unwrap());
        assert!(!is_simple_recurrence(&with_exdate));
    }

    #[test]
    fn test_repeater_clause() {
        assert_eq!(repeater_clause(&rule("FREQ=WEEKLY;INTERVAL=2")), "+2w");
        assert_eq!(repeater_clause(&rule("FREQ=DAILY")), "+1d");
        assert_eq!(repeater_clause(&rule("FREQ=MONTHLY;INTERVAL=3")), "+3m");
        assert_eq!(repeater_clause(&rule("FREQ=YEARLY")), "+1y");
    }

    #[test]
    fn test_sanitize_rule() {
        assert_eq!(
            sanitize_rule("RRULE:FREQ=DAILY;UNTIL=20241231"),
            "FREQ=DAILY;UNTIL=20241231T235959Z"
        );
        assert_eq!(
            sanitize_rule("FREQ=DAILY;UNTIL=20241231T100000;COUNT=2"),
            "FREQ=DAILY;UNTIL=20241231T100000Z;COUNT=2"
        );
        assert_eq!(
            sanitize_rule("FREQ=DAILY;UNTIL=20241231T100000Z"),
            "FREQ=DAILY;UNTIL=20241231T100000Z"
        );
    }

    #[test]
    fn test_occurrences_within_window() {
        let event = CalendarEvent {
            uid: "count".to_string(),
            start: CalendarPoint::from_ymd_hm(2024, 5, 28, 9, 0),
            end: CalendarPoint::from_ymd_hm(2024, 5, 28, 10, 0),
            recurrence: set_of(&["FREQ=DAILY;COUNT=6"]),
            ..Default::default()
        };
        let occs = RecurrenceEngine::occurrences(&event, &window(), 100).unwrap();
        // May 28..June 2; only June 1 and 2 fall inside the window.
        assert_eq!(occs.len(), 2);
        assert_eq!(occs[0].start, CalendarPoint::from_ymd_hm(2024, 6, 1, 9, 0).unwrap());
        assert_eq!(
            occs[1].end,
            Some(CalendarPoint::from_ymd_hm(2024, 6, 2, 10, 0).unwrap())
        );
    }

    #[test]
    fn test_occurrences_keep_date_shape_and_exdates() {
        let mut recurrence = set_of(&["FREQ=WEEKLY;UNTIL=20240630"]);
        recurrence
            .exdates
            .push(CalendarPoint::from_ymd(2024, 6, 8).unwrap());
        let event = CalendarEvent {
            uid: "weekly".to_string(),
            start: CalendarPoint::from_ymd(2024, 6, 1),
            end: CalendarPoint::from_ymd(2024, 6, 2),
            recurrence,
            ..Default::default()
        };
        let occs = RecurrenceEngine::occurrences(&event, &window(), 100).unwrap();
        let starts: Vec<NaiveDate> = occs.iter().map(|o| o.start.date()).collect();
        assert_eq!(
            starts,
            vec![
                NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 22).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 29).unwrap(),
            ]
        );
        assert!(occs.iter().all(|o| !o.start.has_time()));
    }

    #[test]
    fn test_occurrences_subtract_exrule() {
        let mut recurrence = set_of(&["FREQ=DAILY;UNTIL=20240607"]);
        recurrence.exrules.push(rule("FREQ=DAILY;INTERVAL=2"));
        let event = CalendarEvent {
            uid: "exrule".to_string(),
            start: CalendarPoint::from_ymd_hm(2024, 6, 1, 8, 0),
            recurrence,
            ..Default::default()
        };
        let occs = RecurrenceEngine::occurrences(&event, &window(), 100).unwrap();
        let days: Vec<u32> = occs
            .iter()
            .map(|o| chrono::Datelike::day(&o.start.date()))
            .collect();
        assert_eq!(days, vec![2, 4, 6]);
    }

    #[test]
    fn test_occurrences_tzid_label_is_kept() {
        let event = CalendarEvent {
            uid: "tz".to_string(),
            start: CalendarPoint::from_ymd_hm(2024, 6, 3, 9, 0).map(|p| p.with_tzid("Asia/Tokyo")),
            recurrence: set_of(&["FREQ=DAILY;COUNT=1"]),
            ..Default::default()
        };
        let occs = RecurrenceEngine::occurrences(&event, &window(), 100).unwrap();
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].start.tzid(), Some("Asia/Tokyo"));
    }

    #[test]
    fn test_malformed_rule_is_an_error() {
        let event = CalendarEvent {
            uid: "bad".to_string(),
            start: CalendarPoint::from_ymd_hm(2024, 6, 1, 8, 0),
            recurrence: set_of(&["FREQ=DAILY;BYHOUR=99"]),
            ..Default::default()
        };
        assert!(matches!(
            RecurrenceEngine::occurrences(&event, &window(), 100),
            Err(ConvertError::Recurrence(_))
        ));
    }
}
