use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{invalid_argument, Result};
use crate::models::{
    Attendee, AttendeeType, BodyType, DateTimeTimeZone, EmailAddress, ItemBody, Location,
    RemoteEvent,
};
use crate::source::{AttendeeRef, SourceEvent};

pub const NO_SUBJECT: &str = "(No Subject)";
pub const WIRE_TIME_ZONE: &str = "UTC";

const WIRE_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const MAILTO_PREFIX: &str = "mailto:";

/// Translates a source event into the payload the calendar service expects.
///
/// `now` stands in for a missing start; callers pass `Utc::now()`.
pub fn to_remote_event(event: &SourceEvent, now: DateTime<Utc>) -> Result<RemoteEvent> {
    let (start, end) = resolve_window(event, now)?;

    Ok(RemoteEvent {
        subject: event
            .summary
            .clone()
            .unwrap_or_else(|| NO_SUBJECT.to_string()),
        body: ItemBody {
            content_type: BodyType::Text,
            content: event.description.clone().unwrap_or_default(),
        },
        start: wire_date_time(start),
        end: wire_date_time(end),
        location: Location {
            display_name: event.location.clone().unwrap_or_default(),
        },
        attendees: event
            .attendees
            .as_deref()
            .map(convert_attendees)
            .unwrap_or_default(),
        is_online_meeting: false,
    })
}

/// Resolves the UTC start and end instants of `event`.
///
/// End falls back to `start + duration` for a non-zero duration, then to one hour.
pub fn resolve_window(
    event: &SourceEvent,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = event
        .start
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);

    let end = match (event.end, event.duration) {
        (Some(end), _) => end.with_timezone(&Utc),
        (None, Some(duration)) if !duration.is_zero() => start
            .checked_add_signed(duration)
            .ok_or_else(|| invalid_argument("event duration overflows the end instant"))?,
        _ => start
            .checked_add_signed(TimeDelta::hours(1))
            .ok_or_else(|| invalid_argument("event start is out of range"))?,
    };

    Ok((start, end))
}

pub fn wire_date_time(instant: DateTime<Utc>) -> DateTimeTimeZone {
    DateTimeTimeZone {
        date_time: instant.format(WIRE_DATE_TIME_FORMAT).to_string(),
        time_zone: WIRE_TIME_ZONE.to_string(),
    }
}

/// Strips a leading `mailto:` in any letter case; other addresses pass through.
pub fn strip_mailto(address: &str) -> &str {
    match address.get(..MAILTO_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(MAILTO_PREFIX) => {
            &address[MAILTO_PREFIX.len()..]
        }
        _ => address,
    }
}

fn convert_attendees(attendees: &[AttendeeRef]) -> Vec<Attendee> {
    attendees.iter().filter_map(convert_attendee).collect()
}

fn convert_attendee(attendee: &AttendeeRef) -> Option<Attendee> {
    let email = strip_mailto(&attendee.address);
    if email.trim().is_empty() {
        return None;
    }

    let name = attendee
        .display_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(email);

    Some(Attendee {
        email_address: EmailAddress {
            address: email.to_string(),
            name: name.to_string(),
        },
        attendee_type: AttendeeType::Required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_no_subject_scenario() {
        let event = SourceEvent {
            summary: None,
            start: Some(utc(2025, 11, 1, 10, 59)),
            end: Some(utc(2025, 11, 1, 11, 59)),
            attendees: Some(vec![AttendeeRef::new("mailto:a@b.com")]),
            ..Default::default()
        };

        let remote = to_remote_event(&event, now()).unwrap();
        assert_eq!(remote.subject, "(No Subject)");
        assert_eq!(remote.start.date_time, "2025-11-01T10:59:00");
        assert_eq!(remote.end.date_time, "2025-11-01T11:59:00");
        assert_eq!(remote.attendees.len(), 1);
        assert_eq!(remote.attendees[0].email_address.address, "a@b.com");
        assert_eq!(remote.attendees[0].email_address.name, "a@b.com");
        assert_eq!(remote.attendees[0].attendee_type, AttendeeType::Required);
        assert!(!remote.is_online_meeting);
    }

    #[test]
    fn test_start_only_defaults_to_one_hour() {
        let event = SourceEvent {
            summary: Some("Sync".to_string()),
            start: Some(utc(2025, 11, 1, 23, 30)),
            ..Default::default()
        };

        let remote = to_remote_event(&event, now()).unwrap();
        assert_eq!(remote.start.date_time, "2025-11-01T23:30:00");
        assert_eq!(remote.end.date_time, "2025-11-02T00:30:00");
        assert_eq!(remote.start.time_zone, "UTC");
        assert_eq!(remote.end.time_zone, "UTC");
    }

    #[test]
    fn test_duration_used_when_end_missing() {
        let event = SourceEvent {
            start: Some(utc(2025, 11, 1, 10, 0)),
            duration: Some(TimeDelta::minutes(45)),
            ..Default::default()
        };

        let (start, end) = resolve_window(&event, now()).unwrap();
        assert_eq!(end - start, TimeDelta::minutes(45));
    }

    #[test]
    fn test_zero_duration_falls_back_to_one_hour() {
        let event = SourceEvent {
            start: Some(utc(2025, 11, 1, 10, 0)),
            duration: Some(TimeDelta::zero()),
            ..Default::default()
        };

        let (start, end) = resolve_window(&event, now()).unwrap();
        assert_eq!(end - start, TimeDelta::hours(1));
    }

    #[test]
    fn test_explicit_end_wins_over_duration() {
        let event = SourceEvent {
            start: Some(utc(2025, 11, 1, 10, 0)),
            end: Some(utc(2025, 11, 1, 10, 15)),
            duration: Some(TimeDelta::hours(3)),
            ..Default::default()
        };

        let (_, end) = resolve_window(&event, now()).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 11, 1, 10, 15, 0).unwrap());
    }

    #[test]
    fn test_missing_start_uses_now() {
        let event = SourceEvent::default();

        let (start, end) = resolve_window(&event, now()).unwrap();
        assert_eq!(start, now());
        assert_eq!(end, now() + TimeDelta::hours(1));
    }

    #[test]
    fn test_zoned_times_are_rendered_in_utc() {
        let berlin = chrono_tz::Europe::Berlin;
        let event = SourceEvent {
            start: Some(berlin.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap()),
            end: Some(berlin.with_ymd_and_hms(2025, 7, 1, 10, 30, 0).unwrap()),
            ..Default::default()
        };

        let remote = to_remote_event(&event, now()).unwrap();
        assert_eq!(remote.start.date_time, "2025-07-01T07:00:00");
        assert_eq!(remote.end.date_time, "2025-07-01T08:30:00");
    }

    #[test]
    fn test_sub_second_precision_is_dropped() {
        let instant = Utc.with_ymd_and_hms(2025, 11, 1, 10, 59, 7).unwrap()
            + TimeDelta::milliseconds(250);

        assert_eq!(wire_date_time(instant).date_time, "2025-11-01T10:59:07");
    }

    #[test]
    fn test_defaults_for_missing_text_fields() {
        let remote = to_remote_event(&SourceEvent::default(), now()).unwrap();

        assert_eq!(remote.body.content_type, BodyType::Text);
        assert_eq!(remote.body.content, "");
        assert_eq!(remote.location.display_name, "");
        assert!(remote.attendees.is_empty());
    }

    #[test]
    fn test_empty_summary_is_kept() {
        let event = SourceEvent {
            summary: Some(String::new()),
            description: Some("Agenda".to_string()),
            location: Some("Room 4".to_string()),
            ..Default::default()
        };

        let remote = to_remote_event(&event, now()).unwrap();
        assert_eq!(remote.subject, "");
        assert_eq!(remote.body.content, "Agenda");
        assert_eq!(remote.location.display_name, "Room 4");
    }

    #[test]
    fn test_strip_mailto() {
        assert_eq!(strip_mailto("mailto:a@b.com"), "a@b.com");
        assert_eq!(strip_mailto("MAILTO:a@b.com"), "a@b.com");
        assert_eq!(strip_mailto("MailTo:a@b.com"), "a@b.com");
        assert_eq!(strip_mailto("a@b.com"), "a@b.com");
        assert_eq!(strip_mailto("mailto:"), "");
        assert_eq!(strip_mailto("mail"), "mail");
        assert_eq!(strip_mailto(" mailto:a@b.com"), " mailto:a@b.com");
        assert_eq!(strip_mailto("ümlaut@b.com"), "ümlaut@b.com");
    }

    #[test]
    fn test_blank_attendees_are_skipped_in_order() {
        let event = SourceEvent {
            attendees: Some(vec![
                AttendeeRef::with_name("mailto:first@b.com", "First"),
                AttendeeRef::new("mailto:"),
                AttendeeRef::new("   "),
                AttendeeRef::with_name("second@b.com", "  "),
                AttendeeRef::new("MAILTO:   "),
                AttendeeRef::new("mailto:first@b.com"),
            ]),
            ..Default::default()
        };

        let remote = to_remote_event(&event, now()).unwrap();
        let pairs: Vec<(&str, &str)> = remote
            .attendees
            .iter()
            .map(|a| (a.email_address.address.as_str(), a.email_address.name.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("first@b.com", "First"),
                ("second@b.com", "second@b.com"),
                ("first@b.com", "first@b.com"),
            ]
        );
    }

    #[test]
    fn test_source_event_is_not_mutated() {
        let event = SourceEvent {
            summary: None,
            attendees: Some(vec![AttendeeRef::new("mailto:a@b.com")]),
            ..Default::default()
        };
        let before = event.clone();

        to_remote_event(&event, now()).unwrap();
        assert_eq!(event, before);
    }
}
