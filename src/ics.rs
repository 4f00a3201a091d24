use std::io::Cursor;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use ical::IcalParser;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{ics_error, Error, Result};
use crate::graph::read_body;
use crate::source::{AttendeeRef, SourceEvent};

/// Reads an iCalendar document from a local path or an `http(s)` URL.
pub async fn load_ics(source: &str, http: &Client) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        debug!(url = source, "Fetching iCalendar document");
        let response = http.get(source).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = read_body(response).await;
            return Err(Error::RemoteApi {
                status: status.as_u16(),
                code: None,
                message,
            });
        }
        Ok(response.text().await?)
    } else {
        debug!(path = source, "Reading iCalendar document");
        Ok(tokio::fs::read_to_string(source).await?)
    }
}

/// Turns every `VEVENT` in `text` into a [`SourceEvent`], in document order.
///
/// Floating and date-only times are read in `default_tz`.
pub fn parse_ics(text: &str, default_tz: Tz) -> Result<Vec<SourceEvent>> {
    let parser = IcalParser::new(Cursor::new(text.as_bytes()));

    let mut events = Vec::new();
    for calendar in parser {
        let calendar = calendar.map_err(|e| ics_error(&format!("malformed calendar: {e:?}")))?;
        for ical_event in calendar.events {
            events.push(source_event(ical_event, default_tz)?);
        }
    }

    Ok(events)
}

fn source_event(ical_event: IcalEvent, default_tz: Tz) -> Result<SourceEvent> {
    let mut event = SourceEvent::default();

    for property in ical_event.properties {
        match property.name.to_ascii_uppercase().as_str() {
            "SUMMARY" => event.summary = property.value.as_deref().map(unescape_text),
            "DESCRIPTION" => event.description = property.value.as_deref().map(unescape_text),
            "LOCATION" => event.location = property.value.as_deref().map(unescape_text),
            "DTSTART" => event.start = Some(parse_date_time(&property, default_tz)?),
            "DTEND" => event.end = Some(parse_date_time(&property, default_tz)?),
            "DURATION" => {
                let value = property.value.as_deref().unwrap_or_default();
                event.duration = Some(parse_duration(value)?);
            }
            "ATTENDEE" => {
                let attendee = AttendeeRef {
                    address: property.value.clone().unwrap_or_default(),
                    display_name: param(&property, "CN").map(str::to_string),
                };
                event.attendees.get_or_insert_with(Vec::new).push(attendee);
            }
            _ => {}
        }
    }

    Ok(event)
}

/// Value of parameter `name`, with surrounding quotes removed.
fn param<'a>(property: &'a Property, name: &str) -> Option<&'a str> {
    property.params.as_ref()?.iter().find_map(|(key, values)| {
        if key.eq_ignore_ascii_case(name) {
            values.first().map(|v| v.trim_matches('"'))
        } else {
            None
        }
    })
}

fn parse_date_time(property: &Property, default_tz: Tz) -> Result<DateTime<Tz>> {
    let value = property
        .value
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| ics_error(&format!("{} has no value", property.name)))?;

    let is_date = param(property, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || value.len() == 8;
    if is_date {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d")
            .map_err(|e| ics_error(&format!("invalid date {value}: {e}")))?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| ics_error(&format!("invalid date {value}")))?;
        return localize(default_tz, midnight, value);
    }

    if let Some(utc_value) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc_value, "%Y%m%dT%H%M%S")
            .map_err(|e| ics_error(&format!("invalid date-time {value}: {e}")))?;
        return Ok(Tz::UTC.from_utc_datetime(&naive));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .map_err(|e| ics_error(&format!("invalid date-time {value}: {e}")))?;
    let tz = match param(property, "TZID") {
        Some(tzid) => resolve_tzid(tzid).unwrap_or_else(|| {
            warn!(tzid, default = %default_tz.name(), "Unknown TZID, using default zone");
            default_tz
        }),
        None => default_tz,
    };
    localize(tz, naive, value)
}

fn localize(tz: Tz, naive: NaiveDateTime, raw: &str) -> Result<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| ics_error(&format!("{raw} does not exist in {}", tz.name())))
}

/// Resolves an IANA zone name or a Windows zone name as emitted by Outlook.
pub fn resolve_tzid(tzid: &str) -> Option<Tz> {
    let tzid = tzid.trim().trim_start_matches('/');
    tzid.parse::<Tz>().ok().or_else(|| map_windows_zone(tzid))
}

pub fn map_windows_zone(name: &str) -> Option<Tz> {
    match name {
        "Alaskan Standard Time" => Some(Tz::America__Anchorage),
        "Atlantic Standard Time" => Some(Tz::America__Halifax),
        "AUS Eastern Standard Time" => Some(Tz::Australia__Sydney),
        "Central America Standard Time" => Some(Tz::America__Guatemala),
        "Central Europe Standard Time" => Some(Tz::Europe__Budapest),
        "Central European Standard Time" => Some(Tz::Europe__Warsaw),
        "Central Standard Time" => Some(Tz::America__Chicago),
        "China Standard Time" => Some(Tz::Asia__Shanghai),
        "E. South America Standard Time" => Some(Tz::America__Sao_Paulo),
        "Eastern Standard Time" => Some(Tz::America__New_York),
        "GMT Standard Time" => Some(Tz::Europe__London),
        "Greenwich Standard Time" => Some(Tz::Atlantic__Reykjavik),
        "GTB Standard Time" => Some(Tz::Europe__Bucharest),
        "Hawaiian Standard Time" => Some(Tz::Pacific__Honolulu),
        "India Standard Time" => Some(Tz::Asia__Kolkata),
        "Mountain Standard Time" => Some(Tz::America__Denver),
        "Pacific Standard Time" => Some(Tz::America__Los_Angeles),
        "Romance Standard Time" => Some(Tz::Europe__Paris),
        "Russian Standard Time" => Some(Tz::Europe__Moscow),
        "SA Pacific Standard Time" => Some(Tz::America__Bogota),
        "Singapore Standard Time" => Some(Tz::Asia__Singapore),
        "Tokyo Standard Time" => Some(Tz::Asia__Tokyo),
        "US Mountain Standard Time" => Some(Tz::America__Phoenix),
        "UTC" | "Coordinated Universal Time" => Some(Tz::UTC),
        "W. Europe Standard Time" => Some(Tz::Europe__Berlin),
        _ => None,
    }
}

/// Parses an RFC 5545 `DURATION` such as `PT1H30M`, `P2D` or `-PT15M`.
pub fn parse_duration(value: &str) -> Result<TimeDelta> {
    let value = value.trim();
    let (negative, unsigned) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };

    let parsed = iso8601::duration(unsigned)
        .map_err(|e| ics_error(&format!("invalid duration {value}: {e}")))?;

    let delta = match parsed {
        iso8601::Duration::Weeks(weeks) => TimeDelta::weeks(i64::from(weeks)),
        iso8601::Duration::YMDHMS {
            year,
            month,
            day,
            hour,
            minute,
            second,
            millisecond,
        } => {
            if year != 0 || month != 0 {
                return Err(ics_error(&format!(
                    "duration {value} uses years or months, which have no fixed length"
                )));
            }
            TimeDelta::days(i64::from(day))
                + TimeDelta::hours(i64::from(hour))
                + TimeDelta::minutes(i64::from(minute))
                + TimeDelta::seconds(i64::from(second))
                + TimeDelta::milliseconds(i64::from(millisecond))
        }
    };

    Ok(if negative { -delta } else { delta })
}

/// Decodes RFC 5545 TEXT escapes.
fn unescape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
