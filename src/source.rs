use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceEvent {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<Tz>>,
    pub end: Option<DateTime<Tz>>,
    /// Only consulted when `end` is absent.
    pub duration: Option<TimeDelta>,
    pub location: Option<String>,
    pub attendees: Option<Vec<AttendeeRef>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendeeRef {
    pub address: String,
    pub display_name: Option<String>,
}

impl AttendeeRef {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: None,
        }
    }

    pub fn with_name(address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: Some(display_name.into()),
        }
    }
}
