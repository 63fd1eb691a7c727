//! Polling window: the trailing interval a single pass asks the provider about.

use chrono::{DateTime, Duration, Utc};

/// Timestamp format the provider's query language expects.
const QUERY_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";

/// A closed time interval `[start, end]` in UTC.
///
/// Computed fresh at the start of every pass, never at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The interval of length `length` ending at `now`.
    pub fn trailing(now: DateTime<Utc>, length: Duration) -> Self {
        Self {
            start: now - length,
            end: now,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    /// Render as an activity-feed filter on `last_event_time`.
    pub fn to_activity_query(&self) -> String {
        format!(
            "last_event_time BETWEEN TIMESTAMP \"{}\" AND TIMESTAMP \"{}\"",
            self.start.format(QUERY_TIMESTAMP_FORMAT),
            self.end.format(QUERY_TIMESTAMP_FORMAT),
        )
    }
}
