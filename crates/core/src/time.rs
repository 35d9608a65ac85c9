use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{Result, TraceTreeError};
use crate::filter::TimeWindow;

/// Accepts an RFC3339 timestamp or a humantime duration counted back from `now`.
pub fn parse_instant(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(duration) = humantime::parse_duration(input) {
        return Ok(now - to_chrono(duration)?);
    }

    Err(TraceTreeError::Parse(format!(
        "expected RFC3339 time or duration, got {input}"
    )))
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| TraceTreeError::Parse(format!("invalid duration {input}: {e}")))
}

/// Resolves the data window of one aggregation run.
///
/// With no explicit `since`, the window starts `default_lookback` before
/// `now` when one is configured, and is open otherwise.
pub fn resolve_window(
    since: Option<&str>,
    until: Option<&str>,
    default_lookback: Option<Duration>,
    now: DateTime<Utc>,
) -> Result<TimeWindow> {
    let since = match (since, default_lookback) {
        (Some(raw), _) => Some(parse_instant(raw, now)?),
        (None, Some(lookback)) => Some(now - to_chrono(lookback)?),
        (None, None) => None,
    };
    let until = until.map(|raw| parse_instant(raw, now)).transpose()?;
    TimeWindow::new(since, until)
}

fn to_chrono(duration: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|e| TraceTreeError::Parse(format!("duration out of range: {e}")))
}
