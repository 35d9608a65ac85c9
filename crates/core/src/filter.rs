use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceTreeError};

/// Inclusive time window over span start times.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn all() -> Self {
        Self {
            since: None,
            until: None,
        }
    }

    pub fn new(since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Result<Self> {
        if let (Some(since), Some(until)) = (since, until)
            && since > until
        {
            return Err(TraceTreeError::InvalidArgument(format!(
                "window start {since} is after window end {until}"
            )));
        }
        Ok(Self { since, until })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if let Some(since) = self.since
            && ts < since
        {
            return false;
        }
        if let Some(until) = self.until
            && ts > until
        {
            return false;
        }
        true
    }

    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn window_bounds_are_inclusive() {
        let t0 = Utc.with_ymd_and_hms(2024, 2, 5, 15, 0, 0).unwrap();
        let t1 = t0 + Duration::hours(1);
        let window = TimeWindow::new(Some(t0), Some(t1)).unwrap();
        assert!(window.contains(t0));
        assert!(window.contains(t1));
        assert!(!window.contains(t0 - Duration::seconds(1)));
        assert!(!window.contains(t1 + Duration::seconds(1)));
        assert!(!window.is_unbounded());
        assert!(TimeWindow::all().contains(t0));
    }

    #[test]
    fn rejects_inverted_window() {
        let t0 = Utc.with_ymd_and_hms(2024, 2, 5, 15, 0, 0).unwrap();
        assert!(TimeWindow::new(Some(t0), Some(t0 - Duration::minutes(1))).is_err());
    }
}
