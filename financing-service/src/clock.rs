//! Time source and whole-day arithmetic.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::sync::Mutex;

const SECONDS_PER_DAY: i64 = 86_400;

/// Source of "now", injected so lifecycle transitions are reproducible.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to an instant that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Round a span up to whole days. Negative spans round toward zero, so
/// "a few hours ago" is day 0 and "yesterday" is day -1.
pub fn ceil_days(span: Duration) -> i64 {
    let secs = span.num_seconds();
    let days = secs.div_euclid(SECONDS_PER_DAY);
    if secs.rem_euclid(SECONDS_PER_DAY) > 0 {
        days + 1
    } else {
        days
    }
}

/// `ceil((due_date − now) / 1 day)`, with the due date taken at 00:00 UTC.
pub fn days_until(due_date: NaiveDate, now: DateTime<Utc>) -> i64 {
    let due = due_date.and_time(NaiveTime::MIN).and_utc();
    ceil_days(due - now)
}
