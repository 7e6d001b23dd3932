use crate::TimeSource;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time source: milliseconds since 1970-01-01 UTC.
///
/// Backed by [`SystemTime`], so it follows NTP steps and manual adjustments,
/// including backwards ones. A Snowflake generator driven by this clock fails
/// fast with [`Error::ClockRegressed`](crate::Error::ClockRegressed) rather
/// than reuse a timestamp; keep the host clock slewing, not stepping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_millis(&self) -> i64 {
        // A host clock before 1970 reads as the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
            })
    }
}
