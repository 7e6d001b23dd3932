/// Custom epoch: Wednesday, January 1, 2025 00:00:00 UTC
pub const CUSTOM_EPOCH_MS: i64 = 1_735_689_600_000;

/// Twitter epoch: Thursday, November 4, 2010 1:42:54.657 UTC
pub const TWITTER_EPOCH_MS: i64 = 1_288_834_974_657;

/// Discord epoch: Thursday, January 1, 2015 00:00:00 UTC
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Instagram epoch: Saturday, January 1, 2011 00:00:00 UTC
pub const INSTAGRAM_EPOCH_MS: i64 = 1_293_840_000_000;

/// Standard UNIX epoch: Thursday, January 1, 1970 00:00:00 UTC
pub const UNIX_EPOCH_MS: i64 = 0;

/// A source of milliseconds since a fixed epoch.
///
/// Readings are expected to be monotonic in the common case but the generator
/// does not assume it: a reading older than the last committed timestamp is
/// reported as [`Error::ClockRegressed`](crate::Error::ClockRegressed).
///
/// Closures returning `i64` are time sources, which keeps mocks short:
///
/// ```
/// use spinflake::TimeSource;
///
/// let fixed = || 1234_i64;
/// assert_eq!(fixed.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since the source's epoch.
    fn current_millis(&self) -> i64;
}

impl<F> TimeSource for F
where
    F: Fn() -> i64,
{
    fn current_millis(&self) -> i64 {
        self()
    }
}
