/// The outcome of a single, non-blocking generation attempt.
///
/// Returned by [`SnowflakeIdGenerator::try_poll_id`]. Callers that cannot
/// afford to spin inside the generator can drive their own backoff from it.
///
/// # Example
///
/// ```
/// use spinflake::{IdGenStatus, SnowflakeIdGenerator, SnowflakeLayout};
///
/// let layout = SnowflakeLayout::new(10, 0).unwrap();
/// let generator = SnowflakeIdGenerator::with_layout(layout, 1, 0, || 42_i64).unwrap();
///
/// assert!(matches!(generator.try_poll_id(), Ok(IdGenStatus::Ready { .. })));
/// // A zero-width sequence allows one id per millisecond.
/// assert_eq!(generator.try_poll_id(), Ok(IdGenStatus::Pending { yield_for: 1 }));
/// ```
///
/// [`SnowflakeIdGenerator::try_poll_id`]: crate::SnowflakeIdGenerator::try_poll_id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGenStatus {
    /// A unique id was committed and is ready to use.
    Ready {
        /// The generated id.
        id: i64,
    },
    /// No id was committed on this attempt.
    Pending {
        /// Milliseconds to wait before the next attempt can succeed: `1` when
        /// the sequence is exhausted for the current millisecond, `0` when the
        /// attempt lost a race to another thread and may retry immediately.
        yield_for: i64,
    },
}

impl IdGenStatus {
    /// Returns the id if one was committed.
    pub fn ready(self) -> Option<i64> {
        match self {
            Self::Ready { id } => Some(id),
            Self::Pending { .. } => None,
        }
    }
}
