use core::{cmp, fmt};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, IdGenStatus, PaddedAtomicI64, Result, SnowflakeLayout, SnowflakeParts, SystemClock,
    TimeSource,
    interrupt::{Cancellation, CurrentThread},
};

/// A lock-free Snowflake id generator.
///
/// The whole generator state is one packed `(timestamp, sequence)` value held
/// in a [`PaddedAtomicI64`]. Every successful generation commits exactly one
/// new packed value through a compare-and-exchange, which is the single
/// linearization point: two callers can never commit the same value, and a
/// caller that loses the race simply re-reads and tries again. The node id is
/// fixed per instance and OR'd into the committed value on the way out.
///
/// Ids are non-negative `i64`s laid out as described by [`SnowflakeLayout`].
///
/// ## Features
/// - ✅ Thread-safe, shareable by reference across any number of threads
/// - ✅ Never blocks or sleeps; spins with a CPU pause hint only while the
///   sequence for the current millisecond is exhausted
/// - ✅ Fails fast on clock regression instead of reusing timestamps
///
/// ## Caveats
/// While spinning, the caller burns a core for at most the remainder of the
/// current millisecond. A scheduler that deschedules a spinning thread for
/// longer stretches that window; pin latency-critical callers accordingly.
///
/// # Example
///
/// ```
/// use spinflake::{DISCORD_EPOCH_MS, SnowflakeIdGenerator, SystemClock};
///
/// let generator = SnowflakeIdGenerator::new(7, DISCORD_EPOCH_MS, SystemClock).unwrap();
///
/// let a = generator.next_id().unwrap();
/// let b = generator.next_id().unwrap();
/// assert!(a >= 0 && a < b);
/// assert_eq!(generator.decode(b).node_id, 7);
/// ```
pub struct SnowflakeIdGenerator<T = SystemClock>
where
    T: TimeSource,
{
    state: PaddedAtomicI64,
    node_bits: i64,
    timestamp_offset_ms: i64,
    layout: SnowflakeLayout,
    time: T,
}

impl SnowflakeIdGenerator<SystemClock> {
    /// Creates a generator for `node_id` on the wall clock with a zero offset,
    /// using the process-wide layout.
    ///
    /// # Errors
    ///
    /// [`Error::NodeIdOutOfRange`] if `node_id` does not fit the layout.
    pub fn with_node_id(node_id: i64) -> Result<Self> {
        Self::new(node_id, 0, SystemClock)
    }
}

impl<T> SnowflakeIdGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator using the process-wide
    /// [`SnowflakeLayout::global`].
    ///
    /// # Parameters
    ///
    /// - `node_id`: identity of the node, encoded into every id.
    /// - `timestamp_offset_ms`: subtracted from every clock reading so the
    ///   41-bit timestamp covers about 69 years from this point rather than
    ///   from the time source's own epoch. Must not lie in the future.
    /// - `time`: the [`TimeSource`] consulted on every attempt.
    ///
    /// # Errors
    ///
    /// - [`Error::NodeIdOutOfRange`] if `node_id` is negative or above
    ///   [`SnowflakeLayout::max_node_id`]
    /// - [`Error::NegativeOffset`] if `timestamp_offset_ms < 0`
    /// - [`Error::OffsetInFuture`] if `timestamp_offset_ms` is past the time
    ///   source's current reading
    ///
    /// # Panics
    ///
    /// See [`SnowflakeLayout::global`].
    pub fn new(node_id: i64, timestamp_offset_ms: i64, time: T) -> Result<Self> {
        Self::with_layout(*SnowflakeLayout::global(), node_id, timestamp_offset_ms, time)
    }

    /// Creates a generator with an explicit layout instead of the process-wide
    /// one.
    ///
    /// Every generator minting ids into the same namespace must share a layout;
    /// ids from differently laid out generators do not compare meaningfully.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn with_layout(
        layout: SnowflakeLayout,
        node_id: i64,
        timestamp_offset_ms: i64,
        time: T,
    ) -> Result<Self> {
        if !(0..=layout.max_node_id()).contains(&node_id) {
            return Err(Error::NodeIdOutOfRange {
                node_id,
                max: layout.max_node_id(),
            });
        }

        if timestamp_offset_ms < 0 {
            return Err(Error::NegativeOffset {
                offset_ms: timestamp_offset_ms,
            });
        }

        let now_ms = time.current_millis();
        if timestamp_offset_ms > now_ms {
            return Err(Error::OffsetInFuture {
                offset_ms: timestamp_offset_ms,
                now_ms,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            node_id,
            timestamp_offset_ms,
            node_id_bits = layout.node_id_bits(),
            sequence_bits = layout.sequence_bits(),
            "created snowflake generator"
        );

        Ok(Self {
            state: PaddedAtomicI64::default(),
            node_bits: node_id << layout.sequence_bits(),
            timestamp_offset_ms,
            layout,
            time,
        })
    }

    /// The node id encoded into every id.
    pub fn node_id(&self) -> i64 {
        self.node_bits >> self.layout.sequence_bits()
    }

    /// Milliseconds subtracted from every clock reading.
    pub fn timestamp_offset_ms(&self) -> i64 {
        self.timestamp_offset_ms
    }

    pub fn layout(&self) -> SnowflakeLayout {
        self.layout
    }

    /// Decodes an id minted by this generator, with the offset added back so
    /// the timestamp is in the time source's own epoch.
    pub fn decode(&self, id: i64) -> SnowflakeParts {
        let mut parts = self.layout.decode(id);
        parts.timestamp_ms += self.timestamp_offset_ms;
        parts
    }

    /// Generates the next id, spinning while the sequence for the current
    /// millisecond is exhausted.
    ///
    /// Before every retry the calling thread's interrupt flag (see
    /// [`crate::interrupt`]) is checked.
    ///
    /// # Errors
    ///
    /// - [`Error::ClockRegressed`] if the time source went backwards
    /// - [`Error::Cancelled`] if the calling thread was interrupted while
    ///   waiting to retry
    pub fn next_id(&self) -> Result<i64> {
        self.next_id_with(&CurrentThread)
    }

    /// Like [`Self::next_id`], polling `cancel` instead of the calling thread's
    /// interrupt flag.
    ///
    /// # Errors
    ///
    /// Same as [`Self::next_id`].
    pub fn next_id_with<C>(&self, cancel: &C) -> Result<i64>
    where
        C: Cancellation + ?Sized,
    {
        loop {
            match self.try_poll_id()? {
                IdGenStatus::Ready { id } => return Ok(id),
                IdGenStatus::Pending { .. } => {
                    if cancel.is_cancelled() {
                        return Err(Self::cold_cancelled());
                    }
                    core::hint::spin_loop();
                }
            }
        }
    }

    /// Makes a single generation attempt without waiting.
    ///
    /// # Returns
    /// - `Ok(IdGenStatus::Ready { id })`: an id was committed
    /// - `Ok(IdGenStatus::Pending { yield_for: 1 })`: the sequence is
    ///   exhausted until the clock ticks
    /// - `Ok(IdGenStatus::Pending { yield_for: 0 })`: another thread won the
    ///   race; retry immediately
    ///
    /// # Errors
    ///
    /// [`Error::ClockRegressed`] if the time source reads earlier than the last
    /// committed timestamp. The state is left untouched.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_poll_id(&self) -> Result<IdGenStatus> {
        // Register before clock: a reading taken first could be overtaken by a
        // newer commit and look like a regression.
        let current = self.state.get_opaque();
        let now = self
            .time
            .current_millis()
            .saturating_sub(self.timestamp_offset_ms);

        let shift = self.layout.timestamp_shift();
        let current_ts = ((current as u64) >> shift) as i64;

        let next = match now.cmp(&current_ts) {
            cmp::Ordering::Greater => now << shift,
            cmp::Ordering::Equal => {
                if current & self.layout.sequence_mask() < self.layout.max_sequence() {
                    current + 1
                } else {
                    return Ok(IdGenStatus::Pending { yield_for: 1 });
                }
            }
            cmp::Ordering::Less => return Err(Self::cold_clock_behind(now, current_ts)),
        };

        if self.state.compare_and_exchange(current, next) == current {
            Ok(IdGenStatus::Ready {
                id: next | self.node_bits,
            })
        } else {
            Ok(IdGenStatus::Pending { yield_for: 0 })
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> i64 {
        self.state.get()
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(now_ms: i64, last_ms: i64) -> Error {
        #[cfg(feature = "tracing")]
        tracing::warn!(now_ms, last_ms, "clock has gone backwards");
        Error::ClockRegressed { now_ms, last_ms }
    }

    #[cold]
    #[inline(never)]
    fn cold_cancelled() -> Error {
        #[cfg(feature = "tracing")]
        tracing::debug!("id generation cancelled while spin-waiting");
        Error::Cancelled
    }
}

impl<T> fmt::Debug for SnowflakeIdGenerator<T>
where
    T: TimeSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeIdGenerator")
            .field("node_id", &self.node_id())
            .field("timestamp_offset_ms", &self.timestamp_offset_ms)
            .field("layout", &self.layout)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
