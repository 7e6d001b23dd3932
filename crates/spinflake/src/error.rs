/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors `spinflake` can produce.
///
/// Configuration faults are raised once, at startup or construction, and are
/// never retried. [`Error::ClockRegressed`] and [`Error::Cancelled`] are raised
/// by a single generation call and leave the generator's state untouched, so
/// other callers sharing the generator are unaffected.
///
/// Losing a compare-and-swap race is not an error: it is the retry trigger of
/// the generation loop and is reported as
/// [`IdGenStatus::Pending`](crate::IdGenStatus::Pending) by the non-blocking
/// API.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The node id and sequence widths together exceed
    /// [`NODE_ID_AND_SEQUENCE_BITS`](crate::NODE_ID_AND_SEQUENCE_BITS).
    #[error(
        "too many bits used, must not exceed {max}: node_id_bits={node_id_bits}, sequence_bits={sequence_bits}",
        max = crate::NODE_ID_AND_SEQUENCE_BITS
    )]
    TooManyBits {
        /// Requested node id width.
        node_id_bits: u32,
        /// Requested sequence width.
        sequence_bits: u32,
    },

    /// An environment variable holding a bit width could not be parsed as a
    /// non-negative integer.
    #[error("must be an integer >= 0: {name}={value}")]
    InvalidEnv {
        /// Name of the offending variable.
        name: &'static str,
        /// Raw value as found in the environment.
        value: String,
    },

    /// The node id does not fit into the configured node id width.
    #[error("must be >= 0 && <= {max}: node_id={node_id}")]
    NodeIdOutOfRange {
        /// Requested node id.
        node_id: i64,
        /// Largest node id the layout can encode.
        max: i64,
    },

    /// The timestamp offset is negative.
    #[error("must be >= 0: timestamp_offset_ms={offset_ms}")]
    NegativeOffset {
        /// Requested offset.
        offset_ms: i64,
    },

    /// The timestamp offset lies in the future of the time source.
    #[error("timestamp_offset_ms={offset_ms} > now_ms={now_ms}")]
    OffsetInFuture {
        /// Requested offset.
        offset_ms: i64,
        /// Time source reading at construction.
        now_ms: i64,
    },

    /// The time source returned a timestamp older than the last one committed
    /// by the generator.
    #[error("clock has gone backwards: timestamp_ms={now_ms} < last_timestamp_ms={last_ms}")]
    ClockRegressed {
        /// Observed timestamp, relative to the generator's offset.
        now_ms: i64,
        /// Last committed timestamp, relative to the generator's offset.
        last_ms: i64,
    },

    /// Cancellation was requested while the caller was spin-waiting.
    #[error("id generation cancelled while spin-waiting")]
    Cancelled,
}

impl Error {
    /// Returns `true` for faults raised while validating configuration or
    /// construction inputs.
    ///
    /// These never come out of a generation call.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::TooManyBits { .. }
                | Self::InvalidEnv { .. }
                | Self::NodeIdOutOfRange { .. }
                | Self::NegativeOffset { .. }
                | Self::OffsetInFuture { .. }
        )
    }
}
