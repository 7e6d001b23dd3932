use std::sync::OnceLock;

use crate::{Error, Result};

/// High-order two's complement bit, always zero so ids are non-negative.
pub const UNUSED_BITS: u32 = 1;

/// Bits of the millisecond timestamp: about 69 years past the offset.
pub const EPOCH_BITS: u32 = 41;

/// Bits shared between the node id and the per-millisecond sequence.
pub const NODE_ID_AND_SEQUENCE_BITS: u32 = 22;

/// Environment variable holding the process-wide node id width.
pub const NODE_ID_BITS_ENV: &str = "SPINFLAKE_NODE_ID_BITS";

/// Environment variable holding the process-wide sequence width.
pub const SEQUENCE_BITS_ENV: &str = "SPINFLAKE_SEQUENCE_BITS";

const _: () = assert!(UNUSED_BITS + EPOCH_BITS + NODE_ID_AND_SEQUENCE_BITS == i64::BITS);

static GLOBAL: OnceLock<SnowflakeLayout> = OnceLock::new();

/// The bit layout of a Snowflake id.
///
/// Most-significant first:
///
/// ```text
/// [0][timestamp: 41][node id: node_id_bits][sequence: sequence_bits]
/// ```
///
/// Node id and sequence share [`NODE_ID_AND_SEQUENCE_BITS`]. When they use
/// fewer, the timestamp sits lower and gains the spare bits.
///
/// # Example
///
/// ```
/// use spinflake::{SnowflakeLayout, SnowflakeParts};
///
/// let layout = SnowflakeLayout::new(10, 12).unwrap();
/// let parts = SnowflakeParts { timestamp_ms: 100, node_id: 3, sequence: 1 };
/// let id = layout.encode(parts);
///
/// assert_eq!(id, (100 << 22) | (3 << 12) | 1);
/// assert_eq!(layout.decode(id), parts);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawLayout", into = "RawLayout"))]
pub struct SnowflakeLayout {
    node_id_bits: u8,
    sequence_bits: u8,
}

/// The decoded fields of a Snowflake id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnowflakeParts {
    /// Milliseconds, relative or absolute depending on who decoded the id.
    pub timestamp_ms: i64,
    /// Node that generated the id.
    pub node_id: i64,
    /// Position within the millisecond.
    pub sequence: i64,
}

impl SnowflakeLayout {
    /// 10 node bits (1024 nodes) and 12 sequence bits (4096 ids per
    /// millisecond per node).
    pub const DEFAULT: Self = Self {
        node_id_bits: 10,
        sequence_bits: 12,
    };

    /// Validates and builds a layout.
    ///
    /// # Errors
    ///
    /// [`Error::TooManyBits`] if the widths add up to more than
    /// [`NODE_ID_AND_SEQUENCE_BITS`].
    pub const fn new(node_id_bits: u32, sequence_bits: u32) -> Result<Self> {
        if node_id_bits > NODE_ID_AND_SEQUENCE_BITS
            || sequence_bits > NODE_ID_AND_SEQUENCE_BITS
            || node_id_bits + sequence_bits > NODE_ID_AND_SEQUENCE_BITS
        {
            return Err(Error::TooManyBits {
                node_id_bits,
                sequence_bits,
            });
        }
        Ok(Self {
            node_id_bits: node_id_bits as u8,
            sequence_bits: sequence_bits as u8,
        })
    }

    /// Reads the layout from [`NODE_ID_BITS_ENV`] and [`SEQUENCE_BITS_ENV`],
    /// falling back to [`Self::DEFAULT`] for unset variables.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidEnv`] for a value that is not a non-negative integer,
    /// [`Error::TooManyBits`] for an oversized layout.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Self::from_env`], resolving variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let parse = |name: &'static str, default: u8| -> Result<u32> {
            match lookup(name) {
                None => Ok(u32::from(default)),
                Some(value) => value.trim().parse().map_err(|_| Error::InvalidEnv { name, value }),
            }
        };

        let node_id_bits = parse(NODE_ID_BITS_ENV, Self::DEFAULT.node_id_bits)?;
        let sequence_bits = parse(SEQUENCE_BITS_ENV, Self::DEFAULT.sequence_bits)?;
        Self::new(node_id_bits, sequence_bits)
    }

    /// The process-wide layout, resolved from the environment on first use
    /// unless [`Self::install`] ran earlier.
    ///
    /// # Panics
    ///
    /// Panics on first use if the environment holds an invalid layout. Bit
    /// widths are a startup constant; a process must not run with a layout it
    /// cannot honour.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(|| match Self::from_env() {
            Ok(layout) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    node_id_bits = layout.node_id_bits,
                    sequence_bits = layout.sequence_bits,
                    "resolved process-wide snowflake layout"
                );
                layout
            }
            Err(e) => panic!("invalid snowflake layout: {e}"),
        })
    }

    /// Pins the process-wide layout. Only the first call (or first use of
    /// [`Self::global`]) wins.
    ///
    /// # Errors
    ///
    /// Returns the layout already in effect if one was resolved before.
    pub fn install(self) -> core::result::Result<(), Self> {
        GLOBAL.set(self).map_err(|_| *Self::global())
    }

    #[inline]
    pub const fn node_id_bits(&self) -> u32 {
        self.node_id_bits as u32
    }

    #[inline]
    pub const fn sequence_bits(&self) -> u32 {
        self.sequence_bits as u32
    }

    /// Shift that places a timestamp above node id and sequence.
    #[inline]
    pub const fn timestamp_shift(&self) -> u32 {
        self.node_id_bits() + self.sequence_bits()
    }

    /// `2^node_id_bits - 1`
    #[inline]
    pub const fn max_node_id(&self) -> i64 {
        (1 << self.node_id_bits()) - 1
    }

    /// `2^sequence_bits - 1`
    #[inline]
    pub const fn max_sequence(&self) -> i64 {
        (1 << self.sequence_bits()) - 1
    }

    #[inline]
    pub const fn sequence_mask(&self) -> i64 {
        self.max_sequence()
    }

    /// Largest timestamp an id can carry: `2^41 - 1` with a full 22 bits of
    /// node id and sequence, more when they use fewer.
    #[inline]
    pub const fn max_timestamp(&self) -> i64 {
        i64::MAX >> self.timestamp_shift()
    }

    /// Packs `parts` into an id. Fields are masked to their widths.
    #[inline]
    pub const fn encode(&self, parts: SnowflakeParts) -> i64 {
        ((parts.timestamp_ms & self.max_timestamp()) << self.timestamp_shift())
            | ((parts.node_id & self.max_node_id()) << self.sequence_bits())
            | (parts.sequence & self.sequence_mask())
    }

    /// Splits an id into its fields. The timestamp is whatever the id holds,
    /// relative to the generating instance's offset.
    #[inline]
    pub const fn decode(&self, id: i64) -> SnowflakeParts {
        SnowflakeParts {
            timestamp_ms: ((id as u64) >> self.timestamp_shift()) as i64,
            node_id: (id >> self.sequence_bits()) & self.max_node_id(),
            sequence: id & self.sequence_mask(),
        }
    }
}

impl Default for SnowflakeLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct RawLayout {
    node_id_bits: u32,
    sequence_bits: u32,
}

#[cfg(feature = "serde")]
impl TryFrom<RawLayout> for SnowflakeLayout {
    type Error = Error;

    fn try_from(raw: RawLayout) -> Result<Self> {
        Self::new(raw.node_id_bits, raw.sequence_bits)
    }
}

#[cfg(feature = "serde")]
impl From<SnowflakeLayout> for RawLayout {
    fn from(layout: SnowflakeLayout) -> Self {
        Self {
            node_id_bits: layout.node_id_bits(),
            sequence_bits: layout.sequence_bits(),
        }
    }
}
