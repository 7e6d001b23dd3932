use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use spinflake::{CUSTOM_EPOCH_MS, SnowflakeLayout};

/// Runtime configuration for the `spinflake` binary.
///
/// Global settings describe the generator every subcommand works against. All
/// values are parsed from CLI arguments or environment variables, and a `.env`
/// file in the working directory is loaded before either.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "spinflake",
    version,
    about = "Mint and decode lock-free Snowflake IDs"
)]
pub struct CliArgs {
    /// Bits of each id reserved for the node id.
    ///
    /// Node id and sequence bits together must not exceed 22.
    ///
    /// Environment variable: `SPINFLAKE_NODE_ID_BITS`
    #[arg(long, global = true, env = "SPINFLAKE_NODE_ID_BITS", default_value_t = 10)]
    pub node_id_bits: u32,

    /// Bits of each id reserved for the per-millisecond sequence.
    ///
    /// Environment variable: `SPINFLAKE_SEQUENCE_BITS`
    #[arg(long, global = true, env = "SPINFLAKE_SEQUENCE_BITS", default_value_t = 12)]
    pub sequence_bits: u32,

    /// Node id encoded into every generated id.
    ///
    /// Environment variable: `SPINFLAKE_NODE_ID`
    #[arg(long, global = true, env = "SPINFLAKE_NODE_ID", default_value_t = 0)]
    pub node_id: i64,

    /// Milliseconds since the Unix epoch subtracted from every clock reading.
    ///
    /// Every process minting into one namespace must agree on this value.
    ///
    /// Environment variable: `SPINFLAKE_OFFSET_MS`
    #[arg(long, global = true, env = "SPINFLAKE_OFFSET_MS", default_value_t = CUSTOM_EPOCH_MS)]
    pub offset_ms: i64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Generate ids, one per line.
    Generate {
        /// Number of ids to generate.
        #[arg(short, long, default_value_t = 1)]
        count: usize,

        /// Threads sharing one generator. The total count is split between
        /// them.
        #[arg(short, long, default_value_t = 1)]
        threads: usize,
    },
    /// Print `timestamp_ms node_id sequence` for each id.
    Decode {
        /// Ids to decode.
        #[arg(required = true, allow_negative_numbers = true)]
        ids: Vec<i64>,
    },
    /// Print the bit layout in effect.
    Layout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub layout: SnowflakeLayout,
    pub node_id: i64,
    pub offset_ms: i64,
    pub command: Command,
}

impl TryFrom<CliArgs> for CliConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let layout = SnowflakeLayout::new(args.node_id_bits, args.sequence_bits)
            .context("invalid SPINFLAKE_NODE_ID_BITS / SPINFLAKE_SEQUENCE_BITS")?;

        if !(0..=layout.max_node_id()).contains(&args.node_id) {
            bail!(
                "SPINFLAKE_NODE_ID ({}) exceeds available node id space (max = {})",
                args.node_id,
                layout.max_node_id()
            );
        }

        if args.offset_ms < 0 {
            bail!("SPINFLAKE_OFFSET_MS must not be negative");
        }

        if let Command::Generate { count, threads } = args.command {
            if threads == 0 {
                bail!("--threads must be greater than 0");
            }
            if threads > count.max(1) {
                bail!("--threads ({threads}) exceeds --count ({count})");
            }
        }

        Ok(Self {
            layout,
            node_id: args.node_id,
            offset_ms: args.offset_ms,
            command: args.command,
        })
    }
}
