use std::io::Write;
use std::thread;

use anyhow::{Context, anyhow};
use spinflake::{SnowflakeIdGenerator, SystemClock, TimeSource};

use crate::config::{CliConfig, Command};

pub fn run<W: Write>(config: &CliConfig, out: &mut W) -> anyhow::Result<()> {
    match &config.command {
        Command::Generate { count, threads } => {
            let generator = SnowflakeIdGenerator::with_layout(
                config.layout,
                config.node_id,
                config.offset_ms,
                SystemClock,
            )?;
            for id in generate(&generator, *count, *threads)? {
                writeln!(out, "{id}")?;
            }
        }
        Command::Decode { ids } => {
            for &id in ids {
                if id < 0 {
                    tracing::warn!(id, "negative id was not minted by a snowflake generator");
                }
                let mut parts = config.layout.decode(id);
                parts.timestamp_ms = parts.timestamp_ms.saturating_add(config.offset_ms);
                writeln!(
                    out,
                    "{} {} {}",
                    parts.timestamp_ms, parts.node_id, parts.sequence
                )?;
            }
        }
        Command::Layout => {
            let layout = config.layout;
            let timestamp_bits = i64::BITS - spinflake::UNUSED_BITS - layout.timestamp_shift();
            writeln!(out, "unused_bits {}", spinflake::UNUSED_BITS)?;
            writeln!(out, "timestamp_bits {timestamp_bits}")?;
            writeln!(out, "node_id_bits {}", layout.node_id_bits())?;
            writeln!(out, "sequence_bits {}", layout.sequence_bits())?;
            writeln!(out, "max_node_id {}", layout.max_node_id())?;
            writeln!(out, "max_sequence {}", layout.max_sequence())?;
            writeln!(out, "offset_ms {}", config.offset_ms)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Draws `count` ids from `threads` threads sharing `generator`, returned in
/// ascending order.
pub fn generate<T>(
    generator: &SnowflakeIdGenerator<T>,
    count: usize,
    threads: usize,
) -> anyhow::Result<Vec<i64>>
where
    T: TimeSource + Sync,
{
    let threads = threads.max(1);
    let per_thread = count / threads;
    let remainder = count % threads;

    let mut ids = thread::scope(|s| -> anyhow::Result<Vec<i64>> {
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let quota = per_thread + usize::from(i < remainder);
                s.spawn(move || -> spinflake::Result<Vec<i64>> {
                    let mut ids = Vec::with_capacity(quota);
                    for _ in 0..quota {
                        ids.push(generator.next_id()?);
                    }
                    Ok(ids)
                })
            })
            .collect();

        let mut all = Vec::with_capacity(count);
        for handle in handles {
            let ids = handle
                .join()
                .map_err(|_| anyhow!("generator thread panicked"))?
                .context("failed to generate id")?;
            all.extend(ids);
        }
        Ok(all)
    })?;

    ids.sort_unstable();
    tracing::debug!(count = ids.len(), threads, "generated ids");
    Ok(ids)
}
