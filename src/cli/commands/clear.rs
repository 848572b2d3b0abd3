//! Clear command: drop a partition or a whole queue.

use std::io::{BufRead, Write};
use std::sync::Arc;

use clap::Args;
use tracing::info;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::kv::RedisKv;
use crate::queue::BalancedQueue;

/// Delete queued jobs, reservations, delayed entries, and counters.
#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Queue to clear.
    pub queue: String,

    /// Clear only this partition instead of the whole queue.
    #[arg(long)]
    pub partition: Option<String>,

    /// Skip the interactive confirmation.
    #[arg(long)]
    pub force: bool,
}

pub async fn run_clear(settings: Settings, args: ClearArgs) -> Result<()> {
    let target = match &args.partition {
        Some(partition) => format!("partition '{}' of queue '{}'", partition, args.queue),
        None => format!("queue '{}'", args.queue),
    };

    if !args.force && !confirm(&target).await? {
        println!("aborted");
        return Ok(());
    }

    let kv = Arc::new(RedisKv::connect(&settings.redis.connection).await?);
    let driver = BalancedQueue::builder(kv)
        .prefix(settings.redis.prefix.clone())
        .build();

    match &args.partition {
        Some(partition) => {
            let had_jobs = driver
                .partitions(&args.queue)
                .await?
                .iter()
                .any(|p| p == partition);
            driver.clear_partition(&args.queue, partition).await?;
            if had_jobs {
                println!("cleared {target}");
            } else {
                println!("{target} was already empty");
            }
        }
        None => {
            let cleared = driver.clear_queue(&args.queue).await?;
            if cleared > 0 {
                println!("cleared {cleared} partition(s) of queue '{}'", args.queue);
            } else {
                println!("queue '{}' was already empty", args.queue);
            }
        }
    }
    info!(queue = %args.queue, partition = ?args.partition, "clear finished");
    Ok(())
}

/// Interactive y/N prompt. When stdin is not a terminal the clear is
/// declined rather than failed; a refused confirmation is not a KV
/// error, so the exit code stays zero and scripts opt in with --force.
async fn confirm(target: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        eprintln!("stdin is not a terminal; pass --force to clear {target}");
        return Ok(false);
    }
    print!("Clear {target}? This cannot be undone. [y/N] ");
    std::io::stdout().flush()?;
    // Keep the blocking terminal read off the async executor.
    let answer = tokio::task::spawn_blocking(|| {
        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer).map(|_| answer)
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}
