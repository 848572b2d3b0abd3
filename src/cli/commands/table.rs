//! Table command: per-partition queue state.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::time::sleep;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::kv::RedisKv;
use crate::metrics::{MetricsReader, QueueSnapshot};

use super::{colors, supports_color};

/// Show per-partition pending/active/processed counts.
#[derive(Args, Debug)]
pub struct TableArgs {
    /// Queue to display.
    pub queue: Option<String>,

    /// Display every queue found under the prefix.
    #[arg(long)]
    pub all: bool,

    /// Redraw continuously instead of printing once.
    #[arg(long)]
    pub watch: bool,

    /// Seconds between redraws in watch mode.
    #[arg(long, default_value_t = 2)]
    pub interval: u64,
}

pub async fn run_table(settings: Settings, args: TableArgs) -> Result<()> {
    if args.queue.is_none() && !args.all {
        return Err(Error::Config(
            "name a queue or pass --all to display every queue".into(),
        ));
    }

    let kv = Arc::new(RedisKv::connect(&settings.redis.connection).await?);
    let reader = MetricsReader::new(kv, settings.redis.prefix.clone());

    loop {
        let snapshots = collect(&reader, &args).await?;
        if args.watch {
            // Clear screen and home the cursor before each redraw.
            print!("\x1b[2J\x1b[H");
        }
        render(&settings, &snapshots);
        if !args.watch {
            return Ok(());
        }
        sleep(Duration::from_secs(args.interval.max(1))).await;
    }
}

async fn collect(reader: &MetricsReader, args: &TableArgs) -> Result<Vec<QueueSnapshot>> {
    if let Some(queue) = &args.queue {
        Ok(vec![reader.queue_snapshot(queue).await?])
    } else {
        Ok(reader.snapshot().await.queues)
    }
}

fn render(settings: &Settings, snapshots: &[QueueSnapshot]) {
    let use_color = supports_color();
    let (bold, dim, cyan, yellow, reset) = if use_color {
        (
            colors::BOLD,
            colors::DIM,
            colors::CYAN,
            colors::YELLOW,
            colors::RESET,
        )
    } else {
        ("", "", "", "", "")
    };

    println!(
        "{bold}strategy{reset}: {cyan}{}{reset}    {bold}limiter{reset}: {cyan}{}{reset}",
        settings.strategy,
        limiter_summary(settings),
    );

    for snapshot in snapshots {
        println!();
        println!(
            "{bold}{}{reset}  {dim}({} partitions, {} pending, {} active, {} processed){reset}",
            snapshot.queue,
            snapshot.partition_count,
            snapshot.pending,
            snapshot.active,
            snapshot.processed,
        );
        if snapshot.partitions.is_empty() {
            println!("  {dim}(empty){reset}");
            continue;
        }
        println!(
            "  {bold}{:<32} {:>8} {:>8} {:>10}{reset}",
            "PARTITION", "PENDING", "ACTIVE", "PROCESSED"
        );

        let mut partitions = snapshot.partitions.clone();
        partitions.sort_by(|a, b| b.queued.cmp(&a.queued));
        for p in &partitions {
            let highlight = if p.queued > 0 { yellow } else { "" };
            println!(
                "  {highlight}{:<32}{reset} {:>8} {:>8} {:>10}",
                p.partition, p.queued, p.active, p.processed
            );
        }
    }
}

fn limiter_summary(settings: &Settings) -> String {
    match settings.limiter.as_str() {
        "null" => "null (no cap)".to_string(),
        "simple" => format!("simple (cap {})", settings.limiters.simple.max_concurrent),
        "adaptive" => format!(
            "adaptive (cap {}..{})",
            settings.limiters.adaptive.base_limit, settings.limiters.adaptive.max_limit
        ),
        other => other.to_string(),
    }
}
