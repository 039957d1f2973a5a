use anyhow::Result;
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};

use super::Context;
use crate::exporter::Exporter;
use crate::idle::IdleTracker;
use crate::usage::StatsStore;

/// Record usage from host events on stdin until EOF or Ctrl-C
pub async fn run(ctx: Context) -> Result<()> {
    let store = StatsStore::new(ctx.stats_path);
    let idle = IdleTracker::from_minutes(ctx.config.idle_threshold_minutes);
    let mut exporter = Exporter::start(store, idle, &Local::now());

    // Raw bytes: one line with invalid UTF-8 must not end the stream
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut line = Vec::new();

    let mut ticker = interval(ctx.config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            read = stdin.read_until(b'\n', &mut line) => match read {
                Ok(0) => {
                    tracing::debug!("Event stream closed");
                    break;
                }
                Ok(_) => {
                    exporter.handle_line(&String::from_utf8_lossy(&line), &Local::now());
                    line.clear();
                }
                Err(e) => {
                    tracing::warn!("Failed to read event stream: {}", e);
                    break;
                }
            },
            _ = ticker.tick() => exporter.poll(&Local::now()),
            _ = &mut shutdown => {
                tracing::debug!("Interrupted");
                break;
            }
        }
    }

    exporter.shutdown();
    Ok(())
}
