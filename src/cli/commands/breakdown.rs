use anyhow::Result;
use chrono::Local;

use super::Context;
use crate::monitor::{Monitor, Window};
use crate::notifier::ConsoleNotifier;

/// Per-model usage for one window, largest first
pub fn run(ctx: Context, window: Window) -> Result<()> {
    let now = Local::now();
    let mut monitor = Monitor::new(
        ctx.config,
        ctx.stats_path,
        ctx.mirror_path,
        ConsoleNotifier,
        &now,
    );
    monitor.refresh(&now);

    let lines = monitor.breakdown_lines(window);
    if lines.is_empty() {
        println!("No model data available for {}", window.name());
        return Ok(());
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}
