use anyhow::Result;
use chrono::Local;
use colored::Colorize;

use super::Context;
use crate::monitor::{Monitor, RefreshOutcome};
use crate::notifier::ConsoleNotifier;

/// Refresh once and print every window
pub fn run(ctx: Context, json: bool) -> Result<()> {
    let now = Local::now();
    let mut monitor = Monitor::new(
        ctx.config,
        ctx.stats_path,
        ctx.mirror_path,
        ConsoleNotifier,
        &now,
    );

    if monitor.refresh(&now) == RefreshOutcome::Missing {
        eprintln!(
            "[ocstats] No statistics yet at {}",
            monitor.stats_path().display()
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(monitor.statistics())?);
        return Ok(());
    }

    for line in monitor.status_lines() {
        match line.split_once(": ") {
            Some((label, value)) => println!("{}: {}", label.bold(), value),
            None => println!("{}", line.yellow()),
        }
    }
    Ok(())
}
