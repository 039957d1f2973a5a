use anyhow::{Context as _, Result};
use chrono::Local;
use colored::Colorize;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::Path;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::{interval, MissedTickBehavior};

use super::Context;
use crate::monitor::Monitor;
use crate::notifier::{ConsoleNotifier, DesktopNotifier, Notifier};

/// Follow the exporter's statistics until Ctrl-C
pub async fn run(ctx: Context, desktop: bool) -> Result<()> {
    let notifier: Box<dyn Notifier> = if desktop || ctx.config.desktop_notifications {
        Box::new(DesktopNotifier::default())
    } else {
        Box::new(ConsoleNotifier)
    };
    let poll_interval = ctx.config.poll_interval();
    let file_monitor = ctx.config.file_monitor_enabled;

    let mut monitor = Monitor::new(
        ctx.config,
        ctx.stats_path,
        ctx.mirror_path,
        notifier,
        &Local::now(),
    );
    eprintln!(
        "[ocstats] Watching {}",
        monitor.stats_path().display().to_string().cyan()
    );

    // Without a watcher the sender is dropped and the channel branch never fires
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _watcher = if file_monitor {
        match watch_stats_file(monitor.stats_path(), tx) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!("File monitoring unavailable, polling only: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_panel = String::new();
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            Some(()) = rx.recv() => tracing::debug!("Stats file changed"),
            _ = &mut shutdown => break,
        }

        let now = Local::now();
        monitor.tick(&now);

        let panel = monitor.panel_text();
        if panel != last_panel {
            println!("{} {}", now.format("%H:%M:%S").to_string().dimmed(), panel);
            last_panel = panel;
        }
    }

    eprintln!("[ocstats] Stopped");
    Ok(())
}

/// Watch the directory holding the stats file. The exporter replaces the
/// file by rename, so the file itself cannot be watched.
fn watch_stats_file(path: &Path, tx: UnboundedSender<()>) -> Result<RecommendedWatcher> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let file_name = path.file_name().map(|n| n.to_os_string());
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if event
                .paths
                .iter()
                .any(|p| p.file_name() == file_name.as_deref())
            {
                let _ = tx.send(());
            }
        }
        Err(e) => tracing::warn!("File watch error: {}", e),
    })
    .context("Failed to create file watcher")?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    Ok(watcher)
}
