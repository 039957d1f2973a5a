use colored::Colorize;
use std::process::{Command, Stdio};

/// Presentation sink for idle and budget alerts
pub trait Notifier {
    fn notify(&mut self, title: &str, body: &str);
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&mut self, title: &str, body: &str) {
        (**self).notify(title, body)
    }
}

/// Prints alerts to stdout
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&mut self, title: &str, body: &str) {
        println!("  {} {}", title.bold().bright_yellow(), body);
    }
}

/// Sends alerts through `notify-send`, echoing them to the console as well
#[derive(Debug, Default)]
pub struct DesktopNotifier {
    console: ConsoleNotifier,
    unavailable: bool,
}

impl Notifier for DesktopNotifier {
    fn notify(&mut self, title: &str, body: &str) {
        self.console.notify(title, body);
        if self.unavailable {
            return;
        }

        let result = Command::new("notify-send")
            .arg("--app-name=ocstats")
            .arg(title)
            .arg(body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match result {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!("notify-send exited with {}", status),
            Err(e) => {
                tracing::warn!("Desktop notifications disabled, notify-send failed: {}", e);
                self.unavailable = true;
            }
        }
    }
}

/// Keeps every alert in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub messages: Vec<(String, String)>,
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&mut self, title: &str, body: &str) {
        self.messages.push((title.to_string(), body.to_string()));
    }
}
