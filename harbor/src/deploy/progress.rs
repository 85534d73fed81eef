//! Operator-facing progress output

use colored::Colorize;
use tokio::sync::mpsc;

/// Receives human-readable progress lines
pub trait ProgressSink: Send + Sync {
    fn line(&self, text: &str);
}

/// Prints progress lines on stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn line(&self, text: &str) {
        match text.split_once(": ") {
            Some((prefix, rest)) if !prefix.contains(' ') => {
                println!("{} {}", format!("{}:", prefix).bold(), rest)
            }
            _ => println!("{}", text),
        }
    }
}

/// Sending half used by the concurrent watchers
pub type LineSender = mpsc::UnboundedSender<String>;

/// Queue a line; a closed channel means the wait already resolved
pub(crate) fn emit(lines: &LineSender, text: String) {
    tracing::debug!("{}", text);
    let _ = lines.send(text);
}

/// `harbor:` lines describe our own actions, `swarm:` lines what the cluster did
pub(crate) fn harbor(text: impl AsRef<str>) -> String {
    format!("harbor: {}", text.as_ref())
}

pub(crate) fn swarm(text: impl AsRef<str>) -> String {
    format!("swarm: {}", text.as_ref())
}
