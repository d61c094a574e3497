// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Developer-facing notifications
//!
//! Stages and the runner report progress and failures through a
//! [`Notifier`]. The CLI prints them; tests and embedders can record them.

use colored::Colorize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

/// One message for the developer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub task: String,
    pub level: Level,
    pub message: String,
    pub file: Option<PathBuf>,
    pub line: Option<usize>,
}

impl Notification {
    pub fn new(task: &str, level: Level, message: impl Into<String>) -> Self {
        Self {
            task: task.to_string(),
            level,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn at(mut self, file: impl Into<PathBuf>, line: Option<usize>) -> Self {
        self.file = Some(file.into());
        self.line = line;
        self
    }
}

/// Sink for notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Prints notifications to the terminal and mirrors them to tracing
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    verbose: bool,
}

impl ConsoleNotifier {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, n: Notification) {
        let task = format!("[{}]", n.task).dimmed();

        match n.level {
            Level::Info => {
                info!(task = %n.task, "{}", n.message);
                if self.verbose {
                    println!("  {} {} {}", "→".blue(), task, n.message);
                }
            }
            Level::Success => {
                info!(task = %n.task, "{}", n.message);
                println!("  {} {} {}", "✓".green(), task, n.message);
            }
            Level::Warning => {
                warn!(task = %n.task, "{}", n.message);
                println!("  {} {} {}", "⚠".yellow(), task, n.message);
            }
            Level::Error => {
                error!(task = %n.task, file = ?n.file, line = ?n.line, "task failed");
                eprintln!("  {} {} {}", "✗".red(), task, n.message.red());
            }
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryNotifier {
    entries: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the notifications received so far
    pub fn entries(&self) -> Vec<Notification> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Messages only
    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|n| n.message).collect()
    }

    /// Notifications at a given level
    pub fn at_level(&self, level: Level) -> Vec<Notification> {
        self.entries()
            .into_iter()
            .filter(|n| n.level == level)
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(notification);
        }
    }
}
