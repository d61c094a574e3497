// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 assetflow contributors

//! Live reload
//!
//! `reload` stages signal a [`Reloader`]. In watch mode that is a
//! [`ReloadHub`], which the dev server in [`server`] exposes to browsers.

pub mod server;

pub use server::{DevServer, ServeMode};

use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::watch;
use tracing::debug;

/// Script injected into served HTML pages
pub const CLIENT_SCRIPT: &str = include_str!("client.js");

/// What a browser should refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadKind {
    /// Swap a stylesheet in place
    Stylesheet,
    /// Reload the whole page
    Page,
}

impl ReloadKind {
    /// Stylesheets refresh in place, everything else reloads the page
    pub fn for_path(path: &str) -> Self {
        if path.to_ascii_lowercase().ends_with(".css") {
            Self::Stylesheet
        } else {
            Self::Page
        }
    }
}

/// A refresh request for one changed output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadEvent {
    /// Output path relative to the working directory
    pub path: String,
    pub kind: ReloadKind,
}

/// Receiver of reload signals
pub trait Reloader: Send + Sync {
    fn reload(&self, event: ReloadEvent);
}

/// Discards reload signals (plain `run`)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReload;

impl Reloader for NoReload {
    fn reload(&self, _event: ReloadEvent) {}
}

/// Signals kept for clients that were busy when they arrived
pub const HISTORY_LIMIT: usize = 64;

/// One reload broadcast to browsers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadMessage {
    /// Increases with every signal
    pub version: u64,
    pub path: String,
    pub kind: ReloadKind,
}

/// Everything a client has not seen yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadBatch {
    /// Latest version; the next poll asks for messages after it
    pub version: u64,
    /// Messages newer than the requested version, oldest first
    pub messages: Vec<ReloadMessage>,
    /// Some messages were already dropped from the history
    pub missed: bool,
}

impl ReloadBatch {
    /// Whether the client has to reload the whole page
    pub fn needs_page_reload(&self) -> bool {
        self.missed || self.messages.iter().any(|m| m.kind == ReloadKind::Page)
    }
}

#[derive(Debug, Default)]
struct History {
    version: u64,
    messages: VecDeque<ReloadMessage>,
}

impl History {
    fn since(&self, version: u64) -> ReloadBatch {
        let messages: Vec<ReloadMessage> = self
            .messages
            .iter()
            .filter(|m| m.version > version)
            .cloned()
            .collect();
        let oldest = self.messages.front().map_or(self.version + 1, |m| m.version);

        ReloadBatch {
            version: self.version,
            missed: version < self.version && oldest > version + 1,
            messages,
        }
    }
}

/// Fan-out point between reload stages and connected browsers. Keeps the
/// last [`HISTORY_LIMIT`] signals so a slow poller still sees every change.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: watch::Sender<History>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(History::default());
        Self { tx }
    }

    /// Latest version
    pub fn version(&self) -> u64 {
        self.tx.borrow().version
    }

    /// Messages after `version`
    pub fn since(&self, version: u64) -> ReloadBatch {
        self.tx.borrow().since(version)
    }

    /// Wait until something newer than `version` arrives
    pub async fn wait_past(&self, version: u64) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|h| h.version > version).await;
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Reloader for ReloadHub {
    fn reload(&self, event: ReloadEvent) {
        debug!(path = %event.path, kind = ?event.kind, "reload signal");
        self.tx.send_modify(|history| {
            history.version += 1;
            history.messages.push_back(ReloadMessage {
                version: history.version,
                path: event.path,
                kind: event.kind,
            });
            while history.messages.len() > HISTORY_LIMIT {
                history.messages.pop_front();
            }
        });
    }
}
