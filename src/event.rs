use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::fs::path::NodePath;
use crate::fs::tree::FileNode;

/// A filesystem change observed outside the explorer.
///
/// `item` describes the entry at its (new) location; it is optional on the
/// wire and events without it cannot change the tree structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileSystemEvent {
    Created {
        path: NodePath,
        #[serde(default)]
        item: Option<FileNode>,
    },
    Deleted {
        path: NodePath,
    },
    #[serde(rename_all = "camelCase")]
    Renamed {
        old_path: NodePath,
        new_path: NodePath,
        #[serde(default)]
        item: Option<FileNode>,
    },
    Modified {
        path: NodePath,
    },
}

impl FileSystemEvent {
    /// Decode one JSON message from the realtime transport.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FileSystemEvent::Created { .. } => "created",
            FileSystemEvent::Deleted { .. } => "deleted",
            FileSystemEvent::Renamed { .. } => "renamed",
            FileSystemEvent::Modified { .. } => "modified",
        }
    }
}

/// Ordered, unbounded queue of realtime events.
pub struct EventChannel {
    rx: mpsc::UnboundedReceiver<FileSystemEvent>,
    tx: mpsc::UnboundedSender<FileSystemEvent>,
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl EventChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    /// Sender for event sources (watchers, transports).
    pub fn sender(&self) -> mpsc::UnboundedSender<FileSystemEvent> {
        self.tx.clone()
    }

    /// Next event in arrival order; `None` once every sender is gone.
    ///
    /// The channel keeps one sender for [`EventChannel::sender`], so this
    /// only returns `None` after [`EventChannel::close`].
    pub async fn next(&mut self) -> Option<FileSystemEvent> {
        self.rx.recv().await
    }

    /// Stop accepting events; already queued ones are still delivered.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
