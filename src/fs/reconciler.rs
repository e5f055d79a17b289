//! Applies realtime filesystem events to the explorer session.
//!
//! Events are applied one at a time, in arrival order, each as a single
//! atomic update of the store. Structural changes go through the pure tree
//! functions; tabs and buffers follow renames and deletions.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::event::{EventChannel, FileSystemEvent};
use crate::fs::path::NodePath;
use crate::fs::store::{Session, TreeStore};
use crate::fs::tree::{self, FileNode};
use crate::status::{NoticeLevel, Notifier};

/// What applying one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Created {
        inserted: bool,
    },
    Deleted {
        removed: bool,
        closed: Vec<NodePath>,
    },
    Renamed {
        moved: bool,
        retargeted: Vec<(NodePath, NodePath)>,
    },
    Modified {
        open: bool,
        unsaved: bool,
    },
    /// The event lacked what it needed; nothing was changed.
    Skipped(&'static str),
}

/// Apply `event` to `session`. Never panics; a malformed event is skipped
/// without touching any state.
pub fn apply_event(session: &mut Session, event: &FileSystemEvent) -> EventOutcome {
    match event {
        FileSystemEvent::Created { path, item } => {
            let Some(item) = item else {
                return EventOutcome::Skipped("created event without item");
            };
            let Some(parent) = path.parent() else {
                return EventOutcome::Skipped("created event without parent");
            };
            let node = if item.path() == path {
                item.clone()
            } else {
                tree::rename_paths(item, item.path(), path)
            };
            let updated = tree::insert(&session.tree, &parent, node, &session.browse_root);
            let inserted = !tree::same_forest(&session.tree, &updated);
            session.tree = updated;
            EventOutcome::Created { inserted }
        }
        FileSystemEvent::Deleted { path } => {
            let removed = if path.contains(&session.browse_root) {
                let had_tree = !session.tree.is_empty();
                session.tree.clear();
                had_tree
            } else {
                let (updated, removed) = tree::remove(&session.tree, path);
                session.tree = updated;
                removed.is_some()
            };
            let closed = session.cascade_delete(path);
            EventOutcome::Deleted { removed, closed }
        }
        FileSystemEvent::Renamed {
            old_path,
            new_path,
            item,
        } => {
            if old_path.is_ancestor_of(new_path) {
                return EventOutcome::Skipped("renamed into its own subtree");
            }
            if let Some(root) = session.browse_root.rebase(old_path, new_path) {
                // The browsed directory itself moved; follow it.
                let moved = !session.tree.is_empty();
                session.tree = session
                    .tree
                    .iter()
                    .map(|node| Arc::new(tree::rename_paths(node, old_path, new_path)))
                    .collect();
                session.browse_root = root;
                let retargeted = session.cascade_rename(old_path, new_path);
                return EventOutcome::Renamed { moved, retargeted };
            }
            let Some(new_parent) = new_path.parent() else {
                return EventOutcome::Skipped("renamed event without parent");
            };
            let (without, removed) = tree::remove(&session.tree, old_path);
            let node = match (&removed, item) {
                (Some(removed), _) => Some(tree::rename_paths(removed, old_path, new_path)),
                (None, Some(item)) if item.path() == new_path => Some(item.clone()),
                (None, Some(item)) => Some(tree::rename_paths(item, item.path(), new_path)),
                // Nothing to place in the tree; tabs still follow the move.
                (None, None) => None,
            };
            if let Some(node) = node {
                session.tree = tree::insert(&without, &new_parent, node, &session.browse_root);
            }
            let retargeted = session.cascade_rename(old_path, new_path);
            EventOutcome::Renamed {
                moved: removed.is_some(),
                retargeted,
            }
        }
        FileSystemEvent::Modified { path } => modified_outcome(session, path),
    }
}

/// An external modification never rewrites a buffer; it only matters to the
/// user when the file is open.
fn modified_outcome(session: &Session, path: &NodePath) -> EventOutcome {
    EventOutcome::Modified {
        open: session.open_files.contains(path),
        unsaved: session.buffers.get(path).is_some_and(|b| b.unsaved()),
    }
}

/// Consumes realtime events and applies them to a [`TreeStore`].
#[derive(Clone)]
pub struct RealtimeReconciler {
    store: TreeStore,
    notifier: Option<Arc<dyn Notifier>>,
}

impl RealtimeReconciler {
    pub fn new(store: TreeStore) -> Self {
        Self {
            store,
            notifier: None,
        }
    }

    /// Tell the user when an open file changes on disk.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn apply(&self, event: FileSystemEvent) -> EventOutcome {
        let outcome = match &event {
            // Read-only, so no revision bump.
            FileSystemEvent::Modified { path } => self.store.read(|s| modified_outcome(s, path)),
            _ => self.store.update(|s| apply_event(s, &event)),
        };
        self.report(&event, &outcome);
        outcome
    }

    /// Drain `channel` in order until it closes.
    pub async fn run(self, mut channel: EventChannel) {
        while let Some(event) = channel.next().await {
            self.apply(event);
        }
        debug!("realtime event channel closed");
    }

    fn report(&self, event: &FileSystemEvent, outcome: &EventOutcome) {
        match (event, outcome) {
            (_, EventOutcome::Skipped(reason)) => {
                warn!(kind = event.kind(), reason = *reason, "skipping realtime event");
            }
            (FileSystemEvent::Deleted { path }, EventOutcome::Deleted { closed, .. })
                if !closed.is_empty() =>
            {
                info!(%path, tabs = closed.len(), "closed tabs of deleted path");
            }
            (FileSystemEvent::Renamed { old_path, new_path, .. }, EventOutcome::Renamed { retargeted, .. })
                if !retargeted.is_empty() =>
            {
                info!(from = %old_path, to = %new_path, tabs = retargeted.len(), "retargeted tabs of renamed path");
            }
            (FileSystemEvent::Modified { path }, EventOutcome::Modified { open: true, unsaved }) => {
                if let Some(notifier) = &self.notifier {
                    let message = if *unsaved {
                        format!("{} changed on disk; unsaved edits kept", path.name())
                    } else {
                        format!("{} changed on disk", path.name())
                    };
                    notifier.notify(&message, NoticeLevel::Info);
                }
            }
            _ => debug!(kind = event.kind(), ?outcome, "applied realtime event"),
        }
    }
}

/// `Created` event for a node the caller already holds.
pub(crate) fn created(node: FileNode) -> FileSystemEvent {
    FileSystemEvent::Created {
        path: node.path().clone(),
        item: Some(node),
    }
}
