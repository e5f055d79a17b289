//! Folder expansion, root listing and explicit file actions.
//!
//! Per directory the manager drives this state machine:
//!
//! ```text
//! Closed(unfetched) --toggle--> Loading --ok--> Open
//!                                  \----err---> Closed(unfetched) + error notice
//! Closed(cached) <--toggle--> Open            (no request)
//! ```

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};
use crate::event::FileSystemEvent;
use crate::fs::operations::Backend;
use crate::fs::path::NodePath;
use crate::fs::reconciler::{self, apply_event};
use crate::fs::store::{Session, TreeStore};
use crate::fs::tree::{self, EntryKind, FileNode, FolderPatch, Forest};
use crate::status::{NoticeLevel, Notifier};

/// Result of [`TreeManager::toggle_folder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// No node at the path.
    Missing,
    /// The path is a file.
    NotAFolder,
    /// A listing for this folder is already in flight.
    AlreadyLoading,
    Collapsed,
    /// Opened from cached children.
    Expanded,
    /// Opened after fetching children.
    Fetched,
    /// The listing failed and the folder was rolled back to closed.
    FetchFailed,
}

enum Step {
    Done(ToggleOutcome),
    Fetch,
}

/// Drives listings of the browse root and its folders.
#[derive(Clone)]
pub struct TreeManager {
    store: TreeStore,
    backend: Arc<dyn Backend>,
    notifier: Arc<dyn Notifier>,
    fallback_root: NodePath,
}

/// Turn a backend listing into a sorted, duplicate-free forest. Directories
/// the backend described without children stay unfetched and closed.
pub fn normalize_listing(nodes: Vec<FileNode>) -> Forest {
    let nodes = nodes
        .into_iter()
        .map(|node| match node {
            FileNode::Directory(mut dir) => {
                dir.is_loading_children = false;
                if dir.children.is_none() {
                    dir.is_open = false;
                }
                FileNode::Directory(dir)
            }
            file => file,
        })
        .collect();
    tree::sort_forest(nodes)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(AppError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// The folder change a toggle of `path` needs, if any, and what follows it.
fn plan_toggle(session: &Session, path: &NodePath) -> (Option<FolderPatch>, Step) {
    let Some(node) = tree::find(&session.tree, path) else {
        return (None, Step::Done(ToggleOutcome::Missing));
    };
    let Some(dir) = node.as_dir() else {
        return (None, Step::Done(ToggleOutcome::NotAFolder));
    };
    if dir.is_loading_children {
        return (None, Step::Done(ToggleOutcome::AlreadyLoading));
    }
    if dir.is_open {
        let patch = FolderPatch {
            is_open: Some(false),
            ..Default::default()
        };
        (Some(patch), Step::Done(ToggleOutcome::Collapsed))
    } else if dir.children.as_ref().is_some_and(|c| !c.is_empty()) {
        let patch = FolderPatch {
            is_open: Some(true),
            ..Default::default()
        };
        (Some(patch), Step::Done(ToggleOutcome::Expanded))
    } else {
        let patch = FolderPatch {
            is_loading_children: Some(true),
            ..Default::default()
        };
        (Some(patch), Step::Fetch)
    }
}

impl TreeManager {
    pub fn new(
        store: TreeStore,
        backend: Arc<dyn Backend>,
        notifier: Arc<dyn Notifier>,
        fallback_root: NodePath,
    ) -> Self {
        Self {
            store,
            backend,
            notifier,
            fallback_root,
        }
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    /// List the browse root and replace the tree with the result.
    ///
    /// On failure the tree is cleared, the browse root falls back to the
    /// configured directory and the user is told.
    pub async fn fetch_root(&self) {
        let root = self.store.browse_root();
        match self.backend.list(&root).await {
            Ok(nodes) => {
                let forest = normalize_listing(nodes);
                let count = forest.len();
                let applied = self.store.update(|s| {
                    if s.browse_root != root {
                        return false;
                    }
                    s.tree = forest;
                    true
                });
                if applied {
                    debug!(%root, entries = count, "loaded browse root");
                } else {
                    debug!(%root, "browse root changed while listing; result dropped");
                }
            }
            Err(e) => {
                error!(%root, error = %e, "failed to list browse root");
                let fallback = self.fallback_root.clone();
                self.store.update(|s| {
                    s.tree.clear();
                    s.browse_root = fallback;
                });
                self.notifier
                    .notify(&format!("Could not open {root}: {e}"), NoticeLevel::Error);
            }
        }
    }

    /// Open or close the folder at `path`, fetching its children on first open.
    ///
    /// Targets that need no change are resolved under a read, so they never
    /// bump the store revision.
    pub async fn toggle_folder(&self, path: &NodePath) -> ToggleOutcome {
        let step = match self.store.read(|s| plan_toggle(s, path)) {
            (None, step) => step,
            // Re-planned under the write lock; the folder may have changed
            // since the read.
            (Some(_), _) => self.store.update(|s| {
                let (patch, step) = plan_toggle(s, path);
                if let Some(patch) = patch {
                    s.tree = tree::set_folder_state(&s.tree, path, patch);
                }
                step
            }),
        };

        match step {
            Step::Fetch => self.load_children(path).await,
            Step::Done(outcome @ (ToggleOutcome::Missing | ToggleOutcome::NotAFolder)) => {
                warn!(%path, ?outcome, "toggle target is not a materialized folder");
                outcome
            }
            Step::Done(outcome) => {
                debug!(%path, ?outcome, "toggled folder");
                outcome
            }
        }
    }

    async fn load_children(&self, path: &NodePath) -> ToggleOutcome {
        match self.backend.list(path).await {
            Ok(nodes) => {
                let children = normalize_listing(nodes);
                debug!(%path, entries = children.len(), "loaded folder");
                self.store.update(|s| {
                    s.tree = tree::set_folder_state(&s.tree, path, FolderPatch {
                        is_open: Some(true),
                        is_loading_children: Some(false),
                        children: Some(children),
                    });
                });
                ToggleOutcome::Fetched
            }
            Err(e) => {
                error!(%path, error = %e, "failed to list folder");
                self.store.update(|s| {
                    s.tree = tree::set_folder_state(&s.tree, path, FolderPatch {
                        is_open: Some(false),
                        is_loading_children: Some(false),
                        ..Default::default()
                    });
                });
                self.notifier.notify(
                    &format!("Could not open folder {}: {e}", path.name()),
                    NoticeLevel::Error,
                );
                ToggleOutcome::FetchFailed
            }
        }
    }

    /// Create an empty file or folder named `name` inside `parent`.
    ///
    /// Returns `Ok(false)` when the backend refused; the user has been told.
    pub async fn create_entry(&self, parent: &NodePath, name: &str, kind: EntryKind) -> Result<bool> {
        validate_name(name)?;
        let path = parent.join(name);
        match self.backend.create(&path, kind).await {
            Ok(node) => {
                self.store.update(|s| apply_event(s, &reconciler::created(node)));
                let what = match kind {
                    EntryKind::File => "file",
                    EntryKind::Directory => "folder",
                };
                info!(%path, "created {what}");
                self.notifier
                    .notify(&format!("Created {what} {name}"), NoticeLevel::Info);
                Ok(true)
            }
            Err(e) => {
                self.fail(&format!("Could not create {name}"), &e);
                Ok(false)
            }
        }
    }

    /// Rename the entry at `path` to `new_name` within the same folder.
    pub async fn rename_entry(&self, path: &NodePath, new_name: &str) -> Result<bool> {
        validate_name(new_name)?;
        let Some(parent) = path.parent() else {
            return Err(AppError::InvalidPath(path.to_string()));
        };
        let new_path = parent.join(new_name);
        if new_path == *path {
            return Ok(true);
        }
        match self.backend.rename(path, &new_path).await {
            Ok(node) => {
                let event = FileSystemEvent::Renamed {
                    old_path: path.clone(),
                    new_path: new_path.clone(),
                    item: Some(node),
                };
                self.store.update(|s| apply_event(s, &event));
                info!(from = %path, to = %new_path, "renamed entry");
                self.notifier.notify(
                    &format!("Renamed {} to {new_name}", path.name()),
                    NoticeLevel::Info,
                );
                Ok(true)
            }
            Err(e) => {
                self.fail(&format!("Could not rename {}", path.name()), &e);
                Ok(false)
            }
        }
    }

    /// Delete the entry at `path`; open tabs at or below it are closed.
    pub async fn delete_entry(&self, path: &NodePath) -> Result<bool> {
        if path.parent().is_none() {
            return Err(AppError::InvalidPath(path.to_string()));
        }
        match self.backend.delete(path).await {
            Ok(()) => {
                let event = FileSystemEvent::Deleted { path: path.clone() };
                self.store.update(|s| apply_event(s, &event));
                info!(%path, "deleted entry");
                self.notifier
                    .notify(&format!("Deleted {}", path.name()), NoticeLevel::Info);
                Ok(true)
            }
            Err(e) => {
                self.fail(&format!("Could not delete {}", path.name()), &e);
                Ok(false)
            }
        }
    }

    fn fail(&self, what: &str, e: &AppError) {
        error!(error = %e, "{what}");
        self.notifier.notify(&format!("{what}: {e}"), NoticeLevel::Error);
    }
}
