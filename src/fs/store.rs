//! Explicit state container for the explorer: tree, tabs, buffers and the
//! browse root, behind one lock, with a revision channel for re-render.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

use crate::fs::path::NodePath;
use crate::fs::tree::{self, compare_nodes, FileNode, Forest};

/// In-memory contents of an open editor tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorBuffer {
    pub content: String,
    pub original_content: String,
    pub language: Option<String>,
}

impl EditorBuffer {
    pub fn new(content: impl Into<String>, language: Option<String>) -> Self {
        let content = content.into();
        Self {
            original_content: content.clone(),
            content,
            language,
        }
    }

    pub fn unsaved(&self) -> bool {
        self.content != self.original_content
    }
}

/// Everything the explorer and the tab bar render from.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub browse_root: NodePath,
    pub tree: Forest,
    /// Tab order, without duplicates.
    pub open_files: Vec<NodePath>,
    pub buffers: HashMap<NodePath, EditorBuffer>,
    pub active_file: Option<NodePath>,
}

/// Broken invariant found by [`verify_forest`] or [`Session::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("path {0} appears more than once")]
    DuplicatePath(NodePath),
    #[error("node {path} should live at {expected}")]
    PathMismatch { path: NodePath, expected: NodePath },
    #[error("children of {0} are out of order")]
    Unsorted(NodePath),
    #[error("tab {0} is open twice")]
    DuplicateTab(NodePath),
    #[error("buffer {0} has no open tab")]
    OrphanBuffer(NodePath),
    #[error("active file {0} is not an open tab")]
    InactiveFocus(NodePath),
}

/// Check path uniqueness, parent/name consistency and sibling order.
pub fn verify_forest(forest: &Forest, browse_root: &NodePath) -> Result<(), InvariantViolation> {
    let mut seen = HashSet::new();
    verify_level(forest, browse_root, &mut seen)
}

fn verify_level(
    forest: &Forest,
    parent: &NodePath,
    seen: &mut HashSet<NodePath>,
) -> Result<(), InvariantViolation> {
    if forest
        .windows(2)
        .any(|pair| compare_nodes(&pair[0], &pair[1]) == std::cmp::Ordering::Greater)
    {
        return Err(InvariantViolation::Unsorted(parent.clone()));
    }
    for node in forest {
        let expected = parent.join(node.name());
        if *node.path() != expected {
            return Err(InvariantViolation::PathMismatch {
                path: node.path().clone(),
                expected,
            });
        }
        if !seen.insert(node.path().clone()) {
            return Err(InvariantViolation::DuplicatePath(node.path().clone()));
        }
        if let Some(children) = node.children() {
            verify_level(children, node.path(), seen)?;
        }
    }
    Ok(())
}

impl Session {
    pub fn new(browse_root: NodePath) -> Self {
        Self {
            browse_root,
            ..Default::default()
        }
    }

    pub fn verify(&self) -> Result<(), InvariantViolation> {
        verify_forest(&self.tree, &self.browse_root)?;
        let mut tabs = HashSet::new();
        for path in &self.open_files {
            if !tabs.insert(path) {
                return Err(InvariantViolation::DuplicateTab(path.clone()));
            }
        }
        if let Some(orphan) = self.buffers.keys().find(|p| !tabs.contains(p)) {
            return Err(InvariantViolation::OrphanBuffer(orphan.clone()));
        }
        match &self.active_file {
            Some(active) if !tabs.contains(active) => {
                Err(InvariantViolation::InactiveFocus(active.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Open (or focus) a tab; an existing buffer is kept as is.
    pub fn open_file(&mut self, path: NodePath, content: String, language: Option<String>) {
        if !self.open_files.contains(&path) {
            self.open_files.push(path.clone());
        }
        self.buffers
            .entry(path.clone())
            .or_insert_with(|| EditorBuffer::new(content, language));
        self.active_file = Some(path);
    }

    /// Close a tab. Focus moves to the tab on the left, or the new first tab.
    pub fn close_file(&mut self, path: &NodePath) -> bool {
        let Some(idx) = self.open_files.iter().position(|p| p == path) else {
            return false;
        };
        self.open_files.remove(idx);
        self.buffers.remove(path);
        if self.active_file.as_ref() == Some(path) {
            self.active_file = self
                .open_files
                .get(idx.saturating_sub(1))
                .or_else(|| self.open_files.first())
                .cloned();
        }
        true
    }

    pub fn set_active(&mut self, path: &NodePath) -> bool {
        if self.open_files.contains(path) {
            self.active_file = Some(path.clone());
            true
        } else {
            false
        }
    }

    pub fn edit_buffer(&mut self, path: &NodePath, content: String) -> bool {
        match self.buffers.get_mut(path) {
            Some(buffer) => {
                buffer.content = content;
                true
            }
            None => false,
        }
    }

    pub fn mark_saved(&mut self, path: &NodePath) -> bool {
        match self.buffers.get_mut(path) {
            Some(buffer) => {
                buffer.original_content = buffer.content.clone();
                true
            }
            None => false,
        }
    }

    /// Close every tab at or below `path`. Returns the closed paths.
    ///
    /// Unsaved edits in those buffers are discarded.
    pub fn cascade_delete(&mut self, path: &NodePath) -> Vec<NodePath> {
        let (closed, kept): (Vec<_>, Vec<_>) = self
            .open_files
            .drain(..)
            .partition(|open| path.contains(open));
        self.open_files = kept;
        for gone in &closed {
            self.buffers.remove(gone);
        }
        if self.active_file.as_ref().is_some_and(|a| path.contains(a)) {
            self.active_file = None;
        }
        closed
    }

    /// Retarget every tab at or below `old` to the same place below `new`.
    ///
    /// Returns `(before, after)` pairs. A retargeted tab that lands on an
    /// already open path is merged into it; the moved buffer wins.
    pub fn cascade_rename(&mut self, old: &NodePath, new: &NodePath) -> Vec<(NodePath, NodePath)> {
        let mut moved = Vec::new();
        let mut tabs: Vec<NodePath> = Vec::with_capacity(self.open_files.len());
        for open in self.open_files.drain(..) {
            let target = match open.rebase(old, new) {
                Some(target) => {
                    moved.push((open, target.clone()));
                    target
                }
                None => open,
            };
            if !tabs.contains(&target) {
                tabs.push(target);
            }
        }
        self.open_files = tabs;

        let mut relocated = Vec::new();
        for (before, after) in &moved {
            if let Some(buffer) = self.buffers.remove(before) {
                relocated.push((after.clone(), buffer));
            }
        }
        self.buffers.extend(relocated);

        if let Some(active) = &self.active_file {
            if let Some(target) = active.rebase(old, new) {
                self.active_file = Some(target);
            }
        }
        moved
    }
}

/// Shared handle to the explorer [`Session`].
///
/// Mutations go through [`TreeStore::update`], which runs the closure under
/// the lock and then bumps the revision observed by [`TreeStore::subscribe`].
/// The lock is never held across an `.await`.
#[derive(Clone)]
pub struct TreeStore {
    session: Arc<Mutex<Session>>,
    revision: Arc<watch::Sender<u64>>,
}

impl TreeStore {
    pub fn new(browse_root: NodePath) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            session: Arc::new(Mutex::new(Session::new(browse_root))),
            revision: Arc::new(revision),
        }
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let result = {
            let mut session = self.session.lock();
            let result = f(&mut session);
            if cfg!(debug_assertions) {
                if let Err(violation) = session.verify() {
                    warn!(%violation, "explorer state invariant broken");
                }
            }
            result
        };
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
        result
    }

    pub fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.session.lock())
    }

    /// Receiver that changes whenever the session is updated.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn snapshot(&self) -> Session {
        self.read(Session::clone)
    }

    pub fn tree(&self) -> Forest {
        self.read(|s| s.tree.clone())
    }

    pub fn find(&self, path: &NodePath) -> Option<Arc<FileNode>> {
        self.read(|s| tree::find(&s.tree, path))
    }

    pub fn browse_root(&self) -> NodePath {
        self.read(|s| s.browse_root.clone())
    }

    /// Navigate the explorer; the current tree is discarded.
    pub fn set_browse_root(&self, root: NodePath) {
        self.update(|s| {
            s.browse_root = root;
            s.tree.clear();
        });
    }

    pub fn open_files(&self) -> Vec<NodePath> {
        self.read(|s| s.open_files.clone())
    }

    pub fn active_file(&self) -> Option<NodePath> {
        self.read(|s| s.active_file.clone())
    }

    pub fn buffer(&self, path: &NodePath) -> Option<EditorBuffer> {
        self.read(|s| s.buffers.get(path).cloned())
    }

    pub fn open_file(&self, path: NodePath, content: impl Into<String>, language: Option<String>) {
        let content = content.into();
        self.update(|s| s.open_file(path, content, language));
    }

    pub fn close_file(&self, path: &NodePath) -> bool {
        self.update(|s| s.close_file(path))
    }

    pub fn set_active(&self, path: &NodePath) -> bool {
        self.update(|s| s.set_active(path))
    }

    pub fn edit_buffer(&self, path: &NodePath, content: impl Into<String>) -> bool {
        let content = content.into();
        self.update(|s| s.edit_buffer(path, content))
    }

    pub fn mark_saved(&self, path: &NodePath) -> bool {
        self.update(|s| s.mark_saved(path))
    }
}
