//! Explorer tree nodes and the pure functions that rewrite a forest.
//!
//! Every mutator takes the current forest by reference and returns a new
//! one. Nodes are reference counted, so only the nodes on the path from the
//! top level down to the changed node are re-allocated; everything else is
//! shared with the input.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::fs::path::NodePath;

/// An ordered list of sibling nodes.
pub type Forest = Vec<Arc<FileNode>>;

/// Kind of an explorer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A file leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: NodePath,
    /// Content-type hint for icon and editor mode selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A directory whose children are fetched lazily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub path: NodePath,
    /// `None` until a listing has been fetched; `Some(vec![])` for a fetched
    /// empty directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Forest>,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub is_loading_children: bool,
}

/// A node in the explorer tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FileNode {
    File(FileEntry),
    Directory(DirectoryEntry),
}

impl FileNode {
    pub fn file(path: impl Into<NodePath>, language: Option<String>) -> Self {
        let path = path.into();
        FileNode::File(FileEntry {
            name: path.name().to_string(),
            path,
            language,
        })
    }

    /// A closed directory whose children have not been fetched.
    pub fn directory(path: impl Into<NodePath>) -> Self {
        let path = path.into();
        FileNode::Directory(DirectoryEntry {
            name: path.name().to_string(),
            path,
            children: None,
            is_open: false,
            is_loading_children: false,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            FileNode::File(f) => &f.name,
            FileNode::Directory(d) => &d.name,
        }
    }

    pub fn path(&self) -> &NodePath {
        match self {
            FileNode::File(f) => &f.path,
            FileNode::Directory(d) => &d.path,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            FileNode::File(_) => EntryKind::File,
            FileNode::Directory(_) => EntryKind::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileNode::Directory(_))
    }

    pub fn as_dir(&self) -> Option<&DirectoryEntry> {
        match self {
            FileNode::Directory(d) => Some(d),
            FileNode::File(_) => None,
        }
    }

    pub fn children(&self) -> Option<&Forest> {
        self.as_dir().and_then(|d| d.children.as_ref())
    }
}

/// Sibling order: directories first, then names compared case-insensitively,
/// with the exact name as the tie breaker.
pub fn compare_nodes(a: &FileNode, b: &FileNode) -> Ordering {
    b.is_dir()
        .cmp(&a.is_dir())
        .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
        .then_with(|| a.name().cmp(b.name()))
}

/// True when both forests hold the very same node allocations.
pub fn same_forest(a: &Forest, b: &Forest) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}

/// Find the node at `path` anywhere in the forest.
pub fn find(forest: &Forest, path: &NodePath) -> Option<Arc<FileNode>> {
    for node in forest {
        if node.path() == path {
            return Some(node.clone());
        }
        if node.path().is_ancestor_of(path) {
            return node.children().and_then(|children| find(children, path));
        }
    }
    None
}

/// Insert `node` into a sorted sibling list, replacing any sibling at the
/// same path.
fn insert_sorted(siblings: &Forest, node: Arc<FileNode>) -> Forest {
    let mut out: Forest = siblings
        .iter()
        .filter(|s| s.path() != node.path())
        .cloned()
        .collect();
    let at = out.partition_point(|s| compare_nodes(s, &node) == Ordering::Less);
    out.insert(at, node);
    out
}

fn replace_at(forest: &Forest, index: usize, node: FileNode) -> Forest {
    let mut out = forest.clone();
    out[index] = Arc::new(node);
    out
}

/// Insert `node` under `parent`.
///
/// When `parent` is the browse root the node goes to the top level.
/// Otherwise the ancestor chain is walked: the parent directory receives the
/// node and is forced open, and an ancestor with unfetched children is seeded
/// with the chain of directories leading to the node, all forced open. If no
/// materialized ancestor exists the returned forest is the input.
pub fn insert(forest: &Forest, parent: &NodePath, node: FileNode, browse_root: &NodePath) -> Forest {
    let node = Arc::new(node);
    if parent == browse_root {
        return insert_sorted(forest, node);
    }
    insert_under(forest, parent, &node).unwrap_or_else(|| forest.clone())
}

fn insert_under(forest: &Forest, parent: &NodePath, node: &Arc<FileNode>) -> Option<Forest> {
    for (i, entry) in forest.iter().enumerate() {
        let FileNode::Directory(dir) = entry.as_ref() else {
            continue;
        };
        if dir.path == *parent {
            let children = match &dir.children {
                Some(children) => insert_sorted(children, node.clone()),
                None => vec![node.clone()],
            };
            return Some(replace_at(
                forest,
                i,
                FileNode::Directory(DirectoryEntry {
                    children: Some(children),
                    is_open: true,
                    ..dir.clone()
                }),
            ));
        }
        if dir.path.is_ancestor_of(parent) {
            let children = match &dir.children {
                Some(children) => insert_under(children, parent, node)?,
                None => vec![Arc::new(seed_chain(&dir.path, parent, node.clone()))],
            };
            return Some(replace_at(
                forest,
                i,
                FileNode::Directory(DirectoryEntry {
                    children: Some(children),
                    is_open: true,
                    ..dir.clone()
                }),
            ));
        }
    }
    None
}

/// Open directories from just below `ancestor` down to `parent`, each holding
/// only the next link, with `leaf` at the bottom.
///
/// These are partial listings: the seeded directories, and the unfetched
/// ancestor that receives them, count as loaded afterwards, so reopening them
/// shows only the seeded chain until the folder is listed again.
fn seed_chain(ancestor: &NodePath, parent: &NodePath, leaf: Arc<FileNode>) -> FileNode {
    let mut current = leaf;
    for dir_path in parent.descend_from(ancestor).into_iter().rev() {
        current = Arc::new(FileNode::Directory(DirectoryEntry {
            name: dir_path.name().to_string(),
            path: dir_path,
            children: Some(vec![current]),
            is_open: true,
            is_loading_children: false,
        }));
    }
    Arc::try_unwrap(current).unwrap_or_else(|shared| shared.as_ref().clone())
}

/// Remove the node at `path`, returning the new forest and the removed
/// subtree (if it was materialized).
pub fn remove(forest: &Forest, path: &NodePath) -> (Forest, Option<Arc<FileNode>>) {
    match remove_from(forest, path) {
        Some((out, removed)) => (out, Some(removed)),
        None => (forest.clone(), None),
    }
}

fn remove_from(forest: &Forest, path: &NodePath) -> Option<(Forest, Arc<FileNode>)> {
    for (i, entry) in forest.iter().enumerate() {
        if entry.path() == path {
            let mut out = forest.clone();
            let removed = out.remove(i);
            return Some((out, removed));
        }
        if entry.path().is_ancestor_of(path) {
            let FileNode::Directory(dir) = entry.as_ref() else {
                return None;
            };
            let (children, removed) = remove_from(dir.children.as_ref()?, path)?;
            let out = replace_at(
                forest,
                i,
                FileNode::Directory(DirectoryEntry {
                    children: Some(children),
                    ..dir.clone()
                }),
            );
            return Some((out, removed));
        }
    }
    None
}

/// Rewrite every path in the subtree from `old_base` to `new_base`,
/// recomputing names from the last segment.
pub fn rename_paths(node: &FileNode, old_base: &NodePath, new_base: &NodePath) -> FileNode {
    let path = node
        .path()
        .rebase(old_base, new_base)
        .unwrap_or_else(|| node.path().clone());
    let name = path.name().to_string();
    match node {
        FileNode::File(file) => FileNode::File(FileEntry {
            name,
            path,
            language: file.language.clone(),
        }),
        FileNode::Directory(dir) => FileNode::Directory(DirectoryEntry {
            name,
            path,
            children: dir.children.as_ref().map(|children| {
                children
                    .iter()
                    .map(|child| Arc::new(rename_paths(child, old_base, new_base)))
                    .collect()
            }),
            is_open: dir.is_open,
            is_loading_children: dir.is_loading_children,
        }),
    }
}

/// Partial update applied to a directory node.
#[derive(Debug, Clone, Default)]
pub struct FolderPatch {
    pub is_open: Option<bool>,
    pub is_loading_children: Option<bool>,
    pub children: Option<Forest>,
}

/// Shallow-merge `patch` into the directory at `path`.
pub fn set_folder_state(forest: &Forest, path: &NodePath, patch: FolderPatch) -> Forest {
    patch_under(forest, path, patch).unwrap_or_else(|| forest.clone())
}

fn patch_under(forest: &Forest, path: &NodePath, patch: FolderPatch) -> Option<Forest> {
    for (i, entry) in forest.iter().enumerate() {
        let FileNode::Directory(dir) = entry.as_ref() else {
            continue;
        };
        if dir.path == *path {
            let updated = DirectoryEntry {
                is_open: patch.is_open.unwrap_or(dir.is_open),
                is_loading_children: patch.is_loading_children.unwrap_or(dir.is_loading_children),
                children: patch.children.or_else(|| dir.children.clone()),
                ..dir.clone()
            };
            return Some(replace_at(forest, i, FileNode::Directory(updated)));
        }
        if dir.path.is_ancestor_of(path) {
            let children = patch_under(dir.children.as_ref()?, path, patch)?;
            return Some(replace_at(
                forest,
                i,
                FileNode::Directory(DirectoryEntry {
                    children: Some(children),
                    ..dir.clone()
                }),
            ));
        }
    }
    None
}

/// Sort every loaded level and drop later duplicates of a path.
pub fn sort_forest(nodes: Vec<FileNode>) -> Forest {
    let mut seen = std::collections::HashSet::new();
    let mut out: Forest = nodes
        .into_iter()
        .filter(|node| seen.insert(node.path().clone()))
        .map(|node| match node {
            FileNode::Directory(mut dir) => {
                dir.children = dir.children.map(|children| {
                    sort_forest(children.iter().map(|c| c.as_ref().clone()).collect())
                });
                Arc::new(FileNode::Directory(dir))
            }
            file => Arc::new(file),
        })
        .collect();
    out.sort_by(|a, b| compare_nodes(a, b));
    out
}

/// A visible explorer row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatItem {
    pub name: String,
    pub path: NodePath,
    pub kind: EntryKind,
    pub depth: usize,
    pub is_open: bool,
    pub is_loading: bool,
    pub is_last_sibling: bool,
}

/// Rows the explorer shows: every top-level node plus the children of open
/// directories, depth first.
pub fn flatten(forest: &Forest) -> Vec<FlatItem> {
    let mut items = Vec::new();
    flatten_level(forest, 0, &mut items);
    items
}

fn flatten_level(forest: &Forest, depth: usize, items: &mut Vec<FlatItem>) {
    for (i, node) in forest.iter().enumerate() {
        let dir = node.as_dir();
        items.push(FlatItem {
            name: node.name().to_string(),
            path: node.path().clone(),
            kind: node.kind(),
            depth,
            is_open: dir.is_some_and(|d| d.is_open),
            is_loading: dir.is_some_and(|d| d.is_loading_children),
            is_last_sibling: i + 1 == forest.len(),
        });
        if let Some(dir) = dir {
            if dir.is_open {
                if let Some(children) = &dir.children {
                    flatten_level(children, depth + 1, items);
                }
            }
        }
    }
}
