//! Slash-separated node paths and the ancestor/rename algebra over them.
//!
//! Every ancestor or prefix question in the engine goes through [`NodePath`]
//! so that separators are normalized once, at construction.

use std::fmt;

use serde::{Deserialize, Serialize};

const SEPARATOR: char = '/';

/// A normalized path identifying one node in the explorer tree.
///
/// Backslashes become `/`, repeated separators collapse, and a trailing
/// separator is dropped (except for the root `/` itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NodePath(String);

impl NodePath {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref();
        let mut out = String::with_capacity(raw.len());
        let mut last_was_sep = false;
        for ch in raw.chars() {
            let ch = if ch == '\\' { SEPARATOR } else { ch };
            if ch == SEPARATOR {
                if last_was_sep {
                    continue;
                }
                last_was_sep = true;
            } else {
                last_was_sep = false;
            }
            out.push(ch);
        }
        if out.len() > 1 && out.ends_with(SEPARATOR) {
            out.pop();
        }
        Self(out)
    }

    /// The filesystem root `/`.
    pub fn root() -> Self {
        Self(SEPARATOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment. Empty for the root.
    pub fn name(&self) -> &str {
        match self.0.rfind(SEPARATOR) {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Containing directory, or `None` for the root and single-segment paths.
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    pub fn join(&self, name: &str) -> NodePath {
        if self.is_root() {
            Self::new(format!("/{name}"))
        } else if self.is_empty() {
            Self::new(name)
        } else {
            Self::new(format!("{}/{}", self.0, name))
        }
    }

    /// Strict ancestor test: `/a` is an ancestor of `/a/b` but not of `/a`
    /// or `/ab`.
    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        if self.0.len() >= other.0.len() {
            return false;
        }
        if self.is_root() {
            return other.0.starts_with(SEPARATOR);
        }
        other.0.starts_with(&self.0) && other.0[self.0.len()..].starts_with(SEPARATOR)
    }

    /// `self` equals `other` or is an ancestor of it.
    pub fn contains(&self, other: &NodePath) -> bool {
        self == other || self.is_ancestor_of(other)
    }

    /// Substitute the `old` prefix of `self` with `new`.
    ///
    /// Returns `None` when `self` is neither `old` nor nested under it.
    pub fn rebase(&self, old: &NodePath, new: &NodePath) -> Option<NodePath> {
        if self == old {
            return Some(new.clone());
        }
        if !old.is_ancestor_of(self) {
            return None;
        }
        let suffix = if old.is_root() {
            &self.0[1..]
        } else {
            &self.0[old.0.len() + 1..]
        };
        Some(new.join(suffix))
    }

    /// Paths strictly between `ancestor` and `self`, outermost first,
    /// including `self`.
    pub fn descend_from(&self, ancestor: &NodePath) -> Vec<NodePath> {
        let mut chain = Vec::new();
        let mut current = Some(self.clone());
        while let Some(path) = current {
            if !ancestor.is_ancestor_of(&path) {
                break;
            }
            current = path.parent();
            chain.push(path);
        }
        chain.reverse();
        chain
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NodePath {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for NodePath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<&std::path::Path> for NodePath {
    fn from(path: &std::path::Path) -> Self {
        Self::new(path.to_string_lossy())
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.0
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators() {
        assert_eq!(NodePath::new("C:\\work\\src").as_str(), "C:/work/src");
        assert_eq!(NodePath::new("/a//b///c/").as_str(), "/a/b/c");
        assert_eq!(NodePath::new("/").as_str(), "/");
        assert_eq!(NodePath::new("//").as_str(), "/");
    }

    #[test]
    fn name_and_parent() {
        let path = NodePath::new("/src/lib/mod.rs");
        assert_eq!(path.name(), "mod.rs");
        assert_eq!(path.parent(), Some(NodePath::new("/src/lib")));
        assert_eq!(NodePath::new("/src").parent(), Some(NodePath::root()));
        assert_eq!(NodePath::root().parent(), None);
        assert_eq!(NodePath::root().name(), "");
        assert_eq!(NodePath::new("relative").parent(), None);
    }

    #[test]
    fn join_handles_root() {
        assert_eq!(NodePath::root().join("src").as_str(), "/src");
        assert_eq!(NodePath::new("/src").join("a.ts").as_str(), "/src/a.ts");
    }

    #[test]
    fn ancestor_requires_separator_boundary() {
        let src = NodePath::new("/src");
        assert!(src.is_ancestor_of(&NodePath::new("/src/a.ts")));
        assert!(src.is_ancestor_of(&NodePath::new("/src/deep/a.ts")));
        assert!(!src.is_ancestor_of(&NodePath::new("/src")));
        assert!(!src.is_ancestor_of(&NodePath::new("/srcfoo/a.ts")));
        assert!(!src.is_ancestor_of(&NodePath::new("/")));
        assert!(NodePath::root().is_ancestor_of(&src));
        assert!(src.contains(&src));
    }

    #[test]
    fn rebase_substitutes_prefix_only() {
        let old = NodePath::new("/src");
        let new = NodePath::new("/lib");
        assert_eq!(
            NodePath::new("/src/a.ts").rebase(&old, &new),
            Some(NodePath::new("/lib/a.ts"))
        );
        assert_eq!(NodePath::new("/src").rebase(&old, &new), Some(new.clone()));
        assert_eq!(NodePath::new("/srcfoo/a.ts").rebase(&old, &new), None);
        // Only the leading prefix moves, not a later repeat of the same text.
        assert_eq!(
            NodePath::new("/src/src/a.ts").rebase(&old, &new),
            Some(NodePath::new("/lib/src/a.ts"))
        );
    }

    #[test]
    fn descend_from_lists_intermediate_dirs() {
        let chain = NodePath::new("/a/b/c").descend_from(&NodePath::new("/a"));
        assert_eq!(chain, vec![NodePath::new("/a/b"), NodePath::new("/a/b/c")]);
        assert!(NodePath::new("/x").descend_from(&NodePath::new("/a")).is_empty());
    }

    #[test]
    fn serde_round_trips_through_string() {
        let path: NodePath = serde_json::from_str("\"/a//b/\"").unwrap();
        assert_eq!(path.as_str(), "/a/b");
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"/a/b\"");
    }
}
