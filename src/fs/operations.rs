use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::fs::path::NodePath;
use crate::fs::tree::{EntryKind, FileNode};

/// File service the explorer talks to.
///
/// `list` returns the immediate children of a directory. Directories in the
/// result may leave `children` and `is_open` unset.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list(&self, path: &NodePath) -> Result<Vec<FileNode>>;

    /// Create an empty file or directory and describe it.
    async fn create(&self, path: &NodePath, kind: EntryKind) -> Result<FileNode>;

    /// Move `from` to `to` and describe the entry at its new location.
    async fn rename(&self, from: &NodePath, to: &NodePath) -> Result<FileNode>;

    /// Delete a file, or a directory recursively.
    async fn delete(&self, path: &NodePath) -> Result<()>;
}

/// Editor language hint from a file extension.
pub fn detect_language(path: &str) -> Option<String> {
    let ext = Path::new(path).extension()?.to_str()?.to_lowercase();
    let language = match ext.as_str() {
        "rs" => "rust",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" => "python",
        "go" => "go",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "md" | "markdown" => "markdown",
        "html" | "htm" => "html",
        "css" => "css",
        "sh" | "bash" => "shell",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        _ => return None,
    };
    Some(language.to_string())
}

/// Describe a path on the local disk, following symlinks. `None` when the
/// path cannot be read (already gone, broken link, permission denied).
pub fn describe_local(path: &Path) -> Option<FileNode> {
    let metadata = std::fs::metadata(path).ok()?;
    Some(node_for(NodePath::from(path), metadata.is_dir()))
}

fn node_for(path: NodePath, is_dir: bool) -> FileNode {
    if is_dir {
        FileNode::directory(path)
    } else {
        let language = detect_language(path.as_str());
        FileNode::file(path, language)
    }
}

/// [`Backend`] over the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self
    }

    fn local(path: &NodePath) -> PathBuf {
        PathBuf::from(path.as_str())
    }

    async fn describe(path: &NodePath) -> Result<FileNode> {
        let metadata = fs::metadata(Self::local(path)).await?;
        Ok(node_for(path.clone(), metadata.is_dir()))
    }
}

#[async_trait]
impl Backend for LocalBackend {
    /// Permission-denied entries and broken symlinks are skipped.
    async fn list(&self, path: &NodePath) -> Result<Vec<FileNode>> {
        let mut entries = fs::read_dir(Self::local(path)).await?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let child = path.join(&entry.file_name().to_string_lossy());
            match fs::metadata(entry.path()).await {
                Ok(metadata) => children.push(node_for(child, metadata.is_dir())),
                Err(e) => debug!(path = %child, error = %e, "skipping unreadable entry"),
            }
        }
        Ok(children)
    }

    async fn create(&self, path: &NodePath, kind: EntryKind) -> Result<FileNode> {
        let local = Self::local(path);
        match kind {
            EntryKind::Directory => fs::create_dir(&local).await?,
            EntryKind::File => {
                fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&local)
                    .await?;
            }
        }
        Self::describe(path).await
    }

    async fn rename(&self, from: &NodePath, to: &NodePath) -> Result<FileNode> {
        let target = Self::local(to);
        if fs::try_exists(&target).await? {
            return Err(AppError::Backend(format!("{to} already exists")));
        }
        fs::rename(Self::local(from), &target).await?;
        Self::describe(to).await
    }

    async fn delete(&self, path: &NodePath) -> Result<()> {
        let local = Self::local(path);
        if fs::symlink_metadata(&local).await?.is_dir() {
            fs::remove_dir_all(&local).await?;
        } else {
            fs::remove_file(&local).await?;
        }
        Ok(())
    }
}
