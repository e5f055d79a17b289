use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::config::AppConfig;
use crate::error::Result;
use crate::event::FileSystemEvent;
use crate::fs::manager::{ToggleOutcome, TreeManager};
use crate::fs::operations::LocalBackend;
use crate::fs::path::NodePath;
use crate::fs::reconciler::{EventOutcome, RealtimeReconciler};
use crate::fs::store::TreeStore;
use crate::fs::tree::{flatten, EntryKind};
use crate::status::{NoticeLevel, StatusLine};

/// The explorer engine wired over the local filesystem.
pub struct App {
    pub store: TreeStore,
    pub manager: TreeManager,
    pub reconciler: RealtimeReconciler,
    pub status: Arc<StatusLine>,
}

impl App {
    /// Create an explorer browsing `path`. Nothing is listed until [`App::load`].
    pub fn new(path: &Path, config: &AppConfig) -> Self {
        let store = TreeStore::new(NodePath::from(path));
        let status = Arc::new(StatusLine::new());
        let manager = TreeManager::new(
            store.clone(),
            Arc::new(LocalBackend::new()),
            status.clone(),
            NodePath::from(config.fallback_path().as_path()),
        );
        let reconciler = RealtimeReconciler::new(store.clone()).with_notifier(status.clone());
        Self {
            store,
            manager,
            reconciler,
            status,
        }
    }

    /// List the browse root. If it cannot be listed, the fallback directory
    /// is listed instead.
    pub async fn load(&self) {
        let requested = self.store.browse_root();
        self.manager.fetch_root().await;
        if self.store.browse_root() != requested {
            self.manager.fetch_root().await;
        }
    }

    /// Expand `path` and every closed folder above it, outermost first.
    pub async fn expand(&self, path: &NodePath) -> ToggleOutcome {
        let root = self.store.browse_root();
        let mut outcome = ToggleOutcome::Missing;
        for folder in path.descend_from(&root) {
            let open = self
                .store
                .find(&folder)
                .and_then(|node| node.as_dir().map(|d| d.is_open));
            outcome = match open {
                Some(true) => ToggleOutcome::Expanded,
                _ => self.manager.toggle_folder(&folder).await,
            };
            if !matches!(outcome, ToggleOutcome::Expanded | ToggleOutcome::Fetched) {
                break;
            }
        }
        outcome
    }

    /// Apply newline-delimited JSON events in order. Blank lines are skipped;
    /// undecodable lines are logged and skipped.
    pub fn replay(&self, lines: &str) -> Vec<EventOutcome> {
        let mut outcomes = Vec::new();
        for (number, line) in lines.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match FileSystemEvent::from_json(line) {
                Ok(event) => outcomes.push(self.reconciler.apply(event)),
                Err(e) => warn!(line = number + 1, error = %e, "skipping undecodable event"),
            }
        }
        outcomes
    }

    /// Read a replay file from disk and apply it.
    pub async fn replay_file(&self, path: &Path) -> Result<Vec<EventOutcome>> {
        let lines = tokio::fs::read_to_string(path).await?;
        Ok(self.replay(&lines))
    }

    /// Get the directory being browsed.
    pub fn current_dir(&self) -> PathBuf {
        PathBuf::from(self.store.browse_root().as_str())
    }

    /// Plain-text rendering: the visible tree, the open tabs, then the
    /// current notice.
    pub fn render(&self) -> String {
        self.status.clear_expired();
        let session = self.store.snapshot();
        let mut out = String::new();
        let _ = writeln!(out, "{}", session.browse_root);

        for item in flatten(&session.tree) {
            let indent = "  ".repeat(item.depth);
            let marker = match (item.kind, item.is_open) {
                (EntryKind::Directory, true) => "▾ ",
                (EntryKind::Directory, false) => "▸ ",
                (EntryKind::File, _) => "  ",
            };
            let loading = if item.is_loading { " …" } else { "" };
            let _ = writeln!(out, "{indent}{marker}{}{loading}", item.name);
        }

        if !session.open_files.is_empty() {
            let tabs: Vec<String> = session
                .open_files
                .iter()
                .map(|path| {
                    let dirty = session.buffers.get(path).is_some_and(|b| b.unsaved());
                    let name = format!("{}{}", path.name(), if dirty { "*" } else { "" });
                    if session.active_file.as_ref() == Some(path) {
                        format!("[{name}]")
                    } else {
                        name
                    }
                })
                .collect();
            let _ = writeln!(out, "tabs: {}", tabs.join(" "));
        }

        if let Some(notice) = self.status.current() {
            let prefix = match notice.level {
                NoticeLevel::Info => "",
                NoticeLevel::Error => "error: ",
            };
            let _ = writeln!(out, "{prefix}{}", notice.message);
        }
        out
    }
}
