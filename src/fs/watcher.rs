use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::event::FileSystemEvent;
use crate::fs::operations::describe_local;
use crate::fs::path::NodePath;

/// Default patterns to ignore when watching the filesystem.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "target",
];

/// How many completed rename cookies to remember.
const SETTLED_RENAMES: usize = 64;

/// Pairs the two halves of a rename reported separately.
///
/// Backends that know both halves tag them with the same tracker; inotify
/// also follows the pair with a combined event, which is dropped once the
/// halves have been paired.
#[derive(Debug, Default)]
pub struct RenamePairing {
    pending: HashMap<usize, PathBuf>,
    settled: VecDeque<usize>,
}

impl RenamePairing {
    fn settle(&mut self, tracker: usize) {
        if self.settled.len() == SETTLED_RENAMES {
            self.settled.pop_front();
        }
        self.settled.push_back(tracker);
    }

    /// Unpaired sources are treated as deletions.
    fn flush(&mut self, out: &mut Vec<FileSystemEvent>) {
        for (_, path) in self.pending.drain() {
            out.push(FileSystemEvent::Deleted {
                path: NodePath::from(path.as_path()),
            });
        }
    }
}

fn created(path: &Path) -> FileSystemEvent {
    FileSystemEvent::Created {
        path: NodePath::from(path),
        item: describe_local(path),
    }
}

fn deleted(path: &Path) -> FileSystemEvent {
    FileSystemEvent::Deleted {
        path: NodePath::from(path),
    }
}

fn renamed(from: &Path, to: &Path) -> FileSystemEvent {
    FileSystemEvent::Renamed {
        old_path: NodePath::from(from),
        new_path: NodePath::from(to),
        item: describe_local(to),
    }
}

/// Translate one raw watcher event into explorer events.
pub fn translate(event: &Event, pairing: &mut RenamePairing) -> Vec<FileSystemEvent> {
    let mut out = Vec::new();
    let is_rename_target = matches!(event.kind, EventKind::Modify(ModifyKind::Name(RenameMode::To)));
    if !is_rename_target {
        pairing.flush(&mut out);
    }

    match &event.kind {
        EventKind::Create(_) => out.extend(event.paths.iter().map(|p| created(p))),
        EventKind::Remove(_) => out.extend(event.paths.iter().map(|p| deleted(p))),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let already_paired = event
                .tracker()
                .is_some_and(|t| pairing.settled.contains(&t));
            if let (false, [from, to, ..]) = (already_paired, event.paths.as_slice()) {
                out.push(renamed(from, to));
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for path in &event.paths {
                match event.tracker() {
                    Some(tracker) => {
                        pairing.pending.insert(tracker, path.clone());
                    }
                    None => out.push(deleted(path)),
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            for path in &event.paths {
                let source = event
                    .tracker()
                    .and_then(|t| pairing.pending.remove(&t).map(|from| (t, from)));
                match source {
                    Some((tracker, from)) => {
                        pairing.settle(tracker);
                        out.push(renamed(&from, path));
                    }
                    None => out.push(created(path)),
                }
            }
            // Any other unpaired source is stale now.
            pairing.flush(&mut out);
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            for path in &event.paths {
                out.push(if path.exists() { created(path) } else { deleted(path) });
            }
        }
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => {
            out.extend(event.paths.iter().map(|p| FileSystemEvent::Modified {
                path: NodePath::from(p.as_path()),
            }));
        }
        _ => {}
    }
    out
}

/// Filesystem watcher that monitors a root directory and sends explorer
/// events, in order, to `event_tx`.
pub struct FsWatcher {
    /// Dropped to stop watching.
    _watcher: RecommendedWatcher,
}

impl FsWatcher {
    /// Watch `root` recursively. Paths matching any of `ignore_patterns`
    /// are silently dropped.
    pub fn new(
        root: &Path,
        ignore_patterns: Vec<String>,
        event_tx: mpsc::UnboundedSender<FileSystemEvent>,
    ) -> Result<Self> {
        let mut pairing = RenamePairing::default();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    if event.paths.iter().any(|p| should_ignore(p, &ignore_patterns)) {
                        return;
                    }
                    for translated in translate(&event, &mut pairing) {
                        debug!(kind = translated.kind(), "filesystem change");
                        if event_tx.send(translated).is_err() {
                            return;
                        }
                    }
                }
                // Watcher errors are non-fatal
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            }
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        Ok(Self { _watcher: watcher })
    }
}

/// Check if a path should be ignored based on ignore patterns.
///
/// A path is ignored if any of its components match any ignore pattern exactly.
pub fn should_ignore(path: &Path, patterns: &[String]) -> bool {
    path.components().any(|component| match component {
        std::path::Component::Normal(name) => {
            let name = name.to_string_lossy();
            patterns.iter().any(|pattern| name == pattern.as_str())
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use tempfile::TempDir;

    fn rename_event(mode: RenameMode, paths: &[&Path], tracker: Option<usize>) -> Event {
        let mut event = Event::new(EventKind::Modify(ModifyKind::Name(mode)));
        for path in paths {
            event = event.add_path(path.to_path_buf());
        }
        match tracker {
            Some(t) => event.set_tracker(t),
            None => event,
        }
    }

    #[test]
    fn ignore_git_directory() {
        let patterns = vec![".git".to_string()];
        assert!(should_ignore(Path::new("/home/user/project/.git/HEAD"), &patterns));
        assert!(should_ignore(Path::new("/home/user/project/.git/objects/abc"), &patterns));
    }

    #[test]
    fn partial_name_does_not_match() {
        let patterns = vec!["target".to_string()];
        // exact component match only
        assert!(!should_ignore(Path::new("/project/target2/file.txt"), &patterns));
    }

    #[test]
    fn empty_patterns_ignore_nothing() {
        let patterns: Vec<String> = vec![];
        assert!(!should_ignore(Path::new("/project/.git/HEAD"), &patterns));
    }

    #[test]
    fn watching_missing_root_is_a_watcher_error() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = FsWatcher::new(&dir.path().join("missing"), Vec::new(), tx);
        assert!(matches!(result, Err(AppError::Watcher(_))));
    }

    #[tokio::test]
    async fn watcher_reports_new_file() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watcher = FsWatcher::new(dir.path(), Vec::new(), tx).unwrap();
        let file = dir.path().join("fresh.txt");
        std::fs::write(&file, "").unwrap();

        let expected = NodePath::from(file.as_path());
        let seen = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while let Some(event) = rx.recv().await {
                if matches!(&event, FileSystemEvent::Created { path, .. } if *path == expected) {
                    return true;
                }
            }
            false
        })
        .await;
        assert_eq!(seen, Ok(true));
    }

    #[test]
    fn create_event_describes_item() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("new.rs");
        std::fs::write(&file, "").unwrap();
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(file.clone());
        let out = translate(&event, &mut RenamePairing::default());
        match out.as_slice() {
            [FileSystemEvent::Created { path, item: Some(item) }] => {
                assert_eq!(path, &NodePath::from(file.as_path()));
                assert!(!item.is_dir());
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn create_of_vanished_path_has_no_item() {
        let event = Event::new(EventKind::Create(CreateKind::Any)).add_path("/nowhere/x".into());
        let out = translate(&event, &mut RenamePairing::default());
        assert!(matches!(out.as_slice(), [FileSystemEvent::Created { item: None, .. }]));
    }

    #[test]
    fn remove_and_data_change() {
        let mut pairing = RenamePairing::default();
        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path("/p/a".into());
        assert_eq!(
            translate(&removed, &mut pairing),
            vec![FileSystemEvent::Deleted { path: "/p/a".into() }]
        );
        let modified = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path("/p/b".into());
        assert_eq!(
            translate(&modified, &mut pairing),
            vec![FileSystemEvent::Modified { path: "/p/b".into() }]
        );
    }

    #[test]
    fn tracked_halves_pair_and_skip_combined_event() {
        let mut pairing = RenamePairing::default();
        let from = Path::new("/p/old.rs");
        let to = Path::new("/p/new.rs");

        assert!(translate(&rename_event(RenameMode::From, &[from], Some(7)), &mut pairing).is_empty());
        let out = translate(&rename_event(RenameMode::To, &[to], Some(7)), &mut pairing);
        assert!(matches!(
            out.as_slice(),
            [FileSystemEvent::Renamed { old_path, new_path, .. }]
                if old_path.as_str() == "/p/old.rs" && new_path.as_str() == "/p/new.rs"
        ));
        let out = translate(&rename_event(RenameMode::Both, &[from, to], Some(7)), &mut pairing);
        assert!(out.is_empty());
    }

    #[test]
    fn combined_event_alone_is_a_rename() {
        let out = translate(
            &rename_event(RenameMode::Both, &[Path::new("/p/a"), Path::new("/p/b")], None),
            &mut RenamePairing::default(),
        );
        assert!(matches!(out.as_slice(), [FileSystemEvent::Renamed { .. }]));
    }

    #[test]
    fn unpaired_source_becomes_delete() {
        let mut pairing = RenamePairing::default();
        translate(&rename_event(RenameMode::From, &[Path::new("/p/gone")], Some(3)), &mut pairing);
        let removed = Event::new(EventKind::Remove(RemoveKind::Any)).add_path("/p/other".into());
        assert_eq!(
            translate(&removed, &mut pairing),
            vec![
                FileSystemEvent::Deleted { path: "/p/gone".into() },
                FileSystemEvent::Deleted { path: "/p/other".into() },
            ]
        );
    }

    #[test]
    fn untracked_target_is_a_create() {
        let out = translate(
            &rename_event(RenameMode::To, &[Path::new("/nowhere/b")], None),
            &mut RenamePairing::default(),
        );
        assert!(matches!(out.as_slice(), [FileSystemEvent::Created { .. }]));
    }
}
