//! In-memory collaborators for engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{AppError, Result};
use crate::fs::operations::Backend;
use crate::fs::path::NodePath;
use crate::fs::tree::{EntryKind, FileNode};
use crate::status::{NoticeLevel, Notifier};

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, NoticeLevel)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, NoticeLevel)> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, level: NoticeLevel) {
        self.messages.lock().push((message.to_string(), level));
    }
}

/// Backend answering listings from a fixed table, counting calls, and
/// optionally holding a listing until released.
#[derive(Default)]
pub struct ScriptedBackend {
    listings: Mutex<HashMap<NodePath, Vec<FileNode>>>,
    failures: Mutex<HashMap<NodePath, String>>,
    calls: Mutex<Vec<NodePath>>,
    gates: Mutex<HashMap<NodePath, Arc<Notify>>>,
    mutations: Mutex<VecDeque<Result<()>>>,
}

impl ScriptedBackend {
    pub fn with_listing(self, path: &str, nodes: Vec<FileNode>) -> Self {
        self.listings.lock().insert(NodePath::new(path), nodes);
        self
    }

    pub fn with_failure(self, path: &str, message: &str) -> Self {
        self.failures
            .lock()
            .insert(NodePath::new(path), message.to_string());
        self
    }

    /// Hold listings of `path` until the returned handle is notified.
    pub fn gate(&self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(NodePath::new(path), gate.clone());
        gate
    }

    /// Make the next create/rename/delete fail with `message`.
    pub fn fail_next_mutation(&self, message: &str) {
        self.mutations
            .lock()
            .push_back(Err(AppError::Backend(message.to_string())));
    }

    pub fn list_calls(&self, path: &str) -> usize {
        let path = NodePath::new(path);
        self.calls.lock().iter().filter(|p| **p == path).count()
    }

    fn next_mutation(&self) -> Result<()> {
        self.mutations.lock().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn list(&self, path: &NodePath) -> Result<Vec<FileNode>> {
        self.calls.lock().push(path.clone());
        let gate = self.gates.lock().get(path).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(message) = self.failures.lock().get(path) {
            return Err(AppError::Backend(message.clone()));
        }
        Ok(self.listings.lock().get(path).cloned().unwrap_or_default())
    }

    async fn create(&self, path: &NodePath, kind: EntryKind) -> Result<FileNode> {
        self.next_mutation()?;
        Ok(match kind {
            EntryKind::File => FileNode::file(path.clone(), None),
            EntryKind::Directory => FileNode::directory(path.clone()),
        })
    }

    async fn rename(&self, _from: &NodePath, to: &NodePath) -> Result<FileNode> {
        self.next_mutation()?;
        Ok(FileNode::file(to.clone(), None))
    }

    async fn delete(&self, _path: &NodePath) -> Result<()> {
        self.next_mutation()
    }
}
