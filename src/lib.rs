//! File-tree synchronization engine for a code explorer: a lazily loaded,
//! structurally shared tree of the browsed directory, the open editor tabs
//! that depend on it, and the reconciliation of external filesystem changes.

pub mod app;
pub mod config;
pub mod error;
pub mod event;
pub mod fs;
pub mod logging;
pub mod status;
