pub mod manager;
pub mod operations;
pub mod path;
pub mod reconciler;
pub mod store;
pub mod tree;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;
