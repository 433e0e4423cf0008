//! Synchronization core
//!
//! The server is the convergence point for a user's devices: it accepts
//! batched writes from any device, resolves concurrent edits with
//! last-writer-wins, serves the change feed, and wakes other devices
//! through the change notifier.

pub mod engine;
pub mod locks;
pub mod lww;
pub mod notifier;
pub mod types;

pub use engine::SyncEngine;
pub use locks::{spawn_sweep_task, UserLocks};
pub use notifier::ChangeNotifier;
pub use types::{SyncPullRequest, SyncPullResponse, SyncPushRequest, SyncPushResponse};
