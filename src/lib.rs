//! ledgerd - sync server for a multi-device personal-finance ledger
//!
//! Each user's accounts, categories and transactions replicate across
//! their devices. Devices mutate offline and reconcile here: the server
//! merges concurrent edits with last-writer-wins, serves the change feed
//! ("everything modified since T", tombstones included), and wakes other
//! devices over a realtime channel when a push commits.
//!
//! ## Modules
//!
//! - **records**: the replicated record model
//! - **store**: durable per-record storage (MongoDB)
//! - **sync**: LWW merger, per-user locks, change notifier, sync engine
//! - **server**: hyper HTTP surface and the `/ws/sync` realtime transport
//! - **auth**: JWT tokens and Argon2 password hashing

pub mod auth;
pub mod config;
pub mod db;
pub mod records;
pub mod routes;
pub mod server;
pub mod store;
pub mod sync;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{LedgerError, Result};
