//! Shared types for ledgerd

mod error;

pub use error::{LedgerError, Result};
