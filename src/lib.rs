//! Coding-agent event ledger
//!
//! Records Claude Code tool-use events into one of several interchangeable
//! storage backends behind a single set of repository contracts.

pub mod cli;
pub mod config;
pub mod cursor;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod repository;
pub mod store;

pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use repository::{open, BackendKind, Page, PageRequest, Repositories};
