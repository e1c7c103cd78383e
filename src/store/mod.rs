//! Storage backends
//!
//! Each store implements every repository contract on one value. Stores are
//! opened through [`crate::repository::open`], which also ensures the schema.

pub mod memory;
pub mod sql;

#[cfg(feature = "document")]
pub mod document;

#[cfg(feature = "widecolumn")]
pub mod widecolumn;
