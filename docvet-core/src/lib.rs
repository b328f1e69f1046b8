//! Core types for docvet
//!
//! This crate holds the document model shared by the docvet validator and
//! any tooling that produces or consumes documents: the `Document` and
//! `Block` tree, the `BlockKind` addressing enum, and the common error
//! type.

pub mod document;
pub mod error;

pub use document::{Block, BlockKind, Document, ALL_BLOCK_ATTRIBUTES};
pub use error::{DocvetError, Result};
