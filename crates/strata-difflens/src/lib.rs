//! Diff parsing and file-level code metrics.
//!
//! - [`parser`] turns unified diff text into per-file hunk lists
//! - [`complexity`] scores a file's indentation as a nesting proxy
//! - [`proximity`] measures how scattered one revision's edits are

pub mod complexity;
pub mod parser;
pub mod proximity;
