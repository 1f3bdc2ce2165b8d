//! Core types, configuration, and error handling for strata.
//!
//! This crate provides the shared foundation used by all other strata crates:
//! - [`StrataError`]: unified error type using `thiserror`
//! - [`StrataConfig`]: configuration loaded from `.strata.toml`
//! - [`DescriptiveStats`]: the sample statistics every metric reports
//! - Shared types: [`TimeWindow`], [`StatsSummary`], [`DiffHunk`],
//!   [`OutputFormat`]

mod config;
mod error;
mod stats;
mod types;

pub use config::{
    AuthorWeight, AuthorsConfig, CacheConfig, CouplingConfig, HistoryConfig, ModuleRule,
    StrataConfig,
};
pub use error::StrataError;
pub use stats::DescriptiveStats;
pub use types::{DiffHunk, OutputFormat, StatsSummary, TimeWindow};

/// A convenience `Result` type for strata operations.
pub type Result<T> = std::result::Result<T, StrataError>;
