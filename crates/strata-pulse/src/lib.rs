//! Git history mining: revisions, churn, temporal coupling, complexity and
//! proximity trends, and author attribution.
//!
//! History is parsed from a textual log ([`log`]) into a DAG of commits
//! ([`graph`]) that every aggregator walks in dependency order. Files are
//! tracked by lineage across renames ([`lineage`]). Historic content comes
//! through the traits in [`source`], implemented for real repositories by
//! [`mining::GitRepository`]. Per-revision stats are cached on disk
//! ([`cache`], [`update`]) and window snapshots kept in SQLite ([`store`]).

pub mod cache;
pub mod coupling;
pub mod graph;
pub mod lineage;
pub mod log;
pub mod mining;
pub mod ownership;
pub mod revisions;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod trend;
pub mod update;
