//! TickDB - an embedded tick database with date-partitioned tables
//!
//! This crate provides a columnar store whose tables are partitioned by
//! date, a query language evaluated across those partitions, and a
//! symbolic expression layer that compiles to queries or interprets
//! directly over in-memory frames.

pub mod store;
pub mod ingest;
pub mod query;
pub mod expr;
pub mod compute;
pub mod metrics;
