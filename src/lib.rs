//! Batched streaming copy of rows between PostgreSQL tables, driven by a
//! declarative job configuration: which columns to select, which filters to
//! apply, which target table to write to, and how many rows to batch per
//! write. Jobs are independent units of success or failure; within a job,
//! tables are migrated in configured order and the first failing table aborts
//! the rest of that job.

pub mod config;
pub mod copy;
pub mod error;
pub mod postgres;
pub mod query;
pub mod runner;
pub mod source;
pub mod sql;
pub mod writer;
