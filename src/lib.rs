//! # taskq
//!
//! Task dispatch and retry engine. Numbered tasks are admitted through a
//! dedup check against a durable completion store, executed against an
//! outcome oracle by either a concurrent or a sequential executor, retried
//! up to a fixed bound, and their terminal outcome delivered on a
//! write-once result sink.

pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod model;
pub mod oracle;
pub mod store;
pub mod telemetry;
