//! # cassandra-exporter
//!
//! A polling telemetry agent for Apache Cassandra nodes.
//!
//! The exporter periodically walks the management attribute space of a
//! Cassandra node (reached over a Jolokia HTTP bridge), converts raw
//! management attributes into a normalized time-series model, and exposes
//! the current values as a single Prometheus gauge family,
//! `cassandra_stats`, labeled with `cluster`, `datacenter`, `keyspace`,
//! `table` and the canonical metric `name`.
//!
//! ## Architecture
//!
//! - **Scheduler**: multi-tier scrape frequencies with pattern overrides
//!   and a blacklist that always wins
//! - **Decoder**: type-dispatch over raw attribute values, including
//!   reconstruction of Cassandra's `EstimatedHistogram` percentiles
//! - **Topology**: per-cycle snapshot of the node's keyspaces/tables used
//!   for labeling and stale-series eviction
//! - **Registry**: latest-value series store rendered in Prometheus text
//!   exposition format

pub mod config;
pub mod decode;
pub mod histogram;
pub mod jolokia;
pub mod normalize;
pub mod registry;
pub mod schedule;
pub mod scrape;
pub mod server;
pub mod source;
pub mod telemetry;
pub mod topology;

mod error;

pub use error::{Error, Result};
