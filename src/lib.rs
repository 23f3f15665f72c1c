//! boardtrace: trace-file ingestion for a laser-marking production line.
//!
//! Watches a directory for machine trace exports, extracts board serials,
//! order numbers, part codes and printed pattern codes, keeps a per-order
//! board counter in Redis and flags duplicate boards/patterns through a
//! month-tagged sorted-set index.

#[cfg(test)]
mod tests;

pub mod api;
pub mod config;
pub mod cycle;
pub mod dedup;
pub mod ledger;
pub mod parser;
pub mod snapshot;
pub mod source;
pub mod store;
