//! Repartitioning of agenda-slot documents from a flat collection into
//! per-event subcollections, with validation and a separate cleanup pass.

#![warn(missing_docs)]

pub mod cli;
pub mod migrate;
pub mod store;
pub mod types;
