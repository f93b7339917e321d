#![forbid(unsafe_code)]

//! Command-line interface utilities and data import/export functionality.
//!
//! This module provides tools for CLI operations, particularly for loading
//! collections into a database file and dumping them back out as JSON.

/// Data import and export operations.
///
/// Moves whole collections between JSON files and a document store.
pub mod import_export;
