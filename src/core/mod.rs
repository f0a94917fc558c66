//! Core rules-file engine
//!
//! This module contains the block-scoped rule engine and its I/O-facing
//! neighbours. It provides:
//!
//! - [`document`]: Line view of an iptables-save file, filter table and managed block location
//! - [`rule`]: `Proto`, `PortRule` and the canonical rule-line codec
//! - [`ops`]: The `open`/`close`/`status`/`list` operations
//! - [`diff`]: Change previews for dry runs
//! - [`restore`]: Validation and application through `iptables-restore`
//! - [`error`]: Error types for all of the above

pub mod diff;
pub mod document;
pub mod error;
pub mod ops;
pub mod restore;
pub mod rule;

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
