//! portman - iptables port manager
//!
//! Opens and closes TCP/UDP ports by editing a dedicated `#PORTMAN BEGIN` /
//! `#PORTMAN END` block inside the `*filter` table of an iptables-save rules
//! file, leaving every other line untouched.
//!
//! # Architecture
//!
//! - [`core`] - Rule engine (pure), diffing, and `iptables-restore` integration
//! - [`validators`] - Port and proto argument validation
//! - [`storage`] - Timestamped backups and atomic rewrites of the rules file
//! - [`elevation`] - Root checks and restore command construction
//! - [`audit`] - Audit logging of every change
//! - [`config`] - Configuration persistence
//! - [`utils`] - XDG directories
//!
//! # Example
//!
//! ```
//! let rules = "*filter\n:INPUT DROP [0:0]\nCOMMIT\n";
//! let outcome = portman::core::ops::open(rules, 443, "tcp").unwrap();
//! assert!(outcome.changed);
//! assert_eq!(
//!     portman::core::ops::list(&outcome.content).unwrap()[0].to_string(),
//!     "443/tcp"
//! );
//! ```

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod core;
pub mod elevation;
pub mod storage;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use core::error::{Error, Result};
pub use core::ops::{Outcome, close, list, open, status};
pub use core::rule::{PortRule, Proto};
