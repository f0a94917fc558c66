//! Shared test utilities for core module tests
//!
//! Provides sample rules files and environment helpers so the individual test
//! suites don't each carry their own copies.
//! This module is only compiled in test mode.

use std::sync::Mutex;

/// Mutex for tests that need exclusive access to environment variables.
///
/// # Example
///
/// ```ignore
/// let _guard = ENV_VAR_MUTEX.lock().unwrap();
/// unsafe {
///     std::env::set_var("PORTMAN_RESTORE_COMMAND", "/bin/false");
/// }
/// // ... test with custom env state ...
/// unsafe {
///     std::env::remove_var("PORTMAN_RESTORE_COMMAND");
/// }
/// ```
pub static ENV_VAR_MUTEX: Mutex<()> = Mutex::new(());

/// Typical Debian `rules.v4` without a managed block.
pub const BASE_RULES: &str = "\
# Generated by iptables-save v1.8.9 on Mon Jan  1 00:00:00 2024
*filter
:INPUT DROP [0:0]
:FORWARD DROP [0:0]
:OUTPUT ACCEPT [0:0]
-A INPUT -i lo -j ACCEPT
-A INPUT -m conntrack --ctstate RELATED,ESTABLISHED -j ACCEPT
-A INPUT -p tcp -m tcp --dport 22 -j ACCEPT
COMMIT
# Completed on Mon Jan  1 00:00:00 2024
";

/// Filter table with only chain declarations.
pub const HEADERS_ONLY: &str = "\
*filter
:INPUT ACCEPT [0:0]
:FORWARD ACCEPT [0:0]
:OUTPUT ACCEPT [0:0]
COMMIT
";

/// Rules file with an existing managed block holding 3307 tcp/udp.
pub const WITH_BLOCK: &str = "\
*filter
:INPUT DROP [0:0]
:FORWARD DROP [0:0]
:OUTPUT ACCEPT [0:0]
#PORTMAN BEGIN
-A INPUT -p udp -m udp --dport 3307 -j ACCEPT
-A INPUT -p tcp -m tcp --dport 3307 -j ACCEPT
#PORTMAN END
-A INPUT -i lo -j ACCEPT
COMMIT
";

/// Filter section whose managed block was never closed.
pub const UNBALANCED_BLOCK: &str = "\
*filter
:INPUT DROP [0:0]
#PORTMAN BEGIN
-A INPUT -p tcp -m tcp --dport 80 -j ACCEPT
COMMIT
";
