//! Input validation for port and protocol arguments
//!
//! Every core operation validates its inputs here before touching the
//! document, so an invalid request never produces a rewritten file.

use crate::core::error::{Error, Result};
use crate::core::rule::Proto;

/// Highest valid port number
pub const MAX_PORT: u32 = 65_535;

/// Validates a numeric port.
///
/// # Errors
///
/// Returns `Err` if port is 0 or greater than 65535.
///
/// # Examples
///
/// ```
/// use portman::validators::validate_port;
///
/// assert_eq!(validate_port(443).unwrap(), 443);
/// assert!(validate_port(0).is_err());
/// assert!(validate_port(65_536).is_err());
/// ```
pub fn validate_port(port: u32) -> Result<u16> {
    if (1..=MAX_PORT).contains(&port) {
        u16::try_from(port).map_err(|_| invalid_port(port))
    } else {
        Err(invalid_port(port))
    }
}

/// Parses a port argument as typed on the command line.
///
/// Only plain decimal digits are accepted; signs, whitespace and trailing
/// garbage are rejected.
///
/// # Errors
///
/// Returns `Err` for non-numeric input or a port outside 1..=65535.
pub fn parse_port(input: &str) -> Result<u16> {
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::validation("port", format!("invalid port: {input}")));
    }

    let port: u32 = input
        .parse()
        .map_err(|_| Error::validation("port", format!("invalid port: {input}")))?;
    validate_port(port)
}

/// Normalizes a proto spec into the ordered list of protocols it names.
///
/// Accepts `tcp`, `udp`, `tcp/udp` and `udp/tcp` in any case, with
/// surrounding whitespace. Both slash forms yield `[Tcp, Udp]`.
///
/// # Errors
///
/// Returns `Err` for anything else.
///
/// # Examples
///
/// ```
/// use portman::core::rule::Proto;
/// use portman::validators::parse_proto_spec;
///
/// assert_eq!(parse_proto_spec("UDP/tcp").unwrap(), vec![Proto::Tcp, Proto::Udp]);
/// assert!(parse_proto_spec("icmp").is_err());
/// ```
pub fn parse_proto_spec(spec: &str) -> Result<Vec<Proto>> {
    let normalized = spec.trim().to_lowercase();

    match normalized.as_str() {
        "tcp" => Ok(vec![Proto::Tcp]),
        "udp" => Ok(vec![Proto::Udp]),
        "tcp/udp" | "udp/tcp" => Ok(vec![Proto::Tcp, Proto::Udp]),
        _ => Err(Error::validation(
            "proto",
            format!("invalid proto {normalized:?}"),
        )),
    }
}

fn invalid_port(port: u32) -> Error {
    Error::validation("port", format!("invalid port {port}"))
}
