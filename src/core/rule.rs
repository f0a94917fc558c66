//! Managed rule representation and the canonical rule-line codec
//!
//! The engine only ever writes one textual form per [`PortRule`]:
//!
//! ```text
//! -A INPUT -p tcp -m tcp --dport 3306 -j ACCEPT
//! ```
//!
//! Parsing is tolerant: flags may come in any order and unrelated flags are
//! ignored, but anything that does not resolve to an `INPUT` accept rule for a
//! single TCP/UDP port is "not a rule" rather than an error.
//!
//! # Example
//!
//! ```
//! use portman::core::rule::{PortRule, Proto};
//!
//! let rule = PortRule::new(443, Proto::Tcp);
//! let line = rule.canonical_line();
//! assert_eq!(line, "-A INPUT -p tcp -m tcp --dport 443 -j ACCEPT");
//! assert_eq!(PortRule::parse_line(&line), Some(rule));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum token count of an `-A INPUT -p x -m x --dport n -j ACCEPT` line
const MIN_RULE_FIELDS: usize = 8;

/// Transport protocol of a managed rule
///
/// Ordering is `Tcp < Udp`, which is also the order used whenever both are
/// requested.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Proto {
    /// Transmission Control Protocol
    #[strum(serialize = "tcp")]
    Tcp,
    /// User Datagram Protocol
    #[strum(serialize = "udp")]
    Udp,
}

/// Identity of one managed accept rule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortRule {
    pub port: u16,
    pub proto: Proto,
}

impl PortRule {
    pub const fn new(port: u16, proto: Proto) -> Self {
        Self { port, proto }
    }

    /// Returns the only line form the engine writes for this rule.
    pub fn canonical_line(&self) -> String {
        canonical_line(self.port, self.proto)
    }

    /// Recovers a rule from a raw rules-file line.
    ///
    /// Blank lines, comments and anything outside the narrow
    /// `-A INPUT ... -p <proto> ... --dport <port> ... -j ACCEPT` shape yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_RULE_FIELDS || fields[0] != "-A" || fields[1] != "INPUT" {
            return None;
        }

        let mut proto = None;
        let mut port: i64 = 0;
        let mut jump_accept = false;

        let mut rest = fields[2..].iter();
        while let Some(&flag) = rest.next() {
            match flag {
                "-p" => {
                    let value = rest.next()?;
                    proto = Some(value.parse::<Proto>().ok()?);
                }
                "--dport" => {
                    let value = rest.next()?;
                    port = value.parse::<i64>().ok()?;
                }
                "-j" => {
                    let value = rest.next()?;
                    jump_accept = value.eq_ignore_ascii_case("ACCEPT");
                }
                _ => {}
            }
        }

        if port == 0 || !jump_accept {
            return None;
        }
        let port = u16::try_from(port).ok()?;

        Some(Self::new(port, proto?))
    }
}

impl fmt::Display for PortRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.proto)
    }
}

/// Synthesizes the canonical rule line for `port`/`proto`.
pub fn canonical_line(port: u16, proto: Proto) -> String {
    format!("-A INPUT -p {proto} -m {proto} --dport {port} -j ACCEPT")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_line_format() {
        assert_eq!(
            canonical_line(3306, Proto::Tcp),
            "-A INPUT -p tcp -m tcp --dport 3306 -j ACCEPT"
        );
        assert_eq!(
            PortRule::new(53, Proto::Udp).canonical_line(),
            "-A INPUT -p udp -m udp --dport 53 -j ACCEPT"
        );
    }

    #[test]
    fn test_proto_parse_is_case_insensitive() {
        assert_eq!("TCP".parse::<Proto>().unwrap(), Proto::Tcp);
        assert_eq!("Udp".parse::<Proto>().unwrap(), Proto::Udp);
        assert!("icmp".parse::<Proto>().is_err());
        assert_eq!(Proto::Udp.to_string(), "udp");
    }

    #[test]
    fn test_proto_ordering() {
        assert!(Proto::Tcp < Proto::Udp);
        assert!(PortRule::new(80, Proto::Udp) < PortRule::new(443, Proto::Tcp));
        assert!(PortRule::new(80, Proto::Tcp) < PortRule::new(80, Proto::Udp));
    }

    #[test]
    fn test_parse_skips_blank_and_comments() {
        assert_eq!(PortRule::parse_line(""), None);
        assert_eq!(PortRule::parse_line("   "), None);
        assert_eq!(
            PortRule::parse_line("# -A INPUT -p tcp -m tcp --dport 22 -j ACCEPT"),
            None
        );
    }

    #[test]
    fn test_parse_tolerates_order_and_extra_flags() {
        let line = "-A INPUT -s 10.0.0.0/8 -j accept --dport 8080 -m conntrack -p TCP";
        assert_eq!(
            PortRule::parse_line(line),
            Some(PortRule::new(8080, Proto::Tcp))
        );

        let indented = "   -A INPUT -p udp -m udp --dport 51820 -j ACCEPT  ";
        assert_eq!(
            PortRule::parse_line(indented),
            Some(PortRule::new(51820, Proto::Udp))
        );
    }

    #[test]
    fn test_parse_rejects_wrong_chain_or_target() {
        assert_eq!(
            PortRule::parse_line("-A OUTPUT -p tcp -m tcp --dport 22 -j ACCEPT"),
            None
        );
        assert_eq!(
            PortRule::parse_line("-I INPUT -p tcp -m tcp --dport 22 -j ACCEPT"),
            None
        );
        assert_eq!(
            PortRule::parse_line("-A INPUT -p tcp -m tcp --dport 22 -j DROP"),
            None
        );
    }

    #[test]
    fn test_parse_field_count_boundary() {
        // eight fields is enough when no -m is present
        assert_eq!(
            PortRule::parse_line("-A INPUT -p tcp --dport 22 -j ACCEPT"),
            Some(PortRule::new(22, Proto::Tcp))
        );
        assert_eq!(PortRule::parse_line("-A INPUT -p tcp --dport 22 -j"), None);
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        // flag without a value
        assert_eq!(
            PortRule::parse_line("-A INPUT -m tcp -j ACCEPT --dport 22 -p"),
            None
        );
        // unknown protocol
        assert_eq!(
            PortRule::parse_line("-A INPUT -p sctp -m sctp --dport 22 -j ACCEPT"),
            None
        );
        // non-numeric port
        assert_eq!(
            PortRule::parse_line("-A INPUT -p tcp -m tcp --dport ssh -j ACCEPT"),
            None
        );
        // port ranges are not single ports
        assert_eq!(
            PortRule::parse_line("-A INPUT -p tcp -m tcp --dport 1000:2000 -j ACCEPT"),
            None
        );
    }

    #[test]
    fn test_parse_rejects_out_of_range_ports() {
        for port in ["0", "65536", "-22", "99999999999999999999"] {
            let line = format!("-A INPUT -p tcp -m tcp --dport {port} -j ACCEPT");
            assert_eq!(PortRule::parse_line(&line), None, "port {port}");
        }
        assert_eq!(
            PortRule::parse_line("-A INPUT -p tcp -m tcp --dport 65535 -j ACCEPT"),
            Some(PortRule::new(65535, Proto::Tcp))
        );
    }

    #[test]
    fn test_parse_requires_proto() {
        assert_eq!(
            PortRule::parse_line("-A INPUT -m tcp -m tcp --dport 22 -j ACCEPT"),
            None
        );
    }

    #[test]
    fn test_later_flags_overwrite_earlier() {
        let line = "-A INPUT -p tcp -j DROP --dport 22 -j ACCEPT -p udp";
        assert_eq!(PortRule::parse_line(line), Some(PortRule::new(22, Proto::Udp)));
    }

    #[test]
    fn test_display() {
        assert_eq!(PortRule::new(3307, Proto::Udp).to_string(), "3307/udp");
    }
}
