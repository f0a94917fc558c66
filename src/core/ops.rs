//! Open/close/status/list over a rules file held in memory
//!
//! All four operations are pure: they take the file text and return either a
//! rewritten text plus a `changed` flag, or a read-only result. They validate
//! their arguments first and either fully succeed or return an error without
//! producing a document.
//!
//! Note the scope difference: `open` and `status` test for the canonical line
//! anywhere in the file, while `close` and `list` only look inside the managed
//! block. A matching hand-written rule outside the block therefore counts as
//! "open" but is never removed or listed.

use crate::core::document::Document;
use crate::core::error::Result;
use crate::core::rule::{PortRule, Proto, canonical_line};
use crate::validators::{parse_proto_spec, validate_port};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Result of a mutating operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Rendered document, always `\n`-joined
    pub content: String,
    /// Whether `content` differs in substance from the input
    pub changed: bool,
}

impl Outcome {
    fn new(document: &Document, changed: bool) -> Self {
        Self {
            content: document.to_string(),
            changed,
        }
    }
}

/// Adds the canonical accept rule for each requested proto to the managed
/// block, creating the block if needed.
///
/// A freshly created block marks the outcome as changed even when every rule
/// already existed elsewhere in the file.
///
/// # Errors
///
/// Returns a validation error for a bad port/proto, or a structural error if
/// the filter table or managed block is malformed.
pub fn open(content: &str, port: u32, proto_spec: &str) -> Result<Outcome> {
    let port = validate_port(port)?;
    let protos = parse_proto_spec(proto_spec)?;

    let mut document = Document::parse(content);
    let region = document.locate_filter()?;
    let (block, created) = document.ensure_block(region)?;

    let to_insert: Vec<String> = {
        let existing = document.line_set();
        protos
            .iter()
            .map(|&proto| canonical_line(port, proto))
            .filter(|line| !existing.contains(line.as_str()))
            .collect()
    };

    if to_insert.is_empty() {
        if created {
            debug!("Rules for port {port} already present; keeping new empty block");
            return Ok(Outcome::new(&document, true));
        }
        return Ok(Outcome::new(&document, false));
    }

    debug!("Inserting {} rule line(s) for port {port}", to_insert.len());
    document.insert_before(block.end, to_insert);
    Ok(Outcome::new(&document, true))
}

/// Removes the canonical accept rule for each requested proto from inside the
/// managed block.
///
/// A missing block is not an error: the document comes back unchanged.
///
/// # Errors
///
/// Returns a validation error for a bad port/proto, or a structural error if
/// the filter table or managed block is malformed.
pub fn close(content: &str, port: u32, proto_spec: &str) -> Result<Outcome> {
    let port = validate_port(port)?;
    let protos = parse_proto_spec(proto_spec)?;

    let mut document = Document::parse(content);
    let region = document.locate_filter()?;
    let Some(block) = document.locate_block(region)? else {
        debug!("No managed block; nothing to close");
        return Ok(Outcome::new(&document, false));
    };

    let targets: HashSet<String> = protos
        .iter()
        .map(|&proto| canonical_line(port, proto))
        .collect();

    let removed = document.remove_in_block(block, |line| targets.contains(line));
    debug!("Removed {removed} rule line(s) for port {port}");

    Ok(Outcome::new(&document, removed > 0))
}

/// Reports, per requested proto, whether its canonical rule line appears
/// anywhere in the file.
///
/// # Errors
///
/// Returns a validation error for a bad port/proto, or a structural error if
/// the filter table is missing.
pub fn status(content: &str, port: u32, proto_spec: &str) -> Result<BTreeMap<Proto, bool>> {
    let port = validate_port(port)?;
    let protos = parse_proto_spec(proto_spec)?;

    let document = Document::parse(content);
    document.locate_filter()?;

    let existing = document.line_set();
    Ok(protos
        .into_iter()
        .map(|proto| {
            let present = existing.contains(canonical_line(port, proto).as_str());
            (proto, present)
        })
        .collect())
}

/// Lists the rules inside the managed block, deduplicated and sorted by port,
/// then protocol.
///
/// # Errors
///
/// Returns a structural error if the filter table is missing or the managed
/// block has only one of its markers.
pub fn list(content: &str) -> Result<Vec<PortRule>> {
    let document = Document::parse(content);
    let region = document.locate_filter()?;
    let Some(block) = document.locate_block(region)? else {
        return Ok(Vec::new());
    };

    let mut seen = HashSet::new();
    let mut rules: Vec<PortRule> = document.lines()[block.begin + 1..block.end]
        .iter()
        .filter_map(|line| PortRule::parse_line(line))
        .filter(|rule| seen.insert(*rule))
        .collect();

    rules.sort();
    Ok(rules)
}
