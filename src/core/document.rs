//! Line-oriented view of an iptables-save rules file
//!
//! A [`Document`] owns the file as a sequence of lines after CRLF → LF
//! normalization. Every operation builds a fresh document from text, works on
//! line indices, and renders back with `\n` separators. Nothing is cached
//! between calls.
//!
//! Layout assumptions, in file order:
//!
//! ```text
//! *filter
//! :INPUT DROP [0:0]          <- chain declarations
//! #PORTMAN BEGIN             <- managed block, created right after them
//! -A INPUT -p tcp -m tcp --dport 22 -j ACCEPT
//! #PORTMAN END
//! -A INPUT -i lo -j ACCEPT   <- hand-written rules, never touched
//! COMMIT
//! ```

use crate::core::error::StructuralError;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Header line that opens the filter table
pub const FILTER_TABLE: &str = "*filter";

/// Line that terminates a table section
pub const COMMIT_LINE: &str = "COMMIT";

/// Exact line that opens the managed block
pub const BLOCK_BEGIN: &str = "#PORTMAN BEGIN";

/// Exact line that closes the managed block
pub const BLOCK_END: &str = "#PORTMAN END";

/// Chain declarations (`:INPUT ACCEPT [0:0]`) start with this prefix
const CHAIN_DECLARATION_PREFIX: char = ':';

/// Indices of `*filter` and its terminating `COMMIT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterRegion {
    pub filter: usize,
    pub commit: usize,
}

/// Indices of the managed block markers, both strictly inside the filter region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagedBlock {
    pub begin: usize,
    pub end: usize,
}

impl ManagedBlock {
    /// Whether `index` lies strictly between the markers.
    pub fn contains(&self, index: usize) -> bool {
        index > self.begin && index < self.end
    }
}

/// Rules file as an owned, ordered sequence of lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    lines: Vec<String>,
}

impl Document {
    /// Normalizes `\r\n` to `\n` and splits into lines.
    ///
    /// A trailing newline shows up as a final empty line, so rendering the
    /// document again reproduces it.
    pub fn parse(content: &str) -> Self {
        let normalized = content.replace("\r\n", "\n");
        Self {
            lines: normalized.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Finds the first `*filter` line and the first `COMMIT` after it.
    pub fn locate_filter(&self) -> Result<FilterRegion, StructuralError> {
        let mut filter = None;

        for (i, line) in self.lines.iter().enumerate() {
            let trimmed = line.trim();
            if filter.is_none() && trimmed == FILTER_TABLE {
                filter = Some(i);
                continue;
            }
            if let Some(filter) = filter
                && trimmed == COMMIT_LINE
            {
                return Ok(FilterRegion { filter, commit: i });
            }
        }

        match filter {
            None => Err(StructuralError::MissingFilter),
            Some(_) => Err(StructuralError::MissingCommit),
        }
    }

    /// Finds the managed block inside `region` without modifying anything.
    ///
    /// Returns `Ok(None)` when neither marker is present. A later BEGIN
    /// replaces an earlier one; the scan stops at the first END.
    pub fn locate_block(
        &self,
        region: FilterRegion,
    ) -> Result<Option<ManagedBlock>, StructuralError> {
        let mut begin = None;
        let mut end = None;

        for i in region.filter + 1..region.commit {
            let line = self.lines[i].as_str();
            if line == BLOCK_BEGIN {
                begin = Some(i);
            } else if line == BLOCK_END {
                end = Some(i);
                break;
            }
        }

        match (begin, end) {
            (Some(begin), Some(end)) if begin < end => Ok(Some(ManagedBlock { begin, end })),
            (None, None) => Ok(None),
            _ => Err(StructuralError::UnbalancedBlock),
        }
    }

    /// Returns the existing managed block, or inserts an empty one right after
    /// the chain declarations.
    ///
    /// The flag is `true` when the block was created by this call.
    pub fn ensure_block(
        &mut self,
        region: FilterRegion,
    ) -> Result<(ManagedBlock, bool), StructuralError> {
        if let Some(block) = self.locate_block(region)? {
            return Ok((block, false));
        }

        let at = self.chain_header_end(region.filter);
        self.lines.splice(
            at..at,
            [BLOCK_BEGIN.to_string(), BLOCK_END.to_string()],
        );
        debug!("Created managed block at line {}", at + 1);

        Ok((
            ManagedBlock {
                begin: at,
                end: at + 1,
            },
            true,
        ))
    }

    /// Index of the first line after `*filter` that is not a chain declaration.
    pub fn chain_header_end(&self, filter: usize) -> usize {
        self.lines[filter + 1..]
            .iter()
            .position(|line| !line.starts_with(CHAIN_DECLARATION_PREFIX))
            .map_or(self.lines.len(), |offset| filter + 1 + offset)
    }

    /// Exact-text set of every line in the document.
    pub fn line_set(&self) -> HashSet<&str> {
        self.lines.iter().map(String::as_str).collect()
    }

    /// Inserts `lines` so that they end up immediately before index `at`.
    pub fn insert_before(&mut self, at: usize, lines: Vec<String>) {
        self.lines.splice(at..at, lines);
    }

    /// Drops every line strictly inside `block` for which `remove` returns
    /// `true`. Returns how many lines were dropped.
    pub fn remove_in_block<F>(&mut self, block: ManagedBlock, mut remove: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let before = self.lines.len();
        let mut index = 0;
        self.lines.retain(|line| {
            let keep = !(block.contains(index) && remove(line.as_str()));
            index += 1;
            keep
        });
        before - self.lines.len()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}
