//! Path expressions for addressing values inside a [`Document`](crate::document::Document).
//!
//! A path is a `.`-separated list of segments, e.g. `user.emails.0.address`.
//! A literal dot inside a key is written as `\.`. Whether a segment is used as
//! an object key or as an array position depends on the container it is
//! applied to: `3` is the key `"3"` on an object and the fourth element on an
//! array. The segment `-1` addresses the last element on reads and deletes,
//! and the position past the end on writes (append).

use std::fmt;

use crate::error::{DocumentError, DocumentResult};

/// Position inside an array addressed by a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayPos {
    /// Zero-based index.
    At(usize),
    /// The `-1` segment: last element, or append on write.
    Last,
}

/// One step of a [`Path`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment(String);

impl Segment {
    /// Segment used as an object key.
    pub fn key(&self) -> &str {
        &self.0
    }

    /// Segment used as an array position, if it is one.
    ///
    /// Negative values other than `-1` are not array positions.
    pub fn array_pos(&self) -> Option<ArrayPos> {
        if self.0 == "-1" {
            return Some(ArrayPos::Last);
        }
        if self.0.is_empty() || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.0.parse().ok().map(ArrayPos::At)
    }
}

/// Parsed path expression.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Path {
    raw: String,
    segments: Vec<Segment>,
}

impl Path {
    /// Parse a path expression. The empty string addresses the root.
    pub fn parse(raw: &str) -> DocumentResult<Self> {
        if raw.is_empty() {
            return Ok(Self::default());
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = raw.chars();

        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => {
                        return Err(DocumentError::invalid_path(raw, "dangling escape"));
                    }
                },
                '.' => {
                    if current.is_empty() {
                        return Err(DocumentError::invalid_path(raw, "empty segment"));
                    }
                    segments.push(Segment(std::mem::take(&mut current)));
                }
                other => current.push(other),
            }
        }

        if current.is_empty() {
            return Err(DocumentError::invalid_path(raw, "empty segment"));
        }
        segments.push(Segment(current));

        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    /// Segments from the root downwards.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// First segment, `None` for the root path.
    pub fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    /// Whether this path addresses the document root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The path as originally written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for Path {
    type Err = DocumentError;

    fn from_str(s: &str) -> DocumentResult<Self> {
        Self::parse(s)
    }
}
