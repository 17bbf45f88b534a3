// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Line-level bidirectional layout over resolved paragraph levels.
//!
//! Paragraph-level resolution (UAX #9 rules P/X/W/N/I) is delegated to
//! [`unicode_bidi`]; this module owns the line half: trailing whitespace
//! handling (L1), visual run computation with the L2 reorder, and the
//! logical↔visual index mappings, including inserted LRM/RLM marks and
//! removed bidi controls.
//!
//! All indices are byte offsets into the UTF-8 text. Mappings never split a
//! multi-byte sequence: characters reorder as units, and control scans
//! decode code points rather than bytes.

mod line;

pub use line::{BidiLine, BidiRun};

use bitflags::bitflags;
use core::ops::Range;
use thiserror::Error;
use unicode_bidi::{BidiClass, BidiInfo, Level};

/// Sentinel for an index with no counterpart in the other order.
pub const NOWHERE: usize = usize::MAX;

/// Resolved direction of a paragraph or line.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
    Ltr,
    Rtl,
    Mixed,
}

/// Base direction request for a paragraph.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum BaseDirection {
    /// Resolve from the first strong character, defaulting to LTR.
    #[default]
    Auto,
    Ltr,
    Rtl,
}

bitflags! {
    /// Directional marks to be inserted around a run.
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct MarkFlags: u8 {
        const LRM_BEFORE = 1;
        const LRM_AFTER = 2;
        const RLM_BEFORE = 4;
        const RLM_AFTER = 8;
    }
}

impl MarkFlags {
    pub(crate) fn before(self) -> bool {
        self.intersects(Self::LRM_BEFORE | Self::RLM_BEFORE)
    }

    pub(crate) fn after(self) -> bool {
        self.intersects(Self::LRM_AFTER | Self::RLM_AFTER)
    }
}

/// A request to insert a directional mark at a logical position.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct InsertPoint {
    /// Byte position in the paragraph text.
    pub pos: usize,
    pub flags: MarkFlags,
}

/// Errors from line construction.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Error)]
pub enum BidiError {
    #[error("line range is out of bounds or not on character boundaries")]
    InvalidRange,
    #[error("line range crosses a paragraph boundary")]
    CrossesParagraph,
}

/// Whether the code point is a bidi control removed from display:
/// U+200E/U+200F (LRM/RLM), U+202A..=U+202E (embeddings and overrides),
/// U+2066..=U+2069 (isolates).
pub fn is_bidi_control(c: char) -> bool {
    matches!(c, '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}')
}

/// Classes skipped by the trailing-whitespace walk: whitespace, boundary
/// neutrals, and the explicit embedding/override/isolate codes.
pub(crate) fn is_trailing_ws_class(class: BidiClass) -> bool {
    use BidiClass::*;
    matches!(
        class,
        WS | BN | LRE | RLE | LRO | RLO | PDF | LRI | RLI | FSI | PDI
    )
}

/// A paragraph with resolved embedding levels, ready to be cut into lines.
///
/// The per-byte `levels` and `classes` arrays come straight from the UAX #9
/// resolution; lines alias them by range and never mutate them.
pub struct BidiParagraph<'a> {
    text: &'a str,
    levels: Vec<u8>,
    classes: Vec<BidiClass>,
    paragraphs: Vec<(Range<usize>, u8)>,
    base_level: u8,
    direction: Direction,
    trailing_ws_start: usize,
    remove_controls: bool,
    insert_points: Vec<InsertPoint>,
}

impl<'a> BidiParagraph<'a> {
    pub fn new(text: &'a str, base: BaseDirection) -> Self {
        let level = match base {
            BaseDirection::Auto => None,
            BaseDirection::Ltr => Some(Level::ltr()),
            BaseDirection::Rtl => Some(Level::rtl()),
        };
        let info = BidiInfo::new(text, level);
        let levels: Vec<u8> = info.levels.iter().map(|l| l.number()).collect();
        let classes = info.original_classes;
        let paragraphs: Vec<(Range<usize>, u8)> = info
            .paragraphs
            .iter()
            .map(|p| (p.range.clone(), p.level.number()))
            .collect();
        let base_level = paragraphs.first().map(|(_, level)| *level).unwrap_or({
            match base {
                BaseDirection::Rtl => 1,
                _ => 0,
            }
        });

        let mut para = Self {
            text,
            levels,
            classes,
            paragraphs,
            base_level,
            direction: Direction::Ltr,
            trailing_ws_start: 0,
            remove_controls: false,
            insert_points: Vec::new(),
        };
        para.direction = para.compute_direction();
        para.trailing_ws_start = para.compute_trailing_ws_start();
        para
    }

    /// Forces every character to the base level, overriding the script
    /// directions the resolution produced.
    pub fn override_direction(&mut self) {
        let level = self.base_level;
        self.levels.fill(level);
        for (_, para_level) in &mut self.paragraphs {
            *para_level = level;
        }
        self.direction = self.compute_direction();
        self.trailing_ws_start = self.compute_trailing_ws_start();
    }

    /// Enables removal of bidi control characters from the visual order and
    /// the index mappings.
    pub fn set_remove_controls(&mut self, remove: bool) {
        self.remove_controls = remove;
    }

    /// Requests a directional mark around the run containing `pos`.
    pub fn add_insert_point(&mut self, pos: usize, flags: MarkFlags) {
        self.insert_points.push(InsertPoint { pos, flags });
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn base_level(&self) -> u8 {
        self.base_level
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Resolved embedding level of each byte.
    pub fn levels(&self) -> &[u8] {
        &self.levels
    }

    /// Original bidi class of each byte.
    pub fn classes(&self) -> &[BidiClass] {
        &self.classes
    }

    /// The base level of the paragraph containing `index`.
    pub fn para_level_at(&self, index: usize) -> u8 {
        self.paragraphs
            .iter()
            .find(|(range, _)| range.contains(&index))
            .map(|(_, level)| *level)
            .unwrap_or(self.base_level)
    }

    /// Index of the paragraph containing `index`, if any.
    pub fn paragraph_index(&self, index: usize) -> Option<usize> {
        self.paragraphs
            .iter()
            .position(|(range, _)| range.contains(&index))
    }

    /// Byte range of paragraph `i`.
    pub fn paragraph_range(&self, i: usize) -> Option<Range<usize>> {
        self.paragraphs.get(i).map(|(range, _)| range.clone())
    }

    /// Builds the line object for `[start, limit)`.
    pub fn line(&self, start: usize, limit: usize) -> Result<BidiLine<'_>, BidiError> {
        BidiLine::new(self, start, limit)
    }

    pub(crate) fn remove_controls(&self) -> bool {
        self.remove_controls
    }

    pub(crate) fn insert_points(&self) -> &[InsertPoint] {
        &self.insert_points
    }

    pub(crate) fn trailing_ws_start(&self) -> usize {
        self.trailing_ws_start
    }

    fn compute_direction(&self) -> Direction {
        if self.levels.is_empty() {
            return if self.base_level & 1 != 0 {
                Direction::Rtl
            } else {
                Direction::Ltr
            };
        }
        let parity = self.levels[0] & 1;
        if self.levels.iter().any(|level| level & 1 != parity) {
            Direction::Mixed
        } else if parity != 0 {
            Direction::Rtl
        } else {
            Direction::Ltr
        }
    }

    /// Start of the trailing run of whitespace and removable codes that L1
    /// assigns the paragraph level, merged with any preceding run already at
    /// the paragraph level.
    fn compute_trailing_ws_start(&self) -> usize {
        let len = self.levels.len();
        if len == 0 {
            return 0;
        }
        if self.classes[len - 1] == BidiClass::B {
            return len;
        }
        let para_level = self.para_level_at(len - 1);
        let mut start = len;
        while start > 0 && is_trailing_ws_class(self.classes[start - 1]) {
            start -= 1;
        }
        while start > 0 && self.levels[start - 1] == para_level {
            start -= 1;
        }
        start
    }
}
