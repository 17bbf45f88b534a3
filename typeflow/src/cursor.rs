// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cursor positions within laid-out text.

/// Which side of a run boundary a cursor at an ambiguous index sticks to.
///
/// At soft line breaks and at LTR↔RTL run transitions the same character
/// index has two visual positions; affinity picks one.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum Affinity {
    #[default]
    Default,
    Opposite,
}

/// A caret location: a byte index into the text plus an affinity.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct CursorPosition {
    pub index: u32,
    pub affinity: Affinity,
}

impl CursorPosition {
    /// The distinguished invalid position, used for "no selection anchor".
    pub const INVALID: Self = Self {
        index: u32::MAX,
        affinity: Affinity::Default,
    };

    pub fn new(index: u32) -> Self {
        Self {
            index,
            affinity: Affinity::Default,
        }
    }

    pub fn with_affinity(index: u32, affinity: Affinity) -> Self {
        Self { index, affinity }
    }

    pub fn is_valid(self) -> bool {
        self.index != u32::MAX
    }
}

impl Default for CursorPosition {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Pixel-space result of mapping a cursor through a layout.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct CaretPixel {
    pub x: f32,
    pub y: f32,
    pub height: f32,
    pub line_number: usize,
}
