// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visual attributes carried by formatting runs.

pub use peniko::Color;

/// Join style for stroked glyph outlines.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum StrokeJoins {
    #[default]
    Round,
    Bevel,
    Miter,
}

/// Outline stroke drawn behind a glyph.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct StrokeState {
    pub color: Color,
    pub thickness: u8,
    pub joins: StrokeJoins,
}

impl StrokeState {
    /// A fully transparent stroke draws nothing.
    pub fn is_visible(&self) -> bool {
        self.color.components[3] > 0.0
    }
}

impl Default for StrokeState {
    fn default() -> Self {
        Self {
            color: Color::TRANSPARENT,
            thickness: 1,
            joins: StrokeJoins::Round,
        }
    }
}

/// Horizontal alignment of lines within the text area.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum TextXAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical alignment of the text block within the text area.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum TextYAlign {
    #[default]
    Top,
    Center,
    Bottom,
}

impl TextYAlign {
    /// Half-steps of the leftover height placed above the text block.
    pub(crate) fn factor(self) -> f32 {
        match self {
            Self::Top => 0.0,
            Self::Center => 1.0,
            Self::Bottom => 2.0,
        }
    }
}
