// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Unicode-aware rich text layout and an editable text box core.
//!
//! The pipeline runs: inline markup → formatting runs → per-script font
//! resolution (via [`typecase`]) → shaping and line breaking → line-level
//! bidi reordering → glyph stream → caret reconciliation → a flat list of
//! textured rectangles for the renderer.

pub use typecase;

pub mod atlas;
pub mod bidi;
pub mod cursor;
pub mod editing;
pub mod input;
pub mod layout;
pub mod markup;
pub mod runs;
pub mod style;
pub mod textbox;

pub use atlas::{GlyphAtlas, GlyphInfo, Pipeline, Rect, TextureId};
pub use cursor::{Affinity, CaretPixel, CursorPosition};
pub use layout::{LayoutFlags, LineInfo, ParagraphLayout, VisualRun};
pub use markup::FormattingRuns;
pub use runs::RunArray;
pub use style::{Color, StrokeJoins, StrokeState, TextXAlign, TextYAlign};
pub use textbox::{TextBox, TextSystem};
