// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The glyph atlas interface consumed by the text box, and the rectangle
//! list it produces.
//!
//! Rasterization and atlas packing live behind [`GlyphAtlas`]; the core
//! only ever sees texture handles and UV rectangles.

use typecase::SingleScriptFont;

use crate::style::{Color, StrokeJoins};

/// Opaque handle to a texture owned by the renderer.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct TextureId(pub u64);

/// Placement of one glyph (or stroke outline) in the atlas.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct GlyphInfo {
    pub texture: TextureId,
    /// `[u, v, width, height]` of the glyph in its texture.
    pub uv: [f32; 4],
    /// Pixel size of the rasterized glyph.
    pub size: [f32; 2],
    /// Offset from the pen position to the glyph's top-left corner.
    pub offset: [f32; 2],
    /// Color glyphs (emoji) render white instead of the text color.
    pub has_color: bool,
}

/// Rasterization and packing service queried per glyph.
pub trait GlyphAtlas {
    fn glyph_info(&mut self, font: SingleScriptFont, glyph_id: u16) -> GlyphInfo;

    fn stroke_info(
        &mut self,
        font: SingleScriptFont,
        glyph_id: u16,
        thickness: u8,
        joins: StrokeJoins,
    ) -> GlyphInfo;

    /// A 1×1 white texture for solid rectangles (carets, highlights,
    /// decorations).
    fn default_texture(&mut self) -> TextureId;
}

/// Render pass a rectangle belongs to.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Pipeline {
    Rect,
    Msdf,
    Outline,
}

/// One textured, colored rectangle of the final display list.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// `[u, v, width, height]` into `texture`.
    pub uv: [f32; 4],
    pub texture: TextureId,
    pub color: Color,
    pub pipeline: Pipeline,
}
