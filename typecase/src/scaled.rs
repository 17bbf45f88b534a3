// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-thread cache of scaled font instances.

use hashbrown::HashMap;
use peniko::Blob;
use std::cell::RefCell;
use swash::{CacheKey, FontRef, Metrics};

use crate::{registry, FaceId};

/// A face bound to a pixel size, with parsed font data and design metrics.
///
/// Instances are cheap to clone (the font bytes are shared) and are cached
/// per thread keyed by face: requesting the same face at another size
/// resizes the cached instance in place rather than adding a second entry.
#[derive(Clone)]
pub struct ScaledFont {
    pub face: FaceId,
    blob: Blob<u8>,
    offset: u32,
    key: CacheKey,
    size: u32,
    metrics: Metrics,
}

impl ScaledFont {
    /// Returns a swash view of the font data for shaping and glyph mapping.
    pub fn as_ref(&self) -> FontRef<'_> {
        // The offset and cache key were produced by `FontRef::from_index` on
        // these same bytes, so reassembling the struct is valid.
        FontRef {
            data: self.blob.as_ref(),
            offset: self.offset,
            key: self.key,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Whether the face maps this code point to a real glyph.
    pub fn has_codepoint(&self, c: char) -> bool {
        self.as_ref().charmap().map(c) != 0
    }

    fn scale(&self) -> f32 {
        let upem = self.metrics.units_per_em;
        if upem == 0 {
            return 0.0;
        }
        self.size as f32 / upem as f32
    }

    /// Distance from the baseline to the top of the line, in pixels.
    pub fn ascent(&self) -> f32 {
        self.metrics.ascent * self.scale()
    }

    /// Distance from the baseline to the bottom of the line, in pixels.
    pub fn descent(&self) -> f32 {
        self.metrics.descent * self.scale()
    }

    pub fn line_height(&self) -> f32 {
        (self.metrics.ascent + self.metrics.descent + self.metrics.leading) * self.scale()
    }

    /// Offset from the baseline to the top of the underline stroke,
    /// y-down: positive values are below the baseline.
    pub fn underline_position(&self) -> f32 {
        -self.metrics.underline_offset * self.scale()
    }

    pub fn underline_thickness(&self) -> f32 {
        self.metrics.stroke_size * self.scale()
    }

    /// Offset from the baseline to the top of the strikeout stroke, y-down.
    /// Sourced from the OS/2 table when the face has one.
    pub fn strikethrough_position(&self) -> f32 {
        -self.metrics.strikeout_offset * self.scale()
    }

    pub fn strikethrough_thickness(&self) -> f32 {
        self.metrics.stroke_size * self.scale()
    }

    fn resize(&mut self, size: u32) {
        self.size = size;
    }
}

thread_local! {
    static SCALED_CACHE: RefCell<HashMap<FaceId, ScaledFont>> = RefCell::new(HashMap::new());
}

/// Returns a scaled instance of the face, using this thread's cache.
///
/// Returns `None` when the face's bytes are empty (its source failed to
/// load) or unparseable; callers are expected to continue down their
/// fallback chain.
pub fn scaled_font(face: FaceId, size: u32) -> Option<ScaledFont> {
    SCALED_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(entry) = cache.get_mut(&face) {
            entry.resize(size);
            return Some(entry.clone());
        }
        let entry = load(face, size)?;
        cache.insert(face, entry.clone());
        Some(entry)
    })
}

fn load(face: FaceId, size: u32) -> Option<ScaledFont> {
    let blob = {
        let reg = registry::read();
        reg.faces.get(face.to_u32() as usize)?.blob.clone()
    };
    if blob.as_ref().is_empty() {
        return None;
    }
    let font_ref = FontRef::from_index(blob.as_ref(), 0)?;
    let metrics = font_ref.metrics(&[]);
    let (offset, key) = (font_ref.offset, font_ref.key);
    Some(ScaledFont {
        face,
        blob,
        offset,
        key,
        size,
        metrics,
    })
}
