// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Font registry with per-script face selection and fallback chains.
//!
//! Families are registered once at startup and live for the remainder of the
//! process. A family groups faces by weight and style, declares the scripts
//! it covers, and may name *linked* families (searched when the family does
//! not cover a script) and *fallback* families (searched per code point when
//! the selected face has no glyph).
//!
//! Scaled font instances are cached per thread; the shared face tables are
//! written only during registration and are read lock-free afterwards.

mod attributes;
mod face;
mod family;
mod registry;
mod scaled;
mod subfont;

pub use swash::text::Script;

pub use attributes::{FontStyle, FontWeight};
pub use face::{FaceCreateInfo, FaceId, FaceSource};
pub use family::FamilyId;
pub use registry::{
    get_face, get_family, is_family_initialized, register_family, FamilyCreateInfo, RegisterError,
};
pub use scaled::{scaled_font, ScaledFont};
pub use subfont::{get_sub_font, SingleScriptFont};

/// A request for a concrete face: a family bound to weight, style and pixel
/// size.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Font {
    pub family: FamilyId,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub size: u32,
}

impl Font {
    pub fn new(family: FamilyId, weight: FontWeight, style: FontStyle, size: u32) -> Self {
        Self {
            family,
            weight,
            style,
            size,
        }
    }
}
