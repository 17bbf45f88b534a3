// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Model for font families.

use smallvec::SmallVec;
use swash::text::Script;

use crate::{FaceId, FontStyle, FontWeight};

/// Unique identifier for a font family.
///
/// Identifiers are indices into the process-wide family table and are never
/// reused. A family handle may refer to an *uninitialized* family: linked
/// and fallback references to families that have not been registered yet are
/// created eagerly so forward references resolve once registration happens.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[repr(transparent)]
pub struct FamilyId(pub(crate) u32);

impl FamilyId {
    /// Returns the underlying integer value.
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Default)]
pub(crate) struct FamilyData {
    pub name: String,
    /// One face per `(weight, style)` cell. After initialization every cell
    /// is `Some`: missing cells are filled with the default face.
    pub faces: [[Option<FaceId>; FontStyle::COUNT]; FontWeight::COUNT],
    pub linked: SmallVec<[FamilyId; 2]>,
    pub fallback: SmallVec<[FamilyId; 2]>,
    /// Scripts this family covers. Empty together with `all_scripts` means
    /// the family was registered without a script list.
    pub scripts: SmallVec<[Script; 4]>,
    pub all_scripts: bool,
    pub initialized: bool,
}

impl FamilyData {
    pub fn face(&self, weight: FontWeight, style: FontStyle) -> Option<FaceId> {
        self.faces[weight.slot()][style.slot()]
    }

    pub fn has_script(&self, script: Script) -> bool {
        self.all_scripts || self.scripts.contains(&script)
    }
}
