// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The process-wide family and face tables.

use hashbrown::HashMap;
use peniko::Blob;
use smallvec::SmallVec;
use std::sync::{Arc, LazyLock, RwLock, RwLockReadGuard};
use swash::text::Script;
use thiserror::Error;
use tracing::warn;

use crate::face::{FaceCreateInfo, FaceData, FaceSource};
use crate::family::FamilyData;
use crate::{FaceId, FamilyId, Font, FontStyle, FontWeight};

/// Errors reported by [`register_family`].
#[derive(Copy, Clone, PartialEq, Eq, Debug, Error)]
pub enum RegisterError {
    /// The family has already been registered with faces.
    #[error("font family is already loaded")]
    AlreadyLoaded,
    /// The create info contained no faces.
    #[error("font family has no faces")]
    NoFaces,
}

/// Everything needed to register a family.
///
/// Linked and fallback family names that have not been registered yet are
/// created in an uninitialized state, so families can reference each other
/// regardless of registration order.
#[derive(Clone, Debug, Default)]
pub struct FamilyCreateInfo<'a> {
    pub name: &'a str,
    /// Scripts this family covers. Empty means all scripts.
    pub scripts: &'a [Script],
    /// Families searched, in order, when this family does not cover the
    /// requested script.
    pub linked_families: &'a [&'a str],
    /// Families searched, in order, for code points the selected face
    /// cannot render.
    pub fallback_families: &'a [&'a str],
    pub faces: &'a [FaceCreateInfo<'a>],
}

#[derive(Default)]
pub(crate) struct Registry {
    pub faces: Vec<FaceData>,
    faces_by_name: HashMap<String, FaceId>,
    pub families: Vec<FamilyData>,
    families_by_name: HashMap<String, FamilyId>,
}

static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(Registry::default()));

pub(crate) fn read() -> RwLockReadGuard<'static, Registry> {
    REGISTRY.read().expect("font registry lock poisoned")
}

impl Registry {
    fn get_or_add_family(&mut self, name: &str) -> FamilyId {
        if let Some(id) = self.families_by_name.get(name) {
            return *id;
        }
        let id = FamilyId(self.families.len() as u32);
        self.families_by_name.insert(name.to_owned(), id);
        self.families.push(FamilyData {
            name: name.to_owned(),
            ..Default::default()
        });
        id
    }

    fn get_or_add_face(&mut self, info: &FaceCreateInfo<'_>) -> FaceId {
        if let Some(id) = self.faces_by_name.get(info.name) {
            return *id;
        }
        let id = FaceId(self.faces.len() as u32);
        self.faces_by_name.insert(info.name.to_owned(), id);
        let blob = match &info.source {
            FaceSource::Memory(blob) => blob.clone(),
            FaceSource::Path(path) => match std::fs::read(path) {
                Ok(bytes) => Blob::new(Arc::new(bytes)),
                Err(err) => {
                    // Keep the entry so the face id stays valid; lookups on
                    // it return no font data and callers fall back.
                    warn!(face = info.name, path = %path.display(), %err, "failed to read face file");
                    Blob::new(Arc::new(Vec::new()))
                }
            },
        };
        self.faces.push(FaceData {
            name: info.name.to_owned(),
            blob,
        });
        id
    }
}

/// Registers a family and its faces.
///
/// After a successful registration every `(weight, style)` cell of the
/// family resolves to a face: cells without an explicit face use the default
/// face, which is the Regular/Normal face when provided and the first
/// provided face otherwise.
pub fn register_family(info: &FamilyCreateInfo<'_>) -> Result<FamilyId, RegisterError> {
    let mut reg = REGISTRY.write().expect("font registry lock poisoned");
    let family = reg.get_or_add_family(info.name);

    if reg.families[family.0 as usize].initialized {
        return Err(RegisterError::AlreadyLoaded);
    }

    let scripts: SmallVec<[Script; 4]> = info.scripts.iter().copied().collect();
    let all_scripts = scripts.is_empty();
    let linked: SmallVec<[FamilyId; 2]> = info
        .linked_families
        .iter()
        .map(|name| reg.get_or_add_family(name))
        .collect();
    let fallback: SmallVec<[FamilyId; 2]> = info
        .fallback_families
        .iter()
        .map(|name| reg.get_or_add_family(name))
        .collect();

    if info.faces.is_empty() {
        return Err(RegisterError::NoFaces);
    }

    let mut faces = [[None; FontStyle::COUNT]; FontWeight::COUNT];
    let mut default_face = None;
    for face_info in info.faces {
        let face = reg.get_or_add_face(face_info);
        faces[face_info.weight.slot()][face_info.style.slot()] = Some(face);
        // Prefer the Regular/Normal face as the default for missing cells.
        if face_info.weight == FontWeight::REGULAR && face_info.style == FontStyle::Normal {
            default_face = Some(face);
        } else if default_face.is_none() {
            default_face = Some(face);
        }
    }
    for row in &mut faces {
        for cell in row {
            if cell.is_none() {
                *cell = default_face;
            }
        }
    }

    let data = &mut reg.families[family.0 as usize];
    data.faces = faces;
    data.linked = linked;
    data.fallback = fallback;
    data.scripts = scripts;
    data.all_scripts = all_scripts;
    data.initialized = true;
    Ok(family)
}

/// Looks up a family by name.
pub fn get_family(name: &str) -> Option<FamilyId> {
    read().families_by_name.get(name).copied()
}

/// Whether the family has been registered with faces.
pub fn is_family_initialized(family: FamilyId) -> bool {
    read()
        .families
        .get(family.0 as usize)
        .is_some_and(|f| f.initialized)
}

/// Resolves a font request to the face in its family's `(weight, style)`
/// cell. Returns `None` for uninitialized families.
pub fn get_face(font: Font) -> Option<FaceId> {
    read()
        .families
        .get(font.family.0 as usize)
        .filter(|f| f.initialized)
        .and_then(|f| f.face(font.weight, font.style))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FaceSource;

    fn memory_face<'a>(name: &'a str, weight: FontWeight, style: FontStyle) -> FaceCreateInfo<'a> {
        FaceCreateInfo {
            name,
            source: FaceSource::Memory(Blob::new(Arc::new(Vec::new()))),
            weight,
            style,
        }
    }

    #[test]
    fn registration_fills_missing_cells() {
        let family = register_family(&FamilyCreateInfo {
            name: "reg-test-fill",
            faces: &[
                memory_face("reg-test-fill-regular", FontWeight::REGULAR, FontStyle::Normal),
                memory_face("reg-test-fill-bold", FontWeight::BOLD, FontStyle::Normal),
            ],
            ..Default::default()
        })
        .unwrap();

        let regular = get_face(Font::new(family, FontWeight::REGULAR, FontStyle::Normal, 16)).unwrap();
        let bold = get_face(Font::new(family, FontWeight::BOLD, FontStyle::Normal, 16)).unwrap();
        assert_ne!(regular, bold);

        // Missing cells resolve to the Regular/Normal default.
        let thin_italic = get_face(Font::new(family, FontWeight::THIN, FontStyle::Italic, 16)).unwrap();
        assert_eq!(thin_italic, regular);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let info = FamilyCreateInfo {
            name: "reg-test-dup",
            faces: &[memory_face("reg-test-dup-face", FontWeight::REGULAR, FontStyle::Normal)],
            ..Default::default()
        };
        register_family(&info).unwrap();
        assert_eq!(register_family(&info), Err(RegisterError::AlreadyLoaded));
    }

    #[test]
    fn empty_face_list_is_rejected_and_retryable() {
        let name = "reg-test-empty";
        assert_eq!(
            register_family(&FamilyCreateInfo {
                name,
                ..Default::default()
            }),
            Err(RegisterError::NoFaces)
        );
        // The failed attempt leaves the family uninitialized so a later
        // registration can succeed.
        let family = register_family(&FamilyCreateInfo {
            name,
            faces: &[memory_face("reg-test-empty-face", FontWeight::REGULAR, FontStyle::Normal)],
            ..Default::default()
        })
        .unwrap();
        assert!(is_family_initialized(family));
    }

    #[test]
    fn forward_references_resolve() {
        register_family(&FamilyCreateInfo {
            name: "reg-test-fwd",
            fallback_families: &["reg-test-fwd-later"],
            faces: &[memory_face("reg-test-fwd-face", FontWeight::REGULAR, FontStyle::Normal)],
            ..Default::default()
        })
        .unwrap();

        // The fallback family exists but is uninitialized until registered.
        let later = get_family("reg-test-fwd-later").unwrap();
        assert!(!is_family_initialized(later));

        let registered = register_family(&FamilyCreateInfo {
            name: "reg-test-fwd-later",
            faces: &[memory_face("reg-test-fwd-later-face", FontWeight::REGULAR, FontStyle::Normal)],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(later, registered);
        assert!(is_family_initialized(later));
    }
}
