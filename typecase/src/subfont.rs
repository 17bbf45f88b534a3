// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resolution of maximal single-face runs over multi-script text.

use smallvec::SmallVec;
use swash::text::Script;
use tracing::trace;

use crate::registry;
use crate::{scaled_font, FaceId, Font, ScaledFont};

/// A face bound to a pixel size, renderable without further fallback.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct SingleScriptFont {
    pub face: FaceId,
    pub size: u32,
}

/// Resolves the face that renders the longest prefix of
/// `text[*offset..limit]`, advancing `offset` past that prefix.
///
/// The base face is the one the family (or, failing script coverage, its
/// linked families in registration order) provides for the requested script.
/// Starting from the base face and continuing through the fallback families
/// in registration order, the first face that can render a code point of the
/// range is selected; `offset` then advances to the first code point that
/// face cannot render, or to `limit`. When no face in the chain covers any
/// code point of the range, the base face is returned and `offset` is set to
/// `limit` so the run renders as tofu rather than stalling.
///
/// Returns `None` only when the font's family is not initialized.
pub fn get_sub_font(
    font: Font,
    text: &str,
    offset: &mut usize,
    limit: usize,
    script: Script,
) -> Option<SingleScriptFont> {
    // Resolve the candidate chain up front so the registry lock is not held
    // across the per-code-point coverage scans.
    let (base_face, fallback_faces) = {
        let reg = registry::read();
        let family = reg.families.get(font.family.to_u32() as usize)?;
        if !family.initialized {
            return None;
        }

        let mut base = None;
        if !family.has_script(script) {
            for linked_id in &family.linked {
                let linked = &reg.families[linked_id.to_u32() as usize];
                if linked.initialized && linked.has_script(script) {
                    base = linked.face(font.weight, font.style);
                    break;
                }
            }
        }
        let base = base.or_else(|| family.face(font.weight, font.style))?;

        let fallback: SmallVec<[FaceId; 4]> = family
            .fallback
            .iter()
            .filter_map(|id| {
                let fam = &reg.families[id.to_u32() as usize];
                fam.initialized
                    .then(|| fam.face(font.weight, font.style))
                    .flatten()
            })
            .collect();
        (base, fallback)
    };

    // Find the first font able to render a char from the string.
    let mut target: Option<(FaceId, ScaledFont)> = None;
    let mut iter = text[*offset..limit].char_indices();
    for (_, c) in iter.by_ref() {
        if let Some(found) = find_compatible_face(font.size, c, base_face, &fallback_faces) {
            target = Some(found);
            break;
        }
    }

    // No face can render this substring; shape it all with the base face.
    let Some((face, data)) = target else {
        trace!(
            face = base_face.to_u32(),
            start = *offset,
            limit,
            ?script,
            "fallback chain exhausted; range renders with the base face"
        );
        *offset = limit;
        return Some(SingleScriptFont {
            face: base_face,
            size: font.size,
        });
    };

    // See how far the selected face keeps rendering.
    for (idx, c) in iter {
        if !data.has_codepoint(c) {
            *offset += idx;
            return Some(SingleScriptFont {
                face,
                size: font.size,
            });
        }
    }

    *offset = limit;
    Some(SingleScriptFont {
        face,
        size: font.size,
    })
}

fn find_compatible_face(
    size: u32,
    codepoint: char,
    base_face: FaceId,
    fallback_faces: &[FaceId],
) -> Option<(FaceId, ScaledFont)> {
    for face in core::iter::once(base_face).chain(fallback_faces.iter().copied()) {
        let Some(data) = scaled_font(face, size) else {
            continue;
        };
        if data.has_codepoint(codepoint) {
            return Some((face, data));
        }
    }
    None
}
