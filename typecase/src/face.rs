// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Model for individual font faces.

use peniko::Blob;
use std::path::PathBuf;

use crate::{FontStyle, FontWeight};

/// Unique identifier for a registered face.
///
/// Identifiers are indices into the process-wide face table and are never
/// reused.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[repr(transparent)]
pub struct FaceId(pub(crate) u32);

impl FaceId {
    /// Returns the underlying integer value.
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

/// Where the bytes of a face come from.
#[derive(Clone, Debug)]
pub enum FaceSource {
    /// A font file on disk, read once at registration.
    Path(PathBuf),
    /// Font data already in memory.
    Memory(Blob<u8>),
}

/// One face entry in a [`FamilyCreateInfo`](crate::FamilyCreateInfo).
///
/// Faces are deduplicated by name across families: registering the same name
/// twice reuses the first face's data.
#[derive(Clone, Debug)]
pub struct FaceCreateInfo<'a> {
    pub name: &'a str,
    pub source: FaceSource,
    pub weight: FontWeight,
    pub style: FontStyle,
}

/// Registry-owned face data. The file bytes live for the rest of the
/// process; an empty blob marks a face whose source failed to load.
#[derive(Clone)]
pub(crate) struct FaceData {
    #[allow(dead_code)]
    pub name: String,
    pub blob: Blob<u8>,
}
