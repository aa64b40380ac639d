// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loaded part shapes keyed by part number

use crate::mesh::Mesh;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Cache of externally loaded part meshes
///
/// Shapes are stored in part-local coordinates and shared between every
/// occurrence with the same part number.
#[derive(Debug, Default, Clone)]
pub struct PartLibrary {
    parts: FxHashMap<String, Arc<Mesh>>,
}

impl PartLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shape, replacing any previous one for the part number
    pub fn insert(&mut self, part_number: impl Into<String>, mesh: Mesh) -> Option<Arc<Mesh>> {
        self.parts.insert(part_number.into(), Arc::new(mesh))
    }

    pub fn get(&self, part_number: &str) -> Option<Arc<Mesh>> {
        self.parts.get(part_number).cloned()
    }

    pub fn remove(&mut self, part_number: &str) -> Option<Arc<Mesh>> {
        self.parts.remove(part_number)
    }

    pub fn contains(&self, part_number: &str) -> bool {
        self.parts.contains_key(part_number)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn clear(&mut self) {
        self.parts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extrusion::centered_box;

    #[test]
    fn test_insert_replace_clear() {
        let mut library = PartLibrary::new();
        assert!(library.insert("X-1", Mesh::new()).is_none());
        let replaced = library.insert("X-1", centered_box(1.0, 1.0, 1.0).unwrap());
        assert!(replaced.is_some_and(|m| m.is_empty()));
        assert!(library.get("X-1").is_some_and(|m| !m.is_empty()));

        library.clear();
        assert!(library.is_empty());
        assert!(library.get("X-1").is_none());
    }
}
