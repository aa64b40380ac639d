// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sparse per-element values to dense per-vertex buffers
//!
//! Colors, the enabled mask, diff states, pick ids and view properties all go
//! through [`apply_mapping`]: a buffer with one slot per merged vertex, filled
//! with a default and overwritten over the range of every mapped element.

use crate::merge::RangeTable;
use harness_model::ElementId;
use std::borrow::Borrow;

/// Build a per-vertex buffer from sparse per-element values
///
/// Later entries win where ranges overlap. Ids without a range (elements that
/// produced no geometry) are ignored.
pub fn apply_mapping<T, I, K>(default: T, values: I, ranges: &RangeTable) -> Vec<T>
where
    T: Clone,
    I: IntoIterator<Item = (K, T)>,
    K: Borrow<ElementId>,
{
    let mut buffer = vec![default; ranges.vertex_count()];
    write_mapping(&mut buffer, values, ranges);
    buffer
}

/// Overwrite the ranges of the given elements in an existing buffer
///
/// Returns the number of vertices written. Ranges that fall outside the
/// buffer are logged and skipped.
pub fn write_mapping<T, I, K>(buffer: &mut [T], values: I, ranges: &RangeTable) -> usize
where
    T: Clone,
    I: IntoIterator<Item = (K, T)>,
    K: Borrow<ElementId>,
{
    let mut written = 0;
    for (id, value) in values {
        let id = id.borrow();
        let Some(range) = ranges.get(id) else {
            log::trace!("no vertex range for {}", id);
            continue;
        };
        let Some(slots) = buffer.get_mut(range.indices()) else {
            log::error!(
                "range {}..={} of {} outside buffer of {} vertices",
                range.low,
                range.high,
                id,
                buffer.len()
            );
            continue;
        };
        slots.fill(value);
        written += slots.len();
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{MergedMesh, MeshMerger};
    use harness_geometry::{Fragment, Mesh, Point3, Vector3};
    use harness_model::ElementKind;
    use rustc_hash::FxHashMap;

    fn strip(vertices: usize) -> Mesh {
        let mut mesh = Mesh::new();
        for i in 0..vertices {
            mesh.add_vertex(Point3::new(i as f64, 0.0, 0.0), Vector3::z());
        }
        mesh
    }

    /// Table over elements "a" (3 vertices), "b" (2), "c" (4)
    fn table() -> RangeTable {
        let fragments = [("a", 3), ("b", 2), ("c", 4)]
            .into_iter()
            .map(|(id, n)| Fragment {
                id: id.into(),
                kind: ElementKind::Segment,
                mesh: strip(n),
            })
            .collect();
        let mut merged = MergedMesh::new();
        let mapping = MeshMerger::new().merge(&mut merged, &"h".into(), fragments);
        let mut table = RangeTable::new();
        table.extend_from(&mapping, merged.vertex_count());
        table
    }

    #[test]
    fn test_empty_map_yields_default() {
        let table = table();
        let buffer = apply_mapping(7u8, Vec::<(ElementId, u8)>::new(), &table);
        assert_eq!(buffer.len(), 9);
        assert!(buffer.iter().all(|&v| v == 7));
    }

    #[test]
    fn test_single_element_only_touches_its_range() {
        let table = table();
        let id = ElementId::from("b");
        let buffer = apply_mapping([0.0f32; 3], [(&id, [1.0, 0.5, 0.0])], &table);
        assert_eq!(&buffer[3..5], &[[1.0, 0.5, 0.0]; 2]);
        assert!(buffer[..3].iter().chain(&buffer[5..]).all(|v| *v == [0.0; 3]));

        let again = apply_mapping([0.0f32; 3], [(&id, [1.0, 0.5, 0.0])], &table);
        assert_eq!(buffer, again);
    }

    #[test]
    fn test_hash_map_input_and_unknown_ids() {
        let table = table();
        let mut values = FxHashMap::default();
        values.insert(ElementId::from("a"), 1.0f32);
        values.insert(ElementId::from("c"), 2.0);
        values.insert(ElementId::from("node-without-geometry"), 9.0);

        let buffer = apply_mapping(0.0, values, &table);
        assert_eq!(buffer, vec![1.0, 1.0, 1.0, 0.0, 0.0, 2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_later_entries_win() {
        let table = table();
        let a = ElementId::from("a");
        let buffer = apply_mapping(0, [(&a, 1), (&a, 2)], &table);
        assert_eq!(&buffer[..3], &[2, 2, 2]);
    }

    #[test]
    fn test_write_mapping_patches_in_place() {
        let table = table();
        let mut buffer = apply_mapping(false, Vec::<(ElementId, bool)>::new(), &table);
        let written = write_mapping(&mut buffer, [(ElementId::from("c"), true)], &table);
        assert_eq!(written, 4);
        assert_eq!(buffer.iter().filter(|&&v| v).count(), 4);

        // shorter buffer than the table: out-of-range writes are skipped
        let mut short = vec![0; 4];
        assert_eq!(write_mapping(&mut short, [(ElementId::from("c"), 1)], &table), 0);
    }
}
