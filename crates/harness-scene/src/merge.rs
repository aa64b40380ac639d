// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh merging and vertex range bookkeeping
//!
//! Every harness appends its fragments to one shared buffer. Each fragment
//! owns the contiguous slice of vertices it brought in, recorded as an
//! inclusive [`VertexRange`]. Offsets keep running across harnesses so ranges
//! handed out earlier stay valid.

use crate::error::{Result, SceneError};
use harness_geometry::{Fragment, Mesh, Vector3};
use harness_model::{ElementId, ElementKind};
use rustc_hash::FxHashMap;
use std::ops::Range;

/// Inclusive `[low, high]` vertex interval in the merged buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexRange {
    pub low: u32,
    pub high: u32,
}

impl VertexRange {
    /// Range of `count` vertices starting at `low`; `None` for an empty run
    pub fn with_count(low: u32, count: u32) -> Option<Self> {
        let high = low.checked_add(count.checked_sub(1)?)?;
        Some(Self { low, high })
    }

    #[inline]
    pub fn len(&self) -> usize {
        (self.high - self.low) as usize + 1
    }

    /// Never true, a range always holds at least one vertex
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn contains(&self, vertex: u32) -> bool {
        (self.low..=self.high).contains(&vertex)
    }

    /// Half-open index range for slicing per-vertex buffers
    #[inline]
    pub fn indices(&self) -> Range<usize> {
        self.low as usize..self.high as usize + 1
    }
}

/// Element id to vertex range for one harness, in append order
#[derive(Debug, Clone, Default)]
pub struct ElementToVertexMapping {
    harness_id: ElementId,
    entries: Vec<(ElementId, ElementKind, VertexRange)>,
    by_id: FxHashMap<ElementId, usize>,
}

impl ElementToVertexMapping {
    pub fn new(harness_id: ElementId) -> Self {
        Self {
            harness_id,
            ..Default::default()
        }
    }

    pub fn harness_id(&self) -> &ElementId {
        &self.harness_id
    }

    fn insert(&mut self, id: ElementId, kind: ElementKind, range: VertexRange) -> Result<()> {
        if self.by_id.contains_key(&id) {
            return Err(SceneError::DuplicateElement(id));
        }
        self.by_id.insert(id.clone(), self.entries.len());
        self.entries.push((id, kind, range));
        Ok(())
    }

    pub fn get(&self, id: &ElementId) -> Option<VertexRange> {
        self.by_id.get(id).map(|&i| self.entries[i].2)
    }

    pub fn kind_of(&self, id: &ElementId) -> Option<ElementKind> {
        self.by_id.get(id).map(|&i| self.entries[i].1)
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Entries in the order their fragments were appended
    pub fn iter(&self) -> impl Iterator<Item = (&ElementId, ElementKind, VertexRange)> {
        self.entries.iter().map(|(id, kind, range)| (id, *kind, *range))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vertices contributed by this harness
    pub fn vertex_count(&self) -> usize {
        self.entries.iter().map(|(_, _, r)| r.len()).sum()
    }

    /// First and last vertex owned by this harness
    pub fn span(&self) -> Option<VertexRange> {
        let first = self.entries.first()?.2;
        let last = self.entries.last()?.2;
        Some(VertexRange {
            low: first.low,
            high: last.high,
        })
    }
}

/// Session-wide id to range lookup over every loaded harness
#[derive(Debug, Clone, Default)]
pub struct RangeTable {
    ranges: FxHashMap<ElementId, VertexRange>,
    vertex_count: usize,
}

impl RangeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every range of a harness mapping; a duplicate id takes the later range
    pub fn extend_from(&mut self, mapping: &ElementToVertexMapping, vertex_count: usize) {
        for (id, _, range) in mapping.iter() {
            if let Some(previous) = self.ranges.insert(id.clone(), range) {
                log::warn!(
                    "element {} of harness {} replaces range {}..={} with {}..={}",
                    id,
                    mapping.harness_id(),
                    previous.low,
                    previous.high,
                    range.low,
                    range.high
                );
            }
        }
        self.vertex_count = vertex_count;
    }

    pub fn get(&self, id: &ElementId) -> Option<VertexRange> {
        self.ranges.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ElementId, VertexRange)> {
        self.ranges.iter().map(|(id, range)| (id, *range))
    }

    /// Total vertex count of the merged buffer the ranges index into
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
        self.vertex_count = 0;
    }
}

/// Merged scene buffer stored relative to its bounding-box center
#[derive(Debug, Clone, Default)]
pub struct MergedMesh {
    mesh: Mesh,
    center: Vector3<f64>,
}

impl MergedMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers in centered coordinates
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// World position of the local origin; the renderer translates by this
    pub fn center(&self) -> Vector3<f64> {
        self.center
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    pub fn is_empty(&self) -> bool {
        self.mesh.is_empty()
    }

    /// World-space bounds `(min, max)`
    pub fn bounds(&self) -> Option<(Vector3<f64>, Vector3<f64>)> {
        if self.mesh.is_empty() {
            return None;
        }
        let (min, max) = self.mesh.bounds();
        let min = Vector3::new(min.x as f64, min.y as f64, min.z as f64) + self.center;
        let max = Vector3::new(max.x as f64, max.y as f64, max.z as f64) + self.center;
        Some((min, max))
    }

    pub fn clear(&mut self) {
        self.mesh.clear();
        self.center = Vector3::zeros();
    }

    /// Move the local origin to the bounding-box center, returning the new center
    pub fn recenter(&mut self) -> Vector3<f64> {
        let Some((min, max)) = self.bounds() else {
            self.center = Vector3::zeros();
            return self.center;
        };
        let center = (min + max) * 0.5;
        self.mesh.translate(self.center - center);
        self.center = center;
        self.center
    }
}

/// Appends compiled fragments to a [`MergedMesh`]
#[derive(Debug, Default)]
pub struct MeshMerger;

impl MeshMerger {
    pub fn new() -> Self {
        Self
    }

    /// Append one harness worth of fragments and record their ranges
    ///
    /// Defective or duplicate fragments are logged and contribute no vertices,
    /// so the returned ranges always partition exactly what was appended.
    pub fn merge(
        &self,
        target: &mut MergedMesh,
        harness_id: &ElementId,
        fragments: Vec<Fragment>,
    ) -> ElementToVertexMapping {
        let mut mapping = ElementToVertexMapping::new(harness_id.clone());
        let start = target.vertex_count();

        for fragment in fragments {
            let Fragment { id, kind, mut mesh } = fragment;
            if let Err(e) = self.check(&mapping, &id, &mesh, target.vertex_count()) {
                log::error!("{} {} of harness {}: {}", kind, id, harness_id, e);
                continue;
            }
            if mesh.is_empty() {
                log::debug!("{} {} has no geometry", kind, id);
                continue;
            }

            let offset = target.vertex_count() as u32;
            let count = mesh.vertex_count() as u32;
            let Some(range) = VertexRange::with_count(offset, count) else {
                continue;
            };

            mesh.translate(-target.center);
            target.mesh.merge(&mesh);
            // checked above, cannot collide
            let _ = mapping.insert(id, kind, range);
        }

        let center = target.recenter();
        log::debug!(
            "merged harness {}: {} elements, {} vertices (total {}), center {:?}",
            harness_id,
            mapping.len(),
            target.vertex_count() - start,
            target.vertex_count(),
            center
        );
        mapping
    }

    fn check(
        &self,
        mapping: &ElementToVertexMapping,
        id: &ElementId,
        mesh: &Mesh,
        offset: usize,
    ) -> Result<()> {
        if mapping.contains(id) {
            return Err(SceneError::DuplicateElement(id.clone()));
        }
        mesh.validate()
            .map_err(|defect| SceneError::merge(defect.to_string()))?;
        if offset + mesh.vertex_count() > u32::MAX as usize {
            return Err(SceneError::merge("merged vertex count exceeds u32 index range"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use harness_geometry::{centered_box, Point3};

    fn fragment(id: &str, kind: ElementKind, mesh: Mesh) -> Fragment {
        Fragment {
            id: id.into(),
            kind,
            mesh,
        }
    }

    fn quad(x: f64) -> Mesh {
        let mut mesh = Mesh::new();
        for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            mesh.add_vertex(Point3::new(x + dx, dy, 0.0), Vector3::z());
        }
        mesh.add_triangle(0, 1, 2);
        mesh.add_triangle(0, 2, 3);
        mesh
    }

    #[test]
    fn test_vertex_range_counts() {
        let range = VertexRange::with_count(10, 4).unwrap();
        assert_eq!((range.low, range.high), (10, 13));
        assert_eq!(range.len(), 4);
        assert_eq!(range.indices(), 10..14);
        assert!(range.contains(13) && !range.contains(14));
        assert!(VertexRange::with_count(3, 0).is_none());
    }

    #[test]
    fn test_ranges_partition_merged_buffer() {
        let mut merged = MergedMesh::new();
        let mapping = MeshMerger::new().merge(
            &mut merged,
            &"h1".into(),
            vec![
                fragment("a", ElementKind::Segment, quad(0.0)),
                fragment("b", ElementKind::Connector, centered_box(1.0, 1.0, 1.0).unwrap()),
                fragment("c", ElementKind::Fixing, quad(5.0)),
            ],
        );

        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.vertex_count(), merged.vertex_count());
        let mut expected_low = 0;
        for (_, _, range) in mapping.iter() {
            assert_eq!(range.low, expected_low);
            expected_low = range.high + 1;
        }
        assert_eq!(expected_low as usize, merged.vertex_count());
        assert_eq!(merged.mesh().validate(), Ok(()));
    }

    #[test]
    fn test_second_harness_continues_offset() {
        let merger = MeshMerger::new();
        let mut merged = MergedMesh::new();
        let first = merger.merge(&mut merged, &"h1".into(), vec![fragment("a", ElementKind::Segment, quad(0.0))]);
        let second = merger.merge(&mut merged, &"h2".into(), vec![fragment("b", ElementKind::Segment, quad(2.0))]);

        assert_eq!(first.get(&"a".into()), Some(VertexRange { low: 0, high: 3 }));
        assert_eq!(second.get(&"b".into()), Some(VertexRange { low: 4, high: 7 }));
        assert_eq!(second.span(), Some(VertexRange { low: 4, high: 7 }));

        // second triangle list points at its own vertices
        assert!(merged.mesh().indices[6..].iter().all(|&i| (4..8).contains(&i)));
    }

    #[test]
    fn test_recenter_preserves_world_positions() {
        let merger = MeshMerger::new();
        let mut merged = MergedMesh::new();
        merger.merge(&mut merged, &"h1".into(), vec![fragment("a", ElementKind::Segment, quad(10.0))]);
        assert_relative_eq!(merged.center(), Vector3::new(10.5, 0.5, 0.0), epsilon = 1e-6);

        merger.merge(&mut merged, &"h2".into(), vec![fragment("b", ElementKind::Segment, quad(20.0))]);
        assert_relative_eq!(merged.center(), Vector3::new(15.5, 0.5, 0.0), epsilon = 1e-6);

        // first vertex of the first harness is still at world (10, 0, 0)
        let p = &merged.mesh().positions;
        let world = Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64) + merged.center();
        assert_relative_eq!(world, Vector3::new(10.0, 0.0, 0.0), epsilon = 1e-4);

        let (min, max) = merged.bounds().unwrap();
        assert_relative_eq!(min, Vector3::new(10.0, 0.0, 0.0), epsilon = 1e-4);
        assert_relative_eq!(max, Vector3::new(21.0, 1.0, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn test_defective_and_duplicate_fragments_skipped() {
        let mut broken = quad(0.0);
        broken.indices.push(99);
        broken.indices.extend([0, 1]);

        let mut merged = MergedMesh::new();
        let mapping = MeshMerger::new().merge(
            &mut merged,
            &"h1".into(),
            vec![
                fragment("bad", ElementKind::Segment, broken),
                fragment("empty", ElementKind::Accessory, Mesh::new()),
                fragment("a", ElementKind::Segment, quad(0.0)),
                fragment("a", ElementKind::Segment, quad(3.0)),
            ],
        );

        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get(&"a".into()), Some(VertexRange { low: 0, high: 3 }));
        assert!(mapping.get(&"bad".into()).is_none());
        assert!(mapping.get(&"empty".into()).is_none());
        assert_eq!(merged.vertex_count(), 4);
    }

    #[test]
    fn test_range_table_later_duplicate_wins() {
        let merger = MeshMerger::new();
        let mut merged = MergedMesh::new();
        let mut table = RangeTable::new();

        let first = merger.merge(&mut merged, &"h1".into(), vec![fragment("x", ElementKind::Segment, quad(0.0))]);
        table.extend_from(&first, merged.vertex_count());
        let second = merger.merge(&mut merged, &"h2".into(), vec![fragment("x", ElementKind::Segment, quad(1.0))]);
        table.extend_from(&second, merged.vertex_count());

        assert_eq!(table.len(), 1);
        assert_eq!(table.vertex_count(), 8);
        assert_eq!(table.get(&"x".into()), Some(VertexRange { low: 4, high: 7 }));
        assert_eq!(first.get(&"x".into()), Some(VertexRange { low: 0, high: 3 }));
    }
}
