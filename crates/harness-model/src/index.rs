// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Id lookup over a preprocessed harness

use crate::{BuildingBlock, ElementId, Harness, Node, Occurrence, Segment};
use std::collections::HashMap;

/// Borrowed id index over one harness
///
/// Lookups are O(1). Elements without an id are not indexed. When ids repeat,
/// the first element wins.
#[derive(Debug)]
pub struct HarnessIndex<'a> {
    harness: &'a Harness,
    building_blocks: HashMap<&'a ElementId, &'a BuildingBlock>,
    nodes: HashMap<&'a ElementId, &'a Node>,
    segments: HashMap<&'a ElementId, &'a Segment>,
    occurrences: HashMap<&'a ElementId, &'a Occurrence>,
}

impl<'a> HarnessIndex<'a> {
    pub fn new(harness: &'a Harness) -> Self {
        fn index<'a, T>(
            items: &'a [T],
            id: impl Fn(&'a T) -> Option<&'a ElementId>,
        ) -> HashMap<&'a ElementId, &'a T> {
            let mut map = HashMap::with_capacity(items.len());
            for item in items {
                if let Some(key) = id(item) {
                    map.entry(key).or_insert(item);
                }
            }
            map
        }

        Self {
            harness,
            building_blocks: index(&harness.building_blocks, |b| b.id.as_ref()),
            nodes: index(&harness.nodes, |n| n.id.as_ref()),
            segments: index(&harness.segments, |s| s.id.as_ref()),
            occurrences: index(&harness.occurrences, |o| o.id.as_ref()),
        }
    }

    pub fn harness(&self) -> &'a Harness {
        self.harness
    }

    pub fn building_block(&self, id: &ElementId) -> Option<&'a BuildingBlock> {
        self.building_blocks.get(id).copied()
    }

    pub fn node(&self, id: &ElementId) -> Option<&'a Node> {
        self.nodes.get(id).copied()
    }

    pub fn segment(&self, id: &ElementId) -> Option<&'a Segment> {
        self.segments.get(id).copied()
    }

    pub fn occurrence(&self, id: &ElementId) -> Option<&'a Occurrence> {
        self.occurrences.get(id).copied()
    }

    /// Segments starting or ending at `node`, in harness order
    pub fn segments_at_node<'b>(
        &'b self,
        node: &'b ElementId,
    ) -> impl Iterator<Item = &'a Segment> + 'b {
        self.harness.segments.iter().filter(move |s| {
            s.start_node_id.as_ref() == Some(node) || s.end_node_id.as_ref() == Some(node)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_attached_segments() {
        let mut harness = Harness::new("h");
        harness.nodes.push(Node {
            id: Some("n1".into()),
            ..Default::default()
        });
        for (id, start, end) in [("s1", "n1", "n2"), ("s2", "n3", "n1"), ("s3", "n2", "n3")] {
            harness.segments.push(Segment {
                id: Some(id.into()),
                start_node_id: Some(start.into()),
                end_node_id: Some(end.into()),
                ..Default::default()
            });
        }

        let index = HarnessIndex::new(&harness);
        assert!(index.node(&"n1".into()).is_some());
        assert!(index.node(&"n2".into()).is_none());

        let n1 = ElementId::from("n1");
        let attached: Vec<_> = index
            .segments_at_node(&n1)
            .filter_map(|s| s.id.as_ref())
            .map(|id| id.as_str())
            .collect();
        assert_eq!(attached, vec!["s1", "s2"]);
    }

    #[test]
    fn test_first_duplicate_wins() {
        let mut harness = Harness::new("h");
        for length in [1.0, 2.0] {
            harness.segments.push(Segment {
                id: Some("dup".into()),
                virtual_length: Some(length),
                ..Default::default()
            });
        }
        let index = HarnessIndex::new(&harness);
        assert_eq!(index.segment(&"dup".into()).and_then(|s| s.virtual_length), Some(1.0));
    }
}
