// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural and referential validation of raw harness data
//!
//! Elements are checked bottom-up (building blocks, nodes, segments,
//! occurrences) because each stage only accepts references into the sets
//! accepted by the stages before it. A rejected element is dropped with a
//! diagnostic; nothing here aborts the harness.

use crate::error::{Rejection, Result, ValidationError};
use crate::{
    BuildingBlock, ElementId, ElementKind, Harness, Location, Node, Occurrence, PartType,
    Placement, Segment,
};
use std::collections::HashSet;

/// Filtered harness plus the diagnostics of everything that was dropped
#[derive(Debug, Clone, Default)]
pub struct PreprocessReport {
    pub harness: Harness,
    pub rejections: Vec<Rejection>,
}

impl PreprocessReport {
    pub fn is_clean(&self) -> bool {
        self.rejections.is_empty()
    }
}

/// Validate a harness and keep only elements that pass every check
pub fn preprocess(harness: &Harness) -> PreprocessReport {
    Preprocessor::default().run(harness)
}

/// Acceptance sets built up while validating one harness
#[derive(Debug, Default)]
pub struct Preprocessor {
    building_blocks: HashSet<ElementId>,
    nodes: HashSet<ElementId>,
    segments: HashSet<ElementId>,
    rejections: Vec<Rejection>,
}

impl Preprocessor {
    pub fn run(mut self, harness: &Harness) -> PreprocessReport {
        let mut filtered = Harness::new(harness.id.clone());

        for block in &harness.building_blocks {
            if self.accept(ElementKind::BuildingBlock, &block.id, |p| p.check_building_block(block)) {
                if let Some(id) = &block.id {
                    self.building_blocks.insert(id.clone());
                }
                filtered.building_blocks.push(block.clone());
            }
        }

        for node in &harness.nodes {
            if self.accept(ElementKind::Node, &node.id, |p| p.check_node(node)) {
                if let Some(id) = &node.id {
                    self.nodes.insert(id.clone());
                }
                filtered.nodes.push(node.clone());
            }
        }

        for segment in &harness.segments {
            if self.accept(ElementKind::Segment, &segment.id, |p| p.check_segment(segment)) {
                if let Some(id) = &segment.id {
                    self.segments.insert(id.clone());
                }
                filtered.segments.push(segment.clone());
            }
        }

        for occurrence in &harness.occurrences {
            let kind = occurrence
                .part_type
                .map(ElementKind::from)
                .unwrap_or(ElementKind::Other);
            if self.accept(kind, &occurrence.id, |p| p.check_occurrence(occurrence)) {
                filtered.occurrences.push(occurrence.clone());
            }
        }

        log::debug!(
            "preprocessed harness {}: kept {} of {} elements",
            harness.id,
            filtered.element_count(),
            harness.element_count()
        );

        PreprocessReport {
            harness: filtered,
            rejections: self.rejections,
        }
    }

    fn accept(
        &mut self,
        kind: ElementKind,
        id: &Option<ElementId>,
        check: impl FnOnce(&Self) -> Result<()>,
    ) -> bool {
        match check(&*self) {
            Ok(()) => true,
            Err(error) => {
                let rejection = Rejection {
                    kind,
                    id: id.clone(),
                    error,
                };
                log::warn!("{}", rejection);
                self.rejections.push(rejection);
                false
            }
        }
    }

    fn check_building_block(&self, block: &BuildingBlock) -> Result<()> {
        require(&block.id, "id")?;
        require(&block.position, "position")?;
        require(&block.rotation, "rotation")?;
        Ok(())
    }

    fn check_node(&self, node: &Node) -> Result<()> {
        require(&node.id, "id")?;
        require(&node.position, "position")?;
        let block = require(&node.building_block_id, "buildingBlockId")?;
        self.known_building_block(block)
    }

    fn check_segment(&self, segment: &Segment) -> Result<()> {
        require(&segment.id, "id")?;
        let start = require(&segment.start_node_id, "startNodeId")?;
        let end = require(&segment.end_node_id, "endNodeId")?;
        let length = *require(&segment.virtual_length, "virtualLength")?;
        let area = *require(&segment.cross_section_area, "crossSectionArea")?;
        let block = require(&segment.building_block_id, "buildingBlockId")?;

        self.known_building_block(block)?;
        self.known_node(start)?;
        self.known_node(end)?;
        non_negative("virtualLength", length)?;
        non_negative("crossSectionArea", area)?;

        if segment.center_curves.is_empty()
            || segment
                .center_curves
                .iter()
                .any(|curve| curve.control_points.is_empty())
        {
            return Err(ValidationError::EmptyCurve);
        }
        Ok(())
    }

    fn check_occurrence(&self, occurrence: &Occurrence) -> Result<()> {
        require(&occurrence.id, "id")?;
        let part_type = *require(&occurrence.part_type, "partType")?;
        let placement = require(&occurrence.placement, "placement")?;
        let block = require(&occurrence.building_block_id, "buildingBlockId")?;
        self.known_building_block(block)?;

        match part_type {
            PartType::Connector | PartType::Accessory | PartType::Other => {
                self.resolve_single_node(placement).map(|_| ())
            }
            PartType::Protection => self.check_on_way(placement),
            PartType::Fixing => self.check_fixing(placement),
        }
    }

    /// Resolve an on-point placement to exactly one accepted node
    fn resolve_single_node<'a>(&self, placement: &'a Placement) -> Result<&'a ElementId> {
        let Placement::OnPoint { locations } = placement else {
            return Err(ValidationError::unresolved("expected an on-point placement"));
        };
        let mut nodes = locations.iter().filter_map(Location::as_node);
        match (nodes.next(), nodes.next()) {
            (Some(node), None) => {
                self.known_node(node)?;
                Ok(node)
            }
            (None, _) => Err(ValidationError::unresolved("no node location")),
            (Some(_), Some(_)) => Err(ValidationError::unresolved("more than one node location")),
        }
    }

    fn check_on_way(&self, placement: &Placement) -> Result<()> {
        let Placement::OnWay {
            start,
            end,
            segment_path,
        } = placement
        else {
            return Err(ValidationError::unresolved("expected an on-way placement"));
        };
        let start = start
            .as_segment()
            .ok_or_else(|| ValidationError::unresolved("start is not a segment location"))?;
        let end = end
            .as_segment()
            .ok_or_else(|| ValidationError::unresolved("end is not a segment location"))?;

        let (Some(first), Some(last)) = (segment_path.first(), segment_path.last()) else {
            return Err(ValidationError::broken_path("empty segment path"));
        };
        if *first != start.segment_id {
            return Err(ValidationError::broken_path(format!(
                "path starts at {} but start location is on {}",
                first, start.segment_id
            )));
        }
        if *last != end.segment_id {
            return Err(ValidationError::broken_path(format!(
                "path ends at {} but end location is on {}",
                last, end.segment_id
            )));
        }
        segment_path
            .iter()
            .try_for_each(|segment| self.known_segment(segment))
    }

    fn check_fixing(&self, placement: &Placement) -> Result<()> {
        let Placement::OnPoint { locations } = placement else {
            return Err(ValidationError::unresolved("expected an on-point placement"));
        };
        if locations.is_empty() {
            return Err(ValidationError::unresolved("no segment location"));
        }
        for location in locations {
            let segment = location
                .as_segment()
                .ok_or_else(|| ValidationError::unresolved("fixing location is not on a segment"))?;
            self.known_segment(&segment.segment_id)?;
        }
        Ok(())
    }

    fn known_building_block(&self, id: &ElementId) -> Result<()> {
        if self.building_blocks.contains(id) {
            Ok(())
        } else {
            Err(ValidationError::UnknownBuildingBlock(id.clone()))
        }
    }

    fn known_node(&self, id: &ElementId) -> Result<()> {
        if self.nodes.contains(id) {
            Ok(())
        } else {
            Err(ValidationError::UnknownNode(id.clone()))
        }
    }

    fn known_segment(&self, id: &ElementId) -> Result<()> {
        if self.segments.contains(id) {
            Ok(())
        } else {
            Err(ValidationError::UnknownSegment(id.clone()))
        }
    }
}

fn require<'a, T>(value: &'a Option<T>, field: &'static str) -> Result<&'a T> {
    value.as_ref().ok_or(ValidationError::MissingField(field))
}

fn non_negative(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidMeasure { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Anchor, CenterCurve, RotationBasis, SegmentLocation};

    fn block(id: &str) -> BuildingBlock {
        BuildingBlock {
            id: Some(id.into()),
            position: Some([0.0, 0.0, 0.0]),
            rotation: Some(RotationBasis::IDENTITY),
            members: Vec::new(),
        }
    }

    fn node(id: &str, block: &str) -> Node {
        Node {
            id: Some(id.into()),
            position: Some([0.0, 0.0, 0.0]),
            building_block_id: Some(block.into()),
            ..Default::default()
        }
    }

    fn segment(id: &str, start: &str, end: &str) -> Segment {
        Segment {
            id: Some(id.into()),
            start_node_id: Some(start.into()),
            end_node_id: Some(end.into()),
            center_curves: vec![CenterCurve {
                degree: 1,
                control_points: vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0]],
            }],
            virtual_length: Some(100.0),
            cross_section_area: Some(std::f64::consts::PI),
            building_block_id: Some("bb".into()),
            ..Default::default()
        }
    }

    fn seg_loc(segment: &str, offset: f64) -> Location {
        Location::Segment(SegmentLocation {
            segment_id: segment.into(),
            anchor: Anchor::Start,
            offset,
        })
    }

    fn occurrence(id: &str, part_type: PartType, placement: Placement) -> Occurrence {
        Occurrence {
            id: Some(id.into()),
            part_type: Some(part_type),
            placement: Some(placement),
            building_block_id: Some("bb".into()),
            ..Default::default()
        }
    }

    fn base_harness() -> Harness {
        let mut harness = Harness::new("h1");
        harness.building_blocks.push(block("bb"));
        harness.nodes.push(node("n1", "bb"));
        harness.nodes.push(node("n2", "bb"));
        harness.segments.push(segment("s1", "n1", "n2"));
        harness.segments.push(segment("s2", "n2", "n1"));
        harness
    }

    #[test]
    fn test_clean_harness_passes() {
        let report = preprocess(&base_harness());
        assert!(report.is_clean());
        assert_eq!(report.harness.segments.len(), 2);
    }

    #[test]
    fn test_building_block_requires_rotation() {
        let mut harness = base_harness();
        harness.building_blocks[0].rotation = None;
        let report = preprocess(&harness);

        // Everything downstream depends on the only building block
        assert!(report.harness.building_blocks.is_empty());
        assert!(report.harness.nodes.is_empty());
        assert!(report.harness.segments.is_empty());
        assert_eq!(
            report.rejections[0].error,
            ValidationError::MissingField("rotation")
        );
    }

    #[test]
    fn test_node_needs_previously_accepted_block() {
        let mut harness = base_harness();
        harness.nodes.push(node("n3", "missing"));
        let report = preprocess(&harness);
        assert_eq!(report.harness.nodes.len(), 2);
        assert_eq!(
            report.rejections[0].error,
            ValidationError::UnknownBuildingBlock("missing".into())
        );
    }

    #[test]
    fn test_segment_rejections() {
        let mut harness = base_harness();
        let mut negative = segment("neg", "n1", "n2");
        negative.virtual_length = Some(-1.0);
        let mut no_points = segment("empty", "n1", "n2");
        no_points.center_curves[0].control_points.clear();
        let dangling = segment("dangling", "n1", "n9");
        harness.segments.extend([negative, no_points, dangling]);

        let report = preprocess(&harness);
        assert_eq!(report.harness.segments.len(), 2);
        let errors: Vec<_> = report.rejections.iter().map(|r| r.error.clone()).collect();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidMeasure {
                    field: "virtualLength",
                    value: -1.0
                },
                ValidationError::EmptyCurve,
                ValidationError::UnknownNode("n9".into()),
            ]
        );
    }

    #[test]
    fn test_connector_needs_exactly_one_node() {
        let mut harness = base_harness();
        harness.occurrences.push(occurrence(
            "ok",
            PartType::Connector,
            Placement::OnPoint {
                locations: vec![Location::Node {
                    node_id: "n1".into(),
                }],
            },
        ));
        harness.occurrences.push(occurrence(
            "two",
            PartType::Connector,
            Placement::OnPoint {
                locations: vec![
                    Location::Node {
                        node_id: "n1".into(),
                    },
                    Location::Node {
                        node_id: "n2".into(),
                    },
                ],
            },
        ));
        let mut missing = occurrence(
            "missing",
            PartType::Other,
            Placement::OnPoint { locations: vec![] },
        );
        missing.placement = None;
        harness.occurrences.push(missing);

        let report = preprocess(&harness);
        assert_eq!(report.harness.occurrences.len(), 1);
        assert_eq!(report.harness.occurrences[0].id, Some("ok".into()));
        assert_eq!(report.rejections.len(), 2);
        assert_eq!(
            report.rejections[1].error,
            ValidationError::MissingField("placement")
        );
        assert_eq!(report.rejections[1].kind, ElementKind::Other);
    }

    #[test]
    fn test_protection_path_rules() {
        let mut harness = base_harness();
        let good = Placement::OnWay {
            start: seg_loc("s1", 10.0),
            end: seg_loc("s2", 20.0),
            segment_path: vec!["s1".into(), "s2".into()],
        };
        let wrong_end = Placement::OnWay {
            start: seg_loc("s1", 10.0),
            end: seg_loc("s1", 20.0),
            segment_path: vec!["s1".into(), "s2".into()],
        };
        let empty = Placement::OnWay {
            start: seg_loc("s1", 10.0),
            end: seg_loc("s1", 20.0),
            segment_path: vec![],
        };
        let node_start = Placement::OnWay {
            start: Location::Node {
                node_id: "n1".into(),
            },
            end: seg_loc("s1", 20.0),
            segment_path: vec!["s1".into()],
        };
        harness.occurrences.push(occurrence("p1", PartType::Protection, good));
        harness.occurrences.push(occurrence("p2", PartType::Protection, wrong_end));
        harness.occurrences.push(occurrence("p3", PartType::Protection, empty));
        harness.occurrences.push(occurrence("p4", PartType::Protection, node_start));

        let report = preprocess(&harness);
        assert_eq!(report.harness.occurrences.len(), 1);
        assert!(matches!(report.rejections[0].error, ValidationError::BrokenPath(_)));
        assert!(matches!(report.rejections[1].error, ValidationError::BrokenPath(_)));
        assert!(matches!(
            report.rejections[2].error,
            ValidationError::UnresolvedPlacement(_)
        ));
    }

    #[test]
    fn test_fixing_locations_must_be_valid_segments() {
        let mut harness = base_harness();
        harness.occurrences.push(occurrence(
            "f1",
            PartType::Fixing,
            Placement::OnPoint {
                locations: vec![seg_loc("s1", 5.0), seg_loc("s2", 5.0)],
            },
        ));
        harness.occurrences.push(occurrence(
            "f2",
            PartType::Fixing,
            Placement::OnPoint {
                locations: vec![seg_loc("s1", 5.0), seg_loc("gone", 5.0)],
            },
        ));
        let report = preprocess(&harness);
        assert_eq!(report.harness.occurrences.len(), 1);
        assert_eq!(
            report.rejections[0].error,
            ValidationError::UnknownSegment("gone".into())
        );
    }
}
