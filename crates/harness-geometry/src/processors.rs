// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Element Processors - Geometry for each harness element kind
//!
//! Every processor returns its mesh in the element's building-block frame.

use crate::{
    compiler::{CompileContext, Element, ElementProcessor},
    curve::{CatmullRom, CompositeCurve},
    extrusion::{apply_transform, centered_box, centered_cylinder},
    transform::{aligned_matrix, placement_matrix},
    tube::sweep_tube,
    Error, Mesh, Result,
};
use harness_model::{
    ElementId, ElementKind, GeometryMode, Location, Occurrence, Placement, Segment,
    SegmentLocation,
};
use nalgebra::{Matrix4, Point3, Vector3};

/// Minimum spacing between consecutive protection samples
const SAMPLE_EPSILON: f64 = 1e-9;

fn expect_segment<'a>(element: Element<'a>) -> Result<&'a Segment> {
    match element {
        Element::Segment(segment) => Ok(segment),
        Element::Occurrence(_) => Err(Error::unsupported_kind(element.kind())),
    }
}

fn expect_occurrence<'a>(element: Element<'a>) -> Result<&'a Occurrence> {
    match element {
        Element::Occurrence(occurrence) => Ok(occurrence),
        Element::Segment(_) => Err(Error::unsupported_kind(element.kind())),
    }
}

fn required<'a>(value: &'a Option<ElementId>, what: &str) -> Result<&'a ElementId> {
    value
        .as_ref()
        .ok_or_else(|| Error::placement(format!("missing {}", what)))
}

/// The single node an on-point placement resolves to
fn placement_node(occurrence: &Occurrence) -> Result<&ElementId> {
    match &occurrence.placement {
        Some(Placement::OnPoint { locations }) => locations
            .iter()
            .find_map(Location::as_node)
            .ok_or_else(|| Error::placement("no node location")),
        _ => Err(Error::placement("expected an on-point placement")),
    }
}

fn segment_radius(segment: &Segment) -> Result<f64> {
    segment
        .radius()
        .filter(|r| *r > 0.0)
        .ok_or_else(|| Error::curve("cross-section area gives no positive radius"))
}

/// Segment processor
///
/// Sweeps the segment's center curve into a tube and records the curve for
/// occurrences placed along the segment.
pub struct SegmentProcessor;

impl SegmentProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SegmentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementProcessor for SegmentProcessor {
    fn process(&self, element: Element<'_>, ctx: &CompileContext<'_>) -> Result<Mesh> {
        let segment = expect_segment(element)?;
        let id = required(&segment.id, "segment id")?;
        let block = required(&segment.building_block_id, "building block")?;

        let curve = CompositeCurve::build(&segment.center_curves, ctx.settings.spline_mode)?;
        let radius = segment_radius(segment)?;
        let steps = ctx.constants.tube_steps(
            segment.virtual_length.unwrap_or(0.0),
            ctx.settings.curve_steps_factor,
        );

        let mesh = sweep_tube(&curve, radius, steps, ctx.settings.radial_segments())?;
        ctx.record_path(id, curve, block)?;
        Ok(mesh)
    }

    fn supported_kinds(&self) -> Vec<ElementKind> {
        vec![ElementKind::Segment]
    }
}

/// Protection processor
///
/// Covers a sub-range of a path of segments: each covered segment is sampled
/// between its entry and exit ratios, the samples are re-fitted with a
/// Catmull-Rom spline and swept with a radius slightly above the thickest
/// covered segment.
pub struct ProtectionProcessor;

impl ProtectionProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Whether each path segment is walked from its start node to its end node
    fn traversal(path: &[&Segment]) -> Vec<bool> {
        let touches = |node: &Option<ElementId>, other: &Segment| {
            node.is_some() && (*node == other.start_node_id || *node == other.end_node_id)
        };

        let last = path.len().saturating_sub(1);
        path.iter()
            .enumerate()
            .map(|(i, segment)| {
                if i < last {
                    let next = path[i + 1];
                    if touches(&segment.end_node_id, next) {
                        true
                    } else if touches(&segment.start_node_id, next) {
                        false
                    } else {
                        log::warn!(
                            "protection path: {:?} and {:?} share no node",
                            segment.id,
                            next.id
                        );
                        true
                    }
                } else if i > 0 {
                    touches(&segment.start_node_id, path[i - 1])
                } else {
                    true
                }
            })
            .collect()
    }

    /// `(entry, exit)` ratio on each path segment
    fn ranges(
        path: &[&Segment],
        start: &SegmentLocation,
        end: &SegmentLocation,
    ) -> Vec<(f64, f64)> {
        let forward = Self::traversal(path);
        let last = path.len() - 1;
        let length = |s: &Segment| s.virtual_length.unwrap_or(0.0);

        path.iter()
            .enumerate()
            .map(|(i, segment)| {
                let entry = if i == 0 {
                    start.ratio(length(segment))
                } else if forward[i] {
                    0.0
                } else {
                    1.0
                };
                let exit = if i == last {
                    end.ratio(length(segment))
                } else if forward[i] {
                    1.0
                } else {
                    0.0
                };
                (entry, exit)
            })
            .collect()
    }
}

impl Default for ProtectionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementProcessor for ProtectionProcessor {
    fn process(&self, element: Element<'_>, ctx: &CompileContext<'_>) -> Result<Mesh> {
        let occurrence = expect_occurrence(element)?;
        let block = required(&occurrence.building_block_id, "building block")?;

        let Some(Placement::OnWay {
            start,
            end,
            segment_path,
        }) = &occurrence.placement
        else {
            return Err(Error::placement("protection needs an on-way placement"));
        };
        let (Some(start), Some(end)) = (start.as_segment(), end.as_segment()) else {
            return Err(Error::placement("protection ends must be segment locations"));
        };

        let path = segment_path
            .iter()
            .map(|id| ctx.index.segment(id).ok_or_else(|| Error::not_found(id)))
            .collect::<Result<Vec<_>>>()?;
        if path.is_empty() {
            return Err(Error::placement("empty segment path"));
        }

        let steps = ctx.constants.protection_steps.max(1);
        let mut samples: Vec<Point3<f64>> = Vec::with_capacity(path.len() * (steps + 1));
        for (segment, (entry, exit)) in path.iter().zip(Self::ranges(&path, start, end)) {
            let id = required(&segment.id, "segment id")?;
            for i in 0..=steps {
                let ratio = entry + (exit - entry) * (i as f64 / steps as f64);
                let (point, _) = ctx.frame_on_path(id, ratio, block)?;
                let distinct = samples
                    .last()
                    .map_or(true, |last| (point - *last).norm() > SAMPLE_EPSILON);
                if distinct {
                    samples.push(point);
                }
            }
        }

        let radius = path
            .iter()
            .map(|s| segment_radius(s))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .fold(0.0, f64::max)
            + ctx.constants.protection_radius_increase;

        let spline = CatmullRom::new(samples)?;
        sweep_tube(
            &spline,
            radius,
            steps * path.len(),
            ctx.settings.radial_segments(),
        )
    }

    fn supported_kinds(&self) -> Vec<ElementKind> {
        vec![ElementKind::Protection]
    }
}

/// Connector processor
///
/// Boxes sized by cavity count. In default geometry mode the box sits at its
/// node, pushed outward by half its depth along the attached segment; in
/// loaded mode it uses the explicit placement and, when registered, the loaded
/// part shape.
pub struct ConnectorProcessor;

impl ConnectorProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Outward direction at a node, away from the first compiled attached segment
    fn outward_direction(
        ctx: &CompileContext<'_>,
        node: &ElementId,
        block: &ElementId,
    ) -> Option<Vector3<f64>> {
        ctx.index.segments_at_node(node).find_map(|segment| {
            let id = segment.id.as_ref()?;
            let at_start = segment.start_node_id.as_ref() == Some(node);
            let ratio = if at_start { 0.0 } else { 1.0 };
            let (_, tangent) = ctx.frame_on_path(id, ratio, block).ok()?;
            Some(if at_start { -tangent } else { tangent })
        })
    }

    fn default_placement(
        ctx: &CompileContext<'_>,
        occurrence: &Occurrence,
        block: &ElementId,
        depth: f64,
    ) -> Result<Matrix4<f64>> {
        let node = placement_node(occurrence)?;
        let position = ctx.node_position(node, block)?;
        let outward = Self::outward_direction(ctx, node, block).unwrap_or_else(|| {
            log::debug!("connector {:?}: no compiled segment at {}, using +Z", occurrence.id, node);
            Vector3::z()
        });
        Ok(aligned_matrix(position + outward * (depth / 2.0), outward))
    }
}

impl Default for ConnectorProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementProcessor for ConnectorProcessor {
    fn process(&self, element: Element<'_>, ctx: &CompileContext<'_>) -> Result<Mesh> {
        let occurrence = expect_occurrence(element)?;
        let block = required(&occurrence.building_block_id, "building block")?;
        let (width, height, depth) = ctx
            .constants
            .connector_size(occurrence.cavity_count.unwrap_or(0));

        let (mut mesh, matrix) = match ctx.settings.geometry_mode {
            GeometryMode::Default => (
                centered_box(width, height, depth)?,
                Self::default_placement(ctx, occurrence, block, depth)?,
            ),
            GeometryMode::Loaded => {
                let placement = occurrence
                    .placements
                    .first()
                    .ok_or_else(|| Error::placement("connector has no explicit placement"))?;
                let loaded = occurrence
                    .part_number
                    .as_deref()
                    .and_then(|part| ctx.library.get(part));
                let mesh = match loaded {
                    Some(shape) => (*shape).clone(),
                    None => centered_box(width, height, depth)?,
                };
                (mesh, placement_matrix(placement)?)
            }
        };

        apply_transform(&mut mesh, &matrix);
        Ok(mesh)
    }

    fn supported_kinds(&self) -> Vec<ElementKind> {
        vec![ElementKind::Connector]
    }
}

/// Fixing processor
///
/// One ring or cylinder per assignment, merged into a single mesh. In loaded
/// geometry mode assignments are anchored on compiled segment paths; in
/// default mode they use the explicit placements.
pub struct FixingProcessor;

impl FixingProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FixingProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementProcessor for FixingProcessor {
    fn process(&self, element: Element<'_>, ctx: &CompileContext<'_>) -> Result<Mesh> {
        let occurrence = expect_occurrence(element)?;
        let block = required(&occurrence.building_block_id, "building block")?;
        let constants = ctx.constants;
        let radial = ctx.settings.radial_segments();
        let mut merged = Mesh::new();

        match ctx.settings.geometry_mode {
            GeometryMode::Loaded => {
                let Some(Placement::OnPoint { locations }) = &occurrence.placement else {
                    return Err(Error::placement("fixing needs an on-point placement"));
                };
                for location in locations {
                    let location = location
                        .as_segment()
                        .ok_or_else(|| Error::placement("fixing location is not on a segment"))?;
                    let segment = ctx
                        .index
                        .segment(&location.segment_id)
                        .ok_or_else(|| Error::not_found(&location.segment_id))?;
                    let ratio = location.ratio(segment.virtual_length.unwrap_or(0.0));
                    let (point, tangent) = ctx.frame_on_path(&location.segment_id, ratio, block)?;

                    let radius = segment_radius(segment)? + constants.fixing_radius_increase;
                    let mut ring = centered_cylinder(radius, constants.fixing_length, radial)?;
                    apply_transform(&mut ring, &aligned_matrix(point, tangent));
                    merged.merge(&ring);
                }
            }
            GeometryMode::Default => {
                if occurrence.placements.is_empty() {
                    return Err(Error::placement("fixing has no explicit placement"));
                }
                for placement in &occurrence.placements {
                    let mut cylinder =
                        centered_cylinder(constants.fixing_radius, constants.fixing_length, radial)?;
                    apply_transform(&mut cylinder, &placement_matrix(placement)?);
                    merged.merge(&cylinder);
                }
            }
        }

        Ok(merged)
    }

    fn supported_kinds(&self) -> Vec<ElementKind> {
        vec![ElementKind::Fixing]
    }
}

/// Accessory processor
///
/// Handles accessories and other parts: a cylinder at the explicit placement,
/// or standing on the placement node when no explicit placement exists.
pub struct AccessoryProcessor;

impl AccessoryProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AccessoryProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementProcessor for AccessoryProcessor {
    fn process(&self, element: Element<'_>, ctx: &CompileContext<'_>) -> Result<Mesh> {
        let occurrence = expect_occurrence(element)?;
        let block = required(&occurrence.building_block_id, "building block")?;
        let constants = ctx.constants;

        let matrix = match occurrence.placements.first() {
            Some(placement) => placement_matrix(placement)?,
            None => {
                let node = placement_node(occurrence)?;
                let position = ctx.node_position(node, block)?;
                Matrix4::new_translation(&position.coords)
            }
        };

        let mut mesh = centered_cylinder(
            constants.accessory_radius,
            constants.accessory_length,
            ctx.settings.radial_segments(),
        )?;
        apply_transform(&mut mesh, &matrix);
        Ok(mesh)
    }

    fn supported_kinds(&self) -> Vec<ElementKind> {
        vec![ElementKind::Accessory, ElementKind::Other]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GeometryConstants;
    use crate::library::PartLibrary;
    use harness_model::{
        Anchor, BuildingBlock, CenterCurve, Harness, Node, RigidPlacement, RotationBasis,
        Settings,
    };

    fn segment(id: &str, start: &str, end: &str, from: [f64; 3], to: [f64; 3]) -> Segment {
        Segment {
            id: Some(id.into()),
            start_node_id: Some(start.into()),
            end_node_id: Some(end.into()),
            center_curves: vec![CenterCurve {
                degree: 1,
                control_points: vec![from, to],
            }],
            virtual_length: Some(100.0),
            cross_section_area: Some(std::f64::consts::PI),
            building_block_id: Some("bb".into()),
            ..Default::default()
        }
    }

    fn node(id: &str, position: [f64; 3]) -> Node {
        Node {
            id: Some(id.into()),
            position: Some(position),
            building_block_id: Some("bb".into()),
            ..Default::default()
        }
    }

    /// n1 (0,0,0) -s1-> n2 (100,0,0) <-s2- n3 (100,100,0)
    fn harness() -> Harness {
        let mut harness = Harness::new("h");
        harness.building_blocks.push(BuildingBlock {
            id: Some("bb".into()),
            position: Some([0.0; 3]),
            rotation: Some(RotationBasis::IDENTITY),
            members: Vec::new(),
        });
        harness.nodes.push(node("n1", [0.0, 0.0, 0.0]));
        harness.nodes.push(node("n2", [100.0, 0.0, 0.0]));
        harness.nodes.push(node("n3", [100.0, 100.0, 0.0]));
        harness
            .segments
            .push(segment("s1", "n1", "n2", [0.0, 0.0, 0.0], [100.0, 0.0, 0.0]));
        harness
            .segments
            .push(segment("s2", "n3", "n2", [100.0, 100.0, 0.0], [100.0, 0.0, 0.0]));
        harness
    }

    fn occurrence(id: &str, part_type: harness_model::PartType, placement: Placement) -> Occurrence {
        Occurrence {
            id: Some(id.into()),
            part_type: Some(part_type),
            placement: Some(placement),
            building_block_id: Some("bb".into()),
            ..Default::default()
        }
    }

    fn seg_loc(segment: &str, anchor: Anchor, offset: f64) -> Location {
        Location::Segment(SegmentLocation {
            segment_id: segment.into(),
            anchor,
            offset,
        })
    }

    fn compile_segments(ctx: &CompileContext<'_>, harness: &Harness) {
        for segment in &harness.segments {
            SegmentProcessor::new()
                .process(Element::Segment(segment), ctx)
                .unwrap();
        }
    }

    #[test]
    fn test_processor_kinds() {
        assert_eq!(SegmentProcessor::new().supported_kinds(), vec![ElementKind::Segment]);
        assert_eq!(
            AccessoryProcessor::new().supported_kinds(),
            vec![ElementKind::Accessory, ElementKind::Other]
        );
    }

    #[test]
    fn test_segment_steps_follow_virtual_length() {
        let harness = harness();
        let settings = Settings {
            segment_count: 8,
            ..Default::default()
        };
        let constants = GeometryConstants::default();
        let library = PartLibrary::new();
        let ctx = CompileContext::new(&harness, &settings, &constants, &library);

        let mesh = SegmentProcessor::new()
            .process(Element::Segment(&harness.segments[0]), &ctx)
            .unwrap();
        // 100 * 0.5 = 50 steps -> 51 rings, plus two caps
        assert_eq!(mesh.vertex_count(), 51 * 8 + 2 * 8);
        assert!(ctx.path(&"s1".into()).is_ok());
    }

    #[test]
    fn test_traversal_follows_shared_nodes() {
        let harness = harness();
        let path: Vec<&Segment> = harness.segments.iter().collect();
        // s1 ends at n2; s2 ends at n2 too, so it is walked backwards
        assert_eq!(ProtectionProcessor::traversal(&path), vec![true, false]);

        let start = SegmentLocation {
            segment_id: "s1".into(),
            anchor: Anchor::Start,
            offset: 50.0,
        };
        let end = SegmentLocation {
            segment_id: "s2".into(),
            anchor: Anchor::End,
            offset: 25.0,
        };
        let ranges = ProtectionProcessor::ranges(&path, &start, &end);
        assert_eq!(ranges, vec![(0.5, 1.0), (1.0, 0.75)]);
    }

    #[test]
    fn test_protection_spans_path() {
        let mut harness = harness();
        harness.occurrences.push(occurrence(
            "p1",
            harness_model::PartType::Protection,
            Placement::OnWay {
                start: seg_loc("s1", Anchor::Start, 50.0),
                end: seg_loc("s2", Anchor::Start, 50.0),
                segment_path: vec!["s1".into(), "s2".into()],
            },
        ));
        let settings = Settings::default();
        let constants = GeometryConstants::default();
        let library = PartLibrary::new();
        let ctx = CompileContext::new(&harness, &settings, &constants, &library);
        compile_segments(&ctx, &harness);

        let mesh = ProtectionProcessor::new()
            .process(Element::Occurrence(&harness.occurrences[0]), &ctx)
            .unwrap();
        let (min, max) = mesh.bounds();
        // From (50,0,0) via (100,0,0) to (100,50,0), radius 1 + 1
        assert!((min.x - 50.0).abs() < 0.5);
        assert!((max.x - 102.0).abs() < 0.5);
        assert!((max.y - 50.0).abs() < 0.5);
    }

    #[test]
    fn test_connector_default_mode_pushed_outward() {
        let mut harness = harness();
        harness.occurrences.push(occurrence(
            "c1",
            harness_model::PartType::Connector,
            Placement::OnPoint {
                locations: vec![Location::Node {
                    node_id: "n1".into(),
                }],
            },
        ));
        let settings = Settings::default();
        let constants = GeometryConstants::default();
        let library = PartLibrary::new();
        let ctx = CompileContext::new(&harness, &settings, &constants, &library);
        compile_segments(&ctx, &harness);

        let mesh = ConnectorProcessor::new()
            .process(Element::Occurrence(&harness.occurrences[0]), &ctx)
            .unwrap();
        let (min, max) = mesh.bounds();
        let depth = constants.connector_sizes[0].2 as f32;
        // s1 leaves n1 along +X, so the box extends along -X from the node
        assert!((max.x - 0.0).abs() < 1e-4);
        assert!((min.x + depth).abs() < 1e-4);
    }

    #[test]
    fn test_connector_loaded_mode_uses_library() {
        let mut harness = harness();
        let mut connector = occurrence(
            "c1",
            harness_model::PartType::Connector,
            Placement::OnPoint {
                locations: vec![Location::Node {
                    node_id: "n1".into(),
                }],
            },
        );
        connector.part_number = Some("X-1".into());
        connector.placements = vec![RigidPlacement::at([5.0, 5.0, 5.0])];
        harness.occurrences.push(connector);

        let settings = Settings {
            geometry_mode: GeometryMode::Loaded,
            ..Default::default()
        };
        let constants = GeometryConstants::default();
        let mut library = PartLibrary::new();
        library.insert("X-1", centered_box(2.0, 2.0, 2.0).unwrap());
        let ctx = CompileContext::new(&harness, &settings, &constants, &library);

        let mesh = ConnectorProcessor::new()
            .process(Element::Occurrence(&harness.occurrences[0]), &ctx)
            .unwrap();
        let (min, max) = mesh.bounds();
        assert!((min.x - 4.0).abs() < 1e-5 && (max.z - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_fixing_loaded_mode_needs_compiled_segment() {
        let mut harness = harness();
        harness.occurrences.push(occurrence(
            "f1",
            harness_model::PartType::Fixing,
            Placement::OnPoint {
                locations: vec![
                    seg_loc("s1", Anchor::Start, 25.0),
                    seg_loc("s1", Anchor::End, 25.0),
                ],
            },
        ));
        let settings = Settings {
            geometry_mode: GeometryMode::Loaded,
            segment_count: 8,
            ..Default::default()
        };
        let constants = GeometryConstants::default();
        let library = PartLibrary::new();
        let ctx = CompileContext::new(&harness, &settings, &constants, &library);
        let fixing = Element::Occurrence(&harness.occurrences[0]);

        assert!(matches!(
            FixingProcessor::new().process(fixing, &ctx),
            Err(Error::MissingPrerequisite(_))
        ));

        compile_segments(&ctx, &harness);
        let mesh = FixingProcessor::new().process(fixing, &ctx).unwrap();
        let single = centered_cylinder(1.0, 1.0, 8).unwrap().vertex_count();
        assert_eq!(mesh.vertex_count(), 2 * single);
        let (min, max) = mesh.bounds();
        assert!((min.x - 23.0).abs() < 1e-4);
        assert!((max.x - 77.0).abs() < 1e-4);
    }

    #[test]
    fn test_fixing_default_mode_needs_placements() {
        let mut harness = harness();
        harness.occurrences.push(occurrence(
            "f1",
            harness_model::PartType::Fixing,
            Placement::OnPoint {
                locations: vec![seg_loc("s1", Anchor::Start, 25.0)],
            },
        ));
        let settings = Settings::default();
        let constants = GeometryConstants::default();
        let library = PartLibrary::new();
        let ctx = CompileContext::new(&harness, &settings, &constants, &library);
        let result =
            FixingProcessor::new().process(Element::Occurrence(&harness.occurrences[0]), &ctx);
        assert!(matches!(result, Err(Error::MissingPlacement(_))));
    }

    #[test]
    fn test_accessory_at_node() {
        let mut harness = harness();
        harness.occurrences.push(occurrence(
            "a1",
            harness_model::PartType::Accessory,
            Placement::OnPoint {
                locations: vec![Location::Node {
                    node_id: "n3".into(),
                }],
            },
        ));
        let settings = Settings::default();
        let constants = GeometryConstants::default();
        let library = PartLibrary::new();
        let ctx = CompileContext::new(&harness, &settings, &constants, &library);
        let mesh = AccessoryProcessor::new()
            .process(Element::Occurrence(&harness.occurrences[0]), &ctx)
            .unwrap();
        let (min, max) = mesh.bounds();
        assert!(((min.y + max.y) / 2.0 - 100.0).abs() < 1e-4);
        assert!(((min.z + max.z) / 2.0).abs() < 1e-4);
    }
}
