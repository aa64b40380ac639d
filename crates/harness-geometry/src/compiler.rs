// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry Compiler - Dynamic dispatch to element processors
//!
//! Routes harness elements to the processor registered for their kind and
//! places the result in world space with the owning building block's
//! transform. Per-element failures are logged and skipped.

use crate::constants::GeometryConstants;
use crate::curve::{CompositeCurve, ParametricCurve};
use crate::extrusion::apply_transform;
use crate::library::PartLibrary;
use crate::transform::{building_block_matrix, to_point};
use crate::{Error, Mesh, Result};
use harness_model::{ElementId, ElementKind, HarnessIndex, Harness, Occurrence, Segment, Settings};
use nalgebra::{Matrix4, Point3, Vector3};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Harness element that can carry geometry
#[derive(Debug, Clone, Copy)]
pub enum Element<'a> {
    Segment(&'a Segment),
    Occurrence(&'a Occurrence),
}

impl<'a> Element<'a> {
    pub fn id(&self) -> Option<&'a ElementId> {
        match self {
            Element::Segment(s) => s.id.as_ref(),
            Element::Occurrence(o) => o.id.as_ref(),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Segment(_) => ElementKind::Segment,
            Element::Occurrence(o) => o.part_type.map(ElementKind::from).unwrap_or(ElementKind::Other),
        }
    }

    pub fn building_block_id(&self) -> Option<&'a ElementId> {
        match self {
            Element::Segment(s) => s.building_block_id.as_ref(),
            Element::Occurrence(o) => o.building_block_id.as_ref(),
        }
    }
}

/// World-space mesh compiled for one element
#[derive(Debug, Clone)]
pub struct Fragment {
    pub id: ElementId,
    pub kind: ElementKind,
    pub mesh: Mesh,
}

/// Element processor trait
///
/// Each processor handles one or more element kinds and returns a mesh in the
/// element's building-block frame. The compiler applies the building-block
/// transform afterwards.
pub trait ElementProcessor: Send + Sync {
    fn process(&self, element: Element<'_>, ctx: &CompileContext<'_>) -> Result<Mesh>;

    /// Element kinds this processor handles
    fn supported_kinds(&self) -> Vec<ElementKind>;
}

/// Center curve of a compiled segment, kept for dependent occurrences
#[derive(Debug)]
pub struct SegmentPath {
    pub curve: CompositeCurve,
    /// Segment building block to world
    pub to_world: Matrix4<f64>,
}

/// Per-harness compilation state shared with processors
pub struct CompileContext<'a> {
    pub index: HarnessIndex<'a>,
    pub settings: &'a Settings,
    pub constants: &'a GeometryConstants,
    pub library: &'a PartLibrary,
    /// Building-block transforms by id
    block_matrices: RefCell<FxHashMap<ElementId, Matrix4<f64>>>,
    /// Center curves of successfully compiled segments
    segment_paths: RefCell<FxHashMap<ElementId, Arc<SegmentPath>>>,
}

impl<'a> CompileContext<'a> {
    pub fn new(
        harness: &'a Harness,
        settings: &'a Settings,
        constants: &'a GeometryConstants,
        library: &'a PartLibrary,
    ) -> Self {
        Self {
            index: HarnessIndex::new(harness),
            settings,
            constants,
            library,
            block_matrices: RefCell::new(FxHashMap::default()),
            segment_paths: RefCell::new(FxHashMap::default()),
        }
    }

    /// Local-to-world transform of a building block (cached)
    pub fn block_matrix(&self, id: &ElementId) -> Result<Matrix4<f64>> {
        if let Some(matrix) = self.block_matrices.borrow().get(id) {
            return Ok(*matrix);
        }
        let block = self
            .index
            .building_block(id)
            .ok_or_else(|| Error::not_found(id))?;
        let matrix = building_block_matrix(block)?;
        self.block_matrices.borrow_mut().insert(id.clone(), matrix);
        Ok(matrix)
    }

    /// World-to-local transform of a building block
    pub fn block_inverse(&self, id: &ElementId) -> Result<Matrix4<f64>> {
        self.block_matrix(id)?
            .try_inverse()
            .ok_or_else(|| Error::transform(format!("building block {} is not invertible", id)))
    }

    /// Remember a compiled segment's center curve
    pub fn record_path(&self, segment: &ElementId, curve: CompositeCurve, block: &ElementId) -> Result<()> {
        let to_world = self.block_matrix(block)?;
        self.segment_paths
            .borrow_mut()
            .insert(segment.clone(), Arc::new(SegmentPath { curve, to_world }));
        Ok(())
    }

    /// Center curve of an already compiled segment
    pub fn path(&self, segment: &ElementId) -> Result<Arc<SegmentPath>> {
        self.segment_paths
            .borrow()
            .get(segment)
            .cloned()
            .ok_or_else(|| Error::MissingPrerequisite(segment.clone()))
    }

    /// Point and unit tangent at `ratio` along a compiled segment, expressed
    /// in the frame of building block `frame`
    pub fn frame_on_path(
        &self,
        segment: &ElementId,
        ratio: f64,
        frame: &ElementId,
    ) -> Result<(Point3<f64>, Vector3<f64>)> {
        let path = self.path(segment)?;
        let to_local = self.block_inverse(frame)? * path.to_world;
        let point = to_local.transform_point(&path.curve.point_at(ratio));
        let tangent = to_local
            .transform_vector(&path.curve.tangent_at(ratio))
            .try_normalize(1e-12)
            .unwrap_or_else(Vector3::x);
        Ok((point, tangent))
    }

    /// Node position expressed in the frame of building block `frame`
    pub fn node_position(&self, node: &ElementId, frame: &ElementId) -> Result<Point3<f64>> {
        let node = self.index.node(node).ok_or_else(|| Error::not_found(node))?;
        let position = node
            .position
            .as_ref()
            .ok_or_else(|| Error::placement("node has no position"))?;
        let local = to_point(position);
        match node.building_block_id.as_ref() {
            Some(block) if block != frame => {
                let to_frame = self.block_inverse(frame)? * self.block_matrix(block)?;
                Ok(to_frame.transform_point(&local))
            }
            _ => Ok(local),
        }
    }

    /// Number of compiled segment paths
    pub fn path_count(&self) -> usize {
        self.segment_paths.borrow().len()
    }
}

/// Geometry compiler - routes elements to processors
pub struct GeometryCompiler {
    processors: HashMap<ElementKind, Arc<dyn ElementProcessor>>,
    constants: GeometryConstants,
}

impl GeometryCompiler {
    /// Create compiler without any processors registered
    pub fn new(constants: GeometryConstants) -> Self {
        Self {
            processors: HashMap::new(),
            constants,
        }
    }

    /// Create compiler with the processors for every element kind
    pub fn with_default_processors() -> Self {
        Self::with_constants(GeometryConstants::default())
    }

    /// Default processors with custom constants
    pub fn with_constants(constants: GeometryConstants) -> Self {
        use crate::processors::{
            AccessoryProcessor, ConnectorProcessor, FixingProcessor, ProtectionProcessor,
            SegmentProcessor,
        };

        let mut compiler = Self::new(constants);
        compiler.register(Arc::new(SegmentProcessor::new()));
        compiler.register(Arc::new(ConnectorProcessor::new()));
        compiler.register(Arc::new(FixingProcessor::new()));
        compiler.register(Arc::new(ProtectionProcessor::new()));
        compiler.register(Arc::new(AccessoryProcessor::new()));
        compiler
    }

    pub fn constants(&self) -> &GeometryConstants {
        &self.constants
    }

    /// Register an element processor
    pub fn register(&mut self, processor: Arc<dyn ElementProcessor>) {
        for kind in processor.supported_kinds() {
            self.processors.insert(kind, Arc::clone(&processor));
        }
    }

    pub fn has_processor(&self, kind: ElementKind) -> bool {
        self.processors.contains_key(&kind)
    }

    /// Compile every element of a preprocessed harness
    ///
    /// Segments are compiled first so occurrences can reference their paths.
    /// Elements that fail are logged and left out.
    pub fn compile_harness(
        &self,
        harness: &Harness,
        settings: &Settings,
        library: &PartLibrary,
    ) -> Vec<Fragment> {
        let ctx = CompileContext::new(harness, settings, &self.constants, library);

        let elements = harness
            .segments
            .iter()
            .map(Element::Segment)
            .chain(harness.occurrences.iter().map(Element::Occurrence));

        let mut fragments = Vec::with_capacity(harness.segments.len() + harness.occurrences.len());
        for element in elements {
            let Some(id) = element.id() else {
                log::warn!("skipping {} without id", element.kind());
                continue;
            };
            match self.compile_element(element, &ctx) {
                Ok(mesh) => fragments.push(Fragment {
                    id: id.clone(),
                    kind: element.kind(),
                    mesh,
                }),
                Err(e) => log::warn!("skipping {} {}: {}", element.kind(), id, e),
            }
        }

        log::debug!(
            "compiled {} fragments for harness {} ({} segment paths)",
            fragments.len(),
            harness.id,
            ctx.path_count()
        );
        fragments
    }

    /// Compile one element into world space
    pub fn compile_element(&self, element: Element<'_>, ctx: &CompileContext<'_>) -> Result<Mesh> {
        let kind = element.kind();
        let processor = self
            .processors
            .get(&kind)
            .ok_or_else(|| Error::unsupported_kind(kind))?;

        let block = element
            .building_block_id()
            .ok_or_else(|| Error::placement("element has no building block"))?;

        let mut mesh = processor.process(element, ctx)?;
        apply_transform(&mut mesh, &ctx.block_matrix(block)?);
        Ok(mesh)
    }
}

impl Default for GeometryCompiler {
    fn default() -> Self {
        Self::with_default_processors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_model::{BuildingBlock, CenterCurve, Node, RotationBasis};

    fn harness() -> Harness {
        let mut harness = Harness::new("h");
        harness.building_blocks.push(BuildingBlock {
            id: Some("bb".into()),
            position: Some([100.0, 0.0, 0.0]),
            rotation: Some(RotationBasis::IDENTITY),
            members: Vec::new(),
        });
        for (id, x) in [("n1", 0.0), ("n2", 50.0)] {
            harness.nodes.push(Node {
                id: Some(id.into()),
                position: Some([x, 0.0, 0.0]),
                building_block_id: Some("bb".into()),
                ..Default::default()
            });
        }
        harness.segments.push(Segment {
            id: Some("s1".into()),
            start_node_id: Some("n1".into()),
            end_node_id: Some("n2".into()),
            center_curves: vec![CenterCurve {
                degree: 1,
                control_points: vec![[0.0, 0.0, 0.0], [50.0, 0.0, 0.0]],
            }],
            virtual_length: Some(50.0),
            cross_section_area: Some(std::f64::consts::PI),
            building_block_id: Some("bb".into()),
            ..Default::default()
        });
        harness
    }

    #[test]
    fn test_default_processors_cover_every_kind() {
        let compiler = GeometryCompiler::with_default_processors();
        for kind in [
            ElementKind::Segment,
            ElementKind::Connector,
            ElementKind::Fixing,
            ElementKind::Protection,
            ElementKind::Accessory,
            ElementKind::Other,
        ] {
            assert!(compiler.has_processor(kind), "{} has no processor", kind);
        }
        assert!(!compiler.has_processor(ElementKind::Node));
    }

    #[test]
    fn test_segment_placed_by_building_block() {
        let harness = harness();
        let fragments = GeometryCompiler::default().compile_harness(
            &harness,
            &Settings::default(),
            &PartLibrary::new(),
        );
        assert_eq!(fragments.len(), 1);
        let (min, max) = fragments[0].mesh.bounds();
        assert!((min.x - 100.0).abs() < 1e-4);
        assert!((max.x - 150.0).abs() < 1e-4);
    }

    #[test]
    fn test_frame_on_path_requires_compiled_segment() {
        let harness = harness();
        let settings = Settings::default();
        let constants = GeometryConstants::default();
        let library = PartLibrary::new();
        let ctx = CompileContext::new(&harness, &settings, &constants, &library);

        let missing = ctx.frame_on_path(&"s1".into(), 0.5, &"bb".into());
        assert!(matches!(missing, Err(Error::MissingPrerequisite(_))));

        let curve = CompositeCurve::build(&harness.segments[0].center_curves, settings.spline_mode)
            .unwrap();
        ctx.record_path(&"s1".into(), curve, &"bb".into()).unwrap();
        let (point, tangent) = ctx.frame_on_path(&"s1".into(), 0.5, &"bb".into()).unwrap();
        assert!((point - Point3::new(25.0, 0.0, 0.0)).norm() < 1e-9);
        assert!((tangent - Vector3::x()).norm() < 1e-9);
    }

    #[test]
    fn test_unknown_building_block_fails_element() {
        let mut harness = harness();
        harness.segments[0].building_block_id = Some("elsewhere".into());
        let fragments = GeometryCompiler::default().compile_harness(
            &harness,
            &Settings::default(),
            &PartLibrary::new(),
        );
        assert!(fragments.is_empty());
    }
}
