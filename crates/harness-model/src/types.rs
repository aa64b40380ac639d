// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for harness data representation
//!
//! The shapes here mirror what a harness loader hands over: required fields that
//! a broken source may omit are `Option`s, so the preprocessor can reject the
//! element instead of the deserializer rejecting the whole harness.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 3D coordinate triple
pub type Position = [f64; 3];

/// Free-form per-element view properties (key -> value)
pub type ViewProperties = BTreeMap<String, String>;

/// Type-safe harness element identifier
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ElementId(pub String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        ElementId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        ElementId(id.to_string())
    }
}

impl From<String> for ElementId {
    fn from(id: String) -> Self {
        ElementId(id)
    }
}

/// Orthonormal rotation basis (local axes expressed in the parent frame)
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct RotationBasis {
    pub u: Position,
    pub v: Position,
    pub w: Position,
}

impl RotationBasis {
    pub const IDENTITY: RotationBasis = RotationBasis {
        u: [1.0, 0.0, 0.0],
        v: [0.0, 1.0, 0.0],
        w: [0.0, 0.0, 1.0],
    };
}

impl Default for RotationBasis {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rigid placement: position plus rotation basis
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct RigidPlacement {
    pub position: Position,
    #[serde(default)]
    pub rotation: RotationBasis,
}

impl RigidPlacement {
    pub fn at(position: Position) -> Self {
        Self {
            position,
            rotation: RotationBasis::IDENTITY,
        }
    }
}

/// Rigid local coordinate frame grouping harness elements
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingBlock {
    pub id: Option<ElementId>,
    pub position: Option<Position>,
    pub rotation: Option<RotationBasis>,
    #[serde(default)]
    pub members: Vec<ElementId>,
}

/// Terminal or junction point for segments
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: Option<ElementId>,
    pub position: Option<Position>,
    pub building_block_id: Option<ElementId>,
    #[serde(default)]
    pub view_properties: ViewProperties,
}

/// One parametric center curve of a segment
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CenterCurve {
    pub degree: usize,
    #[serde(default)]
    pub control_points: Vec<Position>,
}

/// Cable/bundle run between two nodes
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: Option<ElementId>,
    pub start_node_id: Option<ElementId>,
    pub end_node_id: Option<ElementId>,
    #[serde(default)]
    pub center_curves: Vec<CenterCurve>,
    pub virtual_length: Option<f64>,
    pub cross_section_area: Option<f64>,
    pub building_block_id: Option<ElementId>,
    #[serde(default)]
    pub view_properties: ViewProperties,
}

/// Convert a cross-section area into a tube radius (`sqrt(area / π)`)
///
/// Returns `None` for negative or non-finite areas.
pub fn radius_from_area(area: f64) -> Option<f64> {
    if !area.is_finite() || area < 0.0 {
        return None;
    }
    Some((area / std::f64::consts::PI).sqrt())
}

impl Segment {
    /// Tube radius derived from the cross-section area
    pub fn radius(&self) -> Option<f64> {
        self.cross_section_area.and_then(radius_from_area)
    }
}

/// Kind of placed part
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartType {
    Connector,
    Fixing,
    Protection,
    Accessory,
    Other,
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartType::Connector => "connector",
            PartType::Fixing => "fixing",
            PartType::Protection => "protection",
            PartType::Accessory => "accessory",
            PartType::Other => "other",
        };
        f.write_str(name)
    }
}

/// Which segment end an offset is measured from
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Anchor {
    #[default]
    Start,
    End,
}

/// Parametric address along a segment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentLocation {
    pub segment_id: ElementId,
    #[serde(default)]
    pub anchor: Anchor,
    #[serde(default)]
    pub offset: f64,
}

impl SegmentLocation {
    /// Normalized position along the segment, measured from its start
    ///
    /// `virtual_length` is the segment's length; non-positive lengths map to 0.
    pub fn ratio(&self, virtual_length: f64) -> f64 {
        if virtual_length <= 0.0 {
            return 0.0;
        }
        let from_anchor = (self.offset / virtual_length).clamp(0.0, 1.0);
        match self.anchor {
            Anchor::Start => from_anchor,
            Anchor::End => 1.0 - from_anchor,
        }
    }
}

/// Location of an occurrence on the harness
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Location {
    Node {
        #[serde(rename = "nodeId")]
        node_id: ElementId,
    },
    Segment(SegmentLocation),
}

impl Location {
    pub fn as_segment(&self) -> Option<&SegmentLocation> {
        match self {
            Location::Segment(location) => Some(location),
            Location::Node { .. } => None,
        }
    }

    pub fn as_node(&self) -> Option<&ElementId> {
        match self {
            Location::Node { node_id } => Some(node_id),
            Location::Segment(_) => None,
        }
    }
}

/// Placement of an occurrence
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Placement {
    OnPoint {
        locations: Vec<Location>,
    },
    #[serde(rename_all = "camelCase")]
    OnWay {
        start: Location,
        end: Location,
        segment_path: Vec<ElementId>,
    },
}

/// Placed part instance
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub id: Option<ElementId>,
    pub part_type: Option<PartType>,
    pub part_number: Option<String>,
    pub placement: Option<Placement>,
    pub building_block_id: Option<ElementId>,
    /// Connector cavity count, used to size default connector shapes
    pub cavity_count: Option<u32>,
    /// Explicit placements in building-block space, one per assignment
    #[serde(default)]
    pub placements: Vec<RigidPlacement>,
    #[serde(default)]
    pub view_properties: ViewProperties,
}

/// Whole harness as handed over by a loader
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Harness {
    pub id: ElementId,
    #[serde(default)]
    pub building_blocks: Vec<BuildingBlock>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub occurrences: Vec<Occurrence>,
}

impl Harness {
    pub fn new(id: impl Into<ElementId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Total number of elements across all collections
    pub fn element_count(&self) -> usize {
        self.building_blocks.len() + self.nodes.len() + self.segments.len() + self.occurrences.len()
    }

    /// Iterate the view properties of every identified node, segment and occurrence
    pub fn view_properties(&self) -> impl Iterator<Item = (&ElementId, &ViewProperties)> {
        let nodes = self
            .nodes
            .iter()
            .filter_map(|n| n.id.as_ref().map(|id| (id, &n.view_properties)));
        let segments = self
            .segments
            .iter()
            .filter_map(|s| s.id.as_ref().map(|id| (id, &s.view_properties)));
        let occurrences = self
            .occurrences
            .iter()
            .filter_map(|o| o.id.as_ref().map(|id| (id, &o.view_properties)));
        nodes.chain(segments).chain(occurrences)
    }

    /// Ids of all pickable elements (nodes, segments, occurrences) in harness order
    pub fn pickable_ids(&self) -> impl Iterator<Item = &ElementId> {
        self.view_properties().map(|(id, _)| id)
    }
}

/// Element kind used for dispatch and default styling
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ElementKind {
    BuildingBlock,
    Node,
    Segment,
    Connector,
    Fixing,
    Protection,
    Accessory,
    Other,
}

impl From<PartType> for ElementKind {
    fn from(part: PartType) -> Self {
        match part {
            PartType::Connector => ElementKind::Connector,
            PartType::Fixing => ElementKind::Fixing,
            PartType::Protection => ElementKind::Protection,
            PartType::Accessory => ElementKind::Accessory,
            PartType::Other => ElementKind::Other,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::BuildingBlock => "building block",
            ElementKind::Node => "node",
            ElementKind::Segment => "segment",
            ElementKind::Connector => "connector",
            ElementKind::Fixing => "fixing",
            ElementKind::Protection => "protection",
            ElementKind::Accessory => "accessory",
            ElementKind::Other => "other",
        };
        f.write_str(name)
    }
}
