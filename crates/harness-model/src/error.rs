// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for harness validation

use crate::{ElementId, ElementKind};
use std::fmt;
use thiserror::Error;

/// Result type alias for validation operations
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Reasons an element is rejected by the preprocessor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required field absent
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// Building block reference not among accepted building blocks
    #[error("unknown building block {0}")]
    UnknownBuildingBlock(ElementId),

    /// Node reference not among accepted nodes
    #[error("unknown node {0}")]
    UnknownNode(ElementId),

    /// Segment reference not among accepted segments
    #[error("unknown segment {0}")]
    UnknownSegment(ElementId),

    /// Length or area that cannot produce geometry
    #[error("invalid {field}: {value}")]
    InvalidMeasure { field: &'static str, value: f64 },

    /// Curve list empty or a curve without control points
    #[error("segment has no usable center curve")]
    EmptyCurve,

    /// Placement does not resolve to what the part type needs
    #[error("placement does not resolve: {0}")]
    UnresolvedPlacement(String),

    /// On-way path inconsistent with its start/end locations
    #[error("broken segment path: {0}")]
    BrokenPath(String),
}

impl ValidationError {
    pub fn unresolved(msg: impl Into<String>) -> Self {
        ValidationError::UnresolvedPlacement(msg.into())
    }

    pub fn broken_path(msg: impl Into<String>) -> Self {
        ValidationError::BrokenPath(msg.into())
    }
}

/// Diagnostic for an element dropped during preprocessing
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub kind: ElementKind,
    /// Element id, if the element had one
    pub id: Option<ElementId>,
    pub error: ValidationError,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} {} rejected: {}", self.kind, id, self.error),
            None => write!(f, "{} (no id) rejected: {}", self.kind, self.error),
        }
    }
}
