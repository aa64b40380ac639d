// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for geometry compilation

use harness_model::ElementId;
use thiserror::Error;

/// Geometry compilation result type
pub type Result<T> = std::result::Result<T, Error>;

/// Geometry compilation errors
#[derive(Error, Debug)]
pub enum Error {
    /// Curve cannot be built or evaluated
    #[error("Curve error: {0}")]
    InvalidCurve(String),

    /// Element lacks the placement data its geometry needs
    #[error("Missing placement: {0}")]
    MissingPlacement(String),

    /// Geometry this element depends on has not been compiled
    #[error("Missing prerequisite geometry for {0}")]
    MissingPrerequisite(ElementId),

    /// Referenced element absent from the harness
    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),

    /// Profile processing error
    #[error("Profile error: {0}")]
    Profile(String),

    /// Triangulation error
    #[error("Triangulation error: {0}")]
    Triangulation(String),

    /// Extrusion with a non-positive depth
    #[error("Invalid extrusion: {0}")]
    InvalidExtrusion(String),

    /// Placement basis that does not form an invertible transform
    #[error("Invalid transform: {0}")]
    InvalidTransform(String),

    /// No processor registered for this element kind
    #[error("Unsupported element kind: {0}")]
    UnsupportedKind(String),
}

impl Error {
    /// Create a curve error
    pub fn curve(msg: impl Into<String>) -> Self {
        Error::InvalidCurve(msg.into())
    }

    /// Create a missing placement error
    pub fn placement(msg: impl Into<String>) -> Self {
        Error::MissingPlacement(msg.into())
    }

    /// Create a profile error
    pub fn profile(msg: impl Into<String>) -> Self {
        Error::Profile(msg.into())
    }

    /// Create a triangulation error
    pub fn triangulation(msg: impl Into<String>) -> Self {
        Error::Triangulation(msg.into())
    }

    /// Create an invalid transform error
    pub fn transform(msg: impl Into<String>) -> Self {
        Error::InvalidTransform(msg.into())
    }

    /// Create an element not found error
    pub fn not_found(id: &ElementId) -> Self {
        Error::ElementNotFound(id.clone())
    }

    /// Create an unsupported kind error
    pub fn unsupported_kind(kind: impl ToString) -> Self {
        Error::UnsupportedKind(kind.to_string())
    }
}
