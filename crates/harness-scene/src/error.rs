// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the scene session

use harness_model::ElementId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SceneError>;

/// Errors surfaced by session operations
///
/// Per-element problems never show up here; they are logged and skipped
/// during compilation and merging.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("Merge failed: {0}")]
    Merge(String),

    #[error("Unknown harness: {0}")]
    UnknownHarness(ElementId),

    #[error("Harness already loaded: {0}")]
    HarnessLoaded(ElementId),

    #[error("No harness loaded")]
    NothingLoaded,

    #[error("Attribute {name}: expected {expected}, got {actual}")]
    AttributeFormat {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Duplicate element id: {0}")]
    DuplicateElement(ElementId),
}

impl SceneError {
    pub fn merge<S: Into<String>>(msg: S) -> Self {
        Self::Merge(msg.into())
    }

    pub fn attribute_format(
        name: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::AttributeFormat {
            name: name.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
