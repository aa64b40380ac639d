// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Harness Model - Shared types, validation and settings for wiring harness data
//!
//! This crate holds the data a harness loader produces and everything needed
//! to make it safe for geometry compilation.
//!
//! # Architecture
//!
//! - [`Harness`] and its element types - building blocks, nodes, segments, occurrences
//! - [`preprocess`] - referential validation that drops invalid elements
//! - [`HarnessIndex`] - O(1) id lookup over a harness
//! - [`Settings`] - geometry and rendering settings
//!
//! # Example
//!
//! ```ignore
//! use harness_model::{preprocess, Harness};
//!
//! let raw: Harness = serde_json::from_str(json)?;
//! let report = preprocess(&raw);
//! for rejection in &report.rejections {
//!     println!("{}", rejection);
//! }
//! let harness = report.harness;
//! ```

pub mod error;
pub mod index;
pub mod preprocess;
pub mod settings;
pub mod types;

// Re-export all public types
pub use error::*;
pub use index::*;
pub use preprocess::*;
pub use settings::*;
pub use types::*;
