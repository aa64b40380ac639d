// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Harness Scene
//!
//! Session-scoped scene state between compiled harness geometry and a renderer.
//!
//! ## Overview
//!
//! - **Merging**: fragments of every harness concatenated into one buffer,
//!   with an inclusive vertex range recorded per element
//! - **Overlays**: colors, enabled mask, diff states and view properties
//!   written per vertex through the range table, without touching geometry
//! - **Views**: shader variants with an optional mapped element property
//! - **Picking**: 24-bit color-encoded ids, decoded from a read-back pixel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use harness_scene::{ColorRequest, HarnessSession};
//!
//! let mut session = HarnessSession::new();
//! let report = session.load_harness(&harness)?;
//! session.apply_colors(&[ColorRequest::new("connector-1", 255, 0, 0)])?;
//!
//! let mesh = session.mesh();
//! let colors = session.display_colors();
//! ```

pub mod debounce;
pub mod error;
pub mod mapping;
pub mod merge;
pub mod observer;
pub mod picking;
pub mod session;
pub mod settings;
pub mod style;
pub mod view;

pub use debounce::{Debounce, DEFAULT_DEBOUNCE_MS};
pub use error::{Result, SceneError};
pub use mapping::{apply_mapping, write_mapping};
pub use merge::{ElementToVertexMapping, MergedMesh, MeshMerger, RangeTable, VertexRange};
pub use observer::{ObserverId, Observers};
pub use picking::{
    decode_pick_color, encode_pick_id, pick_vertex_color, PickIndex, PickStream, PixelReader,
    MAX_PICK_ID,
};
pub use session::{ColorRequest, HarnessSession, LoadReport};
pub use settings::SettingsStore;
pub use style::{base_color, DiffState, Rgba};
pub use view::{
    display_colors, AttributeData, AttributeSlot, PropertyMapper, PropertyMapping, ShaderKind,
    VertexAttributes, View, ViewPropertyCache,
};
