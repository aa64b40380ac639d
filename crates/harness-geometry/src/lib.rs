// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Harness Geometry
//!
//! Turns validated harness elements into positioned triangle meshes.
//!
//! ## Overview
//!
//! - **Curves**: B-spline center curves with clamped or unclamped knot vectors,
//!   joined end-to-end, plus a Catmull-Rom re-fit for protection areas
//! - **Tubes**: circular cross-sections swept along any parametric curve
//! - **Primitives**: boxes and cylinders extruded from 2D profiles triangulated
//!   with earcutr
//! - **Compilation**: per-kind processors placed by building-block transforms
//!
//! ## Architecture
//!
//! - `ElementProcessor`: trait for the geometry of one or more element kinds
//! - `GeometryCompiler`: routes elements to processors and collects fragments
//! - `CompileContext`: per-harness lookup and caches shared with processors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use harness_geometry::{GeometryCompiler, PartLibrary};
//! use harness_model::{preprocess, Settings};
//!
//! let harness = preprocess(&raw).harness;
//! let compiler = GeometryCompiler::with_default_processors();
//! let fragments = compiler.compile_harness(&harness, &Settings::default(), &PartLibrary::new());
//!
//! for fragment in &fragments {
//!     println!("{} {}: {} vertices", fragment.kind, fragment.id, fragment.mesh.vertex_count());
//! }
//! ```

pub mod compiler;
pub mod constants;
pub mod curve;
pub mod error;
pub mod extrusion;
pub mod library;
pub mod mesh;
pub mod processors;
pub mod profile;
pub mod transform;
pub mod tube;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, Vector3};

// Re-export main types
pub use compiler::{CompileContext, Element, ElementProcessor, Fragment, GeometryCompiler, SegmentPath};
pub use constants::{BoxSize, GeometryConstants};
pub use curve::{knot_vector, CatmullRom, CompositeCurve, NurbsCurve, ParametricCurve};
pub use error::{Error, Result};
pub use extrusion::{apply_transform, centered_box, centered_cylinder, extrude_profile};
pub use library::PartLibrary;
pub use mesh::{Mesh, MeshDefect};
pub use profile::{Profile2D, Triangulation};
pub use tube::sweep_tube;

// Re-export processors
pub use processors::{
    AccessoryProcessor, ConnectorProcessor, FixingProcessor, ProtectionProcessor,
    SegmentProcessor,
};
