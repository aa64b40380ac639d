// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Flat triangle buffers shared by every compiled fragment

use nalgebra::{Point3, Vector3};

/// Indexed triangle list with one normal per vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// xyz per vertex
    pub positions: Vec<f32>,
    /// Unit normal per vertex, same length as `positions`
    pub normals: Vec<f32>,
    /// Three vertex indices per triangle
    pub indices: Vec<u32>,
}

/// Structural defect in a mesh buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshDefect {
    /// Position buffer length not a multiple of 3
    RaggedPositions(usize),
    /// Normal buffer length differs from the position buffer
    NormalCount { positions: usize, normals: usize },
    /// Index buffer length not a multiple of 3
    RaggedIndices(usize),
    /// Index pointing past the last vertex
    IndexOutOfRange { index: u32, vertex_count: usize },
}

impl std::fmt::Display for MeshDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshDefect::RaggedPositions(len) => {
                write!(f, "{} position components is not a multiple of 3", len)
            }
            MeshDefect::NormalCount { positions, normals } => {
                write!(f, "{} normal components for {} position components", normals, positions)
            }
            MeshDefect::RaggedIndices(len) => write!(f, "{} indices is not a multiple of 3", len),
            MeshDefect::IndexOutOfRange {
                index,
                vertex_count,
            } => write!(f, "index {} out of range for {} vertices", index, vertex_count),
        }
    }
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty mesh with room for `vertex_count` vertices and `index_count` indices
    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(3 * vertex_count),
            normals: Vec::with_capacity(3 * vertex_count),
            indices: Vec::with_capacity(index_count),
        }
    }

    /// Append one vertex, narrowing to `f32`
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>, normal: Vector3<f64>) {
        self.positions.extend(position.coords.iter().map(|&c| c as f32));
        self.normals.extend(normal.iter().map(|&c| c as f32));
    }

    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.extend_from_slice(&[i0, i1, i2]);
    }

    /// Append `other`, shifting its indices past the current vertices
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }
        let shift = self.vertex_count() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.indices.extend(other.indices.iter().map(|i| i + shift));
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Check buffer lengths and index bounds
    pub fn validate(&self) -> Result<(), MeshDefect> {
        if self.positions.len() % 3 != 0 {
            return Err(MeshDefect::RaggedPositions(self.positions.len()));
        }
        if self.normals.len() != self.positions.len() {
            return Err(MeshDefect::NormalCount {
                positions: self.positions.len(),
                normals: self.normals.len(),
            });
        }
        if self.indices.len() % 3 != 0 {
            return Err(MeshDefect::RaggedIndices(self.indices.len()));
        }
        let vertex_count = self.vertex_count();
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(MeshDefect::IndexOutOfRange {
                index,
                vertex_count,
            });
        }
        Ok(())
    }

    /// Axis-aligned `(min, max)`; the origin twice for an empty mesh
    pub fn bounds(&self) -> (Point3<f32>, Point3<f32>) {
        let mut points = self
            .positions
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]));
        let Some(first) = points.next() else {
            return (Point3::origin(), Point3::origin());
        };
        points.fold((first, first), |(lo, hi), p| (lo.inf(&p), hi.sup(&p)))
    }

    /// Shift every position by `offset`, computed in `f64`
    pub fn translate(&mut self, offset: Vector3<f64>) {
        if offset.iter().all(|&c| c == 0.0) {
            return;
        }
        for p in self.positions.chunks_exact_mut(3) {
            for (c, d) in p.iter_mut().zip(offset.iter()) {
                *c = (*c as f64 + d) as f32;
            }
        }
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.indices.clear();
    }
}
