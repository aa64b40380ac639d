// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cross-section outlines for boxes, cylinders and tube caps

use crate::error::{Error, Result};
use nalgebra::Point2;
use std::f64::consts::TAU;

/// Closed counter-clockwise outline in the XY plane
#[derive(Debug, Clone, PartialEq)]
pub struct Profile2D {
    pub outline: Vec<Point2<f64>>,
}

impl Profile2D {
    pub fn new(outline: Vec<Point2<f64>>) -> Self {
        Self { outline }
    }

    /// Axis-aligned `width` x `height` outline around the origin
    pub fn rectangle(width: f64, height: f64) -> Self {
        let (x, y) = (width * 0.5, height * 0.5);
        Self::new(
            [(-x, -y), (x, -y), (x, y), (-x, y)]
                .into_iter()
                .map(|(px, py)| Point2::new(px, py))
                .collect(),
        )
    }

    /// Regular polygon approximating a circle, at least a triangle
    ///
    /// Point 0 sits on +X so caps line up with the rings of a swept tube.
    pub fn circle(radius: f64, segments: usize) -> Self {
        let n = segments.max(3);
        let step = TAU / n as f64;
        Self::new(
            (0..n)
                .map(|k| {
                    let (sin, cos) = (k as f64 * step).sin_cos();
                    Point2::new(radius * cos, radius * sin)
                })
                .collect(),
        )
    }

    /// Ear-clip the outline into triangles
    pub fn triangulate(&self) -> Result<Triangulation> {
        if self.outline.len() < 3 {
            return Err(Error::profile(format!(
                "outline has {} points, need 3",
                self.outline.len()
            )));
        }

        let flat: Vec<f64> = self.outline.iter().flat_map(|p| [p.x, p.y]).collect();
        let indices = earcutr::earcut(&flat, &[], 2)
            .map_err(|e| Error::triangulation(format!("{:?}", e)))?;
        if indices.is_empty() {
            return Err(Error::triangulation("outline has no area"));
        }

        Ok(Triangulation {
            points: self.outline.clone(),
            indices,
        })
    }
}

/// Outline points plus triangle indices into them
#[derive(Debug, Clone)]
pub struct Triangulation {
    pub points: Vec<Point2<f64>>,
    pub indices: Vec<usize>,
}
