// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Circular tube swept along a parametric curve

use crate::curve::ParametricCurve;
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::profile::Profile2D;
use nalgebra::{Point3, Vector3};

/// Ring frame along the sweep
#[derive(Debug, Clone, Copy)]
struct Frame {
    origin: Point3<f64>,
    tangent: Vector3<f64>,
    normal: Vector3<f64>,
    binormal: Vector3<f64>,
}

impl Frame {
    fn at(&self, x: f64, y: f64) -> Point3<f64> {
        self.origin + self.normal * x + self.binormal * y
    }
}

/// Any unit vector perpendicular to `tangent`
fn perpendicular(tangent: &Vector3<f64>) -> Vector3<f64> {
    let up = if tangent.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    tangent.cross(&up).normalize()
}

/// Parallel-transport frames at `steps + 1` evenly spaced ratios
fn transport_frames(curve: &dyn ParametricCurve, steps: usize) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::with_capacity(steps + 1);

    for i in 0..=steps {
        let ratio = i as f64 / steps as f64;
        let origin = curve.point_at(ratio);
        let tangent = curve.tangent_at(ratio);

        // Project the previous normal onto the new ring plane to avoid twisting
        let normal = match frames.last() {
            Some(prev) => (prev.normal - tangent * tangent.dot(&prev.normal))
                .try_normalize(1e-9)
                .unwrap_or_else(|| perpendicular(&tangent)),
            None => perpendicular(&tangent),
        };
        let binormal = tangent.cross(&normal);

        frames.push(Frame {
            origin,
            tangent,
            normal,
            binormal,
        });
    }

    frames
}

/// Sweep a circular cross-section of `radius` along `curve`
///
/// Produces `(steps + 1) * radial_segments` side vertices with smooth normals,
/// followed by a flat cap at each end.
pub fn sweep_tube(
    curve: &dyn ParametricCurve,
    radius: f64,
    steps: usize,
    radial_segments: usize,
) -> Result<Mesh> {
    if !(radius.is_finite() && radius > 0.0) {
        return Err(Error::curve(format!("tube radius must be positive, got {}", radius)));
    }
    let steps = steps.max(1);

    let cap = Profile2D::circle(radius, radial_segments).triangulate()?;
    let radial = cap.points.len();
    let frames = transport_frames(curve, steps);

    let mut mesh = Mesh::with_capacity(
        frames.len() * radial + radial * 2,
        steps * radial * 6 + cap.indices.len() * 2,
    );

    for frame in &frames {
        for point in &cap.points {
            let outward = (frame.normal * point.x + frame.binormal * point.y) / radius;
            mesh.add_vertex(frame.at(point.x, point.y), outward);
        }
    }

    for i in 0..steps {
        let base = (i * radial) as u32;
        let next_base = ((i + 1) * radial) as u32;
        for j in 0..radial as u32 {
            let j_next = (j + 1) % radial as u32;
            mesh.add_triangle(base + j, next_base + j, next_base + j_next);
            mesh.add_triangle(base + j, next_base + j_next, base + j_next);
        }
    }

    let ends = [
        (&frames[0], -1.0),
        (&frames[frames.len() - 1], 1.0),
    ];
    for (frame, side) in ends {
        let base = mesh.vertex_count() as u32;
        let normal = frame.tangent * side;
        for point in &cap.points {
            mesh.add_vertex(frame.at(point.x, point.y), normal);
        }
        for tri in cap.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as u32, tri[1] as u32, tri[2] as u32);
            if side < 0.0 {
                mesh.add_triangle(base + a, base + c, base + b);
            } else {
                mesh.add_triangle(base + a, base + b, base + c);
            }
        }
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{CompositeCurve, NurbsCurve};
    use approx::assert_relative_eq;
    use harness_model::{CenterCurve, SplineMode};

    fn straight(length: f64) -> NurbsCurve {
        NurbsCurve::build(
            &CenterCurve {
                degree: 1,
                control_points: vec![[0.0, 0.0, 0.0], [length, 0.0, 0.0]],
            },
            SplineMode::Clamped,
        )
        .unwrap()
    }

    #[test]
    fn test_vertex_layout() {
        let mesh = sweep_tube(&straight(10.0), 1.0, 4, 8).unwrap();
        assert_eq!(mesh.vertex_count(), 5 * 8 + 2 * 8);
        assert_eq!(mesh.triangle_count(), 4 * 8 * 2 + 2 * (8 - 2));
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_side_vertices_on_radius() {
        let mesh = sweep_tube(&straight(10.0), 2.0, 2, 12).unwrap();
        for chunk in mesh.positions.chunks_exact(3).take(3 * 12) {
            let distance = (chunk[1] as f64).hypot(chunk[2] as f64);
            assert_relative_eq!(distance, 2.0, epsilon = 1e-5);
        }
        let (min, max) = mesh.bounds();
        assert_relative_eq!(min.x, 0.0);
        assert_relative_eq!(max.x, 10.0);
    }

    #[test]
    fn test_frames_do_not_flip_on_bend() {
        let bend = CompositeCurve::build(
            &[CenterCurve {
                degree: 2,
                control_points: vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [10.0, 10.0, 0.0]],
            }],
            SplineMode::Clamped,
        )
        .unwrap();
        let frames = transport_frames(&bend, 16);
        for pair in frames.windows(2) {
            assert!(pair[0].normal.dot(&pair[1].normal) > 0.5);
            assert_relative_eq!(pair[1].normal.dot(&pair[1].tangent), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zero_radius_rejected() {
        assert!(sweep_tube(&straight(1.0), 0.0, 2, 8).is_err());
    }
}
