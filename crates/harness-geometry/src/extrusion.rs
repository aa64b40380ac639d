// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Prism extrusion of 2D outlines, used for boxes, cylinders and caps

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::profile::{Profile2D, Triangulation};
use nalgebra::{Matrix4, Point2, Point3, Vector3};

/// Sweep `profile` straight up Z over `[0, depth]`, then apply `transform`
pub fn extrude_profile(
    profile: &Profile2D,
    depth: f64,
    transform: Option<Matrix4<f64>>,
) -> Result<Mesh> {
    if !(depth.is_finite() && depth > 0.0) {
        return Err(Error::InvalidExtrusion(format!(
            "depth must be positive, got {}",
            depth
        )));
    }

    let caps = profile.triangulate()?;
    let ring = profile.outline.len();
    let mut mesh = Mesh::with_capacity(
        2 * caps.points.len() + 4 * ring,
        2 * caps.indices.len() + 6 * ring,
    );

    push_cap(&mut mesh, &caps, 0.0, -Vector3::z());
    push_cap(&mut mesh, &caps, depth, Vector3::z());
    push_walls(&mut mesh, &profile.outline, depth);

    if let Some(matrix) = transform {
        apply_transform(&mut mesh, &matrix);
    }
    Ok(mesh)
}

/// Box of the given size centered on the origin
pub fn centered_box(width: f64, height: f64, depth: f64) -> Result<Mesh> {
    let shift = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -depth / 2.0));
    extrude_profile(&Profile2D::rectangle(width, height), depth, Some(shift))
}

/// Cylinder along Z centered on the origin
pub fn centered_cylinder(radius: f64, length: f64, segments: usize) -> Result<Mesh> {
    let shift = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -length / 2.0));
    extrude_profile(&Profile2D::circle(radius, segments), length, Some(shift))
}

/// Flat cap at height `z`; downward caps get flipped winding
fn push_cap(mesh: &mut Mesh, caps: &Triangulation, z: f64, normal: Vector3<f64>) {
    let first = mesh.vertex_count() as u32;
    caps.points
        .iter()
        .for_each(|p| mesh.add_vertex(Point3::new(p.x, p.y, z), normal));

    let flip = normal.z < 0.0;
    for t in caps.indices.chunks_exact(3) {
        let [a, b, c] = [t[0], t[1], t[2]].map(|i| first + i as u32);
        if flip {
            mesh.add_triangle(a, c, b);
        } else {
            mesh.add_triangle(a, b, c);
        }
    }
}

/// One flat-shaded quad per outline edge
fn push_walls(mesh: &mut Mesh, outline: &[Point2<f64>], depth: f64) {
    let next = outline.iter().cycle().skip(1);
    for (a, b) in outline.iter().zip(next) {
        // Right-hand side of a counter-clockwise edge points outward
        let Some(normal) = Vector3::new(b.y - a.y, a.x - b.x, 0.0).try_normalize(1e-10) else {
            continue;
        };
        let first = mesh.vertex_count() as u32;
        for (p, z) in [(a, 0.0), (b, 0.0), (b, depth), (a, depth)] {
            mesh.add_vertex(Point3::new(p.x, p.y, z), normal);
        }
        mesh.add_triangle(first, first + 1, first + 2);
        mesh.add_triangle(first, first + 2, first + 3);
    }
}

/// Transform positions by `matrix` and normals by its inverse transpose
pub fn apply_transform(mesh: &mut Mesh, matrix: &Matrix4<f64>) {
    fn rewrite(buffer: &mut [f32], f: impl Fn(Vector3<f64>) -> Vector3<f64>) {
        for v in buffer.chunks_exact_mut(3) {
            let out = f(Vector3::new(v[0] as f64, v[1] as f64, v[2] as f64));
            v.copy_from_slice(&[out.x as f32, out.y as f32, out.z as f32]);
        }
    }

    rewrite(&mut mesh.positions, |p| matrix.transform_point(&Point3::from(p)).coords);

    let normal_matrix = matrix.try_inverse().unwrap_or(*matrix).transpose();
    rewrite(&mut mesh.normals, |n| {
        (normal_matrix * n.to_homogeneous())
            .xyz()
            .try_normalize(1e-12)
            .unwrap_or(n)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_extrude_rectangle_counts() {
        let mesh = extrude_profile(&Profile2D::rectangle(2.0, 1.0), 3.0, None).unwrap();
        // 2 caps x 4 points + 4 walls x 4 points
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.triangle_count(), 4 + 8);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_non_positive_depth_rejected() {
        let result = extrude_profile(&Profile2D::rectangle(1.0, 1.0), 0.0, None);
        assert!(matches!(result, Err(Error::InvalidExtrusion(_))));
    }

    #[test]
    fn test_centered_box_bounds() {
        let mesh = centered_box(4.0, 2.0, 6.0).unwrap();
        let (min, max) = mesh.bounds();
        assert_relative_eq!(min.x, -2.0);
        assert_relative_eq!(max.y, 1.0);
        assert_relative_eq!(min.z, -3.0);
        assert_relative_eq!(max.z, 3.0);
    }

    #[test]
    fn test_side_wall_normals_point_outward() {
        let mesh = centered_cylinder(1.0, 2.0, 8).unwrap();
        for (p, n) in mesh.positions.chunks_exact(3).zip(mesh.normals.chunks_exact(3)) {
            if n[2].abs() < 1e-6 {
                // Wall vertex: normal points away from the axis
                assert!(p[0] * n[0] + p[1] * n[1] > 0.0);
            }
        }
    }

    #[test]
    fn test_apply_transform_moves_points() {
        let mut mesh = centered_box(1.0, 1.0, 1.0).unwrap();
        apply_transform(
            &mut mesh,
            &Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0)),
        );
        let (min, max) = mesh.bounds();
        assert_relative_eq!(min.x, 9.5);
        assert_relative_eq!(max.x, 10.5);
    }
}
