// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placement matrices

use crate::error::{Error, Result};
use harness_model::{BuildingBlock, Position, RigidPlacement, RotationBasis};
use nalgebra::{Matrix4, Point3, Vector3};

#[inline]
pub fn to_point(p: &Position) -> Point3<f64> {
    Point3::new(p[0], p[1], p[2])
}

#[inline]
fn to_vector(p: &Position) -> Vector3<f64> {
    Vector3::new(p[0], p[1], p[2])
}

/// Local-to-parent matrix with basis columns `u`, `v`, `w` and a translation
pub fn basis_matrix(position: &Position, rotation: &RotationBasis) -> Result<Matrix4<f64>> {
    let (u, v, w) = (
        to_vector(&rotation.u),
        to_vector(&rotation.v),
        to_vector(&rotation.w),
    );
    let det = u.dot(&v.cross(&w));
    if !det.is_finite() || det.abs() < 1e-9 {
        return Err(Error::transform(format!("degenerate rotation basis (det {})", det)));
    }

    Ok(Matrix4::new(
        u.x, v.x, w.x, position[0],
        u.y, v.y, w.y, position[1],
        u.z, v.z, w.z, position[2],
        0.0, 0.0, 0.0, 1.0,
    ))
}

pub fn placement_matrix(placement: &RigidPlacement) -> Result<Matrix4<f64>> {
    basis_matrix(&placement.position, &placement.rotation)
}

/// Local-to-world transform of a building block
pub fn building_block_matrix(block: &BuildingBlock) -> Result<Matrix4<f64>> {
    let position = block
        .position
        .as_ref()
        .ok_or_else(|| Error::placement("building block has no position"))?;
    let rotation = block
        .rotation
        .as_ref()
        .ok_or_else(|| Error::placement("building block has no rotation"))?;
    basis_matrix(position, rotation)
}

/// Matrix placing local +Z along `direction` with its origin at `origin`
pub fn aligned_matrix(origin: Point3<f64>, direction: Vector3<f64>) -> Matrix4<f64> {
    let z = direction.try_normalize(1e-12).unwrap_or_else(Vector3::z);
    let helper = if z.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let x = helper.cross(&z).normalize();
    let y = z.cross(&x);

    Matrix4::new(
        x.x, y.x, z.x, origin.x,
        x.y, y.y, z.y, origin.y,
        x.z, y.z, z.z, origin.z,
        0.0, 0.0, 0.0, 1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basis_matrix_maps_axes() {
        let rotation = RotationBasis {
            u: [0.0, 1.0, 0.0],
            v: [-1.0, 0.0, 0.0],
            w: [0.0, 0.0, 1.0],
        };
        let m = basis_matrix(&[10.0, 0.0, 0.0], &rotation).unwrap();
        let p = m.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(10.0, 1.0, 0.0));
    }

    #[test]
    fn test_degenerate_basis_rejected() {
        let rotation = RotationBasis {
            u: [1.0, 0.0, 0.0],
            v: [1.0, 0.0, 0.0],
            w: [0.0, 0.0, 1.0],
        };
        assert!(matches!(
            basis_matrix(&[0.0; 3], &rotation),
            Err(Error::InvalidTransform(_))
        ));
    }

    #[test]
    fn test_building_block_requires_placement() {
        let block = BuildingBlock {
            id: Some("bb".into()),
            position: Some([0.0; 3]),
            ..Default::default()
        };
        assert!(building_block_matrix(&block).is_err());
    }

    #[test]
    fn test_aligned_matrix_z_axis() {
        let m = aligned_matrix(Point3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 5.0, 0.0));
        let tip = m.transform_point(&Point3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(tip, Point3::new(1.0, 3.0, 3.0), epsilon = 1e-12);
        assert_relative_eq!(m.fixed_view::<3, 3>(0, 0).clone_owned().determinant(), 1.0, epsilon = 1e-12);
    }
}
