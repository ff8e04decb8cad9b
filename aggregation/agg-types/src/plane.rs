//! Reference planes and plane-to-plane alignment.
//!
//! Every connector carries a [`RefPlane`]: an origin plus a right-handed
//! orthonormal frame. Mating two connectors is a rigid transform mapping
//! the child connector's *flipped* plane onto the parent connector's
//! plane, so the two z axes end up opposed.

use nalgebra::{
    Isometry3, Matrix3, Point3, Rotation3, Translation3, Unit, UnitQuaternion, Vector3,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{TypesError, TypesResult};

/// A reference plane: origin plus a right-handed orthonormal frame.
///
/// The z axis is derived from x and y (`z = x × y`) and y is
/// re-orthogonalized, so any two non-parallel axes produce a valid frame.
///
/// # Example
///
/// ```
/// use agg_types::RefPlane;
/// use nalgebra::{Point3, Vector3};
///
/// let plane = RefPlane::new(Point3::origin(), Vector3::x(), Vector3::y()).unwrap();
/// assert!((plane.z_axis().z - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RefPlane {
    origin: Point3<f64>,
    x_axis: Unit<Vector3<f64>>,
    y_axis: Unit<Vector3<f64>>,
    z_axis: Unit<Vector3<f64>>,
}

impl RefPlane {
    /// Create a plane from an origin and two spanning axes.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::DegeneratePlane`] if either axis is (near)
    /// zero or the axes are (near) parallel.
    pub fn new(origin: Point3<f64>, x_axis: Vector3<f64>, y_axis: Vector3<f64>) -> TypesResult<Self> {
        let x = Unit::try_new(x_axis, 1e-12).ok_or(TypesError::DegeneratePlane)?;
        let z = Unit::try_new(x.cross(&y_axis), 1e-12).ok_or(TypesError::DegeneratePlane)?;
        let y = Unit::new_unchecked(z.cross(&x));
        Ok(Self {
            origin,
            x_axis: x,
            y_axis: y,
            z_axis: z,
        })
    }

    /// Create a world-aligned XY plane at the given origin.
    #[must_use]
    pub fn world_xy(origin: Point3<f64>) -> Self {
        Self {
            origin,
            x_axis: Vector3::x_axis(),
            y_axis: Vector3::y_axis(),
            z_axis: Vector3::z_axis(),
        }
    }

    /// Get the plane origin.
    #[must_use]
    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// Get the x axis.
    #[must_use]
    pub fn x_axis(&self) -> Vector3<f64> {
        self.x_axis.into_inner()
    }

    /// Get the y axis.
    #[must_use]
    pub fn y_axis(&self) -> Vector3<f64> {
        self.y_axis.into_inner()
    }

    /// Get the z axis (the plane normal).
    #[must_use]
    pub fn z_axis(&self) -> Vector3<f64> {
        self.z_axis.into_inner()
    }

    /// The mating frame of this plane: same origin and x axis, y negated.
    ///
    /// Flipping y also flips z, so a child plane aligned onto a parent
    /// plane through its flipped frame faces the parent (opposed normals).
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            origin: self.origin,
            x_axis: self.x_axis,
            y_axis: Unit::new_unchecked(-self.y_axis.into_inner()),
            z_axis: Unit::new_unchecked(-self.z_axis.into_inner()),
        }
    }

    /// Apply a rigid transform to the plane.
    #[must_use]
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self {
            origin: iso.transform_point(&self.origin),
            x_axis: Unit::new_unchecked(iso.rotation.transform_vector(&self.x_axis)),
            y_axis: Unit::new_unchecked(iso.rotation.transform_vector(&self.y_axis)),
            z_axis: Unit::new_unchecked(iso.rotation.transform_vector(&self.z_axis)),
        }
    }

    /// The rotation taking the world frame onto this plane's frame.
    #[must_use]
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        let basis = Matrix3::from_columns(&[
            self.x_axis.into_inner(),
            self.y_axis.into_inner(),
            self.z_axis.into_inner(),
        ]);
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis))
    }
}

/// The rigid transform mapping plane `from` onto plane `to`.
///
/// Maps `from`'s origin to `to`'s origin and `from`'s frame onto `to`'s
/// frame. Connector mating is `plane_to_plane(child_flip, parent_plane)`.
///
/// # Example
///
/// ```
/// use agg_types::{plane_to_plane, RefPlane};
/// use nalgebra::{Point3, Vector3};
///
/// let from = RefPlane::world_xy(Point3::origin());
/// let to = RefPlane::world_xy(Point3::new(3.0, 0.0, 0.0));
/// let iso = plane_to_plane(&from, &to);
/// let moved = iso.transform_point(&Point3::origin());
/// assert!((moved.x - 3.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn plane_to_plane(from: &RefPlane, to: &RefPlane) -> Isometry3<f64> {
    let rotation = to.rotation() * from.rotation().inverse();
    let translation = to.origin().coords - rotation.transform_vector(&from.origin().coords);
    Isometry3::from_parts(Translation3::from(translation), rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn plane_orthonormalizes_axes() {
        // y not perpendicular to x: frame must still come out orthonormal.
        let plane = RefPlane::new(
            Point3::origin(),
            Vector3::x(),
            Vector3::new(1.0, 1.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(plane.x_axis().dot(&plane.y_axis()), 0.0, epsilon = 1e-12);
        assert_relative_eq!(plane.z_axis(), Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn degenerate_axes_rejected() {
        assert!(RefPlane::new(Point3::origin(), Vector3::zeros(), Vector3::y()).is_err());
        assert!(RefPlane::new(Point3::origin(), Vector3::x(), Vector3::x()).is_err());
    }

    #[test]
    fn flipped_negates_y_and_z() {
        let plane = RefPlane::world_xy(Point3::origin());
        let flip = plane.flipped();
        assert_relative_eq!(flip.x_axis(), Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(flip.y_axis(), -Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(flip.z_axis(), -Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn plane_to_plane_maps_frame_onto_frame() {
        let from = RefPlane::new(
            Point3::new(-0.5, 0.0, 0.0),
            Vector3::z(),
            Vector3::new(0.0, -1.0, 0.0),
        )
        .unwrap();
        let to = RefPlane::new(Point3::new(0.5, 0.0, 0.0), Vector3::y(), Vector3::z()).unwrap();
        let iso = plane_to_plane(&from, &to);

        let moved = from.transformed(&iso);
        assert_relative_eq!(moved.origin(), to.origin(), epsilon = 1e-12);
        assert_relative_eq!(moved.x_axis(), to.x_axis(), epsilon = 1e-12);
        assert_relative_eq!(moved.y_axis(), to.y_axis(), epsilon = 1e-12);
        assert_relative_eq!(moved.z_axis(), to.z_axis(), epsilon = 1e-12);
    }

    #[test]
    fn mating_opposes_normals() {
        // Stick part: connector 0 facing -x, connector 1 facing +x.
        let conn0 = RefPlane::new(
            Point3::new(-0.5, 0.0, 0.0),
            Vector3::z(),
            Vector3::y(),
        )
        .unwrap();
        let conn1 = RefPlane::new(Point3::new(0.5, 0.0, 0.0), Vector3::y(), Vector3::z()).unwrap();

        let iso = plane_to_plane(&conn0.flipped(), &conn1);
        let center = iso.transform_point(&Point3::origin());
        assert_relative_eq!(center, Point3::new(1.0, 0.0, 0.0), epsilon = 1e-12);

        // The child's connector normal must oppose the parent's.
        let child_normal = conn0.transformed(&iso).z_axis();
        assert_relative_eq!(child_normal.dot(&conn1.z_axis()), -1.0, epsilon = 1e-12);
    }
}
