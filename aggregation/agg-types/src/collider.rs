//! Collider shapes for exact intersection testing.
//!
//! The broad phase of collision checking uses bounding radii on part
//! centers; the narrow phase uses a [`Collider`]: a compound of solid
//! spheres approximating the part volume. Sphere compounds keep every
//! query exact (sphere-sphere, segment-sphere, point distance) while
//! staying cheap enough to run on every candidate placement.

use nalgebra::{Isometry3, Point3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bounds::Aabb;

/// A solid sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sphere {
    /// Sphere center.
    pub center: Point3<f64>,
    /// Sphere radius.
    pub radius: f64,
}

impl Sphere {
    /// Create a new sphere.
    #[must_use]
    pub const fn new(center: Point3<f64>, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Apply a rigid transform.
    #[must_use]
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self {
            center: iso.transform_point(&self.center),
            radius: self.radius,
        }
    }

    /// Check solid intersection with another sphere.
    ///
    /// Touching spheres do not count as intersecting.
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        let dist = (other.center - self.center).norm();
        dist < self.radius + other.radius
    }

    /// Check whether a point lies inside the sphere.
    #[inline]
    #[must_use]
    pub fn contains_point(&self, point: &Point3<f64>) -> bool {
        (point - self.center).norm() <= self.radius
    }

    /// Signed-free distance from a point to the sphere surface.
    ///
    /// Zero when the point is inside the solid.
    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, point: &Point3<f64>) -> f64 {
        ((point - self.center).norm() - self.radius).max(0.0)
    }

    /// Check whether a segment intersects the solid sphere.
    #[must_use]
    pub fn intersects_segment(&self, segment: &Segment) -> bool {
        segment.distance_to_point(&self.center) <= self.radius
    }

    /// Check solid intersection with an axis-aligned box.
    #[must_use]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let closest = Point3::new(
            self.center.x.clamp(aabb.min.x, aabb.max.x),
            self.center.y.clamp(aabb.min.y, aabb.max.y),
            self.center.z.clamp(aabb.min.z, aabb.max.z),
        );
        (closest - self.center).norm() <= self.radius
    }
}

/// A line segment between two points.
///
/// Support directions and adjacency probes are segments anchored on the
/// part and pointing at the volume expected to carry or neighbour it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Segment {
    /// Segment start point.
    pub start: Point3<f64>,
    /// Segment end point.
    pub end: Point3<f64>,
}

impl Segment {
    /// Create a new segment.
    #[must_use]
    pub const fn new(start: Point3<f64>, end: Point3<f64>) -> Self {
        Self { start, end }
    }

    /// Apply a rigid transform.
    #[must_use]
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self {
            start: iso.transform_point(&self.start),
            end: iso.transform_point(&self.end),
        }
    }

    /// Segment length.
    #[must_use]
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Distance from a point to the closest point on the segment.
    #[must_use]
    pub fn distance_to_point(&self, point: &Point3<f64>) -> f64 {
        (self.closest_point(point) - point).norm()
    }

    /// Closest point on the segment to the given point.
    #[must_use]
    pub fn closest_point(&self, point: &Point3<f64>) -> Point3<f64> {
        let dir = self.end - self.start;
        let len_sq = dir.norm_squared();
        if len_sq <= f64::EPSILON {
            return self.start;
        }
        let t = ((point - self.start).dot(&dir) / len_sq).clamp(0.0, 1.0);
        self.start + dir * t
    }
}

/// A compound collider: the union of solid spheres.
///
/// # Example
///
/// ```
/// use agg_types::{Collider, Sphere};
/// use nalgebra::Point3;
///
/// let a = Collider::from_sphere(Sphere::new(Point3::origin(), 0.5));
/// let b = Collider::from_sphere(Sphere::new(Point3::new(0.8, 0.0, 0.0), 0.5));
/// let c = Collider::from_sphere(Sphere::new(Point3::new(2.0, 0.0, 0.0), 0.5));
///
/// assert!(a.intersects(&b));
/// assert!(!a.intersects(&c));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Collider {
    spheres: Vec<Sphere>,
}

impl Collider {
    /// Create a compound collider from a set of spheres.
    #[must_use]
    pub fn new(spheres: Vec<Sphere>) -> Self {
        Self { spheres }
    }

    /// Create a collider from a single sphere.
    #[must_use]
    pub fn from_sphere(sphere: Sphere) -> Self {
        Self {
            spheres: vec![sphere],
        }
    }

    /// The spheres making up the compound.
    #[must_use]
    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    /// Whether the compound has no spheres.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty()
    }

    /// Apply a rigid transform to every sphere.
    #[must_use]
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self {
            spheres: self.spheres.iter().map(|s| s.transformed(iso)).collect(),
        }
    }

    /// Check solid intersection with another compound.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.spheres
            .iter()
            .any(|a| other.spheres.iter().any(|b| a.intersects(b)))
    }

    /// Check whether a segment intersects any sphere of the compound.
    #[must_use]
    pub fn intersects_segment(&self, segment: &Segment) -> bool {
        self.spheres.iter().any(|s| s.intersects_segment(segment))
    }

    /// Free distance from a point to the compound surface.
    ///
    /// Zero when the point lies inside any sphere; infinity for an empty
    /// compound.
    #[must_use]
    pub fn distance_to_point(&self, point: &Point3<f64>) -> f64 {
        self.spheres
            .iter()
            .map(|s| s.distance_to_point(point))
            .fold(f64::INFINITY, f64::min)
    }

    /// Axis-aligned bounding box of the compound.
    #[must_use]
    pub fn bounding_box(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for sphere in &self.spheres {
            let r = sphere.radius;
            aabb.expand_to_include(&Point3::new(
                sphere.center.x - r,
                sphere.center.y - r,
                sphere.center.z - r,
            ));
            aabb.expand_to_include(&Point3::new(
                sphere.center.x + r,
                sphere.center.y + r,
                sphere.center.z + r,
            ));
        }
        aabb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion, Vector3};

    #[test]
    fn sphere_intersection() {
        let a = Sphere::new(Point3::origin(), 1.0);
        let b = Sphere::new(Point3::new(1.5, 0.0, 0.0), 1.0);
        let c = Sphere::new(Point3::new(2.0, 0.0, 0.0), 1.0); // touching
        let d = Sphere::new(Point3::new(3.0, 0.0, 0.0), 1.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(!a.intersects(&d));
    }

    #[test]
    fn segment_closest_point_clamps_to_ends() {
        let seg = Segment::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(
            seg.closest_point(&Point3::new(-2.0, 0.0, 0.0)),
            Point3::origin(),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            seg.closest_point(&Point3::new(0.5, 1.0, 0.0)),
            Point3::new(0.5, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn segment_sphere_intersection() {
        let sphere = Sphere::new(Point3::new(0.0, 0.5, 0.0), 0.6);
        let hit = Segment::new(Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0));
        let miss = Segment::new(Point3::new(-1.0, 2.0, 0.0), Point3::new(1.0, 2.0, 0.0));

        assert!(sphere.intersects_segment(&hit));
        assert!(!sphere.intersects_segment(&miss));
    }

    #[test]
    fn compound_intersection_uses_any_pair() {
        let a = Collider::new(vec![
            Sphere::new(Point3::origin(), 0.4),
            Sphere::new(Point3::new(1.0, 0.0, 0.0), 0.4),
        ]);
        let b = Collider::from_sphere(Sphere::new(Point3::new(1.5, 0.0, 0.0), 0.4));
        let c = Collider::from_sphere(Sphere::new(Point3::new(3.0, 0.0, 0.0), 0.4));

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn compound_transform_moves_spheres() {
        let collider = Collider::from_sphere(Sphere::new(Point3::origin(), 0.5));
        let iso = Isometry3::from_parts(
            Translation3::new(2.0, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3),
        );
        let moved = collider.transformed(&iso);
        assert_relative_eq!(
            moved.spheres()[0].center,
            Point3::new(2.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn distance_to_point_zero_inside() {
        let collider = Collider::from_sphere(Sphere::new(Point3::origin(), 1.0));
        assert_relative_eq!(
            collider.distance_to_point(&Point3::new(0.5, 0.0, 0.0)),
            0.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            collider.distance_to_point(&Point3::new(2.0, 0.0, 0.0)),
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn bounding_box_covers_all_spheres() {
        let collider = Collider::new(vec![
            Sphere::new(Point3::origin(), 0.5),
            Sphere::new(Point3::new(2.0, 0.0, 0.0), 1.0),
        ]);
        let bbox = collider.bounding_box();
        assert_relative_eq!(bbox.min.x, -0.5, epsilon = 1e-12);
        assert_relative_eq!(bbox.max.x, 3.0, epsilon = 1e-12);
    }
}
