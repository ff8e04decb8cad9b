//! Part-level and assembly-wide constraint declarations.
//!
//! Constraint *data* lives here; the accept/reject logic that consumes it
//! lives in the engine's checkers. Part-level constraints are declared in
//! the part template's local frame and transformed by the candidate
//! placement at check time.

use nalgebra::{Isometry3, Point3, Unit, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bounds::Aabb;
use crate::collider::{Collider, Segment};

/// The optional constraint bundle turning a base part into a constrained
/// ("advanced") part.
///
/// Selected at data-load time; there is no open-ended subtype hierarchy.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartConstraints {
    /// Alternative bearing options; a placement needs at least one fully
    /// satisfied option.
    pub supports: Vec<SupportConstraint>,
    /// Adjacency/exclusion probes, all of which must pass.
    pub adjacency: Vec<AdjacencyConstraint>,
    /// Orientation constraints, all of which must pass.
    pub orientation: Vec<OrientationConstraint>,
    /// Auxiliary fabrication collider, if the part declares one.
    pub aux_collider: Option<AuxCollider>,
}

impl PartConstraints {
    /// Whether the bundle declares no constraint at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.supports.is_empty()
            && self.adjacency.is_empty()
            && self.orientation.is_empty()
            && self.aux_collider.is_none()
    }

    /// Apply a rigid transform to every geometric member.
    #[must_use]
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self {
            supports: self.supports.iter().map(|s| s.transformed(iso)).collect(),
            adjacency: self.adjacency.iter().map(|a| a.transformed(iso)).collect(),
            orientation: self
                .orientation
                .iter()
                .map(|o| o.transformed(iso))
                .collect(),
            aux_collider: self.aux_collider.as_ref().map(|a| a.transformed(iso)),
        }
    }
}

/// One bearing option for a part: a set of directions that must *all*
/// reach supporting material.
///
/// A direction "reaches" when its segment intersects the collider of a
/// nearby placed part. A part with several support constraints is
/// placeable when any single one of them is fully satisfied.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SupportConstraint {
    /// The support directions, as segments in the part's local frame.
    pub directions: Vec<Segment>,
}

impl SupportConstraint {
    /// Create a support option from its direction segments.
    #[must_use]
    pub fn new(directions: Vec<Segment>) -> Self {
        Self { directions }
    }

    /// Apply a rigid transform to every direction.
    #[must_use]
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self {
            directions: self.directions.iter().map(|d| d.transformed(iso)).collect(),
        }
    }
}

/// Whether an adjacency probe requires or forbids neighbouring material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AdjacencyKind {
    /// The probe must intersect some nearby placed part.
    Required,
    /// The probe must intersect no nearby placed part.
    Excluded,
}

/// An adjacency or exclusion probe.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdjacencyConstraint {
    /// The probe segment, in the part's local frame.
    pub probe: Segment,
    /// Required adjacency or forbidden adjacency.
    pub kind: AdjacencyKind,
}

impl AdjacencyConstraint {
    /// Create an adjacency probe.
    #[must_use]
    pub fn new(probe: Segment, kind: AdjacencyKind) -> Self {
        Self { probe, kind }
    }

    /// Apply a rigid transform to the probe.
    #[must_use]
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self {
            probe: self.probe.transformed(iso),
            kind: self.kind,
        }
    }

    /// Evaluate the probe against a hit/no-hit outcome.
    #[must_use]
    pub fn passes(&self, probe_hit: bool) -> bool {
        match self.kind {
            AdjacencyKind::Required => probe_hit,
            AdjacencyKind::Excluded => !probe_hit,
        }
    }
}

/// An orientation constraint: a part-local direction that must stay
/// within an angular range of a world reference direction.
///
/// Evaluated standalone from the candidate transform; no dependency on
/// placed parts.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrientationConstraint {
    /// The constrained direction in the part's local frame.
    pub direction: Unit<Vector3<f64>>,
    /// The world-frame reference direction.
    pub reference: Unit<Vector3<f64>>,
    /// Maximum allowed angle between the two, in radians.
    pub max_angle: f64,
}

impl OrientationConstraint {
    /// Create an orientation constraint.
    #[must_use]
    pub fn new(
        direction: Unit<Vector3<f64>>,
        reference: Unit<Vector3<f64>>,
        max_angle: f64,
    ) -> Self {
        Self {
            direction,
            reference,
            max_angle,
        }
    }

    /// Rotate the constrained direction by a rigid transform.
    #[must_use]
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self {
            direction: Unit::new_unchecked(iso.rotation.transform_vector(&self.direction)),
            reference: self.reference,
            max_angle: self.max_angle,
        }
    }

    /// Whether the (already transformed) direction satisfies the range.
    #[must_use]
    pub fn check(&self) -> bool {
        let cos = self.direction.dot(&self.reference).clamp(-1.0, 1.0);
        cos.acos() <= self.max_angle
    }
}

/// An auxiliary fabrication collider.
///
/// Beyond the part's solid collider, a part may declare a fabrication
/// volume (tool clearance, printer head sweep) that must stay clear of
/// every placed part, plus per-connector sub-regions whose clearance
/// decides which connection sites remain usable after placement.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AuxCollider {
    /// The fabrication volume itself.
    pub shape: Collider,
    /// Per-connector clearance sub-regions.
    pub regions: Vec<AuxRegion>,
    /// Connector indices whose region was clear at the last evaluation.
    pub valid_sites: Vec<usize>,
}

impl AuxCollider {
    /// Create a fabrication collider with its sub-regions.
    ///
    /// All region sites start out valid.
    #[must_use]
    pub fn new(shape: Collider, regions: Vec<AuxRegion>) -> Self {
        let valid_sites = regions.iter().map(|r| r.connector).collect();
        Self {
            shape,
            regions,
            valid_sites,
        }
    }

    /// Apply a rigid transform to the volume and every sub-region.
    #[must_use]
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self {
            shape: self.shape.transformed(iso),
            regions: self.regions.iter().map(|r| r.transformed(iso)).collect(),
            valid_sites: self.valid_sites.clone(),
        }
    }

    /// Reset the valid sites to every declared region.
    pub fn reset_valid_sites(&mut self) {
        self.valid_sites = self.regions.iter().map(|r| r.connector).collect();
    }
}

/// A fabrication sub-region guarding one connection site.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AuxRegion {
    /// The clearance volume of the site.
    pub shape: Collider,
    /// The connector index this region guards.
    pub connector: usize,
}

impl AuxRegion {
    /// Create a sub-region for a connector.
    #[must_use]
    pub fn new(shape: Collider, connector: usize) -> Self {
        Self { shape, connector }
    }

    /// Apply a rigid transform to the region volume.
    #[must_use]
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self {
            shape: self.shape.transformed(iso),
            connector: self.connector,
        }
    }
}

/// An assembly-wide spatial constraint.
///
/// Soft constraints are evaluated against the candidate's transformed
/// center only; hard constraints against its full collider. Each carries
/// a `required` flag: a failing required constraint rejects the placement
/// outright, while optional constraints reject only when every one of
/// them fails.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GlobalConstraint {
    /// Keep part centers on one side of a plane (soft).
    HalfSpace(HalfSpaceConstraint),
    /// Keep part colliders inside or outside a box region (hard).
    Region(RegionConstraint),
}

impl GlobalConstraint {
    /// Whether the constraint is soft (center-only).
    #[must_use]
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::HalfSpace(_))
    }

    /// Whether a failing evaluation rejects the placement outright.
    #[must_use]
    pub fn required(&self) -> bool {
        match self {
            Self::HalfSpace(h) => h.required,
            Self::Region(r) => r.required,
        }
    }

    /// Evaluate the constraint against a bare point.
    ///
    /// The point-level reading of a hard constraint; used when no collider
    /// is available, e.g. when filtering field seed points.
    #[must_use]
    pub fn check_point(&self, point: &Point3<f64>) -> bool {
        match self {
            Self::HalfSpace(h) => h.check_point(point),
            Self::Region(r) => r.check_point(point),
        }
    }

    /// Evaluate the constraint against a full collider.
    ///
    /// Soft constraints fall back to the collider's first sphere center
    /// never being consulted; callers route soft constraints through
    /// [`check_point`](Self::check_point) instead.
    #[must_use]
    pub fn check_collider(&self, collider: &Collider) -> bool {
        match self {
            Self::HalfSpace(h) => collider.spheres().iter().all(|s| h.check_point(&s.center)),
            Self::Region(r) => r.check_collider(collider),
        }
    }
}

/// Keep part centers on the positive side of a plane.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HalfSpaceConstraint {
    /// A point on the boundary plane.
    pub point: Point3<f64>,
    /// The plane normal; the positive side is the allowed one.
    pub normal: Unit<Vector3<f64>>,
    /// Whether failure rejects the placement outright.
    pub required: bool,
}

impl HalfSpaceConstraint {
    /// Create a half-space constraint.
    #[must_use]
    pub fn new(point: Point3<f64>, normal: Unit<Vector3<f64>>, required: bool) -> Self {
        Self {
            point,
            normal,
            required,
        }
    }

    fn check_point(&self, p: &Point3<f64>) -> bool {
        (p - self.point).dot(&self.normal) >= 0.0
    }
}

/// Whether a region constraint keeps material inside or outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RegionRule {
    /// The collider must lie entirely inside the region.
    Inside,
    /// The collider must not reach into the region.
    Outside,
}

/// Keep part colliders inside (or away from) a box region.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionConstraint {
    /// The region bounds.
    pub bounds: Aabb,
    /// Containment or exclusion.
    pub rule: RegionRule,
    /// Whether failure rejects the placement outright.
    pub required: bool,
}

impl RegionConstraint {
    /// Create a region constraint.
    #[must_use]
    pub fn new(bounds: Aabb, rule: RegionRule, required: bool) -> Self {
        Self {
            bounds,
            rule,
            required,
        }
    }

    fn check_point(&self, p: &Point3<f64>) -> bool {
        match self.rule {
            RegionRule::Inside => self.bounds.contains(p),
            RegionRule::Outside => !self.bounds.contains(p),
        }
    }

    fn check_collider(&self, collider: &Collider) -> bool {
        match self.rule {
            RegionRule::Inside => collider.spheres().iter().all(|s| {
                let inner = self.bounds.expanded(-s.radius);
                !inner.is_empty() && inner.contains(&s.center)
            }),
            RegionRule::Outside => !collider
                .spheres()
                .iter()
                .any(|s| s.intersects_aabb(&self.bounds)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collider::Sphere;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn orientation_check_angle_range() {
        let oc = OrientationConstraint::new(Vector3::z_axis(), Vector3::z_axis(), FRAC_PI_4);
        assert!(oc.check());

        let tilted = oc.transformed(&Isometry3::rotation(Vector3::x() * FRAC_PI_4 * 1.5));
        assert!(!tilted.check());
    }

    #[test]
    fn adjacency_probe_polarity() {
        let seg = Segment::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0));
        let required = AdjacencyConstraint::new(seg, AdjacencyKind::Required);
        let excluded = AdjacencyConstraint::new(seg, AdjacencyKind::Excluded);

        assert!(required.passes(true));
        assert!(!required.passes(false));
        assert!(excluded.passes(false));
        assert!(!excluded.passes(true));
    }

    #[test]
    fn half_space_sides() {
        let hs = HalfSpaceConstraint::new(Point3::origin(), Vector3::z_axis(), false);
        let gc = GlobalConstraint::HalfSpace(hs);

        assert!(gc.check_point(&Point3::new(0.0, 0.0, 1.0)));
        assert!(gc.check_point(&Point3::origin()));
        assert!(!gc.check_point(&Point3::new(0.0, 0.0, -0.1)));
    }

    #[test]
    fn region_inside_requires_full_containment() {
        let bounds = Aabb::new(Point3::new(-2.0, -2.0, -2.0), Point3::new(2.0, 2.0, 2.0));
        let gc = GlobalConstraint::Region(RegionConstraint::new(bounds, RegionRule::Inside, true));

        let inside = Collider::from_sphere(Sphere::new(Point3::origin(), 1.0));
        let poking_out = Collider::from_sphere(Sphere::new(Point3::new(1.5, 0.0, 0.0), 1.0));

        assert!(gc.check_collider(&inside));
        assert!(!gc.check_collider(&poking_out));
    }

    #[test]
    fn region_outside_rejects_touching_material() {
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let gc = GlobalConstraint::Region(RegionConstraint::new(bounds, RegionRule::Outside, true));

        let clear = Collider::from_sphere(Sphere::new(Point3::new(3.0, 0.0, 0.0), 1.0));
        let reaching = Collider::from_sphere(Sphere::new(Point3::new(1.5, 0.0, 0.0), 1.0));

        assert!(gc.check_collider(&clear));
        assert!(!gc.check_collider(&reaching));
    }

    #[test]
    fn aux_collider_sites_reset() {
        let shape = Collider::from_sphere(Sphere::new(Point3::origin(), 1.0));
        let region = AuxRegion::new(
            Collider::from_sphere(Sphere::new(Point3::new(1.0, 0.0, 0.0), 0.2)),
            1,
        );
        let mut aux = AuxCollider::new(shape, vec![region]);
        assert_eq!(aux.valid_sites, vec![1]);

        aux.valid_sites.clear();
        aux.reset_valid_sites();
        assert_eq!(aux.valid_sites, vec![1]);
    }
}
