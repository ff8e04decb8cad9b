//! Core types for rule-driven part aggregation.
//!
//! This crate provides the data model consumed by the aggregation engine:
//!
//! - [`Aabb`], [`RefPlane`], [`Sphere`], [`Segment`], [`Collider`] - the
//!   geometry primitives the engine treats as its geometry kernel
//! - [`Part`] - a placeable building block (template or placed instance)
//! - [`Connector`] - a typed attachment site on a part, with a reference plane
//! - [`Rule`] / [`RuleSet`] - directed connection compatibility declarations
//! - [`PartConstraints`] - per-part support/adjacency/orientation constraints
//!   and the auxiliary fabrication collider
//! - [`GlobalConstraint`] - assembly-wide spatial constraints
//! - [`PartCatalog`] - weighted/limited supply of part types
//!
//! # Coordinate System
//!
//! All coordinates are `f64` in a right-handed coordinate system. Rigid
//! transforms are [`nalgebra::Isometry3`]. Connector mating uses
//! plane-to-plane alignment: the child's flipped connector plane is mapped
//! onto the parent's connector plane by [`plane_to_plane`].
//!
//! # Tolerance
//!
//! A single global tolerance, [`GLOBAL_TOLERANCE`], is shared by every
//! coincidence test in the system (center coincidence, connector
//! coincidence, blocked-connection probing). Keeping one constant keeps
//! accept/reject decisions consistent across the constraint subsystems.
//!
//! # Example
//!
//! ```
//! use agg_types::{Collider, Connector, Part, RefPlane, Rule, RuleSet, Sphere};
//! use nalgebra::{Point3, Vector3};
//!
//! // A one-unit "stick" part with a connector on each end.
//! let part = Part::new("stick", Point3::origin(), 0.5)
//!     .with_collider(Collider::from_sphere(Sphere::new(Point3::origin(), 0.45)))
//!     .with_connector(Connector::new(
//!         RefPlane::new(Point3::new(-0.5, 0.0, 0.0), Vector3::z(), Vector3::y()).unwrap(),
//!         "end",
//!     ))
//!     .with_connector(Connector::new(
//!         RefPlane::new(Point3::new(0.5, 0.0, 0.0), Vector3::y(), Vector3::z()).unwrap(),
//!         "end",
//!     ));
//!
//! let rules = RuleSet::new(vec![Rule::new("stick", 1, "stick", 0)]);
//! let mut part = part;
//! part.reset(&rules);
//! assert_eq!(part.active_connections(), &[1]);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod bounds;
mod catalog;
mod collider;
mod connector;
mod constraint;
mod error;
mod part;
mod plane;
mod rule;

pub use bounds::Aabb;
pub use catalog::PartCatalog;
pub use collider::{Collider, Segment, Sphere};
pub use connector::Connector;
pub use constraint::{
    AdjacencyConstraint, AdjacencyKind, AuxCollider, AuxRegion, GlobalConstraint,
    HalfSpaceConstraint, OrientationConstraint, PartConstraints, RegionConstraint, RegionRule,
    SupportConstraint,
};
pub use error::{TypesError, TypesResult};
pub use part::Part;
pub use plane::{RefPlane, plane_to_plane};
pub use rule::{Rule, RuleSet};

// Re-export nalgebra types for convenience
pub use nalgebra::{Isometry3, Point3, Vector3};

/// Shared tolerance for every coincidence test in the aggregation system.
///
/// Used for near-duplicate center rejection, connector coincidence when
/// reconstructing a graph from placed parts, and blocked-connection
/// probing. One constant across unrelated geometric scales is intentional:
/// diverging per use site would silently change acceptance outcomes.
pub const GLOBAL_TOLERANCE: f64 = 0.01;
