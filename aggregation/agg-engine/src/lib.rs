//! Rule-driven combinatorial aggregation engine.
//!
//! Given a palette of discrete parts, a set of pairwise connection
//! compatibility rules, and a driving strategy, an [`Aggregation`] grows
//! a spatial assembly one part at a time while enforcing
//! collision-freedom and a family of geometric constraints.
//!
//! Three growth strategies are available on one mutable run:
//!
//! - [`Aggregation::aggregate_sequence`] - apply an external script of
//!   rule applications, trusting it (no constraint checks)
//! - [`Aggregation::aggregate_rnd`] - stochastic search with permanent
//!   pruning of rejected rules
//! - [`Aggregation::aggregate_field`] - scalar-field guidance through a
//!   globally ordered candidate queue
//!
//! The engine is the sole mutator of its run: the placed-parts list, the
//! [`ConnectionGraph`], the [`AggregationQueue`], and the catalog all
//! live behind it. Growth that cannot reach its target stalls with a
//! descriptive [`Growth::Stalled`] value instead of failing, so partial
//! assemblies stay inspectable. Randomness is owned per run and seeded
//! explicitly: equal seeds replay equal assemblies.
//!
//! # Example
//!
//! ```
//! use agg_engine::{Aggregation, ConstraintMode};
//! use agg_types::{Collider, Connector, Part, RefPlane, RuleSet, Sphere};
//! use nalgebra::{Point3, Vector3};
//!
//! // A part with one connector per end, chained by a single rule.
//! let stick = Part::new("stick", Point3::origin(), 0.5)
//!     .with_collider(Collider::from_sphere(Sphere::new(Point3::origin(), 0.45)))
//!     .with_connector(Connector::new(
//!         RefPlane::new(Point3::new(-0.5, 0.0, 0.0), Vector3::z(), Vector3::y()).unwrap(),
//!         "end",
//!     ))
//!     .with_connector(Connector::new(
//!         RefPlane::new(Point3::new(0.5, 0.0, 0.0), Vector3::y(), Vector3::z()).unwrap(),
//!         "end",
//!     ));
//! let rules = RuleSet::parse(&["stick|1_stick|0"]).unwrap();
//!
//! let mut run = Aggregation::new("chain", vec![stick], rules, ConstraintMode::Local)
//!     .with_seed(1);
//! let growth = run.aggregate_rnd(8, false).unwrap();
//!
//! assert!(growth.is_complete());
//! assert_eq!(run.graph().edge_count(), 7);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod aggregation;
mod checks;
mod error;
mod graph;
mod queue;
mod state;

pub use aggregation::{Aggregation, CancelToken, Growth};
pub use checks::{ConstraintMode, Rejection};
pub use error::{EngineError, EngineResult, GraphError};
pub use graph::{ConnectionGraph, Edge};
pub use queue::{AggregationQueue, QueueEntry};
pub use state::RunState;

// Re-export the data model and fields for downstream convenience
pub use agg_field::ScalarField;
pub use agg_types::{
    GLOBAL_TOLERANCE, GlobalConstraint, Part, PartCatalog, Rule, RuleSet,
};
