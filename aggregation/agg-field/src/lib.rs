//! Scalar fields for biasing aggregation growth.
//!
//! A [`ScalarField`] is a named lattice of scalar values over an
//! axis-aligned bounding volume. The aggregation engine samples it at
//! candidate part centers to order its growth queue, and asks it for the
//! highest-valued point to seed a field-guided run.
//!
//! # Example
//!
//! ```
//! use agg_field::ScalarField;
//! use agg_types::Aabb;
//! use nalgebra::Point3;
//!
//! let bbox = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 1.0, 1.0));
//! // Value grows along +x.
//! let field = ScalarField::from_fn("gradient", bbox, [10, 1, 1], |p| p.x).unwrap();
//!
//! let peak = field.highest_point();
//! assert!(peak.x > 9.0);
//! assert!(field.sample(&Point3::new(2.5, 0.5, 0.5)) < field.sample(&peak));
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod field;

pub use error::{FieldError, FieldResult};
pub use field::ScalarField;
