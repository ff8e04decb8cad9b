//! Scalar voxel lattices.

use agg_types::{Aabb, GlobalConstraint};
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{FieldError, FieldResult};

/// A named scalar field over a box volume, stored as a voxel lattice.
///
/// Values are attached to cell centers; [`sample`](Self::sample) returns
/// the value of the nearest cell (points outside the volume are clamped
/// onto it, so callers wanting strict containment test
/// [`bbox`](Self::bbox) first, as the aggregation engine does).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScalarField {
    name: String,
    bbox: Aabb,
    dims: [usize; 3],
    values: Vec<f64>,
}

impl ScalarField {
    /// Create a field from a value buffer.
    ///
    /// Values are laid out x-fastest: `values[i + nx * (j + ny * k)]` is
    /// the cell at lattice coordinates `(i, j, k)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bounds are empty, any axis has zero cells,
    /// or the buffer length does not match the lattice size.
    pub fn new(
        name: impl Into<String>,
        bbox: Aabb,
        dims: [usize; 3],
        values: Vec<f64>,
    ) -> FieldResult<Self> {
        if bbox.is_empty() {
            return Err(FieldError::EmptyBounds);
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(FieldError::ZeroResolution);
        }
        let expected = dims[0] * dims[1] * dims[2];
        if values.len() != expected {
            return Err(FieldError::ValueCountMismatch {
                expected,
                got: values.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            bbox,
            dims,
            values,
        })
    }

    /// Create a field by evaluating a function at every cell center.
    ///
    /// # Errors
    ///
    /// Returns an error if the bounds are empty or any axis has zero
    /// cells.
    pub fn from_fn(
        name: impl Into<String>,
        bbox: Aabb,
        dims: [usize; 3],
        f: impl Fn(Point3<f64>) -> f64,
    ) -> FieldResult<Self> {
        if bbox.is_empty() {
            return Err(FieldError::EmptyBounds);
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(FieldError::ZeroResolution);
        }
        let mut field = Self {
            name: name.into(),
            bbox,
            dims,
            values: vec![0.0; dims[0] * dims[1] * dims[2]],
        };
        for k in 0..dims[2] {
            for j in 0..dims[1] {
                for i in 0..dims[0] {
                    let idx = field.cell_index([i, j, k]);
                    let center = field.cell_center([i, j, k]);
                    field.values[idx] = f(center);
                }
            }
        }
        Ok(field)
    }

    /// The field name, matched against part field bindings.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bounding volume of the field.
    #[must_use]
    pub fn bbox(&self) -> &Aabb {
        &self.bbox
    }

    /// The lattice resolution per axis.
    #[must_use]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Sample the field at a point (nearest cell, clamped to the volume).
    #[must_use]
    pub fn sample(&self, point: &Point3<f64>) -> f64 {
        self.values[self.cell_index(self.cell_of(point))]
    }

    /// The highest-valued point of the field (a cell center).
    ///
    /// Ties resolve to the lowest lattice index, so the result is
    /// deterministic.
    #[must_use]
    pub fn highest_point(&self) -> Point3<f64> {
        let mut best = 0;
        for (idx, value) in self.values.iter().enumerate() {
            if *value > self.values[best] {
                best = idx;
            }
        }
        self.cell_center(self.cell_at(best))
    }

    /// The highest-valued point admissible under global constraints.
    ///
    /// Cells are visited in descending value order; the first cell whose
    /// center passes the constraint set wins. Returns `None` when no cell
    /// is admissible. Constraint semantics match placement checking at
    /// point level: a failing required constraint excludes the cell, and
    /// otherwise the cell is excluded only if every optional constraint
    /// fails.
    #[must_use]
    pub fn highest_point_constrained(
        &self,
        constraints: &[GlobalConstraint],
    ) -> Option<Point3<f64>> {
        if constraints.is_empty() {
            return Some(self.highest_point());
        }

        let mut order: Vec<usize> = (0..self.values.len()).collect();
        order.sort_by(|&a, &b| self.values[b].total_cmp(&self.values[a]));

        order
            .into_iter()
            .map(|idx| self.cell_center(self.cell_at(idx)))
            .find(|center| point_admissible(constraints, center))
    }

    /// Cell size along each axis.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_size(&self) -> Vector3<f64> {
        let size = self.bbox.size();
        Vector3::new(
            size.x / self.dims[0] as f64,
            size.y / self.dims[1] as f64,
            size.z / self.dims[2] as f64,
        )
    }

    fn cell_index(&self, cell: [usize; 3]) -> usize {
        cell[0] + self.dims[0] * (cell[1] + self.dims[1] * cell[2])
    }

    fn cell_at(&self, index: usize) -> [usize; 3] {
        let i = index % self.dims[0];
        let j = (index / self.dims[0]) % self.dims[1];
        let k = index / (self.dims[0] * self.dims[1]);
        [i, j, k]
    }

    #[allow(clippy::cast_precision_loss)]
    fn cell_center(&self, cell: [usize; 3]) -> Point3<f64> {
        let cs = self.cell_size();
        Point3::new(
            self.bbox.min.x + (cell[0] as f64 + 0.5) * cs.x,
            self.bbox.min.y + (cell[1] as f64 + 0.5) * cs.y,
            self.bbox.min.z + (cell[2] as f64 + 0.5) * cs.z,
        )
    }

    fn cell_of(&self, point: &Point3<f64>) -> [usize; 3] {
        let cs = self.cell_size();
        let clamp_axis = |v: f64, min: f64, step: f64, cells: usize| -> usize {
            if step <= 0.0 {
                return 0;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let idx = ((v - min) / step).floor().max(0.0) as usize;
            idx.min(cells - 1)
        };
        [
            clamp_axis(point.x, self.bbox.min.x, cs.x, self.dims[0]),
            clamp_axis(point.y, self.bbox.min.y, cs.y, self.dims[1]),
            clamp_axis(point.z, self.bbox.min.z, cs.z, self.dims[2]),
        ]
    }
}

/// Point-level admissibility under a global constraint set.
fn point_admissible(constraints: &[GlobalConstraint], point: &Point3<f64>) -> bool {
    let mut optional_total = 0;
    let mut optional_failed = 0;
    for constraint in constraints {
        let passes = constraint.check_point(point);
        if constraint.required() {
            if !passes {
                return false;
            }
        } else {
            optional_total += 1;
            if !passes {
                optional_failed += 1;
            }
        }
    }
    optional_total == 0 || optional_failed < optional_total
}

#[cfg(test)]
mod tests {
    use super::*;
    use agg_types::{HalfSpaceConstraint, RegionConstraint, RegionRule};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn gradient_field() -> ScalarField {
        let bbox = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 1.0, 1.0));
        ScalarField::from_fn("gradient", bbox, [10, 1, 1], |p| p.x).unwrap()
    }

    #[test]
    fn value_count_must_match_lattice() {
        let bbox = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let result = ScalarField::new("bad", bbox, [2, 2, 2], vec![0.0; 7]);
        assert!(matches!(
            result,
            Err(FieldError::ValueCountMismatch {
                expected: 8,
                got: 7
            })
        ));
    }

    #[test]
    fn zero_resolution_rejected() {
        let bbox = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert!(matches!(
            ScalarField::new("bad", bbox, [0, 2, 2], vec![]),
            Err(FieldError::ZeroResolution)
        ));
    }

    #[test]
    fn sample_picks_nearest_cell() {
        let field = gradient_field();
        // Cell centers sit at x = 0.5, 1.5, ... 9.5.
        assert_relative_eq!(field.sample(&Point3::new(2.2, 0.5, 0.5)), 2.5);
        assert_relative_eq!(field.sample(&Point3::new(9.9, 0.5, 0.5)), 9.5);
        // Clamped outside the volume.
        assert_relative_eq!(field.sample(&Point3::new(-5.0, 0.5, 0.5)), 0.5);
    }

    #[test]
    fn highest_point_is_peak_cell_center() {
        let field = gradient_field();
        let peak = field.highest_point();
        assert_relative_eq!(peak.x, 9.5);
        assert_relative_eq!(peak.y, 0.5);
    }

    #[test]
    fn constrained_highest_point_skips_excluded_cells() {
        let field = gradient_field();
        // Required: stay below x = 5 (normal pointing -x from the plane at x=5).
        let constraint = GlobalConstraint::HalfSpace(HalfSpaceConstraint::new(
            Point3::new(5.0, 0.0, 0.0),
            -Vector3::x_axis(),
            true,
        ));

        let peak = field.highest_point_constrained(&[constraint]).unwrap();
        assert_relative_eq!(peak.x, 4.5);
    }

    #[test]
    fn constrained_highest_point_none_when_nothing_admissible() {
        let field = gradient_field();
        let everything_excluded = GlobalConstraint::Region(RegionConstraint::new(
            Aabb::new(Point3::new(-100.0, -100.0, -100.0), Point3::new(100.0, 100.0, 100.0)),
            RegionRule::Outside,
            true,
        ));
        assert!(field
            .highest_point_constrained(&[everything_excluded])
            .is_none());
    }

    #[test]
    fn optional_constraints_need_one_pass() {
        let field = gradient_field();
        let left = GlobalConstraint::HalfSpace(HalfSpaceConstraint::new(
            Point3::new(3.0, 0.0, 0.0),
            -Vector3::x_axis(),
            false,
        ));
        let right = GlobalConstraint::HalfSpace(HalfSpaceConstraint::new(
            Point3::new(7.0, 0.0, 0.0),
            Vector3::x_axis(),
            false,
        ));
        // Every cell passes one of the two; the global peak survives.
        let peak = field
            .highest_point_constrained(&[left, right])
            .unwrap();
        assert_relative_eq!(peak.x, 9.5);
    }
}
