//! The constraint checkers gating every candidate placement.
//!
//! Each checker is an independent predicate over a candidate part
//! template plus its candidate rigid transform, returning a reject
//! signal. [`check_all`] composes them according to the assembly
//! [`ConstraintMode`]: collision/overlap always runs first and
//! short-circuits everything else; local checkers chain behind the
//! fabrication collider; global constraints apply their own
//! required/optional policy.

use agg_types::{Collider, GLOBAL_TOLERANCE, GlobalConstraint, Isometry3, Part, Point3};
use serde::{Deserialize, Serialize};

/// Engine-wide policy selecting which constraint families are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintMode {
    /// Local constraints only: fabrication collider, supports,
    /// adjacency, orientation.
    Local,
    /// Global constraints only.
    Global,
    /// Global constraints first, then local constraints.
    Both,
}

impl ConstraintMode {
    /// Decode the numeric mode used by persisted run data (1, 2, 3).
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Local),
            2 => Some(Self::Global),
            3 => Some(Self::Both),
            _ => None,
        }
    }

    /// The numeric mode code (1, 2, 3).
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Local => 1,
            Self::Global => 2,
            Self::Both => 3,
        }
    }
}

/// Which checker rejected a candidate placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Candidate center within tolerance of a placed part's center.
    Overlap,
    /// Exact collider intersection with a placed part.
    Collision,
    /// The fabrication collider intersects placed material.
    Fabrication,
    /// No support option had every direction reaching material.
    MissingSupports,
    /// An adjacency/exclusion probe failed.
    Adjacency,
    /// An orientation constraint failed.
    Orientation,
    /// The global constraint set rejected the placement.
    Global,
}

/// Aggregate result of [`check_all`].
#[derive(Debug, Clone)]
pub(crate) struct CheckOutcome {
    /// The first rejecting checker, or `None` when admissible.
    pub rejection: Option<Rejection>,
    /// Fabrication-collider sites recomputed during the check, to be
    /// written back into the part template on acceptance.
    pub aux_valid_sites: Option<Vec<usize>>,
}

/// Result of the overlap/collision phase.
pub(crate) struct CollisionOutcome {
    pub rejection: Option<Rejection>,
    /// Indices of placed parts close enough to be possible colliders.
    pub flagged: Vec<usize>,
    pub center: Point3<f64>,
    /// The transformed collider, when the exact phase ran.
    pub collider: Option<Collider>,
}

/// Overlap and part-part collision check.
///
/// Rejects a candidate whose transformed center sits within
/// [`GLOBAL_TOLERANCE`] of any placed part's center (near-duplicate
/// placement). Otherwise parts whose centers are within the sum of
/// bounding radii are flagged, and — only when `exact` is enabled — the
/// candidate collider is tested against that flagged subset.
pub(crate) fn collision_check(
    part: &Part,
    trans: &Isometry3<f64>,
    placed: &[Part],
    exact: bool,
) -> CollisionOutcome {
    let center = part.transformed_center(trans);
    let mut flagged = Vec::new();

    for (i, other) in placed.iter().enumerate() {
        let dist = (other.center() - center).norm();
        if dist < GLOBAL_TOLERANCE {
            return CollisionOutcome {
                rejection: Some(Rejection::Overlap),
                flagged,
                center,
                collider: None,
            };
        }
        if dist < other.dim() + part.dim() {
            flagged.push(i);
        }
    }

    let mut collider = None;
    if exact {
        let candidate = part.transformed_collider(trans);
        for &i in &flagged {
            if candidate.intersects(placed[i].collider()) {
                return CollisionOutcome {
                    rejection: Some(Rejection::Collision),
                    flagged,
                    center,
                    collider: Some(candidate),
                };
            }
        }
        collider = Some(candidate);
    }

    CollisionOutcome {
        rejection: None,
        flagged,
        center,
        collider,
    }
}

/// Fabrication (auxiliary) collider check.
///
/// The fabrication volume is tested against *all* placed parts. When it
/// is clear, the surviving per-connector clearance sites are recomputed
/// and returned for the caller to store on the part template.
pub(crate) fn additional_collider_check(
    part: &Part,
    trans: &Isometry3<f64>,
    placed: &[Part],
) -> (bool, Option<Vec<usize>>) {
    let Some(aux) = part.constraints().and_then(|c| c.aux_collider.as_ref()) else {
        return (false, None);
    };

    let shape = aux.shape.transformed(trans);
    if placed.iter().any(|p| shape.intersects(p.collider())) {
        return (true, None);
    }

    let valid: Vec<usize> = aux
        .regions
        .iter()
        .filter(|region| {
            let shape = region.shape.transformed(trans);
            !placed.iter().any(|p| shape.intersects(p.collider()))
        })
        .map(|region| region.connector)
        .collect();
    (false, Some(valid))
}

/// Missing-supports check.
///
/// A support option is satisfied when every one of its directions
/// intersects the collider of some flagged neighbour. Rejects when the
/// part declares support options and none is fully satisfied.
pub(crate) fn missing_supports_check(
    part: &Part,
    trans: &Isometry3<f64>,
    placed: &[Part],
    flagged: &[usize],
) -> bool {
    let Some(constraints) = part.constraints() else {
        return false;
    };
    if constraints.supports.is_empty() {
        return false;
    }

    for support in &constraints.supports {
        let support = support.transformed(trans);
        let fully_carried = support.directions.iter().all(|dir| {
            flagged
                .iter()
                .any(|&i| placed[i].collider().intersects_segment(dir))
        });
        if fully_carried {
            return false;
        }
    }
    true
}

/// Adjacency/exclusion check over the flagged neighbour subset.
pub(crate) fn adjacency_check(
    part: &Part,
    trans: &Isometry3<f64>,
    placed: &[Part],
    flagged: &[usize],
) -> bool {
    let Some(constraints) = part.constraints() else {
        return false;
    };

    for adjacency in &constraints.adjacency {
        let probe = adjacency.probe.transformed(trans);
        let hit = flagged
            .iter()
            .any(|&i| placed[i].collider().intersects_segment(&probe));
        if !adjacency.passes(hit) {
            return true;
        }
    }
    false
}

/// Orientation check, standalone from placed parts.
pub(crate) fn orientation_check(part: &Part, trans: &Isometry3<f64>) -> bool {
    let Some(constraints) = part.constraints() else {
        return false;
    };
    constraints
        .orientation
        .iter()
        .any(|oc| !oc.transformed(trans).check())
}

/// Global constraint check.
///
/// Soft constraints see the candidate center, hard constraints the full
/// collider (computed once on demand). A failing required constraint
/// rejects immediately; otherwise the placement is rejected only when
/// every optional constraint failed.
pub(crate) fn global_constraints_check(
    part: &Part,
    trans: &Isometry3<f64>,
    globals: &[GlobalConstraint],
    center: &Point3<f64>,
    collider: &mut Option<Collider>,
) -> bool {
    let mut valid = globals.len();
    for constraint in globals {
        let passes = if constraint.is_soft() {
            constraint.check_point(center)
        } else {
            let collider = collider.get_or_insert_with(|| part.transformed_collider(trans));
            constraint.check_collider(collider)
        };
        if !passes {
            if constraint.required() {
                return true;
            }
            valid -= 1;
        }
    }
    valid == 0
}

/// Compose every checker per the assembly mode.
pub(crate) fn check_all(
    part: &Part,
    trans: &Isometry3<f64>,
    placed: &[Part],
    globals: &[GlobalConstraint],
    mode: ConstraintMode,
    collision_enabled: bool,
) -> CheckOutcome {
    let collision = collision_check(part, trans, placed, collision_enabled);
    if let Some(rejection) = collision.rejection {
        return CheckOutcome {
            rejection: Some(rejection),
            aux_valid_sites: None,
        };
    }

    let center = collision.center;
    let flagged = collision.flagged;
    let mut collider = collision.collider;
    let mut aux_valid_sites = None;

    let rejection = match mode {
        ConstraintMode::Local => local_chain(part, trans, placed, &flagged, &mut aux_valid_sites),
        ConstraintMode::Global => {
            if !globals.is_empty()
                && global_constraints_check(part, trans, globals, &center, &mut collider)
            {
                Some(Rejection::Global)
            } else {
                None
            }
        }
        ConstraintMode::Both => {
            if !globals.is_empty()
                && global_constraints_check(part, trans, globals, &center, &mut collider)
            {
                Some(Rejection::Global)
            } else {
                local_chain(part, trans, placed, &flagged, &mut aux_valid_sites)
            }
        }
    };

    CheckOutcome {
        rejection,
        aux_valid_sites,
    }
}

/// The local constraint chain, short-circuiting on the first rejection.
///
/// Gated behind the part's constrained flag: unconstrained parts skip
/// the whole chain.
fn local_chain(
    part: &Part,
    trans: &Isometry3<f64>,
    placed: &[Part],
    flagged: &[usize],
    aux_valid_sites: &mut Option<Vec<usize>>,
) -> Option<Rejection> {
    if !part.is_constrained() {
        return None;
    }

    let (rejected, valid_sites) = additional_collider_check(part, trans, placed);
    if rejected {
        return Some(Rejection::Fabrication);
    }
    *aux_valid_sites = valid_sites;

    if missing_supports_check(part, trans, placed, flagged) {
        return Some(Rejection::MissingSupports);
    }
    if adjacency_check(part, trans, placed, flagged) {
        return Some(Rejection::Adjacency);
    }
    if orientation_check(part, trans) {
        return Some(Rejection::Orientation);
    }
    None
}
