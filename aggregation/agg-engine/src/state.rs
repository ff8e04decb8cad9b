//! Run-state persistence.
//!
//! A [`RunState`] is the structured record of everything a run needs to
//! resume growth after reload: templates, rules, mode, flags, the
//! serialized graph, fields, global constraints, seed, catalog state, and
//! the ordered placed-parts sequence keyed by id. The aggregation queue
//! is not persisted; it is recomputed on load, since its entries
//! reference transforms tied to live placed-part identities.

use std::collections::BTreeMap;

use agg_field::ScalarField;
use agg_types::{GlobalConstraint, Part, PartCatalog, RuleSet};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregation::Aggregation;
use crate::checks::ConstraintMode;
use crate::error::{EngineError, EngineResult};
use crate::graph::{ConnectionGraph, Edge};

/// The persisted form of one aggregation run.
///
/// Format-agnostic: any serde format works. JSON helpers are provided on
/// [`Aggregation`] as the workspace default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Run name.
    pub name: String,
    /// Part templates, in registration order.
    pub parts: Vec<Part>,
    /// The active rule set.
    pub rules: RuleSet,
    /// Constraint mode.
    pub mode: ConstraintMode,
    /// Whether exact collision checking is enabled.
    pub coll_check: bool,
    /// Connection graph as node → neighbour → edge metadata.
    pub graph: BTreeMap<u32, BTreeMap<u32, Edge>>,
    /// Attached scalar fields.
    pub fields: Vec<ScalarField>,
    /// Attached global constraints.
    pub global_constraints: Vec<GlobalConstraint>,
    /// The fixed random seed.
    pub rnd_seed: u64,
    /// Catalog state, if a catalog is attached.
    pub catalog: Option<PartCatalog>,
    /// Placed parts keyed by instance id.
    pub placed: BTreeMap<u32, Part>,
    /// Placement order, as instance ids.
    pub sequence: Vec<u32>,
}

impl Aggregation {
    /// Capture the run as a persistable state record.
    ///
    /// The random generator position is not captured: reloading re-seeds
    /// from the stored seed, so a resumed run replays draws from the
    /// seed, not from the interrupted position.
    #[must_use]
    pub fn to_state(&self) -> RunState {
        let mut placed = BTreeMap::new();
        let mut sequence = Vec::new();
        for part in &self.placed {
            if let Some(id) = part.id() {
                placed.insert(id, part.clone());
                sequence.push(id);
            } else {
                warn!(part = part.name(), "skipping placed part without id");
            }
        }

        RunState {
            name: self.name.clone(),
            parts: self.templates().cloned().collect(),
            rules: self.rules.clone(),
            mode: self.mode,
            coll_check: self.coll_check,
            graph: self.graph.to_data(),
            fields: self.fields.clone(),
            global_constraints: self.global_constraints.clone(),
            rnd_seed: self.seed,
            catalog: self.catalog.clone(),
            placed,
            sequence,
        }
    }

    /// Rebuild a run from a persisted state record.
    ///
    /// Placed parts are restored in sequence order with their serialized
    /// active-connection/active-rule state intact, the graph is rebuilt
    /// from its mapping, and — when fields are attached — the aggregation
    /// queue is recomputed from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CorruptState`] when the sequence references
    /// a part id missing from the placed map, and propagates queue
    /// recomputation failures.
    pub fn from_state(state: RunState) -> EngineResult<Self> {
        let mut run = Self::new(state.name, state.parts, state.rules, state.mode)
            .with_collision_check(state.coll_check)
            .with_fields(state.fields)
            .with_global_constraints(state.global_constraints)
            .with_seed(state.rnd_seed);
        run.catalog = state.catalog;

        for id in &state.sequence {
            let part = state
                .placed
                .get(id)
                .ok_or_else(|| EngineError::CorruptState {
                    reason: format!("sequence references missing part {id}"),
                })?;
            run.placed.push(part.clone());
        }
        run.graph = ConnectionGraph::from_data(&state.graph);

        if !run.fields.is_empty() {
            run.recompute_aggregation_queue()?;
        }
        Ok(run)
    }

    /// Serialize the run state to JSON.
    ///
    /// # Errors
    ///
    /// Propagates serialization failures.
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(&self.to_state())?)
    }

    /// Rebuild a run from JSON produced by [`to_json`](Self::to_json).
    ///
    /// # Errors
    ///
    /// Propagates deserialization failures and state inconsistencies.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Self::from_state(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agg_types::{Collider, Connector, RefPlane, Sphere};
    use nalgebra::{Point3, Vector3};

    fn stick() -> Part {
        Part::new("stick", Point3::origin(), 0.5)
            .with_collider(Collider::from_sphere(Sphere::new(Point3::origin(), 0.45)))
            .with_connector(Connector::new(
                RefPlane::new(Point3::new(-0.5, 0.0, 0.0), Vector3::z(), Vector3::y()).unwrap(),
                "end",
            ))
            .with_connector(Connector::new(
                RefPlane::new(Point3::new(0.5, 0.0, 0.0), Vector3::y(), Vector3::z()).unwrap(),
                "end",
            ))
    }

    fn grown_run() -> Aggregation {
        let rules = RuleSet::parse(&["stick|1_stick|0"]).unwrap();
        let mut run = Aggregation::new(
            "persisted",
            vec![stick()],
            rules,
            ConstraintMode::Local,
        )
        .with_seed(11);
        run.aggregate_rnd(4, false).unwrap();
        run
    }

    #[test]
    fn state_roundtrip_preserves_assembly() {
        let run = grown_run();
        let json = run.to_json().unwrap();
        let reloaded = Aggregation::from_json(&json).unwrap();

        assert_eq!(reloaded.name(), run.name());
        assert_eq!(reloaded.placed_parts().len(), run.placed_parts().len());
        assert_eq!(reloaded.seed(), run.seed());
        assert_eq!(reloaded.graph().nodes(), run.graph().nodes());
        assert_eq!(reloaded.graph().edges(), run.graph().edges());

        for (a, b) in reloaded.placed_parts().iter().zip(run.placed_parts()) {
            assert_eq!(a.id(), b.id());
            assert_eq!(a.name(), b.name());
            assert_eq!(a.parent(), b.parent());
            assert_eq!(a.active_connections(), b.active_connections());
            assert!((a.center() - b.center()).norm() < 1e-12);
        }
    }

    #[test]
    fn reloaded_run_keeps_growing() {
        let mut run = grown_run();
        let json = run.to_json().unwrap();
        let mut reloaded = Aggregation::from_json(&json).unwrap();

        let a = run.aggregate_rnd(2, false).unwrap();
        let b = reloaded.aggregate_rnd(2, false).unwrap();
        assert!(a.is_complete());
        assert!(b.is_complete());
        assert_eq!(run.placed_parts().len(), 6);
        assert_eq!(reloaded.placed_parts().len(), 6);
    }

    #[test]
    fn corrupt_sequence_rejected() {
        let run = grown_run();
        let mut state = run.to_state();
        state.sequence.push(99);

        assert!(matches!(
            Aggregation::from_state(state),
            Err(EngineError::CorruptState { .. })
        ));
    }
}
