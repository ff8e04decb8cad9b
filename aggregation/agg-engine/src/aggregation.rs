//! The aggregation engine: one mutable run growing an assembly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use agg_field::ScalarField;
use agg_types::{
    GLOBAL_TOLERANCE, GlobalConstraint, Isometry3, Part, PartCatalog, RefPlane, Rule, RuleSet,
    TypesError, plane_to_plane,
};
use hashbrown::{HashMap, HashSet};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::checks::{self, ConstraintMode, Rejection};
use crate::error::{EngineError, EngineResult};
use crate::graph::ConnectionGraph;
use crate::queue::{AggregationQueue, QueueEntry};

/// Outer-loop budget: a strategy gives up after `num * OUTER_LOOP_FACTOR`
/// iterations without reaching its target.
const OUTER_LOOP_FACTOR: usize = 100;

/// Attempts to find a rule matching a catalog-drawn part type in one
/// stochastic placement step. An intentional design bound, not a
/// completeness guarantee: sparse rule sets can exhaust it even when a
/// match exists.
const RULE_MATCH_ATTEMPTS: usize = 10_000;

/// Attempts to find a queue entry matching a catalog-drawn part type in
/// one field-guided placement step.
const QUEUE_MATCH_ATTEMPTS: usize = 1_000;

/// Outcome of a growth call.
///
/// Stalling is a soft-terminal state, not an error: the committed parts
/// stay intact and inspectable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Growth {
    /// The requested number of parts was placed.
    Complete {
        /// Total parts now in the assembly.
        placed: usize,
    },
    /// Growth halted before reaching the target.
    Stalled {
        /// Total parts now in the assembly.
        placed: usize,
        /// How many requested parts could not be placed.
        remaining: usize,
        /// A descriptive reason, e.g. `could not place 3 parts`.
        reason: String,
    },
}

impl Growth {
    /// Whether the growth call reached its target.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// A cooperative cancellation handle for long growth loops.
///
/// Checked once per outer loop iteration of every strategy; a cancelled
/// run stalls with committed parts intact. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One mutable aggregation run.
///
/// The engine is the sole mutator of assembly state: the placed-parts
/// list, the connection graph, the queue, and the catalog are owned here
/// and mutated only through the growth strategies, the commit protocol,
/// and rollback. Randomness comes from a run-owned, explicitly seeded
/// generator, so identical seeds replay identical draw sequences.
///
/// # Example
///
/// ```
/// use agg_engine::{Aggregation, ConstraintMode};
/// use agg_types::{Collider, Connector, Part, RefPlane, RuleSet, Sphere};
/// use nalgebra::{Point3, Vector3};
///
/// let stick = Part::new("stick", Point3::origin(), 0.5)
///     .with_collider(Collider::from_sphere(Sphere::new(Point3::origin(), 0.45)))
///     .with_connector(Connector::new(
///         RefPlane::new(Point3::new(-0.5, 0.0, 0.0), Vector3::z(), Vector3::y()).unwrap(),
///         "end",
///     ))
///     .with_connector(Connector::new(
///         RefPlane::new(Point3::new(0.5, 0.0, 0.0), Vector3::y(), Vector3::z()).unwrap(),
///         "end",
///     ));
/// let rules = RuleSet::parse(&["stick|1_stick|0"]).unwrap();
///
/// let mut run = Aggregation::new("chain", vec![stick], rules, ConstraintMode::Local)
///     .with_seed(42);
/// let growth = run.aggregate_rnd(5, false).unwrap();
/// assert!(growth.is_complete());
/// assert_eq!(run.placed_parts().len(), 5);
/// ```
#[derive(Debug)]
pub struct Aggregation {
    pub(crate) name: String,
    pub(crate) parts: HashMap<String, Part>,
    pub(crate) template_order: Vec<String>,
    pub(crate) rules: RuleSet,
    pub(crate) mode: ConstraintMode,
    pub(crate) coll_check: bool,
    pub(crate) placed: Vec<Part>,
    pub(crate) graph: ConnectionGraph,
    pub(crate) fields: Vec<ScalarField>,
    pub(crate) global_constraints: Vec<GlobalConstraint>,
    pub(crate) queue: AggregationQueue,
    pub(crate) catalog: Option<PartCatalog>,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) seed: u64,
    pub(crate) prev_num: usize,
    pub(crate) cancel: Option<CancelToken>,
}

impl Aggregation {
    /// Create a run from part templates and a rule set.
    ///
    /// Every template is reset against the rule set, generating its
    /// per-connector rule tables. The run starts with seed 0; use
    /// [`with_seed`](Self::with_seed) for a specific one.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        parts: Vec<Part>,
        rules: RuleSet,
        mode: ConstraintMode,
    ) -> Self {
        let mut templates = HashMap::new();
        let mut template_order = Vec::new();
        for mut part in parts {
            part.reset(&rules);
            if !templates.contains_key(part.name()) {
                template_order.push(part.name().to_string());
            }
            templates.insert(part.name().to_string(), part);
        }

        Self {
            name: name.into(),
            parts: templates,
            template_order,
            rules,
            mode,
            coll_check: true,
            placed: Vec::new(),
            graph: ConnectionGraph::new(),
            fields: Vec::new(),
            global_constraints: Vec::new(),
            queue: AggregationQueue::new(),
            catalog: None,
            rng: ChaCha8Rng::seed_from_u64(0),
            seed: 0,
            prev_num: 0,
            cancel: None,
        }
    }

    /// Enable or disable exact collider intersection checks (builder).
    ///
    /// Broad-phase overlap rejection always runs.
    #[must_use]
    pub fn with_collision_check(mut self, enabled: bool) -> Self {
        self.coll_check = enabled;
        self
    }

    /// Attach scalar fields for field-guided growth (builder).
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<ScalarField>) -> Self {
        self.fields = fields;
        self
    }

    /// Attach global constraints (builder).
    #[must_use]
    pub fn with_global_constraints(mut self, constraints: Vec<GlobalConstraint>) -> Self {
        self.global_constraints = constraints;
        self
    }

    /// Attach a part catalog (builder).
    #[must_use]
    pub fn with_catalog(mut self, catalog: PartCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Fix the random seed (builder). Resets the generator.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.reseed(seed);
        self
    }

    /// Attach a cancellation token (builder).
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Re-register previously aggregated parts (builder).
    ///
    /// Each part is reset against the rule set, given a sequential id if
    /// it has none, and its graph node plus (when parented) its incoming
    /// edge are restored. With fields attached, the queue is seeded from
    /// every re-registered part. Apply this last: it needs the rule set
    /// and fields already in place.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CorruptState`] for a parented part missing
    /// its connector links, and graph errors for inconsistent parenting.
    pub fn with_previous(mut self, prev: Vec<Part>) -> EngineResult<Self> {
        for mut part in prev {
            part.reset(&self.rules);
            let id = match part.id() {
                Some(id) => id,
                None => {
                    let id = self.next_id();
                    part.set_id(id);
                    id
                }
            };
            self.graph.add_node(id);
            if let Some(parent) = part.parent() {
                let (Some(conn_on), Some(conn_to)) = (part.conn_on_parent(), part.conn_to_parent())
                else {
                    return Err(EngineError::CorruptState {
                        reason: format!("part {id} has a parent but no connector links"),
                    });
                };
                self.graph.add_edge(parent, id, conn_on, conn_to)?;
            }
            self.placed.push(part);
            self.prev_num += 1;
        }

        if !self.fields.is_empty() {
            for index in 0..self.placed.len() {
                self.compute_next_w_field(index)?;
            }
        }
        Ok(self)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The run name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical ordered list of placed parts.
    #[must_use]
    pub fn placed_parts(&self) -> &[Part] {
        &self.placed
    }

    /// The connection graph.
    #[must_use]
    pub fn graph(&self) -> &ConnectionGraph {
        &self.graph
    }

    /// The aggregation queue (meaningful in field-guided runs).
    #[must_use]
    pub fn queue(&self) -> &AggregationQueue {
        &self.queue
    }

    /// The part catalog, if attached.
    #[must_use]
    pub fn catalog(&self) -> Option<&PartCatalog> {
        self.catalog.as_ref()
    }

    /// The active rule set.
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// The constraint mode.
    #[must_use]
    pub fn mode(&self) -> ConstraintMode {
        self.mode
    }

    /// Whether exact collision checking is enabled.
    #[must_use]
    pub fn collision_check_enabled(&self) -> bool {
        self.coll_check
    }

    /// The fixed random seed of this run.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The attached fields.
    #[must_use]
    pub fn fields(&self) -> &[ScalarField] {
        &self.fields
    }

    /// The attached global constraints.
    #[must_use]
    pub fn global_constraints(&self) -> &[GlobalConstraint] {
        &self.global_constraints
    }

    /// The part templates, in registration order.
    pub fn templates(&self) -> impl Iterator<Item = &Part> {
        self.template_order
            .iter()
            .filter_map(|name| self.parts.get(name))
    }

    /// Look up a placed part by instance id.
    #[must_use]
    pub fn part_by_id(&self, id: u32) -> Option<&Part> {
        self.placed.iter().find(|p| p.id() == Some(id))
    }

    /// Reset the random generator to a new fixed seed.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    // =========================================================================
    // Rule and template maintenance
    // =========================================================================

    /// Replace (optionally) and reset the part templates.
    ///
    /// Every template regenerates its rule tables from the active rule
    /// set.
    pub fn reset_base_parts(&mut self, new_parts: Option<Vec<Part>>) {
        if let Some(parts) = new_parts {
            self.parts.clear();
            self.template_order.clear();
            for part in parts {
                if !self.parts.contains_key(part.name()) {
                    self.template_order.push(part.name().to_string());
                }
                self.parts.insert(part.name().to_string(), part);
            }
        }
        let rules = self.rules.clone();
        for part in self.parts.values_mut() {
            part.reset(&rules);
        }
    }

    /// Swap the active rule set.
    ///
    /// A changed set forces every part, template and placed, to
    /// regenerate its rule tables, and rebuilds the queue when fields are
    /// attached. An identical set is a no-op.
    ///
    /// # Errors
    ///
    /// Propagates queue recomputation failures.
    pub fn reset_rules(&mut self, rules: RuleSet) -> EngineResult<()> {
        if rules == self.rules {
            return Ok(());
        }
        self.rules = rules;
        self.reset_base_parts(None);
        let rule_set = self.rules.clone();
        for part in &mut self.placed {
            part.reset(&rule_set);
        }
        if !self.fields.is_empty() {
            self.recompute_aggregation_queue()?;
        }
        Ok(())
    }

    /// Clear and rebuild the aggregation queue from every placed part.
    ///
    /// Required after any rollback or rule-set change: queue entries
    /// reference transforms relative to specific placed-part identities
    /// that those operations invalidate.
    ///
    /// # Errors
    ///
    /// Propagates unknown-template and field-binding failures.
    pub fn recompute_aggregation_queue(&mut self) -> EngineResult<()> {
        self.queue.clear();
        for index in 0..self.placed.len() {
            self.compute_next_w_field(index)?;
        }
        Ok(())
    }

    // =========================================================================
    // Rollback
    // =========================================================================

    /// Truncate the assembly to its first `num` parts.
    ///
    /// Removed parts leave the graph (edges cascading) and return their
    /// types to the catalog. Every remaining part is reset to its
    /// rule-set-derived default active state, undoing prior pruning:
    /// pruning is irrevocable during growth and may have deactivated
    /// connectors whose blocking neighbour no longer exists. With fields
    /// attached, the queue is rebuilt from scratch.
    ///
    /// # Errors
    ///
    /// Propagates graph and catalog inconsistencies, which indicate
    /// corrupted run state.
    pub fn remove_elements(&mut self, num: usize) -> EngineResult<()> {
        if num >= self.placed.len() {
            return Ok(());
        }
        let removed = self.placed.split_off(num);
        let removed_ids: HashSet<u32> = removed.iter().filter_map(Part::id).collect();

        for part in &removed {
            if let Some(id) = part.id() {
                self.graph.remove_node(id)?;
            }
            if let Some(catalog) = self.catalog.as_mut() {
                catalog.update(part.name(), 1)?;
            }
        }
        info!(removed = removed.len(), remaining = num, "rolled back assembly");

        let rules = self.rules.clone();
        for part in &mut self.placed {
            part.reset(&rules);
            part.retain_children(|child| !removed_ids.contains(&child));
        }

        if !self.fields.is_empty() {
            self.recompute_aggregation_queue()?;
        }
        Ok(())
    }

    // =========================================================================
    // Constraint checking
    // =========================================================================

    /// Check a candidate placement of a template under a transform.
    ///
    /// Returns `None` when the placement is admissible, or the first
    /// rejecting checker. Which checkers run follows the run's
    /// [`ConstraintMode`]; collision/overlap always runs first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownTemplate`] for an unregistered name.
    pub fn check_placement(
        &self,
        name: &str,
        trans: &Isometry3<f64>,
    ) -> EngineResult<Option<Rejection>> {
        let template = self.template(name)?;
        let outcome = checks::check_all(
            template,
            trans,
            &self.placed,
            &self.global_constraints,
            self.mode,
            self.coll_check,
        );
        Ok(outcome.rejection)
    }

    /// Prune every rule whose candidate placement already collides.
    ///
    /// Walks all active connections of all placed parts, collision-checks
    /// each candidate child, and deactivates the failing rules (and
    /// connectors left without rules).
    pub fn check_all_connections(&mut self) {
        let mut prunes: Vec<(usize, usize, usize)> = Vec::new();

        for (index, part) in self.placed.iter().enumerate() {
            for &conn_id in part.active_connections() {
                let conn = &part.connectors()[conn_id];
                for &rule_id in conn.active_rules() {
                    let Some(rule) = conn.rule(rule_id) else {
                        continue;
                    };
                    let Ok(child) = self.template(rule.part2()) else {
                        continue;
                    };
                    let Some(child_conn) = child.connectors().get(rule.conn2()) else {
                        continue;
                    };
                    let trans = plane_to_plane(child_conn.flip_plane(), conn.plane());
                    let outcome =
                        checks::collision_check(child, &trans, &self.placed, self.coll_check);
                    if outcome.rejection.is_some() {
                        prunes.push((index, conn_id, rule_id));
                    }
                }
            }
        }

        for (index, conn_id, rule_id) in prunes {
            self.placed[index].deactivate_rule(conn_id, rule_id);
        }
    }

    /// Connector indices of a placed part not occluded by other parts.
    ///
    /// A connector is blocked when another placed part's collider comes
    /// within [`GLOBAL_TOLERANCE`] of the connector origin.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PartNotFound`] for an unknown id.
    pub fn check_blocked_connections(&self, part_id: u32) -> EngineResult<Vec<usize>> {
        let part = self
            .part_by_id(part_id)
            .ok_or(EngineError::PartNotFound { id: part_id })?;

        let mut open: Vec<usize> = (0..part.connectors().len()).collect();
        open.retain(|&conn_id| {
            let origin = part.connectors()[conn_id].plane().origin();
            !self.placed.iter().any(|other| {
                other.id() != Some(part_id)
                    && other.collider().distance_to_point(&origin) < GLOBAL_TOLERANCE
            })
        });
        Ok(open)
    }

    /// Enumerate the admissible child placements of one connector.
    ///
    /// For every still-active rule of the connector, orient the child
    /// template into place; with `check_constraints` the full constraint
    /// pipeline filters the results. An inactive connector yields no
    /// candidates.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PartNotFound`] for an unknown id and
    /// [`EngineError::ConnectorOutOfRange`] for a bad connector index.
    pub fn compute_possible_children(
        &self,
        part_id: u32,
        conn_id: usize,
        check_constraints: bool,
    ) -> EngineResult<Vec<Part>> {
        let part = self
            .part_by_id(part_id)
            .ok_or(EngineError::PartNotFound { id: part_id })?;
        let conn = part
            .connectors()
            .get(conn_id)
            .ok_or_else(|| EngineError::ConnectorOutOfRange {
                part: part.name().to_string(),
                index: conn_id,
            })?;
        if !part.active_connections().contains(&conn_id) {
            return Ok(Vec::new());
        }

        let mut children = Vec::new();
        for &rule_id in conn.active_rules() {
            let Some(rule) = conn.rule(rule_id) else {
                continue;
            };
            let child = self.template(rule.part2())?;
            let child_conn = child.connectors().get(rule.conn2()).ok_or_else(|| {
                EngineError::ConnectorOutOfRange {
                    part: rule.part2().to_string(),
                    index: rule.conn2(),
                }
            })?;
            let trans = plane_to_plane(child_conn.flip_plane(), conn.plane());

            if check_constraints {
                let outcome = checks::check_all(
                    child,
                    &trans,
                    &self.placed,
                    &self.global_constraints,
                    self.mode,
                    self.coll_check,
                );
                if outcome.rejection.is_some() {
                    continue;
                }
            }
            children.push(child.transformed(&trans));
        }
        Ok(children)
    }

    /// Commit an externally transformed and checked part.
    ///
    /// The part is assumed already in place; it is reset against the rule
    /// set, linked under the given parent connector, and recorded in the
    /// graph. No constraint checking is performed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PartNotFound`] for an unknown parent id.
    pub fn add_custom_part(
        &mut self,
        parent_id: u32,
        conn_on_parent: usize,
        conn_to_parent: usize,
        part: Part,
    ) -> EngineResult<u32> {
        let parent_index = self
            .placed
            .iter()
            .position(|p| p.id() == Some(parent_id))
            .ok_or(EngineError::PartNotFound { id: parent_id })?;

        let id = self.next_id();
        let mut part = part;
        part.reset(&self.rules);
        part.deactivate_connection(conn_to_parent);
        part.set_id(id);
        part.set_parent_link(parent_id, conn_on_parent, conn_to_parent);

        self.placed[parent_index].push_child(id);
        self.placed[parent_index].deactivate_connection(conn_on_parent);
        self.placed.push(part);

        self.graph.add_node(id);
        self.graph
            .add_edge(parent_id, id, conn_on_parent, conn_to_parent)?;
        Ok(id)
    }

    // =========================================================================
    // Sequential growth
    // =========================================================================

    /// Grow the assembly from an ordered script of rule applications.
    ///
    /// Entries read `part1|conn1_part2|conn2>id1_id2`. The first entry
    /// (on an empty assembly) seeds two parts: `part1` as the anchor at
    /// identity with id `id1`, and `part2` mated through the named
    /// connectors with id `id2`. Subsequent entries reference the parent
    /// by its explicit id in the `part1` position. No constraint checking
    /// is performed: the script is trusted.
    ///
    /// # Errors
    ///
    /// Malformed entries, unknown templates, out-of-range connectors,
    /// unknown parent ids, and already-used ids all abort the call with a
    /// descriptive error; parts committed by earlier entries remain.
    pub fn aggregate_sequence<S: AsRef<str>>(&mut self, script: &[S]) -> EngineResult<()> {
        for entry in script {
            let entry = entry.as_ref();
            let parsed = ScriptEntry::parse(entry)?;

            if self.placed.is_empty() {
                self.apply_seed_entry(&parsed)?;
            } else {
                self.apply_growth_entry(&parsed)?;
            }
        }
        Ok(())
    }

    fn apply_seed_entry(&mut self, entry: &ScriptEntry) -> EngineResult<()> {
        let anchor_template = self.template(&entry.part1)?;
        let anchor_conn = anchor_template
            .connectors()
            .get(entry.conn1)
            .ok_or_else(|| EngineError::ConnectorOutOfRange {
                part: entry.part1.clone(),
                index: entry.conn1,
            })?;
        let child_template = self.template(&entry.part2)?;
        let child_conn = child_template
            .connectors()
            .get(entry.conn2)
            .ok_or_else(|| EngineError::ConnectorOutOfRange {
                part: entry.part2.clone(),
                index: entry.conn2,
            })?;

        if entry.id1 == entry.id2 {
            return Err(EngineError::MalformedScript {
                entry: entry.text.clone(),
                reason: "seed entry assigns the same id twice".to_string(),
            });
        }

        let trans = plane_to_plane(child_conn.flip_plane(), anchor_conn.plane());

        let mut anchor = anchor_template.transformed(&Isometry3::identity());
        anchor.set_id(entry.id1);
        anchor.push_child(entry.id2);

        let mut child = child_template.transformed(&trans);
        child.set_id(entry.id2);
        child.set_parent_link(entry.id1, entry.conn1, entry.conn2);

        self.graph.add_node(entry.id1);
        self.graph.add_node(entry.id2);
        self.graph
            .add_edge(entry.id1, entry.id2, entry.conn1, entry.conn2)?;

        self.placed.push(anchor);
        self.placed.push(child);
        debug!(anchor = entry.id1, child = entry.id2, "seeded assembly from script");
        Ok(())
    }

    fn apply_growth_entry(&mut self, entry: &ScriptEntry) -> EngineResult<()> {
        let parent_id: u32 =
            entry
                .part1
                .parse()
                .map_err(|_| EngineError::MalformedScript {
                    entry: entry.text.clone(),
                    reason: "parent id is not numeric".to_string(),
                })?;

        if self.part_by_id(entry.id2).is_some() {
            return Err(EngineError::MalformedScript {
                entry: entry.text.clone(),
                reason: format!("id {} already in use", entry.id2),
            });
        }

        let parent_index = self
            .placed
            .iter()
            .position(|p| p.id() == Some(parent_id))
            .ok_or(EngineError::PartNotFound { id: parent_id })?;

        let parent_conn = self.placed[parent_index]
            .connectors()
            .get(entry.conn1)
            .ok_or_else(|| EngineError::ConnectorOutOfRange {
                part: self.placed[parent_index].name().to_string(),
                index: entry.conn1,
            })?;
        let child_template = self.template(&entry.part2)?;
        let child_conn = child_template
            .connectors()
            .get(entry.conn2)
            .ok_or_else(|| EngineError::ConnectorOutOfRange {
                part: entry.part2.clone(),
                index: entry.conn2,
            })?;

        let trans = plane_to_plane(child_conn.flip_plane(), parent_conn.plane());
        let mut child = child_template.transformed(&trans);
        child.set_id(entry.id2);
        child.set_parent_link(parent_id, entry.conn1, entry.conn2);

        self.placed[parent_index].push_child(entry.id2);
        self.placed.push(child);

        self.graph.add_node(entry.id2);
        self.graph
            .add_edge(parent_id, entry.id2, entry.conn1, entry.conn2)?;
        debug!(parent = parent_id, child = entry.id2, "applied script entry");
        Ok(())
    }

    // =========================================================================
    // Stochastic growth
    // =========================================================================

    /// Grow the assembly by `num` parts through random rule application.
    ///
    /// Each step picks a uniformly random placed part, active connector,
    /// and active rule (or, with `use_catalog`, a weighted part type
    /// first, searching for a matching rule), runs the full constraint
    /// check, and commits on acceptance. A rejected rule is pruned
    /// permanently from its connector; there is no retry. Stalls after
    /// `num * 100` fruitless iterations, on catalog exhaustion, or when
    /// no rule remains available.
    ///
    /// # Errors
    ///
    /// Returns input contract errors (missing catalog, no templates);
    /// exhaustion surfaces as [`Growth::Stalled`].
    pub fn aggregate_rnd(&mut self, num: usize, use_catalog: bool) -> EngineResult<Growth> {
        if self.template_order.is_empty() {
            return Err(EngineError::NoTemplates);
        }
        if use_catalog && self.catalog.is_none() {
            return Err(EngineError::MissingCatalog);
        }

        let mut added = 0usize;
        let mut loops = 0usize;
        while added < num {
            if self.is_cancelled() {
                return Ok(self.stalled(added, num, "aggregation cancelled"));
            }
            loops += 1;
            if loops > num.saturating_mul(OUTER_LOOP_FACTOR) {
                break;
            }

            if self.placed.is_empty() {
                if self.place_first_part(use_catalog, false)? {
                    added += 1;
                } else {
                    return Ok(self.could_not_place(added, num, use_catalog));
                }
                continue;
            }

            let Some(pick) = self.pick_random_rule(use_catalog)? else {
                return Ok(self.could_not_place(added, num, use_catalog));
            };

            let (trans, rejection, aux_sites) = {
                let parent = &self.placed[pick.parent_index];
                let parent_conn = &parent.connectors()[pick.conn_id];
                let child = self.template(pick.rule.part2())?;
                let child_conn =
                    child
                        .connectors()
                        .get(pick.rule.conn2())
                        .ok_or_else(|| EngineError::ConnectorOutOfRange {
                            part: pick.rule.part2().to_string(),
                            index: pick.rule.conn2(),
                        })?;
                let trans = plane_to_plane(child_conn.flip_plane(), parent_conn.plane());
                let outcome = checks::check_all(
                    child,
                    &trans,
                    &self.placed,
                    &self.global_constraints,
                    self.mode,
                    self.coll_check,
                );
                (trans, outcome.rejection, outcome.aux_valid_sites)
            };

            if let Some(rejection) = rejection {
                debug!(
                    ?rejection,
                    parent = pick.parent_id,
                    connector = pick.conn_id,
                    rule = pick.rule_id,
                    "pruned rule after rejection"
                );
                self.placed[pick.parent_index].deactivate_rule(pick.conn_id, pick.rule_id);
            } else {
                if let Some(sites) = aux_sites {
                    if let Some(template) = self.parts.get_mut(pick.rule.part2()) {
                        template.set_aux_valid_sites(sites);
                    }
                }
                let id = self.commit_child(
                    &pick.rule.part2().to_string(),
                    pick.parent_id,
                    &trans,
                    pick.rule.conn1(),
                    pick.rule.conn2(),
                    use_catalog,
                )?;
                debug!(id, part = pick.rule.part2(), "placed part");
                added += 1;
            }
        }

        Ok(self.finish(added, num))
    }

    // =========================================================================
    // Field-guided growth
    // =========================================================================

    /// Grow the assembly by `num` parts following the scalar field.
    ///
    /// Seeds the first part at the field's highest-valued point (filtered
    /// by global constraints in the global-aware modes), then repeatedly
    /// pops the best (or best catalog-matching) queue entry, checks it,
    /// and on acceptance commits and extends the queue with the new
    /// part's own candidates. Rejected entries are discarded without rule
    /// pruning: each queue entry is consumed exactly once.
    ///
    /// # Errors
    ///
    /// Returns input contract errors (missing field or catalog, no
    /// templates); exhaustion surfaces as [`Growth::Stalled`].
    pub fn aggregate_field(&mut self, num: usize, use_catalog: bool) -> EngineResult<Growth> {
        if self.template_order.is_empty() {
            return Err(EngineError::NoTemplates);
        }
        if self.fields.is_empty() {
            return Err(EngineError::MissingField);
        }
        if use_catalog && self.catalog.is_none() {
            return Err(EngineError::MissingCatalog);
        }

        let mut added = 0usize;
        let mut loops = 0usize;
        while added < num {
            if self.is_cancelled() {
                return Ok(self.stalled(added, num, "aggregation cancelled"));
            }
            loops += 1;
            if loops > num.saturating_mul(OUTER_LOOP_FACTOR) {
                break;
            }

            if self.placed.is_empty() && self.prev_num == 0 {
                if self.place_first_part(use_catalog, true)? {
                    added += 1;
                } else {
                    return Ok(self.could_not_place(added, num, use_catalog));
                }
                continue;
            }

            if self.queue.is_empty() {
                return Ok(self.could_not_place(added, num, false));
            }

            let entry_index = if use_catalog {
                match self.find_catalog_entry()? {
                    Some(index) => index,
                    None => return Ok(self.could_not_place(added, num, true)),
                }
            } else {
                self.queue.len() - 1
            };

            let Some((entry, value)) = self.queue.remove(entry_index) else {
                continue;
            };

            let (rejection, aux_sites) = {
                let child = self.template(&entry.part)?;
                let outcome = checks::check_all(
                    child,
                    &entry.transform,
                    &self.placed,
                    &self.global_constraints,
                    self.mode,
                    self.coll_check,
                );
                (outcome.rejection, outcome.aux_valid_sites)
            };

            if let Some(rejection) = rejection {
                debug!(?rejection, part = %entry.part, value, "discarded queue entry");
                continue;
            }

            if let Some(sites) = aux_sites {
                if let Some(template) = self.parts.get_mut(&entry.part) {
                    template.set_aux_valid_sites(sites);
                }
            }
            let id = self.commit_child(
                &entry.part,
                entry.parent,
                &entry.transform,
                entry.conn_on_parent,
                entry.conn_to_parent,
                use_catalog,
            )?;
            debug!(id, part = %entry.part, value, "placed part from queue");
            let index = self.placed.len() - 1;
            self.compute_next_w_field(index)?;
            added += 1;
        }

        Ok(self.finish(added, num))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn template(&self, name: &str) -> EngineResult<&Part> {
        self.parts
            .get(name)
            .ok_or_else(|| EngineError::UnknownTemplate {
                name: name.to_string(),
            })
    }

    fn field_for(&self, part: &Part) -> EngineResult<&ScalarField> {
        if self.fields.is_empty() {
            return Err(EngineError::MissingField);
        }
        if self.fields.len() == 1 {
            return Ok(&self.fields[0]);
        }
        let name = part
            .field_name()
            .ok_or_else(|| EngineError::MissingFieldBinding {
                part: part.name().to_string(),
            })?;
        self.fields
            .iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| EngineError::UnknownField {
                name: name.to_string(),
            })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn next_id(&self) -> u32 {
        self.placed.len() as u32
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn stalled(&self, added: usize, num: usize, reason: &str) -> Growth {
        info!(added, requested = num, reason, "growth stalled");
        Growth::Stalled {
            placed: self.placed.len(),
            remaining: num - added,
            reason: reason.to_string(),
        }
    }

    fn could_not_place(&self, added: usize, num: usize, catalog_exhausted_path: bool) -> Growth {
        let shortfall = num - added;
        let reason = if catalog_exhausted_path
            && self
                .catalog
                .as_ref()
                .is_some_and(|c| c.is_limited() && c.is_empty())
        {
            format!("could not place {shortfall} parts; part catalog is empty")
        } else {
            format!("could not place {shortfall} parts")
        };
        self.stalled(added, num, &reason)
    }

    fn finish(&self, added: usize, num: usize) -> Growth {
        if added >= num {
            Growth::Complete {
                placed: self.placed.len(),
            }
        } else {
            self.could_not_place(added, num, false)
        }
    }

    /// Draw the first part type and commit it as part 0.
    ///
    /// With `use_field_seed` the part is placed at the driving field's
    /// highest-valued point; otherwise at identity.
    fn place_first_part(&mut self, use_catalog: bool, use_field_seed: bool) -> EngineResult<bool> {
        let name = if use_catalog {
            let Some(catalog) = self.catalog.as_ref() else {
                return Err(EngineError::MissingCatalog);
            };
            match catalog.draw_weighted(&mut self.rng) {
                Ok(name) => name.to_string(),
                Err(TypesError::CatalogExhausted) => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        } else {
            let index = self.rng.gen_range(0..self.template_order.len());
            self.template_order[index].clone()
        };

        let mut first = {
            let template = self.template(&name)?;
            let trans = if use_field_seed {
                let field = self.field_for(template)?;
                let start = if self.mode != ConstraintMode::Local
                    && !self.global_constraints.is_empty()
                {
                    match field.highest_point_constrained(&self.global_constraints) {
                        Some(point) => point,
                        None => {
                            warn!(field = field.name(), "no admissible field seed point");
                            return Ok(false);
                        }
                    }
                } else {
                    field.highest_point()
                };
                let base = RefPlane::world_xy(template.center());
                plane_to_plane(&base, &RefPlane::world_xy(start))
            } else {
                Isometry3::identity()
            };
            template.transformed(&trans)
        };

        first.reset(&self.rules);
        first.set_id(0);
        self.placed.push(first);
        self.graph.add_node(0);
        if use_catalog {
            if let Some(catalog) = self.catalog.as_mut() {
                catalog.update(&name, -1)?;
            }
        }
        if use_field_seed {
            self.compute_next_w_field(0)?;
        }
        debug!(part = %name, "seeded assembly");
        Ok(true)
    }

    /// Pick a (placed part, connector, rule) triple at random.
    ///
    /// With a catalog, draws a weighted part type first and keeps
    /// sampling until the drawn rule produces that type, bounded by
    /// [`RULE_MATCH_ATTEMPTS`]. Returns `Ok(None)` when the budget runs
    /// out or the catalog is exhausted.
    fn pick_random_rule(&mut self, use_catalog: bool) -> EngineResult<Option<PickedRule>> {
        for _ in 0..RULE_MATCH_ATTEMPTS {
            let target = if use_catalog {
                let Some(catalog) = self.catalog.as_ref() else {
                    return Err(EngineError::MissingCatalog);
                };
                if catalog.is_limited() && catalog.is_empty() {
                    return Ok(None);
                }
                match catalog.draw_weighted(&mut self.rng) {
                    Ok(name) => Some(name.to_string()),
                    Err(TypesError::CatalogExhausted) => return Ok(None),
                    Err(e) => return Err(e.into()),
                }
            } else {
                None
            };

            let parent_index = self.rng.gen_range(0..self.placed.len());
            let parent = &self.placed[parent_index];
            let Some(parent_id) = parent.id() else {
                continue;
            };
            if parent.active_connections().is_empty() {
                continue;
            }
            let conn_pos = self.rng.gen_range(0..parent.active_connections().len());
            let conn_id = parent.active_connections()[conn_pos];
            let conn = &parent.connectors()[conn_id];
            if conn.active_rules().is_empty() {
                continue;
            }
            let rule_pos = self.rng.gen_range(0..conn.active_rules().len());
            let rule_id = conn.active_rules()[rule_pos];
            let Some(rule) = conn.rule(rule_id) else {
                continue;
            };

            if let Some(target) = target {
                if rule.part2() != target {
                    continue;
                }
            }
            return Ok(Some(PickedRule {
                parent_index,
                parent_id,
                conn_id,
                rule_id,
                rule: rule.clone(),
            }));
        }
        Ok(None)
    }

    /// Scan the queue from the high end for the best entry matching a
    /// catalog-drawn part type.
    fn find_catalog_entry(&mut self) -> EngineResult<Option<usize>> {
        let Some(catalog) = self.catalog.as_ref() else {
            return Err(EngineError::MissingCatalog);
        };
        if catalog.is_limited() && catalog.is_empty() {
            return Ok(None);
        }
        for _ in 0..QUEUE_MATCH_ATTEMPTS {
            let name = match catalog.draw_weighted(&mut self.rng) {
                Ok(name) => name.to_string(),
                Err(TypesError::CatalogExhausted) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            if let Some(position) = self.queue.position_of_best(&name) {
                return Ok(Some(position));
            }
        }
        Ok(None)
    }

    /// The shared commit protocol of the stochastic and field strategies.
    ///
    /// Appends the transformed part with a fresh sequential id, registers
    /// the parent/child links on both sides, records the graph node and
    /// edge, consumes the two connectors, and decrements the catalog when
    /// in use.
    fn commit_child(
        &mut self,
        part_name: &str,
        parent_id: u32,
        trans: &Isometry3<f64>,
        conn_on_parent: usize,
        conn_to_parent: usize,
        use_catalog: bool,
    ) -> EngineResult<u32> {
        let parent_index = self
            .placed
            .iter()
            .position(|p| p.id() == Some(parent_id))
            .ok_or(EngineError::PartNotFound { id: parent_id })?;

        let id = self.next_id();
        let mut child = self.template(part_name)?.transformed(trans);
        child.reset(&self.rules);
        child.deactivate_connection(conn_to_parent);
        child.set_id(id);
        child.set_parent_link(parent_id, conn_on_parent, conn_to_parent);

        self.placed[parent_index].push_child(id);
        self.placed[parent_index].deactivate_connection(conn_on_parent);
        self.placed.push(child);

        self.graph.add_node(id);
        self.graph
            .add_edge(parent_id, id, conn_on_parent, conn_to_parent)?;

        if use_catalog {
            if let Some(catalog) = self.catalog.as_mut() {
                catalog.update(part_name, -1)?;
            }
        }
        Ok(id)
    }

    /// Queue every admissible child candidate of one placed part.
    ///
    /// For each active connector and active rule, the candidate child's
    /// transformed center is tested for containment in its driving
    /// field's volume, sampled there, and inserted at its sorted
    /// position. The driving field is the *child's* binding when multiple
    /// named fields are attached.
    fn compute_next_w_field(&mut self, index: usize) -> EngineResult<()> {
        let mut computed: Vec<(QueueEntry, f64)> = Vec::new();
        {
            let part = &self.placed[index];
            let Some(part_id) = part.id() else {
                return Err(EngineError::CorruptState {
                    reason: format!("placed part at index {index} has no id"),
                });
            };

            for &conn_id in part.active_connections() {
                let conn = &part.connectors()[conn_id];
                for &rule_id in conn.active_rules() {
                    let Some(rule) = conn.rule(rule_id) else {
                        continue;
                    };
                    let child = self.template(rule.part2())?;
                    let child_conn = child.connectors().get(rule.conn2()).ok_or_else(|| {
                        EngineError::ConnectorOutOfRange {
                            part: rule.part2().to_string(),
                            index: rule.conn2(),
                        }
                    })?;
                    let trans = plane_to_plane(child_conn.flip_plane(), conn.plane());
                    let next_center = child.transformed_center(&trans);
                    let field = self.field_for(child)?;
                    if field.bbox().contains(&next_center) {
                        let value = field.sample(&next_center);
                        computed.push((
                            QueueEntry {
                                part: rule.part2().to_string(),
                                parent: part_id,
                                transform: trans,
                                conn_on_parent: rule.conn1(),
                                conn_to_parent: rule.conn2(),
                            },
                            value,
                        ));
                    }
                }
            }
        }

        for (entry, value) in computed {
            self.queue.push(entry, value);
        }
        Ok(())
    }
}

/// A randomly selected (placed part, connector, rule) triple.
struct PickedRule {
    parent_index: usize,
    parent_id: u32,
    conn_id: usize,
    rule_id: usize,
    rule: Rule,
}

/// One parsed script entry of the sequential strategy.
struct ScriptEntry {
    text: String,
    part1: String,
    conn1: usize,
    part2: String,
    conn2: usize,
    id1: u32,
    id2: u32,
}

impl ScriptEntry {
    fn parse(entry: &str) -> EngineResult<Self> {
        let malformed = |reason: &str| EngineError::MalformedScript {
            entry: entry.to_string(),
            reason: reason.to_string(),
        };

        let (rule_text, ids_text) = entry
            .split_once('>')
            .ok_or_else(|| malformed("expected 'part1|conn1_part2|conn2>id1_id2'"))?;

        let (left, right) = rule_text
            .trim()
            .split_once('_')
            .ok_or_else(|| malformed("missing '_' between the two connection halves"))?;
        let (part1, conn1) = left
            .split_once('|')
            .ok_or_else(|| malformed("missing '|' in first half"))?;
        let (part2, conn2) = right
            .split_once('|')
            .ok_or_else(|| malformed("missing '|' in second half"))?;

        let (id1, id2) = ids_text
            .trim()
            .split_once('_')
            .ok_or_else(|| malformed("missing '_' between the two ids"))?;

        Ok(Self {
            text: entry.to_string(),
            part1: part1.trim().to_string(),
            conn1: conn1
                .trim()
                .parse()
                .map_err(|_| malformed("first connector index is not a number"))?,
            part2: part2.trim().to_string(),
            conn2: conn2
                .trim()
                .parse()
                .map_err(|_| malformed("second connector index is not a number"))?,
            id1: id1
                .trim()
                .parse()
                .map_err(|_| malformed("first id is not a number"))?,
            id2: id2
                .trim()
                .parse()
                .map_err(|_| malformed("second id is not a number"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agg_types::{Collider, Connector, Sphere};
    use nalgebra::{Point3, Vector3};

    fn stick(name: &str) -> Part {
        Part::new(name, Point3::origin(), 0.5)
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

    fn three_part_run() -> Aggregation {
        let parts = vec![stick("p1"), stick("p2"), stick("p3")];
        let rules = RuleSet::parse(&["p1|1_p2|0", "p2|1_p3|0"]).unwrap();
        Aggregation::new("seq", parts, rules, ConstraintMode::Local)
    }

    #[test]
    fn sequence_script_places_three_parts() {
        let mut run = three_part_run();
        run.aggregate_sequence(&["p1|0_p2|0>0_1", "1|0_p3|0>1_2"])
            .unwrap();

        assert_eq!(run.placed_parts().len(), 3);
        let ids: Vec<_> = run.placed_parts().iter().filter_map(Part::id).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        let part2 = run.part_by_id(2).unwrap();
        assert_eq!(part2.parent(), Some(1));

        assert_eq!(run.graph().edges(), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn sequence_unknown_parent_id_errors() {
        let mut run = three_part_run();
        run.aggregate_sequence(&["p1|0_p2|0>0_1"]).unwrap();

        let result = run.aggregate_sequence(&["9|0_p3|0>9_2"]);
        assert!(matches!(result, Err(EngineError::PartNotFound { id: 9 })));
        // Earlier entries stay committed.
        assert_eq!(run.placed_parts().len(), 2);
    }

    #[test]
    fn sequence_malformed_entry_errors() {
        let mut run = three_part_run();
        assert!(matches!(
            run.aggregate_sequence(&["p1|0_p2|0"]),
            Err(EngineError::MalformedScript { .. })
        ));
        assert!(matches!(
            run.aggregate_sequence(&["p1|x_p2|0>0_1"]),
            Err(EngineError::MalformedScript { .. })
        ));
    }

    #[test]
    fn sequence_duplicate_id_errors() {
        let mut run = three_part_run();
        run.aggregate_sequence(&["p1|0_p2|0>0_1"]).unwrap();
        let result = run.aggregate_sequence(&["1|0_p3|0>1_1"]);
        assert!(matches!(result, Err(EngineError::MalformedScript { .. })));
    }

    #[test]
    fn rnd_growth_is_seed_deterministic() {
        let build = || {
            let rules = RuleSet::parse(&["stick|1_stick|0"]).unwrap();
            Aggregation::new(
                "det",
                vec![stick("stick")],
                rules,
                ConstraintMode::Local,
            )
            .with_seed(7)
        };

        let mut a = build();
        let mut b = build();
        a.aggregate_rnd(6, false).unwrap();
        b.aggregate_rnd(6, false).unwrap();

        let centers = |run: &Aggregation| -> Vec<(String, Point3<f64>)> {
            run.placed_parts()
                .iter()
                .map(|p| (p.name().to_string(), p.center()))
                .collect()
        };
        assert_eq!(centers(&a), centers(&b));
    }

    #[test]
    fn rnd_without_catalog_errors_when_requested() {
        let rules = RuleSet::parse(&["stick|1_stick|0"]).unwrap();
        let mut run =
            Aggregation::new("x", vec![stick("stick")], rules, ConstraintMode::Local);
        assert!(matches!(
            run.aggregate_rnd(2, true),
            Err(EngineError::MissingCatalog)
        ));
    }

    #[test]
    fn cancel_token_stalls_growth() {
        let rules = RuleSet::parse(&["stick|1_stick|0"]).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let mut run = Aggregation::new("c", vec![stick("stick")], rules, ConstraintMode::Local)
            .with_cancel_token(token);

        match run.aggregate_rnd(5, false).unwrap() {
            Growth::Stalled { reason, .. } => assert!(reason.contains("cancelled")),
            Growth::Complete { .. } => panic!("cancelled run must stall"),
        }
    }

    #[test]
    fn rollback_restores_connections_and_graph() {
        let rules = RuleSet::parse(&["stick|1_stick|0"]).unwrap();
        let mut run = Aggregation::new(
            "rb",
            vec![stick("stick")],
            rules,
            ConstraintMode::Local,
        )
        .with_seed(3);

        run.aggregate_rnd(6, false).unwrap();
        assert_eq!(run.placed_parts().len(), 6);
        assert_eq!(run.graph().node_count(), 6);

        run.remove_elements(3).unwrap();
        assert_eq!(run.placed_parts().len(), 3);
        assert_eq!(run.graph().node_count(), 3);
        assert_eq!(run.graph().edge_count(), 2);

        // Remaining parts have their full rule-derived active state back.
        for part in run.placed_parts() {
            assert_eq!(part.active_connections(), &[1]);
        }
        // Stale child ids are gone.
        for part in run.placed_parts() {
            assert!(part.children().iter().all(|&c| c < 3));
        }
    }

    #[test]
    fn blocked_connections_reported() {
        // Colliders thick enough to reach the shared connector origin.
        let fat = |name: &str| {
            Part::new(name, Point3::origin(), 0.6)
                .with_collider(Collider::from_sphere(Sphere::new(Point3::origin(), 0.52)))
                .with_connector(Connector::new(
                    RefPlane::new(Point3::new(-0.5, 0.0, 0.0), Vector3::z(), Vector3::y())
                        .unwrap(),
                    "end",
                ))
                .with_connector(Connector::new(
                    RefPlane::new(Point3::new(0.5, 0.0, 0.0), Vector3::y(), Vector3::z())
                        .unwrap(),
                    "end",
                ))
        };
        let rules = RuleSet::parse(&["p1|1_p2|0"]).unwrap();
        let mut run = Aggregation::new(
            "blocked",
            vec![fat("p1"), fat("p2")],
            rules,
            ConstraintMode::Local,
        );
        run.aggregate_sequence(&["p1|0_p2|0>0_1"]).unwrap();

        // Part 0's connector 0 hosts part 1, whose collider reaches the
        // connector origin; connector 1 points away and stays open.
        let open = run.check_blocked_connections(0).unwrap();
        assert_eq!(open, vec![1]);
    }

    #[test]
    fn possible_children_respect_active_rules() {
        let rules = RuleSet::parse(&["stick|1_stick|0"]).unwrap();
        let mut run = Aggregation::new(
            "pc",
            vec![stick("stick")],
            rules,
            ConstraintMode::Local,
        )
        .with_seed(1);
        run.aggregate_rnd(1, false).unwrap();

        let children = run.compute_possible_children(0, 1, true).unwrap();
        assert_eq!(children.len(), 1);
        assert!((children[0].center().x - 1.0).abs() < 1e-9);

        // Connector 0 has no rules, hence no candidates.
        let none = run.compute_possible_children(0, 0, true).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn add_custom_part_links_and_records_edge() {
        let rules = RuleSet::parse(&["stick|1_stick|0"]).unwrap();
        let mut run = Aggregation::new(
            "cp",
            vec![stick("stick")],
            rules,
            ConstraintMode::Local,
        )
        .with_seed(1);
        run.aggregate_rnd(1, false).unwrap();

        let child = stick("stick").transformed(&Isometry3::translation(1.0, 0.0, 0.0));
        let id = run.add_custom_part(0, 1, 0, child).unwrap();

        assert_eq!(id, 1);
        assert_eq!(run.part_by_id(1).unwrap().parent(), Some(0));
        assert_eq!(run.graph().edges(), vec![(0, 1)]);
        // The parent connector is consumed.
        assert!(!run.part_by_id(0).unwrap().active_connections().contains(&1));
    }

    #[test]
    fn script_entry_parsing() {
        let entry = ScriptEntry::parse("p1|0_p2|3>4_7").unwrap();
        assert_eq!(entry.part1, "p1");
        assert_eq!(entry.conn1, 0);
        assert_eq!(entry.part2, "p2");
        assert_eq!(entry.conn2, 3);
        assert_eq!(entry.id1, 4);
        assert_eq!(entry.id2, 7);

        assert!(ScriptEntry::parse("nonsense").is_err());
        assert!(ScriptEntry::parse("p1|0_p2|3>4").is_err());
    }
}
