//! Parts: the discrete building blocks of an aggregation.

use nalgebra::{Isometry3, Point3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::collider::Collider;
use crate::connector::Connector;
use crate::constraint::PartConstraints;
use crate::rule::RuleSet;

/// A discrete placeable building block.
///
/// The same type serves as the part-type *template* (no id, no parent) and
/// as a *placed instance* inside an assembly. A placed instance is created
/// by transforming a template with a rigid transform and letting the
/// engine assign identity and parent links.
///
/// Parent and children are stored as bare ids, resolved through the
/// engine's canonical placed-parts list at read time. Rollback invalidates
/// list positions, so no live references are ever cached.
///
/// # Example
///
/// ```
/// use agg_types::{Collider, Connector, Part, RefPlane, Sphere};
/// use nalgebra::{Isometry3, Point3, Vector3};
///
/// let template = Part::new("cube", Point3::origin(), 0.5)
///     .with_collider(Collider::from_sphere(Sphere::new(Point3::origin(), 0.45)))
///     .with_connector(Connector::new(
///         RefPlane::new(Point3::new(0.5, 0.0, 0.0), Vector3::y(), Vector3::z()).unwrap(),
///         "face",
///     ));
///
/// let placed = template.transformed(&Isometry3::translation(2.0, 0.0, 0.0));
/// assert!((placed.center().x - 2.0).abs() < 1e-12);
/// assert!((placed.connectors()[0].plane().origin().x - 2.5).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Part {
    name: String,
    id: Option<u32>,
    center: Point3<f64>,
    dim: f64,
    connectors: Vec<Connector>,
    active_connections: Vec<usize>,
    collider: Collider,
    constraints: Option<PartConstraints>,
    field: Option<String>,
    parent: Option<u32>,
    children: Vec<u32>,
    conn_on_parent: Option<usize>,
    conn_to_parent: Option<usize>,
}

impl Part {
    /// Create a part template.
    ///
    /// `dim` is the bounding radius used for broad-phase collision
    /// filtering: two parts are possible colliders when their centers are
    /// closer than the sum of their `dim` values.
    #[must_use]
    pub fn new(name: impl Into<String>, center: Point3<f64>, dim: f64) -> Self {
        Self {
            name: name.into(),
            id: None,
            center,
            dim,
            connectors: Vec::new(),
            active_connections: Vec::new(),
            collider: Collider::default(),
            constraints: None,
            field: None,
            parent: None,
            children: Vec::new(),
            conn_on_parent: None,
            conn_to_parent: None,
        }
    }

    /// Set the collider (builder pattern).
    #[must_use]
    pub fn with_collider(mut self, collider: Collider) -> Self {
        self.collider = collider;
        self
    }

    /// Add a connector (builder pattern).
    ///
    /// The new connector starts active.
    #[must_use]
    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connectors.push(connector);
        self.active_connections.push(self.connectors.len() - 1);
        self
    }

    /// Attach the constraint bundle (builder pattern).
    #[must_use]
    pub fn with_constraints(mut self, constraints: PartConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Bind the part to a named scalar field (builder pattern).
    ///
    /// In field-guided growth with multiple named fields, candidates for
    /// this part type are scored by this field, regardless of which field
    /// drives the parent.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The part-type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The instance id, if placed.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    /// The part center.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        self.center
    }

    /// The bounding radius.
    #[must_use]
    pub fn dim(&self) -> f64 {
        self.dim
    }

    /// All connectors.
    #[must_use]
    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    /// Indices of connectors not yet consumed or deactivated.
    #[must_use]
    pub fn active_connections(&self) -> &[usize] {
        &self.active_connections
    }

    /// The solid collider.
    #[must_use]
    pub fn collider(&self) -> &Collider {
        &self.collider
    }

    /// The constraint bundle, if any.
    #[must_use]
    pub fn constraints(&self) -> Option<&PartConstraints> {
        self.constraints.as_ref()
    }

    /// Whether the part declares any local constraint.
    #[must_use]
    pub fn is_constrained(&self) -> bool {
        self.constraints.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// The bound field name, if any.
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// The parent instance id, if any.
    #[must_use]
    pub fn parent(&self) -> Option<u32> {
        self.parent
    }

    /// Ids of child instances.
    #[must_use]
    pub fn children(&self) -> &[u32] {
        &self.children
    }

    /// The parent-side connector of the joining connection.
    #[must_use]
    pub fn conn_on_parent(&self) -> Option<usize> {
        self.conn_on_parent
    }

    /// The own connector consumed by the joining connection.
    #[must_use]
    pub fn conn_to_parent(&self) -> Option<usize> {
        self.conn_to_parent
    }

    // =========================================================================
    // Placement bookkeeping
    // =========================================================================

    /// Assign the instance id.
    pub fn set_id(&mut self, id: u32) {
        self.id = Some(id);
    }

    /// Record the joining connection to the parent.
    pub fn set_parent_link(&mut self, parent: u32, conn_on_parent: usize, conn_to_parent: usize) {
        self.parent = Some(parent);
        self.conn_on_parent = Some(conn_on_parent);
        self.conn_to_parent = Some(conn_to_parent);
    }

    /// Register a child instance id.
    pub fn push_child(&mut self, child: u32) {
        self.children.push(child);
    }

    /// Drop child ids not satisfying the predicate.
    ///
    /// Used by rollback to clear links to removed parts.
    pub fn retain_children(&mut self, keep: impl Fn(u32) -> bool) {
        self.children.retain(|&c| keep(c));
    }

    /// Remove a connector from the active set.
    ///
    /// Returns `true` if the connector was active.
    pub fn deactivate_connection(&mut self, conn_id: usize) -> bool {
        if let Some(pos) = self.active_connections.iter().position(|&c| c == conn_id) {
            self.active_connections.remove(pos);
            true
        } else {
            false
        }
    }

    /// Permanently prune one rule from a connector's active set.
    ///
    /// When the connector's last rule goes, the connector itself is
    /// deactivated. Returns `true` in that case.
    pub fn deactivate_rule(&mut self, conn_id: usize, rule_id: usize) -> bool {
        if let Some(conn) = self.connectors.get_mut(conn_id) {
            conn.deactivate_rule(rule_id);
            if !conn.has_active_rules() {
                self.deactivate_connection(conn_id);
                return true;
            }
        }
        false
    }

    /// Overwrite the fabrication collider's valid connection sites.
    ///
    /// No-op for parts without a fabrication collider.
    pub fn set_aux_valid_sites(&mut self, sites: Vec<usize>) {
        if let Some(aux) = self
            .constraints
            .as_mut()
            .and_then(|c| c.aux_collider.as_mut())
        {
            aux.valid_sites = sites;
        }
    }

    /// Reset the part against a rule set.
    ///
    /// Regenerates every connector's rule table, reactivates every
    /// connector that has at least one applicable rule, and restores the
    /// fabrication collider's valid sites. Parent/child links are kept.
    pub fn reset(&mut self, rules: &RuleSet) {
        let name = self.name.clone();
        for (i, conn) in self.connectors.iter_mut().enumerate() {
            conn.generate_rules_table(rules, &name, i);
        }
        self.active_connections = self
            .connectors
            .iter()
            .enumerate()
            .filter(|(_, c)| c.has_active_rules())
            .map(|(i, _)| i)
            .collect();
        if let Some(aux) = self
            .constraints
            .as_mut()
            .and_then(|c| c.aux_collider.as_mut())
        {
            aux.reset_valid_sites();
        }
    }

    // =========================================================================
    // Transformation
    // =========================================================================

    /// Create a placed copy of this part under a rigid transform.
    ///
    /// Geometry (center, connectors, collider, constraints) is
    /// transformed; rule tables and the active sets are carried over;
    /// identity and parent links are cleared for the engine to assign.
    #[must_use]
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self {
            name: self.name.clone(),
            id: None,
            center: iso.transform_point(&self.center),
            dim: self.dim,
            connectors: self.connectors.iter().map(|c| c.transformed(iso)).collect(),
            active_connections: self.active_connections.clone(),
            collider: self.collider.transformed(iso),
            constraints: self.constraints.as_ref().map(|c| c.transformed(iso)),
            field: self.field.clone(),
            parent: None,
            children: Vec::new(),
            conn_on_parent: None,
            conn_to_parent: None,
        }
    }

    /// The part center under a candidate transform, without building the
    /// whole placed copy.
    #[must_use]
    pub fn transformed_center(&self, iso: &Isometry3<f64>) -> Point3<f64> {
        iso.transform_point(&self.center)
    }

    /// The collider under a candidate transform, without building the
    /// whole placed copy.
    #[must_use]
    pub fn transformed_collider(&self, iso: &Isometry3<f64>) -> Collider {
        self.collider.transformed(iso)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collider::{Segment, Sphere};
    use crate::constraint::SupportConstraint;
    use crate::plane::RefPlane;
    use crate::rule::RuleSet;
    use nalgebra::Vector3;

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

    #[test]
    fn reset_activates_connectors_with_rules() {
        let mut part = stick();
        let rules = RuleSet::parse(&["stick|1_stick|0"]).unwrap();
        part.reset(&rules);

        // Only connector 1 accepts anything under this rule set.
        assert_eq!(part.active_connections(), &[1]);
        assert!(part.connectors()[1].has_active_rules());
        assert!(!part.connectors()[0].has_active_rules());
    }

    #[test]
    fn deactivate_rule_cascades_to_connector() {
        let mut part = stick();
        let rules = RuleSet::parse(&["stick|1_stick|0", "stick|1_stick|1"]).unwrap();
        part.reset(&rules);

        assert!(!part.deactivate_rule(1, 0));
        assert_eq!(part.active_connections(), &[1]);
        assert!(part.deactivate_rule(1, 1));
        assert!(part.active_connections().is_empty());
    }

    #[test]
    fn reset_undoes_pruning() {
        let mut part = stick();
        let rules = RuleSet::parse(&["stick|1_stick|0"]).unwrap();
        part.reset(&rules);
        part.deactivate_rule(1, 0);
        assert!(part.active_connections().is_empty());

        part.reset(&rules);
        assert_eq!(part.active_connections(), &[1]);
    }

    #[test]
    fn transformed_moves_geometry_and_clears_identity() {
        let mut part = stick();
        part.set_id(7);
        part.set_parent_link(3, 0, 1);

        let moved = part.transformed(&Isometry3::translation(0.0, 2.0, 0.0));
        assert!((moved.center().y - 2.0).abs() < 1e-12);
        assert!((moved.collider().spheres()[0].center.y - 2.0).abs() < 1e-12);
        assert!(moved.id().is_none());
        assert!(moved.parent().is_none());
        assert!(moved.conn_to_parent().is_none());
    }

    #[test]
    fn constraints_transform_with_part() {
        let support = SupportConstraint::new(vec![Segment::new(
            Point3::origin(),
            Point3::new(0.0, 0.0, -1.0),
        )]);
        let part = stick().with_constraints(PartConstraints {
            supports: vec![support],
            ..PartConstraints::default()
        });
        assert!(part.is_constrained());

        let moved = part.transformed(&Isometry3::translation(1.0, 0.0, 0.0));
        let sup = &moved.constraints().unwrap().supports[0];
        assert!((sup.directions[0].start.x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_constraint_bundle_is_not_constrained() {
        let part = stick().with_constraints(PartConstraints::default());
        assert!(!part.is_constrained());
    }
}
