//! Attachment sites on parts.

use nalgebra::Isometry3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::plane::RefPlane;
use crate::rule::{Rule, RuleSet};

/// A typed attachment site on a part.
///
/// Each connector carries a reference plane (the frame a child part mates
/// against), a type tag, and a per-connector rule table: the subset of the
/// active rule set that accepts new parts through this connector, plus the
/// indices of those rules still usable (`active_rules`). Rules are pruned
/// from the active set when the engine proves they can never succeed at
/// this site.
///
/// # Example
///
/// ```
/// use agg_types::{Connector, RefPlane, Rule, RuleSet};
/// use nalgebra::{Point3, Vector3};
///
/// let plane = RefPlane::new(Point3::new(0.5, 0.0, 0.0), Vector3::y(), Vector3::z()).unwrap();
/// let mut conn = Connector::new(plane, "end");
///
/// let rules = RuleSet::parse(&["stick|0_stick|1", "stick|0_cube|0"]).unwrap();
/// conn.generate_rules_table(&rules, "stick", 0);
/// assert_eq!(conn.rules_table().len(), 2);
/// assert_eq!(conn.active_rules(), &[0, 1]);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Connector {
    plane: RefPlane,
    flip_plane: RefPlane,
    tag: String,
    rules_table: Vec<Rule>,
    active_rules: Vec<usize>,
}

impl Connector {
    /// Create a connector on the given reference plane.
    ///
    /// The mating (flipped) plane is derived from `plane`.
    #[must_use]
    pub fn new(plane: RefPlane, tag: impl Into<String>) -> Self {
        Self {
            plane,
            flip_plane: plane.flipped(),
            tag: tag.into(),
            rules_table: Vec::new(),
            active_rules: Vec::new(),
        }
    }

    /// The connector's reference plane.
    #[must_use]
    pub fn plane(&self) -> &RefPlane {
        &self.plane
    }

    /// The mating frame: same origin, y and z negated.
    #[must_use]
    pub fn flip_plane(&self) -> &RefPlane {
        &self.flip_plane
    }

    /// The connector type tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The connector's rule table for the current rule set.
    #[must_use]
    pub fn rules_table(&self) -> &[Rule] {
        &self.rules_table
    }

    /// Indices into the rule table still usable at this site.
    #[must_use]
    pub fn active_rules(&self) -> &[usize] {
        &self.active_rules
    }

    /// Look up a rule in the table by index.
    #[must_use]
    pub fn rule(&self, rule_id: usize) -> Option<&Rule> {
        self.rules_table.get(rule_id)
    }

    /// Whether any rule is still active at this site.
    #[must_use]
    pub fn has_active_rules(&self) -> bool {
        !self.active_rules.is_empty()
    }

    /// Regenerate the rule table from a rule set.
    ///
    /// Rebuilds `rules_table` with every rule accepting parts through this
    /// connector (`part` / `index` identify the owning site) and
    /// reactivates all of them.
    pub fn generate_rules_table(&mut self, rules: &RuleSet, part: &str, index: usize) {
        self.rules_table = rules.rules_for(part, index);
        self.active_rules = (0..self.rules_table.len()).collect();
    }

    /// Permanently remove a rule from the active set.
    ///
    /// Returns `true` if the rule was active. The rule stays in the table;
    /// only a [`generate_rules_table`](Self::generate_rules_table) call
    /// reactivates it.
    pub fn deactivate_rule(&mut self, rule_id: usize) -> bool {
        if let Some(pos) = self.active_rules.iter().position(|&r| r == rule_id) {
            self.active_rules.remove(pos);
            true
        } else {
            false
        }
    }

    /// Apply a rigid transform to the connector planes.
    ///
    /// The rule table is carried over unchanged.
    #[must_use]
    pub fn transformed(&self, iso: &Isometry3<f64>) -> Self {
        Self {
            plane: self.plane.transformed(iso),
            flip_plane: self.flip_plane.transformed(iso),
            tag: self.tag.clone(),
            rules_table: self.rules_table.clone(),
            active_rules: self.active_rules.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    fn test_connector() -> Connector {
        let plane =
            RefPlane::new(Point3::new(0.5, 0.0, 0.0), Vector3::y(), Vector3::z()).unwrap();
        Connector::new(plane, "end")
    }

    #[test]
    fn rules_table_generation() {
        let mut conn = test_connector();
        let rules = RuleSet::parse(&["a|0_b|0", "a|1_b|0", "b|0_a|0"]).unwrap();

        conn.generate_rules_table(&rules, "a", 0);
        assert_eq!(conn.rules_table().len(), 1);
        assert_eq!(conn.active_rules(), &[0]);

        conn.generate_rules_table(&rules, "c", 0);
        assert!(conn.rules_table().is_empty());
        assert!(!conn.has_active_rules());
    }

    #[test]
    fn deactivate_rule_is_permanent_until_regenerated() {
        let mut conn = test_connector();
        let rules = RuleSet::parse(&["a|0_b|0", "a|0_c|0"]).unwrap();
        conn.generate_rules_table(&rules, "a", 0);

        assert!(conn.deactivate_rule(0));
        assert!(!conn.deactivate_rule(0));
        assert_eq!(conn.active_rules(), &[1]);
        assert_eq!(conn.rules_table().len(), 2);

        conn.generate_rules_table(&rules, "a", 0);
        assert_eq!(conn.active_rules(), &[0, 1]);
    }

    #[test]
    fn flip_plane_follows_transform() {
        let conn = test_connector();
        let iso = Isometry3::translation(1.0, 0.0, 0.0);
        let moved = conn.transformed(&iso);

        assert!((moved.plane().origin().x - 1.5).abs() < 1e-12);
        assert!((moved.flip_plane().origin().x - 1.5).abs() < 1e-12);
    }
}
