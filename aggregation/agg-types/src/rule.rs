//! Connection compatibility rules.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{TypesError, TypesResult};

/// A directed connection compatibility declaration.
///
/// `part1|conn1 → part2|conn2`: connector `conn1` on an instance of
/// `part1` may accept an instance of `part2` attached through its
/// connector `conn2`. Rules are directional; the reverse connection needs
/// its own rule.
///
/// # Example
///
/// ```
/// use agg_types::Rule;
///
/// let rule: Rule = "stick|1_stick|0".parse().unwrap();
/// assert_eq!(rule.part1(), "stick");
/// assert_eq!(rule.conn2(), 0);
/// assert_eq!(rule.to_string(), "stick|1_stick|0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rule {
    part1: String,
    conn1: usize,
    part2: String,
    conn2: usize,
}

impl Rule {
    /// Create a new rule.
    #[must_use]
    pub fn new(
        part1: impl Into<String>,
        conn1: usize,
        part2: impl Into<String>,
        conn2: usize,
    ) -> Self {
        Self {
            part1: part1.into(),
            conn1,
            part2: part2.into(),
            conn2,
        }
    }

    /// The accepting part type.
    #[must_use]
    pub fn part1(&self) -> &str {
        &self.part1
    }

    /// The accepting connector index on `part1`.
    #[must_use]
    pub fn conn1(&self) -> usize {
        self.conn1
    }

    /// The incoming part type.
    #[must_use]
    pub fn part2(&self) -> &str {
        &self.part2
    }

    /// The mating connector index on `part2`.
    #[must_use]
    pub fn conn2(&self) -> usize {
        self.conn2
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}_{}|{}",
            self.part1, self.conn1, self.part2, self.conn2
        )
    }
}

impl FromStr for Rule {
    type Err = TypesError;

    fn from_str(s: &str) -> TypesResult<Self> {
        let malformed = |reason: &str| TypesError::MalformedRule {
            rule: s.to_string(),
            reason: reason.to_string(),
        };

        let (left, right) = s
            .split_once('_')
            .ok_or_else(|| malformed("expected 'part1|conn1_part2|conn2'"))?;
        let (part1, conn1) = left
            .split_once('|')
            .ok_or_else(|| malformed("missing '|' in first half"))?;
        let (part2, conn2) = right
            .split_once('|')
            .ok_or_else(|| malformed("missing '|' in second half"))?;
        if part1.is_empty() || part2.is_empty() {
            return Err(malformed("empty part name"));
        }
        let conn1 = conn1
            .parse::<usize>()
            .map_err(|_| malformed("first connector index is not a number"))?;
        let conn2 = conn2
            .parse::<usize>()
            .map_err(|_| malformed("second connector index is not a number"))?;

        Ok(Self::new(part1, conn1, part2, conn2))
    }
}

/// An immutable, ordered set of rules.
///
/// Rule identity within a set is positional: connectors store indices into
/// their own per-connector rule tables, which are regenerated from the
/// active rule set by [`crate::Part::reset`]. Changing the active rule set
/// therefore forces every part (template or placed) to regenerate its
/// tables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Create a rule set from a list of rules, preserving order.
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Parse a rule set from rule strings.
    ///
    /// # Errors
    ///
    /// Returns the first [`TypesError::MalformedRule`] encountered.
    pub fn parse<S: AsRef<str>>(rules: &[S]) -> TypesResult<Self> {
        let rules = rules
            .iter()
            .map(|s| s.as_ref().parse())
            .collect::<TypesResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// The rules, in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of rules in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over the rules.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// The rules accepting new parts on `connector` of part type `part`.
    #[must_use]
    pub fn rules_for(&self, part: &str, connector: usize) -> Vec<Rule> {
        self.rules
            .iter()
            .filter(|r| r.part1 == part && r.conn1 == connector)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_roundtrips_through_text() {
        let rule = Rule::new("hexa", 3, "cube", 0);
        let parsed: Rule = rule.to_string().parse().unwrap();
        assert_eq!(parsed, rule);
    }

    #[test]
    fn malformed_rules_rejected() {
        assert!("stick".parse::<Rule>().is_err());
        assert!("stick|x_stick|0".parse::<Rule>().is_err());
        assert!("|0_stick|1".parse::<Rule>().is_err());
        assert!("stick|0_stick".parse::<Rule>().is_err());
    }

    #[test]
    fn rules_for_filters_by_part_and_connector() {
        let set = RuleSet::parse(&["a|0_b|0", "a|1_b|0", "a|0_c|2", "b|0_a|0"]).unwrap();

        let on_a0 = set.rules_for("a", 0);
        assert_eq!(on_a0.len(), 2);
        assert_eq!(on_a0[0].part2(), "b");
        assert_eq!(on_a0[1].part2(), "c");

        assert!(set.rules_for("c", 0).is_empty());
    }
}
