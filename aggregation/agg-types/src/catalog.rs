//! Weighted, optionally limited supply of part types.

use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{TypesError, TypesResult};

/// A supply of part types with per-type remaining counts.
///
/// Counts double as draw weights: [`draw_weighted`](Self::draw_weighted)
/// picks a type with probability proportional to its remaining count,
/// never yielding an exhausted type. A *limited* catalog additionally
/// gates growth: the engine stops placing parts once it is empty. An
/// unlimited catalog keeps the same counts-as-weights behavior but is
/// never treated as a stopping condition.
///
/// Entries keep their insertion order, so draws are reproducible under a
/// fixed RNG seed.
///
/// # Example
///
/// ```
/// use agg_types::PartCatalog;
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
///
/// let mut catalog = PartCatalog::limited(vec![("brick".into(), 2), ("beam".into(), 0)]);
/// let mut rng = ChaCha8Rng::seed_from_u64(7);
///
/// // "beam" is exhausted and can never be drawn.
/// assert_eq!(catalog.draw_weighted(&mut rng).unwrap(), "brick");
/// catalog.update("brick", -1).unwrap();
/// catalog.update("brick", -1).unwrap();
/// assert!(catalog.is_empty());
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartCatalog {
    entries: Vec<CatalogEntry>,
    limited: bool,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct CatalogEntry {
    name: String,
    remaining: u32,
}

impl PartCatalog {
    /// Create a limited catalog from `(name, count)` pairs.
    #[must_use]
    pub fn limited(entries: Vec<(String, u32)>) -> Self {
        Self::build(entries, true)
    }

    /// Create an unlimited catalog: counts act as weights only.
    #[must_use]
    pub fn unlimited(entries: Vec<(String, u32)>) -> Self {
        Self::build(entries, false)
    }

    fn build(entries: Vec<(String, u32)>, limited: bool) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, remaining)| CatalogEntry { name, remaining })
                .collect(),
            limited,
        }
    }

    /// Whether the catalog gates growth when it runs out.
    #[must_use]
    pub fn is_limited(&self) -> bool {
        self.limited
    }

    /// Whether every entry is exhausted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.remaining == 0)
    }

    /// The remaining count for a part type.
    #[must_use]
    pub fn remaining(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.remaining)
    }

    /// Sum of all remaining counts.
    #[must_use]
    pub fn total_remaining(&self) -> u32 {
        self.entries.iter().map(|e| e.remaining).sum()
    }

    /// Iterate over `(name, remaining)` pairs in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|e| (e.name.as_str(), e.remaining))
    }

    /// Draw a part-type name with probability proportional to its
    /// remaining count, excluding exhausted types.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::CatalogExhausted`] when every entry is at
    /// zero.
    pub fn draw_weighted<R: Rng + ?Sized>(&self, rng: &mut R) -> TypesResult<&str> {
        let total = self.total_remaining();
        if total == 0 {
            return Err(TypesError::CatalogExhausted);
        }
        let mut ticket = rng.gen_range(0..total);
        for entry in &self.entries {
            if ticket < entry.remaining {
                return Ok(&entry.name);
            }
            ticket -= entry.remaining;
        }
        // Unreachable: tickets are bounded by the total.
        Err(TypesError::CatalogExhausted)
    }

    /// Adjust the remaining count of a part type.
    ///
    /// The engine decrements on placement and increments on rollback.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::UnknownCatalogEntry`] for unknown names and
    /// [`TypesError::CatalogUnderflow`] when the count would go below
    /// zero.
    pub fn update(&mut self, name: &str, delta: i32) -> TypesResult<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| TypesError::UnknownCatalogEntry {
                name: name.to_string(),
            })?;

        let updated = i64::from(entry.remaining) + i64::from(delta);
        if updated < 0 {
            return Err(TypesError::CatalogUnderflow {
                name: name.to_string(),
            });
        }
        entry.remaining = u32::try_from(updated).unwrap_or(u32::MAX);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn exhausted_types_never_drawn() {
        let catalog = PartCatalog::limited(vec![("a".into(), 2), ("b".into(), 0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        for _ in 0..100 {
            assert_eq!(catalog.draw_weighted(&mut rng).unwrap(), "a");
        }
    }

    #[test]
    fn empty_catalog_draw_fails() {
        let catalog = PartCatalog::limited(vec![("a".into(), 0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(
            catalog.draw_weighted(&mut rng),
            Err(TypesError::CatalogExhausted)
        ));
    }

    #[test]
    fn draw_respects_weights() {
        let catalog = PartCatalog::unlimited(vec![("rare".into(), 1), ("common".into(), 99)]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let mut common = 0;
        for _ in 0..1000 {
            if catalog.draw_weighted(&mut rng).unwrap() == "common" {
                common += 1;
            }
        }
        // 99:1 weighting; anything near the expectation is fine.
        assert!(common > 950);
    }

    #[test]
    fn update_and_exhaustion() {
        let mut catalog = PartCatalog::limited(vec![("a".into(), 2)]);
        assert!(!catalog.is_empty());

        catalog.update("a", -1).unwrap();
        catalog.update("a", -1).unwrap();
        assert!(catalog.is_empty());

        catalog.update("a", 1).unwrap();
        assert_eq!(catalog.remaining("a"), Some(1));
    }

    #[test]
    fn underflow_and_unknown_entries_error() {
        let mut catalog = PartCatalog::limited(vec![("a".into(), 0)]);
        assert!(matches!(
            catalog.update("a", -1),
            Err(TypesError::CatalogUnderflow { .. })
        ));
        assert!(matches!(
            catalog.update("ghost", 1),
            Err(TypesError::UnknownCatalogEntry { .. })
        ));
    }

    #[test]
    fn seeded_draws_are_reproducible() {
        let catalog = PartCatalog::unlimited(vec![("a".into(), 3), ("b".into(), 5)]);

        let draws = |seed: u64| -> Vec<String> {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..20)
                .map(|_| catalog.draw_weighted(&mut rng).unwrap().to_string())
                .collect()
        };

        assert_eq!(draws(9), draws(9));
    }
}
