//! The field-guided aggregation queue.

use agg_types::Isometry3;

/// One not-yet-placed candidate: a part type oriented against a specific
/// connector of a specific placed parent.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// The part-type name of the candidate child.
    pub part: String,
    /// The id of the placed parent part.
    pub parent: u32,
    /// The rigid transform orienting the child template into place.
    pub transform: Isometry3<f64>,
    /// The parent-side connector of the candidate connection.
    pub conn_on_parent: usize,
    /// The child-side connector of the candidate connection.
    pub conn_to_parent: usize,
}

/// Candidate placements ordered by field value.
///
/// Entries are kept sorted ascending by their scalar key through sorted
/// insertion. Ties are stable: an entry inserted later goes *after*
/// existing equal-valued entries, so oldest-inserted-first order holds
/// among equal keys. The engine consumes from the high end.
///
/// # Example
///
/// ```
/// use agg_engine::{AggregationQueue, QueueEntry};
/// use nalgebra::Isometry3;
///
/// let entry = |part: &str| QueueEntry {
///     part: part.into(),
///     parent: 0,
///     transform: Isometry3::identity(),
///     conn_on_parent: 0,
///     conn_to_parent: 0,
/// };
///
/// let mut queue = AggregationQueue::new();
/// queue.push(entry("low"), 5.0);
/// queue.push(entry("high"), 10.0);
///
/// let (best, value) = queue.pop_best().unwrap();
/// assert_eq!(best.part, "high");
/// assert!((value - 10.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AggregationQueue {
    entries: Vec<QueueEntry>,
    values: Vec<f64>,
}

impl AggregationQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The sorted keys, ascending. Mostly useful for diagnostics.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Insert a candidate at its sorted position.
    ///
    /// Equal-valued entries keep their relative insertion order.
    pub fn push(&mut self, entry: QueueEntry, value: f64) {
        let index = self.values.partition_point(|&v| v <= value);
        self.values.insert(index, value);
        self.entries.insert(index, entry);
    }

    /// Remove and return the candidate with the greatest key.
    pub fn pop_best(&mut self) -> Option<(QueueEntry, f64)> {
        let entry = self.entries.pop()?;
        let value = self.values.pop()?;
        Some((entry, value))
    }

    /// Index (from the bottom) of the best candidate of a given part
    /// type, scanning from the high end.
    #[must_use]
    pub fn position_of_best(&self, part: &str) -> Option<usize> {
        self.entries.iter().rposition(|e| e.part == part)
    }

    /// Remove a candidate by index.
    ///
    /// Returns `None` when the index is out of range.
    pub fn remove(&mut self, index: usize) -> Option<(QueueEntry, f64)> {
        if index >= self.entries.len() {
            return None;
        }
        let entry = self.entries.remove(index);
        let value = self.values.remove(index);
        Some((entry, value))
    }

    /// Drop every queued candidate.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.values.clear();
    }

    /// Iterate entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&QueueEntry, f64)> {
        self.entries.iter().zip(self.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(part: &str) -> QueueEntry {
        QueueEntry {
            part: part.into(),
            parent: 0,
            transform: Isometry3::identity(),
            conn_on_parent: 0,
            conn_to_parent: 0,
        }
    }

    #[test]
    fn pops_in_non_increasing_order() {
        let mut queue = AggregationQueue::new();
        for (name, value) in [("a", 3.0), ("b", 7.0), ("c", 1.0), ("d", 5.0)] {
            queue.push(entry(name), value);
        }

        let mut last = f64::INFINITY;
        while let Some((_, value)) = queue.pop_best() {
            assert!(value <= last);
            last = value;
        }
    }

    #[test]
    fn best_of_two_is_greater_value() {
        // Parts A (value 10 at its candidate) and B (value 5): the next
        // pick must be A's candidate.
        let mut queue = AggregationQueue::new();
        queue.push(entry("b"), 5.0);
        queue.push(entry("a"), 10.0);

        let (best, _) = queue.pop_best().unwrap();
        assert_eq!(best.part, "a");
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let mut queue = AggregationQueue::new();
        queue.push(entry("first"), 2.0);
        queue.push(entry("second"), 2.0);
        queue.push(entry("third"), 2.0);

        let order: Vec<_> = queue.iter().map(|(e, _)| e.part.clone()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn position_of_best_scans_from_high_end() {
        let mut queue = AggregationQueue::new();
        queue.push(entry("x"), 1.0);
        queue.push(entry("y"), 2.0);
        queue.push(entry("x"), 3.0);
        queue.push(entry("y"), 4.0);

        let pos = queue.position_of_best("x").unwrap();
        let (found, value) = queue.remove(pos).unwrap();
        assert_eq!(found.part, "x");
        assert!((value - 3.0).abs() < 1e-12);
    }

    #[test]
    fn remove_out_of_range_is_none() {
        let mut queue = AggregationQueue::new();
        assert!(queue.remove(0).is_none());
    }
}
