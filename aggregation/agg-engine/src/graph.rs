//! The connection graph of a growing assembly.

use std::collections::BTreeMap;

use agg_types::{GLOBAL_TOLERANCE, Part};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Metadata of one directed connection between two placed parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Source (parent-side) node id.
    pub start: u32,
    /// Target (child-side) node id.
    pub end: u32,
    /// Connector index on the source part.
    pub conn_start: usize,
    /// Connector index on the target part.
    pub conn_end: usize,
}

/// Parent/child adjacency of the assembly, with per-edge connector
/// metadata.
///
/// The engine layers a tree over this graph by construction: every placed
/// part except the first receives exactly one incoming edge, added by its
/// designated parent at commit time. The graph itself does not police
/// that invariant; violating it is a caller bug surfaced (at best) as a
/// [`GraphError::DuplicateEdge`].
///
/// Node iteration follows insertion order, as do the edges of each node.
///
/// # Example
///
/// ```
/// use agg_engine::ConnectionGraph;
///
/// let mut graph = ConnectionGraph::new();
/// graph.add_node(0);
/// graph.add_node(1);
/// graph.add_edge(0, 1, 2, 0).unwrap();
///
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.edges(), vec![(0, 1)]);
/// assert_eq!(graph.edge(0, 1).unwrap().conn_start, 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    order: Vec<u32>,
    adjacency: HashMap<u32, Vec<Edge>>,
}

impl ConnectionGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Adding an existing node is a no-op.
    pub fn add_node(&mut self, id: u32) {
        if !self.adjacency.contains_key(&id) {
            self.order.push(id);
            self.adjacency.insert(id, Vec::new());
        }
    }

    /// Whether a node is present.
    #[must_use]
    pub fn contains_node(&self, id: u32) -> bool {
        self.adjacency.contains_key(&id)
    }

    /// Record a directed edge with its connector-pair metadata.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if either endpoint is missing
    /// and [`GraphError::DuplicateEdge`] if the edge already exists.
    pub fn add_edge(
        &mut self,
        start: u32,
        end: u32,
        conn_start: usize,
        conn_end: usize,
    ) -> Result<(), GraphError> {
        if !self.adjacency.contains_key(&start) {
            return Err(GraphError::NodeNotFound { id: start });
        }
        if !self.adjacency.contains_key(&end) {
            return Err(GraphError::NodeNotFound { id: end });
        }
        let edges = self
            .adjacency
            .get_mut(&start)
            .ok_or(GraphError::NodeNotFound { id: start })?;
        if edges.iter().any(|e| e.end == end) {
            return Err(GraphError::DuplicateEdge { start, end });
        }
        edges.push(Edge {
            start,
            end,
            conn_start,
            conn_end,
        });
        Ok(())
    }

    /// Remove a node and every edge touching it.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if the node is absent.
    pub fn remove_node(&mut self, id: u32) -> Result<(), GraphError> {
        if self.adjacency.remove(&id).is_none() {
            return Err(GraphError::NodeNotFound { id });
        }
        self.order.retain(|&n| n != id);
        for edges in self.adjacency.values_mut() {
            edges.retain(|e| e.end != id);
        }
        Ok(())
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    /// Node ids in insertion order.
    #[must_use]
    pub fn nodes(&self) -> Vec<u32> {
        self.order.clone()
    }

    /// All edges as `(start, end)` pairs, flat, in node insertion order.
    #[must_use]
    pub fn edges(&self) -> Vec<(u32, u32)> {
        self.order
            .iter()
            .flat_map(|id| {
                self.adjacency
                    .get(id)
                    .into_iter()
                    .flatten()
                    .map(|e| (e.start, e.end))
            })
            .collect()
    }

    /// All edges grouped per source node, in node insertion order.
    #[must_use]
    pub fn edges_grouped(&self) -> Vec<Vec<(u32, u32)>> {
        self.order
            .iter()
            .map(|id| {
                self.adjacency
                    .get(id)
                    .into_iter()
                    .flatten()
                    .map(|e| (e.start, e.end))
                    .collect()
            })
            .collect()
    }

    /// Edge metadata flat, in node insertion order.
    #[must_use]
    pub fn edges_with_attributes(&self) -> Vec<&Edge> {
        self.order
            .iter()
            .flat_map(|id| self.adjacency.get(id).into_iter().flatten())
            .collect()
    }

    /// Look up the metadata of one edge.
    #[must_use]
    pub fn edge(&self, start: u32, end: u32) -> Option<&Edge> {
        self.adjacency
            .get(&start)
            .and_then(|edges| edges.iter().find(|e| e.end == end))
    }

    /// Serialize to the node → neighbour → edge-metadata mapping.
    ///
    /// `BTreeMap` keeps the output deterministic.
    #[must_use]
    pub fn to_data(&self) -> BTreeMap<u32, BTreeMap<u32, Edge>> {
        self.adjacency
            .iter()
            .map(|(&id, edges)| (id, edges.iter().map(|e| (e.end, *e)).collect()))
            .collect()
    }

    /// Rebuild a graph from the serialized mapping.
    ///
    /// Node order follows ascending id, which matches insertion order for
    /// engine-assigned sequential ids.
    #[must_use]
    pub fn from_data(data: &BTreeMap<u32, BTreeMap<u32, Edge>>) -> Self {
        let mut graph = Self::new();
        for &id in data.keys() {
            graph.add_node(id);
        }
        for (&id, edges) in data {
            for edge in edges.values() {
                if let Some(list) = graph.adjacency.get_mut(&id) {
                    list.push(*edge);
                }
            }
        }
        graph
    }

    /// Reconstruct adjacency from placed parts by connector coincidence.
    ///
    /// Two parts are linked when a connector origin of one sits within
    /// [`GLOBAL_TOLERANCE`] of a connector origin of the other; the broad
    /// phase skips pairs whose centers are farther apart than the sum of
    /// their bounding radii plus the tolerance. Both directions are
    /// recorded, matching the neighbour semantics of a reconstructed
    /// graph rather than the grown tree.
    #[must_use]
    pub fn from_assembly(parts: &[Part]) -> Self {
        let mut graph = Self::new();
        for part in parts {
            if let Some(id) = part.id() {
                graph.add_node(id);
            }
        }

        for part in parts {
            let Some(id) = part.id() else { continue };
            for other in parts {
                let Some(other_id) = other.id() else { continue };
                if other_id == id {
                    continue;
                }
                let center_dist = (other.center() - part.center()).norm();
                if center_dist >= part.dim() + other.dim() + GLOBAL_TOLERANCE {
                    continue;
                }
                for (ci, conn) in part.connectors().iter().enumerate() {
                    for (cj, other_conn) in other.connectors().iter().enumerate() {
                        let dist =
                            (other_conn.plane().origin() - conn.plane().origin()).norm();
                        if dist < GLOBAL_TOLERANCE && graph.edge(id, other_id).is_none() {
                            if let Some(edges) = graph.adjacency.get_mut(&id) {
                                edges.push(Edge {
                                    start: id,
                                    end: other_id,
                                    conn_start: ci,
                                    conn_end: cj,
                                });
                            }
                        }
                    }
                }
            }
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> ConnectionGraph {
        let mut graph = ConnectionGraph::new();
        graph.add_node(0);
        graph.add_node(1);
        graph.add_node(2);
        graph.add_edge(0, 1, 0, 1).unwrap();
        graph.add_edge(1, 2, 1, 0).unwrap();
        graph
    }

    #[test]
    fn add_node_is_idempotent() {
        let mut graph = ConnectionGraph::new();
        graph.add_node(5);
        graph.add_node(5);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn add_edge_requires_nodes() {
        let mut graph = ConnectionGraph::new();
        graph.add_node(0);
        assert_eq!(
            graph.add_edge(0, 1, 0, 0),
            Err(GraphError::NodeNotFound { id: 1 })
        );
    }

    #[test]
    fn duplicate_edge_rejected() {
        let mut graph = triangle();
        assert_eq!(
            graph.add_edge(0, 1, 0, 0),
            Err(GraphError::DuplicateEdge { start: 0, end: 1 })
        );
    }

    #[test]
    fn remove_node_cascades_to_edges() {
        let mut graph = triangle();
        graph.remove_node(1).unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.edge(0, 1).is_none());
    }

    #[test]
    fn remove_missing_node_errors() {
        let mut graph = ConnectionGraph::new();
        assert_eq!(graph.remove_node(9), Err(GraphError::NodeNotFound { id: 9 }));
    }

    #[test]
    fn edges_follow_insertion_order() {
        let graph = triangle();
        assert_eq!(graph.nodes(), vec![0, 1, 2]);
        assert_eq!(graph.edges(), vec![(0, 1), (1, 2)]);
        assert_eq!(
            graph.edges_grouped(),
            vec![vec![(0, 1)], vec![(1, 2)], vec![]]
        );
    }

    #[test]
    fn data_roundtrip_preserves_everything() {
        let graph = triangle();
        let data = graph.to_data();
        let rebuilt = ConnectionGraph::from_data(&data);

        assert_eq!(rebuilt.nodes(), graph.nodes());
        assert_eq!(rebuilt.edges(), graph.edges());
        assert_eq!(rebuilt.edge(0, 1), graph.edge(0, 1));
        assert_eq!(rebuilt.edge(1, 2), graph.edge(1, 2));
    }
}
