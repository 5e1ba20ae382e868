//! In-memory credibility graph with dual-indexing.
//!
//! Uses `petgraph` for the graph structure and `DashMap` for fast lookups
//! of node records and petgraph indices by [`NodeId`].

use std::sync::RwLock;

use dashmap::DashMap;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::GraphError;

use super::{Edge, ExpandDirection, Node, NodeId, unix_now};

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Edge attributes stored on petgraph edges.
#[derive(Debug, Clone)]
struct EdgeAttrs {
    weight: f64,
    kind: String,
    created_at: u64,
}

/// In-memory credibility graph backed by petgraph with dual-indexing.
///
/// Node records (weights, props, flags) live in a concurrent map; the
/// petgraph structure carries topology and edge attributes. Reads tolerate
/// snapshot-level inconsistency under concurrent writes — traversal results
/// are advisory rankings, not commitments.
pub struct CredibilityGraph {
    /// The directed graph: nodes are NodeIds, edges carry weight and kind.
    graph: RwLock<DiGraph<NodeId, EdgeAttrs>>,
    /// NodeId → NodeIndex mapping for O(1) topology lookups.
    node_index: DashMap<NodeId, NodeIndex>,
    /// NodeId → full node record.
    records: DashMap<NodeId, Node>,
    /// Edge count.
    edge_count: std::sync::atomic::AtomicUsize,
}

impl CredibilityGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: DashMap::new(),
            records: DashMap::new(),
            edge_count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Ensure a topology node exists for the given id, returning its NodeIndex.
    fn ensure_index(&self, id: NodeId) -> NodeIndex {
        if let Some(idx) = self.node_index.get(&id) {
            return *idx.value();
        }
        let mut graph = self.graph.write().expect("graph lock poisoned");
        // Double-check after acquiring write lock
        if let Some(idx) = self.node_index.get(&id) {
            return *idx.value();
        }
        let idx = graph.add_node(id);
        self.node_index.insert(id, idx);
        idx
    }

    /// Insert or replace a node record.
    pub fn insert_node(&self, node: Node) {
        self.ensure_index(node.id);
        self.records.insert(node.id, node);
    }

    /// Insert an edge between two existing nodes.
    ///
    /// Both endpoints must already have node records; the edge weight must
    /// lie in [0.0, 1.0].
    pub fn insert_edge(&self, edge: &Edge) -> GraphResult<()> {
        if !(0.0..=1.0).contains(&edge.weight) {
            return Err(GraphError::InvalidWeight {
                weight: edge.weight,
            });
        }
        if !self.records.contains_key(&edge.source) {
            return Err(GraphError::NodeNotFound {
                node_id: edge.source.get(),
            });
        }
        if !self.records.contains_key(&edge.target) {
            return Err(GraphError::NodeNotFound {
                node_id: edge.target.get(),
            });
        }

        let src_idx = self.ensure_index(edge.source);
        let dst_idx = self.ensure_index(edge.target);

        {
            let mut graph = self.graph.write().expect("graph lock poisoned");
            graph.add_edge(
                src_idx,
                dst_idx,
                EdgeAttrs {
                    weight: edge.weight,
                    kind: edge.kind.clone(),
                    created_at: edge.created_at,
                },
            );
        }

        self.edge_count
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }

    /// Get a clone of a node record.
    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    /// Get a node record or a not-found error.
    pub fn require_node(&self, id: NodeId) -> GraphResult<Node> {
        self.node(id)
            .ok_or(GraphError::NodeNotFound { node_id: id.get() })
    }

    /// Check if a node exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.records.contains_key(&id)
    }

    /// Mutate a node record in place, returning the closure's result.
    ///
    /// The record entry is held for the duration of the closure; callers
    /// performing multi-step read-modify-write transactions serialize via
    /// the store's per-node lock table first.
    pub fn update_node<R>(
        &self,
        id: NodeId,
        f: impl FnOnce(&mut Node) -> R,
    ) -> GraphResult<R> {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or(GraphError::NodeNotFound { node_id: id.get() })?;
        let node = entry.value_mut();
        let result = f(node);
        node.updated_at = unix_now();
        Ok(result)
    }

    /// Edges adjacent to a node in the given expansion direction.
    ///
    /// Each returned [`Edge`] keeps its own stored orientation; for
    /// `Incoming` the node appears as `edge.target`.
    pub fn adjacent(&self, id: NodeId, direction: ExpandDirection) -> Vec<Edge> {
        let graph = self.graph.read().expect("graph lock poisoned");
        let idx = match self.node_index.get(&id) {
            Some(idx) => *idx.value(),
            None => return vec![],
        };

        let mut edges = Vec::new();
        if matches!(direction, ExpandDirection::Outgoing | ExpandDirection::Both) {
            for e in graph.edges_directed(idx, Direction::Outgoing) {
                if let Some(&target) = graph.node_weight(e.target()) {
                    edges.push(Edge {
                        source: id,
                        target,
                        weight: e.weight().weight,
                        kind: e.weight().kind.clone(),
                        created_at: e.weight().created_at,
                    });
                }
            }
        }
        if matches!(direction, ExpandDirection::Incoming | ExpandDirection::Both) {
            for e in graph.edges_directed(idx, Direction::Incoming) {
                if let Some(&source) = graph.node_weight(e.source()) {
                    edges.push(Edge {
                        source,
                        target: id,
                        weight: e.weight().weight,
                        kind: e.weight().kind.clone(),
                        created_at: e.weight().created_at,
                    });
                }
            }
        }
        edges
    }

    /// Outgoing edges from a node.
    pub fn edges_from(&self, id: NodeId) -> Vec<Edge> {
        self.adjacent(id, ExpandDirection::Outgoing)
    }

    /// Incoming edges to a node.
    pub fn edges_to(&self, id: NodeId) -> Vec<Edge> {
        self.adjacent(id, ExpandDirection::Incoming)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.records.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// All node ids (snapshot — not a consistent view under concurrent writes).
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.records.iter().map(|e| *e.key()).collect()
    }
}

impl Default for CredibilityGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CredibilityGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredibilityGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}
