//! Credibility-weighted traversal: pathfinding, bounded expansion, ancestry,
//! and relevance ranking.
//!
//! All operations take a minimum edge-credibility floor and an explicit
//! [`TraversalBudget`]. Accumulated path weight is always the *product* of
//! edge weights. Cycles and exhausted budgets are normal termination
//! conditions, never errors; an unreachable target is a negative result
//! (`Ok(None)`), not a failure.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::index::{CredibilityGraph, GraphResult};
use super::{Edge, ExpandDirection, NodeId};
use crate::error::GraphError;

/// Per-hop relevance decay applied during subgraph expansion.
const RELEVANCE_DECAY: f64 = 0.85;

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Mandatory bounds for a traversal.
///
/// Budgets are the sole cancellation/backpressure mechanism: there is no
/// timeout inside the engine. A zero bound would silently mean "unbounded",
/// so construction rejects it as an invalid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalBudget {
    /// Maximum hop depth (for `find_path`, the maximum total path length).
    pub max_depth: usize,
    /// Maximum unique nodes to collect (or paths, for full-path expansion).
    pub max_nodes: usize,
}

impl TraversalBudget {
    /// Create a budget, rejecting zero bounds.
    pub fn new(max_depth: usize, max_nodes: usize) -> GraphResult<Self> {
        if max_depth == 0 {
            return Err(GraphError::InvalidBudget {
                message: "max_depth must be at least 1".into(),
            });
        }
        if max_nodes == 0 {
            return Err(GraphError::InvalidBudget {
                message: "max_nodes must be at least 1".into(),
            });
        }
        Ok(Self {
            max_depth,
            max_nodes,
        })
    }
}

// ---------------------------------------------------------------------------
// Pathfinding (bidirectional BFS)
// ---------------------------------------------------------------------------

/// A directed path between two nodes with its compound credibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    /// Node ids from source to target, inclusive.
    pub nodes: Vec<NodeId>,
    /// Number of edges in the path.
    pub hops: usize,
    /// Product of the edge weights along the path.
    pub weight: f64,
}

/// Best-known path from one search frontier to a node.
#[derive(Debug, Clone)]
struct FrontierPath {
    /// Nodes from the frontier's origin to this node, inclusive.
    path: Vec<NodeId>,
    /// Product of edge weights along `path`.
    weight: f64,
}

impl FrontierPath {
    fn hops(&self) -> usize {
        self.path.len() - 1
    }
}

/// Find a directed path from `source` to `target` using bidirectional BFS.
///
/// Both frontiers only follow edges with `weight >= min_weight`. Cycle
/// prevention is a path-membership check, not a global visited set: the same
/// node may legitimately appear in both frontiers before they meet. Among all
/// meeting points the search selects the one minimizing total hop count,
/// breaking ties by maximizing the product of edge weights along the
/// reconstructed path.
///
/// Returns `Ok(None)` when no meeting point exists within `budget.max_depth`
/// total hops — a negative result, not an error.
pub fn find_path(
    graph: &CredibilityGraph,
    source: NodeId,
    target: NodeId,
    budget: TraversalBudget,
    min_weight: f64,
) -> GraphResult<Option<PathResult>> {
    graph.require_node(source)?;
    graph.require_node(target)?;

    if source == target {
        return Ok(Some(PathResult {
            nodes: vec![source],
            hops: 0,
            weight: 1.0,
        }));
    }

    // Best-known path per node, per frontier. BFS level order guarantees the
    // first recorded depth is minimal; equal-depth rediscoveries keep the
    // higher product.
    let mut forward: HashMap<NodeId, FrontierPath> = HashMap::new();
    let mut backward: HashMap<NodeId, FrontierPath> = HashMap::new();
    forward.insert(
        source,
        FrontierPath {
            path: vec![source],
            weight: 1.0,
        },
    );
    backward.insert(
        target,
        FrontierPath {
            path: vec![target],
            weight: 1.0,
        },
    );

    let mut forward_frontier = vec![source];
    let mut backward_frontier = vec![target];
    let mut forward_depth = 0usize;
    let mut backward_depth = 0usize;

    while forward_depth + backward_depth < budget.max_depth
        && (!forward_frontier.is_empty() || !backward_frontier.is_empty())
    {
        // Expand the smaller non-empty frontier.
        let expand_forward = if forward_frontier.is_empty() {
            false
        } else if backward_frontier.is_empty() {
            true
        } else {
            forward_frontier.len() <= backward_frontier.len()
        };

        if expand_forward {
            forward_frontier =
                expand_level(graph, &forward_frontier, &mut forward, true, min_weight);
            forward_depth += 1;
        } else {
            backward_frontier =
                expand_level(graph, &backward_frontier, &mut backward, false, min_weight);
            backward_depth += 1;
        }

        if let Some(result) = best_meeting(&forward, &backward, budget.max_depth) {
            return Ok(Some(result));
        }
    }

    Ok(None)
}

/// Expand one BFS level of a frontier, returning the next frontier.
///
/// `outgoing` selects the edge direction: the forward frontier follows edges
/// source→target, the backward frontier walks them in reverse.
fn expand_level(
    graph: &CredibilityGraph,
    frontier: &[NodeId],
    discovered: &mut HashMap<NodeId, FrontierPath>,
    outgoing: bool,
    min_weight: f64,
) -> Vec<NodeId> {
    let mut next = Vec::new();

    for &node in frontier {
        let Some(current) = discovered.get(&node).cloned() else {
            continue;
        };
        let edges = if outgoing {
            graph.edges_from(node)
        } else {
            graph.edges_to(node)
        };

        for edge in edges {
            if edge.weight < min_weight {
                continue;
            }
            let neighbor = if outgoing { edge.target } else { edge.source };

            // Cycle prevention: never revisit a node already on this path.
            if current.path.contains(&neighbor) {
                continue;
            }

            let mut path = current.path.clone();
            path.push(neighbor);
            let candidate = FrontierPath {
                path,
                weight: current.weight * edge.weight,
            };

            match discovered.get(&neighbor) {
                None => {
                    discovered.insert(neighbor, candidate);
                    next.push(neighbor);
                }
                Some(existing) => {
                    // Same-level rediscovery: keep the higher product.
                    if existing.hops() == candidate.hops() && candidate.weight > existing.weight
                    {
                        discovered.insert(neighbor, candidate);
                    }
                }
            }
        }
    }

    next
}

/// Select the best meeting point currently visible from both frontiers.
///
/// Minimizes total hop count, then maximizes the compound weight. Candidates
/// whose two halves share any node besides the meeting point are skipped
/// (the joined walk would repeat a node).
fn best_meeting(
    forward: &HashMap<NodeId, FrontierPath>,
    backward: &HashMap<NodeId, FrontierPath>,
    max_depth: usize,
) -> Option<PathResult> {
    let mut best: Option<(usize, f64, &FrontierPath, &FrontierPath)> = None;

    for (meet, fwd) in forward {
        let Some(bwd) = backward.get(meet) else {
            continue;
        };
        let hops = fwd.hops() + bwd.hops();
        if hops > max_depth {
            continue;
        }
        let disjoint = fwd
            .path
            .iter()
            .all(|n| n == meet || !bwd.path.contains(n));
        if !disjoint {
            continue;
        }
        let weight = fwd.weight * bwd.weight;
        let better = match &best {
            None => true,
            Some((best_hops, best_weight, _, _)) => {
                hops < *best_hops || (hops == *best_hops && weight > *best_weight)
            }
        };
        if better {
            best = Some((hops, weight, fwd, bwd));
        }
    }

    best.map(|(hops, weight, fwd, bwd)| {
        // Join source→meet with meet→target. The backward path is stored
        // target-first and ends at the meet node, so walking it in reverse
        // (minus the meet itself) continues the path out to the target.
        let mut nodes = fwd.path.clone();
        nodes.extend(bwd.path.iter().rev().skip(1).copied());
        PathResult {
            nodes,
            hops,
            weight,
        }
    })
}

// ---------------------------------------------------------------------------
// Bounded subgraph expansion
// ---------------------------------------------------------------------------

/// A node retained in an expanded subgraph, with its best accumulated relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphNode {
    pub id: NodeId,
    /// Product of edge weights along the best path, decayed 0.85 per hop.
    pub relevance: f64,
    /// Hop depth of the best occurrence.
    pub depth: usize,
}

/// Result of a bounded subgraph expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgraphResult {
    /// Retained nodes sorted by descending relevance, ties by shallower depth.
    pub nodes: Vec<SubgraphNode>,
    /// Edges whose endpoints are both retained and whose weight meets the floor.
    pub edges: Vec<Edge>,
    /// Maximum depth actually reached.
    pub depth_reached: usize,
    /// True when expansion stopped because `max_nodes` was hit.
    pub truncated: bool,
}

/// Expand outward from `center`, applying a 0.85 per-hop relevance decay
/// multiplied into the accumulated path weight.
///
/// When the same node is reached via multiple paths only the occurrence with
/// the highest accumulated relevance is kept (ties broken by shallower
/// depth). Expansion stops once `budget.max_nodes` unique nodes have been
/// collected — backpressure, not an error.
pub fn subgraph(
    graph: &CredibilityGraph,
    center: NodeId,
    direction: ExpandDirection,
    budget: TraversalBudget,
    min_weight: f64,
) -> GraphResult<SubgraphResult> {
    graph.require_node(center)?;

    // Best (relevance, depth) per collected node.
    let mut best: HashMap<NodeId, (f64, usize)> = HashMap::new();
    best.insert(center, (1.0, 0));

    let mut depth_reached = 0usize;
    let mut truncated = false;

    // Queue entries carry their own path for cycle prevention.
    let mut queue: VecDeque<(NodeId, f64, Vec<NodeId>)> = VecDeque::new();
    queue.push_back((center, 1.0, vec![center]));

    'expand: while let Some((node, relevance, path)) = queue.pop_front() {
        let depth = path.len() - 1;
        if depth >= budget.max_depth {
            continue;
        }

        for edge in graph.adjacent(node, direction) {
            if edge.weight < min_weight {
                continue;
            }
            let neighbor = if edge.source == node {
                edge.target
            } else {
                edge.source
            };
            if path.contains(&neighbor) {
                continue;
            }

            let next_relevance = relevance * edge.weight * RELEVANCE_DECAY;
            let next_depth = depth + 1;

            let improved = match best.get(&neighbor) {
                None => {
                    if best.len() >= budget.max_nodes {
                        truncated = true;
                        break 'expand;
                    }
                    true
                }
                Some(&(existing_rel, existing_depth)) => {
                    next_relevance > existing_rel
                        || (next_relevance == existing_rel && next_depth < existing_depth)
                }
            };
            if !improved {
                continue;
            }

            best.insert(neighbor, (next_relevance, next_depth));
            depth_reached = depth_reached.max(next_depth);

            let mut next_path = path.clone();
            next_path.push(neighbor);
            queue.push_back((neighbor, next_relevance, next_path));
        }
    }

    let mut nodes: Vec<SubgraphNode> = best
        .into_iter()
        .map(|(id, (relevance, depth))| SubgraphNode {
            id,
            relevance,
            depth,
        })
        .collect();
    nodes.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.depth.cmp(&b.depth))
            .then(a.id.cmp(&b.id))
    });

    // Edges: exactly those with both endpoints retained and weight at or
    // above the floor.
    let retained: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
    let mut edges = Vec::new();
    for n in &nodes {
        for edge in graph.edges_from(n.id) {
            if edge.weight >= min_weight && retained.contains(&edge.target) {
                edges.push(edge);
            }
        }
    }

    Ok(SubgraphResult {
        nodes,
        edges,
        depth_reached,
        truncated,
    })
}

// ---------------------------------------------------------------------------
// Single-kind full-path expansion
// ---------------------------------------------------------------------------

/// One qualifying evidence chain discovered by [`related_by_kind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedPath {
    /// Node ids from the start node to the path's end, inclusive.
    pub nodes: Vec<NodeId>,
    /// Product of edge weights along the path.
    pub weight: f64,
    /// Number of edges in the path.
    pub depth: usize,
}

/// Expand undirected from `start`, restricted to a single edge kind,
/// accumulating *every* discovered path (not just the best per node) —
/// callers need the full set of qualifying evidence chains.
///
/// Paths are sorted by descending weight, then ascending depth. Collection
/// stops once `budget.max_nodes` paths have been gathered (backpressure).
pub fn related_by_kind(
    graph: &CredibilityGraph,
    start: NodeId,
    edge_kind: &str,
    budget: TraversalBudget,
    min_weight: f64,
) -> GraphResult<Vec<RelatedPath>> {
    graph.require_node(start)?;

    let mut paths = Vec::new();
    let mut queue: VecDeque<(Vec<NodeId>, f64)> = VecDeque::new();
    queue.push_back((vec![start], 1.0));

    'expand: while let Some((path, weight)) = queue.pop_front() {
        let depth = path.len() - 1;
        if depth >= budget.max_depth {
            continue;
        }
        let node = *path.last().expect("path never empty");

        // Undirected: either endpoint may be the frontier node.
        for edge in graph.adjacent(node, ExpandDirection::Both) {
            if edge.kind != edge_kind || edge.weight < min_weight {
                continue;
            }
            let neighbor = if edge.source == node {
                edge.target
            } else {
                edge.source
            };
            if path.contains(&neighbor) {
                continue;
            }

            let mut next_path = path.clone();
            next_path.push(neighbor);
            let next_weight = weight * edge.weight;

            paths.push(RelatedPath {
                nodes: next_path.clone(),
                weight: next_weight,
                depth: depth + 1,
            });
            if paths.len() >= budget.max_nodes {
                break 'expand;
            }
            queue.push_back((next_path, next_weight));
        }
    }

    paths.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.depth.cmp(&b.depth))
    });
    Ok(paths)
}

// ---------------------------------------------------------------------------
// Ancestry
// ---------------------------------------------------------------------------

/// Resolve the primary-source ancestor chain of a node, ordered root-first;
/// the requested node is the final element.
///
/// Terminates on a node with no parent, on exceeding `max_depth` followed
/// links, or on detecting a repeated node id (a cycle is treated as chain
/// truncation, not a fatal error). A dangling parent reference also ends the
/// chain.
pub fn ancestors(
    graph: &CredibilityGraph,
    node: NodeId,
    max_depth: usize,
) -> GraphResult<Vec<NodeId>> {
    if max_depth == 0 {
        return Err(GraphError::InvalidBudget {
            message: "max_depth must be at least 1".into(),
        });
    }
    let mut current = graph.require_node(node)?;

    let mut chain = vec![node];
    while chain.len() <= max_depth {
        let Some(parent_id) = current.primary_source_id else {
            break;
        };
        if chain.contains(&parent_id) {
            break; // cycle: truncate
        }
        let Some(parent) = graph.node(parent_id) else {
            break; // dangling reference: chain ends
        };
        chain.push(parent_id);
        current = parent;
    }

    chain.reverse();
    Ok(chain)
}

// ---------------------------------------------------------------------------
// One-hop veracity ranking
// ---------------------------------------------------------------------------

/// A one-hop neighbor ranked by combined node and edge credibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedNeighbor {
    pub id: NodeId,
    /// The neighbor node's veracity weight.
    pub node_weight: f64,
    /// The best connecting edge's weight.
    pub edge_weight: f64,
    /// `node_weight * edge_weight`.
    pub score: f64,
}

/// One-hop neighbors in either direction, ranked by `node_weight *
/// edge_weight` descending and filtered to `node_weight >= min_weight`.
///
/// A neighbor connected by several edges keeps its best-scoring occurrence.
pub fn high_veracity_neighbors(
    graph: &CredibilityGraph,
    node: NodeId,
    limit: usize,
    min_weight: f64,
) -> GraphResult<Vec<RankedNeighbor>> {
    graph.require_node(node)?;

    let mut best: HashMap<NodeId, RankedNeighbor> = HashMap::new();
    for edge in graph.adjacent(node, ExpandDirection::Both) {
        let neighbor = if edge.source == node {
            edge.target
        } else {
            edge.source
        };
        if neighbor == node {
            continue; // self-loop
        }
        let Some(record) = graph.node(neighbor) else {
            continue;
        };
        if record.weight < min_weight {
            continue;
        }
        let score = record.weight * edge.weight;
        let entry = best.entry(neighbor).or_insert(RankedNeighbor {
            id: neighbor,
            node_weight: record.weight,
            edge_weight: edge.weight,
            score,
        });
        if score > entry.score {
            entry.edge_weight = edge.weight;
            entry.score = score;
        }
    }

    let mut ranked: Vec<RankedNeighbor> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    ranked.truncate(limit);
    Ok(ranked)
}
