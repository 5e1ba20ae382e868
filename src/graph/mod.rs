//! Credibility-weighted graph: nodes and edges carrying [0,1] weights.
//!
//! The graph stores knowledge nodes connected by typed, weighted edges.
//!
//! - **Node weight** is the node's veracity score; it is frozen at 0.0 or 1.0
//!   once the node is promoted into the verified layer (`is_level0`).
//! - **Edge weight** is a credibility multiplier along that relation:
//!   accumulated path weight is the *product* of constituent edge weights,
//!   never a sum or average. A path is only as trustworthy as its
//!   weakest-and-compounding links.

pub mod index;
pub mod traverse;

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

/// Unique, niche-optimized identifier for a graph node.
///
/// Uses `NonZeroU64` so that `Option<NodeId>` is the same size as `NodeId`
/// (the niche optimization lets the compiler use 0 as the `None` discriminant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(NonZeroU64);

impl NodeId {
    /// Create a `NodeId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(NodeId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Structured, amendable content of a node.
///
/// `title` and `content` are the two top-level named fields the amendment
/// pipeline can rewrite directly; everything else lives in `extra`, a nested
/// JSON map addressed by validated segment paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeProps {
    /// Short human-readable title.
    pub title: String,
    /// Main body content.
    pub content: String,
    /// Arbitrary nested structured fields.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A knowledge node with a continuous credibility weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier.
    pub id: NodeId,
    /// Veracity weight in [0.0, 1.0].
    pub weight: f64,
    /// Immutable-truth flag. Irreversible once true: the node has been
    /// promoted out of ongoing debate and its weight is fixed at 0.0 or 1.0.
    pub is_level0: bool,
    /// Inquiry category the node belongs to; selects its methodology
    /// workflow and default thresholds. Empty when uncategorized.
    pub category: String,
    /// Structured content fields.
    pub props: NodeProps,
    /// Back-reference to the node this one was derived from, used for
    /// ancestry resolution.
    pub primary_source_id: Option<NodeId>,
    /// Creation time (seconds since UNIX epoch).
    pub created_at: u64,
    /// Last modification time (seconds since UNIX epoch).
    pub updated_at: u64,
    /// When the last amendment was applied, if any.
    pub last_amended_at: Option<u64>,
}

impl Node {
    /// Create a node with the given id and props, neutral weight 0.5,
    /// and the current timestamp.
    pub fn new(id: NodeId, props: NodeProps) -> Self {
        let now = unix_now();
        Self {
            id,
            weight: 0.5,
            is_level0: false,
            category: String::new(),
            props,
            primary_source_id: None,
            created_at: now,
            updated_at: now,
            last_amended_at: None,
        }
    }

    /// Set the veracity weight (clamped to [0.0, 1.0]).
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.clamp(0.0, 1.0);
        self
    }

    /// Set the primary source back-reference.
    pub fn with_primary_source(mut self, source: NodeId) -> Self {
        self.primary_source_id = Some(source);
        self
    }

    /// Set the inquiry category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// A typed, credibility-weighted edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Source node id.
    pub source: NodeId,
    /// Target node id.
    pub target: NodeId,
    /// Credibility multiplier in [0.0, 1.0].
    pub weight: f64,
    /// Relation type tag (e.g. "supports", "derives-from").
    pub kind: String,
    /// Creation time (seconds since UNIX epoch).
    pub created_at: u64,
}

impl Edge {
    /// Create an edge with full credibility and the current timestamp.
    pub fn new(source: NodeId, target: NodeId, kind: impl Into<String>) -> Self {
        Self {
            source,
            target,
            weight: 1.0,
            kind: kind.into(),
            created_at: unix_now(),
        }
    }

    /// Set the credibility weight (clamped to [0.0, 1.0]).
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.clamp(0.0, 1.0);
        self
    }
}

/// Which edges to follow during expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpandDirection {
    /// Follow edges from source to target.
    Outgoing,
    /// Follow edges from target to source.
    Incoming,
    /// Follow edges in both directions.
    Both,
}

/// Current time in seconds since the UNIX epoch.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
