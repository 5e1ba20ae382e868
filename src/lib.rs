// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # aletheia
//!
//! A credibility-weighted knowledge graph engine: nodes and edges carry
//! continuous [0,1] credibility weights, truth claims evolve through
//! community argumentation, and sufficiently supported nodes are promoted
//! into an immutable verified layer.
//!
//! ## Architecture
//!
//! - **Graph** (`graph`): petgraph-backed weighted graph with bidirectional
//!   pathfinding, decayed subgraph expansion, ancestry, and veracity ranking
//! - **Thresholds** (`threshold`): per-category three-tier cut-points and the
//!   pure position classifier
//! - **Promotion** (`promotion`): four-criterion eligibility gates and the
//!   append-only promotion ledger
//! - **Amendments** (`amendment`): versioned single-field mutations gated by
//!   verified positions
//! - **Engine** (`engine`): the facade tying the store, registry, and
//!   transactional paths together
//!
//! ## Library usage
//!
//! ```no_run
//! use aletheia::engine::{EngineConfig, GraphEngine};
//! use aletheia::graph::NodeProps;
//!
//! let engine = GraphEngine::new(EngineConfig::default()).unwrap();
//! let claim = engine
//!     .create_node("history", NodeProps {
//!         title: "Antikythera mechanism".into(),
//!         content: "An ancient Greek analog computer".into(),
//!         extra: Default::default(),
//!     })
//!     .unwrap();
//! let inquiry = engine.create_inquiry(claim.id, "history").unwrap();
//! ```

pub mod amendment;
pub mod engine;
pub mod error;
pub mod graph;
pub mod position;
pub mod promotion;
pub mod store;
pub mod threshold;
