//! Rich diagnostic error types for the aletheia engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers know exactly
//! what went wrong and how to fix it.
//!
//! Two conditions are deliberately *not* errors: a path search that finds
//! nothing within its budget returns `Ok(None)`, and a traversal that hits a
//! cycle or exhausts its budget terminates normally.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the aletheia engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum AletheiaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Threshold(#[from] ThresholdError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Amendment(#[from] AmendmentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Promotion(#[from] PromotionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("node not found: {node_id}")]
    #[diagnostic(
        code(aletheia::graph::node_not_found),
        help(
            "No node with this id exists in the graph. \
             Verify the id, or insert the node before referencing it."
        )
    )]
    NodeNotFound { node_id: u64 },

    #[error("edge not found: {source_id} -> {target}")]
    #[diagnostic(
        code(aletheia::graph::edge_not_found),
        help("No edge connects these two nodes. Check both endpoint ids.")
    )]
    EdgeNotFound { source_id: u64, target: u64 },

    #[error("invalid traversal budget: {message}")]
    #[diagnostic(
        code(aletheia::graph::invalid_budget),
        help(
            "Traversal budgets are mandatory and must be positive. \
             A zero max_depth or max_nodes would silently mean \"unbounded\", \
             which is a configuration error, not a default."
        )
    )]
    InvalidBudget { message: String },

    #[error("edge weight {weight} outside [0.0, 1.0]")]
    #[diagnostic(
        code(aletheia::graph::invalid_weight),
        help(
            "Credibility weights are probability multipliers and must lie \
             in [0.0, 1.0]. Re-check the scoring input that produced this value."
        )
    )]
    InvalidWeight { weight: f64 },
}

// ---------------------------------------------------------------------------
// Threshold errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ThresholdError {
    #[error(
        "misordered thresholds for category '{category}': \
         display {display} <= inclusion {inclusion} <= auto_amend {auto_amend} violated"
    )]
    #[diagnostic(
        code(aletheia::threshold::misordered),
        help(
            "The three cut-points must be monotonically non-decreasing: \
             display <= inclusion <= auto_amend. Fix the configuration; \
             misordered triples are rejected, never clamped."
        )
    )]
    Misordered {
        category: String,
        display: f64,
        inclusion: f64,
        auto_amend: f64,
    },

    #[error("threshold {value} for category '{category}' outside [0.0, 1.0]")]
    #[diagnostic(
        code(aletheia::threshold::out_of_range),
        help("Every cut-point is a credibility score and must lie in [0.0, 1.0].")
    )]
    OutOfRange { category: String, value: f64 },

    #[error("threshold config parse error: {message}")]
    #[diagnostic(
        code(aletheia::threshold::config_parse),
        help("The TOML threshold table could not be parsed. Check the file syntax.")
    )]
    ConfigParse { message: String },
}

// ---------------------------------------------------------------------------
// Amendment errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AmendmentError {
    #[error("amendment not found: {amendment_id}")]
    #[diagnostic(
        code(aletheia::amendment::not_found),
        help("No amendment with this id exists. It may never have been proposed.")
    )]
    NotFound { amendment_id: u64 },

    #[error("amendment {amendment_id} is '{current}', expected 'proposed'")]
    #[diagnostic(
        code(aletheia::amendment::not_proposed),
        help(
            "Only a proposed amendment can be applied or rejected. \
             This one already reached a terminal state — inspect its history \
             and decide whether to propose a fresh change."
        )
    )]
    NotProposed { amendment_id: u64, current: String },

    #[error("unsupported field path: '{path}'")]
    #[diagnostic(
        code(aletheia::amendment::bad_field_path),
        help(
            "Amendable fields are 'title', 'content', or 'props.<segment>[.<segment>...]'. \
             Empty segments are rejected."
        )
    )]
    BadFieldPath { path: String },

    #[error("field path '{path}' expects a {expected} value")]
    #[diagnostic(
        code(aletheia::amendment::value_type),
        help(
            "Top-level fields are strings; nested props accept any JSON value. \
             Convert the amended value before proposing."
        )
    )]
    ValueType { path: String, expected: String },

    #[error("node {node_id} is in the verified layer and cannot be amended")]
    #[diagnostic(
        code(aletheia::amendment::node_immutable),
        help(
            "Promotion moved this node out of ongoing debate. Its fields are \
             frozen; file a new inquiry against a successor node instead."
        )
    )]
    NodeImmutable { node_id: u64 },

    #[error("position {position_id} has status '{status}' and cannot gate an amendment")]
    #[diagnostic(
        code(aletheia::amendment::position_cannot_amend),
        help(
            "Only a position classified 'verified' (score at or above the \
             category's auto-amend threshold) may trigger a field rewrite."
        )
    )]
    PositionCannotAmend { position_id: u64, status: String },
}

// ---------------------------------------------------------------------------
// Promotion errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PromotionError {
    #[error("node {node_id} failed eligibility re-evaluation at commit time")]
    #[diagnostic(
        code(aletheia::promotion::not_eligible),
        help(
            "Eligibility is re-checked inside the promotion transaction and the \
             node no longer clears every criterion gate. Inspect the attached \
             blockers; nothing was committed."
        )
    )]
    NotEligible { node_id: u64, blockers: Vec<String> },

    #[error("node {node_id} is already in the verified layer")]
    #[diagnostic(
        code(aletheia::promotion::already_promoted),
        help(
            "Promotion is irreversible and happens at most once per node. \
             A concurrent curator likely committed first; the existing \
             promotion event records the criteria at that moment."
        )
    )]
    AlreadyPromoted { node_id: u64 },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("position not found: {position_id}")]
    #[diagnostic(
        code(aletheia::store::position_not_found),
        help("No position with this id exists. Verify the id is correct.")
    )]
    PositionNotFound { position_id: u64 },

    #[error("inquiry not found: {inquiry_id}")]
    #[diagnostic(
        code(aletheia::store::inquiry_not_found),
        help("No inquiry with this id exists. Verify the id is correct.")
    )]
    InquiryNotFound { inquiry_id: u64 },

    #[error("challenge not found: {challenge_id}")]
    #[diagnostic(
        code(aletheia::store::challenge_not_found),
        help("No challenge with this id exists. Verify the id is correct.")
    )]
    ChallengeNotFound { challenge_id: u64 },

    #[error("id allocator exhausted")]
    #[diagnostic(
        code(aletheia::store::ids_exhausted),
        help(
            "The id space is exhausted. This requires 2^64 allocations and \
             should never happen in practice — check for an allocation loop."
        )
    )]
    IdsExhausted,
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(aletheia::engine::invalid_config),
        help("Check the EngineConfig fields. {message}")
    )]
    InvalidConfig { message: String },
}

/// Convenience alias for functions returning aletheia results.
pub type AletheiaResult<T> = std::result::Result<T, AletheiaError>;
