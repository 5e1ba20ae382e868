//! Field-level amendments: versioned single-field mutations to a node.
//!
//! Amendable fields form a closed set of tagged path variants — the two
//! top-level named fields plus a nested-properties variant holding a
//! validated segment list. Resolution and mutation go through an explicit
//! accessor that fails on unsupported paths rather than silently no-op-ing.
//!
//! The per-(node, field) state machine is `Proposed → Applied | Rejected |
//! Superseded`. `Applied` and `Rejected` are terminal; a new proposal for
//! the same field supersedes the prior `Proposed` one, so at most one
//! proposal per field is ever pending.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AmendmentError;
use crate::graph::{Node, NodeId};
use crate::position::{InquiryId, PositionId, UserId};

/// Result type for amendment operations.
pub type AmendmentResult<T> = std::result::Result<T, AmendmentError>;

/// Identifier for an amendment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AmendmentId(pub u64);

impl fmt::Display for AmendmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "amendment:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Field paths
// ---------------------------------------------------------------------------

/// The closed set of amendable field paths on a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldPath {
    /// The node's title (string).
    Title,
    /// The node's body content (string).
    Content,
    /// A nested field inside the node's extra props, addressed by a
    /// non-empty list of non-empty segments.
    Props(Vec<String>),
}

impl FieldPath {
    /// Parse a dotted path: `title`, `content`, or `props.<seg>[.<seg>...]`.
    pub fn parse(path: &str) -> AmendmentResult<Self> {
        match path {
            "title" => return Ok(FieldPath::Title),
            "content" => return Ok(FieldPath::Content),
            _ => {}
        }
        if let Some(rest) = path.strip_prefix("props.") {
            let segments: Vec<String> = rest.split('.').map(str::to_string).collect();
            if segments.iter().any(String::is_empty) {
                return Err(AmendmentError::BadFieldPath {
                    path: path.to_string(),
                });
            }
            return Ok(FieldPath::Props(segments));
        }
        Err(AmendmentError::BadFieldPath {
            path: path.to_string(),
        })
    }

    /// Read the current value of this field from a node.
    ///
    /// Returns `None` when a nested prop does not exist yet.
    pub fn current_value(&self, node: &Node) -> Option<Value> {
        match self {
            FieldPath::Title => Some(Value::String(node.props.title.clone())),
            FieldPath::Content => Some(Value::String(node.props.content.clone())),
            FieldPath::Props(segments) => {
                let (first, rest) = segments.split_first()?;
                let mut current = node.props.extra.get(first)?;
                for segment in rest {
                    current = current.as_object()?.get(segment)?;
                }
                Some(current.clone())
            }
        }
    }

    /// Write a value into this field on a node.
    ///
    /// Top-level fields only accept strings; nested props accept any JSON
    /// value and create intermediate objects as needed, failing if an
    /// intermediate segment resolves to a non-object.
    pub fn apply_to(&self, node: &mut Node, value: Value) -> AmendmentResult<()> {
        match self {
            FieldPath::Title | FieldPath::Content => {
                let Value::String(text) = value else {
                    return Err(AmendmentError::ValueType {
                        path: self.to_string(),
                        expected: "string".into(),
                    });
                };
                match self {
                    FieldPath::Title => node.props.title = text,
                    FieldPath::Content => node.props.content = text,
                    FieldPath::Props(_) => unreachable!(),
                }
                Ok(())
            }
            FieldPath::Props(segments) => {
                let Some((last, intermediate)) = segments.split_last() else {
                    return Err(AmendmentError::BadFieldPath {
                        path: self.to_string(),
                    });
                };
                let mut current = &mut node.props.extra;
                for segment in intermediate {
                    let entry = current
                        .entry(segment.clone())
                        .or_insert_with(|| Value::Object(serde_json::Map::new()));
                    current = entry.as_object_mut().ok_or_else(|| {
                        AmendmentError::ValueType {
                            path: self.to_string(),
                            expected: "object".into(),
                        }
                    })?;
                }
                current.insert(last.clone(), value);
                Ok(())
            }
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Title => write!(f, "title"),
            FieldPath::Content => write!(f, "content"),
            FieldPath::Props(segments) => write!(f, "props.{}", segments.join(".")),
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Lifecycle of an amendment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmendmentStatus {
    Proposed,
    Applied,
    Rejected,
    Superseded,
}

impl AmendmentStatus {
    /// Exhaustive transition check: only `Proposed` may move, and only to a
    /// terminal state.
    pub fn can_transition(self, next: AmendmentStatus) -> bool {
        match (self, next) {
            (AmendmentStatus::Proposed, AmendmentStatus::Applied)
            | (AmendmentStatus::Proposed, AmendmentStatus::Rejected)
            | (AmendmentStatus::Proposed, AmendmentStatus::Superseded) => true,
            (AmendmentStatus::Proposed, AmendmentStatus::Proposed)
            | (AmendmentStatus::Applied, _)
            | (AmendmentStatus::Rejected, _)
            | (AmendmentStatus::Superseded, _) => false,
        }
    }

    /// Whether this state admits no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, AmendmentStatus::Proposed)
    }
}

impl fmt::Display for AmendmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmendmentStatus::Proposed => write!(f, "proposed"),
            AmendmentStatus::Applied => write!(f, "applied"),
            AmendmentStatus::Rejected => write!(f, "rejected"),
            AmendmentStatus::Superseded => write!(f, "superseded"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Where an amendment came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmendmentProvenance {
    pub inquiry_id: Option<InquiryId>,
    pub position_id: Option<PositionId>,
    pub proposer: UserId,
}

/// A proposed change to one field of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amendment {
    pub id: AmendmentId,
    pub node_id: NodeId,
    pub field_path: FieldPath,
    /// The field's value at proposal time.
    pub original_value: Value,
    /// The proposed replacement value.
    pub amended_value: Value,
    pub provenance: AmendmentProvenance,
    pub status: AmendmentStatus,
    pub proposed_at: u64,
    /// When the amendment reached a terminal state.
    pub decided_at: Option<u64>,
    /// Who applied or rejected it.
    pub decided_by: Option<UserId>,
}

/// Outcome of a proposal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProposalOutcome {
    /// The proposed value equals the current field value: no record created.
    NoChange,
    /// A new amendment is pending; any prior pending one was superseded.
    Proposed {
        amendment: Amendment,
        superseded: Option<AmendmentId>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeProps;
    use serde_json::json;

    fn node() -> Node {
        let mut props = NodeProps {
            title: "Library of Alexandria".into(),
            content: "Destroyed gradually, not in one fire".into(),
            extra: serde_json::Map::new(),
        };
        props
            .extra
            .insert("era".into(), json!({"start": "-300", "end": "270"}));
        Node::new(NodeId::new(1).unwrap(), props)
    }

    // --- parsing ---

    #[test]
    fn parse_known_paths() {
        assert_eq!(FieldPath::parse("title").unwrap(), FieldPath::Title);
        assert_eq!(FieldPath::parse("content").unwrap(), FieldPath::Content);
        assert_eq!(
            FieldPath::parse("props.era.start").unwrap(),
            FieldPath::Props(vec!["era".into(), "start".into()])
        );
    }

    #[test]
    fn parse_rejects_unsupported_paths() {
        for bad in ["weight", "props.", "props..x", "", "is_level0", "props"] {
            assert!(
                matches!(
                    FieldPath::parse(bad),
                    Err(AmendmentError::BadFieldPath { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn field_path_display_round_trips() {
        for path in ["title", "content", "props.era.start"] {
            assert_eq!(FieldPath::parse(path).unwrap().to_string(), path);
        }
    }

    // --- accessor ---

    #[test]
    fn current_value_reads_fields() {
        let node = node();
        assert_eq!(
            FieldPath::Title.current_value(&node),
            Some(json!("Library of Alexandria"))
        );
        assert_eq!(
            FieldPath::parse("props.era.start").unwrap().current_value(&node),
            Some(json!("-300"))
        );
        assert_eq!(
            FieldPath::parse("props.missing").unwrap().current_value(&node),
            None
        );
    }

    #[test]
    fn apply_writes_top_level_strings() {
        let mut node = node();
        FieldPath::Title
            .apply_to(&mut node, json!("Great Library"))
            .unwrap();
        assert_eq!(node.props.title, "Great Library");
    }

    #[test]
    fn apply_rejects_non_string_for_top_level() {
        let mut node = node();
        let err = FieldPath::Content
            .apply_to(&mut node, json!(42))
            .unwrap_err();
        assert!(matches!(err, AmendmentError::ValueType { .. }));
        // Nothing changed.
        assert_eq!(node.props.content, "Destroyed gradually, not in one fire");
    }

    #[test]
    fn apply_writes_nested_props_creating_intermediates() {
        let mut node = node();
        FieldPath::parse("props.sources.primary")
            .unwrap()
            .apply_to(&mut node, json!("Strabo"))
            .unwrap();
        assert_eq!(
            node.props.extra["sources"]["primary"],
            json!("Strabo")
        );
    }

    #[test]
    fn apply_fails_on_non_object_intermediate() {
        let mut node = node();
        node.props.extra.insert("flat".into(), json!("scalar"));
        let err = FieldPath::parse("props.flat.deep")
            .unwrap()
            .apply_to(&mut node, json!(1))
            .unwrap_err();
        assert!(matches!(err, AmendmentError::ValueType { .. }));
    }

    // --- state machine ---

    #[test]
    fn proposed_transitions_to_terminals_only() {
        use AmendmentStatus::*;
        assert!(Proposed.can_transition(Applied));
        assert!(Proposed.can_transition(Rejected));
        assert!(Proposed.can_transition(Superseded));
        assert!(!Proposed.can_transition(Proposed));
    }

    #[test]
    fn terminal_states_are_final() {
        use AmendmentStatus::*;
        for terminal in [Applied, Rejected, Superseded] {
            assert!(terminal.is_terminal());
            for next in [Proposed, Applied, Rejected, Superseded] {
                assert!(!terminal.can_transition(next));
            }
        }
        assert!(!Proposed.is_terminal());
    }

    #[test]
    fn status_display() {
        assert_eq!(AmendmentStatus::Proposed.to_string(), "proposed");
        assert_eq!(AmendmentStatus::Superseded.to_string(), "superseded");
    }
}
