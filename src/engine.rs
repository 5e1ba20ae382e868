//! Engine facade: top-level API for the aletheia core.
//!
//! The `GraphEngine` owns the store and threshold registry and exposes every
//! operation: traversal queries, position classification, the amendment
//! pipeline, and promotion into the verified layer.
//!
//! Amendment application and promotion execution run inside a per-node
//! read-modify-write transaction: validation happens first, the node lock is
//! held throughout, and nothing is written until every check has passed — a
//! failed transaction leaves no partial state.

use serde_json::Value;

use crate::amendment::{
    Amendment, AmendmentId, AmendmentProvenance, AmendmentStatus, FieldPath, ProposalOutcome,
};
use crate::error::{
    AletheiaResult, AmendmentError, EngineError, PromotionError, StoreError,
};
use crate::graph::index::CredibilityGraph;
use crate::graph::traverse::{
    self, PathResult, RankedNeighbor, RelatedPath, SubgraphResult, TraversalBudget,
};
use crate::graph::{Edge, ExpandDirection, Node, NodeId, NodeProps, unix_now};
use crate::position::{
    InquiryId, Position, PositionId, PositionStatus, Stance, ThresholdStats, TierBuckets, UserId,
};
use crate::promotion::{
    self, Challenge, ChallengeId, ChallengeStatus, ChallengeVote, EligibilityInputs,
    EligibilityReport, EvidenceItem, PromotionEvent, PromotionKind, WorkflowStep,
};
use crate::store::{Inquiry, Store};
use crate::threshold::ThresholdRegistry;

/// Configuration for the aletheia engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// TOML threshold tables to load at startup; validation failures are
    /// fatal (fail fast, before any state exists).
    pub threshold_config: Option<String>,
    /// When true, an amendment proposal fired by a verified position is
    /// applied immediately instead of waiting for an explicit apply step.
    pub auto_apply_verified: bool,
}

/// The aletheia credibility-weighted graph engine.
pub struct GraphEngine {
    config: EngineConfig,
    store: Store,
    thresholds: ThresholdRegistry,
}

/// Result of re-deriving a position's status after a score change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RescoreOutcome {
    pub position_id: PositionId,
    pub previous: PositionStatus,
    pub current: PositionStatus,
    /// Point query: may this position now gate an amendment?
    pub can_amend_node: bool,
}

impl GraphEngine {
    /// Create a new engine with the given configuration.
    pub fn new(config: EngineConfig) -> AletheiaResult<Self> {
        let thresholds = ThresholdRegistry::new();
        if let Some(ref toml) = config.threshold_config {
            let loaded = thresholds.load_toml_str(toml)?;
            if loaded == 0 {
                return Err(EngineError::InvalidConfig {
                    message: "threshold_config contains no categories".into(),
                }
                .into());
            }
        }

        tracing::info!(
            configured_categories = thresholds.len(),
            auto_apply = config.auto_apply_verified,
            "initializing aletheia engine"
        );

        Ok(Self {
            config,
            store: Store::new(),
            thresholds,
        })
    }

    /// Direct access to the underlying graph (read paths).
    pub fn graph(&self) -> &CredibilityGraph {
        &self.store.graph
    }

    /// The threshold registry.
    pub fn thresholds(&self) -> &ThresholdRegistry {
        &self.thresholds
    }

    // -----------------------------------------------------------------------
    // Graph population
    // -----------------------------------------------------------------------

    /// Create a node in the given category.
    pub fn create_node(
        &self,
        category: impl Into<String>,
        props: NodeProps,
    ) -> AletheiaResult<Node> {
        let raw = self.store.ids.next_id()?;
        let id = NodeId::new(raw).ok_or(StoreError::IdsExhausted)?;
        let node = Node::new(id, props).with_category(category);
        self.store.graph.insert_node(node.clone());
        Ok(node)
    }

    /// Insert an already-built node (e.g. restored by the ingestion layer).
    pub fn insert_node(&self, node: Node) {
        self.store.graph.insert_node(node);
    }

    /// Connect two nodes with a typed, weighted edge.
    pub fn add_edge(
        &self,
        source: NodeId,
        target: NodeId,
        kind: impl Into<String>,
        weight: f64,
    ) -> AletheiaResult<()> {
        self.store
            .graph
            .insert_edge(&Edge::new(source, target, kind).with_weight(weight))?;
        Ok(())
    }

    /// Fetch a node record.
    pub fn node(&self, id: NodeId) -> AletheiaResult<Node> {
        Ok(self.store.graph.require_node(id)?)
    }

    // -----------------------------------------------------------------------
    // Traversal queries
    // -----------------------------------------------------------------------

    /// Bidirectional weighted pathfinding. `Ok(None)` means no path within
    /// budget — a negative result, not an error.
    pub fn find_path(
        &self,
        source: NodeId,
        target: NodeId,
        budget: TraversalBudget,
        min_weight: f64,
    ) -> AletheiaResult<Option<PathResult>> {
        Ok(traverse::find_path(
            &self.store.graph,
            source,
            target,
            budget,
            min_weight,
        )?)
    }

    /// Bounded relevance-decayed neighborhood expansion.
    pub fn subgraph(
        &self,
        center: NodeId,
        direction: ExpandDirection,
        budget: TraversalBudget,
        min_weight: f64,
    ) -> AletheiaResult<SubgraphResult> {
        Ok(traverse::subgraph(
            &self.store.graph,
            center,
            direction,
            budget,
            min_weight,
        )?)
    }

    /// Every qualifying evidence chain along one edge kind.
    pub fn related_by_kind(
        &self,
        start: NodeId,
        edge_kind: &str,
        budget: TraversalBudget,
        min_weight: f64,
    ) -> AletheiaResult<Vec<RelatedPath>> {
        Ok(traverse::related_by_kind(
            &self.store.graph,
            start,
            edge_kind,
            budget,
            min_weight,
        )?)
    }

    /// Primary-source ancestor chain, root-first.
    pub fn ancestors(&self, node: NodeId, max_depth: usize) -> AletheiaResult<Vec<NodeId>> {
        Ok(traverse::ancestors(&self.store.graph, node, max_depth)?)
    }

    /// One-hop neighbors ranked by combined node and edge credibility.
    pub fn high_veracity_neighbors(
        &self,
        node: NodeId,
        limit: usize,
        min_weight: f64,
    ) -> AletheiaResult<Vec<RankedNeighbor>> {
        Ok(traverse::high_veracity_neighbors(
            &self.store.graph,
            node,
            limit,
            min_weight,
        )?)
    }

    // -----------------------------------------------------------------------
    // Inquiries, positions, classification
    // -----------------------------------------------------------------------

    /// Open an inquiry against a node.
    pub fn create_inquiry(
        &self,
        node_id: NodeId,
        category: impl Into<String>,
    ) -> AletheiaResult<Inquiry> {
        self.store.graph.require_node(node_id)?;
        let inquiry = Inquiry {
            id: InquiryId(self.store.ids.next_id()?),
            node_id,
            category: category.into(),
            created_at: unix_now(),
        };
        self.store.insert_inquiry(inquiry.clone());
        Ok(inquiry)
    }

    /// Attach a new (unscored) position to an inquiry.
    pub fn create_position(
        &self,
        inquiry_id: InquiryId,
        author: UserId,
        stance: Stance,
    ) -> AletheiaResult<Position> {
        self.store
            .inquiry(inquiry_id)
            .ok_or(StoreError::InquiryNotFound {
                inquiry_id: inquiry_id.0,
            })?;
        let position = Position::new(
            PositionId(self.store.ids.next_id()?),
            inquiry_id,
            author,
            stance,
        );
        self.store.insert_position(position.clone());
        Ok(position)
    }

    /// Record a new composite score from the scoring collaborator and
    /// re-derive the position's status.
    ///
    /// Re-derivation is idempotent and carries no hysteresis: the new status
    /// is a pure function of the score and the category thresholds. Archived
    /// positions stay archived.
    pub fn rescore_position(
        &self,
        position_id: PositionId,
        credibility_score: f64,
        sub_scores: crate::position::SubScores,
    ) -> AletheiaResult<RescoreOutcome> {
        let position = self.store.position(position_id)?;
        let inquiry =
            self.store
                .inquiry(position.inquiry_id)
                .ok_or(StoreError::InquiryNotFound {
                    inquiry_id: position.inquiry_id.0,
                })?;

        let previous = position.status;
        let thresholds = self.thresholds.get(&inquiry.category);
        let current = if previous == PositionStatus::Archived {
            PositionStatus::Archived
        } else {
            thresholds.classify(credibility_score)
        };

        self.store.update_position(position_id, |p| {
            p.credibility_score = credibility_score;
            p.sub_scores = sub_scores;
            p.status = current;
            p.updated_at = unix_now();
        })?;

        if previous != current {
            tracing::debug!(
                position = %position_id,
                %previous,
                %current,
                score = credibility_score,
                "position reclassified"
            );
        }

        Ok(RescoreOutcome {
            position_id,
            previous,
            current,
            can_amend_node: thresholds.can_amend_node(credibility_score),
        })
    }

    /// Withdraw a position from the debate. Terminal for classification.
    pub fn archive_position(&self, position_id: PositionId) -> AletheiaResult<()> {
        self.store.update_position(position_id, |p| {
            p.status = PositionStatus::Archived;
            p.updated_at = unix_now();
        })?;
        Ok(())
    }

    /// An inquiry's positions grouped by classifier tier.
    pub fn positions_by_tier(&self, inquiry_id: InquiryId) -> TierBuckets {
        TierBuckets::group(self.store.positions_for_inquiry(inquiry_id))
    }

    /// Per-inquiry threshold statistics.
    pub fn inquiry_stats(&self, inquiry_id: InquiryId) -> AletheiaResult<ThresholdStats> {
        let inquiry = self
            .store
            .inquiry(inquiry_id)
            .ok_or(StoreError::InquiryNotFound {
                inquiry_id: inquiry_id.0,
            })?;
        let positions = self.store.positions_for_inquiry(inquiry_id);
        Ok(ThresholdStats::compute(
            inquiry_id,
            self.thresholds.get(&inquiry.category),
            &positions,
        ))
    }

    // -----------------------------------------------------------------------
    // Amendment pipeline
    // -----------------------------------------------------------------------

    /// Propose a single-field change to a node.
    ///
    /// Proposing a value equal to the current field value is a no-op (no
    /// record is created). A prior pending proposal for the same field is
    /// superseded — at most one `proposed` amendment exists per (node,
    /// field) at any time.
    pub fn propose_amendment(
        &self,
        node_id: NodeId,
        field: FieldPath,
        value: Value,
        provenance: AmendmentProvenance,
    ) -> AletheiaResult<ProposalOutcome> {
        let lock = self.store.node_lock(node_id);
        let _guard = lock.lock().expect("node lock poisoned");

        let node = self.store.graph.require_node(node_id)?;
        if node.is_level0 {
            return Err(AmendmentError::NodeImmutable {
                node_id: node_id.get(),
            }
            .into());
        }

        let current = field.current_value(&node);
        if current.as_ref() == Some(&value) {
            return Ok(ProposalOutcome::NoChange);
        }

        let superseded = self.store.pending_amendment(node_id, &field).map(|prior| {
            debug_assert!(prior.status.can_transition(AmendmentStatus::Superseded));
            self.store.set_amendment_status(
                prior.id,
                AmendmentStatus::Superseded,
                Some(unix_now()),
                None,
            );
            tracing::debug!(
                amendment = %prior.id,
                field = %field,
                "pending amendment superseded by new proposal"
            );
            prior.id
        });

        let amendment = Amendment {
            id: AmendmentId(self.store.ids.next_id()?),
            node_id,
            field_path: field,
            original_value: current.unwrap_or(Value::Null),
            amended_value: value,
            provenance,
            status: AmendmentStatus::Proposed,
            proposed_at: unix_now(),
            decided_at: None,
            decided_by: None,
        };
        self.store.insert_amendment(amendment.clone());

        Ok(ProposalOutcome::Proposed {
            amendment,
            superseded,
        })
    }

    /// Apply a proposed amendment: write the field, mark it applied, and
    /// stamp the node's last-amended marker — all or nothing.
    pub fn apply_amendment(
        &self,
        amendment_id: AmendmentId,
        actor: UserId,
    ) -> AletheiaResult<Amendment> {
        // Resolve outside the lock only to learn the node id.
        let node_id = self
            .store
            .amendment(amendment_id)
            .ok_or(AmendmentError::NotFound {
                amendment_id: amendment_id.0,
            })?
            .node_id;

        let lock = self.store.node_lock(node_id);
        let _guard = lock.lock().expect("node lock poisoned");

        // Re-fetch under the lock: a concurrent proposal may have superseded it.
        let amendment = self
            .store
            .amendment(amendment_id)
            .ok_or(AmendmentError::NotFound {
                amendment_id: amendment_id.0,
            })?;
        if amendment.status != AmendmentStatus::Proposed {
            return Err(AmendmentError::NotProposed {
                amendment_id: amendment_id.0,
                current: amendment.status.to_string(),
            }
            .into());
        }

        let node = self.store.graph.require_node(node_id)?;
        if node.is_level0 {
            return Err(AmendmentError::NodeImmutable {
                node_id: node_id.get(),
            }
            .into());
        }

        // Validate the mutation on a scratch copy first so the committed
        // write below cannot fail halfway.
        let mut scratch = node.clone();
        amendment
            .field_path
            .apply_to(&mut scratch, amendment.amended_value.clone())?;

        let now = unix_now();
        self.store.graph.update_node(node_id, |n| {
            n.props = scratch.props.clone();
            n.last_amended_at = Some(now);
        })?;
        self.store.set_amendment_status(
            amendment_id,
            AmendmentStatus::Applied,
            Some(now),
            Some(actor),
        );

        tracing::info!(
            amendment = %amendment_id,
            node = %node_id,
            field = %amendment.field_path,
            actor = %actor,
            "amendment applied"
        );

        self.store
            .amendment(amendment_id)
            .ok_or_else(|| {
                AmendmentError::NotFound {
                    amendment_id: amendment_id.0,
                }
                .into()
            })
    }

    /// Reject a proposed amendment.
    pub fn reject_amendment(
        &self,
        amendment_id: AmendmentId,
        actor: UserId,
    ) -> AletheiaResult<Amendment> {
        let node_id = self
            .store
            .amendment(amendment_id)
            .ok_or(AmendmentError::NotFound {
                amendment_id: amendment_id.0,
            })?
            .node_id;

        let lock = self.store.node_lock(node_id);
        let _guard = lock.lock().expect("node lock poisoned");

        let amendment = self
            .store
            .amendment(amendment_id)
            .ok_or(AmendmentError::NotFound {
                amendment_id: amendment_id.0,
            })?;
        if amendment.status != AmendmentStatus::Proposed {
            return Err(AmendmentError::NotProposed {
                amendment_id: amendment_id.0,
                current: amendment.status.to_string(),
            }
            .into());
        }

        self.store.set_amendment_status(
            amendment_id,
            AmendmentStatus::Rejected,
            Some(unix_now()),
            Some(actor),
        );
        self.store
            .amendment(amendment_id)
            .ok_or_else(|| {
                AmendmentError::NotFound {
                    amendment_id: amendment_id.0,
                }
                .into()
            })
    }

    /// Amendment history for a node, optionally narrowed to one field.
    pub fn amendment_history(
        &self,
        node_id: NodeId,
        field: Option<&FieldPath>,
    ) -> Vec<Amendment> {
        self.store.amendment_history(node_id, field)
    }

    /// Fire the amendment trigger for a verified position.
    ///
    /// The position must currently classify as `verified`; the target node
    /// is the one its inquiry debates. The trigger only files the proposal —
    /// it never applies it, unless the engine was explicitly configured with
    /// `auto_apply_verified`.
    pub fn trigger_amendment(
        &self,
        position_id: PositionId,
        field: FieldPath,
        value: Value,
    ) -> AletheiaResult<ProposalOutcome> {
        let position = self.store.position(position_id)?;
        if position.status != PositionStatus::Verified {
            return Err(AmendmentError::PositionCannotAmend {
                position_id: position_id.0,
                status: position.status.to_string(),
            }
            .into());
        }
        let inquiry =
            self.store
                .inquiry(position.inquiry_id)
                .ok_or(StoreError::InquiryNotFound {
                    inquiry_id: position.inquiry_id.0,
                })?;

        let outcome = self.propose_amendment(
            inquiry.node_id,
            field,
            value,
            AmendmentProvenance {
                inquiry_id: Some(inquiry.id),
                position_id: Some(position_id),
                proposer: position.author,
            },
        )?;

        if self.config.auto_apply_verified {
            return match outcome {
                ProposalOutcome::Proposed {
                    amendment,
                    superseded,
                } => {
                    let applied = self.apply_amendment(amendment.id, position.author)?;
                    Ok(ProposalOutcome::Proposed {
                        amendment: applied,
                        superseded,
                    })
                }
                ProposalOutcome::NoChange => Ok(ProposalOutcome::NoChange),
            };
        }

        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Challenges, evidence, methodology
    // -----------------------------------------------------------------------

    /// File a challenge against a node's truth claim.
    pub fn file_challenge(&self, node_id: NodeId) -> AletheiaResult<Challenge> {
        self.store.graph.require_node(node_id)?;
        let challenge = Challenge::new(ChallengeId(self.store.ids.next_id()?), node_id);
        self.store.insert_challenge(challenge.clone());
        Ok(challenge)
    }

    /// Record a reputation-weighted vote on a challenge.
    pub fn vote_on_challenge(
        &self,
        challenge_id: ChallengeId,
        vote: ChallengeVote,
    ) -> AletheiaResult<()> {
        self.store.add_vote(challenge_id, vote)?;
        Ok(())
    }

    /// Mark a challenge resolved; its votes now count toward consensus.
    pub fn resolve_challenge(&self, challenge_id: ChallengeId) -> AletheiaResult<()> {
        self.store
            .update_challenge(challenge_id, |c| c.status = ChallengeStatus::Resolved)?;
        Ok(())
    }

    /// Attach a pre-scored evidence item to a node.
    pub fn add_evidence(&self, item: EvidenceItem) -> AletheiaResult<()> {
        self.store.graph.require_node(item.node_id)?;
        self.store.add_evidence(item);
        Ok(())
    }

    /// Define the workflow steps for a category.
    pub fn set_methodology(&self, category: impl Into<String>, steps: Vec<WorkflowStep>) {
        self.store.set_methodology(category, steps);
    }

    /// Mark a workflow step completed for a node.
    pub fn complete_step(&self, node_id: NodeId, step: impl Into<String>) -> AletheiaResult<()> {
        self.store.graph.require_node(node_id)?;
        self.store.complete_step(node_id, step);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Promotion
    // -----------------------------------------------------------------------

    /// Evaluate a node's promotion eligibility and persist the snapshot.
    pub fn evaluate_node(&self, node_id: NodeId) -> AletheiaResult<EligibilityReport> {
        let node = self.store.graph.require_node(node_id)?;
        let steps = self.store.methodology(&node.category);
        let completed = self.store.completed_steps(node_id);
        let challenges = self.store.challenges_for_node(node_id);
        let evidence = self.store.evidence_for_node(node_id);

        let report = promotion::evaluate(&EligibilityInputs {
            node_id,
            steps: steps.as_deref(),
            completed_steps: &completed,
            challenges: &challenges,
            evidence: &evidence,
        });
        self.store.upsert_eligibility(report.clone());
        Ok(report)
    }

    /// The latest persisted eligibility snapshot, if any.
    pub fn eligibility_snapshot(&self, node_id: NodeId) -> Option<EligibilityReport> {
        self.store.eligibility_snapshot(node_id)
    }

    /// Promote a node into the immutable verified layer.
    ///
    /// Eligibility is re-evaluated at commit time under the node lock —
    /// cached snapshots are never trusted. On success, within one atomic
    /// unit: `is_level0` is set, the weight is fixed at 1.0 or 0.0 per the
    /// promotion kind, and one immutable [`PromotionEvent`] is appended. A
    /// failed re-evaluation aborts with the current blockers and no state
    /// change; a concurrent winner leaves the loser reporting
    /// `AlreadyPromoted`.
    pub fn promote(
        &self,
        node_id: NodeId,
        kind: PromotionKind,
        curator: UserId,
    ) -> AletheiaResult<PromotionEvent> {
        let lock = self.store.node_lock(node_id);
        let _guard = lock.lock().expect("node lock poisoned");

        let node = self.store.graph.require_node(node_id)?;
        if node.is_level0 {
            return Err(PromotionError::AlreadyPromoted {
                node_id: node_id.get(),
            }
            .into());
        }

        // Commit-time re-evaluation.
        let report = self.evaluate_node(node_id)?;
        if !report.eligible {
            return Err(PromotionError::NotEligible {
                node_id: node_id.get(),
                blockers: report.blockers.iter().map(|b| b.message.clone()).collect(),
            }
            .into());
        }

        let now = unix_now();
        let event = PromotionEvent {
            id: self.store.ids.next_id()?,
            node_id,
            kind,
            criteria: report.criteria,
            overall: report.overall,
            curator,
            promoted_at: now,
        };

        self.store.graph.update_node(node_id, |n| {
            n.is_level0 = true;
            n.weight = kind.final_weight();
        })?;
        self.store.append_promotion(event.clone());

        tracing::info!(
            node = %node_id,
            kind = %kind,
            curator = %curator,
            overall = report.overall,
            "node promoted to verified layer"
        );

        Ok(event)
    }

    /// The append-only promotion history of a node.
    pub fn promotions(&self, node_id: NodeId) -> Vec<PromotionEvent> {
        self.store.promotions_for_node(node_id)
    }

    /// Summary counts for diagnostics.
    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            nodes: self.store.graph.node_count(),
            edges: self.store.graph.edge_count(),
            promotions: self.store.promotion_count(),
            configured_categories: self.thresholds.len(),
        }
    }
}

/// Summary information about the engine state.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub nodes: usize,
    pub edges: usize,
    pub promotions: usize,
    pub configured_categories: usize,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "aletheia engine info")?;
        writeln!(f, "  nodes:       {}", self.nodes)?;
        writeln!(f, "  edges:       {}", self.edges)?;
        writeln!(f, "  promotions:  {}", self.promotions)?;
        writeln!(f, "  categories:  {}", self.configured_categories)?;
        Ok(())
    }
}

impl std::fmt::Debug for GraphEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphEngine")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::SubScores;
    use serde_json::json;

    fn engine() -> GraphEngine {
        GraphEngine::new(EngineConfig::default()).unwrap()
    }

    fn titled(title: &str) -> NodeProps {
        NodeProps {
            title: title.into(),
            content: String::new(),
            extra: serde_json::Map::new(),
        }
    }

    fn scored_position(
        engine: &GraphEngine,
        inquiry: InquiryId,
        score: f64,
    ) -> Position {
        let p = engine
            .create_position(inquiry, UserId(7), Stance::Supporting)
            .unwrap();
        engine
            .rescore_position(p.id, score, SubScores::default())
            .unwrap();
        engine.store.position(p.id).unwrap()
    }

    #[test]
    fn bad_threshold_config_fails_fast() {
        let result = GraphEngine::new(EngineConfig {
            threshold_config: Some(
                r#"
                [categories.bad]
                display = 0.9
                inclusion = 0.5
                auto_amend = 0.8
                "#
                .into(),
            ),
            auto_apply_verified: false,
        });
        assert!(result.is_err());
    }

    #[test]
    fn rescore_classifies_through_category_thresholds() {
        let engine = GraphEngine::new(EngineConfig {
            threshold_config: Some(
                r#"
                [categories.history]
                display = 0.30
                inclusion = 0.60
                auto_amend = 0.85
                "#
                .into(),
            ),
            auto_apply_verified: false,
        })
        .unwrap();

        let node = engine.create_node("history", titled("claim")).unwrap();
        let inquiry = engine.create_inquiry(node.id, "history").unwrap();

        let p = scored_position(&engine, inquiry.id, 0.86);
        assert_eq!(p.status, PositionStatus::Verified);

        let outcome = engine
            .rescore_position(p.id, 0.70, SubScores::default())
            .unwrap();
        assert_eq!(outcome.previous, PositionStatus::Verified);
        assert_eq!(outcome.current, PositionStatus::Credible);
        assert!(!outcome.can_amend_node);
    }

    #[test]
    fn archived_positions_stay_archived_on_rescore() {
        let engine = engine();
        let node = engine.create_node("", titled("n")).unwrap();
        let inquiry = engine.create_inquiry(node.id, "").unwrap();
        let p = scored_position(&engine, inquiry.id, 0.9);

        engine.archive_position(p.id).unwrap();
        let outcome = engine
            .rescore_position(p.id, 0.95, SubScores::default())
            .unwrap();
        assert_eq!(outcome.current, PositionStatus::Archived);
    }

    #[test]
    fn propose_equal_value_is_noop() {
        let engine = engine();
        let node = engine.create_node("", titled("same title")).unwrap();

        let outcome = engine
            .propose_amendment(
                node.id,
                FieldPath::Title,
                json!("same title"),
                AmendmentProvenance {
                    inquiry_id: None,
                    position_id: None,
                    proposer: UserId(1),
                },
            )
            .unwrap();
        assert_eq!(outcome, ProposalOutcome::NoChange);
        assert!(engine.amendment_history(node.id, None).is_empty());
    }

    #[test]
    fn second_proposal_supersedes_first() {
        let engine = engine();
        let node = engine.create_node("", titled("old")).unwrap();
        let provenance = AmendmentProvenance {
            inquiry_id: None,
            position_id: None,
            proposer: UserId(1),
        };

        let first = match engine
            .propose_amendment(node.id, FieldPath::Title, json!("new A"), provenance)
            .unwrap()
        {
            ProposalOutcome::Proposed { amendment, .. } => amendment,
            other => panic!("expected proposal, got {other:?}"),
        };

        let ProposalOutcome::Proposed {
            amendment: second,
            superseded,
        } = engine
            .propose_amendment(node.id, FieldPath::Title, json!("new B"), provenance)
            .unwrap()
        else {
            panic!("expected proposal");
        };

        assert_eq!(superseded, Some(first.id));
        let history = engine.amendment_history(node.id, Some(&FieldPath::Title));
        assert_eq!(history.len(), 2);

        // Exactly one proposed amendment remains.
        let proposed: Vec<_> = history
            .iter()
            .filter(|a| a.status == AmendmentStatus::Proposed)
            .collect();
        assert_eq!(proposed.len(), 1);
        assert_eq!(proposed[0].id, second.id);

        let superseded_record = engine.store.amendment(first.id).unwrap();
        assert_eq!(superseded_record.status, AmendmentStatus::Superseded);
    }

    #[test]
    fn apply_writes_field_and_stamps_node() {
        let engine = engine();
        let node = engine.create_node("", titled("old")).unwrap();
        let ProposalOutcome::Proposed { amendment, .. } = engine
            .propose_amendment(
                node.id,
                FieldPath::Title,
                json!("new"),
                AmendmentProvenance {
                    inquiry_id: None,
                    position_id: None,
                    proposer: UserId(1),
                },
            )
            .unwrap()
        else {
            panic!("expected proposal");
        };

        let applied = engine.apply_amendment(amendment.id, UserId(9)).unwrap();
        assert_eq!(applied.status, AmendmentStatus::Applied);
        assert_eq!(applied.decided_by, Some(UserId(9)));

        let node = engine.node(node.id).unwrap();
        assert_eq!(node.props.title, "new");
        assert!(node.last_amended_at.is_some());
    }

    #[test]
    fn apply_superseded_amendment_is_conflict() {
        let engine = engine();
        let node = engine.create_node("", titled("old")).unwrap();
        let provenance = AmendmentProvenance {
            inquiry_id: None,
            position_id: None,
            proposer: UserId(1),
        };
        let ProposalOutcome::Proposed { amendment: first, .. } = engine
            .propose_amendment(node.id, FieldPath::Title, json!("A"), provenance)
            .unwrap()
        else {
            panic!()
        };
        engine
            .propose_amendment(node.id, FieldPath::Title, json!("B"), provenance)
            .unwrap();

        let err = engine.apply_amendment(first.id, UserId(1)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::AletheiaError::Amendment(AmendmentError::NotProposed { .. })
        ));
        // The node was not touched.
        assert_eq!(engine.node(node.id).unwrap().props.title, "old");
    }

    #[test]
    fn trigger_requires_verified_position() {
        let engine = engine();
        let node = engine.create_node("", titled("n")).unwrap();
        let inquiry = engine.create_inquiry(node.id, "").unwrap();
        let p = scored_position(&engine, inquiry.id, 0.70); // credible, not verified

        let err = engine
            .trigger_amendment(p.id, FieldPath::Title, json!("rewrite"))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::AletheiaError::Amendment(AmendmentError::PositionCannotAmend { .. })
        ));
    }

    #[test]
    fn trigger_fires_proposal_without_applying() {
        let engine = engine();
        let node = engine.create_node("", titled("original")).unwrap();
        let inquiry = engine.create_inquiry(node.id, "").unwrap();
        let p = scored_position(&engine, inquiry.id, 0.85); // default auto_amend 0.80

        let outcome = engine
            .trigger_amendment(p.id, FieldPath::Title, json!("rewritten"))
            .unwrap();
        assert!(matches!(outcome, ProposalOutcome::Proposed { .. }));

        // Proposal only: the node is untouched until an explicit apply.
        assert_eq!(engine.node(node.id).unwrap().props.title, "original");
    }

    #[test]
    fn trigger_auto_applies_when_configured() {
        let engine = GraphEngine::new(EngineConfig {
            threshold_config: None,
            auto_apply_verified: true,
        })
        .unwrap();
        let node = engine.create_node("", titled("original")).unwrap();
        let inquiry = engine.create_inquiry(node.id, "").unwrap();
        let p = scored_position(&engine, inquiry.id, 0.9);

        engine
            .trigger_amendment(p.id, FieldPath::Title, json!("rewritten"))
            .unwrap();
        assert_eq!(engine.node(node.id).unwrap().props.title, "rewritten");
    }

    fn make_eligible(engine: &GraphEngine, node_id: NodeId) {
        engine.set_methodology(
            "history",
            vec![WorkflowStep {
                name: "review".into(),
                required: true,
            }],
        );
        engine.complete_step(node_id, "review").unwrap();
        let challenge = engine.file_challenge(node_id).unwrap();
        engine
            .vote_on_challenge(
                challenge.id,
                ChallengeVote {
                    voter: UserId(2),
                    reputation: 100.0,
                    confidence: 1.0,
                    supports: true,
                },
            )
            .unwrap();
        engine.resolve_challenge(challenge.id).unwrap();
        engine
            .add_evidence(EvidenceItem {
                node_id,
                quality_tier: 0.98,
                source_credibility: 0.97,
                independent_validation: 0.96,
            })
            .unwrap();
    }

    #[test]
    fn promotion_freezes_node_and_appends_event() {
        let engine = engine();
        let node = engine.create_node("history", titled("claim")).unwrap();
        make_eligible(&engine, node.id);

        let event = engine
            .promote(node.id, PromotionKind::VerifiedTrue, UserId(3))
            .unwrap();
        assert_eq!(event.node_id, node.id);

        let node = engine.node(node.id).unwrap();
        assert!(node.is_level0);
        assert!((node.weight - 1.0).abs() < f64::EPSILON);
        assert_eq!(engine.promotions(node.id).len(), 1);
    }

    #[test]
    fn promotion_aborts_with_blockers_when_ineligible() {
        let engine = engine();
        let node = engine.create_node("history", titled("claim")).unwrap();
        // No methodology completion, no votes, no evidence.

        let err = engine
            .promote(node.id, PromotionKind::VerifiedTrue, UserId(3))
            .unwrap_err();
        let crate::error::AletheiaError::Promotion(PromotionError::NotEligible {
            blockers, ..
        }) = err
        else {
            panic!("expected NotEligible");
        };
        assert!(!blockers.is_empty());

        // No partial state: flag unset, ledger empty.
        let node = engine.node(node.id).unwrap();
        assert!(!node.is_level0);
        assert_eq!(engine.promotions(node.id).len(), 0);
    }

    #[test]
    fn second_promotion_reports_already_promoted() {
        let engine = engine();
        let node = engine.create_node("history", titled("claim")).unwrap();
        make_eligible(&engine, node.id);

        engine
            .promote(node.id, PromotionKind::VerifiedTrue, UserId(3))
            .unwrap();
        let err = engine
            .promote(node.id, PromotionKind::VerifiedTrue, UserId(4))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::AletheiaError::Promotion(PromotionError::AlreadyPromoted { .. })
        ));
        // Exactly one ledger entry.
        assert_eq!(engine.promotions(node.id).len(), 1);
    }

    #[test]
    fn promoted_node_refuses_amendments() {
        let engine = engine();
        let node = engine.create_node("history", titled("claim")).unwrap();
        make_eligible(&engine, node.id);
        engine
            .promote(node.id, PromotionKind::VerifiedFalse, UserId(3))
            .unwrap();

        let err = engine
            .propose_amendment(
                node.id,
                FieldPath::Title,
                json!("edit"),
                AmendmentProvenance {
                    inquiry_id: None,
                    position_id: None,
                    proposer: UserId(1),
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::AletheiaError::Amendment(AmendmentError::NodeImmutable { .. })
        ));
        // Verified-false fixes the weight at 0.0.
        assert!(engine.node(node.id).unwrap().weight.abs() < f64::EPSILON);
    }

    #[test]
    fn eligibility_snapshot_upserts() {
        let engine = engine();
        let node = engine.create_node("history", titled("claim")).unwrap();

        let first = engine.evaluate_node(node.id).unwrap();
        assert!(!first.eligible);
        assert_eq!(
            engine.eligibility_snapshot(node.id).unwrap().eligible,
            false
        );

        make_eligible(&engine, node.id);
        let second = engine.evaluate_node(node.id).unwrap();
        assert!(second.eligible);
        // Upsert replaced the snapshot.
        assert!(engine.eligibility_snapshot(node.id).unwrap().eligible);
    }

    #[test]
    fn info_counts() {
        let engine = engine();
        let a = engine.create_node("", titled("a")).unwrap();
        let b = engine.create_node("", titled("b")).unwrap();
        engine.add_edge(a.id, b.id, "supports", 0.9).unwrap();

        let info = engine.info();
        assert_eq!(info.nodes, 2);
        assert_eq!(info.edges, 1);
        assert_eq!(info.promotions, 0);
        assert!(format!("{info}").contains("nodes"));
    }
}
