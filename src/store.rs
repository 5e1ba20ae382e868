//! The shared single-process datastore.
//!
//! Concurrent DashMap collections hold every record family; the graph
//! topology lives in [`CredibilityGraph`]. Traversal reads tolerate
//! snapshot-level inconsistency, but amendment application and promotion
//! commits are serialized through the per-node lock table so that only one
//! read-modify-write transaction touches a node at a time.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;

use crate::amendment::{Amendment, AmendmentId, AmendmentStatus, FieldPath};
use crate::error::StoreError;
use crate::graph::NodeId;
use crate::graph::index::CredibilityGraph;
use crate::position::{InquiryId, Position, PositionId};
use crate::promotion::{
    Challenge, ChallengeId, ChallengeVote, EligibilityReport, EvidenceItem, PromotionEvent,
    WorkflowStep,
};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Thread-safe monotonic id allocator shared by every record family.
///
/// Produces ids starting from 1; safe to share via `Arc`.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next raw id.
    pub fn next_id(&self) -> StoreResult<u64> {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        if raw == 0 {
            // fetch_add wrapped: 2^64 allocations happened.
            return Err(StoreError::IdsExhausted);
        }
        Ok(raw)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// An inquiry: a debate thread attached to a node.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Inquiry {
    pub id: InquiryId,
    /// The node whose truth claim is under debate.
    pub node_id: NodeId,
    /// Category selecting thresholds and methodology.
    pub category: String,
    pub created_at: u64,
}

/// Shared mutable store for every record family the engine operates on.
pub struct Store {
    /// Graph topology and node records.
    pub graph: CredibilityGraph,

    inquiries: DashMap<InquiryId, Inquiry>,
    positions: DashMap<PositionId, Position>,
    inquiry_positions: DashMap<InquiryId, Vec<PositionId>>,

    amendments: DashMap<AmendmentId, Amendment>,
    /// The single pending amendment per (node, field), if any.
    pending_amendments: DashMap<(NodeId, FieldPath), AmendmentId>,
    node_amendments: DashMap<NodeId, Vec<AmendmentId>>,

    challenges: DashMap<ChallengeId, Challenge>,
    node_challenges: DashMap<NodeId, Vec<ChallengeId>>,
    evidence: DashMap<NodeId, Vec<EvidenceItem>>,

    /// Workflow definitions per category.
    methodologies: DashMap<String, Vec<WorkflowStep>>,
    /// Completed step names per node.
    step_progress: DashMap<NodeId, HashSet<String>>,

    /// Latest eligibility snapshot per node (upsert by node id).
    eligibility: DashMap<NodeId, EligibilityReport>,
    /// Append-only promotion ledger.
    promotion_ledger: RwLock<Vec<PromotionEvent>>,

    /// Per-node transaction locks.
    node_locks: DashMap<NodeId, Arc<Mutex<()>>>,

    /// Shared id allocator for all record families.
    pub ids: IdAllocator,
}

impl Store {
    pub fn new() -> Self {
        Self {
            graph: CredibilityGraph::new(),
            inquiries: DashMap::new(),
            positions: DashMap::new(),
            inquiry_positions: DashMap::new(),
            amendments: DashMap::new(),
            pending_amendments: DashMap::new(),
            node_amendments: DashMap::new(),
            challenges: DashMap::new(),
            node_challenges: DashMap::new(),
            evidence: DashMap::new(),
            methodologies: DashMap::new(),
            step_progress: DashMap::new(),
            eligibility: DashMap::new(),
            promotion_ledger: RwLock::new(Vec::new()),
            node_locks: DashMap::new(),
            ids: IdAllocator::new(),
        }
    }

    /// The lock serializing read-modify-write transactions on a node.
    pub fn node_lock(&self, node_id: NodeId) -> Arc<Mutex<()>> {
        self.node_locks
            .entry(node_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // --- inquiries & positions ---

    pub fn insert_inquiry(&self, inquiry: Inquiry) {
        self.inquiries.insert(inquiry.id, inquiry);
    }

    pub fn inquiry(&self, id: InquiryId) -> Option<Inquiry> {
        self.inquiries.get(&id).map(|i| i.value().clone())
    }

    pub fn insert_position(&self, position: Position) {
        self.inquiry_positions
            .entry(position.inquiry_id)
            .or_default()
            .push(position.id);
        self.positions.insert(position.id, position);
    }

    pub fn position(&self, id: PositionId) -> StoreResult<Position> {
        self.positions
            .get(&id)
            .map(|p| p.value().clone())
            .ok_or(StoreError::PositionNotFound { position_id: id.0 })
    }

    /// Mutate a position in place.
    pub fn update_position<R>(
        &self,
        id: PositionId,
        f: impl FnOnce(&mut Position) -> R,
    ) -> StoreResult<R> {
        let mut entry = self
            .positions
            .get_mut(&id)
            .ok_or(StoreError::PositionNotFound { position_id: id.0 })?;
        Ok(f(entry.value_mut()))
    }

    pub fn positions_for_inquiry(&self, inquiry_id: InquiryId) -> Vec<Position> {
        let Some(ids) = self.inquiry_positions.get(&inquiry_id) else {
            return Vec::new();
        };
        ids.value()
            .iter()
            .filter_map(|id| self.positions.get(id).map(|p| p.value().clone()))
            .collect()
    }

    // --- amendments ---

    pub fn insert_amendment(&self, amendment: Amendment) {
        if amendment.status == AmendmentStatus::Proposed {
            self.pending_amendments.insert(
                (amendment.node_id, amendment.field_path.clone()),
                amendment.id,
            );
        }
        self.node_amendments
            .entry(amendment.node_id)
            .or_default()
            .push(amendment.id);
        self.amendments.insert(amendment.id, amendment);
    }

    pub fn amendment(&self, id: AmendmentId) -> Option<Amendment> {
        self.amendments.get(&id).map(|a| a.value().clone())
    }

    /// The pending amendment for a (node, field) pair, if any.
    pub fn pending_amendment(&self, node_id: NodeId, field: &FieldPath) -> Option<Amendment> {
        let id = *self
            .pending_amendments
            .get(&(node_id, field.clone()))?
            .value();
        self.amendment(id)
    }

    /// Transition an amendment's status, maintaining the pending index.
    ///
    /// The caller is responsible for having validated the transition.
    pub fn set_amendment_status(
        &self,
        id: AmendmentId,
        status: AmendmentStatus,
        decided_at: Option<u64>,
        decided_by: Option<crate::position::UserId>,
    ) {
        if let Some(mut entry) = self.amendments.get_mut(&id) {
            let amendment = entry.value_mut();
            amendment.status = status;
            amendment.decided_at = decided_at;
            amendment.decided_by = decided_by;
            if status != AmendmentStatus::Proposed {
                let key = (amendment.node_id, amendment.field_path.clone());
                // Only clear the index if it still points at this amendment —
                // a superseding proposal may already have replaced it.
                if self
                    .pending_amendments
                    .get(&key)
                    .is_some_and(|e| *e.value() == id)
                {
                    self.pending_amendments.remove(&key);
                }
            }
        }
    }

    /// Full amendment history for a node, optionally narrowed to one field,
    /// in proposal order.
    pub fn amendment_history(
        &self,
        node_id: NodeId,
        field: Option<&FieldPath>,
    ) -> Vec<Amendment> {
        let Some(ids) = self.node_amendments.get(&node_id) else {
            return Vec::new();
        };
        ids.value()
            .iter()
            .filter_map(|id| self.amendments.get(id).map(|a| a.value().clone()))
            .filter(|a| field.is_none_or(|f| &a.field_path == f))
            .collect()
    }

    // --- challenges & evidence ---

    pub fn insert_challenge(&self, challenge: Challenge) {
        self.node_challenges
            .entry(challenge.node_id)
            .or_default()
            .push(challenge.id);
        self.challenges.insert(challenge.id, challenge);
    }

    pub fn challenge(&self, id: ChallengeId) -> StoreResult<Challenge> {
        self.challenges
            .get(&id)
            .map(|c| c.value().clone())
            .ok_or(StoreError::ChallengeNotFound { challenge_id: id.0 })
    }

    pub fn update_challenge<R>(
        &self,
        id: ChallengeId,
        f: impl FnOnce(&mut Challenge) -> R,
    ) -> StoreResult<R> {
        let mut entry = self
            .challenges
            .get_mut(&id)
            .ok_or(StoreError::ChallengeNotFound { challenge_id: id.0 })?;
        Ok(f(entry.value_mut()))
    }

    pub fn add_vote(&self, id: ChallengeId, vote: ChallengeVote) -> StoreResult<()> {
        self.update_challenge(id, |c| c.votes.push(vote))
    }

    pub fn challenges_for_node(&self, node_id: NodeId) -> Vec<Challenge> {
        let Some(ids) = self.node_challenges.get(&node_id) else {
            return Vec::new();
        };
        ids.value()
            .iter()
            .filter_map(|id| self.challenges.get(id).map(|c| c.value().clone()))
            .collect()
    }

    pub fn add_evidence(&self, item: EvidenceItem) {
        self.evidence.entry(item.node_id).or_default().push(item);
    }

    pub fn evidence_for_node(&self, node_id: NodeId) -> Vec<EvidenceItem> {
        self.evidence
            .get(&node_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    // --- methodology ---

    pub fn set_methodology(&self, category: impl Into<String>, steps: Vec<WorkflowStep>) {
        self.methodologies.insert(category.into(), steps);
    }

    pub fn methodology(&self, category: &str) -> Option<Vec<WorkflowStep>> {
        self.methodologies.get(category).map(|s| s.value().clone())
    }

    pub fn complete_step(&self, node_id: NodeId, step: impl Into<String>) {
        self.step_progress
            .entry(node_id)
            .or_default()
            .insert(step.into());
    }

    pub fn completed_steps(&self, node_id: NodeId) -> HashSet<String> {
        self.step_progress
            .get(&node_id)
            .map(|s| s.value().clone())
            .unwrap_or_default()
    }

    // --- eligibility snapshots & promotion ledger ---

    /// Upsert the latest eligibility snapshot for a node.
    pub fn upsert_eligibility(&self, report: EligibilityReport) {
        self.eligibility.insert(report.node_id, report);
    }

    pub fn eligibility_snapshot(&self, node_id: NodeId) -> Option<EligibilityReport> {
        self.eligibility.get(&node_id).map(|r| r.value().clone())
    }

    /// Append to the promotion ledger. Entries are never mutated or removed.
    pub fn append_promotion(&self, event: PromotionEvent) {
        self.promotion_ledger
            .write()
            .expect("promotion ledger lock poisoned")
            .push(event);
    }

    pub fn promotions_for_node(&self, node_id: NodeId) -> Vec<PromotionEvent> {
        self.promotion_ledger
            .read()
            .expect("promotion ledger lock poisoned")
            .iter()
            .filter(|e| e.node_id == node_id)
            .cloned()
            .collect()
    }

    pub fn promotion_count(&self) -> usize {
        self.promotion_ledger
            .read()
            .expect("promotion ledger lock poisoned")
            .len()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("graph", &self.graph)
            .field("positions", &self.positions.len())
            .field("amendments", &self.amendments.len())
            .field("challenges", &self.challenges.len())
            .field("promotions", &self.promotion_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeProps, unix_now};
    use crate::position::{Stance, UserId};

    fn nid(id: u64) -> NodeId {
        NodeId::new(id).unwrap()
    }

    #[test]
    fn allocator_produces_sequential_ids() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next_id().unwrap(), 1);
        assert_eq!(ids.next_id().unwrap(), 2);
        assert_eq!(ids.next_id().unwrap(), 3);
    }

    #[test]
    fn positions_indexed_by_inquiry() {
        let store = Store::new();
        let inquiry = InquiryId(1);
        store.insert_position(Position::new(
            PositionId(1),
            inquiry,
            UserId(1),
            Stance::Supporting,
        ));
        store.insert_position(Position::new(
            PositionId(2),
            inquiry,
            UserId(2),
            Stance::Opposing,
        ));
        store.insert_position(Position::new(
            PositionId(3),
            InquiryId(2),
            UserId(3),
            Stance::Neutral,
        ));

        assert_eq!(store.positions_for_inquiry(inquiry).len(), 2);
        assert_eq!(store.positions_for_inquiry(InquiryId(99)).len(), 0);
    }

    #[test]
    fn missing_position_is_not_found() {
        let store = Store::new();
        assert!(matches!(
            store.position(PositionId(9)),
            Err(StoreError::PositionNotFound { position_id: 9 })
        ));
    }

    #[test]
    fn node_lock_is_shared_per_node() {
        let store = Store::new();
        let a = store.node_lock(nid(1));
        let b = store.node_lock(nid(1));
        assert!(Arc::ptr_eq(&a, &b));
        let other = store.node_lock(nid(2));
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[test]
    fn promotion_ledger_appends() {
        use crate::promotion::{CriterionScores, PromotionKind};
        let store = Store::new();
        store.graph.insert_node(Node::new(nid(1), NodeProps::default()));

        let criteria = CriterionScores {
            methodology: 1.0,
            consensus: 1.0,
            evidence: 1.0,
            challenge_pass: 1.0,
        };
        store.append_promotion(PromotionEvent {
            id: 1,
            node_id: nid(1),
            kind: PromotionKind::VerifiedTrue,
            criteria,
            overall: 1.0,
            curator: UserId(1),
            promoted_at: unix_now(),
        });

        assert_eq!(store.promotion_count(), 1);
        assert_eq!(store.promotions_for_node(nid(1)).len(), 1);
        assert_eq!(store.promotions_for_node(nid(2)).len(), 0);
    }

    #[test]
    fn evidence_and_steps_round_trip() {
        let store = Store::new();
        store.add_evidence(EvidenceItem {
            node_id: nid(1),
            quality_tier: 0.9,
            source_credibility: 0.8,
            independent_validation: 0.7,
        });
        assert_eq!(store.evidence_for_node(nid(1)).len(), 1);

        store.complete_step(nid(1), "source-review");
        store.complete_step(nid(1), "source-review"); // idempotent
        assert_eq!(store.completed_steps(nid(1)).len(), 1);
    }
}
