//! Promotion eligibility: four independent criteria gating entry into the
//! immutable verified layer.
//!
//! The overall score is a fixed-weight sum used for *ranking and diagnostics
//! only*. Eligibility is a conjunction of hard per-criterion gates — a node
//! with a high overall score but one failing criterion is ineligible.
//!
//! # Criteria
//!
//! 1. **Methodology completion** — weighted completion of the category's
//!    workflow steps (required 1.0, optional 0.5); absent methodology earns
//!    partial credit (0.5), not zero and not full.
//! 2. **Community consensus** — reputation-weighted vote share on resolved
//!    challenges; each vote's influence is `sqrt(reputation) * confidence`;
//!    zero votes is zero consensus (no free pass).
//! 3. **Evidence quality** — mean over evidence items of the average of
//!    quality tier, source credibility, and independent validation.
//! 4. **Open challenges** — a binary pass, 1.0 iff none open, weighted
//!    lightly into the overall score.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::{NodeId, unix_now};
use crate::position::UserId;

/// Fixed overall-score weights: methodology, consensus, evidence, challenge pass.
const OVERALL_WEIGHTS: (f64, f64, f64, f64) = (0.25, 0.40, 0.30, 0.05);

/// Hard per-criterion gates. Methodology must be fully complete; consensus
/// and evidence have near-unanimity bars; open challenges must be zero.
const METHODOLOGY_GATE: f64 = 1.0;
const CONSENSUS_GATE: f64 = 0.99;
const EVIDENCE_GATE: f64 = 0.95;

// ---------------------------------------------------------------------------
// Evaluator inputs
// ---------------------------------------------------------------------------

/// Identifier for a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChallengeId(pub u64);

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "challenge:{}", self.0)
    }
}

/// Lifecycle of a challenge against a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeStatus {
    Open,
    Resolved,
}

/// A reputation-weighted vote on a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChallengeVote {
    pub voter: UserId,
    /// The voter's reputation, supplied by the external reputation system.
    pub reputation: f64,
    /// The voter's stated confidence in [0, 1].
    pub confidence: f64,
    /// True when the vote supports the node surviving the challenge.
    pub supports: bool,
}

impl ChallengeVote {
    /// Influence of this vote: `sqrt(reputation) * confidence`.
    ///
    /// The square root damps reputation so that high-reputation voters
    /// cannot single-handedly swamp a consensus.
    pub fn influence(&self) -> f64 {
        self.reputation.max(0.0).sqrt() * self.confidence.clamp(0.0, 1.0)
    }
}

/// A community challenge filed against a node's truth claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub node_id: NodeId,
    pub status: ChallengeStatus,
    pub votes: Vec<ChallengeVote>,
    pub created_at: u64,
}

impl Challenge {
    pub fn new(id: ChallengeId, node_id: NodeId) -> Self {
        Self {
            id,
            node_id,
            status: ChallengeStatus::Open,
            votes: Vec::new(),
            created_at: unix_now(),
        }
    }
}

/// One piece of evidence attached to a node, pre-scored by collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub node_id: NodeId,
    /// Quality-tier score in [0, 1].
    pub quality_tier: f64,
    /// Source credibility in [0, 1].
    pub source_credibility: f64,
    /// Independent validation score in [0, 1].
    pub independent_validation: f64,
}

impl EvidenceItem {
    /// Average of the three per-item scores.
    pub fn item_score(&self) -> f64 {
        (self.quality_tier + self.source_credibility + self.independent_validation) / 3.0
    }
}

/// One step of a category's methodology workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    pub required: bool,
}

impl WorkflowStep {
    /// Required steps weigh 1.0, optional steps 0.5.
    pub fn weight(&self) -> f64 {
        if self.required { 1.0 } else { 0.5 }
    }
}

/// Everything the evaluator needs for one node, assembled by the caller.
#[derive(Debug)]
pub struct EligibilityInputs<'a> {
    pub node_id: NodeId,
    /// The category's workflow steps; `None` when no methodology is defined.
    pub steps: Option<&'a [WorkflowStep]>,
    /// Names of the steps completed for this node.
    pub completed_steps: &'a HashSet<String>,
    /// All challenges targeting the node.
    pub challenges: &'a [Challenge],
    /// All evidence attached to the node.
    pub evidence: &'a [EvidenceItem],
}

// ---------------------------------------------------------------------------
// Criterion scoring
// ---------------------------------------------------------------------------

/// Weighted methodology completion.
///
/// Absent or empty methodology earns 0.5 — partial credit, neither a free
/// pass nor a disqualification.
pub fn methodology_score(steps: Option<&[WorkflowStep]>, completed: &HashSet<String>) -> f64 {
    let Some(steps) = steps else {
        return 0.5;
    };
    if steps.is_empty() {
        return 0.5;
    }
    let total: f64 = steps.iter().map(WorkflowStep::weight).sum();
    let done: f64 = steps
        .iter()
        .filter(|s| completed.contains(&s.name))
        .map(WorkflowStep::weight)
        .sum();
    done / total
}

/// Reputation-weighted consensus across resolved challenges.
///
/// Zero votes yields zero — silence is not agreement.
pub fn consensus_score(challenges: &[Challenge]) -> f64 {
    let mut supporting = 0.0;
    let mut total = 0.0;
    for challenge in challenges {
        if challenge.status != ChallengeStatus::Resolved {
            continue;
        }
        for vote in &challenge.votes {
            let influence = vote.influence();
            total += influence;
            if vote.supports {
                supporting += influence;
            }
        }
    }
    if total > 0.0 { supporting / total } else { 0.0 }
}

/// Mean evidence quality; zero evidence yields zero.
pub fn evidence_score(evidence: &[EvidenceItem]) -> f64 {
    if evidence.is_empty() {
        return 0.0;
    }
    evidence.iter().map(EvidenceItem::item_score).sum::<f64>() / evidence.len() as f64
}

/// Count of challenges still open against the node.
pub fn open_challenge_count(challenges: &[Challenge]) -> usize {
    challenges
        .iter()
        .filter(|c| c.status == ChallengeStatus::Open)
        .count()
}

// ---------------------------------------------------------------------------
// Eligibility report
// ---------------------------------------------------------------------------

/// The four normalized criterion values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriterionScores {
    pub methodology: f64,
    pub consensus: f64,
    pub evidence: f64,
    /// 1.0 iff zero open challenges.
    pub challenge_pass: f64,
}

impl CriterionScores {
    /// The fixed-weight overall score — diagnostic and ranking only.
    pub fn overall(&self) -> f64 {
        let (wm, wc, we, wp) = OVERALL_WEIGHTS;
        self.methodology * wm + self.consensus * wc + self.evidence * we + self.challenge_pass * wp
    }
}

/// Which criterion a blocker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockerCategory {
    Methodology,
    Consensus,
    Evidence,
    OpenChallenges,
}

impl fmt::Display for BlockerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockerCategory::Methodology => write!(f, "methodology"),
            BlockerCategory::Consensus => write!(f, "consensus"),
            BlockerCategory::Evidence => write!(f, "evidence"),
            BlockerCategory::OpenChallenges => write!(f, "open-challenges"),
        }
    }
}

/// One failing criterion with its numeric gap to the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blocker {
    pub category: BlockerCategory,
    /// How far the criterion is below its gate (for open challenges, the count).
    pub gap: f64,
    pub message: String,
}

fn recommendation_for(category: BlockerCategory) -> &'static str {
    match category {
        BlockerCategory::Methodology => {
            "Complete every remaining workflow step for the node's category, \
             including optional ones."
        }
        BlockerCategory::Consensus => {
            "Gather broader community review: consensus must be near-unanimous \
             among reputation-weighted votes on resolved challenges."
        }
        BlockerCategory::Evidence => {
            "Attach higher-quality evidence with independent validation; \
             the evidence bar is intentionally strict."
        }
        BlockerCategory::OpenChallenges => {
            "Resolve every open challenge before attempting promotion."
        }
    }
}

/// A point-in-time eligibility evaluation, persisted as the latest snapshot
/// per node (upsert by node id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub node_id: NodeId,
    pub criteria: CriterionScores,
    pub open_challenges: usize,
    /// Diagnostic/ranking score — never the eligibility test itself.
    pub overall: f64,
    pub eligible: bool,
    pub blockers: Vec<Blocker>,
    pub recommendations: Vec<String>,
    pub evaluated_at: u64,
}

/// Evaluate a node's promotion eligibility.
///
/// Eligibility requires *every* criterion to independently clear its gate:
/// methodology fully complete, consensus >= 0.99, evidence >= 0.95, and zero
/// open challenges. The overall score never substitutes for the gates.
pub fn evaluate(inputs: &EligibilityInputs<'_>) -> EligibilityReport {
    let open = open_challenge_count(inputs.challenges);
    let criteria = CriterionScores {
        methodology: methodology_score(inputs.steps, inputs.completed_steps),
        consensus: consensus_score(inputs.challenges),
        evidence: evidence_score(inputs.evidence),
        challenge_pass: if open == 0 { 1.0 } else { 0.0 },
    };

    let mut blockers = Vec::new();
    if criteria.methodology < METHODOLOGY_GATE {
        let gap = METHODOLOGY_GATE - criteria.methodology;
        blockers.push(Blocker {
            category: BlockerCategory::Methodology,
            gap,
            message: format!(
                "methodology completion {:.2} below required {METHODOLOGY_GATE:.2} (gap {gap:.2})",
                criteria.methodology
            ),
        });
    }
    if criteria.consensus < CONSENSUS_GATE {
        let gap = CONSENSUS_GATE - criteria.consensus;
        blockers.push(Blocker {
            category: BlockerCategory::Consensus,
            gap,
            message: format!(
                "community consensus {:.2} below required {CONSENSUS_GATE:.2} (gap {gap:.2})",
                criteria.consensus
            ),
        });
    }
    if criteria.evidence < EVIDENCE_GATE {
        let gap = EVIDENCE_GATE - criteria.evidence;
        blockers.push(Blocker {
            category: BlockerCategory::Evidence,
            gap,
            message: format!(
                "evidence quality {:.2} below required {EVIDENCE_GATE:.2} (gap {gap:.2})",
                criteria.evidence
            ),
        });
    }
    if open > 0 {
        blockers.push(Blocker {
            category: BlockerCategory::OpenChallenges,
            gap: open as f64,
            message: format!("{open} open challenge(s) must be resolved"),
        });
    }

    let recommendations = blockers
        .iter()
        .map(|b| recommendation_for(b.category).to_string())
        .collect();

    EligibilityReport {
        node_id: inputs.node_id,
        overall: criteria.overall(),
        open_challenges: open,
        eligible: blockers.is_empty(),
        criteria,
        blockers,
        recommendations,
        evaluated_at: unix_now(),
    }
}

// ---------------------------------------------------------------------------
// Promotion ledger
// ---------------------------------------------------------------------------

/// Whether promotion fixes the node as verified-true or verified-false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionKind {
    /// Weight is fixed at 1.0.
    VerifiedTrue,
    /// Weight is fixed at 0.0.
    VerifiedFalse,
}

impl PromotionKind {
    /// The frozen veracity weight this promotion assigns.
    pub fn final_weight(self) -> f64 {
        match self {
            PromotionKind::VerifiedTrue => 1.0,
            PromotionKind::VerifiedFalse => 0.0,
        }
    }
}

impl fmt::Display for PromotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromotionKind::VerifiedTrue => write!(f, "verified-true"),
            PromotionKind::VerifiedFalse => write!(f, "verified-false"),
        }
    }
}

/// Append-only ledger entry recording a completed promotion.
///
/// Never mutated or deleted; captures the criterion values at the moment of
/// promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionEvent {
    pub id: u64,
    pub node_id: NodeId,
    pub kind: PromotionKind,
    pub criteria: CriterionScores,
    pub overall: f64,
    pub curator: UserId,
    pub promoted_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nid(id: u64) -> NodeId {
        NodeId::new(id).unwrap()
    }

    fn steps() -> Vec<WorkflowStep> {
        vec![
            WorkflowStep {
                name: "source-review".into(),
                required: true,
            },
            WorkflowStep {
                name: "peer-check".into(),
                required: true,
            },
            WorkflowStep {
                name: "archival-scan".into(),
                required: false,
            },
        ]
    }

    fn completed(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn resolved_challenge(id: u64, votes: Vec<ChallengeVote>) -> Challenge {
        let mut c = Challenge::new(ChallengeId(id), nid(1));
        c.status = ChallengeStatus::Resolved;
        c.votes = votes;
        c
    }

    fn vote(reputation: f64, confidence: f64, supports: bool) -> ChallengeVote {
        ChallengeVote {
            voter: UserId(1),
            reputation,
            confidence,
            supports,
        }
    }

    fn strong_evidence(n: usize) -> Vec<EvidenceItem> {
        (0..n)
            .map(|_| EvidenceItem {
                node_id: nid(1),
                quality_tier: 0.98,
                source_credibility: 0.97,
                independent_validation: 0.96,
            })
            .collect()
    }

    // --- methodology ---

    #[test]
    fn methodology_weights_required_over_optional() {
        let steps = steps();
        // Both required done, optional missing: 2.0 / 2.5 = 0.8
        let score = methodology_score(Some(&steps), &completed(&["source-review", "peer-check"]));
        assert!((score - 0.8).abs() < 1e-9);

        // Everything done: 1.0
        let score = methodology_score(
            Some(&steps),
            &completed(&["source-review", "peer-check", "archival-scan"]),
        );
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn absent_methodology_is_partial_credit() {
        assert!((methodology_score(None, &HashSet::new()) - 0.5).abs() < f64::EPSILON);
        assert!((methodology_score(Some(&[]), &HashSet::new()) - 0.5).abs() < f64::EPSILON);
    }

    // --- consensus ---

    #[test]
    fn consensus_is_influence_share() {
        // Supporting: sqrt(100)*1.0 = 10; opposing: sqrt(25)*0.8 = 4.
        let challenges = vec![resolved_challenge(
            1,
            vec![vote(100.0, 1.0, true), vote(25.0, 0.8, false)],
        )];
        let score = consensus_score(&challenges);
        assert!((score - 10.0 / 14.0).abs() < 1e-9);
    }

    #[test]
    fn zero_votes_is_zero_consensus() {
        assert!(consensus_score(&[]).abs() < f64::EPSILON);
        let unresolved = vec![Challenge::new(ChallengeId(1), nid(1))];
        assert!(consensus_score(&unresolved).abs() < f64::EPSILON);
    }

    #[test]
    fn open_challenge_votes_do_not_count() {
        let mut open = Challenge::new(ChallengeId(1), nid(1));
        open.votes = vec![vote(100.0, 1.0, true)];
        let resolved = resolved_challenge(2, vec![vote(9.0, 1.0, false)]);

        // Only the resolved challenge's opposing vote counts.
        let score = consensus_score(&[open, resolved]);
        assert!(score.abs() < f64::EPSILON);
    }

    // --- evidence ---

    #[test]
    fn evidence_is_mean_of_item_averages() {
        let items = vec![
            EvidenceItem {
                node_id: nid(1),
                quality_tier: 0.9,
                source_credibility: 0.6,
                independent_validation: 0.3,
            },
            EvidenceItem {
                node_id: nid(1),
                quality_tier: 1.0,
                source_credibility: 1.0,
                independent_validation: 1.0,
            },
        ];
        // Item averages 0.6 and 1.0 → mean 0.8.
        assert!((evidence_score(&items) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn zero_evidence_is_zero() {
        assert!(evidence_score(&[]).abs() < f64::EPSILON);
    }

    // --- eligibility ---

    fn eligible_inputs<'a>(
        steps: &'a [WorkflowStep],
        completed: &'a HashSet<String>,
        challenges: &'a [Challenge],
        evidence: &'a [EvidenceItem],
    ) -> EligibilityInputs<'a> {
        EligibilityInputs {
            node_id: nid(1),
            steps: Some(steps),
            completed_steps: completed,
            challenges,
            evidence,
        }
    }

    #[test]
    fn fully_cleared_node_is_eligible() {
        let steps = steps();
        let done = completed(&["source-review", "peer-check", "archival-scan"]);
        let challenges = vec![resolved_challenge(1, vec![vote(50.0, 0.9, true)])];
        let evidence = strong_evidence(3);

        let report = evaluate(&eligible_inputs(&steps, &done, &challenges, &evidence));
        assert!(report.eligible, "blockers: {:?}", report.blockers);
        assert!(report.blockers.is_empty());
        assert!(report.overall > 0.9);
    }

    #[test]
    fn high_overall_does_not_bypass_gates() {
        // Consensus 0.95 with everything else perfect: overall is high but
        // the node must be ineligible.
        let steps = steps();
        let done = completed(&["source-review", "peer-check", "archival-scan"]);
        // 95 supporting vs 5 opposing influence: sqrt values chosen to land
        // at 0.95 exactly: supporting 19, total 20.
        let challenges = vec![resolved_challenge(
            1,
            vec![vote(361.0, 1.0, true), vote(1.0, 1.0, false)],
        )];
        let evidence = strong_evidence(3);

        let report = evaluate(&eligible_inputs(&steps, &done, &challenges, &evidence));
        assert!((report.criteria.consensus - 0.95).abs() < 1e-9);
        assert!(report.overall > 0.9);
        assert!(!report.eligible);
        assert_eq!(report.blockers.len(), 1);
        assert_eq!(report.blockers[0].category, BlockerCategory::Consensus);
        assert!((report.blockers[0].gap - 0.04).abs() < 1e-9);
    }

    #[test]
    fn open_challenges_block_with_count_gap() {
        let steps = steps();
        let done = completed(&["source-review", "peer-check", "archival-scan"]);
        let mut challenges = vec![resolved_challenge(1, vec![vote(100.0, 1.0, true)])];
        challenges.push(Challenge::new(ChallengeId(2), nid(1)));
        challenges.push(Challenge::new(ChallengeId(3), nid(1)));
        let evidence = strong_evidence(2);

        let report = evaluate(&eligible_inputs(&steps, &done, &challenges, &evidence));
        assert!(!report.eligible);
        assert_eq!(report.open_challenges, 2);
        let blocker = report
            .blockers
            .iter()
            .find(|b| b.category == BlockerCategory::OpenChallenges)
            .unwrap();
        assert!((blocker.gap - 2.0).abs() < f64::EPSILON);
        assert!((report.criteria.challenge_pass).abs() < f64::EPSILON);
    }

    #[test]
    fn each_blocker_gets_a_recommendation() {
        let inputs = EligibilityInputs {
            node_id: nid(1),
            steps: Some(&[]),
            completed_steps: &HashSet::new(),
            challenges: &[],
            evidence: &[],
        };
        let report = evaluate(&inputs);
        // Methodology 0.5, consensus 0, evidence 0 all fail; no open challenges.
        assert_eq!(report.blockers.len(), 3);
        assert_eq!(report.recommendations.len(), 3);
        assert!(!report.eligible);
    }

    #[test]
    fn overall_uses_fixed_weights() {
        let criteria = CriterionScores {
            methodology: 1.0,
            consensus: 1.0,
            evidence: 1.0,
            challenge_pass: 1.0,
        };
        assert!((criteria.overall() - 1.0).abs() < 1e-9);

        let criteria = CriterionScores {
            methodology: 1.0,
            consensus: 0.0,
            evidence: 0.0,
            challenge_pass: 0.0,
        };
        assert!((criteria.overall() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn promotion_kind_final_weight() {
        assert!((PromotionKind::VerifiedTrue.final_weight() - 1.0).abs() < f64::EPSILON);
        assert!(PromotionKind::VerifiedFalse.final_weight().abs() < f64::EPSILON);
        assert_eq!(PromotionKind::VerifiedTrue.to_string(), "verified-true");
    }
}
