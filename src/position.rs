//! Positions: arguments attached to an inquiry, carrying composite
//! credibility scores.
//!
//! Positions are created and re-scored by external collaborators; this core
//! re-derives their status through the threshold classifier on every score
//! change and groups them by tier for callers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::unix_now;
use crate::threshold::Thresholds;

/// Identifier for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "position:{}", self.0)
    }
}

/// Identifier for an inquiry (a debate thread).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InquiryId(pub u64);

impl fmt::Display for InquiryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inquiry:{}", self.0)
    }
}

/// Identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Whether a position supports, opposes, or is neutral toward its inquiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stance {
    Supporting,
    Opposing,
    Neutral,
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stance::Supporting => write!(f, "supporting"),
            Stance::Opposing => write!(f, "opposing"),
            Stance::Neutral => write!(f, "neutral"),
        }
    }
}

/// Classifier-derived status of a position.
///
/// The first four variants are the classifier's tiers; `Archived` is an
/// external lifecycle action, never produced by classification, and terminal
/// for rescoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    /// Score at or above the auto-amend cut-point: may gate an amendment.
    Verified,
    /// Counts toward the node's aggregate truth value.
    Credible,
    /// Visible but not counted.
    Weak,
    /// Hidden.
    Excluded,
    /// Withdrawn from the debate by an external action.
    Archived,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Verified => write!(f, "verified"),
            PositionStatus::Credible => write!(f, "credible"),
            PositionStatus::Weak => write!(f, "weak"),
            PositionStatus::Excluded => write!(f, "excluded"),
            PositionStatus::Archived => write!(f, "archived"),
        }
    }
}

/// Sub-scores feeding the composite credibility score.
///
/// Produced by the external scoring collaborator; opaque to this core beyond
/// being floats in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub evidence_quality: f64,
    pub source_credibility: f64,
    pub coherence: f64,
}

/// Community vote tallies on a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub supporting: u32,
    pub opposing: u32,
}

/// An argument attached to an inquiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub inquiry_id: InquiryId,
    pub author: UserId,
    pub stance: Stance,
    /// Composite credibility score in [0, 1].
    pub credibility_score: f64,
    pub sub_scores: SubScores,
    pub status: PositionStatus,
    pub votes: VoteTally,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Position {
    /// Create an unscored position. Until the first scoring pass it is
    /// excluded (score 0.0).
    pub fn new(id: PositionId, inquiry_id: InquiryId, author: UserId, stance: Stance) -> Self {
        let now = unix_now();
        Self {
            id,
            inquiry_id,
            author,
            stance,
            credibility_score: 0.0,
            sub_scores: SubScores::default(),
            status: PositionStatus::Excluded,
            votes: VoteTally::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Tier grouping & statistics
// ---------------------------------------------------------------------------

/// Positions of one inquiry grouped by classifier tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierBuckets {
    pub verified: Vec<Position>,
    pub credible: Vec<Position>,
    pub weak: Vec<Position>,
    pub excluded: Vec<Position>,
    pub archived: Vec<Position>,
}

impl TierBuckets {
    /// Group positions by their stored status. Each bucket is sorted by
    /// descending credibility.
    pub fn group(positions: impl IntoIterator<Item = Position>) -> Self {
        let mut buckets = Self::default();
        for p in positions {
            match p.status {
                PositionStatus::Verified => buckets.verified.push(p),
                PositionStatus::Credible => buckets.credible.push(p),
                PositionStatus::Weak => buckets.weak.push(p),
                PositionStatus::Excluded => buckets.excluded.push(p),
                PositionStatus::Archived => buckets.archived.push(p),
            }
        }
        for bucket in [
            &mut buckets.verified,
            &mut buckets.credible,
            &mut buckets.weak,
            &mut buckets.excluded,
            &mut buckets.archived,
        ] {
            bucket.sort_by(|a, b| {
                b.credibility_score
                    .partial_cmp(&a.credibility_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        buckets
    }
}

/// Per-inquiry threshold statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdStats {
    pub inquiry_id: InquiryId,
    /// The thresholds the counts were derived under.
    pub thresholds: Thresholds,
    pub total: usize,
    pub verified: usize,
    pub credible: usize,
    pub weak: usize,
    pub excluded: usize,
    pub archived: usize,
    /// Mean composite credibility over non-archived positions; 0.0 when none.
    pub mean_credibility: f64,
}

impl ThresholdStats {
    /// Compute statistics over an inquiry's positions.
    pub fn compute(
        inquiry_id: InquiryId,
        thresholds: Thresholds,
        positions: &[Position],
    ) -> Self {
        let mut stats = Self {
            inquiry_id,
            thresholds,
            total: positions.len(),
            verified: 0,
            credible: 0,
            weak: 0,
            excluded: 0,
            archived: 0,
            mean_credibility: 0.0,
        };

        let mut sum = 0.0;
        let mut counted = 0usize;
        for p in positions {
            match p.status {
                PositionStatus::Verified => stats.verified += 1,
                PositionStatus::Credible => stats.credible += 1,
                PositionStatus::Weak => stats.weak += 1,
                PositionStatus::Excluded => stats.excluded += 1,
                PositionStatus::Archived => stats.archived += 1,
            }
            if p.status != PositionStatus::Archived {
                sum += p.credibility_score;
                counted += 1;
            }
        }
        if counted > 0 {
            stats.mean_credibility = sum / counted as f64;
        }
        stats
    }
}
