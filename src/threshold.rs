//! Credibility threshold registry and the three-tier classifier.
//!
//! Each inquiry category carries three ordered cut-points
//! (`display <= inclusion <= auto_amend`). Classification is a pure function
//! of `(score, thresholds)` — idempotent, with no hysteresis: prior status
//! never influences the next derivation.

use std::collections::BTreeMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::ThresholdError;
use crate::position::PositionStatus;

/// Result type for threshold operations.
pub type ThresholdResult<T> = std::result::Result<T, ThresholdError>;

/// Safe fallback cut-points for unconfigured categories.
const DEFAULT_CUTPOINTS: (f64, f64, f64) = (0.30, 0.60, 0.80);

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Three ordered credibility cut-points for one inquiry category.
///
/// - `score >= auto_amend` → verified (may gate an amendment)
/// - `inclusion <= score < auto_amend` → credible (counts toward aggregates)
/// - `display <= score < inclusion` → weak (visible, not counted)
/// - `score < display` → excluded (hidden)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub display: f64,
    pub inclusion: f64,
    pub auto_amend: f64,
}

impl Thresholds {
    /// Create validated thresholds for a category.
    ///
    /// Misordered or out-of-range triples are rejected, never clamped.
    pub fn for_category(
        category: &str,
        display: f64,
        inclusion: f64,
        auto_amend: f64,
    ) -> ThresholdResult<Self> {
        for value in [display, inclusion, auto_amend] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ThresholdError::OutOfRange {
                    category: category.to_string(),
                    value,
                });
            }
        }
        if !(display <= inclusion && inclusion <= auto_amend) {
            return Err(ThresholdError::Misordered {
                category: category.to_string(),
                display,
                inclusion,
                auto_amend,
            });
        }
        Ok(Self {
            display,
            inclusion,
            auto_amend,
        })
    }

    /// The safe default cut-points for an unconfigured category.
    ///
    /// A pure constant function — never a mutable global. The category is
    /// accepted so call sites read naturally; every category currently maps
    /// to the same conservative triple.
    pub fn default_for(_category: &str) -> Self {
        let (display, inclusion, auto_amend) = DEFAULT_CUTPOINTS;
        Self {
            display,
            inclusion,
            auto_amend,
        }
    }

    /// Classify a credibility score against these cut-points.
    ///
    /// Pure and idempotent: the same `(score, thresholds)` always yields the
    /// same status. A non-finite score falls through every comparison and is
    /// excluded.
    pub fn classify(&self, score: f64) -> PositionStatus {
        if score >= self.auto_amend {
            PositionStatus::Verified
        } else if score >= self.inclusion {
            PositionStatus::Credible
        } else if score >= self.display {
            PositionStatus::Weak
        } else {
            PositionStatus::Excluded
        }
    }

    /// Point query: may a position with this score gate an amendment?
    pub fn can_amend_node(&self, score: f64) -> bool {
        score >= self.auto_amend
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Per-category threshold configuration with safe defaults.
#[derive(Debug, Default)]
pub struct ThresholdRegistry {
    categories: DashMap<String, Thresholds>,
}

/// On-disk shape of a threshold configuration file.
#[derive(Debug, Deserialize)]
struct ThresholdConfigFile {
    #[serde(default)]
    categories: BTreeMap<String, RawThresholds>,
}

#[derive(Debug, Deserialize)]
struct RawThresholds {
    display: f64,
    inclusion: f64,
    auto_amend: f64,
}

impl ThresholdRegistry {
    /// Create an empty registry — every category resolves to the default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install validated thresholds for a category.
    pub fn set(
        &self,
        category: impl Into<String>,
        thresholds: Thresholds,
    ) -> ThresholdResult<()> {
        let category = category.into();
        // Re-validate: the struct is plain data and could have been built
        // through deserialization.
        let validated = Thresholds::for_category(
            &category,
            thresholds.display,
            thresholds.inclusion,
            thresholds.auto_amend,
        )?;
        self.categories.insert(category, validated);
        Ok(())
    }

    /// Resolve the thresholds for a category, falling back to the default.
    pub fn get(&self, category: &str) -> Thresholds {
        self.categories
            .get(category)
            .map(|t| *t.value())
            .unwrap_or_else(|| Thresholds::default_for(category))
    }

    /// Whether a category has explicit (non-default) configuration.
    pub fn is_configured(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    /// Classify a score under a category's thresholds.
    pub fn classify(&self, category: &str, score: f64) -> PositionStatus {
        self.get(category).classify(score)
    }

    /// Load categories from a TOML document, validating every triple.
    ///
    /// ```toml
    /// [categories.history]
    /// display = 0.30
    /// inclusion = 0.60
    /// auto_amend = 0.85
    /// ```
    ///
    /// The whole load fails fast on the first parse or ordering violation;
    /// previously registered categories are left untouched in that case
    /// because validation happens before any insertion.
    pub fn load_toml_str(&self, input: &str) -> ThresholdResult<usize> {
        let file: ThresholdConfigFile =
            toml::from_str(input).map_err(|e| ThresholdError::ConfigParse {
                message: e.to_string(),
            })?;

        let mut validated = Vec::with_capacity(file.categories.len());
        for (category, raw) in &file.categories {
            let thresholds = Thresholds::for_category(
                category,
                raw.display,
                raw.inclusion,
                raw.auto_amend,
            )?;
            validated.push((category.clone(), thresholds));
        }

        let count = validated.len();
        for (category, thresholds) in validated {
            tracing::debug!(
                category = %category,
                display = thresholds.display,
                inclusion = thresholds.inclusion,
                auto_amend = thresholds.auto_amend,
                "threshold category loaded"
            );
            self.categories.insert(category, thresholds);
        }
        tracing::info!(categories = count, "threshold configuration loaded");
        Ok(count)
    }

    /// Number of explicitly configured categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether no category is explicitly configured.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
