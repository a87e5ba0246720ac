// crates/flagdeck-core/src/core/segment.rs
// ============================================================================
// Module: Flagdeck Segment Model
// Description: User segment wire model: inclusion lists and rules.
// Purpose: Represent versioned segment configuration exactly as served.
// Dependencies: serde, crate::core::model
// ============================================================================

//! ## Overview
//! Segments name user cohorts: explicit inclusion and exclusion lists plus
//! ordered rules with optional percentage weights. Flag rules reference
//! segments through the `segmentMatch` operator; segments never reference
//! other segments or flags.
//!
//! Security posture: segment payloads arrive from remote data sources and are
//! untrusted; see `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::model::Clause;

// ============================================================================
// SECTION: Segment
// ============================================================================

/// A versioned user segment.
///
/// # Invariants
/// - `excluded` wins over `included`, which wins over `rules`.
/// - `version` is monotonic per key; the store rejects stale versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Segment key, unique within the segments data kind.
    pub key: String,
    /// Monotonic configuration version.
    pub version: u64,
    /// User keys that are always members.
    #[serde(default)]
    pub included: Vec<String>,
    /// User keys that are never members.
    #[serde(default)]
    pub excluded: Vec<String>,
    /// Salt mixed into weighted-rule bucketing for this segment.
    #[serde(default)]
    pub salt: String,
    /// Membership rules, checked in declared order.
    #[serde(default)]
    pub rules: Vec<SegmentRule>,
}

/// A segment membership rule.
///
/// # Invariants
/// - Clauses must not use the `segmentMatch` operator; such a clause
///   evaluates as a non-match.
/// - A rule without `weight` matches unconditionally once its clauses match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRule {
    /// Clauses that must all match, in declared order.
    #[serde(default)]
    pub clauses: Vec<Clause>,
    /// Optional rollout weight in one-hundred-thousandths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    /// Attribute whose value seeds the bucket hash (`key` when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<String>,
}
