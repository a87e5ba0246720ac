// crates/flagdeck-core/src/core/model.rs
// ============================================================================
// Module: Flagdeck Flag Model
// Description: Feature flag wire model: rules, clauses, rollouts, prerequisites.
// Purpose: Represent versioned flag configuration exactly as served on the wire.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines the feature-flag half of the wire model. Flags are
//! versioned items whose ordered targets, rules, and prerequisites drive the
//! evaluator. Field order within `variations`, `targets`, `rules`, and
//! `prerequisites` is load-bearing and preserved across a parse/serialize
//! round trip. Unknown fields are ignored on input.
//!
//! Security posture: flag payloads arrive from remote data sources and are
//! untrusted; see `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Feature Flag
// ============================================================================

/// A versioned feature flag as served by the flag delivery endpoints.
///
/// # Invariants
/// - `version` is monotonic per key; the store rejects stale versions.
/// - Ordering of `targets`, `rules`, `prerequisites`, and `variations` is
///   preserved and significant to evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
    /// Flag key, unique within the features data kind.
    pub key: String,
    /// Monotonic configuration version.
    pub version: u64,
    /// Whether targeting is switched on.
    pub on: bool,
    /// Prerequisite flags evaluated before targeting, in declared order.
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    /// Individual user targets, checked before rules.
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Targeting rules, checked in declared order.
    #[serde(default)]
    pub rules: Vec<FlagRule>,
    /// Outcome used when no target or rule matches.
    pub fallthrough: VariationOrRollout,
    /// Variation served when the flag is off, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_variation: Option<i64>,
    /// Possible output values; variation indices point into this list.
    #[serde(default)]
    pub variations: Vec<Value>,
    /// Salt mixed into rollout bucketing for this flag.
    #[serde(default)]
    pub salt: String,
    /// Whether full analytics events are requested for this flag.
    #[serde(default)]
    pub track_events: bool,
    /// Whether fallthrough evaluations request full analytics events.
    #[serde(default)]
    pub track_events_fallthrough: bool,
    /// Epoch-millisecond deadline for debug event emission, when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_events_until_date: Option<i64>,
    /// Client-side exposure settings, preserved but unused by evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_side_availability: Option<ClientSideAvailability>,
}

impl FeatureFlag {
    /// Returns the variation value at `index`, or `None` when out of range.
    #[must_use]
    pub fn variation_value(&self, index: i64) -> Option<&Value> {
        let index = usize::try_from(index).ok()?;
        self.variations.get(index)
    }
}

/// Client-side exposure settings carried on the wire.
///
/// # Invariants
/// - Irrelevant to server-side evaluation; preserved for round trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSideAvailability {
    /// Whether the flag is available to client-side SDKs using mobile keys.
    #[serde(default)]
    pub using_mobile_key: bool,
    /// Whether the flag is available to client-side SDKs using the environment id.
    #[serde(default)]
    pub using_environment_id: bool,
}

// ============================================================================
// SECTION: Prerequisites and Targets
// ============================================================================

/// A prerequisite linking a flag to another flag's required variation.
///
/// # Invariants
/// - The prerequisite is met only when the referenced flag is on and
///   evaluates to exactly `variation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prerequisite {
    /// Key of the prerequisite flag.
    pub key: String,
    /// Variation index the prerequisite flag must produce.
    pub variation: i64,
}

/// An individual-user target mapping user keys to a fixed variation.
///
/// # Invariants
/// - Targets are checked in declared order before any rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// User keys that receive `variation`.
    #[serde(default)]
    pub values: Vec<String>,
    /// Variation index served to matching users.
    pub variation: i64,
}

// ============================================================================
// SECTION: Rules and Clauses
// ============================================================================

/// A targeting rule: a conjunction of clauses with an outcome.
///
/// # Invariants
/// - All clauses must match for the rule to match (AND semantics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRule {
    /// Optional stable rule identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Clauses that must all match, in declared order.
    #[serde(default)]
    pub clauses: Vec<Clause>,
    /// Outcome applied when every clause matches.
    #[serde(flatten)]
    pub variation_or_rollout: VariationOrRollout,
    /// Whether matches of this rule request full analytics events.
    #[serde(default)]
    pub track_events: bool,
}

/// A single attribute/operator/values predicate.
///
/// # Invariants
/// - An absent user attribute never matches, regardless of `negate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    /// User attribute name inspected by the clause.
    pub attribute: String,
    /// Comparison operator.
    pub op: Operator,
    /// Candidate values; the clause matches when any value matches.
    #[serde(default)]
    pub values: Vec<Value>,
    /// Whether the match outcome is inverted after evaluation.
    #[serde(default)]
    pub negate: bool,
}

/// Clause comparison operators.
///
/// # Invariants
/// - Variants are stable wire identifiers; an unrecognized operator fails
///   the parse of the enclosing item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// Strict per-type equality.
    In,
    /// String suffix match.
    EndsWith,
    /// String prefix match.
    StartsWith,
    /// Regular-expression match.
    Matches,
    /// String containment.
    Contains,
    /// Numeric strictly-less-than.
    LessThan,
    /// Numeric less-than-or-equal.
    LessThanOrEqual,
    /// Numeric strictly-greater-than.
    GreaterThan,
    /// Numeric greater-than-or-equal.
    GreaterThanOrEqual,
    /// Temporal ordering: user value earlier than clause value.
    Before,
    /// Temporal ordering: user value later than clause value.
    After,
    /// Semantic-version equality.
    SemVerEqual,
    /// Semantic-version strictly-less-than.
    SemVerLessThan,
    /// Semantic-version strictly-greater-than.
    SemVerGreaterThan,
    /// Membership in any referenced user segment.
    SegmentMatch,
}

// ============================================================================
// SECTION: Variation or Rollout
// ============================================================================

/// Outcome of a rule or fallthrough: a fixed variation or a rollout.
///
/// # Invariants
/// - At least one of `variation` and `rollout` is expected; a value with
///   neither is a malformed flag at evaluation time.
/// - `variation` wins when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationOrRollout {
    /// Fixed variation index, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<i64>,
    /// Weighted rollout, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<Rollout>,
}

/// A weighted distribution over variations keyed off a user attribute hash.
///
/// # Invariants
/// - Weights are expressed in one-hundred-thousandths and are expected to
///   sum to 100000; a shortfall deterministically selects the last entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollout {
    /// Rollout kind.
    #[serde(default)]
    pub kind: RolloutKind,
    /// Attribute whose value seeds the bucket hash (`key` when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<String>,
    /// Ordered weighted variations.
    #[serde(default)]
    pub variations: Vec<WeightedVariation>,
    /// Optional fixed hash seed replacing the key/salt pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

/// Rollout kinds carried on the wire.
///
/// # Invariants
/// - Variants are stable wire identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RolloutKind {
    /// Percentage rollout.
    #[default]
    Rollout,
    /// Experiment allocation.
    Experiment,
}

/// One entry of a rollout's weighted distribution.
///
/// # Invariants
/// - `weight` is in one-hundred-thousandths of a percent, in `[0, 100000]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedVariation {
    /// Variation index receiving this share.
    pub variation: i64,
    /// Share of the distribution in one-hundred-thousandths.
    pub weight: i64,
    /// Whether this entry is excluded from experiment analysis.
    #[serde(default)]
    pub untracked: bool,
}
