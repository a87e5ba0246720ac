// crates/flagdeck-core/src/runtime/evaluator.rs
// ============================================================================
// Module: Flagdeck Evaluator
// Description: Flag evaluation: prerequisites, targets, rules, rollouts.
// Purpose: Resolve a flag and user into a value, variation, and reason.
// Dependencies: crate::core, crate::interfaces, crate::runtime::{bucketing, clauses}
// ============================================================================

//! ## Overview
//! The evaluator is a pure function over a flag, a user, and a store
//! snapshot. It walks prerequisites recursively (with cycle protection),
//! then targets, then rules, then the fallthrough, producing a
//! [`Detail`] and one synthetic [`PrerequisiteEvent`] per prerequisite flag
//! visited. Evaluation never fails toward the caller: every failure path
//! yields a detail whose reason is [`Reason::Error`] and whose value is
//! absent, leaving the caller's default in effect.
//!
//! Security posture: flags, segments, and users are untrusted inputs; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::model::Clause;
use crate::core::model::FeatureFlag;
use crate::core::model::Operator;
use crate::core::model::VariationOrRollout;
use crate::core::segment::Segment;
use crate::core::store::DataKind;
use crate::core::store::ItemDescriptor;
use crate::core::user::User;
use crate::interfaces::DataStore;
use crate::runtime::bucketing::bucket_user;
use crate::runtime::bucketing::scale_bucket;
use crate::runtime::clauses::clause_matches_user;

// ============================================================================
// SECTION: Reasons
// ============================================================================

/// Why an evaluation produced its value.
///
/// # Invariants
/// - Variants are stable wire identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    /// The flag is off and the off variation was served.
    Off,
    /// No target or rule matched; the fallthrough was served.
    Fallthrough,
    /// The user key matched an individual target.
    TargetMatch,
    /// A rule matched.
    #[serde(rename_all = "camelCase")]
    RuleMatch {
        /// Index of the matched rule.
        rule_index: usize,
        /// Stable identifier of the matched rule, when present.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rule_id: Option<String>,
    },
    /// A prerequisite failed and the off variation was served.
    #[serde(rename_all = "camelCase")]
    PrerequisiteFailed {
        /// Key of the prerequisite flag that failed.
        prerequisite_key: String,
    },
    /// Evaluation could not complete; the caller's default applies.
    #[serde(rename_all = "camelCase")]
    Error {
        /// Error classification.
        error_kind: EvalErrorKind,
    },
}

/// Evaluation error classification.
///
/// # Invariants
/// - Variants are stable wire identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvalErrorKind {
    /// Evaluation was attempted before the store was ever initialized.
    ClientNotReady,
    /// The flag key is not present in the store.
    FlagNotFound,
    /// The flag configuration is inconsistent (bad index or cycle).
    MalformedFlag,
    /// The user has no key.
    UserNotSpecified,
    /// The evaluated value did not have the requested type.
    WrongType,
    /// An unexpected failure, such as a store read error.
    Exception,
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// The outcome of evaluating one flag for one user.
///
/// # Invariants
/// - `value` and `variation_index` are both present or both absent; an
///   absent value means the caller's default applies.
#[derive(Debug, Clone, PartialEq)]
pub struct Detail {
    /// Evaluated value, or `None` when the caller's default applies.
    pub value: Option<Value>,
    /// Index of the served variation, when one was served.
    pub variation_index: Option<i64>,
    /// Why this value was chosen.
    pub reason: Reason,
}

impl Detail {
    /// Creates an error detail carrying no value.
    #[must_use]
    pub const fn error(kind: EvalErrorKind) -> Self {
        Self {
            value: None,
            variation_index: None,
            reason: Reason::Error {
                error_kind: kind,
            },
        }
    }
}

/// A synthetic evaluation record for one prerequisite flag visited.
///
/// # Invariants
/// - Records appear in visit order, nested prerequisites first.
#[derive(Debug, Clone, PartialEq)]
pub struct PrerequisiteEvent {
    /// Key of the prerequisite flag that was evaluated.
    pub prerequisite_key: String,
    /// Key of the flag that declared the prerequisite.
    pub prerequisite_of: String,
    /// Version of the prerequisite flag at evaluation time.
    pub prerequisite_version: u64,
    /// Value the prerequisite produced, when any.
    pub value: Option<Value>,
    /// Variation index the prerequisite produced, when any.
    pub variation_index: Option<i64>,
    /// Why the prerequisite produced its value.
    pub reason: Reason,
    /// Whether the prerequisite flag requests full analytics events.
    pub track_events: bool,
}

/// A detail plus the prerequisite events the evaluation generated.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalResult {
    /// Evaluation outcome for the requested flag.
    pub detail: Detail,
    /// Prerequisite evaluation records, in visit order.
    pub prerequisite_events: Vec<PrerequisiteEvent>,
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Evaluates flags against a store snapshot.
///
/// # Invariants
/// - Holds no lock across evaluation; each store read copies the touched
///   items.
pub struct Evaluator<'store> {
    /// Store consulted for prerequisite flags and segments.
    store: &'store dyn DataStore,
}

impl<'store> Evaluator<'store> {
    /// Creates an evaluator reading from `store`.
    #[must_use]
    pub const fn new(store: &'store dyn DataStore) -> Self {
        Self {
            store,
        }
    }

    /// Evaluates `flag` for `user`.
    ///
    /// Deterministic for a given store snapshot: repeated calls produce
    /// identical results, including the reason.
    #[must_use]
    pub fn evaluate(&self, flag: &FeatureFlag, user: &User) -> EvalResult {
        if user.key.is_empty() {
            return EvalResult {
                detail: Detail::error(EvalErrorKind::UserNotSpecified),
                prerequisite_events: Vec::new(),
            };
        }
        let mut events = Vec::new();
        let mut stack = Vec::new();
        let detail = self.evaluate_internal(flag, user, &mut events, &mut stack);
        EvalResult {
            detail,
            prerequisite_events: events,
        }
    }

    /// Evaluates a flag with cycle protection through `stack`.
    fn evaluate_internal(
        &self,
        flag: &FeatureFlag,
        user: &User,
        events: &mut Vec<PrerequisiteEvent>,
        stack: &mut Vec<String>,
    ) -> Detail {
        if stack.iter().any(|key| key == &flag.key) {
            return Detail::error(EvalErrorKind::MalformedFlag);
        }
        stack.push(flag.key.clone());
        let detail = self.evaluate_steps(flag, user, events, stack);
        stack.pop();
        detail
    }

    /// Runs the evaluation steps in order: off, prerequisites, targets,
    /// rules, fallthrough.
    fn evaluate_steps(
        &self,
        flag: &FeatureFlag,
        user: &User,
        events: &mut Vec<PrerequisiteEvent>,
        stack: &mut Vec<String>,
    ) -> Detail {
        if !flag.on {
            return off_detail(flag, Reason::Off);
        }
        if let Some(failed) = self.check_prerequisites(flag, user, events, stack) {
            return failed;
        }
        for target in &flag.targets {
            if target.values.iter().any(|candidate| candidate == &user.key) {
                return detail_for_index(flag, target.variation, Reason::TargetMatch);
            }
        }
        for (rule_index, rule) in flag.rules.iter().enumerate() {
            if rule.clauses.iter().all(|clause| self.clause_matches(clause, user)) {
                let reason = Reason::RuleMatch {
                    rule_index,
                    rule_id: rule.id.clone(),
                };
                return resolve_outcome(flag, &rule.variation_or_rollout, user, reason);
            }
        }
        resolve_outcome(flag, &flag.fallthrough, user, Reason::Fallthrough)
    }

    /// Evaluates prerequisites in declared order.
    ///
    /// Returns the short-circuit detail when a prerequisite fails, or `None`
    /// when all prerequisites are met. One event is recorded per
    /// prerequisite flag visited, regardless of its outcome.
    fn check_prerequisites(
        &self,
        flag: &FeatureFlag,
        user: &User,
        events: &mut Vec<PrerequisiteEvent>,
        stack: &mut Vec<String>,
    ) -> Option<Detail> {
        for prerequisite in &flag.prerequisites {
            let descriptor = match self.store.get(DataKind::Features, &prerequisite.key) {
                Ok(descriptor) => descriptor,
                Err(_) => return Some(Detail::error(EvalErrorKind::Exception)),
            };
            let Some(prereq_flag) = descriptor.as_ref().and_then(|d| d.as_flag()) else {
                return Some(off_detail(
                    flag,
                    Reason::PrerequisiteFailed {
                        prerequisite_key: prerequisite.key.clone(),
                    },
                ));
            };
            let prereq_detail = self.evaluate_internal(prereq_flag, user, events, stack);
            events.push(PrerequisiteEvent {
                prerequisite_key: prerequisite.key.clone(),
                prerequisite_of: flag.key.clone(),
                prerequisite_version: prereq_flag.version,
                value: prereq_detail.value.clone(),
                variation_index: prereq_detail.variation_index,
                reason: prereq_detail.reason.clone(),
                track_events: prereq_flag.track_events,
            });
            if prereq_detail.reason
                == (Reason::Error {
                    error_kind: EvalErrorKind::MalformedFlag,
                })
            {
                // A malformed prerequisite (including a cycle) poisons the
                // whole evaluation rather than reading as a clean miss.
                return Some(Detail::error(EvalErrorKind::MalformedFlag));
            }
            let met = prereq_flag.on
                && prereq_detail.variation_index == Some(prerequisite.variation);
            if !met {
                return Some(off_detail(
                    flag,
                    Reason::PrerequisiteFailed {
                        prerequisite_key: prerequisite.key.clone(),
                    },
                ));
            }
        }
        None
    }

    /// Evaluates one clause, resolving `segmentMatch` through the store.
    fn clause_matches(&self, clause: &Clause, user: &User) -> bool {
        if clause.op == Operator::SegmentMatch {
            let matched = clause.values.iter().any(|candidate| {
                candidate.as_str().is_some_and(|key| self.user_in_segment(key, user))
            });
            return if clause.negate { !matched } else { matched };
        }
        clause_matches_user(clause, user)
    }

    /// Returns true when the referenced segment exists and matches the user.
    fn user_in_segment(&self, segment_key: &str, user: &User) -> bool {
        self.store
            .get(DataKind::Segments, segment_key)
            .ok()
            .flatten()
            .as_ref()
            .and_then(ItemDescriptor::as_segment)
            .is_some_and(|segment| segment_matches(segment, user))
    }
}

// ============================================================================
// SECTION: Segment Matching
// ============================================================================

/// Evaluates segment membership for a user.
///
/// Exclusion wins over inclusion, which wins over rules.
#[must_use]
pub fn segment_matches(segment: &Segment, user: &User) -> bool {
    if segment.excluded.iter().any(|key| key == &user.key) {
        return false;
    }
    if segment.included.iter().any(|key| key == &user.key) {
        return true;
    }
    for rule in &segment.rules {
        let clauses_match = rule.clauses.iter().all(|clause| {
            // segmentMatch cannot recurse inside segments; it never matches.
            clause.op != Operator::SegmentMatch && clause_matches_user(clause, user)
        });
        if !clauses_match {
            continue;
        }
        let Some(weight) = rule.weight else {
            return true;
        };
        let bucket = bucket_user(
            user,
            &segment.key,
            &segment.salt,
            rule.bucket_by.as_deref(),
            None,
        );
        if scale_bucket(bucket) < weight {
            return true;
        }
    }
    false
}

// ============================================================================
// SECTION: Outcome Resolution
// ============================================================================

/// Resolves the off variation with the supplied reason.
///
/// A flag without an off variation yields no value, leaving the caller's
/// default in effect.
fn off_detail(flag: &FeatureFlag, reason: Reason) -> Detail {
    match flag.off_variation {
        Some(index) => detail_for_index(flag, index, reason),
        None => Detail {
            value: None,
            variation_index: None,
            reason,
        },
    }
}

/// Builds a detail for a variation index, checking bounds.
fn detail_for_index(flag: &FeatureFlag, index: i64, reason: Reason) -> Detail {
    flag.variation_value(index).map_or_else(
        || Detail::error(EvalErrorKind::MalformedFlag),
        |value| Detail {
            value: Some(value.clone()),
            variation_index: Some(index),
            reason,
        },
    )
}

/// Resolves a fixed variation or rollout into a detail.
fn resolve_outcome(
    flag: &FeatureFlag,
    outcome: &VariationOrRollout,
    user: &User,
    reason: Reason,
) -> Detail {
    if let Some(index) = outcome.variation {
        return detail_for_index(flag, index, reason);
    }
    let Some(rollout) = &outcome.rollout else {
        return Detail::error(EvalErrorKind::MalformedFlag);
    };
    if rollout.variations.is_empty() {
        return Detail::error(EvalErrorKind::MalformedFlag);
    }
    let bucket = bucket_user(
        user,
        &flag.key,
        &flag.salt,
        rollout.bucket_by.as_deref(),
        rollout.seed,
    );
    let scaled = scale_bucket(bucket);
    let mut cumulative = 0_i64;
    for weighted in &rollout.variations {
        cumulative += weighted.weight;
        if cumulative > scaled {
            return detail_for_index(flag, weighted.variation, reason);
        }
    }
    // The weights fall short of the full weight scale; the last entry
    // absorbs the gap deterministically.
    rollout.variations.last().map_or_else(
        || Detail::error(EvalErrorKind::MalformedFlag),
        |last| detail_for_index(flag, last.variation, reason),
    )
}
