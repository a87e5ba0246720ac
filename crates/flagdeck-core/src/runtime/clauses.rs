// crates/flagdeck-core/src/runtime/clauses.rs
// ============================================================================
// Module: Flagdeck Clause Logic
// Description: Clause operator evaluation against user attribute values.
// Purpose: Convert attribute/operator/value predicates into match outcomes.
// Dependencies: crate::core, bigdecimal, regex, semver, time
// ============================================================================

//! ## Overview
//! Clause evaluation converts a user attribute value and a clause's operator
//! and candidate values into a boolean match. Missing attributes never
//! match, and negation never flips absence into a match. Numeric ordering is
//! decimal-aware and deterministic; temporal operands accept epoch
//! milliseconds or RFC3339 strings; semantic versions are parsed loosely,
//! permitting a missing minor or patch component.
//!
//! The `segmentMatch` operator needs store access and is resolved by the
//! evaluator; it always reports a non-match here.
//!
//! Security posture: clause values are untrusted; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use regex::Regex;
use semver::Version;
use serde_json::Number;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::model::Clause;
use crate::core::model::Operator;
use crate::core::user::User;

// ============================================================================
// SECTION: Clause Evaluation
// ============================================================================

/// Evaluates a clause against a user, ignoring `segmentMatch`.
///
/// The attribute is looked up built-ins first. An absent attribute is a
/// non-match regardless of `negate`. Array attribute values match when any
/// element matches any clause value.
#[must_use]
pub fn clause_matches_user(clause: &Clause, user: &User) -> bool {
    let Some(attribute_value) = user.attribute(&clause.attribute) else {
        return false;
    };
    let matched = match &attribute_value {
        Value::Array(elements) => {
            elements.iter().any(|element| clause_matches_value(clause, element))
        }
        other => clause_matches_value(clause, other),
    };
    if clause.negate { !matched } else { matched }
}

/// Returns true when any clause value matches the single attribute value.
fn clause_matches_value(clause: &Clause, attribute_value: &Value) -> bool {
    clause.values.iter().any(|candidate| operator_matches(clause.op, attribute_value, candidate))
}

/// Applies one operator to an attribute value and a candidate clause value.
fn operator_matches(op: Operator, attribute_value: &Value, clause_value: &Value) -> bool {
    match op {
        Operator::In => values_equal(attribute_value, clause_value),
        Operator::StartsWith => {
            string_op(attribute_value, clause_value, |a, c| a.starts_with(c))
        }
        Operator::EndsWith => string_op(attribute_value, clause_value, |a, c| a.ends_with(c)),
        Operator::Contains => string_op(attribute_value, clause_value, |a, c| a.contains(c)),
        Operator::Matches => string_op(attribute_value, clause_value, |a, pattern| {
            Regex::new(pattern).is_ok_and(|regex| regex.is_match(a))
        }),
        Operator::LessThan => numeric_op(attribute_value, clause_value, Ordering::is_lt),
        Operator::LessThanOrEqual => numeric_op(attribute_value, clause_value, Ordering::is_le),
        Operator::GreaterThan => numeric_op(attribute_value, clause_value, Ordering::is_gt),
        Operator::GreaterThanOrEqual => {
            numeric_op(attribute_value, clause_value, Ordering::is_ge)
        }
        Operator::Before => temporal_op(attribute_value, clause_value, Ordering::is_lt),
        Operator::After => temporal_op(attribute_value, clause_value, Ordering::is_gt),
        Operator::SemVerEqual => semver_op(attribute_value, clause_value, Ordering::is_eq),
        Operator::SemVerLessThan => semver_op(attribute_value, clause_value, Ordering::is_lt),
        Operator::SemVerGreaterThan => semver_op(attribute_value, clause_value, Ordering::is_gt),
        Operator::SegmentMatch => false,
    }
}

// ============================================================================
// SECTION: Equality
// ============================================================================

/// Strict per-type equality with decimal-aware numeric handling.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left_num), Value::Number(right_num)) => {
            decimal_cmp(left_num, right_num).is_some_and(Ordering::is_eq)
        }
        _ => left == right,
    }
}

// ============================================================================
// SECTION: String Operators
// ============================================================================

/// Applies a string predicate; both operands must be strings.
fn string_op(
    attribute_value: &Value,
    clause_value: &Value,
    predicate: impl Fn(&str, &str) -> bool,
) -> bool {
    match (attribute_value, clause_value) {
        (Value::String(attribute), Value::String(candidate)) => predicate(attribute, candidate),
        _ => false,
    }
}

// ============================================================================
// SECTION: Numeric Operators
// ============================================================================

/// Applies a numeric ordering predicate; both operands must be numbers.
fn numeric_op(
    attribute_value: &Value,
    clause_value: &Value,
    predicate: impl Fn(Ordering) -> bool,
) -> bool {
    match (attribute_value, clause_value) {
        (Value::Number(attribute), Value::Number(candidate)) => {
            decimal_cmp(attribute, candidate).is_some_and(predicate)
        }
        _ => false,
    }
}

/// Orders numeric JSON values using decimal-aware comparison.
fn decimal_cmp(left: &Number, right: &Number) -> Option<Ordering> {
    let left = decimal_from_number(left)?;
    let right = decimal_from_number(right)?;
    Some(left.cmp(&right))
}

/// Parses a JSON number into `BigDecimal` with a stable string representation.
fn decimal_from_number(number: &Number) -> Option<BigDecimal> {
    let rendered = number.to_string();
    BigDecimal::from_str(&rendered).ok()
}

// ============================================================================
// SECTION: Temporal Operators
// ============================================================================

/// Applies a temporal ordering predicate.
///
/// Operands may be epoch-millisecond numbers or RFC3339 strings; both are
/// compared in UTC.
fn temporal_op(
    attribute_value: &Value,
    clause_value: &Value,
    predicate: impl Fn(Ordering) -> bool,
) -> bool {
    match (parse_time(attribute_value), parse_time(clause_value)) {
        (Some(attribute), Some(candidate)) => predicate(attribute.cmp(&candidate)),
        _ => false,
    }
}

/// Parses a temporal operand: epoch milliseconds or an RFC3339 string.
fn parse_time(value: &Value) -> Option<OffsetDateTime> {
    match value {
        Value::Number(number) => {
            let millis = number.as_f64()?;
            if !millis.is_finite() {
                return None;
            }
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Finite millisecond epochs fit i128 nanoseconds."
            )]
            let nanos = (millis * 1_000_000.0) as i128;
            OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
        }
        Value::String(text) => OffsetDateTime::parse(text, &Rfc3339).ok(),
        _ => None,
    }
}

// ============================================================================
// SECTION: Semantic Version Operators
// ============================================================================

/// Applies a semantic-version ordering predicate using loose parsing.
fn semver_op(
    attribute_value: &Value,
    clause_value: &Value,
    predicate: impl Fn(Ordering) -> bool,
) -> bool {
    match (attribute_value, clause_value) {
        (Value::String(attribute), Value::String(candidate)) => {
            match (parse_semver_loose(attribute), parse_semver_loose(candidate)) {
                (Some(attribute), Some(candidate)) => predicate(attribute.cmp(&candidate)),
                _ => false,
            }
        }
        _ => false,
    }
}

/// Parses a version string, permitting a missing minor or patch component.
///
/// `"2"` parses as `2.0.0` and `"2.1"` as `2.1.0`; pre-release and build
/// suffixes are preserved.
fn parse_semver_loose(text: &str) -> Option<Version> {
    if let Ok(version) = Version::parse(text) {
        return Some(version);
    }
    let suffix_start = text.find(['-', '+']).unwrap_or(text.len());
    let (numeric, suffix) = text.split_at(suffix_start);
    let dots = numeric.chars().filter(|ch| *ch == '.').count();
    let padded = match dots {
        0 => format!("{numeric}.0.0{suffix}"),
        1 => format!("{numeric}.0{suffix}"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}
