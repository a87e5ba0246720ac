// crates/flagdeck-core/tests/clause_operators.rs
// ============================================================================
// Module: Clause Operator Tests
// Description: Validate per-operator clause matching semantics.
// Purpose: Pin equality, string, numeric, temporal, and semver behavior.
// Dependencies: flagdeck-core, serde_json
// ============================================================================

//! ## Overview
//! Exercises [`flagdeck_core::runtime::clause_matches_user`] operator by
//! operator, including type coercion boundaries and negation.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use flagdeck_core::Clause;
use flagdeck_core::Operator;
use flagdeck_core::User;
use flagdeck_core::runtime::clause_matches_user;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

fn clause(attribute: &str, op: Operator, values: Vec<Value>) -> Clause {
    Clause {
        attribute: attribute.to_string(),
        op,
        values,
        negate: false,
    }
}

fn matches(user: &User, attribute: &str, op: Operator, values: Vec<Value>) -> bool {
    clause_matches_user(&clause(attribute, op, values), user)
}

// ============================================================================
// SECTION: Equality
// ============================================================================

#[test]
fn in_matches_strings_strictly() {
    let user = User::with_key("u").name("Bob").build();
    assert!(matches(&user, "name", Operator::In, vec![json!("Bob")]));
    assert!(!matches(&user, "name", Operator::In, vec![json!("bob")]));
}

#[test]
fn in_compares_numbers_by_value_not_representation() {
    let user = User::with_key("u").custom("count", 99).build();
    assert!(matches(&user, "count", Operator::In, vec![json!(99.0)]));
    assert!(!matches(&user, "count", Operator::In, vec![json!(98)]));
}

#[test]
fn in_does_not_match_across_types() {
    let user = User::with_key("u").custom("count", 99).build();
    assert!(!matches(&user, "count", Operator::In, vec![json!("99")]));
}

#[test]
fn in_matches_any_of_several_values() {
    let user = User::with_key("u").country("de").build();
    assert!(matches(&user, "country", Operator::In, vec![json!("fr"), json!("de")]));
}

#[test]
fn array_attribute_matches_when_any_element_matches() {
    let user = User::with_key("u").custom("groups", json!(["alpha", "beta"])).build();
    assert!(matches(&user, "groups", Operator::In, vec![json!("beta")]));
    assert!(!matches(&user, "groups", Operator::In, vec![json!("gamma")]));
}

// ============================================================================
// SECTION: String Operators
// ============================================================================

#[test]
fn string_affix_operators_require_both_operands_to_be_strings() {
    let user = User::with_key("u").email("dev@example.com").build();
    assert!(matches(&user, "email", Operator::StartsWith, vec![json!("dev@")]));
    assert!(matches(&user, "email", Operator::EndsWith, vec![json!("example.com")]));
    assert!(matches(&user, "email", Operator::Contains, vec![json!("@exam")]));
    assert!(!matches(&user, "email", Operator::StartsWith, vec![json!(7)]));
    let numeric = User::with_key("u").custom("n", 7).build();
    assert!(!matches(&numeric, "n", Operator::StartsWith, vec![json!("7")]));
}

#[test]
fn matches_compiles_the_pattern_as_a_regex() {
    let user = User::with_key("u").email("dev@example.com").build();
    assert!(matches(&user, "email", Operator::Matches, vec![json!(r".*@example\.com$")]));
    assert!(!matches(&user, "email", Operator::Matches, vec![json!(r"^nobody@")]));
}

#[test]
fn invalid_regex_never_matches() {
    let user = User::with_key("u").email("dev@example.com").build();
    assert!(!matches(&user, "email", Operator::Matches, vec![json!("(unclosed")]));
}

// ============================================================================
// SECTION: Numeric Operators
// ============================================================================

#[test]
fn numeric_ordering_coerces_number_to_number_only() {
    let user = User::with_key("u").custom("age", 30).build();
    assert!(matches(&user, "age", Operator::LessThan, vec![json!(30.5)]));
    assert!(matches(&user, "age", Operator::LessThanOrEqual, vec![json!(30)]));
    assert!(matches(&user, "age", Operator::GreaterThan, vec![json!(29)]));
    assert!(matches(&user, "age", Operator::GreaterThanOrEqual, vec![json!(30.0)]));
    assert!(!matches(&user, "age", Operator::LessThan, vec![json!("31")]));
}

// ============================================================================
// SECTION: Temporal Operators
// ============================================================================

#[test]
fn before_and_after_accept_epoch_millis_and_rfc3339() {
    let user = User::with_key("u").custom("signup", 1_500_000_000_000_i64).build();
    assert!(matches(&user, "signup", Operator::Before, vec![json!(1_600_000_000_000_i64)]));
    assert!(matches(&user, "signup", Operator::After, vec![json!(1_400_000_000_000_i64)]));
    // 2017-07-14T02:40:00Z equals 1500000000000 ms; one hour later is after.
    assert!(matches(&user, "signup", Operator::Before, vec![json!("2017-07-14T03:40:00Z")]));
    let textual = User::with_key("u").custom("signup", "2017-07-14T02:40:00Z").build();
    assert!(matches(
        &textual,
        "signup",
        Operator::After,
        vec![json!(1_400_000_000_000_i64)]
    ));
}

#[test]
fn unparseable_temporal_operands_never_match() {
    let user = User::with_key("u").custom("signup", "not-a-date").build();
    assert!(!matches(&user, "signup", Operator::Before, vec![json!(1_600_000_000_000_i64)]));
}

// ============================================================================
// SECTION: Semantic Version Operators
// ============================================================================

#[test]
fn semver_parses_loosely_with_missing_components() {
    let user = User::with_key("u").custom("app", "2").build();
    assert!(matches(&user, "app", Operator::SemVerEqual, vec![json!("2.0.0")]));
    let minor = User::with_key("u").custom("app", "2.1").build();
    assert!(matches(&minor, "app", Operator::SemVerLessThan, vec![json!("2.2")]));
    assert!(matches(&minor, "app", Operator::SemVerGreaterThan, vec![json!("2.0.9")]));
}

#[test]
fn semver_prerelease_orders_below_release() {
    let user = User::with_key("u").custom("app", "2.0.0-rc.1").build();
    assert!(matches(&user, "app", Operator::SemVerLessThan, vec![json!("2.0.0")]));
}

#[test]
fn non_version_strings_never_match() {
    let user = User::with_key("u").custom("app", "not.a.version").build();
    assert!(!matches(&user, "app", Operator::SemVerEqual, vec![json!("2.0.0")]));
}

// ============================================================================
// SECTION: Negation and Absence
// ============================================================================

#[test]
fn negate_inverts_a_present_attribute_match() {
    let user = User::with_key("u").country("de").build();
    let mut negated = clause("country", Operator::In, vec![json!("de")]);
    negated.negate = true;
    assert!(!clause_matches_user(&negated, &user));
    let mut miss = clause("country", Operator::In, vec![json!("fr")]);
    miss.negate = true;
    assert!(clause_matches_user(&miss, &user));
}

#[test]
fn absent_attribute_never_matches_even_when_negated() {
    let user = User::with_key("u").build();
    let mut negated = clause("email", Operator::In, vec![json!("x@example.com")]);
    negated.negate = true;
    assert!(!clause_matches_user(&negated, &user));
}

#[test]
fn built_in_attributes_shadow_custom_entries() {
    let user = User::with_key("u").country("de").custom("country", "fr").build();
    assert!(matches(&user, "country", Operator::In, vec![json!("de")]));
    assert!(!matches(&user, "country", Operator::In, vec![json!("fr")]));
}

#[test]
fn segment_match_reports_no_match_without_store_access() {
    let user = User::with_key("u").build();
    assert!(!matches(&user, "key", Operator::SegmentMatch, vec![json!("cohort")]));
}
