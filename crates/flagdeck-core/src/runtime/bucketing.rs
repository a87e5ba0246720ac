// crates/flagdeck-core/src/runtime/bucketing.rs
// ============================================================================
// Module: Flagdeck Rollout Bucketing
// Description: Deterministic percentage-rollout bucket computation.
// Purpose: Map a user and flag identity onto a stable bucket in [0, 1).
// Dependencies: crate::core, sha1, serde_json
// ============================================================================

//! ## Overview
//! Bucketing hashes a user attribute together with the flag or segment
//! identity and maps the digest onto `[0, 1)`. The constants are part of the
//! wire contract: the first 15 hex digits of a SHA-1 digest, divided by
//! `0xFFFFFFFFFFFFFFF`, so identical inputs land in the same bucket across
//! implementations. Weighted comparisons scale the bucket to `[0, 100000)`
//! and truncate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use sha1::Digest;
use sha1::Sha1;

use crate::core::user::User;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Divisor mapping a 60-bit hash prefix onto `[0, 1)`.
const LONG_SCALE: f64 = 0xFFF_FFFF_FFFF_FFFF_u64 as f64;

/// Number of leading hex digits of the digest used for the bucket.
const HASH_PREFIX_LEN: usize = 15;

/// Granularity of rollout weights: one-hundred-thousandths.
pub const WEIGHT_SCALE: i64 = 100_000;

// ============================================================================
// SECTION: Bucket Computation
// ============================================================================

/// Computes the rollout bucket for a user in `[0, 1)`.
///
/// The hash input is `"<seed>.<value>"` when a seed is present, otherwise
/// `"<context_key>.<salt>.<value>"`, where `value` is the bucket-by
/// attribute (the user key by default), with the user's secondary key
/// appended when present. A missing or non-stringifiable attribute yields
/// bucket zero.
#[must_use]
pub fn bucket_user(
    user: &User,
    context_key: &str,
    salt: &str,
    bucket_by: Option<&str>,
    seed: Option<i64>,
) -> f64 {
    let attribute = bucket_by.unwrap_or("key");
    let Some(mut id_hash) = bucketable_value(user.attribute(attribute).as_ref()) else {
        return 0.0;
    };
    if let Some(secondary) = &user.secondary {
        id_hash.push('.');
        id_hash.push_str(secondary);
    }
    let input = seed.map_or_else(
        || format!("{context_key}.{salt}.{id_hash}"),
        |seed| format!("{seed}.{id_hash}"),
    );
    let digest = Sha1::digest(input.as_bytes());
    let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    let prefix = &hex[..HASH_PREFIX_LEN];
    u64::from_str_radix(prefix, 16).map_or(0.0, |n| {
        #[allow(
            clippy::cast_precision_loss,
            reason = "A 60-bit value divided by the 60-bit scale keeps bucket precision."
        )]
        let numerator = n as f64;
        numerator / LONG_SCALE
    })
}

/// Scales a bucket to the weight granularity and truncates.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    reason = "Buckets are in [0, 1), so the scaled value fits well inside i64."
)]
pub fn scale_bucket(bucket: f64) -> i64 {
    (bucket * WEIGHT_SCALE as f64) as i64
}

/// Renders an attribute value as a bucketing string.
///
/// Strings pass through; integer numbers are stringified; floats, booleans,
/// arrays, objects, and null are treated as absent.
fn bucketable_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => number.as_i64().map(|n| n.to_string()),
        _ => None,
    }
}
