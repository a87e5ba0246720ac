// crates/flagdeck-client/src/secure.rs
// ============================================================================
// Module: Flagdeck Secure Mode Hash
// Description: HMAC-SHA-256 of the user key under the SDK key.
// Purpose: Let server code vouch for user identities toward client SDKs.
// Dependencies: hmac, sha2
// ============================================================================

//! ## Overview
//! Secure mode requires client-side SDKs to present a hash proving that the
//! server vouched for the user. The hash is `HMAC_SHA256(sdkKey, userKey)`
//! rendered as lowercase hex; it is a pure function and works offline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write;

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;

// ============================================================================
// SECTION: Hash
// ============================================================================

/// Computes the secure-mode hash for a user key under an SDK key.
#[must_use]
pub fn secure_mode_hash(sdk_key: &str, user_key: &str) -> String {
    // The HMAC construction accepts keys of any length.
    let mac = Hmac::<Sha256>::new_from_slice(sdk_key.as_bytes());
    let Ok(mut mac) = mac else {
        return String::new();
    };
    mac.update(user_key.as_bytes());
    let digest = mac.finalize().into_bytes();
    let mut rendered = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(rendered, "{byte:02x}");
    }
    rendered
}
