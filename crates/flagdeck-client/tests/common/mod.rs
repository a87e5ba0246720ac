// crates/flagdeck-client/tests/common/mod.rs
// ============================================================================
// Module: Client Test Support
// Description: Flag builders, recording listeners, and wait helpers.
// Purpose: Shared fixtures for coordinator and client tests.
// Dependencies: flagdeck-core, flagdeck-client, tokio
// ============================================================================

//! ## Overview
//! Shared fixtures: minimal flag and segment constructors, listeners that
//! record what they receive, and a polling wait helper.

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
    dead_code,
    reason = "Test-only support; not every helper is used by every suite."
)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use flagdeck_client::FlagChange;
use flagdeck_client::FlagChangeListener;
use flagdeck_client::StatusListener;
use flagdeck_core::Clause;
use flagdeck_core::DataSourceStatus;
use flagdeck_core::FeatureFlag;
use flagdeck_core::FlagRule;
use flagdeck_core::Operator;
use flagdeck_core::Prerequisite;
use flagdeck_core::Segment;
use flagdeck_core::VariationOrRollout;
use serde_json::json;

/// Builds a minimal boolean flag: off variation `false`, fallthrough `true`.
pub fn bool_flag(key: &str, version: u64) -> FeatureFlag {
    FeatureFlag {
        key: key.to_string(),
        version,
        on: true,
        prerequisites: Vec::new(),
        targets: Vec::new(),
        rules: Vec::new(),
        fallthrough: VariationOrRollout {
            variation: Some(1),
            rollout: None,
        },
        off_variation: Some(0),
        variations: vec![json!(false), json!(true)],
        salt: "salty".to_string(),
        track_events: false,
        track_events_fallthrough: false,
        debug_events_until_date: None,
        client_side_availability: None,
    }
}

/// Builds a flag with one prerequisite.
pub fn flag_with_prerequisite(key: &str, version: u64, prereq: &str) -> FeatureFlag {
    let mut flag = bool_flag(key, version);
    flag.prerequisites = vec![Prerequisite {
        key: prereq.to_string(),
        variation: 1,
    }];
    flag
}

/// Builds a flag with one `segmentMatch` rule.
pub fn flag_with_segment_rule(key: &str, version: u64, segment: &str) -> FeatureFlag {
    let mut flag = bool_flag(key, version);
    flag.rules = vec![FlagRule {
        id: Some("segment-rule".to_string()),
        clauses: vec![Clause {
            attribute: "key".to_string(),
            op: Operator::SegmentMatch,
            values: vec![json!(segment)],
            negate: false,
        }],
        variation_or_rollout: VariationOrRollout {
            variation: Some(0),
            rollout: None,
        },
        track_events: false,
    }];
    flag
}

/// Builds a minimal segment.
pub fn segment(key: &str, version: u64) -> Segment {
    Segment {
        key: key.to_string(),
        version,
        included: Vec::new(),
        excluded: Vec::new(),
        salt: "salty".to_string(),
        rules: Vec::new(),
    }
}

/// Records every flag-change key it hears.
#[derive(Default)]
pub struct ChangeRecorder {
    /// Keys received, in delivery order.
    pub keys: Mutex<Vec<String>>,
}

impl ChangeRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn key_set(&self) -> BTreeSet<String> {
        self.keys.lock().unwrap().iter().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.keys.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.keys.lock().unwrap().clear();
    }
}

impl FlagChangeListener for ChangeRecorder {
    fn flag_changed(&self, change: &FlagChange) {
        self.keys.lock().unwrap().push(change.key.clone());
    }
}

/// Records every status it hears.
#[derive(Default)]
pub struct StatusRecorder {
    /// Statuses received, in delivery order.
    pub statuses: Mutex<Vec<DataSourceStatus>>,
}

impl StatusRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.statuses.lock().unwrap().len()
    }
}

impl StatusListener for StatusRecorder {
    fn status_changed(&self, status: &DataSourceStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }
}

/// Polls `predicate` until it holds or the timeout elapses.
pub async fn wait_until(predicate: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !predicate() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within the timeout"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
