// crates/flagdeck-core/src/core/user.rs
// ============================================================================
// Module: Flagdeck User Context
// Description: User context supplied to every evaluation.
// Purpose: Provide attribute lookup with built-ins shadowing custom values.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`User`] carries the key plus the built-in and custom attributes that
//! clauses inspect. Lookup is by attribute name; the ten built-in attributes
//! shadow identically named entries in the custom map. Users are constructed
//! through [`UserBuilder`] and are immutable afterwards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: User
// ============================================================================

/// A user context evaluated against flag and segment rules.
///
/// # Invariants
/// - `key` is required; an empty key makes every evaluation report
///   `UserNotSpecified`.
/// - Built-in attributes shadow custom attributes of the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user key.
    pub key: String,
    /// Secondary key mixed into rollout bucketing, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    /// IP address attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Country attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// First-name attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Last-name attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Full-name attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Avatar URL attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Email attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Anonymous marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
    /// Custom attributes keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, Value>,
}

impl User {
    /// Starts building a user with the given key.
    #[must_use]
    pub fn with_key(key: impl Into<String>) -> UserBuilder {
        UserBuilder {
            user: Self {
                key: key.into(),
                secondary: None,
                ip: None,
                country: None,
                first_name: None,
                last_name: None,
                name: None,
                avatar: None,
                email: None,
                anonymous: None,
                custom: BTreeMap::new(),
            },
        }
    }

    /// Looks up an attribute by name, built-ins first, then the custom map.
    ///
    /// Returns `None` when the attribute is absent. Built-in string
    /// attributes that are unset are absent, not empty strings.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "key" => Some(Value::String(self.key.clone())),
            "secondary" => self.secondary.clone().map(Value::String),
            "ip" => self.ip.clone().map(Value::String),
            "country" => self.country.clone().map(Value::String),
            "firstName" => self.first_name.clone().map(Value::String),
            "lastName" => self.last_name.clone().map(Value::String),
            "name" => self.name.clone().map(Value::String),
            "avatar" => self.avatar.clone().map(Value::String),
            "email" => self.email.clone().map(Value::String),
            "anonymous" => self.anonymous.map(Value::Bool),
            _ => self.custom.get(name).cloned(),
        }
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for [`User`] values.
///
/// # Invariants
/// - Every setter overwrites any earlier value for the same attribute.
#[derive(Debug, Clone)]
pub struct UserBuilder {
    /// User under construction.
    user: User,
}

impl UserBuilder {
    /// Sets the secondary key.
    #[must_use]
    pub fn secondary(mut self, value: impl Into<String>) -> Self {
        self.user.secondary = Some(value.into());
        self
    }

    /// Sets the IP address attribute.
    #[must_use]
    pub fn ip(mut self, value: impl Into<String>) -> Self {
        self.user.ip = Some(value.into());
        self
    }

    /// Sets the country attribute.
    #[must_use]
    pub fn country(mut self, value: impl Into<String>) -> Self {
        self.user.country = Some(value.into());
        self
    }

    /// Sets the first-name attribute.
    #[must_use]
    pub fn first_name(mut self, value: impl Into<String>) -> Self {
        self.user.first_name = Some(value.into());
        self
    }

    /// Sets the last-name attribute.
    #[must_use]
    pub fn last_name(mut self, value: impl Into<String>) -> Self {
        self.user.last_name = Some(value.into());
        self
    }

    /// Sets the full-name attribute.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.user.name = Some(value.into());
        self
    }

    /// Sets the avatar URL attribute.
    #[must_use]
    pub fn avatar(mut self, value: impl Into<String>) -> Self {
        self.user.avatar = Some(value.into());
        self
    }

    /// Sets the email attribute.
    #[must_use]
    pub fn email(mut self, value: impl Into<String>) -> Self {
        self.user.email = Some(value.into());
        self
    }

    /// Sets the anonymous marker.
    #[must_use]
    pub const fn anonymous(mut self, value: bool) -> Self {
        self.user.anonymous = Some(value);
        self
    }

    /// Sets a custom attribute.
    #[must_use]
    pub fn custom(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.user.custom.insert(name.into(), value.into());
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> User {
        self.user
    }
}
