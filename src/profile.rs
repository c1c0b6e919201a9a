//! Visitor-side data model: the server-computed [`Profile`] snapshot, the per-experience
//! [`SelectedPersonalization`] assignments, and consent state.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Server-computed visitor profile.
///
/// `Profile` is an immutable snapshot: every successful mutation request returns a fresh profile
/// that replaces the previous one wholesale. It is never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    /// Device-stable identifier that survives profile resets.
    pub stable_id: String,
    /// Visitor's random seed assigned by the server, used for traffic allocation there.
    pub random: f64,
    /// Audience ids the visitor currently matches.
    #[serde(default)]
    pub audiences: Vec<String>,
    #[serde(default)]
    pub traits: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub is_returning_visitor: bool,
}

/// One server-selected personalization: which variant of which experience this visitor gets.
///
/// `variant_index == 0` always means "baseline". `variants` maps baseline entry ids to the
/// variant entry id selected for this visitor. An array of these is replaced atomically per
/// server response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedPersonalization {
    pub experience_id: String,
    pub variant_index: u32,
    #[serde(default)]
    pub variants: HashMap<String, String>,
    #[serde(default)]
    pub sticky: bool,
}

impl SelectedPersonalization {
    /// Whether this selection assigns the baseline (index 0).
    pub fn is_baseline(&self) -> bool {
        self.variant_index == 0
    }
}

/// A pending profile change the server asks the client to surface (e.g., a trait update driven
/// by a server-side rule). Round-tripped through the state cache untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChange {
    pub key: String,
    #[serde(rename = "type")]
    pub change_type: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Visitor consent. Absence of a stored value is the third state: "not yet asked".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consent {
    Accepted,
    Denied,
}

impl Consent {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Consent::Accepted => "accepted",
            Consent::Denied => "denied",
        }
    }

    pub(crate) fn from_str(value: &str) -> Option<Consent> {
        match value {
            "accepted" => Some(Consent::Accepted),
            "denied" => Some(Consent::Denied),
            _ => None,
        }
    }
}
