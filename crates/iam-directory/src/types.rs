//! Records fetched from the IAM API.
//!
//! Field names follow the API's camelCase wire format. Keys the API may omit
//! default to empty strings, empty lists or `None`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An account group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group UUID.
    #[serde(default)]
    pub uuid: String,

    /// Group name.
    #[serde(default)]
    pub name: String,

    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Owner of the group (e.g. "LOCAL", "SCIM").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Group {
    /// Create a group record.
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// An account user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User UID.
    #[serde(default)]
    pub uid: String,

    /// Email address.
    #[serde(default)]
    pub email: String,

    /// First name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Last name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
}

impl User {
    /// Create a user record.
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            ..Default::default()
        }
    }
}

/// An IAM policy.
///
/// List endpoints may return policies without `statementQuery`; fetch the
/// policy by UUID for the full record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Policy UUID.
    #[serde(default)]
    pub uuid: String,

    /// Policy name.
    #[serde(default)]
    pub name: String,

    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Statement query in the policy mini-language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_query: Option<String>,
}

impl Policy {
    /// Create a policy record with a statement.
    pub fn new(
        uuid: impl Into<String>,
        name: impl Into<String>,
        statement_query: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            description: None,
            statement_query: Some(statement_query.into()),
        }
    }

    /// The statement query, or an empty string when absent.
    pub fn statement(&self) -> &str {
        self.statement_query.as_deref().unwrap_or("")
    }
}

/// A policy bound to a group at some level.
///
/// The API groups bindings by policy; they are flattened to one record per
/// (policy, group) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// Bound policy UUID.
    #[serde(default)]
    pub policy_uuid: String,

    /// Group UUID.
    #[serde(default)]
    pub group_uuid: String,

    /// Boundary UUIDs narrowing where the policy applies.
    #[serde(default)]
    pub boundaries: Vec<String>,

    /// Binding level type ("account", "environment").
    #[serde(default)]
    pub level_type: String,

    /// Binding level identifier.
    #[serde(default)]
    pub level_id: String,
}

impl Binding {
    /// Create an account-level binding without boundaries.
    pub fn new(policy_uuid: impl Into<String>, group_uuid: impl Into<String>) -> Self {
        Self {
            policy_uuid: policy_uuid.into(),
            group_uuid: group_uuid.into(),
            boundaries: Vec::new(),
            level_type: "account".to_string(),
            level_id: String::new(),
        }
    }

    /// Attach boundaries.
    pub fn with_boundaries<I, S>(mut self, boundaries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.boundaries = boundaries.into_iter().map(Into::into).collect();
        self
    }

    /// Boundaries as a single display value (`", "`-joined), if any.
    pub fn boundary(&self) -> Option<String> {
        if self.boundaries.is_empty() {
            None
        } else {
            Some(self.boundaries.join(", "))
        }
    }
}

/// Kind of entity whose permissions are resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// A user, identified by UID.
    User,
    /// A group, identified by UUID.
    Group,
}

impl EntityType {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::User => "user",
            EntityType::Group => "group",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query for the platform's effective-permissions resolution endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePermissionsQuery {
    /// Canonical entity id (user UID or group UUID).
    pub entity_id: String,
    /// Entity kind.
    pub entity_type: EntityType,
    /// Level type ("account", "environment", "global").
    pub level_type: String,
    /// Level identifier.
    pub level_id: String,
    /// Restrict results to these services.
    pub services: Vec<String>,
}

/// One page of the effective-permissions resolution endpoint.
///
/// Items are passed through as returned by the platform. They are read from
/// `effectivePermissions`, or from `items` when that key is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "RawEffectivePermissionsPage")]
pub struct EffectivePermissionsPage {
    /// Items of this page.
    pub effective_permissions: Vec<serde_json::Value>,

    /// Total number of items across all pages, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Wire shape of a page; the platform has used both item keys.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEffectivePermissionsPage {
    #[serde(default)]
    effective_permissions: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    items: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    total: Option<u64>,
}

impl From<RawEffectivePermissionsPage> for EffectivePermissionsPage {
    fn from(raw: RawEffectivePermissionsPage) -> Self {
        Self {
            effective_permissions: raw.effective_permissions.or(raw.items).unwrap_or_default(),
            total: raw.total,
        }
    }
}
