//! RACI governance matrices.
//!
//! A template lists governance activities, each with the permissions it
//! needs and the role (Responsible, Accountable, Consulted, Informed) a group
//! plays when it holds any of them. The builder computes every group's
//! granted actions and fills in one row per activity, one column per group.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, instrument};

use iam_directory::Directory;
use iam_policy::HeldPermissions;

use crate::effective::PermissionsAggregator;
use crate::error::{AnalysisError, AnalysisResult};

/// RACI role letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RaciRole {
    /// Responsible
    R,
    /// Accountable
    A,
    /// Consulted
    C,
    /// Informed
    I,
}

impl RaciRole {
    /// Full role name.
    pub fn name(&self) -> &'static str {
        match self {
            RaciRole::R => "Responsible",
            RaciRole::A => "Accountable",
            RaciRole::C => "Consulted",
            RaciRole::I => "Informed",
        }
    }

    /// Role letter.
    pub fn as_str(&self) -> &'static str {
        match self {
            RaciRole::R => "R",
            RaciRole::A => "A",
            RaciRole::C => "C",
            RaciRole::I => "I",
        }
    }
}

impl fmt::Display for RaciRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An activity of a RACI template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GovernanceActivity {
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'static str>,
    /// Holding any of these assigns `role`.
    pub required_permissions: &'static [&'static str],
    pub role: RaciRole,
}

/// A named set of activities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaciTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub activities: &'static [GovernanceActivity],
}

const fn activity(
    name: &'static str,
    category: Option<&'static str>,
    required_permissions: &'static [&'static str],
    role: RaciRole,
) -> GovernanceActivity {
    GovernanceActivity {
        name,
        category,
        required_permissions,
        role,
    }
}

const BASIC: &[GovernanceActivity] = &[
    activity("View Settings", None, &["settings:objects:read"], RaciRole::I),
    activity("Modify Settings", None, &["settings:objects:write"], RaciRole::R),
    activity("Manage Users", None, &["account:users:write"], RaciRole::A),
    activity("Manage Groups", None, &["account:groups:write"], RaciRole::A),
    activity("Manage Policies", None, &["account:policies:write"], RaciRole::A),
    activity("View Users", None, &["account:users:read"], RaciRole::C),
    activity("View Groups", None, &["account:groups:read"], RaciRole::C),
];

const CONFIGURATION: Option<&str> = Some("Configuration");
const USER_MANAGEMENT: Option<&str> = Some("User Management");
const ACCESS_CONTROL: Option<&str> = Some("Access Control");
const MONITORING: Option<&str> = Some("Monitoring");

const ENTERPRISE: &[GovernanceActivity] = &[
    activity(
        "View Configuration",
        CONFIGURATION,
        &["settings:objects:read", "settings:schemas:read"],
        RaciRole::I,
    ),
    activity("Modify Configuration", CONFIGURATION, &["settings:objects:write"], RaciRole::R),
    activity("View Users", USER_MANAGEMENT, &["account:users:read"], RaciRole::C),
    activity("Create/Delete Users", USER_MANAGEMENT, &["account:users:write"], RaciRole::A),
    activity("Manage User Groups", USER_MANAGEMENT, &["account:groups:write"], RaciRole::R),
    activity("View Policies", ACCESS_CONTROL, &["account:policies:read"], RaciRole::C),
    activity("Create/Modify Policies", ACCESS_CONTROL, &["account:policies:write"], RaciRole::A),
    activity(
        "Manage Role Assignments",
        ACCESS_CONTROL,
        &["environment:roles:manage"],
        RaciRole::A,
    ),
    activity("View Audit Logs", MONITORING, &["account:audit-log:read"], RaciRole::C),
    activity(
        "Generate Reports",
        MONITORING,
        &["account:users:read", "account:groups:read"],
        RaciRole::I,
    ),
];

static TEMPLATES: &[RaciTemplate] = &[
    RaciTemplate {
        name: "basic",
        description: "Basic RACI matrix for common IAM activities",
        activities: BASIC,
    },
    RaciTemplate {
        name: "enterprise",
        description: "Enterprise RACI matrix with detailed activities",
        activities: ENTERPRISE,
    },
];

/// Built-in templates.
pub fn templates() -> &'static [RaciTemplate] {
    TEMPLATES
}

/// Look up a built-in template by name.
pub fn template(name: &str) -> Option<&'static RaciTemplate> {
    TEMPLATES.iter().find(|t| t.name == name)
}

/// Row fields that group columns share a JSON object with.
const ROW_FIELDS: &[&str] = &["activity", "category", "required_permissions"];

/// Prefix for group columns that would otherwise clash with a row field.
const GROUP_COLUMN_PREFIX: &str = "group:";

/// JSON key of a group column. Names equal to a row field, or already
/// carrying the prefix, are prefixed so every column round-trips.
fn column_key(group_name: &str) -> Cow<'_, str> {
    if ROW_FIELDS.contains(&group_name) || group_name.starts_with(GROUP_COLUMN_PREFIX) {
        Cow::Owned(format!("{}{}", GROUP_COLUMN_PREFIX, group_name))
    } else {
        Cow::Borrowed(group_name)
    }
}

fn group_name(column_key: &str) -> &str {
    column_key
        .strip_prefix(GROUP_COLUMN_PREFIX)
        .unwrap_or(column_key)
}

/// One activity row. Group cells are `null` when the group plays no role.
///
/// Serializes as a flat object: the row fields, then one key per group in
/// the matrix's entity order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaciRow {
    pub activity: String,
    pub category: Option<String>,
    pub required_permissions: Vec<String>,
    /// `(group name, role)` in entity order.
    pub roles: Vec<(String, Option<RaciRole>)>,
}

impl RaciRow {
    /// Role of a group for this activity.
    pub fn role(&self, group_name: &str) -> Option<RaciRole> {
        self.roles
            .iter()
            .find(|(name, _)| name == group_name)
            .and_then(|(_, role)| *role)
    }
}

impl Serialize for RaciRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 2 + usize::from(self.category.is_some()) + self.roles.len();
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("activity", &self.activity)?;
        if let Some(category) = &self.category {
            map.serialize_entry("category", category)?;
        }
        map.serialize_entry("required_permissions", &self.required_permissions)?;
        for (group, role) in &self.roles {
            map.serialize_entry(column_key(group).as_ref(), role)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RaciRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = RaciRow;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a RACI row object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RaciRow, A::Error> {
                let mut activity = None;
                let mut category = None;
                let mut required_permissions = None;
                let mut roles = Vec::new();

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "activity" => activity = Some(map.next_value()?),
                        "category" => category = map.next_value()?,
                        "required_permissions" => required_permissions = Some(map.next_value()?),
                        column => roles.push((group_name(column).to_string(), map.next_value()?)),
                    }
                }

                Ok(RaciRow {
                    activity: activity.ok_or_else(|| de::Error::missing_field("activity"))?,
                    category,
                    required_permissions: required_permissions
                        .ok_or_else(|| de::Error::missing_field("required_permissions"))?,
                    roles,
                })
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// A filled-in RACI matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceMatrix {
    pub template: String,
    pub description: String,
    pub activities: Vec<String>,
    /// Group names in listing order. Row columns follow this order.
    pub entities: Vec<String>,
    pub rows: Vec<RaciRow>,
}

/// Builds RACI matrices from the account's groups.
pub struct GovernanceMatrixBuilder<'a, D: ?Sized> {
    directory: &'a D,
    aggregator: PermissionsAggregator<'a, D>,
}

impl<'a, D: Directory + ?Sized> GovernanceMatrixBuilder<'a, D> {
    pub fn new(directory: &'a D) -> Self {
        Self {
            directory,
            aggregator: PermissionsAggregator::new(directory),
        }
    }

    /// Generate the matrix for a built-in template.
    ///
    /// Groups sharing a name share a column; their grants are combined.
    #[instrument(skip(self))]
    pub async fn generate(&self, template_name: &str) -> AnalysisResult<GovernanceMatrix> {
        let template = template(template_name).ok_or_else(|| AnalysisError::UnknownTemplate {
            name: template_name.to_string(),
            available: TEMPLATES.iter().map(|t| t.name.to_string()).collect(),
        })?;

        let mut entities: Vec<String> = Vec::new();
        let mut held: Vec<HeldPermissions> = Vec::new();
        let mut columns: HashMap<String, usize> = HashMap::new();

        for group in self.directory.list_groups().await? {
            let permissions = self.aggregator.collect_group(&group).await?;
            let column = *columns.entry(group.name.clone()).or_insert_with(|| {
                entities.push(group.name);
                held.push(HeldPermissions::default());
                held.len() - 1
            });
            held[column].merge(&permissions.allowed_actions());
        }

        let rows = template
            .activities
            .iter()
            .map(|activity| RaciRow {
                activity: activity.name.to_string(),
                category: activity.category.map(str::to_string),
                required_permissions: activity
                    .required_permissions
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
                roles: entities
                    .iter()
                    .zip(&held)
                    .map(|(group, permissions)| {
                        let role = permissions
                            .satisfies(activity.required_permissions)
                            .then_some(activity.role);
                        (group.clone(), role)
                    })
                    .collect(),
            })
            .collect();

        debug!(template = template.name, groups = entities.len(), "Generated RACI matrix");

        Ok(GovernanceMatrix {
            template: template.name.to_string(),
            description: template.description.to_string(),
            activities: template.activities.iter().map(|a| a.name.to_string()).collect(),
            entities,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iam_directory::{Binding, Group, MemoryDirectory, Policy};
    use serde_json::json;

    fn directory() -> MemoryDirectory {
        MemoryDirectory::new("acc-1")
            .with_group(Group::new("g-admins", "Admins"))
            .with_group(Group::new("g-viewers", "Viewers"))
            .with_group(Group::new("g-empty", "Nobody"))
            .with_policy(Policy::new("p-admin", "Account Admin", "ALLOW account:*;"))
            .with_policy(Policy::new(
                "p-view",
                "Viewer",
                "ALLOW settings:objects:read; DENY settings:objects:write;",
            ))
            .with_binding(Binding::new("p-admin", "g-admins"))
            .with_binding(Binding::new("p-view", "g-viewers"))
    }

    #[test]
    fn test_templates() {
        let names: Vec<&str> = templates().iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["basic", "enterprise"]);
        assert_eq!(template("basic").unwrap().activities.len(), 7);
        assert_eq!(template("enterprise").unwrap().activities.len(), 10);
        assert!(template("custom").is_none());
        assert_eq!(RaciRole::A.name(), "Accountable");
    }

    #[tokio::test]
    async fn test_basic_matrix_roles() {
        let directory = directory();
        let matrix = GovernanceMatrixBuilder::new(&directory)
            .generate("basic")
            .await
            .unwrap();

        assert_eq!(matrix.entities, vec!["Admins", "Viewers", "Nobody"]);
        assert_eq!(matrix.activities.len(), 7);

        let view_settings = &matrix.rows[0];
        assert_eq!(view_settings.activity, "View Settings");
        assert_eq!(view_settings.role("Viewers"), Some(RaciRole::I));
        assert_eq!(view_settings.role("Admins"), None);

        // Held wildcard `account:*` covers every account activity.
        let manage_users = &matrix.rows[2];
        assert_eq!(manage_users.role("Admins"), Some(RaciRole::A));
        assert_eq!(manage_users.role("Nobody"), None);

        // DENY is never a grant.
        let modify_settings = &matrix.rows[1];
        assert_eq!(modify_settings.role("Viewers"), None);
    }

    #[tokio::test]
    async fn test_enterprise_rows_carry_categories() {
        let directory = directory();
        let matrix = GovernanceMatrixBuilder::new(&directory)
            .generate("enterprise")
            .await
            .unwrap();

        let row = serde_json::to_value(&matrix.rows[0]).unwrap();
        assert_eq!(
            row,
            json!({
                "activity": "View Configuration",
                "category": "Configuration",
                "required_permissions": ["settings:objects:read", "settings:schemas:read"],
                "Admins": null,
                "Viewers": "I",
                "Nobody": null
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_template() {
        let directory = directory();
        let err = GovernanceMatrixBuilder::new(&directory)
            .generate("custom")
            .await
            .unwrap_err();

        match err {
            AnalysisError::UnknownTemplate { name, available } => {
                assert_eq!(name, "custom");
                assert_eq!(available, vec!["basic", "enterprise"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(directory.call_count(), 0);
    }

    #[tokio::test]
    async fn test_same_named_groups_share_a_column() {
        let directory = directory()
            .with_group(Group::new("g-viewers-2", "Viewers"))
            .with_policy(Policy::new("p-groups", "Groups", "ALLOW account:groups:read;"))
            .with_binding(Binding::new("p-groups", "g-viewers-2"));

        let matrix = GovernanceMatrixBuilder::new(&directory)
            .generate("basic")
            .await
            .unwrap();

        assert_eq!(matrix.entities, vec!["Admins", "Viewers", "Nobody"]);
        assert_eq!(matrix.rows[0].role("Viewers"), Some(RaciRole::I));
        assert_eq!(matrix.rows[6].role("Viewers"), Some(RaciRole::C));
    }

    #[tokio::test]
    async fn test_columns_follow_listing_order() {
        let directory = MemoryDirectory::new("acc-1")
            .with_group(Group::new("g-z", "Zeta"))
            .with_group(Group::new("g-a", "Alpha"))
            .with_policy(Policy::new("p-view", "Viewer", "ALLOW settings:objects:read;"))
            .with_binding(Binding::new("p-view", "g-a"));

        let matrix = GovernanceMatrixBuilder::new(&directory)
            .generate("basic")
            .await
            .unwrap();

        assert_eq!(matrix.entities, vec!["Zeta", "Alpha"]);
        let columns: Vec<&str> = matrix.rows[0].roles.iter().map(|(g, _)| g.as_str()).collect();
        assert_eq!(columns, matrix.entities);
        assert_eq!(
            serde_json::to_string(&matrix.rows[0]).unwrap(),
            r#"{"activity":"View Settings","required_permissions":["settings:objects:read"],"Zeta":null,"Alpha":"I"}"#
        );
    }

    #[tokio::test]
    async fn test_group_named_like_a_row_field() {
        let directory = MemoryDirectory::new("acc-1")
            .with_group(Group::new("g-1", "activity"))
            .with_group(Group::new("g-2", "group:x"))
            .with_policy(Policy::new("p-view", "Viewer", "ALLOW settings:objects:read;"))
            .with_binding(Binding::new("p-view", "g-1"));

        let matrix = GovernanceMatrixBuilder::new(&directory)
            .generate("basic")
            .await
            .unwrap();

        let row = &matrix.rows[0];
        assert_eq!(row.activity, "View Settings");
        assert_eq!(row.role("activity"), Some(RaciRole::I));
        assert_eq!(
            serde_json::to_value(row).unwrap(),
            json!({
                "activity": "View Settings",
                "required_permissions": ["settings:objects:read"],
                "group:activity": "I",
                "group:group:x": null
            })
        );

        let parsed: RaciRow = serde_json::from_str(&serde_json::to_string(row).unwrap()).unwrap();
        assert_eq!(&parsed, row);
    }
}
