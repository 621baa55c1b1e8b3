//! Locally computed effective permissions.
//!
//! A user's permissions come from the groups they belong to; a group's come
//! from the policies bound to it. The aggregator walks
//! user → groups → bindings → policies, parses every statement, and folds
//! the `ALLOW` declarations into one entry per `EFFECT:action` key with the
//! list of places each grant came from.
//!
//! `DENY` declarations are parsed and reported with the traversed bindings,
//! but they are not applied against matching grants.
//!
//! A binding whose policy no longer exists fails the whole resolution with
//! the directory's `NotFound`; only the top-level identifier soft-fails.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};

use iam_directory::{Binding, Directory, DirectoryResult, Group, User};
use iam_policy::{parse_statement_query, Effect, HeldPermissions, PermissionStatement};

use crate::lookup::{find_group, find_user};
use crate::outcome::Outcome;

/// Where a grant came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSource {
    /// Group name (user results only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Policy name.
    pub policy: String,

    /// Boundaries of the binding, `", "`-joined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<String>,
}

/// One effective permission and its sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePermission {
    pub effect: Effect,
    pub action: String,
    pub description: String,
    /// Sources in traversal order.
    pub sources: Vec<PermissionSource>,
}

impl EffectivePermission {
    /// Aggregation key in the form `EFFECT:action`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.effect, self.action)
    }
}

/// Permissions keyed by `EFFECT:action`, in first-seen order.
#[derive(Debug, Default)]
struct PermissionIndex {
    entries: Vec<EffectivePermission>,
    positions: HashMap<String, usize>,
}

impl PermissionIndex {
    fn add(&mut self, statement: &PermissionStatement, source: PermissionSource) {
        let key = statement.key();
        match self.positions.get(&key) {
            Some(&index) => self.entries[index].sources.push(source),
            None => {
                self.positions.insert(key, self.entries.len());
                self.entries.push(EffectivePermission {
                    effect: statement.effect,
                    action: statement.action.clone(),
                    description: statement.description.clone(),
                    sources: vec![source],
                });
            }
        }
    }

    fn fold(&mut self, statements: &[PermissionStatement], source: &PermissionSource) {
        for statement in statements.iter().filter(|s| s.effect.is_allow()) {
            self.add(statement, source.clone());
        }
    }

    fn into_entries(self) -> Vec<EffectivePermission> {
        self.entries
    }
}

/// Identity part of a user result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub uid: String,
    pub email: String,
}

impl From<&User> for UserRef {
    fn from(user: &User) -> Self {
        Self {
            uid: user.uid.clone(),
            email: user.email.clone(),
        }
    }
}

/// Identity part of a group result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    pub uuid: String,
    pub name: String,
}

impl From<&Group> for GroupRef {
    fn from(group: &Group) -> Self {
        Self {
            uuid: group.uuid.clone(),
            name: group.name.clone(),
        }
    }
}

/// A binding traversed while resolving a user, with the parsed policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBinding {
    pub group_uuid: String,
    pub group_name: String,
    pub policy_uuid: String,
    pub policy_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<String>,
    /// Every declaration of the policy, `DENY` included.
    pub permissions: Vec<PermissionStatement>,
}

/// Effective permissions of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEffectivePermissions {
    pub user: UserRef,
    pub groups: Vec<GroupRef>,
    pub group_count: usize,
    pub bindings: Vec<UserBinding>,
    pub binding_count: usize,
    pub effective_permissions: Vec<EffectivePermission>,
    pub permission_count: usize,
}

/// Effective permissions of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEffectivePermissions {
    pub group: GroupRef,
    pub bindings: Vec<Binding>,
    pub binding_count: usize,
    pub effective_permissions: Vec<EffectivePermission>,
    pub permission_count: usize,
}

impl GroupEffectivePermissions {
    /// Actions the group is allowed, for capability matching.
    pub fn allowed_actions(&self) -> HeldPermissions {
        self.effective_permissions
            .iter()
            .filter(|p| p.effect.is_allow())
            .map(|p| p.action.clone())
            .collect()
    }
}

/// Computes effective permissions from bindings and policy statements.
///
/// Directory calls are made one at a time; nothing is cached here. Wrap the
/// directory in a `CachedDirectory` to avoid refetching shared policies.
pub struct PermissionsAggregator<'a, D: ?Sized> {
    directory: &'a D,
}

impl<'a, D: Directory + ?Sized> PermissionsAggregator<'a, D> {
    /// Create an aggregator reading from `directory`.
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    /// Effective permissions of a user identified by UID or email.
    #[instrument(skip(self))]
    pub async fn resolve_user(
        &self,
        identifier: &str,
    ) -> DirectoryResult<Outcome<UserEffectivePermissions>> {
        let user = match find_user(self.directory, identifier).await? {
            Some(user) => user,
            None => return Ok(Outcome::not_found("User", identifier)),
        };

        let groups = self.directory.get_user_groups(&user.uid).await?;
        let mut bindings = Vec::new();
        let mut index = PermissionIndex::default();

        for group in &groups {
            for binding in self.directory.list_bindings_for_group(&group.uuid).await? {
                let policy = self.directory.get_policy(&binding.policy_uuid).await?;
                let permissions = parse_statement_query(policy.statement());
                let boundary = binding.boundary();

                index.fold(
                    &permissions,
                    &PermissionSource {
                        group: Some(group.name.clone()),
                        policy: policy.name.clone(),
                        boundary: boundary.clone(),
                    },
                );

                bindings.push(UserBinding {
                    group_uuid: group.uuid.clone(),
                    group_name: group.name.clone(),
                    policy_uuid: binding.policy_uuid,
                    policy_name: policy.name,
                    boundary,
                    permissions,
                });
            }
        }

        let effective_permissions = index.into_entries();
        debug!(
            uid = %user.uid,
            groups = groups.len(),
            permissions = effective_permissions.len(),
            "Resolved user permissions"
        );

        Ok(Outcome::Found(UserEffectivePermissions {
            user: UserRef::from(&user),
            groups: groups.iter().map(GroupRef::from).collect(),
            group_count: groups.len(),
            binding_count: bindings.len(),
            bindings,
            permission_count: effective_permissions.len(),
            effective_permissions,
        }))
    }

    /// Effective permissions of a group identified by UUID or name.
    #[instrument(skip(self))]
    pub async fn resolve_group(
        &self,
        identifier: &str,
    ) -> DirectoryResult<Outcome<GroupEffectivePermissions>> {
        match find_group(self.directory, identifier).await? {
            Some(group) => Ok(Outcome::Found(self.collect_group(&group).await?)),
            None => Ok(Outcome::not_found("Group", identifier)),
        }
    }

    /// Effective permissions of an already resolved group.
    pub async fn collect_group(&self, group: &Group) -> DirectoryResult<GroupEffectivePermissions> {
        let bindings = self.directory.list_bindings_for_group(&group.uuid).await?;
        let mut index = PermissionIndex::default();

        for binding in &bindings {
            let policy = self.directory.get_policy(&binding.policy_uuid).await?;

            index.fold(
                &parse_statement_query(policy.statement()),
                &PermissionSource {
                    group: None,
                    policy: policy.name,
                    boundary: binding.boundary(),
                },
            );
        }

        let effective_permissions = index.into_entries();
        Ok(GroupEffectivePermissions {
            group: GroupRef::from(group),
            binding_count: bindings.len(),
            bindings,
            permission_count: effective_permissions.len(),
            effective_permissions,
        })
    }
}
