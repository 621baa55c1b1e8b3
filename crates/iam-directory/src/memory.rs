//! In-memory directory for tests and offline analysis.
//!
//! Records are kept in insertion order. Listing policies returns them without
//! statements, like the API does, so consumers must fetch policy details.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::directory::Directory;
use crate::error::{DirectoryError, DirectoryResult};
use crate::types::{
    Binding, EffectivePermissionsPage, EffectivePermissionsQuery, Group, Policy, User,
};

/// In-memory directory built up with `with_*` calls.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    account_uuid: String,
    groups: Vec<Group>,
    users: Vec<User>,
    policies: Vec<Policy>,
    bindings: Vec<Binding>,
    /// (user uid, group uuid)
    memberships: Vec<(String, String)>,
    /// Resolution items per entity id.
    resolutions: HashMap<String, Vec<serde_json::Value>>,
    /// Operation name -> HTTP status to fail with.
    failures: HashMap<String, u16>,
    /// Effective-permissions page -> HTTP status to fail with.
    page_failures: HashMap<u32, u16>,
    calls: Arc<AtomicUsize>,
}

impl MemoryDirectory {
    /// Create an empty directory for an account.
    pub fn new(account_uuid: impl Into<String>) -> Self {
        Self {
            account_uuid: account_uuid.into(),
            ..Default::default()
        }
    }

    /// Add a group.
    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    /// Add a user.
    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    /// Add a policy.
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Add an account-level binding. An empty level id is filled with the
    /// account UUID.
    pub fn with_binding(mut self, mut binding: Binding) -> Self {
        if binding.level_id.is_empty() {
            binding.level_id = self.account_uuid.clone();
        }
        self.bindings.push(binding);
        self
    }

    /// Make a user a member of a group.
    pub fn with_membership(mut self, uid: impl Into<String>, group_uuid: impl Into<String>) -> Self {
        self.memberships.push((uid.into(), group_uuid.into()));
        self
    }

    /// Items the resolution endpoint returns for an entity.
    pub fn with_resolution(
        mut self,
        entity_id: impl Into<String>,
        items: Vec<serde_json::Value>,
    ) -> Self {
        self.resolutions.insert(entity_id.into(), items);
        self
    }

    /// Fail every call of a trait method (e.g. `"get_policy"`) with `status`.
    pub fn fail_on(mut self, operation: impl Into<String>, status: u16) -> Self {
        self.failures.insert(operation.into(), status);
        self
    }

    /// Fail one page of the effective-permissions resolution with `status`.
    pub fn fail_page(mut self, page: u32, status: u16) -> Self {
        self.page_failures.insert(page, status);
        self
    }

    /// Number of trait calls served so far (clones share the counter).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self, operation: &str, resource: &'static str) -> DirectoryResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.get(operation) {
            Some(&status) => Err(DirectoryError::from_status(
                status,
                resource,
                operation,
                "",
                "injected failure",
            )),
            None => Ok(()),
        }
    }

    fn not_found(resource: &'static str, id: &str) -> DirectoryError {
        DirectoryError::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    fn account_uuid(&self) -> &str {
        &self.account_uuid
    }

    async fn list_groups(&self) -> DirectoryResult<Vec<Group>> {
        self.record("list_groups", "group")?;
        Ok(self.groups.clone())
    }

    async fn get_group(&self, uuid: &str) -> DirectoryResult<Group> {
        self.record("get_group", "group")?;
        self.groups
            .iter()
            .find(|g| g.uuid == uuid)
            .cloned()
            .ok_or_else(|| Self::not_found("group", uuid))
    }

    async fn list_users(&self) -> DirectoryResult<Vec<User>> {
        self.record("list_users", "user")?;
        Ok(self.users.clone())
    }

    async fn get_user(&self, uid: &str) -> DirectoryResult<User> {
        self.record("get_user", "user")?;
        self.users
            .iter()
            .find(|u| u.uid == uid)
            .cloned()
            .ok_or_else(|| Self::not_found("user", uid))
    }

    async fn get_user_groups(&self, uid: &str) -> DirectoryResult<Vec<Group>> {
        self.record("get_user_groups", "user")?;
        if !self.users.iter().any(|u| u.uid == uid) {
            return Err(Self::not_found("user", uid));
        }

        Ok(self
            .memberships
            .iter()
            .filter(|(member, _)| member == uid)
            .filter_map(|(_, group_uuid)| self.groups.iter().find(|g| &g.uuid == group_uuid))
            .cloned()
            .collect())
    }

    async fn list_bindings(&self) -> DirectoryResult<Vec<Binding>> {
        self.record("list_bindings", "binding")?;
        Ok(self.bindings.clone())
    }

    async fn list_bindings_for_group(&self, group_uuid: &str) -> DirectoryResult<Vec<Binding>> {
        self.record("list_bindings_for_group", "binding")?;
        Ok(self
            .bindings
            .iter()
            .filter(|b| b.group_uuid == group_uuid)
            .cloned()
            .collect())
    }

    async fn list_policies(&self) -> DirectoryResult<Vec<Policy>> {
        self.record("list_policies", "policy")?;
        Ok(self
            .policies
            .iter()
            .map(|p| Policy {
                statement_query: None,
                ..p.clone()
            })
            .collect())
    }

    async fn get_policy(&self, uuid: &str) -> DirectoryResult<Policy> {
        self.record("get_policy", "policy")?;
        self.policies
            .iter()
            .find(|p| p.uuid == uuid)
            .cloned()
            .ok_or_else(|| Self::not_found("policy", uuid))
    }

    async fn get_effective_permissions(
        &self,
        query: &EffectivePermissionsQuery,
        page: u32,
        size: u32,
    ) -> DirectoryResult<EffectivePermissionsPage> {
        self.record("get_effective_permissions", "effective permissions")?;
        if let Some(&status) = self.page_failures.get(&page) {
            return Err(DirectoryError::from_status(
                status,
                "effective permissions",
                "resolve",
                &query.entity_id,
                format!("page {} unavailable", page),
            ));
        }

        let items = self
            .resolutions
            .get(&query.entity_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let size = size.max(1) as usize;
        let start = (page.max(1) as usize - 1) * size;

        Ok(EffectivePermissionsPage {
            effective_permissions: items.iter().skip(start).take(size).cloned().collect(),
            total: Some(items.len() as u64),
        })
    }
}
