//! The data-access trait consumed by the analysis engine.

use async_trait::async_trait;

use crate::error::DirectoryResult;
use crate::types::{
    Binding, EffectivePermissionsPage, EffectivePermissionsQuery, Group, Policy, User,
};

/// Read access to an account's IAM resources.
///
/// Lookups by identifier return [`DirectoryError::NotFound`] when the
/// resource does not exist; lookups by name or email return `Ok(None)`.
///
/// Implementations are shared by reference across analysis components.
/// Whether concurrent use is safe beyond `Send + Sync` (rate limits,
/// token refresh) is up to the implementation.
///
/// [`DirectoryError::NotFound`]: crate::error::DirectoryError::NotFound
#[async_trait]
pub trait Directory: Send + Sync {
    /// UUID of the account this directory reads from.
    fn account_uuid(&self) -> &str;

    /// List all groups.
    async fn list_groups(&self) -> DirectoryResult<Vec<Group>>;

    /// Get a group by UUID.
    async fn get_group(&self, uuid: &str) -> DirectoryResult<Group>;

    /// Find a group by exact name.
    async fn get_group_by_name(&self, name: &str) -> DirectoryResult<Option<Group>> {
        let groups = self.list_groups().await?;
        Ok(groups.into_iter().find(|g| g.name == name))
    }

    /// List all users.
    async fn list_users(&self) -> DirectoryResult<Vec<User>>;

    /// Get a user by UID.
    async fn get_user(&self, uid: &str) -> DirectoryResult<User>;

    /// Find a user by email (case-insensitive).
    async fn get_user_by_email(&self, email: &str) -> DirectoryResult<Option<User>> {
        let users = self.list_users().await?;
        Ok(users
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    /// Groups the user is a member of.
    async fn get_user_groups(&self, uid: &str) -> DirectoryResult<Vec<Group>>;

    /// All account-level bindings.
    async fn list_bindings(&self) -> DirectoryResult<Vec<Binding>>;

    /// Account-level bindings of one group.
    async fn list_bindings_for_group(&self, group_uuid: &str) -> DirectoryResult<Vec<Binding>>;

    /// List account-level policies (possibly without statements).
    async fn list_policies(&self) -> DirectoryResult<Vec<Policy>>;

    /// Get a policy with its statement.
    async fn get_policy(&self, uuid: &str) -> DirectoryResult<Policy>;

    /// Find a policy by exact name.
    async fn get_policy_by_name(&self, name: &str) -> DirectoryResult<Option<Policy>> {
        let policies = self.list_policies().await?;
        Ok(policies.into_iter().find(|p| p.name == name))
    }

    /// One page of the platform's effective-permissions resolution.
    async fn get_effective_permissions(
        &self,
        query: &EffectivePermissionsQuery,
        page: u32,
        size: u32,
    ) -> DirectoryResult<EffectivePermissionsPage>;
}
