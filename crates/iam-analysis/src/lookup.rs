//! Identifier resolution shared by the analysis components.
//!
//! Direct lookups by UID/UUID come first; a `NotFound` falls back to a lookup
//! by name or email. Any other directory error propagates.

use iam_directory::{Directory, DirectoryResult, Group, Policy, User};

/// Resolve a user by UID or email. Identifiers containing `@` are treated as
/// emails (case-insensitive).
pub(crate) async fn find_user<D>(directory: &D, identifier: &str) -> DirectoryResult<Option<User>>
where
    D: Directory + ?Sized,
{
    if identifier.contains('@') {
        return directory.get_user_by_email(identifier).await;
    }

    match directory.get_user(identifier).await {
        Ok(user) => Ok(Some(user)),
        Err(e) if e.is_not_found() => directory.get_user_by_email(identifier).await,
        Err(e) => Err(e),
    }
}

/// Resolve a group by UUID, then by exact name.
pub(crate) async fn find_group<D>(directory: &D, identifier: &str) -> DirectoryResult<Option<Group>>
where
    D: Directory + ?Sized,
{
    match directory.get_group(identifier).await {
        Ok(group) => Ok(Some(group)),
        Err(e) if e.is_not_found() => directory.get_group_by_name(identifier).await,
        Err(e) => Err(e),
    }
}

/// Resolve a policy by UUID, then by exact name. A policy found by name is
/// re-fetched by UUID when the listing omitted its statement.
pub(crate) async fn find_policy<D>(
    directory: &D,
    identifier: &str,
) -> DirectoryResult<Option<Policy>>
where
    D: Directory + ?Sized,
{
    match directory.get_policy(identifier).await {
        Ok(policy) => Ok(Some(policy)),
        Err(e) if e.is_not_found() => match directory.get_policy_by_name(identifier).await? {
            Some(policy) if policy.statement_query.is_none() => {
                directory.get_policy(&policy.uuid).await.map(Some)
            }
            other => Ok(other),
        },
        Err(e) => Err(e),
    }
}
