//! End-to-end analysis tests over in-memory and hand-written directories.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use iam_analysis::{
    EffectivePermissionsApi, GovernanceMatrixBuilder, Outcome, PermissionSource,
    PermissionsAggregator, PermissionsMatrixBuilder, PolicyAnalyzer, RaciRole, ResolveRequest,
};
use iam_directory::{
    Binding, CachedDirectory, Directory, DirectoryError, DirectoryResult,
    EffectivePermissionsPage, EffectivePermissionsQuery, Group, MemoryDirectory, Policy, User,
};
use serde_json::json;

fn account() -> MemoryDirectory {
    MemoryDirectory::new("acc-1")
        .with_group(Group::new("g-devops", "DevOps"))
        .with_group(Group::new("g-admins", "Admins"))
        .with_user(User::new("u-1", "dev@example.com"))
        .with_membership("u-1", "g-devops")
        .with_membership("u-1", "g-admins")
        .with_policy(Policy::new("p-read", "Settings Reader", "ALLOW settings:objects:read;"))
        .with_policy(Policy::new(
            "p-admin",
            "User Admin",
            "ALLOW account:users:read, account:users:write, account:groups:write; DENY settings:objects:write;",
        ))
        .with_binding(Binding::new("p-read", "g-devops"))
        .with_binding(Binding::new("p-read", "g-admins"))
        .with_binding(Binding::new("p-admin", "g-admins"))
}

#[tokio::test]
async fn test_devops_group_end_to_end() {
    let directory = MemoryDirectory::new("acc-1")
        .with_group(Group::new("g-1", "DevOps"))
        .with_policy(Policy::new("p-1", "Settings Reader", "ALLOW settings:objects:read;"))
        .with_binding(Binding::new("p-1", "g-1"));

    let outcome = PermissionsAggregator::new(&directory)
        .resolve_group("DevOps")
        .await
        .unwrap();

    let result = match outcome {
        Outcome::Found(result) => result,
        Outcome::Failed(err) => panic!("unexpected failure: {err}"),
    };
    assert_eq!(result.permission_count, 1);
    assert_eq!(
        result.effective_permissions[0].sources,
        vec![PermissionSource {
            group: None,
            policy: "Settings Reader".to_string(),
            boundary: None,
        }]
    );
}

#[tokio::test]
async fn test_user_permissions_have_no_duplicate_keys() {
    let directory = account();
    let result = PermissionsAggregator::new(&directory)
        .resolve_user("dev@example.com")
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let mut keys: Vec<String> = result.effective_permissions.iter().map(|p| p.key()).collect();
    let total = keys.len();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), total);
    assert_eq!(result.permission_count, 4);

    let read = &result.effective_permissions[0];
    assert_eq!(read.action, "settings:objects:read");
    assert_eq!(read.sources.len(), 2);
    assert_eq!(read.sources[1].group.as_deref(), Some("Admins"));
}

#[tokio::test]
async fn test_cached_directory_serves_repeated_policy_fetches() {
    let cache = CachedDirectory::new(account(), Duration::from_secs(300));

    let matrix = PermissionsMatrixBuilder::new(&cache)
        .build_group_matrix()
        .await
        .unwrap();
    assert_eq!(matrix.entity_count, 2);

    // p-read is bound to both groups but fetched once.
    let stats = cache.stats().await;
    assert_eq!(stats.hits, 1);

    let governance = GovernanceMatrixBuilder::new(&cache)
        .generate("basic")
        .await
        .unwrap();
    assert_eq!(governance.rows[2].role("Admins"), Some(RaciRole::A));
    assert_eq!(governance.rows[2].role("DevOps"), None);
    assert!(cache.stats().await.hits > stats.hits);
}

#[tokio::test]
async fn test_components_accept_trait_objects() {
    let directory = account();
    let shared: &dyn Directory = &directory;

    let analysis = PolicyAnalyzer::new(shared)
        .analyze("p-read")
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(analysis.binding_count, 2);

    let report = PolicyAnalyzer::new(shared).least_privilege().await.unwrap();
    assert_eq!(report.total_policies, 2);
    assert_eq!(report.policies_with_findings, 2);
}

/// Serves full pages until `fail_at`, then fails.
struct FlakyResolution {
    fail_at: u32,
    pages_served: AtomicU32,
}

#[async_trait]
impl Directory for FlakyResolution {
    fn account_uuid(&self) -> &str {
        "acc-flaky"
    }

    async fn list_groups(&self) -> DirectoryResult<Vec<Group>> {
        Ok(Vec::new())
    }

    async fn get_group(&self, uuid: &str) -> DirectoryResult<Group> {
        Ok(Group::new(uuid, "Flaky"))
    }

    async fn list_users(&self) -> DirectoryResult<Vec<User>> {
        Ok(Vec::new())
    }

    async fn get_user(&self, uid: &str) -> DirectoryResult<User> {
        Err(DirectoryError::NotFound {
            resource: "user",
            id: uid.to_string(),
        })
    }

    async fn get_user_groups(&self, _uid: &str) -> DirectoryResult<Vec<Group>> {
        Ok(Vec::new())
    }

    async fn list_bindings(&self) -> DirectoryResult<Vec<Binding>> {
        Ok(Vec::new())
    }

    async fn list_bindings_for_group(&self, _group_uuid: &str) -> DirectoryResult<Vec<Binding>> {
        Ok(Vec::new())
    }

    async fn list_policies(&self) -> DirectoryResult<Vec<Policy>> {
        Ok(Vec::new())
    }

    async fn get_policy(&self, uuid: &str) -> DirectoryResult<Policy> {
        Err(DirectoryError::NotFound {
            resource: "policy",
            id: uuid.to_string(),
        })
    }

    async fn get_effective_permissions(
        &self,
        query: &EffectivePermissionsQuery,
        page: u32,
        size: u32,
    ) -> DirectoryResult<EffectivePermissionsPage> {
        if page == self.fail_at {
            return Err(DirectoryError::from_status(
                502,
                "effective permissions",
                "resolve",
                &query.entity_id,
                "bad gateway",
            ));
        }
        self.pages_served.fetch_add(1, Ordering::SeqCst);
        Ok(EffectivePermissionsPage {
            effective_permissions: (0..size).map(|i| json!({ "n": i })).collect(),
            total: Some(1_000),
        })
    }
}

#[tokio::test]
async fn test_second_page_failure_aborts_resolution() {
    let directory = FlakyResolution {
        fail_at: 2,
        pages_served: AtomicU32::new(0),
    };

    let outcome = EffectivePermissionsApi::new(&directory)
        .resolve(ResolveRequest::group("g-1").with_services(["settings"]))
        .await;

    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        json!({
            "error": "Failed to resolve effective permissions: bad gateway",
            "status_code": 502
        })
    );
    assert_eq!(directory.pages_served.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_single_page_ignores_later_failures() {
    let directory = FlakyResolution {
        fail_at: 2,
        pages_served: AtomicU32::new(0),
    };

    let report = EffectivePermissionsApi::new(&directory)
        .resolve(ResolveRequest::user("u-1").first_page_only())
        .await
        .into_result()
        .unwrap();

    assert_eq!(report.level_id, "acc-flaky");
    assert_eq!(report.effective_permissions.len(), 100);
    assert_eq!(report.total, 1_000);
}
