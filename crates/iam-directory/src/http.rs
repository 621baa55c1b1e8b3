//! HTTP directory backed by the IAM REST API.
//!
//! Every request carries the configured bearer token and is retried on
//! transient failures. Non-success statuses are mapped to [`DirectoryError`]
//! variants (404 → NotFound, 403 → PermissionDenied, 409 → Conflict).

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::DirectoryConfig;
use crate::directory::Directory;
use crate::error::{DirectoryError, DirectoryResult};
use crate::retry::{with_retry_if, RetryConfig};
use crate::types::{
    Binding, EffectivePermissionsPage, EffectivePermissionsQuery, Group, Policy, User,
};

/// List payloads come either wrapped (`{"items": [...]}`, `{"policies": [...]}`,
/// ...) or as a bare array.
#[derive(Deserialize)]
#[serde(untagged, bound(deserialize = "T: DeserializeOwned"))]
enum ListResponse<T> {
    Wrapped {
        #[serde(default, alias = "groups", alias = "users", alias = "policies")]
        items: Vec<T>,
    },
    Bare(Vec<T>),
}

impl<T> ListResponse<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            ListResponse::Wrapped { items } => items,
            ListResponse::Bare(items) => items,
        }
    }
}

/// Bindings as returned by the repo API, grouped by policy.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BindingsResponse {
    #[serde(default, alias = "bindings")]
    policy_bindings: Vec<PolicyBindings>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyBindings {
    #[serde(default)]
    policy_uuid: String,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    boundaries: Vec<String>,
}

/// Directory that reads from the IAM REST API.
#[derive(Clone)]
pub struct HttpDirectory {
    /// HTTP client instance.
    client: Client,

    /// Endpoint, account and credentials.
    config: DirectoryConfig,

    /// Retry policy for transient failures.
    retry: RetryConfig,
}

impl std::fmt::Debug for HttpDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDirectory")
            .field("account_uuid", &self.config.account_uuid)
            .field("api_url", &self.config.api_url)
            .finish()
    }
}

impl HttpDirectory {
    /// Create a directory for the configured account.
    pub fn new(config: DirectoryConfig) -> DirectoryResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("iam-directory/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let retry = config.retry_config();

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        resource: &'static str,
        operation: &str,
        id: &str,
    ) -> DirectoryResult<T> {
        with_retry_if(
            &self.retry,
            || self.send_get(url, query, resource, operation, id),
            |err: &DirectoryError| err.is_retryable(),
        )
        .await
    }

    async fn send_get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        resource: &'static str,
        operation: &str,
        id: &str,
    ) -> DirectoryResult<T> {
        debug!("GET {}", url);

        let mut request = self.client.get(url).query(query);
        if let Some(ref token) = self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("IAM API error ({}) for {} {}", status.as_u16(), operation, resource);
            return Err(DirectoryError::from_status(
                status.as_u16(),
                resource,
                operation,
                id,
                body,
            ));
        }

        response
            .json()
            .await
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        url: &str,
        resource: &'static str,
        operation: &str,
        id: &str,
    ) -> DirectoryResult<Vec<T>> {
        let list: ListResponse<T> = self.get_json(url, &[], resource, operation, id).await?;
        Ok(list.into_items())
    }

    fn level(&self) -> (String, String) {
        ("account".to_string(), self.config.account_uuid.clone())
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    fn account_uuid(&self) -> &str {
        &self.config.account_uuid
    }

    #[instrument(skip(self))]
    async fn list_groups(&self) -> DirectoryResult<Vec<Group>> {
        self.get_list(&self.config.account_url("groups"), "group", "list", "")
            .await
    }

    #[instrument(skip(self))]
    async fn get_group(&self, uuid: &str) -> DirectoryResult<Group> {
        let url = self.config.account_url(&format!("groups/{}", uuid));
        self.get_json(&url, &[], "group", "get", uuid).await
    }

    #[instrument(skip(self))]
    async fn list_users(&self) -> DirectoryResult<Vec<User>> {
        self.get_list(&self.config.account_url("users"), "user", "list", "")
            .await
    }

    #[instrument(skip(self))]
    async fn get_user(&self, uid: &str) -> DirectoryResult<User> {
        let url = self.config.account_url(&format!("users/{}", uid));
        self.get_json(&url, &[], "user", "get", uid).await
    }

    #[instrument(skip(self))]
    async fn get_user_groups(&self, uid: &str) -> DirectoryResult<Vec<Group>> {
        let url = self.config.account_url(&format!("users/{}/groups", uid));
        self.get_list(&url, "user", "get groups of", uid).await
    }

    #[instrument(skip(self))]
    async fn list_bindings(&self) -> DirectoryResult<Vec<Binding>> {
        let response: BindingsResponse = self
            .get_json(&self.config.repo_url("bindings"), &[], "binding", "list", "")
            .await?;
        let (level_type, level_id) = self.level();

        let mut bindings = Vec::new();
        for entry in response.policy_bindings {
            for group_uuid in entry.groups {
                bindings.push(Binding {
                    policy_uuid: entry.policy_uuid.clone(),
                    group_uuid,
                    boundaries: entry.boundaries.clone(),
                    level_type: level_type.clone(),
                    level_id: level_id.clone(),
                });
            }
        }
        Ok(bindings)
    }

    #[instrument(skip(self))]
    async fn list_bindings_for_group(&self, group_uuid: &str) -> DirectoryResult<Vec<Binding>> {
        let url = self
            .config
            .repo_url(&format!("bindings/groups/{}", group_uuid));
        let response: BindingsResponse = self
            .get_json(&url, &[], "binding", "get bindings for group", group_uuid)
            .await?;
        let (level_type, level_id) = self.level();

        Ok(response
            .policy_bindings
            .into_iter()
            .map(|entry| Binding {
                policy_uuid: entry.policy_uuid,
                group_uuid: group_uuid.to_string(),
                boundaries: entry.boundaries,
                level_type: level_type.clone(),
                level_id: level_id.clone(),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_policies(&self) -> DirectoryResult<Vec<Policy>> {
        self.get_list(&self.config.repo_url("policies"), "policy", "list", "")
            .await
    }

    #[instrument(skip(self))]
    async fn get_policy(&self, uuid: &str) -> DirectoryResult<Policy> {
        let url = self.config.repo_url(&format!("policies/{}", uuid));
        self.get_json(&url, &[], "policy", "get", uuid).await
    }

    #[instrument(skip(self), fields(entity_id = %query.entity_id))]
    async fn get_effective_permissions(
        &self,
        query: &EffectivePermissionsQuery,
        page: u32,
        size: u32,
    ) -> DirectoryResult<EffectivePermissionsPage> {
        let url = self.config.url(&format!(
            "resolution/{}/{}/effectivepermissions",
            query.level_type, query.level_id
        ));

        let mut params = vec![
            ("entityId", query.entity_id.clone()),
            ("entityType", query.entity_type.as_str().to_string()),
            ("page", page.to_string()),
            ("size", size.to_string()),
        ];
        if !query.services.is_empty() {
            params.push(("services", query.services.join(",")));
        }

        self.get_json(
            &url,
            &params,
            "effective permissions",
            "resolve",
            &query.entity_id,
        )
        .await
    }
}
