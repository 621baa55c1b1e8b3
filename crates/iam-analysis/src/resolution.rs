//! Effective permissions as resolved by the platform.
//!
//! Instead of walking bindings locally, this asks the IAM resolution
//! endpoint, which also accounts for inherited levels and boundaries. Every
//! upstream failure is reported softly.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use iam_directory::{Directory, DirectoryResult, EffectivePermissionsQuery, EntityType};

use crate::lookup::find_group;
use crate::outcome::{Outcome, SoftError};

/// Items requested per page.
pub const PAGE_SIZE: u32 = 100;

/// What to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    /// User UID or email, or group UUID or name.
    pub entity_id: String,
    pub entity_type: EntityType,
    /// Level type; "account" unless set.
    pub level_type: String,
    /// Level id; the directory's account when `None`.
    pub level_id: Option<String>,
    /// Restrict results to these services.
    pub services: Vec<String>,
    /// Follow pagination until every item is fetched.
    pub all_pages: bool,
}

impl ResolveRequest {
    /// Resolve a user at account level, all pages.
    pub fn user(identifier: impl Into<String>) -> Self {
        Self::new(identifier, EntityType::User)
    }

    /// Resolve a group at account level, all pages.
    pub fn group(identifier: impl Into<String>) -> Self {
        Self::new(identifier, EntityType::Group)
    }

    fn new(identifier: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            entity_id: identifier.into(),
            entity_type,
            level_type: "account".to_string(),
            level_id: None,
            services: Vec::new(),
            all_pages: true,
        }
    }

    /// Resolve at another level.
    pub fn at_level(mut self, level_type: impl Into<String>, level_id: impl Into<String>) -> Self {
        self.level_type = level_type.into();
        self.level_id = Some(level_id.into());
        self
    }

    /// Restrict to services.
    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services = services.into_iter().map(Into::into).collect();
        self
    }

    /// Fetch only the first page.
    pub fn first_page_only(mut self) -> Self {
        self.all_pages = false;
        self
    }
}

/// Resolved permissions of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePermissionsReport {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub level_type: String,
    pub level_id: String,
    /// Items as returned by the platform.
    pub effective_permissions: Vec<serde_json::Value>,
    /// Item count when all pages were fetched; the reported total otherwise.
    pub total: u64,
}

/// Client for the platform's effective-permissions resolution.
pub struct EffectivePermissionsApi<'a, D: ?Sized> {
    directory: &'a D,
}

impl<'a, D: Directory + ?Sized> EffectivePermissionsApi<'a, D> {
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    /// Resolve a user (UID or email) at account level.
    pub async fn resolve_user(&self, identifier: &str) -> Outcome<EffectivePermissionsReport> {
        self.resolve(ResolveRequest::user(identifier)).await
    }

    /// Resolve a group (UUID or name) at account level.
    pub async fn resolve_group(&self, identifier: &str) -> Outcome<EffectivePermissionsReport> {
        self.resolve(ResolveRequest::group(identifier)).await
    }

    /// Resolve an entity.
    ///
    /// A failed page aborts the whole resolution; items of earlier pages are
    /// discarded.
    #[instrument(skip(self), fields(entity_id = %request.entity_id, entity_type = %request.entity_type))]
    pub async fn resolve(&self, request: ResolveRequest) -> Outcome<EffectivePermissionsReport> {
        let entity_id = match self.canonical_id(&request).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                let kind = match request.entity_type {
                    EntityType::User => "User",
                    EntityType::Group => "Group",
                };
                return Outcome::not_found(kind, &request.entity_id);
            }
            Err(e) => return Outcome::Failed(e.into()),
        };

        let query = EffectivePermissionsQuery {
            entity_id,
            entity_type: request.entity_type,
            level_type: request.level_type,
            level_id: request
                .level_id
                .unwrap_or_else(|| self.directory.account_uuid().to_string()),
            services: request.services,
        };

        let fetched = if request.all_pages {
            self.fetch_all(&query).await
        } else {
            self.fetch_first(&query).await
        };

        match fetched {
            Ok((items, total)) => Outcome::Found(EffectivePermissionsReport {
                entity_id: query.entity_id,
                entity_type: query.entity_type,
                level_type: query.level_type,
                level_id: query.level_id,
                effective_permissions: items,
                total,
            }),
            Err(err) => {
                warn!(error = %err, "Effective permissions resolution failed");
                Outcome::Failed(err)
            }
        }
    }

    /// Users given by email are resolved to their UID; groups are resolved
    /// by UUID, then by name. Other user identifiers are passed through.
    async fn canonical_id(&self, request: &ResolveRequest) -> DirectoryResult<Option<String>> {
        match request.entity_type {
            EntityType::User if request.entity_id.contains('@') => Ok(self
                .directory
                .get_user_by_email(&request.entity_id)
                .await?
                .map(|user| user.uid)),
            EntityType::User => Ok(Some(request.entity_id.clone())),
            EntityType::Group => Ok(find_group(self.directory, &request.entity_id)
                .await?
                .map(|group| group.uuid)),
        }
    }

    async fn fetch_first(
        &self,
        query: &EffectivePermissionsQuery,
    ) -> Result<(Vec<serde_json::Value>, u64), SoftError> {
        let page = self
            .directory
            .get_effective_permissions(query, 1, PAGE_SIZE)
            .await?;
        let total = page
            .total
            .unwrap_or(page.effective_permissions.len() as u64);
        Ok((page.effective_permissions, total))
    }

    async fn fetch_all(
        &self,
        query: &EffectivePermissionsQuery,
    ) -> Result<(Vec<serde_json::Value>, u64), SoftError> {
        let mut items = Vec::new();
        let mut page_number = 1;

        loop {
            let page = self
                .directory
                .get_effective_permissions(query, page_number, PAGE_SIZE)
                .await?;

            let received = page.effective_permissions.len() as u64;
            let total = page.total.unwrap_or(received);
            items.extend(page.effective_permissions);

            debug!(page = page_number, received, total, "Fetched effective permissions page");

            if items.len() as u64 >= total || received == 0 {
                break;
            }
            page_number += 1;
        }

        let total = items.len() as u64;
        Ok((items, total))
    }
}
