//! Account-wide permission coverage matrices.
//!
//! Rows are policies or groups, columns are `EFFECT:action` keys. Columns are
//! the union of every key seen in the account, sorted; rows keep the order
//! in which the directory lists entities.
//!
//! Group rows count `ALLOW` and `DENY` keys alike, unlike
//! [`PermissionsAggregator`](crate::effective::PermissionsAggregator), which
//! folds only grants.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

use iam_directory::{Directory, DirectoryResult};
use iam_policy::parse_statement_query;

/// What the matrix rows are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixKind {
    Policy,
    Group,
}

/// One matrix row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub entity_name: String,
    pub entity_id: String,
    /// One flag per column.
    #[serde(flatten)]
    pub cells: BTreeMap<String, bool>,
}

impl MatrixRow {
    /// Check if the row's entity holds the permission key.
    pub fn has(&self, key: &str) -> bool {
        self.cells.get(key).copied().unwrap_or(false)
    }
}

/// A boolean entity × permission matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageMatrix {
    pub kind: MatrixKind,
    /// Sorted, unique permission keys.
    pub permissions: Vec<String>,
    /// Entity names in row order.
    pub entities: Vec<String>,
    pub rows: Vec<MatrixRow>,
    pub entity_count: usize,
    pub permission_count: usize,
}

impl CoverageMatrix {
    fn build(kind: MatrixKind, entities: Vec<(String, String, BTreeSet<String>)>) -> Self {
        let columns: BTreeSet<&String> = entities.iter().flat_map(|(_, _, keys)| keys).collect();
        let permissions: Vec<String> = columns.into_iter().cloned().collect();

        let rows: Vec<MatrixRow> = entities
            .iter()
            .map(|(name, id, keys)| MatrixRow {
                entity_name: name.clone(),
                entity_id: id.clone(),
                cells: permissions
                    .iter()
                    .map(|p| (p.clone(), keys.contains(p)))
                    .collect(),
            })
            .collect();

        Self {
            kind,
            entity_count: rows.len(),
            permission_count: permissions.len(),
            entities: entities.into_iter().map(|(name, _, _)| name).collect(),
            permissions,
            rows,
        }
    }
}

/// Builds coverage matrices with a full account scan per call.
pub struct PermissionsMatrixBuilder<'a, D: ?Sized> {
    directory: &'a D,
}

impl<'a, D: Directory + ?Sized> PermissionsMatrixBuilder<'a, D> {
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    /// Policy × permission matrix.
    ///
    /// Listed policies may lack statements, so each one is fetched in full.
    #[instrument(skip(self))]
    pub async fn build_policy_matrix(&self) -> DirectoryResult<CoverageMatrix> {
        let policies = self.directory.list_policies().await?;
        let mut entities = Vec::with_capacity(policies.len());

        for policy in policies {
            let statement = self
                .directory
                .get_policy(&policy.uuid)
                .await?
                .statement_query
                .unwrap_or_default();
            let keys: BTreeSet<String> = parse_statement_query(&statement)
                .iter()
                .map(|p| p.key())
                .collect();
            entities.push((policy.name, policy.uuid, keys));
        }

        let matrix = CoverageMatrix::build(MatrixKind::Policy, entities);
        debug!(
            policies = matrix.entity_count,
            permissions = matrix.permission_count,
            "Built policy matrix"
        );
        Ok(matrix)
    }

    /// Group × permission matrix.
    #[instrument(skip(self))]
    pub async fn build_group_matrix(&self) -> DirectoryResult<CoverageMatrix> {
        let groups = self.directory.list_groups().await?;
        let mut entities = Vec::with_capacity(groups.len());

        for group in groups {
            let mut keys = BTreeSet::new();
            for binding in self.directory.list_bindings_for_group(&group.uuid).await? {
                let policy = self.directory.get_policy(&binding.policy_uuid).await?;
                keys.extend(parse_statement_query(policy.statement()).iter().map(|p| p.key()));
            }
            entities.push((group.name, group.uuid, keys));
        }

        let matrix = CoverageMatrix::build(MatrixKind::Group, entities);
        debug!(
            groups = matrix.entity_count,
            permissions = matrix.permission_count,
            "Built group matrix"
        );
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iam_directory::{Binding, Group, MemoryDirectory, Policy};
    use serde_json::json;

    fn directory() -> MemoryDirectory {
        MemoryDirectory::new("acc-1")
            .with_policy(Policy::new("p-2", "Writer", "ALLOW settings:objects:write; DENY account:users:write;"))
            .with_policy(Policy::new("p-1", "Reader", "ALLOW settings:objects:read;"))
            .with_policy(Policy::new("p-3", "Empty", "this is not a statement"))
            .with_group(Group::new("g-1", "Ops"))
            .with_group(Group::new("g-2", "Ops"))
            .with_binding(Binding::new("p-2", "g-1"))
            .with_binding(Binding::new("p-1", "g-2"))
    }

    #[tokio::test]
    async fn test_policy_matrix_columns_sorted_rows_in_listing_order() {
        let directory = directory();
        let matrix = PermissionsMatrixBuilder::new(&directory)
            .build_policy_matrix()
            .await
            .unwrap();

        assert_eq!(
            matrix.permissions,
            vec![
                "ALLOW:settings:objects:read",
                "ALLOW:settings:objects:write",
                "DENY:account:users:write",
            ]
        );
        assert_eq!(matrix.entities, vec!["Writer", "Reader", "Empty"]);
        assert_eq!(matrix.entity_count, 3);
        assert_eq!(matrix.permission_count, 3);

        for row in &matrix.rows {
            assert_eq!(row.cells.len(), matrix.permissions.len());
        }
        assert!(matrix.rows[0].has("DENY:account:users:write"));
        assert!(!matrix.rows[0].has("ALLOW:settings:objects:read"));
        assert!(matrix.rows[2].cells.values().all(|v| !v));
    }

    #[tokio::test]
    async fn test_group_matrix_keeps_same_named_groups_and_deny_keys() {
        let directory = directory();
        let matrix = PermissionsMatrixBuilder::new(&directory)
            .build_group_matrix()
            .await
            .unwrap();

        assert_eq!(matrix.kind, MatrixKind::Group);
        assert_eq!(matrix.entities, vec!["Ops", "Ops"]);
        assert_eq!(matrix.rows[0].entity_id, "g-1");
        assert!(matrix.rows[0].has("DENY:account:users:write"));
        assert!(matrix.rows[1].has("ALLOW:settings:objects:read"));
    }

    #[tokio::test]
    async fn test_row_serializes_flat() {
        let directory = MemoryDirectory::new("acc-1")
            .with_policy(Policy::new("p-1", "Reader", "ALLOW a:b:read;"));
        let matrix = PermissionsMatrixBuilder::new(&directory)
            .build_policy_matrix()
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&matrix.rows[0]).unwrap(),
            json!({"entity_name": "Reader", "entity_id": "p-1", "ALLOW:a:b:read": true})
        );
    }

    #[tokio::test]
    async fn test_empty_account() {
        let directory = MemoryDirectory::new("acc-1");
        let matrix = PermissionsMatrixBuilder::new(&directory)
            .build_group_matrix()
            .await
            .unwrap();
        assert!(matrix.rows.is_empty());
        assert!(matrix.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let directory = directory().fail_on("get_policy", 502);
        let err = PermissionsMatrixBuilder::new(&directory)
            .build_policy_matrix()
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(502));
    }

    #[tokio::test]
    async fn test_group_bound_to_missing_policy_fails() {
        let directory = directory().with_binding(Binding::new("p-gone", "g-2"));
        let err = PermissionsMatrixBuilder::new(&directory)
            .build_group_matrix()
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
