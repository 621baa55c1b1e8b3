//! Policy reports and least-privilege audit.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use iam_directory::{Directory, DirectoryResult};
use iam_policy::{parse_statement_query, PermissionStatement};

use crate::lookup::find_policy;
use crate::outcome::Outcome;

/// Finding severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

/// Statement fragments that suggest over-permissioning.
const BROAD_PATTERNS: &[(&str, &str, Severity)] = &[
    ("*", "Wildcard permission", Severity::High),
    (":*", "Resource wildcard", Severity::Medium),
    ("write", "Write access", Severity::Medium),
    ("manage", "Management access", Severity::Medium),
    ("delete", "Delete capability", Severity::Medium),
    ("admin", "Admin access", Severity::High),
];

/// A least-privilege finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Finding {
    /// The statement contains a broad pattern.
    BroadPermission {
        pattern: String,
        description: String,
        severity: Severity,
    },
    /// No declaration of the statement is restricted by conditions.
    NoConditions {
        description: String,
        severity: Severity,
    },
}

impl Finding {
    pub fn severity(&self) -> Severity {
        match self {
            Finding::BroadPermission { severity, .. } | Finding::NoConditions { severity, .. } => {
                *severity
            }
        }
    }
}

/// Findings for one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFindings {
    pub policy_uuid: String,
    pub policy_name: String,
    pub findings: Vec<Finding>,
    pub finding_count: usize,
}

/// Account-wide least-privilege audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeastPrivilegeReport {
    pub total_policies: usize,
    pub policies_with_findings: usize,
    pub findings: Vec<PolicyFindings>,
}

/// Check a statement for broad patterns and missing conditions.
pub fn audit_statement(statement: &str) -> Vec<Finding> {
    let lowered = statement.to_lowercase();
    let mut findings: Vec<Finding> = BROAD_PATTERNS
        .iter()
        .filter(|(pattern, _, _)| lowered.contains(pattern))
        .map(|(pattern, description, severity)| Finding::BroadPermission {
            pattern: pattern.to_string(),
            description: description.to_string(),
            severity: *severity,
        })
        .collect();

    let permissions = parse_statement_query(statement);
    if !permissions.is_empty() && permissions.iter().all(|p| !p.is_conditional()) {
        findings.push(Finding::NoConditions {
            description: "All permissions lack conditions/restrictions".to_string(),
            severity: Severity::Medium,
        });
    }

    findings
}

/// Policy identity and statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub statement: String,
}

/// A group the policy is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundGroup {
    pub uuid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<String>,
}

/// What a policy grants and where it is bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAnalysis {
    pub policy: PolicySummary,
    pub permissions: Vec<PermissionStatement>,
    pub permission_count: usize,
    pub bindings: Vec<BoundGroup>,
    pub binding_count: usize,
}

/// Analyzes account-level policies.
pub struct PolicyAnalyzer<'a, D: ?Sized> {
    directory: &'a D,
}

impl<'a, D: Directory + ?Sized> PolicyAnalyzer<'a, D> {
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    /// Report on a policy identified by UUID or name.
    #[instrument(skip(self))]
    pub async fn analyze(&self, identifier: &str) -> DirectoryResult<Outcome<PolicyAnalysis>> {
        let policy = match find_policy(self.directory, identifier).await? {
            Some(policy) => policy,
            None => return Ok(Outcome::not_found("Policy", identifier)),
        };

        let permissions = parse_statement_query(policy.statement());

        let mut bindings = Vec::new();
        for binding in self.directory.list_bindings().await? {
            if binding.policy_uuid != policy.uuid {
                continue;
            }
            match self.directory.get_group(&binding.group_uuid).await {
                Ok(group) => bindings.push(BoundGroup {
                    boundary: binding.boundary(),
                    uuid: binding.group_uuid,
                    name: group.name,
                }),
                Err(e) if e.is_not_found() => {
                    debug!(group_uuid = %binding.group_uuid, "Skipping binding to missing group");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Outcome::Found(PolicyAnalysis {
            policy: PolicySummary {
                statement: policy.statement().to_string(),
                uuid: policy.uuid,
                name: policy.name,
                description: policy.description.unwrap_or_default(),
            },
            permission_count: permissions.len(),
            permissions,
            binding_count: bindings.len(),
            bindings,
        }))
    }

    /// Audit every account policy for least-privilege violations.
    #[instrument(skip(self))]
    pub async fn least_privilege(&self) -> DirectoryResult<LeastPrivilegeReport> {
        let policies = self.directory.list_policies().await?;
        let mut findings = Vec::new();

        for policy in &policies {
            let statement = self
                .directory
                .get_policy(&policy.uuid)
                .await?
                .statement_query
                .unwrap_or_default();

            let policy_findings = audit_statement(&statement);
            if !policy_findings.is_empty() {
                findings.push(PolicyFindings {
                    policy_uuid: policy.uuid.clone(),
                    policy_name: policy.name.clone(),
                    finding_count: policy_findings.len(),
                    findings: policy_findings,
                });
            }
        }

        debug!(
            policies = policies.len(),
            flagged = findings.len(),
            "Least-privilege audit finished"
        );

        Ok(LeastPrivilegeReport {
            total_policies: policies.len(),
            policies_with_findings: findings.len(),
            findings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iam_directory::{Binding, Group, MemoryDirectory, Policy};
    use serde_json::json;

    fn patterns(findings: &[Finding]) -> Vec<&str> {
        findings
            .iter()
            .filter_map(|f| match f {
                Finding::BroadPermission { pattern, .. } => Some(pattern.as_str()),
                Finding::NoConditions { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_audit_broad_patterns() {
        let findings = audit_statement("ALLOW settings:*;");
        assert_eq!(patterns(&findings), vec!["*", ":*"]);
        assert_eq!(findings[0].severity(), Severity::High);
        assert!(matches!(findings.last(), Some(Finding::NoConditions { .. })));

        let findings = audit_statement("ALLOW Account:Admin:Read WHERE x = \"y\";");
        assert_eq!(patterns(&findings), vec!["admin"]);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_audit_conditions() {
        assert!(audit_statement("").is_empty());
        assert!(audit_statement("garbage").is_empty());

        let findings = audit_statement("ALLOW a:b:read WHERE x = 1; ALLOW a:c:read;");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_finding_wire_format() {
        let finding = audit_statement("ALLOW storage:logs:read;").remove(0);
        assert_eq!(
            serde_json::to_value(&finding).unwrap(),
            json!({
                "type": "no_conditions",
                "description": "All permissions lack conditions/restrictions",
                "severity": "medium"
            })
        );
    }

    fn directory() -> MemoryDirectory {
        MemoryDirectory::new("acc-1")
            .with_group(Group::new("g-1", "DevOps"))
            .with_policy(Policy::new("p-1", "Reader", "ALLOW settings:objects:read;"))
            .with_policy(Policy::new(
                "p-2",
                "Scoped",
                "ALLOW settings:objects:read WHERE settings:schemaId = \"builtin:alerting\";",
            ))
            .with_binding(Binding::new("p-1", "g-1").with_boundaries(["b-1"]))
            .with_binding(Binding::new("p-1", "g-missing"))
            .with_binding(Binding::new("p-2", "g-1"))
    }

    #[tokio::test]
    async fn test_analyze_by_name() {
        let directory = directory();
        let analysis = PolicyAnalyzer::new(&directory)
            .analyze("Reader")
            .await
            .unwrap()
            .into_result()
            .unwrap();

        assert_eq!(analysis.policy.uuid, "p-1");
        assert_eq!(analysis.policy.statement, "ALLOW settings:objects:read;");
        assert_eq!(analysis.permission_count, 1);
        assert_eq!(
            analysis.bindings,
            vec![BoundGroup {
                uuid: "g-1".to_string(),
                name: "DevOps".to_string(),
                boundary: Some("b-1".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_analyze_unknown_policy() {
        let directory = directory();
        let outcome = PolicyAnalyzer::new(&directory).analyze("p-404").await.unwrap();
        assert_eq!(
            outcome.failure().map(|f| f.error.as_str()),
            Some("Policy not found: p-404")
        );
    }

    #[tokio::test]
    async fn test_least_privilege_report() {
        let directory = directory();
        let report = PolicyAnalyzer::new(&directory).least_privilege().await.unwrap();

        assert_eq!(report.total_policies, 2);
        assert_eq!(report.policies_with_findings, 1);
        assert_eq!(report.findings[0].policy_name, "Reader");
        assert_eq!(report.findings[0].finding_count, 1);
        assert!(matches!(
            report.findings[0].findings[0],
            Finding::NoConditions { .. }
        ));
    }

    #[tokio::test]
    async fn test_least_privilege_propagates_failed_policy_fetch() {
        let directory = directory().fail_on("get_policy", 503);
        let err = PolicyAnalyzer::new(&directory)
            .least_privilege()
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(503));
    }
}
