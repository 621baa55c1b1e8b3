//! # IAM Analysis
//!
//! Effective-permission analysis over an account's groups, users, policies
//! and bindings.
//!
//! ## Overview
//!
//! - **Effective permissions**: [`PermissionsAggregator`] walks
//!   user → groups → bindings → policies and folds grants with their sources
//! - **Coverage matrices**: [`PermissionsMatrixBuilder`] builds policy × permission
//!   and group × permission tables
//! - **Governance**: [`GovernanceMatrixBuilder`] fills RACI templates from group grants
//! - **Platform resolution**: [`EffectivePermissionsApi`] pages through the
//!   platform's own resolution endpoint
//! - **Audits**: [`PolicyAnalyzer`] reports on single policies and flags broad ones
//!
//! Lookups that name a missing user, group or policy return
//! [`Outcome::Failed`] instead of an error. Directory failures during
//! traversal propagate as [`DirectoryError`](iam_directory::DirectoryError).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use iam_analysis::{Outcome, PermissionsAggregator};
//! use iam_directory::{DirectoryConfig, HttpDirectory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = HttpDirectory::new(DirectoryConfig::from_env())?;
//! let aggregator = PermissionsAggregator::new(&directory);
//!
//! match aggregator.resolve_group("DevOps").await? {
//!     Outcome::Found(result) => {
//!         for permission in &result.effective_permissions {
//!             println!("{} {}", permission.effect, permission.action);
//!         }
//!     }
//!     Outcome::Failed(err) => eprintln!("{}", err),
//! }
//! # Ok(())
//! # }
//! ```

pub mod effective;
pub mod error;
mod lookup;
pub mod matrix;
pub mod outcome;
pub mod policy;
pub mod raci;
pub mod resolution;

// Re-export main types for convenience
pub use effective::{
    EffectivePermission, GroupEffectivePermissions, GroupRef, PermissionSource,
    PermissionsAggregator, UserBinding, UserEffectivePermissions, UserRef,
};
pub use error::{AnalysisError, AnalysisResult};
pub use matrix::{CoverageMatrix, MatrixKind, MatrixRow, PermissionsMatrixBuilder};
pub use outcome::{Outcome, SoftError};
pub use policy::{
    audit_statement, BoundGroup, Finding, LeastPrivilegeReport, PolicyAnalysis, PolicyAnalyzer,
    PolicyFindings, PolicySummary, Severity,
};
pub use raci::{
    template, templates, GovernanceActivity, GovernanceMatrix, GovernanceMatrixBuilder,
    RaciRole, RaciRow, RaciTemplate,
};
pub use resolution::{EffectivePermissionsApi, EffectivePermissionsReport, ResolveRequest, PAGE_SIZE};
