//! # IAM Policy
//!
//! This crate provides the statement-query language used by account IAM
//! policies, and the capability matching used by governance reports.
//!
//! ## Overview
//!
//! The iam-policy crate handles:
//! - **Effects**: `ALLOW` / `DENY` keywords
//! - **Statements**: Parsing a policy's `statementQuery` into permission declarations
//! - **Matching**: Prefix-wildcard matching of held permissions against requirements
//!
//! ## Statement Grammar
//!
//! ```text
//! STATEMENT ::= CLAUSE (";" CLAUSE)*
//! CLAUSE    ::= ("ALLOW" | "DENY") ACTION ("," ACTION)* ("WHERE" CONDITIONS)?
//!
//! Examples:
//!   "ALLOW settings:objects:read;"
//!   "ALLOW settings:objects:read, settings:schemas:read WHERE settings:schemaId = \"builtin:alerting\";"
//!   "DENY account:users:write;"
//! ```
//!
//! The parser is best effort: clauses that do not fit the grammar are skipped,
//! so legacy or partially authored policies never abort an analysis.
//!
//! ## Usage
//!
//! ```rust
//! use iam_policy::{parse_statement_query, Effect, HeldPermissions};
//!
//! let perms = parse_statement_query("ALLOW settings:objects:read, settings:schemas:read;");
//! assert_eq!(perms.len(), 2);
//! assert_eq!(perms[0].effect, Effect::Allow);
//!
//! let held: HeldPermissions = perms.iter().map(|p| p.action.clone()).collect();
//! assert!(held.satisfies(&["settings:*"]));
//! assert!(!held.satisfies(&["storage:*"]));
//! ```

pub mod effect;
pub mod matcher;
pub mod statement;

// Re-export main types for convenience
pub use effect::Effect;
pub use matcher::{matches, HeldPermissions};
pub use statement::{describe_action, parse_statement_query, PermissionStatement};
