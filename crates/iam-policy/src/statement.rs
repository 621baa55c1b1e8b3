//! # Statements
//!
//! Parsing of policy statement queries into permission declarations.
//! A statement is a `;`-separated list of clauses, each granting or denying
//! one or more actions with optional conditions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::effect::Effect;

/// Clause grammar: `(ALLOW|DENY) action[, action...] [WHERE conditions]`.
///
/// Anchored at the start only, so trailing text that is not a `WHERE` part
/// is ignored rather than rejecting the clause.
static CLAUSE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^(ALLOW|DENY)\s+([^\s,]+(?:\s*,\s*[^\s,]+)*)\s*(?:WHERE\s+(.+))?")
        .expect("clause pattern is valid")
});

/// Well-known actions and their human-readable descriptions.
const ACTION_DESCRIPTIONS: &[(&str, &str)] = &[
    ("settings:objects:read", "Read settings objects"),
    ("settings:objects:write", "Write settings objects"),
    ("settings:schemas:read", "Read settings schemas"),
    ("environment:roles:manage", "Manage environment roles"),
    ("account:users:read", "Read account users"),
    ("account:users:write", "Write account users"),
    ("account:groups:read", "Read account groups"),
    ("account:groups:write", "Write account groups"),
    ("account:policies:read", "Read account policies"),
    ("account:policies:write", "Write account policies"),
];

/// Look up the description of a well-known action.
///
/// # Example
///
/// ```
/// use iam_policy::describe_action;
///
/// assert_eq!(describe_action("settings:objects:read"), Some("Read settings objects"));
/// assert_eq!(describe_action("storage:logs:read"), None);
/// ```
pub fn describe_action(action: &str) -> Option<&'static str> {
    ACTION_DESCRIPTIONS
        .iter()
        .find(|(known, _)| *known == action)
        .map(|(_, description)| *description)
}

/// A single permission declared by a statement clause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionStatement {
    /// Whether the action is allowed or denied.
    pub effect: Effect,

    /// The action string, e.g. `settings:objects:read`.
    pub action: String,

    /// Conditions from the clause's `WHERE` part, shared by every action
    /// of that clause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,

    /// Human-readable description; the action itself for unknown actions.
    pub description: String,
}

impl PermissionStatement {
    /// Create a statement without conditions.
    pub fn new(effect: Effect, action: impl Into<String>) -> Self {
        let action = action.into();
        let description = describe_action(&action).unwrap_or(&action).to_string();
        Self {
            effect,
            action,
            conditions: None,
            description,
        }
    }

    /// Attach conditions.
    pub fn with_conditions(mut self, conditions: impl Into<String>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }

    /// Aggregation key in the form `EFFECT:action`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.effect, self.action)
    }

    /// Check if the declaration is restricted by conditions.
    pub fn is_conditional(&self) -> bool {
        self.conditions.is_some()
    }
}

/// Parse a policy statement query into permission declarations.
///
/// Clauses are separated by `;`. Clauses that do not match the grammar are
/// skipped without error. Each action of a clause yields its own entry, in
/// the order encountered; nothing is deduplicated.
///
/// # Example
///
/// ```
/// use iam_policy::{parse_statement_query, Effect};
///
/// let perms = parse_statement_query("ALLOW a, b WHERE x=1; NOT_A_CLAUSE; DENY c;");
/// assert_eq!(perms.len(), 3);
/// assert_eq!(perms[1].action, "b");
/// assert_eq!(perms[1].conditions.as_deref(), Some("x=1"));
/// assert_eq!(perms[2].effect, Effect::Deny);
/// ```
pub fn parse_statement_query(statement: &str) -> Vec<PermissionStatement> {
    let mut permissions = Vec::new();

    for clause in statement.split(';').map(str::trim).filter(|c| !c.is_empty()) {
        let Some(captures) = CLAUSE_PATTERN.captures(clause) else {
            debug!(clause, "Skipping clause that does not match the statement grammar");
            continue;
        };

        let Some(effect) = Effect::parse(&captures[1]) else {
            continue;
        };
        let conditions = captures.get(3).map(|m| m.as_str().trim().to_string());

        for action in captures[2].split(',').map(str::trim).filter(|a| !a.is_empty()) {
            let mut permission = PermissionStatement::new(effect, action);
            permission.conditions = conditions.clone();
            permissions.push(permission);
        }
    }

    permissions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_allow() {
        let perms = parse_statement_query("ALLOW settings:objects:read;");
        assert_eq!(perms.len(), 1);
        assert_eq!(perms[0].effect, Effect::Allow);
        assert_eq!(perms[0].action, "settings:objects:read");
        assert_eq!(perms[0].description, "Read settings objects");
        assert!(perms[0].conditions.is_none());
    }

    #[test]
    fn test_clause_isolation() {
        let perms = parse_statement_query("ALLOW a, b WHERE x=1;");
        assert_eq!(perms.len(), 2);
        assert_eq!(perms[0].action, "a");
        assert_eq!(perms[1].action, "b");
        for perm in &perms {
            assert_eq!(perm.effect, Effect::Allow);
            assert_eq!(perm.conditions.as_deref(), Some("x=1"));
        }
    }

    #[test]
    fn test_malformed_clause_skipped() {
        let perms = parse_statement_query("NOT_A_CLAUSE; ALLOW a;");
        assert_eq!(perms.len(), 1);
        assert_eq!(perms[0].action, "a");
    }

    #[test]
    fn test_effect_case_insensitive() {
        let perms = parse_statement_query("allow a; Deny b");
        assert_eq!(perms.len(), 2);
        assert_eq!(perms[0].effect, Effect::Allow);
        assert_eq!(perms[1].effect, Effect::Deny);
        assert_eq!(perms[1].key(), "DENY:b");
    }

    #[test]
    fn test_unknown_action_description_falls_back() {
        let perms = parse_statement_query("ALLOW storage:logs:read");
        assert_eq!(perms[0].description, "storage:logs:read");
    }

    #[test]
    fn test_conditions_with_quotes_and_newlines() {
        let statement = "ALLOW settings:objects:read, settings:schemas:read\n  WHERE settings:schemaId = \"builtin:alerting\";";
        let perms = parse_statement_query(statement);
        assert_eq!(perms.len(), 2);
        assert_eq!(
            perms[0].conditions.as_deref(),
            Some("settings:schemaId = \"builtin:alerting\"")
        );
    }

    #[test]
    fn test_no_dedup_at_parse_time() {
        let perms = parse_statement_query("ALLOW a; ALLOW a;");
        assert_eq!(perms.len(), 2);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(parse_statement_query("").is_empty());
        assert!(parse_statement_query(" ; ;  ").is_empty());
        assert!(parse_statement_query("ALLOW").is_empty());
    }

    #[test]
    fn test_serialization_omits_missing_conditions() {
        let perm = PermissionStatement::new(Effect::Allow, "a");
        let json = serde_json::to_value(&perm).unwrap();
        assert!(json.get("conditions").is_none());
        assert_eq!(json["effect"], "ALLOW");

        let conditional = perm.with_conditions("x=1");
        assert!(conditional.is_conditional());
        let json = serde_json::to_value(&conditional).unwrap();
        assert_eq!(json["conditions"], "x=1");
    }
}
