//! # Effects
//!
//! The effect keyword that opens every statement clause.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Effect of a permission declaration.
///
/// The wire representation is upper case (`ALLOW` / `DENY`), which is also
/// the prefix of aggregation keys such as `ALLOW:settings:objects:read`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Effect {
    /// Grants the action.
    Allow,

    /// Denies the action.
    ///
    /// Deny declarations are parsed and reported but never subtracted from
    /// allow grants by the analysis engine.
    Deny,
}

impl Effect {
    /// Get the string representation of the effect.
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "ALLOW",
            Effect::Deny => "DENY",
        }
    }

    /// Parse an effect keyword (case-insensitive).
    ///
    /// # Example
    ///
    /// ```
    /// use iam_policy::Effect;
    ///
    /// assert_eq!(Effect::parse("allow"), Some(Effect::Allow));
    /// assert_eq!(Effect::parse("DENY"), Some(Effect::Deny));
    /// assert_eq!(Effect::parse("permit"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ALLOW" => Some(Effect::Allow),
            "DENY" => Some(Effect::Deny),
            _ => None,
        }
    }

    /// Check if this is an allow effect.
    pub fn is_allow(&self) -> bool {
        matches!(self, Effect::Allow)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_parse() {
        assert_eq!(Effect::parse("ALLOW"), Some(Effect::Allow));
        assert_eq!(Effect::parse("Allow"), Some(Effect::Allow));
        assert_eq!(Effect::parse("deny"), Some(Effect::Deny));
        assert_eq!(Effect::parse(""), None);
    }

    #[test]
    fn test_effect_display() {
        assert_eq!(Effect::Allow.to_string(), "ALLOW");
        assert_eq!(Effect::Deny.to_string(), "DENY");
    }

    #[test]
    fn test_effect_serde() {
        assert_eq!(serde_json::to_string(&Effect::Allow).unwrap(), "\"ALLOW\"");
        let parsed: Effect = serde_json::from_str("\"DENY\"").unwrap();
        assert_eq!(parsed, Effect::Deny);
    }
}
