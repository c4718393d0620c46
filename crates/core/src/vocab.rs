//! Closed vocabularies of the permission statement language.
//!
//! Every vocabulary maps a fixed set of upper-case literals to variants.
//! Lookups are exact and case-sensitive: `from_token` returns `None` for
//! anything outside the set, and callers decide what a miss means.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $lit:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $lit)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn from_token(token: &str) -> Option<Self> {
                match token {
                    $($lit => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $lit,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Whether the statement grants or denies access.
    Command {
        Give => "GIVE",
        Deny => "DENY",
    }
}

vocabulary! {
    AccessType {
        Read => "READ",
        Write => "WRITE",
        Delete => "DELETE",
        Execute => "EXECUTE",
    }
}

vocabulary! {
    /// Keyword introducing a condition. Integrations may map each helper
    /// (other than WITH) to a default field.
    StructuralHelper {
        With => "WITH",
        Named => "NAMED",
        Tagged => "TAGGED",
        From => "FROM",
        AssignedTo => "ASSIGNED_TO",
    }
}

vocabulary! {
    ConditionOperator {
        Is => "IS",
        IsNot => "IS_NOT",
        Contains => "CONTAINS",
        GreaterThan => "GREATER_THAN",
        LessThan => "LESS_THAN",
        GreaterOrEqual => "GREATER_OR_EQUAL",
        LessOrEqual => "LESS_OR_EQUAL",
        Before => "BEFORE",
        After => "AFTER",
    }
}

vocabulary! {
    LogicalOperator {
        And => "AND",
        Or => "OR",
    }
}

vocabulary! {
    /// Declared type of a resource field; drives value coercion.
    DataType {
        String => "STRING",
        Number => "NUMBER",
        Boolean => "BOOLEAN",
        Tags => "TAGS",
        EmailAddress => "EMAIL_ADDRESS",
        User => "USER",
        DateTime => "DATETIME",
        Domain => "DOMAIN",
    }
}

impl Default for LogicalOperator {
    fn default() -> Self {
        LogicalOperator::And
    }
}

// ──────────────────────────────────────────────
// Resource types
// ──────────────────────────────────────────────

/// A kind of resource a statement applies to.
///
/// The built-in kinds are always recognised. `Custom` carries a resource
/// name contributed by a registered integration; only the schema provider
/// produces it (see `SchemaProvider::resolve_resource`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceType {
    Issues,
    Teams,
    Projects,
    Emails,
    Attachments,
    Custom(String),
}

impl ResourceType {
    pub const BUILTIN: &'static [ResourceType] = &[
        ResourceType::Issues,
        ResourceType::Teams,
        ResourceType::Projects,
        ResourceType::Emails,
        ResourceType::Attachments,
    ];

    /// Look up a built-in resource kind. Integration-defined kinds are not
    /// visible here.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ISSUES" => Some(ResourceType::Issues),
            "TEAMS" => Some(ResourceType::Teams),
            "PROJECTS" => Some(ResourceType::Projects),
            "EMAILS" => Some(ResourceType::Emails),
            "ATTACHMENTS" => Some(ResourceType::Attachments),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::Issues => "ISSUES",
            ResourceType::Teams => "TEAMS",
            ResourceType::Projects => "PROJECTS",
            ResourceType::Emails => "EMAILS",
            ResourceType::Attachments => "ATTACHMENTS",
            ResourceType::Custom(name) => name,
        }
    }
}

impl From<String> for ResourceType {
    fn from(name: String) -> Self {
        ResourceType::from_token(&name).unwrap_or(ResourceType::Custom(name))
    }
}

impl From<ResourceType> for String {
    fn from(resource: ResourceType) -> Self {
        match resource {
            ResourceType::Custom(name) => name,
            builtin => builtin.as_str().to_owned(),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_exact_and_case_sensitive() {
        assert_eq!(Command::from_token("GIVE"), Some(Command::Give));
        assert_eq!(Command::from_token("give"), None);
        assert_eq!(AccessType::from_token("WRITE"), Some(AccessType::Write));
        assert_eq!(AccessType::from_token("READS"), None);
        assert_eq!(
            StructuralHelper::from_token("ASSIGNED_TO"),
            Some(StructuralHelper::AssignedTo)
        );
        assert_eq!(
            ConditionOperator::from_token("GREATER_OR_EQUAL"),
            Some(ConditionOperator::GreaterOrEqual)
        );
        assert_eq!(ConditionOperator::from_token("GREATER"), None);
        assert_eq!(DataType::from_token("EMAIL_ADDRESS"), Some(DataType::EmailAddress));
        assert_eq!(DataType::from_token("string"), None);
    }

    #[test]
    fn literals_round_trip_through_as_str() {
        for op in ConditionOperator::ALL {
            assert_eq!(ConditionOperator::from_token(op.as_str()), Some(*op));
        }
        for dt in DataType::ALL {
            assert_eq!(DataType::from_token(dt.as_str()), Some(*dt));
        }
        for r in ResourceType::BUILTIN {
            assert_eq!(ResourceType::from_token(r.as_str()).as_ref(), Some(r));
        }
    }

    #[test]
    fn serde_uses_literals() {
        assert_eq!(
            serde_json::to_value(ConditionOperator::IsNot).unwrap(),
            serde_json::json!("IS_NOT")
        );
        assert_eq!(
            serde_json::to_value(ResourceType::Custom("INVOICES".into())).unwrap(),
            serde_json::json!("INVOICES")
        );
        let r: ResourceType = serde_json::from_value(serde_json::json!("TEAMS")).unwrap();
        assert_eq!(r, ResourceType::Teams);
    }

    #[test]
    fn logical_operator_defaults_to_and() {
        assert_eq!(LogicalOperator::default(), LogicalOperator::And);
    }
}
