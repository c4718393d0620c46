//! Shared statement types.
//!
//! The interpreter fills an [`InterpretedStatement`]; the builder validates
//! it and freezes it into a [`PermissionStatement`], which is what policy
//! generators consume.

use crate::coerce::Value;
use crate::schema::Metadata;
use crate::vocab::{AccessType, Command, ConditionOperator, DataType, LogicalOperator, ResourceType};
use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Conditions
// ──────────────────────────────────────────────

/// One `<helper> <field> <operator> <value>` clause.
///
/// `logical_operator` is the connective that joined the previous condition
/// to this one. On the first condition it carries no meaning.
///
/// Conditions form a flat list: `A AND B OR C` cannot be grouped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: Value,
    pub field_type: DataType,
    #[serde(default)]
    pub logical_operator: LogicalOperator,
}

// ──────────────────────────────────────────────
// Interpreter output
// ──────────────────────────────────────────────

/// Statement parts collected by the interpreter, not yet validated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterpretedStatement {
    pub command: Option<Command>,
    pub access_types: Vec<AccessType>,
    pub resource_type: Option<ResourceType>,
    pub conditions: Vec<Condition>,
    /// Metadata merged from every integration defining `resource_type`.
    pub integration_data: Metadata,
    /// Statement-level connective. The interpreter leaves this unset.
    pub logical_operator: Option<LogicalOperator>,
}

// ──────────────────────────────────────────────
// Compiled statement
// ──────────────────────────────────────────────

/// A compiled permission statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionStatement {
    command: Command,
    access_type: Vec<AccessType>,
    resource_type: ResourceType,
    conditions: Vec<Condition>,
    logical_operator: LogicalOperator,
}

impl PermissionStatement {
    pub fn new(
        command: Command,
        access_type: Vec<AccessType>,
        resource_type: ResourceType,
        conditions: Vec<Condition>,
        logical_operator: LogicalOperator,
    ) -> Self {
        PermissionStatement {
            command,
            access_type,
            resource_type,
            conditions,
            logical_operator,
        }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn access_types(&self) -> &[AccessType] {
        &self.access_type
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Fallback connective for consumers. It does not join the conditions;
    /// each condition carries its own.
    pub fn logical_operator(&self) -> LogicalOperator {
        self.logical_operator
    }

    /// Same command, access types, resource type and conditions. The
    /// connective of the first condition is ignored.
    pub fn is_equivalent(&self, other: &PermissionStatement) -> bool {
        self.command == other.command
            && self.access_type == other.access_type
            && self.resource_type == other.resource_type
            && self.conditions.len() == other.conditions.len()
            && self
                .conditions
                .iter()
                .zip(&other.conditions)
                .enumerate()
                .all(|(i, (a, b))| {
                    a.field == b.field
                        && a.operator == b.operator
                        && a.value == b.value
                        && a.field_type == b.field_type
                        && (i == 0 || a.logical_operator == b.logical_operator)
                })
    }
}
