use crate::error::ParseError;
use crate::statement::{InterpretedStatement, PermissionStatement};

/// Validates an interpreted statement and freezes it.
pub trait StatementBuilder {
    fn build(&self, interpreted: InterpretedStatement) -> Result<PermissionStatement, ParseError>;
}

/// Requires a command, at least one access type and a resource type.
/// Conditions are carried over unchanged; the statement-level connective
/// defaults to AND.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStatementBuilder;

impl StatementBuilder for DefaultStatementBuilder {
    fn build(&self, interpreted: InterpretedStatement) -> Result<PermissionStatement, ParseError> {
        let command = interpreted
            .command
            .ok_or_else(|| ParseError::Validation("missing command".into()))?;
        if interpreted.access_types.is_empty() {
            return Err(ParseError::Validation("missing access types".into()));
        }
        let resource_type = interpreted
            .resource_type
            .ok_or_else(|| ParseError::Validation("missing resource type".into()))?;

        Ok(PermissionStatement::new(
            command,
            interpreted.access_types,
            resource_type,
            interpreted.conditions,
            interpreted.logical_operator.unwrap_or_default(),
        ))
    }
}
