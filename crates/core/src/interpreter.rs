//! Finite-state interpreter: tokens to an [`InterpretedStatement`].
//!
//! A single left-to-right pass. The only lookahead is for compound
//! operators (`GREATER OR EQUAL`, `IS NOT`, ...) and for `ACCESS TO` after
//! an access type. The first token that does not fit the current state
//! aborts with a grammar error; there is no recovery.

use crate::coerce::CoercionEngine;
use crate::error::ParseError;
use crate::lexer::{Token, ACCESS_TO};
use crate::schema::{IntegrationRegistry, IntegrationSchemaProvider, SchemaProvider};
use crate::statement::{Condition, InterpretedStatement};
use crate::vocab::{
    AccessType, Command, ConditionOperator, LogicalOperator, StructuralHelper,
};
use std::fmt;
use std::sync::Arc;

// ──────────────────────────────────────────────
// States
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Command,
    AccessType,
    AccessTo,
    ResourceType,
    ConditionStart,
    ConditionField,
    ConditionOperator,
    ConditionValue,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Command => "COMMAND",
            State::AccessType => "ACCESS_TYPE",
            State::AccessTo => "ACCESS_TO",
            State::ResourceType => "RESOURCE_TYPE",
            State::ConditionStart => "CONDITION_START",
            State::ConditionField => "CONDITION_FIELD",
            State::ConditionOperator => "CONDITION_OPERATOR",
            State::ConditionValue => "CONDITION_VALUE",
        }
    }

    /// What the state accepts, for diagnostics.
    pub fn expected(&self) -> &'static str {
        match self {
            State::Command => "a command (GIVE, DENY)",
            State::AccessType => "an access type (READ, WRITE, DELETE, EXECUTE), '&' or ACCESS TO",
            State::AccessTo => "ACCESS TO",
            State::ResourceType => "a resource type",
            State::ConditionStart => {
                "a structural helper (WITH, NAMED, TAGGED, FROM, ASSIGNED TO), AND/OR or end of statement"
            }
            State::ConditionField => "a field name or a condition operator",
            State::ConditionOperator => {
                "a condition operator (=, IS, IS NOT, CONTAINS, GREATER THAN, LESS THAN, GREATER OR EQUAL, LESS OR EQUAL, BEFORE, AFTER)"
            }
            State::ConditionValue => "a condition value",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Interpreter
// ──────────────────────────────────────────────

/// Turns a token sequence into an interpreted statement.
pub trait Interpreter {
    fn interpret(&self, tokens: &[Token]) -> Result<InterpretedStatement, ParseError>;
}

/// The statement state machine, resolving fields and types through a
/// [`SchemaProvider`] and values through a [`CoercionEngine`].
#[derive(Debug, Clone)]
pub struct StateMachineInterpreter<P> {
    schema: P,
    coercion: Arc<CoercionEngine>,
}

impl<P: SchemaProvider> StateMachineInterpreter<P> {
    pub fn new(schema: P, coercion: Arc<CoercionEngine>) -> Self {
        StateMachineInterpreter { schema, coercion }
    }

    pub fn schema(&self) -> &P {
        &self.schema
    }
}

impl StateMachineInterpreter<Arc<IntegrationSchemaProvider>> {
    /// Build the provider and the coercion engine from one registry.
    pub fn from_registry(registry: IntegrationRegistry) -> Self {
        let coercion = Arc::new(CoercionEngine::from_registry(&registry));
        let schema = Arc::new(IntegrationSchemaProvider::new(registry));
        StateMachineInterpreter { schema, coercion }
    }
}

impl<P: SchemaProvider> Interpreter for StateMachineInterpreter<P> {
    fn interpret(&self, tokens: &[Token]) -> Result<InterpretedStatement, ParseError> {
        Machine::new(tokens, &self.schema, &self.coercion).run()
    }
}

// ──────────────────────────────────────────────
// Machine
// ──────────────────────────────────────────────

struct Machine<'a, P> {
    tokens: &'a [Token],
    pos: usize,
    state: State,
    schema: &'a P,
    coercion: &'a CoercionEngine,
    statement: InterpretedStatement,
    /// Connective recorded on the next condition.
    pending_logical: LogicalOperator,
    /// An access type is required next (start of list or after `&`).
    expect_access: bool,
    /// A bare field may open a condition (right after `... AND`).
    implicit_with: bool,
    helper: StructuralHelper,
    field: String,
    operator: ConditionOperator,
}

impl<'a, P: SchemaProvider> Machine<'a, P> {
    fn new(tokens: &'a [Token], schema: &'a P, coercion: &'a CoercionEngine) -> Self {
        Machine {
            tokens,
            pos: 0,
            state: State::Command,
            schema,
            coercion,
            statement: InterpretedStatement::default(),
            pending_logical: LogicalOperator::default(),
            expect_access: true,
            implicit_with: false,
            helper: StructuralHelper::With,
            field: String::new(),
            operator: ConditionOperator::Is,
        }
    }

    fn run(mut self) -> Result<InterpretedStatement, ParseError> {
        while self.pos < self.tokens.len() {
            let token = self.cur();
            let before = self.state;
            match self.state {
                State::Command => self.command()?,
                State::AccessType => self.access_type()?,
                State::AccessTo => self.access_to()?,
                State::ResourceType => self.resource_type()?,
                State::ConditionStart => self.condition_start()?,
                State::ConditionField => self.condition_field()?,
                State::ConditionOperator => self.condition_operator()?,
                State::ConditionValue => self.condition_value()?,
            }
            tracing::debug!(state = %before, token = %token, next = %self.state, "interpreter step");
        }

        match self.state {
            State::ConditionStart => Ok(self.statement),
            state => Err(ParseError::UnexpectedEnd {
                state,
                expected: state.expected().to_owned(),
            }),
        }
    }

    // -- Cursor --------------------------------------------------

    fn cur(&self) -> &'a Token {
        &self.tokens[self.pos]
    }

    fn peek(&self, offset: usize) -> Option<&'a str> {
        self.tokens.get(self.pos + offset).map(Token::as_str)
    }

    fn unexpected(&self) -> ParseError {
        let token = self.cur();
        ParseError::grammar(self.state, token.as_str(), token.position, self.state.expected())
    }

    fn advance_to(&mut self, next: State, width: usize) {
        self.pos += width;
        self.state = next;
    }

    // -- States ----------------------------------------------------

    fn command(&mut self) -> Result<(), ParseError> {
        let command = Command::from_token(self.cur().as_str()).ok_or_else(|| self.unexpected())?;
        self.statement.command = Some(command);
        self.advance_to(State::AccessType, 1);
        Ok(())
    }

    fn access_type(&mut self) -> Result<(), ParseError> {
        let text = self.cur().as_str();

        if text == "&" {
            if self.expect_access {
                return Err(self.unexpected());
            }
            self.expect_access = true;
            self.pos += 1;
            return Ok(());
        }

        if let Some(access) = AccessType::from_token(text) {
            if !self.expect_access {
                return Err(self.unexpected());
            }
            self.statement.access_types.push(access);
            self.expect_access = false;
            self.pos += 1;
            if self.peek(0) == Some(ACCESS_TO) {
                self.state = State::AccessTo;
            }
            return Ok(());
        }

        // Only reachable right after `&` or with no access type at all; an
        // empty access list is left for the builder to reject.
        if text == ACCESS_TO {
            self.advance_to(State::ResourceType, 1);
            return Ok(());
        }

        Err(self.unexpected())
    }

    fn access_to(&mut self) -> Result<(), ParseError> {
        if self.cur().as_str() != ACCESS_TO {
            return Err(self.unexpected());
        }
        self.advance_to(State::ResourceType, 1);
        Ok(())
    }

    fn resource_type(&mut self) -> Result<(), ParseError> {
        let resource = self
            .schema
            .resolve_resource(self.cur().as_str())
            .ok_or_else(|| self.unexpected())?;
        self.statement.integration_data = self.schema.resource_metadata(&resource);
        self.statement.resource_type = Some(resource);
        self.advance_to(State::ConditionStart, 1);
        Ok(())
    }

    fn condition_start(&mut self) -> Result<(), ParseError> {
        let text = self.cur().as_str();

        if let Some(helper) = StructuralHelper::from_token(text) {
            self.helper = helper;
            self.implicit_with = false;
            self.advance_to(State::ConditionField, 1);
            return Ok(());
        }

        if let Some(logical) = LogicalOperator::from_token(text) {
            self.pending_logical = logical;
            self.implicit_with = !self.statement.conditions.is_empty();
            self.pos += 1;
            return Ok(());
        }

        // `WITH a IS 1 AND b IS 2`: the field after the connective reuses WITH.
        if self.implicit_with {
            self.helper = StructuralHelper::With;
            self.implicit_with = false;
            self.state = State::ConditionField;
            return Ok(());
        }

        Err(self.unexpected())
    }

    fn condition_field(&mut self) -> Result<(), ParseError> {
        let text = self.cur().as_str();

        if self.at_operator() {
            // `TAGGED = urgent`: the helper names the field itself. Unmapped
            // helpers (WITH included) fall back to their own name.
            self.field = self
                .schema
                .default_field(self.helper)
                .unwrap_or_else(|| self.helper.as_str().to_lowercase());
            // The operator token is consumed by the next state.
            self.state = State::ConditionOperator;
            return Ok(());
        }

        self.field = self.schema.map_field(self.helper, text);
        self.advance_to(State::ConditionOperator, 1);
        Ok(())
    }

    /// Whether the current token starts an operator phrase.
    fn at_operator(&self) -> bool {
        match self.cur().as_str() {
            "=" => true,
            "GREATER" | "LESS" => matches!(
                (self.peek(1), self.peek(2)),
                (Some("THAN"), _) | (Some("OR"), Some("EQUAL"))
            ),
            other => ConditionOperator::from_token(other).is_some(),
        }
    }

    fn condition_operator(&mut self) -> Result<(), ParseError> {
        let (operator, width) = match (self.cur().as_str(), self.peek(1), self.peek(2)) {
            ("=", _, _) => (ConditionOperator::Is, 1),
            ("GREATER", Some("OR"), Some("EQUAL")) => (ConditionOperator::GreaterOrEqual, 3),
            ("LESS", Some("OR"), Some("EQUAL")) => (ConditionOperator::LessOrEqual, 3),
            ("IS", Some("NOT"), _) => (ConditionOperator::IsNot, 2),
            ("GREATER", Some("THAN"), _) => (ConditionOperator::GreaterThan, 2),
            ("LESS", Some("THAN"), _) => (ConditionOperator::LessThan, 2),
            (single, _, _) => {
                let operator =
                    ConditionOperator::from_token(single).ok_or_else(|| self.unexpected())?;
                (operator, 1)
            }
        };
        self.operator = operator;
        self.advance_to(State::ConditionValue, width);
        Ok(())
    }

    fn condition_value(&mut self) -> Result<(), ParseError> {
        let raw = self.cur().as_str();
        let field = std::mem::take(&mut self.field);

        let declared = self
            .statement
            .resource_type
            .as_ref()
            .and_then(|resource| self.schema.field_type(&field, resource));
        let field_type = match declared {
            Some(declared) => declared,
            None => {
                let inferred = CoercionEngine::infer_type(raw);
                tracing::debug!(field = %field, %inferred, "no declared type, inferred from value");
                inferred
            }
        };
        let value = self.coercion.coerce(raw, field_type);

        self.statement.conditions.push(Condition {
            field,
            operator: self.operator,
            value,
            field_type,
            logical_operator: self.pending_logical,
        });
        self.pos += 1;

        if let Some(logical) = self.peek(0).and_then(LogicalOperator::from_token) {
            self.pending_logical = logical;
            self.implicit_with = true;
            self.pos += 1;
        }
        self.state = State::ConditionStart;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::Value;
    use crate::lexer;
    use crate::schema::{FieldDefinition, Integration, ResourceDefinition};
    use crate::vocab::{DataType, ResourceType};

    fn interpreter() -> StateMachineInterpreter<Arc<IntegrationSchemaProvider>> {
        let registry = IntegrationRegistry::new()
            .with(
                Integration::new("tracker")
                    .with_helper(StructuralHelper::Tagged, "labels")
                    .with_helper(StructuralHelper::Named, "title")
                    .with_resource(
                        "ISSUES",
                        ResourceDefinition::new()
                            .with_field("priority", FieldDefinition::typed(DataType::Number))
                            .with_field("labels", FieldDefinition::typed(DataType::Tags))
                            .with_field("archived", FieldDefinition::typed(DataType::Boolean))
                            .with_metadata("api_name", serde_json::json!("Tracker")),
                    ),
            )
            .unwrap();
        StateMachineInterpreter::from_registry(registry)
    }

    fn interpret(text: &str) -> Result<InterpretedStatement, ParseError> {
        interpreter().interpret(&lexer::lex(text)?)
    }

    #[test]
    fn statement_without_conditions() {
        let s = interpret("DENY READ & WRITE ACCESS TO ISSUES").unwrap();
        assert_eq!(s.command, Some(Command::Deny));
        assert_eq!(s.access_types, vec![AccessType::Read, AccessType::Write]);
        assert_eq!(s.resource_type, Some(ResourceType::Issues));
        assert!(s.conditions.is_empty());
        assert_eq!(s.integration_data["api_name"], "Tracker");
        assert_eq!(s.logical_operator, None);
    }

    #[test]
    fn equals_sign_is_is() {
        let s = interpret("GIVE READ ACCESS TO ISSUES WITH PRIORITY = 1").unwrap();
        let c = &s.conditions[0];
        assert_eq!(c.field, "priority");
        assert_eq!(c.operator, ConditionOperator::Is);
        assert_eq!(c.value, Value::Int(1));
        assert_eq!(c.field_type, DataType::Number);
    }

    #[test]
    fn compound_operators() {
        let cases = [
            ("GREATER OR EQUAL 3", ConditionOperator::GreaterOrEqual),
            ("LESS OR EQUAL 3", ConditionOperator::LessOrEqual),
            ("GREATER THAN 3", ConditionOperator::GreaterThan),
            ("LESS THAN 3", ConditionOperator::LessThan),
            ("IS NOT 3", ConditionOperator::IsNot),
            ("IS_NOT 3", ConditionOperator::IsNot),
            ("GREATER_OR_EQUAL 3", ConditionOperator::GreaterOrEqual),
            ("IS 3", ConditionOperator::Is),
        ];
        for (phrase, expected) in cases {
            let text = format!("GIVE READ ACCESS TO ISSUES WITH PRIORITY {}", phrase);
            let s = interpret(&text).unwrap();
            assert_eq!(s.conditions.len(), 1, "{}", text);
            assert_eq!(s.conditions[0].operator, expected, "{}", text);
            assert_eq!(s.conditions[0].value, Value::Int(3), "{}", text);
        }
    }

    #[test]
    fn logical_operators_tag_following_condition() {
        let s = interpret(
            "GIVE READ ACCESS TO ISSUES WITH PRIORITY = 1 OR WITH STATUS IS open AND WITH ARCHIVED IS no",
        )
        .unwrap();
        let ops: Vec<LogicalOperator> = s.conditions.iter().map(|c| c.logical_operator).collect();
        assert_eq!(
            ops,
            vec![LogicalOperator::And, LogicalOperator::Or, LogicalOperator::And]
        );
        assert_eq!(s.conditions[2].value, Value::Bool(false));
    }

    #[test]
    fn bare_field_after_connective_reuses_with() {
        let s = interpret("GIVE READ ACCESS TO ISSUES WITH A IS 1 AND B IS 2").unwrap();
        assert_eq!(s.conditions.len(), 2);
        assert_eq!(s.conditions[1].field, "b");
        assert_eq!(s.conditions[1].logical_operator, LogicalOperator::And);
    }

    #[test]
    fn helper_default_field_shortcut() {
        let s = interpret("GIVE READ ACCESS TO ISSUES TAGGED = bug,ui").unwrap();
        let c = &s.conditions[0];
        assert_eq!(c.field, "labels");
        assert_eq!(c.field_type, DataType::Tags);
        assert_eq!(c.value, Value::tags(["bug", "ui"]));

        let s = interpret("GIVE READ ACCESS TO ISSUES NAMED IS roadmap").unwrap();
        assert_eq!(s.conditions[0].field, "title");
    }

    #[test]
    fn unmapped_helper_falls_back_to_helper_name() {
        let s = interpret("GIVE READ ACCESS TO ISSUES ASSIGNED TO = alice@example.com").unwrap();
        let c = &s.conditions[0];
        assert_eq!(c.field, "assigned_to");
        assert_eq!(c.field_type, DataType::EmailAddress);
    }

    #[test]
    fn operator_right_after_with_uses_helper_name() {
        let s = interpret("GIVE READ ACCESS TO ISSUES WITH = 1").unwrap();
        let c = &s.conditions[0];
        assert_eq!(c.field, "with");
        assert_eq!(c.operator, ConditionOperator::Is);
        assert_eq!(c.value, Value::Int(1));

        let s = interpret("GIVE READ ACCESS TO ISSUES WITH GREATER THAN 2").unwrap();
        assert_eq!(s.conditions[0].field, "with");
        assert_eq!(s.conditions[0].operator, ConditionOperator::GreaterThan);
    }

    #[test]
    fn unknown_command_fails_in_command_state() {
        let err = interpret("FOO READ ACCESS TO ISSUES").unwrap_err();
        assert_eq!(err.state(), Some(State::Command));
        assert_eq!(err.token(), Some("FOO"));
    }

    #[test]
    fn access_list_grammar() {
        let err = interpret("GIVE READ WRITE ACCESS TO ISSUES").unwrap_err();
        assert_eq!(err.state(), Some(State::AccessType));
        assert_eq!(err.token(), Some("WRITE"));

        let err = interpret("GIVE & READ ACCESS TO ISSUES").unwrap_err();
        assert_eq!(err.token(), Some("&"));

        // A dangling `&` before ACCESS TO is tolerated.
        let s = interpret("GIVE READ & ACCESS TO ISSUES").unwrap();
        assert_eq!(s.access_types, vec![AccessType::Read]);

        // No access types at all is left to the builder.
        let s = interpret("GIVE ACCESS TO ISSUES").unwrap();
        assert!(s.access_types.is_empty());
    }

    #[test]
    fn unknown_resource() {
        let err = interpret("GIVE READ ACCESS TO WIDGETS").unwrap_err();
        assert_eq!(err.state(), Some(State::ResourceType));
        assert_eq!(err.token(), Some("WIDGETS"));
    }

    #[test]
    fn unexpected_token_after_resource() {
        let err = interpret("GIVE READ ACCESS TO ISSUES PRIORITY = 1").unwrap_err();
        assert_eq!(err.state(), Some(State::ConditionStart));
        assert_eq!(err.token(), Some("PRIORITY"));
    }

    #[test]
    fn bad_operator() {
        let err = interpret("GIVE READ ACCESS TO ISSUES WITH PRIORITY ABOUT 3").unwrap_err();
        assert_eq!(err.state(), Some(State::ConditionOperator));
        assert_eq!(err.token(), Some("ABOUT"));
    }

    #[test]
    fn truncated_statements() {
        for (text, state) in [
            ("GIVE", State::AccessType),
            ("GIVE READ", State::AccessType),
            ("GIVE READ ACCESS TO", State::ResourceType),
            ("GIVE READ ACCESS TO ISSUES WITH", State::ConditionField),
            ("GIVE READ ACCESS TO ISSUES WITH PRIORITY", State::ConditionOperator),
            ("GIVE READ ACCESS TO ISSUES WITH PRIORITY GREATER THAN", State::ConditionValue),
        ] {
            match interpret(text) {
                Err(ParseError::UnexpectedEnd { state: got, .. }) => {
                    assert_eq!(got, state, "{}", text)
                }
                other => panic!("{}: expected UnexpectedEnd, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn unparsable_number_keeps_text() {
        let s = interpret("GIVE READ ACCESS TO ISSUES WITH PRIORITY = abc").unwrap();
        assert_eq!(s.conditions[0].field_type, DataType::Number);
        assert_eq!(s.conditions[0].value, Value::text("abc"));
    }

    #[test]
    fn undeclared_fields_infer_type() {
        let s = interpret(
            "GIVE READ ACCESS TO ISSUES WITH ESTIMATE = 2.5 AND WITH OWNER IS bob@x.io AND WITH DRAFT IS yes AND WITH STATUS IS Open",
        )
        .unwrap();
        let types: Vec<DataType> = s.conditions.iter().map(|c| c.field_type).collect();
        assert_eq!(
            types,
            vec![
                DataType::Number,
                DataType::EmailAddress,
                DataType::Boolean,
                DataType::String
            ]
        );
        assert_eq!(s.conditions[0].value, Value::Float(2.5));
        assert_eq!(s.conditions[2].value, Value::Bool(true));
        assert_eq!(s.conditions[3].value, Value::text("Open"));
    }
}
