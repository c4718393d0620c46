//! The compile entry point: tokenizer, interpreter and builder in sequence.

use crate::builder::{DefaultStatementBuilder, StatementBuilder};
use crate::error::ParseError;
use crate::interpreter::{Interpreter, StateMachineInterpreter};
use crate::lexer::{Tokenizer, WhitespaceTokenizer};
use crate::schema::{IntegrationRegistry, IntegrationSchemaProvider};
use crate::statement::PermissionStatement;
use std::sync::Arc;

/// The default parser: whitespace tokenizer, state machine over the
/// integration schema, default builder.
pub type DefaultParser = PermissionParser<
    WhitespaceTokenizer,
    StateMachineInterpreter<Arc<IntegrationSchemaProvider>>,
    DefaultStatementBuilder,
>;

/// Composes a tokenizer, an interpreter and a builder. Any stage can be
/// swapped for another implementation without touching the others.
///
/// A parser holds no per-parse state; `parse` can be called concurrently
/// from several threads when the stages are `Sync`.
#[derive(Debug, Clone)]
pub struct PermissionParser<T, I, B> {
    tokenizer: T,
    interpreter: I,
    builder: B,
}

impl<T, I, B> PermissionParser<T, I, B>
where
    T: Tokenizer,
    I: Interpreter,
    B: StatementBuilder,
{
    pub fn new(tokenizer: T, interpreter: I, builder: B) -> Self {
        PermissionParser {
            tokenizer,
            interpreter,
            builder,
        }
    }

    /// Compile one statement, stopping at the first failure.
    pub fn parse(&self, text: &str) -> Result<PermissionStatement, ParseError> {
        let tokens = self.tokenizer.tokenize(text)?;
        let interpreted = self.interpreter.interpret(&tokens)?;
        let statement = self.builder.build(interpreted)?;
        tracing::debug!(
            tokens = tokens.len(),
            conditions = statement.conditions().len(),
            "compiled permission statement"
        );
        Ok(statement)
    }

    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }
}

impl DefaultParser {
    /// A parser resolving fields and types against `registry`.
    pub fn from_registry(registry: IntegrationRegistry) -> Self {
        PermissionParser::new(
            WhitespaceTokenizer,
            StateMachineInterpreter::from_registry(registry),
            DefaultStatementBuilder,
        )
    }
}

impl Default for DefaultParser {
    /// A parser with no integrations: built-in resource types only, every
    /// field type inferred from its value.
    fn default() -> Self {
        DefaultParser::from_registry(IntegrationRegistry::new())
    }
}

/// Parse with a parser that knows no integrations.
pub fn parse(text: &str) -> Result<PermissionStatement, ParseError> {
    DefaultParser::default().parse(text)
}
