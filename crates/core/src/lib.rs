//! permit-core: compiler for permission statements.
//!
//! Turns statements such as
//! `GIVE READ ACCESS TO ISSUES WITH PRIORITY GREATER THAN 2 AND STATUS IS active`
//! into a typed [`PermissionStatement`] ready for policy generation.
//!
//! # Pipeline
//!
//! - [`lexer`] -- whitespace tokenizer (merges `ACCESS TO`, `ASSIGNED TO`)
//! - [`interpreter`] -- state machine consulting a [`SchemaProvider`] for
//!   field names and types and a [`CoercionEngine`] for values
//! - [`builder`] -- validation and freezing into a [`PermissionStatement`]
//! - [`parser`] -- the three stages behind one `parse` call
//!
//! Integration definitions are passed in explicitly as an
//! [`IntegrationRegistry`]; nothing is read from global state.
//!
//! # Grammar restrictions
//!
//! - Conditions form a flat list joined by AND/OR. Parenthesised or nested
//!   groups cannot be expressed.
//! - Tokens are split on whitespace with no quoting, so a condition value
//!   cannot contain whitespace (`WITH title IS "two words"` yields the value
//!   `"two` and then fails on `words"`).

pub mod builder;
pub mod coerce;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod schema;
pub mod statement;
pub mod vocab;

// ── Convenience re-exports: key types ────────────────────────────────

pub use coerce::{CoercionEngine, PipelineStep, Value};
pub use error::{ParseError, SchemaError};
pub use interpreter::State;
pub use schema::{
    FieldDefinition, Integration, IntegrationRegistry, IntegrationSchemaProvider,
    ResourceDefinition, SchemaProvider,
};
pub use statement::{Condition, InterpretedStatement, PermissionStatement};
pub use vocab::{
    AccessType, Command, ConditionOperator, DataType, LogicalOperator, ResourceType,
    StructuralHelper,
};

// ── Convenience re-exports: pipeline stages ──────────────────────────

pub use builder::{DefaultStatementBuilder, StatementBuilder};
pub use interpreter::{Interpreter, StateMachineInterpreter};
pub use lexer::{Token, Tokenizer, WhitespaceTokenizer};
pub use parser::{parse, DefaultParser, PermissionParser};
