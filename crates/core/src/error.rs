use crate::interpreter::State;

/// A failure while compiling a permission statement.
///
/// Every variant aborts the current `parse` call; nothing is recovered or
/// retried internally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// The statement text was empty or contained only whitespace.
    #[error("empty permission statement")]
    EmptyInput,

    /// A token did not match the grammar expected by the current state.
    #[error("unexpected token '{token}' at position {position} in state {state}: expected {expected}")]
    Grammar {
        state: State,
        token: String,
        position: usize,
        expected: String,
    },

    /// The input ended while the interpreter was still waiting for more tokens.
    #[error("unexpected end of statement in state {state}: expected {expected}")]
    UnexpectedEnd { state: State, expected: String },

    /// The interpreted statement is missing a required part.
    #[error("invalid statement: {0}")]
    Validation(String),
}

impl ParseError {
    pub(crate) fn grammar(
        state: State,
        token: &str,
        position: usize,
        expected: impl Into<String>,
    ) -> Self {
        ParseError::Grammar {
            state,
            token: token.to_owned(),
            position,
            expected: expected.into(),
        }
    }

    /// Name of the error category this failure belongs to.
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::EmptyInput => "TokenizeError",
            ParseError::Grammar { .. } | ParseError::UnexpectedEnd { .. } => "GrammarError",
            ParseError::Validation(_) => "ValidationError",
        }
    }

    /// The interpreter state the failure occurred in, for grammar errors.
    pub fn state(&self) -> Option<State> {
        match self {
            ParseError::Grammar { state, .. } | ParseError::UnexpectedEnd { state, .. } => {
                Some(*state)
            }
            _ => None,
        }
    }

    /// The offending token, for grammar errors raised on a concrete token.
    pub fn token(&self) -> Option<&str> {
        match self {
            ParseError::Grammar { token, .. } => Some(token),
            _ => None,
        }
    }

    /// Serialize to a JSON object. All keys are always present (null when
    /// not applicable) so consumers can rely on a fixed shape.
    pub fn to_json_value(&self) -> serde_json::Value {
        let position = match self {
            ParseError::Grammar { position, .. } => Some(*position),
            _ => None,
        };
        serde_json::json!({
            "kind":     self.kind(),
            "message":  self.to_string(),
            "position": position,
            "state":    self.state().map(|s| s.as_str()),
            "token":    self.token(),
        })
    }
}

/// A failure while loading integration definitions.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The definitions document does not have the expected shape.
    #[error("malformed integration definitions at '{path}': {message}")]
    Malformed { path: String, message: String },

    /// Two integrations were registered under the same name.
    #[error("integration '{0}' is already registered")]
    DuplicateIntegration(String),
}

impl SchemaError {
    pub(crate) fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaError::Malformed {
            path: path.into(),
            message: message.into(),
        }
    }
}
