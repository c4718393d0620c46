//! Value coercion: raw token text to a typed value.
//!
//! Built-in conversions cover the core data types. Integrations can replace
//! the conversion for a data type with a declarative pipeline of steps
//! (see [`PipelineStep`]). Coercion never fails: whenever a conversion does
//! not apply, the raw text is kept as the value.

use crate::schema::IntegrationRegistry;
use crate::vocab::DataType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Token literals read as `true` by the built-in BOOLEAN conversion.
const TRUE_LITERALS: &[&str] = &["true", "yes", "on", "1"];

/// Token literals that make inference pick BOOLEAN.
const BOOLEAN_LITERALS: &[&str] = &["true", "false", "yes", "no", "on", "off"];

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Constant pattern; `email_pattern_compiles` covers it.
    Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$").expect("valid email pattern")
});

// ──────────────────────────────────────────────
// Coerced values
// ──────────────────────────────────────────────

/// A condition value after coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// A list of text values, as produced for TAGS.
    pub fn tags<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::Text(s.into())).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON literal from an integration definition.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(_) => Value::Text(json.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            // Debug keeps the fractional part ("3.0"), so the text reads back as a float.
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

// ──────────────────────────────────────────────
// Pipelines
// ──────────────────────────────────────────────

/// One step of a declarative coercion pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStep {
    Lowercase,
    /// Target value paired with the lower-case aliases that select it.
    MapValues(Vec<(String, Vec<String>)>),
    Split {
        separator: String,
        strip_whitespace: bool,
    },
    TryInt,
    TryFloat,
    ValidateEmail,
    Default(Value),
}

impl PipelineStep {
    /// Read a step from its definition form: either a bare step name
    /// (`"lowercase"`) or a single-key object (`{"split": {...}}`).
    /// Returns `None` for unknown or malformed steps.
    pub fn from_json(step: &serde_json::Value) -> Option<Self> {
        match step {
            serde_json::Value::String(name) => match name.as_str() {
                "lowercase" => Some(PipelineStep::Lowercase),
                "try_int" => Some(PipelineStep::TryInt),
                "try_float" => Some(PipelineStep::TryFloat),
                "validate_email_format" => Some(PipelineStep::ValidateEmail),
                _ => None,
            },
            serde_json::Value::Object(obj) if obj.len() == 1 => {
                let (name, config) = obj.iter().next()?;
                match name.as_str() {
                    "lowercase" => Some(PipelineStep::Lowercase),
                    "try_int" => Some(PipelineStep::TryInt),
                    "try_float" => Some(PipelineStep::TryFloat),
                    "validate_email_format" => Some(PipelineStep::ValidateEmail),
                    "map_values" => {
                        let targets = config
                            .as_object()?
                            .iter()
                            .map(|(target, aliases)| {
                                let aliases = aliases
                                    .as_array()
                                    .map(|a| {
                                        a.iter()
                                            .filter_map(|v| v.as_str().map(str::to_owned))
                                            .collect()
                                    })
                                    .unwrap_or_default();
                                (target.clone(), aliases)
                            })
                            .collect();
                        Some(PipelineStep::MapValues(targets))
                    }
                    "split" => Some(PipelineStep::Split {
                        separator: config
                            .get("separator")
                            .and_then(|s| s.as_str())
                            .filter(|s| !s.is_empty())
                            .unwrap_or(",")
                            .to_owned(),
                        strip_whitespace: config
                            .get("strip_whitespace")
                            .and_then(|b| b.as_bool())
                            .unwrap_or(false),
                    }),
                    "default" => Some(PipelineStep::Default(Value::from_json(config))),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn apply(&self, value: Value) -> Value {
        match (self, value) {
            (PipelineStep::Lowercase, Value::Text(s)) => Value::Text(s.to_lowercase()),
            (PipelineStep::MapValues(targets), Value::Text(s)) => {
                let lowered = s.to_lowercase();
                let hit = targets
                    .iter()
                    .find(|(_, aliases)| aliases.iter().any(|a| *a == lowered));
                match hit {
                    Some((target, _)) if target == "true" => Value::Bool(true),
                    Some((target, _)) if target == "false" => Value::Bool(false),
                    Some((target, _)) => Value::Text(target.clone()),
                    None => Value::Text(s),
                }
            }
            (
                PipelineStep::Split {
                    separator,
                    strip_whitespace,
                },
                Value::Text(s),
            ) => {
                if s.contains(separator.as_str()) {
                    Value::tags(s.split(separator.as_str()).map(|part| {
                        if *strip_whitespace {
                            part.trim()
                        } else {
                            part
                        }
                    }))
                } else {
                    Value::List(vec![Value::Text(s)])
                }
            }
            (PipelineStep::Split { .. }, Value::Null) => Value::List(Vec::new()),
            (PipelineStep::Split { .. }, list @ Value::List(_)) => list,
            (PipelineStep::Split { .. }, other) => Value::List(vec![other]),
            (PipelineStep::TryInt, Value::Text(s)) => match s.parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => Value::Text(s),
            },
            (PipelineStep::TryFloat, Value::Text(s)) => match parse_finite_float(&s) {
                Some(x) => Value::Float(x),
                None => Value::Text(s),
            },
            (PipelineStep::ValidateEmail, Value::Text(s)) => {
                if EMAIL_PATTERN.is_match(&s) {
                    Value::Text(s)
                } else {
                    Value::Null
                }
            }
            (PipelineStep::Default(fallback), Value::Null) => fallback.clone(),
            (_, other) => other,
        }
    }
}

fn parse_finite_float(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|x| x.is_finite())
}

// ──────────────────────────────────────────────
// Engine
// ──────────────────────────────────────────────

/// Converts raw tokens into typed values. Read-only once built; share it
/// freely between threads.
#[derive(Debug, Clone, Default)]
pub struct CoercionEngine {
    pipelines: HashMap<DataType, Vec<PipelineStep>>,
}

impl CoercionEngine {
    /// An engine with only the built-in conversions.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pipelines(pipelines: HashMap<DataType, Vec<PipelineStep>>) -> Self {
        CoercionEngine { pipelines }
    }

    /// Collect the pipelines declared by every registered integration.
    /// Later registrations replace earlier pipelines for the same type.
    pub fn from_registry(registry: &IntegrationRegistry) -> Self {
        let mut pipelines = HashMap::new();
        for integration in registry.iter() {
            for (data_type, steps) in &integration.pipelines {
                pipelines.insert(*data_type, steps.clone());
            }
        }
        CoercionEngine { pipelines }
    }

    pub fn pipeline(&self, data_type: DataType) -> Option<&[PipelineStep]> {
        self.pipelines
            .get(&data_type)
            .map(Vec::as_slice)
            .filter(|steps| !steps.is_empty())
    }

    /// Coerce `raw` to `data_type`. Never fails.
    pub fn coerce(&self, raw: &str, data_type: DataType) -> Value {
        match self.pipeline(data_type) {
            Some(steps) => {
                let mut value = Value::text(raw);
                for step in steps {
                    value = step.apply(value);
                    tracing::trace!(?data_type, ?step, ?value, "applied coercion step");
                }
                value
            }
            None => builtin_coercion(raw, data_type),
        }
    }

    /// Guess a data type for a token that no integration declares.
    pub fn infer_type(raw: &str) -> DataType {
        let lowered = raw.to_lowercase();
        if BOOLEAN_LITERALS.contains(&lowered.as_str()) {
            DataType::Boolean
        } else if raw.parse::<i64>().is_ok() || parse_finite_float(raw).is_some() {
            DataType::Number
        } else if raw.contains('@') {
            DataType::EmailAddress
        } else {
            DataType::String
        }
    }
}

fn builtin_coercion(raw: &str, data_type: DataType) -> Value {
    match data_type {
        DataType::Boolean => Value::Bool(TRUE_LITERALS.contains(&raw.to_lowercase().as_str())),
        DataType::Number => {
            if let Ok(i) = raw.parse::<i64>() {
                Value::Int(i)
            } else if let Some(x) = parse_finite_float(raw) {
                Value::Float(x)
            } else {
                Value::text(raw)
            }
        }
        DataType::Tags => {
            if raw.contains(',') {
                Value::tags(raw.split(',').map(str::trim))
            } else {
                Value::tags([raw])
            }
        }
        _ => Value::text(raw),
    }
}
