//! Argument coercion boundary.
//!
//! Every tool invocation passes through `coerce_args` exactly once, so
//! individual tools never re-validate raw model output. Models routinely
//! send integers as strings and JSON filters as native objects; both are
//! normalized here.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::spec::{ParamKind, ToolSpec};
use crate::tool::ToolError;

#[derive(Debug, Error)]
pub enum CoercionError {
    #[error("tool '{tool}': arguments must be a JSON object, got {got}")]
    NotAnObject { tool: String, got: &'static str },
    #[error("tool '{tool}': unknown argument '{name}'")]
    UnknownParam { tool: String, name: String },
    #[error("tool '{tool}': missing required argument '{name}'")]
    MissingRequired { tool: String, name: String },
    #[error("tool '{tool}': argument '{name}' expected {expected}, got {got}")]
    Untypeable {
        tool: String,
        name: String,
        expected: &'static str,
        got: String,
    },
}

/// Arguments after coercion. Accessors cannot fail for parameters the
/// spec declares; the `Result` form exists for tools probing optionals.
#[derive(Debug, Clone, Default)]
pub struct ToolArgs {
    values: Map<String, Value>,
}

impl ToolArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Result<&str, ToolError> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput(format!("missing text argument '{name}'")))
    }

    pub fn integer(&self, name: &str) -> Result<i64, ToolError> {
        self.get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| ToolError::InvalidInput(format!("missing integer argument '{name}'")))
    }

    pub fn number(&self, name: &str) -> Result<f64, ToolError> {
        self.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| ToolError::InvalidInput(format!("missing number argument '{name}'")))
    }

    pub fn boolean(&self, name: &str) -> Result<bool, ToolError> {
        self.get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| ToolError::InvalidInput(format!("missing boolean argument '{name}'")))
    }

    /// Parse a `JsonText` argument back into a `Value`. Coercion guarantees
    /// the stored text is valid JSON.
    pub fn json_text(&self, name: &str) -> Result<Value, ToolError> {
        let text = self.text(name)?;
        serde_json::from_str(text)
            .map_err(|e| ToolError::InvalidInput(format!("argument '{name}' is not JSON: {e}")))
    }
}

/// Coerce raw model-emitted arguments into the spec's canonical forms.
///
/// - `JsonText`: native objects/arrays are serialized to JSON text; empty
///   or null values become `"{}"` (match-all); text must parse as JSON.
/// - `Integer` / `Number` / `Boolean`: accept the native type or its string
///   rendering.
/// - Missing optionals take the spec's default; missing required, unknown
///   names, and untypeable values are errors.
pub fn coerce_args(spec: &ToolSpec, raw: &Value) -> Result<ToolArgs, CoercionError> {
    let obj = match raw {
        Value::Object(obj) => obj.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(CoercionError::NotAnObject {
                tool: spec.name.clone(),
                got: type_name(other),
            })
        }
    };

    for name in obj.keys() {
        if spec.param(name).is_none() {
            return Err(CoercionError::UnknownParam {
                tool: spec.name.clone(),
                name: name.clone(),
            });
        }
    }

    let mut values = Map::new();
    for param in &spec.params {
        let raw_value = obj.get(&param.name);
        let coerced = match raw_value {
            Some(v) if !v.is_null() || param.kind == ParamKind::JsonText => {
                coerce_value(spec, &param.name, param.kind, v)?
            }
            _ => match (&param.default, param.required) {
                (Some(default), _) => default.clone(),
                (None, true) => {
                    return Err(CoercionError::MissingRequired {
                        tool: spec.name.clone(),
                        name: param.name.clone(),
                    })
                }
                (None, false) => continue,
            },
        };
        values.insert(param.name.clone(), coerced);
    }

    Ok(ToolArgs { values })
}

fn coerce_value(
    spec: &ToolSpec,
    name: &str,
    kind: ParamKind,
    value: &Value,
) -> Result<Value, CoercionError> {
    let untypeable = |expected: &'static str| CoercionError::Untypeable {
        tool: spec.name.clone(),
        name: name.to_string(),
        expected,
        got: value.to_string(),
    };

    match kind {
        ParamKind::Text => match value {
            Value::String(_) => Ok(value.clone()),
            _ => Err(untypeable("text")),
        },
        ParamKind::Integer => match value {
            Value::Number(n) if n.is_i64() => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| untypeable("integer")),
            _ => Err(untypeable("integer")),
        },
        ParamKind::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| untypeable("number")),
            _ => Err(untypeable("number")),
        },
        ParamKind::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(untypeable("boolean")),
            },
            _ => Err(untypeable("boolean")),
        },
        ParamKind::JsonText => match value {
            Value::Null => Ok(Value::String("{}".to_string())),
            Value::String(s) if s.trim().is_empty() => Ok(Value::String("{}".to_string())),
            Value::String(s) => {
                serde_json::from_str::<Value>(s).map_err(|_| untypeable("JSON text"))?;
                Ok(value.clone())
            }
            // Models often emit the filter as a native object.
            Value::Object(_) | Value::Array(_) => {
                Ok(Value::String(value.to_string()))
            }
            _ => Err(untypeable("JSON text")),
        },
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
