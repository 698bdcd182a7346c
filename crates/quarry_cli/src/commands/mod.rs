//! CLI command implementations.

pub mod exec;
pub mod inspect;
pub mod verify;

use quarry_core::{CoreError, ExecuteError, Value};
use std::io;
use std::str::FromStr;
use thiserror::Error;

/// Errors reported by the commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Engine error outside statement execution.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A statement failed.
    #[error(transparent)]
    Execute(#[from] ExecuteError),

    /// The statements ended inside a transaction; its work was discarded.
    #[error("transaction left open at nesting level {0}, rolled back")]
    OpenTransaction(usize),

    /// Unknown output format.
    #[error("unknown output format {0} (expected text or json)")]
    Format(String),

    /// Output failure.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// JSON encoding failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Tab separated lines.
    Text,
    /// Pretty printed JSON.
    Json,
}

impl FromStr for Format {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CliError::Format(other.to_string())),
        }
    }
}

/// Parses a command-line argument into a value.
///
/// `null`, `true` and `false` map to their values, numbers to `Int` or
/// `Float`. Anything else is text; wrap a value in single quotes to force
/// text (`'42'`).
pub fn parse_arg(arg: &str) -> Value {
    if let Some(text) = arg
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Value::from(text);
    }
    match arg {
        "null" | "NULL" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = arg.parse::<i64>() {
                Value::Int(n)
            } else if let Some(x) = arg.parse::<f64>().ok().filter(|x| x.is_finite()) {
                Value::Float(x)
            } else {
                Value::from(arg)
            }
        }
    }
}

/// Converts a value for JSON output. Blobs keep their `x'..'` literal form.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Blob(_) => serde_json::Value::String(value.to_string()),
    }
}
