//! Column type tags.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::fmt;

/// The declared type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// `bool`
    Bool,
    /// `int`, `int64`, `integer`
    Int,
    /// `float`, `float64`, `double`
    Float,
    /// `string`, `text`
    Text,
    /// `blob`
    Blob,
}

impl ColumnType {
    /// Parses a type name as written in `CREATE TABLE`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownType`] for names that are not recognized.
    pub fn parse(name: &str) -> CodecResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Bool),
            "int" | "int64" | "integer" => Ok(Self::Int),
            "float" | "float64" | "double" => Ok(Self::Float),
            "string" | "text" => Ok(Self::Text),
            "blob" => Ok(Self::Blob),
            _ => Err(CodecError::UnknownType {
                name: name.to_string(),
            }),
        }
    }

    /// Canonical name of the type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int64",
            Self::Float => "float64",
            Self::Text => "string",
            Self::Blob => "blob",
        }
    }

    /// Converts `value` so it can be stored in a column of this type.
    ///
    /// `NULL` fits every column. Integers widen into float columns.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TypeMismatch`] when the value cannot be stored.
    pub fn coerce(self, value: Value) -> CodecResult<Value> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::Bool, v @ Value::Bool(_))
            | (Self::Int, v @ Value::Int(_))
            | (Self::Float, v @ Value::Float(_))
            | (Self::Text, v @ Value::Text(_))
            | (Self::Blob, v @ Value::Blob(_)) => Ok(v),
            #[allow(clippy::cast_precision_loss)]
            (Self::Float, Value::Int(n)) => Ok(Value::Float(n as f64)),
            (ty, v) => Err(CodecError::TypeMismatch {
                expected: ty.name(),
                actual: v.type_name(),
            }),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
