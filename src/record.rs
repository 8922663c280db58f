//! Typed row values.

use crate::schema::{ColumnType, Schema};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single typed cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl Value {
    /// Parse `raw` as a value of type `ty`. Returns `None` on mismatch.
    #[must_use]
    pub fn parse(raw: &str, ty: ColumnType) -> Option<Value> {
        match ty {
            ColumnType::String => Some(Value::Str(raw.to_string())),
            ColumnType::Int => raw.trim().parse::<i64>().ok().map(Value::Int),
            ColumnType::Bool => parse_bool(raw).map(Value::Bool),
        }
    }

    /// Borrow the string payload, if this is a string cell.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") || raw == "1" {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") || raw == "0" {
        Some(false)
    } else {
        None
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// One parsed row. Values are stored positionally in schema column order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Build a record from raw string fields, checking arity and types.
    ///
    /// # Errors
    /// [`FieldError`] describing the first field that does not fit `schema`.
    pub fn from_fields(schema: &Schema, fields: &[&str]) -> Result<Record, FieldError> {
        if fields.len() != schema.len() {
            return Err(FieldError::Arity {
                expected: schema.len(),
                found: fields.len(),
            });
        }
        let mut values = Vec::with_capacity(schema.len());
        for (&raw, col) in fields.iter().zip(schema.columns()) {
            let v = Value::parse(raw, col.ty).ok_or_else(|| FieldError::Type {
                column: col.name.clone(),
                raw: raw.to_string(),
                ty: col.ty,
            })?;
            values.push(v);
        }
        Ok(Record { values })
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Value of the column called `name` under `schema`.
    #[must_use]
    pub fn field<'a>(&'a self, schema: &Schema, name: &str) -> Option<&'a Value> {
        schema.index_of(name).and_then(|i| self.values.get(i))
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Why a row could not be turned into a [`Record`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("expected {expected} columns, found {found}")]
    Arity { expected: usize, found: usize },

    #[error("column `{column}`: cannot parse {raw:?} as {ty:?}")]
    Type { column: String, raw: String, ty: ColumnType },
}
