//! # Value Coercion
//!
//! Directives deliver results as [`HostValue`]s. Before a scripted callback can
//! observe them they are rebuilt as evaluator [`Value`]s:
//!
//! | Host value          | Evaluator value                 |
//! |---------------------|---------------------------------|
//! | `Null`              | `Nil`                           |
//! | `Evaluator(v)`      | `v`, unchanged                  |
//! | `String`            | `String`                        |
//! | `Boolean`           | `Boolean`                       |
//! | `Integer`, `Float`  | `Number`                        |
//! | `List`              | proper list, elements coerced   |
//! | `Map`, `Bytes`      | `UnprocessableValue` error      |

use std::collections::HashMap;

use thiserror::Error;
use tracing::trace;

use crate::value::Value;

/// Values as produced by host-side directives.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum HostValue {
    #[default]
    Null,
    String(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    List(Vec<HostValue>),
    Map(HashMap<String, HostValue>),
    Bytes(Vec<u8>),
    /// A value the directive already built in the evaluator's model
    Evaluator(Value),
}

impl HostValue {
    pub fn kind(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::String(_) => "string",
            HostValue::Boolean(_) => "boolean",
            HostValue::Integer(_) => "integer",
            HostValue::Float(_) => "float",
            HostValue::List(_) => "list",
            HostValue::Map(_) => "map",
            HostValue::Bytes(_) => "bytes",
            HostValue::Evaluator(_) => "evaluator value",
        }
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Boolean(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Integer(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<Value> for HostValue {
    fn from(value: Value) -> Self {
        HostValue::Evaluator(value)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(HostValue::Null)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(value: Vec<T>) -> Self {
        HostValue::List(value.into_iter().map(Into::into).collect())
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum CoercionError {
    #[error("Unprocessable value: {kind}")]
    UnprocessableValue { kind: &'static str },
}

pub type CoercionResult<T> = Result<T, CoercionError>;

/// Converts a host value into the evaluator's value model.
pub fn coerce(value: HostValue) -> CoercionResult<Value> {
    match value {
        HostValue::Null => Ok(Value::Nil),
        HostValue::Evaluator(value) => Ok(value),
        HostValue::String(s) => Ok(Value::string(&s)),
        HostValue::Boolean(b) => Ok(Value::Boolean(b)),
        HostValue::Integer(i) => Ok(Value::Number(i as f64)),
        HostValue::Float(f) => Ok(Value::Number(f)),
        HostValue::List(items) => {
            let items = items
                .into_iter()
                .map(coerce)
                .collect::<CoercionResult<Vec<_>>>()?;
            Ok(Value::list(items))
        }
        other => {
            trace!("Rejecting host value: {:?}", other);
            Err(CoercionError::UnprocessableValue { kind: other.kind() })
        }
    }
}

/// Coerces a dispatch payload into the argument list for a callback.
///
/// A list payload supplies one argument per element and `Null` supplies none;
/// any other payload becomes a single argument. With `quote` set, every
/// argument is wrapped in `(quote ...)` so the evaluator treats it as data.
pub fn coerce_arguments(payload: HostValue, quote: bool) -> CoercionResult<Vec<Value>> {
    let arguments = match coerce(payload)? {
        Value::Nil => vec![],
        list @ Value::Pair(_, _) if list.is_list() => list.iter().cloned().collect(),
        single => vec![single],
    };
    if quote {
        Ok(arguments.into_iter().map(Value::quote).collect())
    } else {
        Ok(arguments)
    }
}
