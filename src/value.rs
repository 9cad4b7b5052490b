//! # Evaluator Values
//!
//! The closed set of value kinds the listener registry produces for, or
//! consumes from, the embedded evaluator. The evaluator's own value model is
//! richer; this enum only carries the shapes needed to name events, hold
//! callbacks and deliver host results.
//!
//! Lists are built from pairs and terminated by [`Value::Nil`], so
//! `(callback 'a 'b)` is `Pair(callback, Pair(quote-a, Pair(quote-b, Nil)))`.

use std::{fmt, sync::Arc};

/// Opaque reference to a callable value owned by the evaluator.
///
/// The registry never calls a procedure directly; it only places it at the
/// head of an application expression handed back to the evaluator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Procedure {
    /// Evaluator-side handle identifying the closure or native procedure
    pub handle: u64,
    /// Name for diagnostics (`None` for anonymous lambdas)
    pub name: Option<String>,
}

impl Procedure {
    pub fn new(handle: u64) -> Self {
        Self { handle, name: None }
    }

    pub fn named(handle: u64, name: &str) -> Self {
        Self {
            handle,
            name: Some(name.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// The empty list
    #[default]
    Nil,
    Boolean(bool),
    Number(f64),
    String(Arc<str>),
    Symbol(Arc<str>),
    Pair(Arc<Value>, Arc<Value>),
    Procedure(Procedure),
}

/// Long lists are unlinked one pair at a time, so dropping a list never
/// recurses along its cdr chain.
impl Drop for Value {
    fn drop(&mut self) {
        let Value::Pair(_, cdr) = self else {
            return;
        };
        if !matches!(**cdr, Value::Pair(_, _)) {
            return;
        }
        let nil = Arc::new(Value::Nil);
        let mut next = std::mem::replace(cdr, nil.clone());
        // A tail still shared elsewhere is left to its last owner
        while let Some(mut node) = Arc::into_inner(next) {
            let Value::Pair(_, tail) = &mut node else {
                break;
            };
            if !matches!(**tail, Value::Pair(_, _)) {
                break;
            }
            next = std::mem::replace(tail, nil.clone());
        }
    }
}

pub const QUOTE: &str = "quote";

impl Value {
    pub fn string(s: &str) -> Self {
        Value::String(Arc::from(s))
    }

    pub fn symbol(s: &str) -> Self {
        Value::Symbol(Arc::from(s))
    }

    pub fn cons(car: Value, cdr: Value) -> Self {
        Value::Pair(Arc::new(car), Arc::new(cdr))
    }

    /// Builds a proper list from the given elements, preserving their order.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |tail, head| Value::cons(head, tail))
    }

    /// `(quote value)`
    pub fn quote(value: Value) -> Self {
        Value::list([Value::symbol(QUOTE), value])
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Pair(_, _) => "pair",
            Value::Procedure(_) => "procedure",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, Value::Procedure(_))
    }

    pub fn car(&self) -> Option<&Value> {
        match self {
            Value::Pair(car, _) => Some(&**car),
            _ => None,
        }
    }

    pub fn cdr(&self) -> Option<&Value> {
        match self {
            Value::Pair(_, cdr) => Some(&**cdr),
            _ => None,
        }
    }

    /// Text of a string or symbol value.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Symbol(s) => Some(&**s),
            _ => None,
        }
    }

    /// Iterates the cars of a list. Stops at the first non-pair tail, so an
    /// improper list yields its proper prefix.
    pub fn iter(&self) -> ListIter<'_> {
        ListIter { current: self }
    }

    pub fn is_list(&self) -> bool {
        let mut current = self;
        loop {
            match current {
                Value::Nil => return true,
                Value::Pair(_, cdr) => current = &**cdr,
                _ => return false,
            }
        }
    }

    /// Elements of a proper list, or `None` for anything else.
    pub fn to_vec(&self) -> Option<Vec<Value>> {
        if !self.is_list() {
            return None;
        }
        Some(self.iter().cloned().collect())
    }
}

pub struct ListIter<'a> {
    current: &'a Value,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current {
            Value::Pair(car, cdr) => {
                self.current = &**cdr;
                Some(&**car)
            }
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<Procedure> for Value {
    fn from(value: Procedure) -> Self {
        Value::Procedure(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "()"),
            Value::Boolean(true) => write!(f, "#t"),
            Value::Boolean(false) => write!(f, "#f"),
            // Integral values print without a fraction while they fit an i64 exactly
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::Procedure(p) => match &p.name {
                Some(name) => write!(f, "#<procedure {}>", name),
                None => write!(f, "#<procedure {}>", p.handle),
            },
            Value::Pair(car, cdr) => {
                write!(f, "({}", car)?;
                let mut tail: &Value = &**cdr;
                loop {
                    match tail {
                        Value::Nil => break,
                        Value::Pair(car, cdr) => {
                            write!(f, " {}", car)?;
                            tail = &**cdr;
                        }
                        other => {
                            write!(f, " . {}", other)?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
        }
    }
}
