//! The evaluator seam. The registry only needs to hand an application
//! expression back to the interpreter that owns the callback; parsing,
//! environments and the evaluation strategy stay on the other side.

use mockall::automock;
use thiserror::Error;

use crate::value::Value;

/// An evaluator frame or session that issued a registration.
///
/// Identifier allocators may use it to namespace listener ids per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Frame {
    pub session: u32,
}

impl Frame {
    pub fn new(session: u32) -> Self {
        Self { session }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Evaluation failed: {0}")]
    Failed(String),
    /// A condition raised by scripted code
    #[error("Raised: {0}")]
    Raised(Value),
    #[error("Not a procedure: {0}")]
    NotProcedure(String),
}

pub type EvalResult<T> = Result<T, EvalError>;

#[automock]
pub trait Evaluator: Send + Sync {
    /// Evaluates `expression`. For callback delivery this is always an
    /// application `(callback arg ...)`.
    fn evaluate(&self, expression: &Value) -> EvalResult<Value>;
}
