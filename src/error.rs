use thiserror::Error;

use crate::bindings::BindingError;
use crate::coercion::CoercionError;
use crate::directive::DirectiveError;
use crate::evaluator::EvalError;
use crate::event::lifecycle::LifecycleError;
use crate::registry::ListenerError;
use crate::resolver::ResolveError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("Coercion error: {0}")]
    Coercion(#[from] CoercionError),
    #[error("Directive error: {0}")]
    Directive(#[from] DirectiveError),
    // eval error
    #[error("Eval error: {0}")]
    Eval(#[from] EvalError),
    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

// エラー作成用のヘルパー関数
impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
