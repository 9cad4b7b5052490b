//! Optional collaborators that let the embedding application override parts
//! of dispatch.

use crate::{
    coercion::HostValue,
    evaluator::{EvalError, EvalResult},
    value::Value,
};

use super::{listener::ListenerSnapshot, ListenerRegistry, ListenerResult};

/// Receives errors raised while a callback runs. Returning `Ok` recovers with
/// that value; returning `Err` propagates the (possibly rewritten) error to the
/// dispatch caller.
pub trait ErrorHandler: Send + Sync {
    fn handle_error(&self, listener: &ListenerSnapshot, error: EvalError) -> EvalResult<Value>;
}

impl<F> ErrorHandler for F
where
    F: Fn(&ListenerSnapshot, EvalError) -> EvalResult<Value> + Send + Sync,
{
    fn handle_error(&self, listener: &ListenerSnapshot, error: EvalError) -> EvalResult<Value> {
        self(listener, error)
    }
}

/// Takes over dispatch completely. When configured, the registry neither
/// removes one-shot listeners nor calls the evaluator; the handler decides.
pub trait DispatchHandler: Send + Sync {
    fn handle(
        &self,
        registry: &ListenerRegistry,
        listener: &ListenerSnapshot,
        payload: HostValue,
        is_final: bool,
    ) -> ListenerResult<Option<Value>>;
}

impl<F> DispatchHandler for F
where
    F: Fn(&ListenerRegistry, &ListenerSnapshot, HostValue, bool) -> ListenerResult<Option<Value>>
        + Send
        + Sync,
{
    fn handle(
        &self,
        registry: &ListenerRegistry,
        listener: &ListenerSnapshot,
        payload: HostValue,
        is_final: bool,
    ) -> ListenerResult<Option<Value>> {
        self(registry, listener, payload, is_final)
    }
}
