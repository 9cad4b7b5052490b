//! # Directives
//!
//! A directive is the host-side half of one named asynchronous capability
//! (a file read, an interval timer, a socket subscription...). When scripted
//! code registers a listener, the registry invokes the resolved directive once
//! with:
//!
//! * the listener's options, exactly as scripted code passed them,
//! * a [`Dispatcher`] bound to the new listener,
//! * the listener id,
//! * the registry itself (for directives that register or cancel listeners).
//!
//! The directive must not block. It schedules its work and returns an optional
//! [`CancelHandle`]; the registry runs the handle when the listener is
//! cancelled or removed. Results flow back by calling the dispatcher zero or
//! more times.

use std::{collections::HashMap, fmt, sync::Arc};

use thiserror::Error;

use crate::{
    coercion::HostValue,
    registry::{Dispatcher, ListenerId, ListenerRegistry},
    value::Value,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectiveError {
    #[error("Invalid directive options: expected {expected}, got {got}")]
    InvalidOptions { expected: String, got: String },
    #[error("Directive setup failed: {0}")]
    Setup(String),
    #[error("Cancellation failed: {0}")]
    Cancel(String),
}

impl DirectiveError {
    pub fn invalid_options(expected: &str, got: &Value) -> Self {
        DirectiveError::InvalidOptions {
            expected: expected.to_string(),
            got: got.type_name().to_string(),
        }
    }
}

pub type DirectiveResult<T> = Result<T, DirectiveError>;

pub trait Directive: Send + Sync {
    fn invoke(
        &self,
        options: &Value,
        dispatcher: Dispatcher,
        id: ListenerId,
        registry: &ListenerRegistry,
    ) -> DirectiveResult<Option<CancelHandle>>;
}

impl<F> Directive for F
where
    F: Fn(&Value, Dispatcher, ListenerId, &ListenerRegistry) -> DirectiveResult<Option<CancelHandle>>
        + Send
        + Sync,
{
    fn invoke(
        &self,
        options: &Value,
        dispatcher: Dispatcher,
        id: ListenerId,
        registry: &ListenerRegistry,
    ) -> DirectiveResult<Option<CancelHandle>> {
        self(options, dispatcher, id, registry)
    }
}

type CancelFn = Box<dyn FnOnce() -> DirectiveResult<()> + Send + Sync>;

/// Stops the host-side work behind one listener. Runs at most once.
pub struct CancelHandle(CancelFn);

impl CancelHandle {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> DirectiveResult<()> + Send + Sync + 'static,
    {
        Self(Box::new(f))
    }

    pub fn infallible<F>(f: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self::new(move || {
            f();
            Ok(())
        })
    }

    pub fn cancel(self) -> DirectiveResult<()> {
        (self.0)()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CancelHandle(<function>)")
    }
}

impl From<tokio::task::AbortHandle> for CancelHandle {
    fn from(handle: tokio::task::AbortHandle) -> Self {
        CancelHandle::infallible(move || handle.abort())
    }
}

/// Cancelling aborts the spawned task; the join handle itself is detached.
impl<T: Send + 'static> From<tokio::task::JoinHandle<T>> for CancelHandle {
    fn from(handle: tokio::task::JoinHandle<T>) -> Self {
        CancelHandle::from(handle.abort_handle())
    }
}

/// What a directive name resolves to.
#[derive(Clone)]
pub enum DirectiveEntry {
    Directive(Arc<dyn Directive>),
    /// Registrations under this name are accepted and silently dropped
    Ignore,
    /// Something that is not a directive was installed under this name
    NotCallable(HostValue),
}

impl DirectiveEntry {
    pub fn directive<F>(f: F) -> Self
    where
        F: Fn(&Value, Dispatcher, ListenerId, &ListenerRegistry) -> DirectiveResult<Option<CancelHandle>>
            + Send
            + Sync
            + 'static,
    {
        DirectiveEntry::Directive(Arc::new(f))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, DirectiveEntry::Directive(_))
    }
}

/// `false` marks a name as ignored; `true` is installed as a plain value.
impl From<bool> for DirectiveEntry {
    fn from(value: bool) -> Self {
        if value {
            DirectiveEntry::NotCallable(HostValue::Boolean(true))
        } else {
            DirectiveEntry::Ignore
        }
    }
}

impl From<Arc<dyn Directive>> for DirectiveEntry {
    fn from(directive: Arc<dyn Directive>) -> Self {
        DirectiveEntry::Directive(directive)
    }
}

impl fmt::Debug for DirectiveEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveEntry::Directive(_) => write!(f, "Directive(<function>)"),
            DirectiveEntry::Ignore => write!(f, "Ignore"),
            DirectiveEntry::NotCallable(value) => write!(f, "NotCallable({:?})", value),
        }
    }
}

/// A named bundle of directives, installed into a resolver in one call.
#[derive(Clone, Debug, Default)]
pub struct DirectiveLibrary {
    name: String,
    directives: HashMap<String, DirectiveEntry>,
}

impl DirectiveLibrary {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            directives: HashMap::new(),
        }
    }

    pub fn with(mut self, name: &str, entry: DirectiveEntry) -> Self {
        self.directives.insert(name.to_string(), entry);
        self
    }

    pub fn with_directive<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&Value, Dispatcher, ListenerId, &ListenerRegistry) -> DirectiveResult<Option<CancelHandle>>
            + Send
            + Sync
            + 'static,
    {
        self.with(name, DirectiveEntry::directive(f))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directives(&self) -> &HashMap<String, DirectiveEntry> {
        &self.directives
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

/// Anything that can be flattened into a name → directive mapping.
pub trait IntoDirectives {
    fn into_directives(self) -> HashMap<String, DirectiveEntry>;
}

impl IntoDirectives for DirectiveLibrary {
    fn into_directives(self) -> HashMap<String, DirectiveEntry> {
        self.directives
    }
}

impl IntoDirectives for HashMap<String, DirectiveEntry> {
    fn into_directives(self) -> HashMap<String, DirectiveEntry> {
        self
    }
}

impl IntoDirectives for Vec<(String, DirectiveEntry)> {
    fn into_directives(self) -> HashMap<String, DirectiveEntry> {
        self.into_iter().collect()
    }
}

pub fn require_number(options: &Value) -> DirectiveResult<f64> {
    match options {
        Value::Number(n) => Ok(*n),
        other => Err(DirectiveError::invalid_options("number", other)),
    }
}

pub fn require_string(options: &Value) -> DirectiveResult<&str> {
    match options {
        Value::String(s) => Ok(&**s),
        other => Err(DirectiveError::invalid_options("string", other)),
    }
}
