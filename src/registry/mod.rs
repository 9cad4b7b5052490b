//! # Listener Registry
//!
//! Tracks every listener created by scripted code and routes host results back
//! into the evaluator.
//!
//! ## Registration
//!
//! `listen`/`once` take a request list `(event-name options callback?)`,
//! resolve the event name to a directive, allocate an id, store the listener
//! and finally invoke the directive. The listener is stored *before* the
//! directive runs, so a directive may dispatch synchronously from inside its
//! setup.
//!
//! ## Dispatch
//!
//! Directives call back through their [`Dispatcher`]. A dispatch for an id that
//! is no longer registered is silently dropped: the host may fire after the
//! listener was cancelled. One-shot listeners (and final deliveries) are
//! removed *before* the callback runs, so the callback never observes its own
//! listener as active and cannot cancel it twice.
//!
//! ## Re-entrancy
//!
//! No map guard is held while a directive, a cancel handle, a dispatch handler
//! or the evaluator runs. All of them may call back into the registry.

pub mod allocator;
pub mod handlers;
pub mod listener;
pub mod stats;

use std::{collections::HashSet, fmt, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};
use thiserror::Error;
use tracing::{debug, error, instrument, trace, warn};

use crate::{
    coercion::{coerce_arguments, CoercionError, HostValue},
    config::RegistryConfig,
    directive::{CancelHandle, DirectiveEntry, DirectiveError},
    evaluator::{EvalError, Evaluator, Frame},
    event::lifecycle::{LifecycleBus, LifecycleReceiver, ListenerEventType, RemovalReason},
    resolver::{DefaultResolver, ResolveError, Resolver},
    value::Value,
};

pub use allocator::{AllocationContext, FrameScopedIdAllocator, IdAllocator, SequentialIdAllocator};
pub use handlers::{DispatchHandler, ErrorHandler};
pub use listener::{Listener, ListenerId, ListenerSnapshot, Registration, INVALID_LISTENER_ID};
pub use stats::{RegistryStats, StatsSnapshot};

/// Scripted registration request, split into its parts.
struct ListenRequest<'a> {
    name: &'a Value,
    options: Value,
    callback: Option<Value>,
}

impl<'a> ListenRequest<'a> {
    fn parse(request: &'a Value) -> ListenerResult<Self> {
        if !request.is_list() {
            return Err(ListenerError::InvalidRequest(format!(
                "expected a list, got {}",
                request.type_name()
            )));
        }
        let mut items = request.iter();
        let name = items
            .next()
            .ok_or_else(|| ListenerError::InvalidRequest("missing event name".to_string()))?;
        let options = items.next().cloned().unwrap_or(Value::Nil);
        let callback = items.next().filter(|callback| !callback.is_nil()).cloned();
        if let Some(callback) = &callback {
            if !callback.is_procedure() {
                return Err(ListenerError::InvalidCallback {
                    got: callback.type_name().to_string(),
                });
            }
        }
        Ok(Self {
            name,
            options,
            callback,
        })
    }
}

/// Result of [`ListenerRegistry::cancel_all`].
#[derive(Debug, Default)]
pub struct CancelReport {
    /// Ids removed from the registry
    pub cancelled: Vec<ListenerId>,
    /// Cancel handles that reported an error; their listeners are removed too
    pub failures: Vec<(ListenerId, DirectiveError)>,
}

impl CancelReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone)]
pub struct ListenerRegistry {
    evaluator: Arc<dyn Evaluator>,
    resolver: Arc<dyn Resolver>,
    listeners: Arc<DashMap<ListenerId, Listener>>,
    allocator: Arc<dyn IdAllocator>,
    dispatch_handler: Option<Arc<dyn DispatchHandler>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    ignored: Arc<HashSet<String>>,
    config: Arc<RegistryConfig>,
    lifecycle: Arc<LifecycleBus>,
    stats: Arc<RegistryStats>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.len())
            .field("config", &self.config)
            .finish()
    }
}

impl ListenerRegistry {
    pub fn new(evaluator: Arc<dyn Evaluator>, resolver: Arc<dyn Resolver>) -> Self {
        Self::builder(evaluator).resolver(resolver).build()
    }

    pub fn builder(evaluator: Arc<dyn Evaluator>) -> ListenerRegistryBuilder {
        ListenerRegistryBuilder::new(evaluator)
    }

    /// Registers a repeating listener.
    #[instrument(level = "debug", skip(self, request))]
    pub fn listen(&self, request: &Value, frame: Option<&Frame>) -> ListenerResult<Registration> {
        self.register(request, frame, false)
    }

    /// Registers a listener that is removed the first time it fires.
    #[instrument(level = "debug", skip(self, request))]
    pub fn once(&self, request: &Value, frame: Option<&Frame>) -> ListenerResult<Registration> {
        self.register(request, frame, true)
    }

    fn register(
        &self,
        request: &Value,
        frame: Option<&Frame>,
        once: bool,
    ) -> ListenerResult<Registration> {
        let request_parts = ListenRequest::parse(request)?;
        let name = request_parts
            .name
            .as_key()
            .ok_or_else(|| ResolveError::InvalidArgument {
                got: request_parts.name.type_name().to_string(),
            })?
            .to_string();

        let entry = if self.ignored.contains(&name) {
            Some(DirectiveEntry::Ignore)
        } else {
            self.resolver.resolve(request_parts.name)?
        };
        let directive = match entry {
            None => return Err(ListenerError::UnknownDirective { name }),
            Some(DirectiveEntry::Ignore) => {
                debug!("Ignoring registration for {}", name);
                self.stats.record_ignored();
                self.lifecycle
                    .publish(ListenerEventType::Ignored { name: name.clone() });
                return Ok(Registration::Ignored { name });
            }
            Some(DirectiveEntry::NotCallable(value)) => {
                debug!("Directive {} is not callable: {:?}", name, value);
                return Err(ListenerError::InvalidDirective { name });
            }
            Some(DirectiveEntry::Directive(directive)) => directive,
        };

        let id = self.allocator.allocate(&AllocationContext {
            frame,
            name: &name,
            request,
            callback: request_parts.callback.as_ref(),
        });
        if id == INVALID_LISTENER_ID {
            return Err(ListenerError::InvalidId(id));
        }

        let listener = Listener::new(
            id,
            &name,
            request_parts.options.clone(),
            request_parts.callback,
            once,
        );
        let snapshot = listener.snapshot();
        match self.listeners.entry(id) {
            Entry::Occupied(_) => return Err(ListenerError::InvalidId(id)),
            Entry::Vacant(slot) => {
                slot.insert(listener);
            }
        }
        self.stats.record_registered();
        self.lifecycle.publish(ListenerEventType::Registered {
            id,
            name: name.clone(),
            once,
        });
        debug!("Listener {} registered for {} (once: {})", id, name, once);

        let dispatcher = Dispatcher::new(self.clone(), id);
        match directive.invoke(&request_parts.options, dispatcher, id, self) {
            Ok(handle) => {
                if let Some(handle) = handle {
                    self.attach_cancel_handle(id, handle);
                }
                Ok(Registration::Active(ListenerSnapshot {
                    cancellable: self.get(id).map(|l| l.cancellable).unwrap_or(false),
                    ..snapshot
                }))
            }
            Err(source) => {
                warn!("Directive {} rejected listener {}: {}", name, id, source);
                // The directive may already have fired or cancelled it
                if let Some(listener) = self.take(id, RemovalReason::SetupFailed) {
                    if let Err(e) = Self::stop(listener) {
                        warn!("Cancel handle of listener {} failed: {}", id, e);
                    }
                }
                Err(ListenerError::Directive { name, source })
            }
        }
    }

    fn attach_cancel_handle(&self, id: ListenerId, handle: CancelHandle) {
        if let Some(mut listener) = self.listeners.get_mut(&id) {
            listener.cancel_handle = Some(handle);
            return;
        }
        // Removed while the directive was still setting up (a synchronous
        // one-shot delivery or a cancel from inside the directive).
        trace!("Listener {} gone before setup finished, cancelling", id);
        if let Err(e) = handle.cancel() {
            warn!("Cancel handle of listener {} failed: {}", id, e);
        }
    }

    /// Removes the listener without running its cancel handle.
    fn take(&self, id: ListenerId, reason: RemovalReason) -> Option<Listener> {
        let (_, listener) = self.listeners.remove(&id)?;
        self.record_removal(id, reason);
        Some(listener)
    }

    fn record_removal(&self, id: ListenerId, reason: RemovalReason) {
        self.stats.record_removed();
        self.lifecycle
            .publish(ListenerEventType::Removed { id, reason });
        debug!("Listener {} removed ({})", id, reason);
    }

    fn stop(mut listener: Listener) -> Result<(), DirectiveError> {
        match listener.cancel_handle.take() {
            Some(handle) => handle.cancel(),
            // Directive may not support cancelling at all
            None => Ok(()),
        }
    }

    /// Cancels a listener. Returns `false` if `id` is not registered.
    #[instrument(level = "debug", skip(self))]
    pub fn cancel(&self, id: ListenerId) -> bool {
        match self.take(id, RemovalReason::Cancelled) {
            Some(listener) => {
                if let Err(e) = Self::stop(listener) {
                    warn!("Cancel handle of listener {} failed: {}", id, e);
                }
                true
            }
            None => false,
        }
    }

    /// Cancels every listener registered when the call starts. Handle
    /// failures are collected and never interrupt the teardown.
    #[instrument(level = "debug", skip(self))]
    pub fn cancel_all(&self) -> CancelReport {
        let ids: Vec<ListenerId> = self.listeners.iter().map(|entry| *entry.key()).collect();
        let mut report = CancelReport::default();
        for id in ids {
            let Some(listener) = self.take(id, RemovalReason::Teardown) else {
                continue;
            };
            report.cancelled.push(id);
            if let Err(e) = Self::stop(listener) {
                warn!("Cancel handle of listener {} failed: {}", id, e);
                report.failures.push((id, e));
            }
        }
        report
    }

    /// Delivers a host result to a listener.
    ///
    /// Returns `Ok(None)` when the listener is gone or has no callback, and
    /// the callback's value otherwise. Errors raised by the callback are passed
    /// to the error handler when one is configured and returned otherwise; the
    /// caller owns the decision of what an escaped error means for the host.
    #[instrument(level = "debug", skip(self, payload))]
    pub fn dispatch(
        &self,
        id: ListenerId,
        payload: HostValue,
        is_final: bool,
    ) -> ListenerResult<Option<Value>> {
        let Some(listener) = self.get(id) else {
            trace!("Dropping dispatch for inactive listener {}", id);
            return Ok(None);
        };
        if let Some(handler) = &self.dispatch_handler {
            self.record_dispatch(id, is_final);
            return handler.handle(self, &listener, payload, is_final);
        }

        // Only the dispatch that actually removes the listener may run it
        let fired = if listener.once || is_final {
            match self.listeners.remove(&id) {
                Some((_, removed)) => Some(removed),
                None => return Ok(None),
            }
        } else {
            None
        };
        self.record_dispatch(id, is_final);
        if let Some(removed) = fired {
            self.record_removal(id, RemovalReason::Fired);
            if let Err(e) = Self::stop(removed) {
                warn!("Cancel handle of listener {} failed: {}", id, e);
            }
        }

        let arguments = coerce_arguments(payload, self.config.quote_arguments)?;
        let Some(callback) = listener.callback.clone() else {
            return Ok(None);
        };
        let expression = Value::cons(callback, Value::list(arguments));
        trace!("Evaluating {}", expression);

        match self.evaluator.evaluate(&expression) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.stats.record_callback_error();
                self.lifecycle.publish(ListenerEventType::CallbackFailed {
                    id,
                    message: e.to_string(),
                });
                match &self.error_handler {
                    Some(handler) => handler
                        .handle_error(&listener, e)
                        .map(Some)
                        .map_err(|source| ListenerError::Evaluation { id, source }),
                    None => {
                        error!("Callback of listener {} failed: {}", id, e);
                        Err(ListenerError::Evaluation { id, source: e })
                    }
                }
            }
        }
    }

    fn record_dispatch(&self, id: ListenerId, is_final: bool) {
        self.stats.record_dispatched();
        self.lifecycle
            .publish(ListenerEventType::Dispatched { id, is_final });
    }

    pub fn get(&self, id: ListenerId) -> Option<ListenerSnapshot> {
        self.listeners.get(&id).map(|listener| listener.snapshot())
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.listeners.contains_key(&id)
    }

    pub fn listener_ids(&self) -> Vec<ListenerId> {
        let mut ids: Vec<ListenerId> = self.listeners.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn subscribe(&self) -> LifecycleReceiver {
        self.lifecycle.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

/// Handed to a directive; routes host results to one listener.
#[derive(Clone)]
pub struct Dispatcher {
    registry: ListenerRegistry,
    id: ListenerId,
}

impl Dispatcher {
    pub fn new(registry: ListenerRegistry, id: ListenerId) -> Self {
        Self { registry, id }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.registry.contains(self.id)
    }

    pub fn dispatch<P: Into<HostValue>>(&self, payload: P) -> ListenerResult<Option<Value>> {
        self.registry.dispatch(self.id, payload.into(), false)
    }

    /// Delivers the last result; the listener is removed first.
    pub fn dispatch_final<P: Into<HostValue>>(&self, payload: P) -> ListenerResult<Option<Value>> {
        self.registry.dispatch(self.id, payload.into(), true)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("id", &self.id).finish()
    }
}

pub struct ListenerRegistryBuilder {
    evaluator: Arc<dyn Evaluator>,
    resolver: Option<Arc<dyn Resolver>>,
    allocator: Option<Arc<dyn IdAllocator>>,
    dispatch_handler: Option<Arc<dyn DispatchHandler>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    config: RegistryConfig,
}

impl ListenerRegistryBuilder {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            resolver: None,
            allocator: None,
            dispatch_handler: None,
            error_handler: None,
            config: RegistryConfig::default(),
        }
    }

    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id_allocator<A: IdAllocator + 'static>(mut self, allocator: A) -> Self {
        self.allocator = Some(Arc::new(allocator));
        self
    }

    pub fn dispatch_handler<H: DispatchHandler + 'static>(mut self, handler: H) -> Self {
        self.dispatch_handler = Some(Arc::new(handler));
        self
    }

    pub fn error_handler<H: ErrorHandler + 'static>(mut self, handler: H) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> ListenerRegistry {
        let allocator = self.allocator.unwrap_or_else(|| {
            Arc::new(SequentialIdAllocator::new(self.config.first_listener_id))
        });
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(DefaultResolver::new()));
        ListenerRegistry {
            evaluator: self.evaluator,
            resolver,
            listeners: Arc::new(DashMap::new()),
            allocator,
            dispatch_handler: self.dispatch_handler,
            error_handler: self.error_handler,
            ignored: Arc::new(self.config.ignored_directives.iter().cloned().collect()),
            lifecycle: Arc::new(LifecycleBus::new(self.config.lifecycle_buffer_size)),
            stats: Arc::new(RegistryStats::default()),
            config: Arc::new(self.config),
        }
    }
}

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid callback: expected procedure, got {got}")]
    InvalidCallback { got: String },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("Unknown IO directive: {name}")]
    UnknownDirective { name: String },
    #[error("Directive must be a function: {name}")]
    InvalidDirective { name: String },
    #[error("Listener id {0} is invalid or already in use")]
    InvalidId(ListenerId),
    #[error("Directive {name} failed: {source}")]
    Directive {
        name: String,
        #[source]
        source: DirectiveError,
    },
    #[error(transparent)]
    Coercion(#[from] CoercionError),
    #[error("Callback of listener {id} failed: {source}")]
    Evaluation {
        id: ListenerId,
        #[source]
        source: EvalError,
    },
    #[error("Dispatch handler failed: {0}")]
    Handler(String),
}

pub type ListenerResult<T> = Result<T, ListenerError>;
