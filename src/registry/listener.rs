use chrono::{DateTime, Utc};

use crate::{directive::CancelHandle, value::Value};

pub type ListenerId = i64;

/// Returned in place of an id when a registration is ignored.
pub const INVALID_LISTENER_ID: ListenerId = -1;

/// The registry's record of one subscription.
#[derive(Debug)]
pub struct Listener {
    pub id: ListenerId,
    pub name: String,
    pub options: Value,
    pub callback: Option<Value>,
    pub once: bool,
    pub registered_at: DateTime<Utc>,
    pub(crate) cancel_handle: Option<CancelHandle>,
}

impl Listener {
    pub fn new(
        id: ListenerId,
        name: &str,
        options: Value,
        callback: Option<Value>,
        once: bool,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            options,
            callback,
            once,
            registered_at: Utc::now(),
            cancel_handle: None,
        }
    }

    pub fn snapshot(&self) -> ListenerSnapshot {
        ListenerSnapshot {
            id: self.id,
            name: self.name.clone(),
            options: self.options.clone(),
            callback: self.callback.clone(),
            once: self.once,
            registered_at: self.registered_at,
            cancellable: self.cancel_handle.is_some(),
        }
    }
}

/// Read-only copy of a listener, safe to hold while the registry is mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerSnapshot {
    pub id: ListenerId,
    pub name: String,
    pub options: Value,
    pub callback: Option<Value>,
    pub once: bool,
    pub registered_at: DateTime<Utc>,
    /// Whether the directive supplied a cancellation handle
    pub cancellable: bool,
}

/// Outcome of a `listen`/`once` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    Active(ListenerSnapshot),
    /// The directive name is marked as ignored; nothing was stored
    Ignored { name: String },
}

impl Registration {
    pub fn id(&self) -> ListenerId {
        match self {
            Registration::Active(listener) => listener.id,
            Registration::Ignored { .. } => INVALID_LISTENER_ID,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Registration::Ignored { .. })
    }

    pub fn listener(&self) -> Option<&ListenerSnapshot> {
        match self {
            Registration::Active(listener) => Some(listener),
            Registration::Ignored { .. } => None,
        }
    }
}
