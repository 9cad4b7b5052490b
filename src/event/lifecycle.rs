//! # Lifecycle Bus
//!
//! Broadcasts listener lifecycle transitions to any number of observers
//! (debug consoles, tests, session supervisors). Publishing never blocks and
//! never fails a registry operation: with no subscribers the event is dropped.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::registry::ListenerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum RemovalReason {
    /// `cancel` was called
    Cancelled,
    /// One-shot listener fired, or the host signalled its final delivery
    Fired,
    /// The directive rejected the registration
    SetupFailed,
    /// `cancel_all` tore the registry down
    Teardown,
}

#[derive(Debug, Clone, PartialEq, strum::Display)]
pub enum ListenerEventType {
    Registered {
        id: ListenerId,
        name: String,
        once: bool,
    },
    Ignored {
        name: String,
    },
    Dispatched {
        id: ListenerId,
        is_final: bool,
    },
    Removed {
        id: ListenerId,
        reason: RemovalReason,
    },
    CallbackFailed {
        id: ListenerId,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListenerEvent {
    pub event_type: ListenerEventType,
    pub timestamp: DateTime<Utc>,
}

impl ListenerEvent {
    pub fn new(event_type: ListenerEventType) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
        }
    }
}

pub struct LifecycleBus {
    sender: broadcast::Sender<ListenerEvent>,
    capacity: usize,
}

impl LifecycleBus {
    pub fn new(capacity: usize) -> Self {
        // broadcast::channel panics on zero capacity
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    pub fn subscribe(&self) -> LifecycleReceiver {
        LifecycleReceiver::new(self.sender.subscribe())
    }

    pub fn publish(&self, event_type: ListenerEventType) {
        let event = ListenerEvent::new(event_type);
        match &event.event_type {
            ListenerEventType::Dispatched { .. } => trace!("Publishing {:?}", event),
            _ => debug!("Publishing {:?}", event),
        }
        // 購読者がいない場合は破棄
        let _ = self.sender.send(event);
    }

    pub fn subscribers_size(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

pub struct LifecycleReceiver {
    pub receiver: broadcast::Receiver<ListenerEvent>,
}

impl LifecycleReceiver {
    pub fn new(receiver: broadcast::Receiver<ListenerEvent>) -> Self {
        Self { receiver }
    }

    /// Receives the next event. On lag the receiver resubscribes and reports
    /// how many events were skipped.
    pub async fn recv(&mut self) -> LifecycleResult<ListenerEvent> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                self.receiver = self.receiver.resubscribe();
                Err(LifecycleError::Lagged { count: n })
            }
            Err(e) => Err(LifecycleError::ReceiveFailed {
                message: e.to_string(),
            }),
        }
    }

    /// Non-blocking variant for synchronous hosts. `Ok(None)` when no event
    /// is pending.
    pub fn try_recv(&mut self) -> LifecycleResult<Option<ListenerEvent>> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                self.receiver = self.receiver.resubscribe();
                Err(LifecycleError::Lagged { count: n })
            }
            Err(e) => Err(LifecycleError::ReceiveFailed {
                message: e.to_string(),
            }),
        }
    }

    /// Drains every pending event.
    pub fn drain(&mut self) -> Vec<ListenerEvent> {
        let mut events = vec![];
        while let Ok(Some(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum LifecycleError {
    #[error("Lifecycle event lagged: {count}")]
    Lagged { count: u64 },
    #[error("Lifecycle event receive failed: {message}")]
    ReceiveFailed { message: String },
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
