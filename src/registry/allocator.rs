//! Listener id allocation strategies.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

use crate::{evaluator::Frame, value::Value};

use super::listener::ListenerId;

/// Everything known about a registration at the moment its id is allocated.
#[derive(Debug)]
pub struct AllocationContext<'a> {
    pub frame: Option<&'a Frame>,
    pub name: &'a str,
    pub request: &'a Value,
    pub callback: Option<&'a Value>,
}

pub trait IdAllocator: Send + Sync {
    fn allocate(&self, context: &AllocationContext<'_>) -> ListenerId;
}

impl<F> IdAllocator for F
where
    F: Fn(&AllocationContext<'_>) -> ListenerId + Send + Sync,
{
    fn allocate(&self, context: &AllocationContext<'_>) -> ListenerId {
        self(context)
    }
}

/// Per-registry monotonically increasing counter.
#[derive(Debug)]
pub struct SequentialIdAllocator {
    next: AtomicI64,
}

impl SequentialIdAllocator {
    pub fn new(first: ListenerId) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl Default for SequentialIdAllocator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl IdAllocator for SequentialIdAllocator {
    fn allocate(&self, _context: &AllocationContext<'_>) -> ListenerId {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

const SESSION_MASK: u32 = 0x7fff_ffff;

/// Namespaces ids per evaluator session: the session number occupies bits
/// 32..62 and a per-session counter the low 32 bits. Registrations without a
/// frame are counted under session 0.
///
/// Only the low 31 bits of the session number are used, so ids are never
/// negative and never collide with [`INVALID_LISTENER_ID`](super::INVALID_LISTENER_ID).
/// Sessions that differ only in bit 31 share a namespace.
#[derive(Debug, Default)]
pub struct FrameScopedIdAllocator {
    counters: DashMap<u32, u32>,
}

impl FrameScopedIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_of(id: ListenerId) -> u32 {
        ((id >> 32) as u32) & SESSION_MASK
    }
}

impl IdAllocator for FrameScopedIdAllocator {
    fn allocate(&self, context: &AllocationContext<'_>) -> ListenerId {
        let session = context.frame.map(|frame| frame.session).unwrap_or(0) & SESSION_MASK;
        let mut counter = self.counters.entry(session).or_insert(0);
        let local = *counter;
        *counter = local.wrapping_add(1);
        ((session as i64) << 32) | local as i64
    }
}
