//! # Listener Lifecycle Events
//!
//! Every state transition of a listener is published on a broadcast channel:
//!
//! ```text
//!            listen/once                 dispatch (once or final)
//! Pending ───────────────▶ Active ──────────────────────────────▶ Removed(Fired)
//!                            │
//!                            ├── cancel ────────────────────────▶ Removed(Cancelled)
//!                            └── cancel_all ────────────────────▶ Removed(Teardown)
//! ```
//!
//! Observers subscribe through [`crate::registry::ListenerRegistry::subscribe`].

pub mod lifecycle;
