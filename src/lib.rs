//! # kairei-io: Asynchronous Listener Registry
//!
//! Bridges an embedded symbolic-expression evaluator to host events that
//! complete later: timers, file reads, socket callbacks.
//!
//! ## Building Blocks
//!
//! - Evaluator values ([`value`]) and the evaluator seam ([`evaluator`])
//! - Host value coercion ([`coercion`])
//! - Directives and their resolver ([`directive`], [`resolver`])
//! - The listener registry ([`registry`]) and its lifecycle events ([`event`])
//! - Native procedures for scripted code ([`bindings`])
//!
//! ## Flow
//!
//! ```text
//! (io-on 'timer 100 callback)
//!     → ListenerRegistry::listen → Resolver → Directive::invoke
//! host fires
//!     → Dispatcher::dispatch → coerce → Evaluator::evaluate((callback 'arg ...))
//! ```
//!
//! Configuration lives in [`config`], errors are aggregated in [`error`].

pub mod bindings;
pub mod coercion;
pub mod config;
pub mod directive;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod registry;
pub mod resolver;
pub mod value;

// Re-exports
pub use bindings::{AsyncIoBindings, NativeProcedure};
pub use coercion::{coerce, HostValue};
pub use config::RegistryConfig;
pub use directive::{CancelHandle, Directive, DirectiveEntry, DirectiveLibrary};
pub use error::*;
pub use evaluator::{Evaluator, Frame};
pub use event::lifecycle::{ListenerEvent, ListenerEventType, RemovalReason};
pub use registry::{
    CancelReport, Dispatcher, ListenerError, ListenerId, ListenerRegistry, Registration,
};
pub use resolver::{DefaultResolver, Resolver};
pub use value::{Procedure, Value};
