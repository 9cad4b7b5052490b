//! # Directive Resolver
//!
//! Maps the event names used by scripted code onto host directives. The
//! resolver is the seam between scripted names and host functionality, so the
//! name is validated before any lookup takes place.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::{
    directive::{DirectiveEntry, IntoDirectives},
    value::Value,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Invalid argument: event name must be a string or symbol, got {got}")]
    InvalidArgument { got: String },
}

pub type ResolveResult<T> = Result<T, ResolveError>;

pub trait Resolver: Send + Sync {
    /// Looks up the entry for a scripted event name. `Ok(None)` means the name
    /// is unknown.
    fn resolve(&self, name: &Value) -> ResolveResult<Option<DirectiveEntry>>;
}

/// Map-backed resolver, pre-populated through [`DefaultResolver::add_library`].
#[derive(Clone, Default)]
pub struct DefaultResolver {
    directives: Arc<DashMap<String, DirectiveEntry>>,
}

impl DefaultResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library<L: IntoDirectives>(library: L) -> Self {
        let resolver = Self::new();
        resolver.add_library(library);
        resolver
    }

    /// Installs or replaces the entry for `name`.
    pub fn add(&self, name: &str, entry: DirectiveEntry) {
        debug!("Adding directive: {} ({:?})", name, entry);
        self.directives.insert(name.to_string(), entry);
    }

    /// Installs every entry of the bundle, overwriting existing names.
    pub fn add_library<L: IntoDirectives>(&self, library: L) {
        for (name, entry) in library.into_directives() {
            self.add(&name, entry);
        }
    }

    pub fn remove(&self, name: &str) -> Option<DirectiveEntry> {
        self.directives.remove(name).map(|(_, entry)| entry)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .directives
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

impl Resolver for DefaultResolver {
    fn resolve(&self, name: &Value) -> ResolveResult<Option<DirectiveEntry>> {
        let key = name.as_key().ok_or_else(|| ResolveError::InvalidArgument {
            got: name.type_name().to_string(),
        })?;
        Ok(self.directives.get(key).map(|entry| entry.value().clone()))
    }
}
