//! # Evaluator Binding Surface
//!
//! Native procedures installed into the evaluator under the `async-io`
//! library:
//!
//! | name        | arguments                  | returns                        |
//! |-------------|----------------------------|--------------------------------|
//! | `io-on`     | `name options [callback]`  | listener id as a symbol        |
//! | `io-once`   | `name options [callback]`  | listener id as a symbol        |
//! | `io-exec`   | `name options [callback]`  | listener id as a symbol        |
//! | `io-cancel` | `listener`                 | `#t` if a listener was removed |
//!
//! Ignored registrations return the symbol `-1`.

use std::{fmt, sync::Arc};

use thiserror::Error;
use tracing::debug;

use crate::{
    evaluator::Frame,
    registry::{ListenerError, ListenerId, ListenerRegistry, Registration},
    value::Value,
};

pub const LIBRARY_NAME: &str = "async-io";

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("{procedure}: expected {expected} argument(s), got {got}")]
    Arity {
        procedure: String,
        expected: String,
        got: usize,
    },
    #[error("{procedure}: invalid argument: {message}")]
    InvalidArgument { procedure: String, message: String },
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

pub type BindingResult<T> = Result<T, BindingError>;

type NativeFn = Arc<dyn Fn(&Value, Option<&Frame>) -> BindingResult<Value> + Send + Sync>;

/// A host procedure the evaluator can install in its global environment.
#[derive(Clone)]
pub struct NativeProcedure {
    pub name: String,
    pub params: Vec<String>,
    pub library: String,
    handler: NativeFn,
}

impl NativeProcedure {
    fn new<F>(name: &str, params: &[&str], handler: F) -> Self
    where
        F: Fn(&Value, Option<&Frame>) -> BindingResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            library: LIBRARY_NAME.to_string(),
            handler: Arc::new(handler),
        }
    }

    /// Calls the procedure with an argument list.
    pub fn call(&self, arguments: &Value, frame: Option<&Frame>) -> BindingResult<Value> {
        (self.handler)(arguments, frame)
    }
}

impl fmt::Debug for NativeProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeProcedure")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("library", &self.library)
            .finish()
    }
}

pub struct AsyncIoBindings {
    registry: ListenerRegistry,
}

impl AsyncIoBindings {
    pub fn new(registry: ListenerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    pub fn procedures(&self) -> Vec<NativeProcedure> {
        vec![
            self.register_procedure("io-on", false),
            self.register_procedure("io-once", true),
            self.register_procedure("io-exec", true),
            self.cancel_procedure(),
        ]
    }

    /// Looks up one procedure by name.
    pub fn procedure(&self, name: &str) -> Option<NativeProcedure> {
        self.procedures().into_iter().find(|p| p.name == name)
    }

    fn register_procedure(&self, name: &'static str, once: bool) -> NativeProcedure {
        let registry = self.registry.clone();
        NativeProcedure::new(
            name,
            &["name", "options", "callback"],
            move |arguments, frame| {
                let count = arguments.iter().count();
                if !arguments.is_list() || !(1..=3).contains(&count) {
                    return Err(BindingError::Arity {
                        procedure: name.to_string(),
                        expected: "1 to 3".to_string(),
                        got: count,
                    });
                }
                let registration = if once {
                    registry.once(arguments, frame)?
                } else {
                    registry.listen(arguments, frame)?
                };
                if let Registration::Ignored { name: directive } = &registration {
                    debug!("{} ignored for {}", name, directive);
                }
                Ok(Value::symbol(&registration.id().to_string()))
            },
        )
    }

    fn cancel_procedure(&self) -> NativeProcedure {
        let registry = self.registry.clone();
        NativeProcedure::new("io-cancel", &["listener"], move |arguments, _| {
            let items = arguments.to_vec().unwrap_or_default();
            let [listener] = items.as_slice() else {
                return Err(BindingError::Arity {
                    procedure: "io-cancel".to_string(),
                    expected: "1".to_string(),
                    got: items.len(),
                });
            };
            let id = parse_listener_id(listener)?;
            Ok(Value::Boolean(registry.cancel(id)))
        })
    }
}

fn parse_listener_id(value: &Value) -> BindingResult<ListenerId> {
    let invalid = |message: String| BindingError::InvalidArgument {
        procedure: "io-cancel".to_string(),
        message,
    };
    match value {
        Value::Symbol(s) => s
            .parse::<ListenerId>()
            .map_err(|_| invalid(format!("not a listener id: {}", s))),
        Value::Number(n) if n.fract() == 0.0 => Ok(*n as ListenerId),
        other => Err(invalid(format!(
            "expected symbol, got {}",
            other.type_name()
        ))),
    }
}
