mod bindings_test;
mod timer_test;

use std::sync::{Arc, Mutex, OnceLock};

use kairei_io::{
    directive::DirectiveLibrary,
    evaluator::{EvalResult, Evaluator},
    DefaultResolver, ListenerRegistry, Procedure, Value,
};

type Hook = Box<dyn Fn(&Value) -> EvalResult<Value> + Send + Sync>;

/// Evaluator double that records every application it receives.
#[derive(Default)]
pub struct RecordingEvaluator {
    evaluated: Mutex<Vec<Value>>,
    hook: Option<Hook>,
}

impl RecordingEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook<F>(hook: F) -> Self
    where
        F: Fn(&Value) -> EvalResult<Value> + Send + Sync + 'static,
    {
        Self {
            evaluated: Mutex::new(vec![]),
            hook: Some(Box::new(hook)),
        }
    }

    pub fn evaluated(&self) -> Vec<Value> {
        self.evaluated.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.evaluated.lock().unwrap().len()
    }
}

impl Evaluator for RecordingEvaluator {
    fn evaluate(&self, expression: &Value) -> EvalResult<Value> {
        self.evaluated.lock().unwrap().push(expression.clone());
        match &self.hook {
            Some(hook) => hook(expression),
            None => Ok(Value::Nil),
        }
    }
}

pub fn callback(handle: u64) -> Value {
    Value::Procedure(Procedure::new(handle))
}

pub fn request(name: &str, options: Value, handle: u64) -> Value {
    Value::list([Value::symbol(name), options, callback(handle)])
}

pub fn setup(library: DirectiveLibrary) -> (Arc<RecordingEvaluator>, ListenerRegistry) {
    setup_with(RecordingEvaluator::new(), library)
}

pub fn setup_with(
    evaluator: RecordingEvaluator,
    library: DirectiveLibrary,
) -> (Arc<RecordingEvaluator>, ListenerRegistry) {
    let evaluator = Arc::new(evaluator);
    let registry = ListenerRegistry::new(
        evaluator.clone(),
        Arc::new(DefaultResolver::with_library(library)),
    );
    (evaluator, registry)
}

/// Slot for handing the registry to collaborators built before it.
pub type RegistrySlot = Arc<OnceLock<ListenerRegistry>>;
