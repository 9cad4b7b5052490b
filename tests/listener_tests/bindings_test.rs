use std::sync::{Arc, Mutex};

use kairei_io::{
    bindings::BindingError,
    directive::DirectiveLibrary,
    evaluator::EvalError,
    registry::ListenerSnapshot,
    AsyncIoBindings, DefaultResolver, Dispatcher, ListenerError, ListenerRegistry, Value,
};
use pretty_assertions::assert_eq;

use super::{callback, RecordingEvaluator};

fn scripted_environment(
    evaluator: RecordingEvaluator,
) -> (Arc<RecordingEvaluator>, AsyncIoBindings, Arc<Mutex<Vec<Dispatcher>>>) {
    let dispatchers = Arc::new(Mutex::new(vec![]));
    let captured = dispatchers.clone();
    let library = DirectiveLibrary::new("host")
        .with_directive("socket", move |_, dispatcher, _, _| {
            captured.lock().unwrap().push(dispatcher);
            Ok(None)
        })
        .with("deprecated", false.into());
    let evaluator = Arc::new(evaluator);
    let registry = ListenerRegistry::builder(evaluator.clone())
        .resolver(Arc::new(DefaultResolver::with_library(library)))
        .error_handler(|_: &ListenerSnapshot, error: EvalError| match error {
            EvalError::Raised(value) => Ok(value),
            other => Err(other),
        })
        .build();
    (evaluator, AsyncIoBindings::new(registry), dispatchers)
}

fn call(bindings: &AsyncIoBindings, name: &str, arguments: Vec<Value>) -> Result<Value, BindingError> {
    bindings
        .procedure(name)
        .unwrap()
        .call(&Value::list(arguments), None)
}

#[test]
fn test_scripted_listen_dispatch_cancel() {
    let (evaluator, bindings, dispatchers) = scripted_environment(RecordingEvaluator::new());

    let id = call(
        &bindings,
        "io-on",
        vec![Value::string("socket"), Value::string("localhost:9000"), callback(2)],
    )
    .unwrap();
    assert_eq!(id, Value::symbol("0"));

    let dispatcher = dispatchers.lock().unwrap()[0].clone();
    dispatcher.dispatch("line one").unwrap();
    dispatcher.dispatch("line two").unwrap();
    assert_eq!(evaluator.count(), 2);

    assert_eq!(call(&bindings, "io-cancel", vec![id.clone()]).unwrap(), Value::Boolean(true));
    assert_eq!(call(&bindings, "io-cancel", vec![id]).unwrap(), Value::Boolean(false));
    dispatcher.dispatch("line three").unwrap();
    assert_eq!(evaluator.count(), 2);
}

#[test]
fn test_scripted_exec_is_one_shot() {
    let (evaluator, bindings, dispatchers) = scripted_environment(RecordingEvaluator::new());
    let id = call(&bindings, "io-exec", vec![Value::symbol("socket"), Value::Nil, callback(3)]).unwrap();

    let dispatcher = dispatchers.lock().unwrap()[0].clone();
    dispatcher.dispatch(vec!["status", "ok"]).unwrap();
    dispatcher.dispatch("ignored").unwrap();

    assert_eq!(
        evaluator.evaluated(),
        vec![Value::list([
            callback(3),
            Value::quote(Value::string("status")),
            Value::quote(Value::string("ok")),
        ])]
    );
    assert_eq!(call(&bindings, "io-cancel", vec![id]).unwrap(), Value::Boolean(false));
}

#[test]
fn test_deprecated_directive_returns_minus_one() {
    let (_, bindings, _) = scripted_environment(RecordingEvaluator::new());
    let id = call(&bindings, "io-once", vec![Value::symbol("deprecated"), Value::Nil]).unwrap();
    assert_eq!(id, Value::symbol("-1"));
    assert_eq!(call(&bindings, "io-cancel", vec![id]).unwrap(), Value::Boolean(false));
}

#[test]
fn test_error_handler_recovers_raised_conditions() {
    let evaluator = RecordingEvaluator::with_hook(|expression| {
        match expression.cdr().and_then(|args| args.car()) {
            Some(argument) if argument == &Value::quote(Value::string("raise")) => {
                Err(EvalError::Raised(Value::symbol("handled")))
            }
            Some(_) => Err(EvalError::Failed("boom".to_string())),
            None => Ok(Value::Nil),
        }
    });
    let (_, bindings, dispatchers) = scripted_environment(evaluator);
    call(&bindings, "io-on", vec![Value::symbol("socket"), Value::Nil, callback(1)]).unwrap();
    let dispatcher = dispatchers.lock().unwrap()[0].clone();

    assert_eq!(
        dispatcher.dispatch("raise").unwrap(),
        Some(Value::symbol("handled"))
    );
    assert!(matches!(
        dispatcher.dispatch("other"),
        Err(ListenerError::Evaluation {
            source: EvalError::Failed(_),
            ..
        })
    ));
    // A failing callback does not remove a repeating listener
    assert!(dispatcher.is_active());
    assert_eq!(bindings.registry().stats().callback_errors, 2);
}

#[test]
fn test_invalid_callback_is_rejected() {
    let (_, bindings, _) = scripted_environment(RecordingEvaluator::new());
    let result = call(
        &bindings,
        "io-on",
        vec![Value::symbol("socket"), Value::Nil, Value::Number(1.0)],
    );
    assert!(matches!(
        result,
        Err(BindingError::Listener(ListenerError::InvalidCallback { .. }))
    ));
    assert!(bindings.registry().is_empty());
}
