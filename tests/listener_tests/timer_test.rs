use std::{io::Write, sync::Arc, time::Duration};

use kairei_io::{
    directive::{require_number, require_string, DirectiveError, DirectiveLibrary},
    CancelHandle, HostValue, ListenerEventType, RemovalReason, Value,
};
use tokio::time::{sleep, timeout};
use tracing::warn;

use super::{callback, request, setup, RecordingEvaluator};

/// Host-side timers and file reads backed by tokio tasks.
fn tokio_library() -> DirectiveLibrary {
    DirectiveLibrary::new("tokio-io")
        .with_directive("interval", |options, dispatcher, _, _| {
            let period = Duration::from_millis(require_number(options)? as u64);
            let handle = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                // The first tick completes immediately
                ticker.tick().await;
                let mut count = 0i64;
                loop {
                    ticker.tick().await;
                    count += 1;
                    if let Err(e) = dispatcher.dispatch(HostValue::Integer(count)) {
                        warn!("interval listener {} failed: {}", dispatcher.id(), e);
                        break;
                    }
                }
            });
            Ok(Some(CancelHandle::from(handle)))
        })
        .with_directive("timeout", |options, dispatcher, _, _| {
            let delay = Duration::from_millis(require_number(options)? as u64);
            let handle = tokio::spawn(async move {
                sleep(delay).await;
                if let Err(e) = dispatcher.dispatch(HostValue::Null) {
                    warn!("timeout listener {} failed: {}", dispatcher.id(), e);
                }
            });
            Ok(Some(handle.abort_handle().into()))
        })
        .with_directive("read-file", |options, dispatcher, _, _| {
            let path = require_string(options)?.to_string();
            if path.is_empty() {
                return Err(DirectiveError::Setup("empty path".to_string()));
            }
            let handle = tokio::spawn(async move {
                let payload = match tokio::fs::read_to_string(&path).await {
                    Ok(contents) => vec![HostValue::Null, HostValue::from(contents)],
                    Err(e) => vec![HostValue::from(e.to_string()), HostValue::Null],
                };
                if let Err(e) = dispatcher.dispatch_final(payload) {
                    warn!("read-file listener {} failed: {}", dispatcher.id(), e);
                }
            });
            Ok(Some(handle.into()))
        })
}

async fn wait_for(evaluator: &Arc<RecordingEvaluator>, count: usize) {
    timeout(Duration::from_secs(5), async {
        while evaluator.count() < count {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for callbacks");
}

#[tokio::test]
async fn test_interval_repeats_until_cancelled() {
    let (evaluator, registry) = setup(tokio_library());
    let id = registry
        .listen(&request("interval", Value::Number(10.0), 3), None)
        .unwrap()
        .id();
    assert!(registry.get(id).unwrap().cancellable);

    wait_for(&evaluator, 3).await;
    assert!(registry.cancel(id));
    let seen = evaluator.count();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(evaluator.count(), seen);

    assert_eq!(
        evaluator.evaluated()[..3].to_vec(),
        (1..=3)
            .map(|n| Value::list([callback(3), Value::quote(Value::Number(n as f64))]))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_timeout_fires_once() {
    let (evaluator, registry) = setup(tokio_library());
    let mut events = registry.subscribe();
    let id = registry
        .once(&request("timeout", Value::Number(10.0), 4), None)
        .unwrap()
        .id();

    let removed = timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            if let ListenerEventType::Removed { id, reason } = event.event_type {
                return (id, reason);
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(removed, (id, RemovalReason::Fired));
    wait_for(&evaluator, 1).await;
    assert_eq!(evaluator.evaluated(), vec![Value::list([callback(4)])]);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_cancelled_timeout_never_fires() {
    let (evaluator, registry) = setup(tokio_library());
    let id = registry
        .once(&request("timeout", Value::Number(30.0), 4), None)
        .unwrap()
        .id();
    assert!(registry.cancel(id));
    sleep(Duration::from_millis(80)).await;
    assert_eq!(evaluator.count(), 0);
}

#[tokio::test]
async fn test_read_file_delivers_contents() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "(hello world)").unwrap();
    let path = file.path().to_string_lossy().to_string();

    let (evaluator, registry) = setup(tokio_library());
    registry
        .once(&request("read-file", Value::string(&path), 8), None)
        .unwrap();

    wait_for(&evaluator, 1).await;
    assert_eq!(
        evaluator.evaluated(),
        vec![Value::list([
            callback(8),
            Value::quote(Value::Nil),
            Value::quote(Value::string("(hello world)")),
        ])]
    );
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_teardown_aborts_tasks() {
    let (evaluator, registry) = setup(tokio_library());
    for period in [5.0, 7.0, 11.0] {
        registry
            .listen(&request("interval", Value::Number(period), 1), None)
            .unwrap();
    }
    wait_for(&evaluator, 1).await;

    let report = registry.cancel_all();
    assert_eq!(report.cancelled.len(), 3);
    assert!(report.is_clean());

    let seen = evaluator.count();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(evaluator.count(), seen);
}
