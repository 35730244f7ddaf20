use executable_engine::testing::init_tracing;
use executable_engine::{
    CallbackProcess, Completion, CompositeProcess, ConstantProcess, EngineConfig, EngineError,
    Executable, ListenerHandle, ReadyStatus, Runtime, Status, StatusEvent, TracingObserver,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;
use tokio::time::sleep;

/// Completes `delay` after each execution
fn delayed(runtime: &Runtime, id: &str, delay: Duration) -> Executable {
    Executable::builder(runtime)
        .id(id)
        .build(CallbackProcess::new(move |done: Completion| {
            tokio::task::spawn_local(async move {
                sleep(delay).await;
                done.complete();
            });
        }))
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_composite_waits_for_slow_dependency() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::default();
            let constant = ConstantProcess::build(&runtime).unwrap();
            let slow = delayed(&runtime, "slow", Duration::from_millis(50));
            let composite = Executable::builder(&runtime)
                .id("app")
                .build(CompositeProcess::new(vec![constant, slow.clone()]))
                .unwrap();

            composite.execute();
            assert!(!composite.is_ready());

            let result = runtime.run_until(composite.wait_ready()).await;
            assert_eq!(result, Ok(()));
            assert!(slow.is_ready());
            assert!(composite.is_ready());
            assert_eq!(runtime.stats().executing_count(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_wait_ready_reports_failure() {
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::default();
            let flaky = Executable::builder(&runtime)
                .id("flaky")
                .build(CallbackProcess::new(|done: Completion| {
                    tokio::task::spawn_local(async move {
                        sleep(Duration::from_millis(10)).await;
                        done.fail("upstream unavailable");
                    });
                }))
                .unwrap();

            flaky.execute();
            let err = runtime.run_until(flaky.wait_ready()).await.unwrap_err();
            match &err {
                EngineError::Failed { id, status } => {
                    assert_eq!(id.as_str(), "flaky");
                    assert_eq!(status.code(), "failed");
                }
                other => panic!("unexpected error: {other:?}"),
            }
            assert!(!err.is_contract_violation());

            // Already failed resolves without waiting
            let again = runtime.run_until(flaky.wait_ready()).await;
            assert_eq!(again.unwrap_err().as_label(), "engine_failed");
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_wait_ready_resolves_on_destroy() {
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::default();
            let stuck =
                Executable::new(&runtime, CallbackProcess::new(|_: Completion| {})).unwrap();
            stuck.execute();

            let target = stuck.clone();
            tokio::task::spawn_local(async move {
                sleep(Duration::from_secs(1)).await;
                target.destroy();
            });

            let err = runtime.run_until(stuck.wait_ready()).await.unwrap_err();
            assert_eq!(err, EngineError::Destroyed(stuck.id().clone()));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_wait_ready_when_already_ready_is_deferred() {
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::default();
            let constant = ConstantProcess::build(&runtime).unwrap();

            let wait = constant.wait_ready();
            assert!(runtime.has_pending());
            assert_eq!(runtime.run_until(wait).await, Ok(()));
            assert!(!runtime.has_pending());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_ready_listeners_run_on_a_later_turn() {
    LocalSet::new()
        .run_until(async {
            let runtime = Runtime::default();
            let slow = delayed(&runtime, "slow", Duration::from_millis(20));
            let order = Rc::new(RefCell::new(Vec::new()));
            for name in ["own", "outside"] {
                let order = order.clone();
                slow.on_status(Status::of::<ReadyStatus>(), move |_: &StatusEvent| {
                    order.borrow_mut().push(name)
                });
            }

            slow.execute();
            sleep(Duration::from_millis(30)).await;
            assert!(slow.is_ready());
            assert!(runtime.has_pending());
            assert!(order.borrow().is_empty());

            runtime.run_until_idle();
            assert_eq!(*order.borrow(), vec!["outside", "own"]);
        })
        .await;
}

#[test]
fn test_registry_lifecycle() {
    let runtime = Runtime::default();
    let db = Executable::builder(&runtime)
        .id("db")
        .build(ConstantProcess)
        .unwrap();
    let anonymous = ConstantProcess::build(&runtime).unwrap();

    assert!(db.is_registered());
    assert!(!anonymous.is_registered());
    assert!(runtime.resolve("db").unwrap().ptr_eq(&db));
    assert_eq!(runtime.registry().len(), 1);

    let err = Executable::builder(&runtime)
        .id("db")
        .build(ConstantProcess)
        .unwrap_err();
    assert_eq!(err.as_label(), "engine_duplicate_id");

    db.destroy();
    db.destroy();
    assert!(matches!(runtime.resolve("db"), Err(EngineError::NotFound(_))));
    assert!(runtime.registry().is_empty());

    // The id is free again once destroyed
    let db = Executable::builder(&runtime)
        .id("db")
        .build(ConstantProcess)
        .unwrap();
    assert_eq!(runtime.registry().ids().len(), 1);
    drop(db);
    assert!(!runtime.registry().contains("db"));
}

#[test]
fn test_tracing_observer_and_config_from_json() {
    init_tracing();
    let config: EngineConfig = serde_json::from_str(
        r#"{ "dispatch": { "defer_ready_batches": false }, "temp_id_prefix": "tmp-" }"#,
    )
    .unwrap();
    assert!(config.dispatch.first_registered_last);
    let runtime = Runtime::with_observer(config, Rc::new(TracingObserver));

    let dependency = Executable::new(
        &runtime,
        CallbackProcess::new(|done: Completion| done.complete()),
    )
    .unwrap();
    assert!(dependency.id().as_str().starts_with("tmp-"));
    let composite =
        Executable::new(&runtime, CompositeProcess::new(vec![dependency.clone()])).unwrap();

    let seen = Rc::new(RefCell::new(0));
    for _ in 0..2 {
        let seen = seen.clone();
        composite.on_ready(ListenerHandle::new(move |_: &StatusEvent| {
            *seen.borrow_mut() += 1
        }));
    }

    composite.execute();
    // Multi-listener ready batches run inline without deferral
    assert_eq!(*seen.borrow(), 2);
    assert!(!runtime.has_pending());

    let snapshot = runtime.stats().snapshot();
    assert_eq!(snapshot.executions, 2);
    assert_eq!(snapshot.listener_failures, 0);
    assert!(snapshot.executing.is_empty());
}
