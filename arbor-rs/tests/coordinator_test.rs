//! Integration tests for execution policies, cancellation and failure routing

use arbor::{
    Command, CommandContext, CommandError, CommandManager, ExecutionCoordinator, FailureKind,
    ParseError, ParserExt, StringParser,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

fn manager_on(coordinator: ExecutionCoordinator) -> CommandManager<String> {
    CommandManager::builder().coordinator(coordinator).build()
}

fn counting(name: &str, counter: &Arc<AtomicUsize>) -> Command<String> {
    let counter = Arc::clone(counter);
    Command::builder(name)
        .handler(move |_ctx: CommandContext<String>| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_all_policies_share_the_contract() {
    let coordinators = [
        ExecutionCoordinator::inline(),
        ExecutionCoordinator::serialized().unwrap(),
        ExecutionCoordinator::concurrent().unwrap(),
    ];
    for coordinator in coordinators {
        let policy = coordinator.policy_name();
        let counter = Arc::new(AtomicUsize::new(0));
        let manager = manager_on(coordinator);
        manager.register(counting("ping", &counter)).unwrap();

        let ok = manager.execute("steve".to_string(), "ping").await;
        assert!(ok.is_ok(), "{policy}: {ok:?}");

        let err = manager
            .execute("steve".to_string(), "pong")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::NoSuchCommand, "{policy}");
        assert_eq!(counter.load(Ordering::SeqCst), 1, "{policy}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_suspended_lookup_does_not_block_other_resolutions() {
    let gate = Arc::new(Notify::new());
    let manager = manager_on(ExecutionCoordinator::concurrent().unwrap());

    let waiting = Arc::clone(&gate);
    manager
        .register(
            Command::builder("lookup")
                .required(
                    "name",
                    StringParser::single().flat_map_async(move |_ctx: &CommandContext<String>, name: String| {
                        let gate = Arc::clone(&waiting);
                        async move {
                            gate.notified().await;
                            Ok::<_, ParseError>(name)
                        }
                    }),
                )
                .handler(|_ctx: CommandContext<String>| async { Ok(()) })
                .build()
                .unwrap(),
        )
        .unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    manager.register(counting("ping", &counter)).unwrap();

    let slow = manager.execute("a".to_string(), "lookup steve");
    let fast = tokio::time::timeout(
        Duration::from_secs(5),
        manager.execute("b".to_string(), "ping"),
    )
    .await
    .expect("ping completes while lookup is suspended");
    assert!(fast.is_ok());
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    gate.notify_one();
    let result = slow.await.unwrap();
    assert_eq!(
        result.context.get::<String>("name").map(String::as_str),
        Some("steve")
    );
}

#[tokio::test]
async fn test_cancel_before_completion() {
    for coordinator in [
        ExecutionCoordinator::inline(),
        ExecutionCoordinator::serialized().unwrap(),
        ExecutionCoordinator::concurrent().unwrap(),
    ] {
        let counter = Arc::new(AtomicUsize::new(0));
        let manager = manager_on(coordinator);
        manager.register(counting("ping", &counter)).unwrap();

        let handle = manager.execute("steve".to_string(), "ping");
        let cancel = handle.cancel_handle();
        cancel.cancel();
        assert!(handle.is_cancelled());

        let err = handle.await.unwrap_err();
        assert!(matches!(err, CommandError::Cancelled));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_exception_chain_first_match_only() {
    let manager = manager_on(ExecutionCoordinator::inline());
    let seen = Arc::new(Mutex::new(Vec::new()));

    for label in ["first", "second"] {
        let seen = Arc::clone(&seen);
        manager
            .exception_controller()
            .register(FailureKind::NoSuchCommand, move |sender: &String, err| {
                seen.lock().unwrap().push(format!("{label}: {sender}: {err}"));
            });
    }

    let err = manager
        .execute("steve".to_string(), "nope")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::NoSuchCommand);
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["first: steve: unknown command 'nope'"]
    );
}

#[tokio::test]
async fn test_unregistered_kind_surfaces_unchanged() {
    let manager = manager_on(ExecutionCoordinator::inline());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    manager
        .exception_controller()
        .register(FailureKind::NoPermission, move |_: &String, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    manager
        .register(
            Command::builder("crash")
                .handler(|_ctx: CommandContext<String>| async { panic!("boom") })
                .build()
                .unwrap(),
        )
        .unwrap();

    let err = manager
        .execute("steve".to_string(), "crash")
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Handler(_)));
    assert!(err.to_string().contains("boom"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_serialized_handlers_never_overlap() {
    let manager = manager_on(ExecutionCoordinator::serialized().unwrap());
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));

    let (running, highest, finished) = (Arc::clone(&active), Arc::clone(&peak), Arc::clone(&done));
    manager
        .register(
            Command::builder("work")
                .required("n", StringParser::single())
                .handler(move |_ctx: CommandContext<String>| {
                    let (running, highest, finished) =
                        (Arc::clone(&running), Arc::clone(&highest), Arc::clone(&finished));
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        highest.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        finished.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    let handles: Vec<_> = (0..5)
        .map(|n| manager.execute("steve".to_string(), &format!("work {n}")))
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(done.load(Ordering::SeqCst), 5);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancel_reporting_depends_on_policy() {
    let inline = manager_on(ExecutionCoordinator::inline());
    let reported = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reported);
    inline
        .exception_controller()
        .register(FailureKind::Cancelled, move |_: &String, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    inline.register(counting("ping", &Arc::new(AtomicUsize::new(0)))).unwrap();

    let handle = inline.execute("steve".to_string(), "ping");
    handle.cancel();
    assert!(matches!(handle.await, Err(CommandError::Cancelled)));
    assert_eq!(reported.load(Ordering::SeqCst), 1);

    let concurrent = manager_on(ExecutionCoordinator::concurrent().unwrap());
    let aborted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&aborted);
    concurrent
        .exception_controller()
        .register(FailureKind::Cancelled, move |_: &String, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    let started = Arc::new(Notify::new());
    let signal = Arc::clone(&started);
    concurrent
        .register(
            Command::builder("hang")
                .handler(move |_ctx: CommandContext<String>| {
                    let signal = Arc::clone(&signal);
                    async move {
                        signal.notify_one();
                        std::future::pending::<()>().await;
                        Ok(())
                    }
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    let handle = concurrent.execute("steve".to_string(), "hang");
    started.notified().await;
    handle.cancel();
    assert!(matches!(handle.await, Err(CommandError::Cancelled)));
    assert_eq!(aborted.load(Ordering::SeqCst), 0);
}
