//! End-to-end scenarios and invariants against the scripted helper fixture
//! (`tests/fixtures/scripted_helper.py`): single-active-operation
//! serialization, disconnect behavior, and the per-kind response contracts.

mod common;

use std::time::Duration;

use pyboard_session::{FileRecord, OperationOutcome, Session};
use tokio::sync::mpsc;
use tokio::time::timeout;

const BOUND: Duration = Duration::from_secs(5);

async fn connect() -> Session {
    timeout(BOUND, Session::connect(common::helper_config()))
        .await
        .expect("connect timed out")
        .expect("helper spawn failed")
}

/// S1: listContents.
#[tokio::test]
async fn scenario_s1_list_contents() {
    let session = connect().await;
    let outcome = timeout(BOUND, session.list_contents("/".to_string())).await.unwrap();
    assert_eq!(
        outcome,
        OperationOutcome::ListContents {
            files: vec![
                FileRecord::new("main.py", false, 123),
                FileRecord::new("lib/", true, 0),
            ],
        }
    );
    session.disconnect(true).await;
}

/// S2: a helper-reported error forces a disconnect and surfaces the
/// traceback text.
#[tokio::test]
async fn scenario_s2_command_err_forces_disconnect() {
    let session = connect().await;
    let outcome = timeout(BOUND, session.command("1/0".to_string(), false)).await.unwrap();
    match outcome {
        OperationOutcome::CommandWithResponse { response } => {
            assert!(response.contains("ZeroDivisionError"));
            assert!(!response.contains("!!ERR!!"));
            assert!(!response.contains("!!EOO!!"));
        }
        other => panic!("expected CommandWithResponse, got {other:?}"),
    }

    // the driver force-disconnected; a follow-up request resolves None
    // rather than hanging, since there is no live helper to enqueue against.
    let followup = timeout(BOUND, session.check_status()).await.unwrap();
    assert_eq!(followup, OperationOutcome::None);
}

/// S4: verbose uploadFiles reports progress before completing.
#[tokio::test]
async fn scenario_s4_upload_files_verbose_progress() {
    let session = connect().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let files = vec!["/a.py".to_string(), "/b.py".to_string()];
    let outcome = timeout(
        BOUND,
        session.upload_files(files, ":".to_string(), None, true, Some(tx)),
    )
    .await
    .unwrap();

    assert_eq!(outcome, OperationOutcome::Status { ok: true });

    let first = rx.recv().await.expect("expected a progress message");
    assert_eq!(first, "'/a.py' [1/2]");
    let second = rx.recv().await.expect("expected a second progress message");
    assert_eq!(second, "'/b.py' [2/2]");

    session.disconnect(true).await;
}

/// S6: a `!!SIMPLE_AUTO_COMP!!`-prefixed response yields the simple variant.
#[tokio::test]
async fn scenario_s6_tab_completion_simple() {
    let session = connect().await;
    let outcome = timeout(BOUND, session.retrieve_tab_comp("uos.".to_string())).await.unwrap();
    assert_eq!(
        outcome,
        OperationOutcome::TabComp {
            is_simple: true,
            completion: "uos.listdir".to_string(),
        }
    );
    session.disconnect(true).await;
}

/// Invariant 1: concurrently enqueued operations complete in enqueue order,
/// with at most one active at the helper at a time.
#[tokio::test]
async fn invariant_serializes_concurrent_operations_in_order() {
    let session = connect().await;

    let a = session.command("sleep:40".to_string(), false);
    let b = session.command("second".to_string(), false);
    let c = session.command("third".to_string(), false);

    let (ra, rb, rc) = timeout(BOUND, async { tokio::join!(a, b, c) }).await.unwrap();

    // all three completed, each carrying back its own request text
    // (possible only if the helper processed them one at a time, in order).
    assert!(matches!(
        ra,
        OperationOutcome::CommandWithResponse { ref response } if response.contains("sleep:40")
    ));
    assert!(matches!(
        rb,
        OperationOutcome::CommandWithResponse { ref response } if response.contains("second")
    ));
    assert!(matches!(
        rc,
        OperationOutcome::CommandWithResponse { ref response } if response.contains("third")
    ));

    session.disconnect(true).await;
}

/// Invariant 3: after disconnect(), no waiter is left parked — every
/// pending operation resolves `None` instead of hanging forever.
#[tokio::test]
async fn invariant_disconnect_resolves_all_pending_waiters() {
    let session = connect().await;

    let slow = session.command("sleep:200".to_string(), false);
    let pending = session.command("never runs".to_string(), false);

    // give the first request a moment to become active, then disconnect
    // forcefully while both are still in flight.
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.disconnect(false).await;

    let (slow_result, pending_result) = timeout(BOUND, async { tokio::join!(slow, pending) })
        .await
        .unwrap();
    assert_eq!(slow_result, OperationOutcome::None);
    assert_eq!(pending_result, OperationOutcome::None);
}
