// tests/cancel_behaviour.rs

//! Cancellation semantics of `execute`.

use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};

use procwarden::{CancelToken, ExecError, Supervisor};
use procwarden_test_utils::init_tracing;

#[tokio::test]
async fn deadline_cancellation_wins_over_a_long_child() {
    init_tracing();
    let sup = Supervisor::new("/bin/sleep").arg("10");
    sup.build().await;

    let started = Instant::now();
    let result = timeout(
        Duration::from_secs(5),
        sup.execute(CancelToken::deadline_in(Duration::from_secs(1))),
    )
    .await
    .expect("execute returns well before the child's own 10s");

    assert_eq!(result.unwrap_err(), ExecError::KilledByCancellation);
    // Bounded delay after the cancellation, not the full child runtime.
    assert!(started.elapsed() < Duration::from_secs(4));

    // The background reaper finishes on its own and records the kill
    // for any reader that polls afterwards.
    sleep(Duration::from_millis(500)).await;
    assert!(!sup.is_running());
    assert!(matches!(
        sup.last_error(),
        Some(ExecError::AbnormalExit { .. })
    ));
}

#[tokio::test]
async fn explicit_abort_kills_the_child() {
    init_tracing();
    let sup = Supervisor::new("/bin/sleep").arg("10");
    sup.build().await;

    let (handle, token) = CancelToken::channel();
    tokio::spawn(async move {
        sleep(Duration::from_millis(300)).await;
        handle.cancel();
    });

    let result = timeout(Duration::from_secs(5), sup.execute(token))
        .await
        .expect("execute unblocks shortly after the abort");

    assert_eq!(result.unwrap_err(), ExecError::KilledByCancellation);
}

#[tokio::test]
async fn dropped_cancel_handle_lets_the_child_finish() {
    init_tracing();
    let sup = Supervisor::new("/bin/true");
    sup.build().await;

    let (handle, token) = CancelToken::channel();
    drop(handle);

    sup.execute(token).await.expect("child runs to completion");
    assert_eq!(sup.exit_code(), 0);
}
