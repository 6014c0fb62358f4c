//! End-to-end tests against a real watched directory.
//!
//! Each test starts `Waiter::serve` on a fresh temp directory, gives the
//! watcher a moment to register, then creates files underneath it.

use standby::{WaitError, Waiter, WaiterError};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SETTLE: Duration = Duration::from_millis(100);

async fn start(dir: &Path) -> (Arc<Waiter>, JoinHandle<Result<(), WaiterError>>) {
    let waiter = Arc::new(
        Waiter::new(dir, r"^output-.*\.dat$")
            .unwrap()
            .with_settle_delay(SETTLE),
    );
    let serving = Arc::clone(&waiter);
    let handle = tokio::spawn(async move { serving.serve().await });

    // Let the watcher register the directory
    tokio::time::sleep(Duration::from_millis(200)).await;
    (waiter, handle)
}

async fn until_pending(waiter: &Waiter, count: usize) {
    while waiter.pending() < count {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_wait_resolves_after_file_created() {
    let dir = tempfile::tempdir().unwrap();
    let (waiter, serve) = start(dir.path()).await;

    let wait = {
        let waiter = Arc::clone(&waiter);
        tokio::spawn(async move {
            let start = Instant::now();
            let result = waiter
                .wait_timeout("/output-1.dat", Duration::from_secs(10))
                .await;
            (result, start.elapsed())
        })
    };

    until_pending(&waiter, 1).await;
    assert!(!wait.is_finished(), "wait resolved before the file existed");

    std::fs::write(dir.path().join("output-1.dat"), b"segment").unwrap();

    let (result, elapsed) = tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("wait did not resolve after file creation")
        .unwrap();
    assert_eq!(result, Ok(()));
    assert!(elapsed >= SETTLE, "released before settle delay: {:?}", elapsed);

    waiter.close();
    serve.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_one_event_releases_every_waiter() {
    let dir = tempfile::tempdir().unwrap();
    let (waiter, serve) = start(dir.path()).await;

    let waits: Vec<_> = (0..3)
        .map(|_| {
            let waiter = Arc::clone(&waiter);
            tokio::spawn(async move {
                let cancel = CancellationToken::new();
                waiter.wait("/output-7.dat", &cancel).await
            })
        })
        .collect();

    until_pending(&waiter, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    std::fs::write(dir.path().join("output-7.dat"), b"segment").unwrap();

    for wait in waits {
        let result = tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("a waiter was left behind")
            .unwrap();
        assert_eq!(result, Ok(()));
    }

    waiter.close();
    serve.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_non_matching_events_do_not_release() {
    let dir = tempfile::tempdir().unwrap();
    let (waiter, serve) = start(dir.path()).await;

    let wait = {
        let waiter = Arc::clone(&waiter);
        tokio::spawn(async move {
            waiter
                .wait_timeout("/output-2.dat", Duration::from_millis(600))
                .await
        })
    };

    until_pending(&waiter, 1).await;
    std::fs::write(dir.path().join("other-2.dat"), b"noise").unwrap();
    std::fs::write(dir.path().join("output-3.dat"), b"noise").unwrap();

    assert_eq!(wait.await.unwrap(), Err(WaitError::DeadlineExceeded));

    waiter.close();
    serve.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_later_wait_after_release_blocks_again() {
    let dir = tempfile::tempdir().unwrap();
    let (waiter, serve) = start(dir.path()).await;
    let file = dir.path().join("output-4.dat");

    let first = {
        let waiter = Arc::clone(&waiter);
        tokio::spawn(async move { waiter.wait_timeout("/output-4.dat", Duration::from_secs(5)).await })
    };
    until_pending(&waiter, 1).await;
    std::fs::write(&file, b"segment").unwrap();
    assert_eq!(first.await.unwrap(), Ok(()));

    // Give trailing events for the first write time to drain
    tokio::time::sleep(SETTLE * 3).await;
    std::fs::remove_file(&file).unwrap();

    let second = waiter
        .wait_timeout("/output-4.dat", Duration::from_millis(300))
        .await;
    assert_eq!(second, Err(WaitError::DeadlineExceeded));

    waiter.close();
    serve.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_rename_into_place_releases() {
    let dir = tempfile::tempdir().unwrap();
    let (waiter, serve) = start(dir.path()).await;

    let wait = {
        let waiter = Arc::clone(&waiter);
        tokio::spawn(async move { waiter.wait_timeout("/output-8.dat", Duration::from_secs(10)).await })
    };
    until_pending(&waiter, 1).await;

    // Write under a name the pattern skips, then publish atomically
    let staged = dir.path().join("output-8.dat.tmp");
    std::fs::write(&staged, b"segment").unwrap();
    std::fs::rename(&staged, dir.path().join("output-8.dat")).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("rename did not release the waiter")
        .unwrap();
    assert_eq!(result, Ok(()));

    waiter.close();
    serve.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_remove_event_does_not_release() {
    let dir = tempfile::tempdir().unwrap();
    let existing = dir.path().join("output-9.dat");
    std::fs::write(&existing, b"old").unwrap();
    let (waiter, serve) = start(dir.path()).await;

    // Same base name as the existing file, so its removal reaches this lock
    let wait = {
        let waiter = Arc::clone(&waiter);
        tokio::spawn(async move { waiter.wait_timeout("/sub/output-9.dat", Duration::from_secs(10)).await })
    };
    until_pending(&waiter, 1).await;

    std::fs::remove_file(&existing).unwrap();
    tokio::time::sleep(SETTLE * 4).await;
    assert!(!wait.is_finished(), "remove event released the waiter");
    assert_eq!(waiter.pending(), 1);

    // A write for the same name still gets through
    std::fs::write(&existing, b"new").unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("write after remove did not release the waiter")
        .unwrap();
    assert_eq!(result, Ok(()));

    waiter.close();
    serve.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_close_stops_serve_and_waits() {
    let dir = tempfile::tempdir().unwrap();
    let (waiter, serve) = start(dir.path()).await;

    let wait = {
        let waiter = Arc::clone(&waiter);
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            waiter.wait("/output-5.dat", &cancel).await
        })
    };
    until_pending(&waiter, 1).await;

    waiter.close();

    let result = tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .expect("in-flight wait hung after close")
        .unwrap();
    assert_eq!(result, Err(WaitError::Closed));

    tokio::time::timeout(Duration::from_secs(2), serve)
        .await
        .expect("serve did not return after close")
        .unwrap()
        .unwrap();

    // Nothing blocks once closed
    let cancel = CancellationToken::new();
    assert_eq!(waiter.wait("/output-6.dat", &cancel).await, Ok(()));
}

#[tokio::test]
async fn test_serve_fails_for_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let waiter = Waiter::new(dir.path().join("missing"), ".*").unwrap();

    let result = waiter.serve().await;
    assert!(matches!(result, Err(WaiterError::Watch { .. })), "got {:?}", result);
}

#[tokio::test]
async fn test_serve_twice_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (waiter, serve) = start(dir.path()).await;

    let second = waiter.serve().await;
    assert!(matches!(second, Err(WaiterError::AlreadyServing)));

    waiter.close();
    serve.await.unwrap().unwrap();
}
