// tests/watcher.rs

use std::error::Error;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use devloop::bus::{EventBus, EventKind, Subscription};
use devloop::watch::spawn_watcher;

type TestResult = Result<(), Box<dyn Error>>;

/// Receive the next file_changed payload, skipping other event kinds.
async fn next_file_changed(sub: &mut Subscription) -> Option<String> {
    loop {
        match sub.next().await {
            Some(ev) if ev.kind == EventKind::FileChanged => return Some(ev.payload),
            Some(_) => continue,
            None => return None,
        }
    }
}

#[tokio::test]
async fn writes_publish_file_changed_events() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir(dir.path().join("src"))?;
    std::fs::write(dir.path().join("src/main.go"), "package main\n")?;

    let bus = EventBus::new();
    let mut sub = bus.subscribe().await;
    let _watcher = spawn_watcher(dir.path(), &[], bus.clone())?;
    sleep(Duration::from_millis(200)).await;

    std::fs::write(dir.path().join("src/main.go"), "package main // edited\n")?;

    let payload = timeout(Duration::from_secs(5), next_file_changed(&mut sub))
        .await?
        .ok_or("bus closed")?;
    assert!(payload.ends_with("main.go"), "got: {payload}");

    Ok(())
}

#[tokio::test]
async fn ignored_directories_are_skipped_entirely() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir(dir.path().join("skipme"))?;
    std::fs::write(dir.path().join("skipme/inner.go"), "x\n")?;
    std::fs::write(dir.path().join("control.go"), "x\n")?;

    let bus = EventBus::new();
    let mut sub = bus.subscribe().await;
    let _watcher = spawn_watcher(dir.path(), &["skipme".to_string()], bus.clone())?;
    sleep(Duration::from_millis(200)).await;

    std::fs::write(dir.path().join("skipme/inner.go"), "edited\n")?;
    std::fs::write(dir.path().join("control.go"), "edited\n")?;

    // The ignored write must never surface, so the first event is control.go.
    let payload = timeout(Duration::from_secs(5), next_file_changed(&mut sub))
        .await?
        .ok_or("bus closed")?;
    assert!(payload.ends_with("control.go"), "got: {payload}");

    Ok(())
}

#[tokio::test]
async fn known_noise_basenames_are_suppressed() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("doc.go"), "x\n")?;
    std::fs::write(dir.path().join("handler.go"), "x\n")?;

    let bus = EventBus::new();
    let mut sub = bus.subscribe().await;
    let _watcher = spawn_watcher(dir.path(), &[], bus.clone())?;
    sleep(Duration::from_millis(200)).await;

    std::fs::write(dir.path().join("doc.go"), "generated\n")?;
    std::fs::write(dir.path().join("handler.go"), "edited\n")?;

    let payload = timeout(Duration::from_secs(5), next_file_changed(&mut sub))
        .await?
        .ok_or("bus closed")?;
    assert!(payload.ends_with("handler.go"), "got: {payload}");

    Ok(())
}

#[tokio::test]
async fn directories_created_after_startup_are_not_watched() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("control.go"), "x\n")?;

    let bus = EventBus::new();
    let mut sub = bus.subscribe().await;
    let _watcher = spawn_watcher(dir.path(), &[], bus.clone())?;
    sleep(Duration::from_millis(200)).await;

    std::fs::create_dir(dir.path().join("latecomer"))?;
    std::fs::write(dir.path().join("latecomer/new.go"), "x\n")?;
    sleep(Duration::from_millis(200)).await;
    std::fs::write(dir.path().join("latecomer/new.go"), "edited\n")?;
    std::fs::write(dir.path().join("control.go"), "edited\n")?;

    let payload = timeout(Duration::from_secs(5), next_file_changed(&mut sub))
        .await?
        .ok_or("bus closed")?;
    assert!(
        payload.ends_with("control.go"),
        "write in an unwatched new directory surfaced: {payload}"
    );

    Ok(())
}
