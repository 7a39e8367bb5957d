// tests/command_lifecycle.rs

use std::error::Error;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use devloop::bus::{EventBus, EventKind};
use devloop::proc::{CommandSpec, ManagedCommand};

type TestResult = Result<(), Box<dyn Error>>;

fn spec(name: &str, command: &str, requires_group_kill: bool) -> CommandSpec {
    CommandSpec {
        name: name.to_string(),
        full_command: command.to_string(),
        requires_group_kill,
        run_at_start: false,
    }
}

/// Poll `cond` until it holds or `limit` elapses.
async fn wait_until<F: Fn() -> bool>(cond: F, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    cond()
}

#[tokio::test]
async fn start_publishes_running_line_output_and_command_done() -> TestResult {
    let bus = EventBus::new();
    let mut sub = bus.subscribe().await;
    let (errors_tx, mut errors_rx) = mpsc::channel(16);

    let cmd = ManagedCommand::new(
        spec("echo", "echo hello", false),
        bus.clone(),
        errors_tx,
        Duration::from_millis(100),
    );
    let mut out = cmd.take_output().ok_or("no output channel")?;

    cmd.start().await?;

    let line = timeout(Duration::from_secs(5), out.recv())
        .await?
        .ok_or("output closed")?;
    assert!(line.starts_with("running"), "unexpected first line: {line}");

    let line = timeout(Duration::from_secs(5), out.recv())
        .await?
        .ok_or("output closed")?;
    assert_eq!(line, "hello");

    loop {
        let ev = timeout(Duration::from_secs(5), sub.next())
            .await?
            .ok_or("bus closed")?;
        if ev.kind == EventKind::CommandDone {
            assert_eq!(ev.payload, "echo");
            break;
        }
    }

    assert!(wait_until(|| cmd.is_done(), Duration::from_secs(5)).await);
    assert_eq!(cmd.state().exit_code, Some(0));
    assert!(errors_rx.try_recv().is_err());

    Ok(())
}

#[tokio::test]
async fn nonzero_exit_reports_an_error_and_still_publishes_command_done() -> TestResult {
    let bus = EventBus::new();
    let mut sub = bus.subscribe().await;
    let (errors_tx, mut errors_rx) = mpsc::channel(16);

    let cmd = ManagedCommand::new(
        spec("fail", "exit 3", false),
        bus.clone(),
        errors_tx,
        Duration::from_millis(100),
    );

    cmd.start().await?;

    let err = timeout(Duration::from_secs(5), errors_rx.recv())
        .await?
        .ok_or("error channel closed")?;
    assert!(err.to_string().contains("exit code 3"), "got: {err}");

    loop {
        let ev = timeout(Duration::from_secs(5), sub.next())
            .await?
            .ok_or("bus closed")?;
        if ev.kind == EventKind::CommandDone {
            assert_eq!(ev.payload, "fail");
            break;
        }
    }

    assert!(wait_until(|| cmd.is_done(), Duration::from_secs(5)).await);
    assert_eq!(cmd.state().exit_code, Some(3));

    Ok(())
}

#[tokio::test]
async fn kill_is_idempotent_on_an_exited_command() -> TestResult {
    let bus = EventBus::new();
    let (errors_tx, mut errors_rx) = mpsc::channel(16);

    let cmd = ManagedCommand::new(
        spec("oneshot", "true", false),
        bus.clone(),
        errors_tx,
        Duration::from_millis(100),
    );
    let mut out = cmd.take_output().ok_or("no output channel")?;

    cmd.start().await?;
    assert!(wait_until(|| cmd.is_done(), Duration::from_secs(5)).await);

    cmd.kill().await;
    cmd.kill().await;

    while let Ok(line) = out.try_recv() {
        assert!(
            !line.contains("force-killing"),
            "kill on an exited command produced output: {line}"
        );
    }
    assert!(errors_rx.try_recv().is_err());

    Ok(())
}

#[tokio::test]
async fn kill_on_a_never_started_command_is_silent() -> TestResult {
    let bus = EventBus::new();
    let (errors_tx, mut errors_rx) = mpsc::channel(16);

    let cmd = ManagedCommand::new(
        spec("idle", "echo never", false),
        bus.clone(),
        errors_tx,
        Duration::from_millis(100),
    );
    let mut out = cmd.take_output().ok_or("no output channel")?;

    cmd.kill().await;

    assert!(out.try_recv().is_err());
    assert!(errors_rx.try_recv().is_err());
    assert!(!cmd.is_running());
    assert!(!cmd.is_done());

    Ok(())
}

#[tokio::test]
async fn restart_of_a_stopped_command_behaves_like_start() -> TestResult {
    let bus = EventBus::new();
    let (errors_tx, _errors_rx) = mpsc::channel(16);

    let cmd = ManagedCommand::new(
        spec("echo", "echo again", false),
        bus.clone(),
        errors_tx,
        Duration::from_millis(100),
    );
    let mut out = cmd.take_output().ok_or("no output channel")?;

    cmd.restart().await?;

    let line = timeout(Duration::from_secs(5), out.recv())
        .await?
        .ok_or("output closed")?;
    assert!(line.starts_with("running"));
    let line = timeout(Duration::from_secs(5), out.recv())
        .await?
        .ok_or("output closed")?;
    assert_eq!(line, "again");

    assert!(wait_until(|| cmd.is_done(), Duration::from_secs(5)).await);
    assert_eq!(cmd.state().exit_code, Some(0));

    Ok(())
}

#[tokio::test]
async fn restart_of_a_running_command_replaces_the_process() -> TestResult {
    let bus = EventBus::new();
    let (errors_tx, _errors_rx) = mpsc::channel(16);

    let cmd = ManagedCommand::new(
        spec("long", "sleep 30", false),
        bus.clone(),
        errors_tx,
        Duration::from_millis(100),
    );
    let mut out = cmd.take_output().ok_or("no output channel")?;

    cmd.start().await?;
    assert!(cmd.is_running());

    cmd.restart().await?;
    assert!(cmd.is_running());

    // Both incarnations announced themselves on the same channel.
    let mut running_lines = 0;
    while let Ok(line) = out.try_recv() {
        if line.starts_with("running") {
            running_lines += 1;
        }
    }
    assert_eq!(running_lines, 2);

    cmd.kill().await;
    assert!(wait_until(|| cmd.is_done(), Duration::from_secs(5)).await);

    Ok(())
}

#[tokio::test]
async fn group_kill_restart_sends_no_graceful_signal() -> TestResult {
    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("got-term");

    let bus = EventBus::new();
    let (errors_tx, _errors_rx) = mpsc::channel(16);

    let script = format!(
        "trap 'touch {}' TERM INT; sleep 30 & wait",
        marker.display()
    );
    let cmd = ManagedCommand::new(
        spec("watchtool", &script, true),
        bus.clone(),
        errors_tx,
        Duration::from_millis(100),
    );

    cmd.start().await?;
    // Let the shell install its trap before restarting.
    sleep(Duration::from_millis(300)).await;

    cmd.restart().await?;
    assert!(cmd.is_running());

    // A graceful TERM/INT would have been trapped and left the marker.
    assert!(
        !marker.exists(),
        "group-kill restart sent a graceful signal"
    );

    cmd.kill().await;
    assert!(wait_until(|| cmd.is_done(), Duration::from_secs(5)).await);

    Ok(())
}

#[tokio::test]
async fn classified_error_lines_set_the_error_flag_until_restart() -> TestResult {
    let dir = tempfile::tempdir()?;
    let flag = dir.path().join("already-ran");

    let bus = EventBus::new();
    let (errors_tx, _errors_rx) = mpsc::channel(16);

    // Misreports an error on stdout on its first run only.
    let script = format!(
        "if [ ! -f {flag} ]; then touch {flag}; echo 'ERROR boom'; fi",
        flag = flag.display()
    );
    let cmd = ManagedCommand::new(
        spec("application", &script, false),
        bus.clone(),
        errors_tx,
        Duration::from_millis(100),
    );
    let mut err = cmd.take_errors().ok_or("no error channel")?;

    cmd.start().await?;

    let line = timeout(Duration::from_secs(5), err.recv())
        .await?
        .ok_or("error channel closed")?;
    assert_eq!(line, "ERROR boom");
    assert!(cmd.has_error());

    assert!(wait_until(|| cmd.is_done(), Duration::from_secs(5)).await);
    cmd.restart().await?;
    assert!(!cmd.has_error());

    assert!(wait_until(|| cmd.is_done(), Duration::from_secs(5)).await);
    assert!(!cmd.has_error());

    Ok(())
}
