// tests/debounce.rs

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::sleep;

use devloop::pipeline::Debouncer;

type TestResult = Result<(), Box<dyn Error>>;

fn counting_debouncer(window: Duration) -> (Debouncer<()>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let debouncer = {
        let count = Arc::clone(&count);
        Debouncer::new(window, move |_: ()| {
            let count = Arc::clone(&count);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        })
    };
    (debouncer, count)
}

#[tokio::test]
async fn burst_within_window_produces_one_action() -> TestResult {
    let (debouncer, count) = counting_debouncer(Duration::from_millis(100));

    for _ in 0..5 {
        debouncer.trigger(());
        sleep(Duration::from_millis(10)).await;
    }

    sleep(Duration::from_millis(400)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn spaced_triggers_each_produce_an_action() -> TestResult {
    let (debouncer, count) = counting_debouncer(Duration::from_millis(50));

    for _ in 0..3 {
        debouncer.trigger(());
        sleep(Duration::from_millis(250)).await;
    }

    assert_eq!(count.load(Ordering::SeqCst), 3);

    Ok(())
}

#[tokio::test]
async fn last_trigger_in_a_burst_determines_the_action() -> TestResult {
    let (fired_tx, mut fired_rx) = tokio::sync::mpsc::unbounded_channel();
    let debouncer = Debouncer::new(Duration::from_millis(100), move |message: String| {
        let fired_tx = fired_tx.clone();
        async move {
            let _ = fired_tx.send(message);
        }
    });

    debouncer.trigger("first".to_string());
    debouncer.trigger("second".to_string());
    debouncer.trigger("third".to_string());

    sleep(Duration::from_millis(400)).await;

    assert_eq!(fired_rx.recv().await.ok_or("no action fired")?, "third");
    assert!(fired_rx.try_recv().is_err());

    Ok(())
}
