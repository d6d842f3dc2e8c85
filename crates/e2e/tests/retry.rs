//! Retry combinator behaviour under paused tokio time

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use portal_e2e::retry::{retry_until, RetryPolicy};
use tokio::time::{sleep, Instant};

#[tokio::test(start_paused = true)]
async fn always_failing_block_returns_within_deadline_plus_one_run() {
    let block_time = Duration::from_millis(40);
    let timeout = Duration::from_secs(2);
    let start = Instant::now();

    let policy = RetryPolicy::new(timeout);
    let (result, stats) = tokio::time::timeout(
        Duration::from_secs(60),
        policy.run_counted(|| async move {
            sleep(block_time).await;
            Err::<(), _>("still loading")
        }),
    )
    .await
    .expect("combinator hung");

    assert!(result.is_err());
    assert!(stats.attempts > 1);
    assert!(start.elapsed() <= timeout + block_time);
    assert_eq!(stats.elapsed, start.elapsed());
}

#[tokio::test(start_paused = true)]
async fn success_on_attempt_k_stops_retrying() {
    let calls = AtomicUsize::new(0);
    let calls = &calls;

    let value = retry_until(Duration::from_secs(30), || async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == 3 {
            Ok(n)
        } else {
            Err(format!("attempt {}", n))
        }
    })
    .await
    .unwrap();

    assert_eq!(value, 3);
    // give a stray retry every chance to happen
    sleep(Duration::from_secs(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn timeout_surfaces_the_final_attempts_error_verbatim() {
    let calls = AtomicUsize::new(0);
    let calls = &calls;

    let policy = RetryPolicy::new(Duration::from_secs(3));
    let (result, stats) = policy
        .run_counted(|| async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err::<(), _>(format!("expected 20 cards, got {}", n))
        })
        .await;

    assert_eq!(result.unwrap_err(), format!("expected 20 cards, got {}", stats.attempts));
    assert_eq!(stats.attempts, calls.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn idempotent_action_settles_by_attempt_n() {
    const N: usize = 5;
    let opened = AtomicBool::new(false);
    let opener_effects = AtomicUsize::new(0);
    let checks = AtomicUsize::new(0);
    let (opened, opener_effects, checks) = (&opened, &opener_effects, &checks);

    let policy = RetryPolicy::new(Duration::from_secs(30));
    let (result, stats) = policy
        .run_counted(|| async move {
            // re-clicking an already open dialog does nothing
            if !opened.swap(true, Ordering::SeqCst) {
                opener_effects.fetch_add(1, Ordering::SeqCst);
            }
            let seen = checks.fetch_add(1, Ordering::SeqCst) + 1;
            if seen >= N {
                Ok(())
            } else {
                Err("dialog not visible yet")
            }
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(stats.attempts, N);
    assert_eq!(opener_effects.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn custom_schedule_is_used_and_last_step_repeats() {
    let policy = RetryPolicy::new(Duration::from_millis(1_000))
        .with_intervals(vec![Duration::from_millis(10), Duration::from_millis(300)]);
    assert_eq!(policy.interval(0), Duration::from_millis(10));
    assert_eq!(policy.interval(7), Duration::from_millis(300));

    let (_, stats) = policy.run_counted(|| async { Err::<(), _>("nope") }).await;
    // 0, 10, 310, 610, 910, then capped at 1000
    assert_eq!(stats.attempts, 6);
    assert_eq!(stats.elapsed, Duration::from_millis(1_000));
}
