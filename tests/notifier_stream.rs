//! Invalidation Push Stream Tests
//!
//! Drives the notifier loop directly over the in-memory store under a
//! paused clock, so tick-cadence assertions are exact and fast.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use session_sentinel::application::services::hash_token;
use session_sentinel::config::NotifierSettings;
use session_sentinel::domain::{InvalidationReason, SessionStore};
use session_sentinel::infrastructure::repositories::MemorySessionStore;
use session_sentinel::presentation::sse::{InvalidationNotifier, SessionEvent, WatcherRegistry};

fn settings() -> NotifierSettings {
    NotifierSettings {
        tick_ms: 500,
        heartbeat_every_ticks: 20,
        max_stream_secs: 3600,
        max_consecutive_failures: 8,
    }
}

struct Fixture {
    store: Arc<MemorySessionStore>,
    registry: Arc<WatcherRegistry>,
    notifier: InvalidationNotifier<MemorySessionStore>,
}

fn fixture(settings: NotifierSettings) -> Fixture {
    let store = Arc::new(MemorySessionStore::new());
    let registry = Arc::new(WatcherRegistry::new());
    let notifier = InvalidationNotifier::new(store.clone(), registry.clone(), settings);
    Fixture {
        store,
        registry,
        notifier,
    }
}

async fn live_session(store: &MemorySessionStore, user_id: i64, token: &str) {
    store
        .create_session(user_id, &hash_token(token), chrono::Duration::hours(2))
        .await
        .unwrap();
}

/// Receive the next event, skipping heartbeats.
async fn next_signal(rx: &mut mpsc::Receiver<SessionEvent>) -> Option<SessionEvent> {
    loop {
        match rx.recv().await? {
            SessionEvent::Heartbeat { .. } => continue,
            event => return Some(event),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn stream_opens_with_a_connected_event() {
    let f = fixture(settings());
    live_session(&f.store, 7, "tok").await;

    let (tx, mut rx) = mpsc::channel(16);
    let notifier = f.notifier.clone();
    tokio::spawn(async move { notifier.watch(hash_token("tok"), tx).await });

    match rx.recv().await.unwrap() {
        SessionEvent::Connected { user_id, .. } => assert_eq!(user_id, 7),
        other => panic!("expected connected, got {:?}", other),
    }
    assert_eq!(f.registry.count_for(7), 1);
}

#[tokio::test(start_paused = true)]
async fn invalidation_is_pushed_within_two_ticks() {
    let f = fixture(settings());
    live_session(&f.store, 1, "tok").await;

    let (tx, mut rx) = mpsc::channel(16);
    let notifier = f.notifier.clone();
    tokio::spawn(async move { notifier.watch(hash_token("tok"), tx).await });
    rx.recv().await.unwrap(); // connected

    let invalidated_at = Instant::now();
    f.store
        .invalidate(&hash_token("tok"), InvalidationReason::NewLoginDetected)
        .await
        .unwrap();

    match next_signal(&mut rx).await.unwrap() {
        SessionEvent::SessionInvalidated { reason, .. } => {
            assert_eq!(reason, "new_login_detected");
        }
        other => panic!("expected invalidated, got {:?}", other),
    }
    assert!(invalidated_at.elapsed() <= Duration::from_secs(2));

    // Terminal: the stream closes.
    assert!(rx.recv().await.is_none());
    assert_eq!(f.registry.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn natural_expiry_is_reported_as_expired_not_invalidated() {
    let f = fixture(settings());
    live_session(&f.store, 1, "tok").await;

    let (tx, mut rx) = mpsc::channel(16);
    let notifier = f.notifier.clone();
    tokio::spawn(async move { notifier.watch(hash_token("tok"), tx).await });
    rx.recv().await.unwrap(); // connected

    f.store.expire_now(&hash_token("tok"));

    match next_signal(&mut rx).await.unwrap() {
        SessionEvent::SessionExpired { .. } => {}
        other => panic!("expected expired, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_token_closes_immediately_without_connected() {
    let f = fixture(settings());

    let (tx, mut rx) = mpsc::channel(16);
    let notifier = f.notifier.clone();
    tokio::spawn(async move { notifier.watch(hash_token("nope"), tx).await });

    match rx.recv().await.unwrap() {
        SessionEvent::SessionExpired { .. } => {}
        other => panic!("expected expired, got {:?}", other),
    }
    assert!(rx.recv().await.is_none());
    assert_eq!(f.registry.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn already_invalidated_session_closes_immediately() {
    let f = fixture(settings());
    live_session(&f.store, 1, "tok").await;
    f.store
        .invalidate(&hash_token("tok"), InvalidationReason::UserLogout)
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    let notifier = f.notifier.clone();
    tokio::spawn(async move { notifier.watch(hash_token("tok"), tx).await });

    match rx.recv().await.unwrap() {
        SessionEvent::SessionInvalidated { reason, .. } => {
            assert_eq!(reason, "user_logout");
        }
        other => panic!("expected invalidated, got {:?}", other),
    }
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn heartbeats_arrive_every_twentieth_tick() {
    let f = fixture(settings());
    live_session(&f.store, 1, "tok").await;

    let (tx, mut rx) = mpsc::channel(64);
    let notifier = f.notifier.clone();
    tokio::spawn(async move { notifier.watch(hash_token("tok"), tx).await });

    let start = Instant::now();
    rx.recv().await.unwrap(); // connected

    match rx.recv().await.unwrap() {
        SessionEvent::Heartbeat { .. } => {}
        other => panic!("expected heartbeat, got {:?}", other),
    }
    // 20 ticks at 500 ms.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(11));

    match rx.recv().await.unwrap() {
        SessionEvent::Heartbeat { .. } => {}
        other => panic!("expected heartbeat, got {:?}", other),
    }
    assert!(start.elapsed() >= Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn safety_ceiling_closes_the_stream_with_timeout() {
    let f = fixture(NotifierSettings {
        max_stream_secs: 3,
        ..settings()
    });
    live_session(&f.store, 1, "tok").await;

    let (tx, mut rx) = mpsc::channel(64);
    let notifier = f.notifier.clone();
    tokio::spawn(async move { notifier.watch(hash_token("tok"), tx).await });
    rx.recv().await.unwrap(); // connected

    match next_signal(&mut rx).await.unwrap() {
        SessionEvent::Timeout { message, .. } => {
            assert_eq!(message, "Connection timeout - please reconnect");
        }
        other => panic!("expected timeout, got {:?}", other),
    }

    // The session itself was never touched.
    let record = f
        .store
        .find_by_token_hash(&hash_token("tok"))
        .await
        .unwrap()
        .unwrap();
    assert!(record.is_live());
}

#[tokio::test(start_paused = true)]
async fn transient_failures_below_the_threshold_are_tolerated() {
    let f = fixture(settings());
    live_session(&f.store, 1, "tok").await;

    let (tx, mut rx) = mpsc::channel(64);
    let notifier = f.notifier.clone();
    tokio::spawn(async move { notifier.watch(hash_token("tok"), tx).await });
    rx.recv().await.unwrap(); // connected

    f.store.inject_failures(3);

    // The stream survives and keeps heartbeating.
    match rx.recv().await.unwrap() {
        SessionEvent::Heartbeat { .. } => {}
        other => panic!("expected heartbeat, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn persistent_failures_escalate_to_timeout_never_invalidation() {
    let f = fixture(settings());
    live_session(&f.store, 1, "tok").await;

    let (tx, mut rx) = mpsc::channel(64);
    let notifier = f.notifier.clone();
    tokio::spawn(async move { notifier.watch(hash_token("tok"), tx).await });
    rx.recv().await.unwrap(); // connected

    f.store.inject_failures(u32::MAX);

    match next_signal(&mut rx).await.unwrap() {
        SessionEvent::Timeout { .. } => {}
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn client_disconnect_tears_the_stream_down_within_a_tick() {
    let f = fixture(settings());
    live_session(&f.store, 1, "tok").await;

    let (tx, mut rx) = mpsc::channel(16);
    let notifier = f.notifier.clone();
    let task = tokio::spawn(async move { notifier.watch(hash_token("tok"), tx).await });

    rx.recv().await.unwrap(); // connected
    assert_eq!(f.registry.active_count(), 1);

    drop(rx);
    task.await.unwrap();
    assert_eq!(f.registry.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn a_hundred_dropped_streams_leave_no_registrations() {
    let f = fixture(settings());
    let mut tasks = Vec::new();

    for user_id in 0..100 {
        let token = format!("tok-{}", user_id);
        live_session(&f.store, user_id, &token).await;

        let (tx, mut rx) = mpsc::channel(16);
        let notifier = f.notifier.clone();
        let hash = hash_token(&token);
        let task = tokio::spawn(async move { notifier.watch(hash, tx).await });

        rx.recv().await.unwrap(); // connected
        drop(rx);
        tasks.push(task);
    }

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(f.registry.active_count(), 0);
}
