//! Invalidation Notifier
//!
//! Server-push loop behind the session watch stream. Each connected client
//! gets one notifier task that polls the session's liveness every tick and
//! pushes a terminal event the moment the session stops being valid, so a
//! displaced client notices within about a second.
//!
//! Failure posture: a transient storage error never produces a false
//! invalidation. The loop tolerates consecutive failures up to a configured
//! threshold and only then closes the stream with `timeout`, which clients
//! treat as "reconnect", not "logged out".

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::config::NotifierSettings;
use crate::domain::SessionStore;
use crate::presentation::sse::{SessionEvent, WatcherRegistry};

/// Per-connection push loop over a session store.
pub struct InvalidationNotifier<S: SessionStore + ?Sized> {
    store: Arc<S>,
    registry: Arc<WatcherRegistry>,
    settings: NotifierSettings,
}

impl<S: SessionStore + ?Sized> Clone for InvalidationNotifier<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            registry: self.registry.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: SessionStore + ?Sized> InvalidationNotifier<S> {
    pub fn new(store: Arc<S>, registry: Arc<WatcherRegistry>, settings: NotifierSettings) -> Self {
        Self {
            store,
            registry,
            settings,
        }
    }

    /// Drive one watch stream to completion. Events are pushed into `tx`;
    /// the loop ends when a terminal event is sent, the client disconnects,
    /// or the stream hits its safety ceiling.
    pub async fn watch(&self, token_hash: String, tx: mpsc::Sender<SessionEvent>) {
        // Establish: the session must be live right now or the stream ends
        // immediately with the appropriate terminal event.
        let record = match self.lookup_with_tolerance(&token_hash).await {
            Ok(record) => record,
            Err(()) => {
                let _ = tx.send(SessionEvent::timeout()).await;
                return;
            }
        };

        let record = match record {
            Some(record) => record,
            None => {
                // Unknown token: nothing to watch. Reported as expired so
                // clients converge on the login screen.
                let _ = tx.send(SessionEvent::expired(chrono::Utc::now())).await;
                return;
            }
        };

        if record.is_invalidated() {
            let _ = tx.send(SessionEvent::invalidated(&record)).await;
            return;
        }
        if record.is_expired() {
            let _ = tx.send(SessionEvent::expired(record.expires_at)).await;
            return;
        }

        let user_id = record.user_id;
        if tx.send(SessionEvent::connected(user_id)).await.is_err() {
            return;
        }

        let _guard = self.registry.register(user_id);
        let deadline = Instant::now() + self.settings.max_stream_duration();
        let mut ticker = interval(self.settings.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // first tick resolves immediately

        let mut tick_count: u64 = 0;
        let mut consecutive_failures: u32 = 0;

        loop {
            ticker.tick().await;
            tick_count += 1;

            // Disconnect detection must not wait for the next heartbeat.
            if tx.is_closed() {
                tracing::debug!(user_id, tick_count, "Watch client disconnected");
                return;
            }

            if Instant::now() >= deadline {
                tracing::info!(user_id, "Watch stream hit safety ceiling");
                let _ = tx.send(SessionEvent::timeout()).await;
                return;
            }

            match self.store.find_by_token_hash(&token_hash).await {
                Ok(Some(record)) => {
                    consecutive_failures = 0;
                    if record.is_invalidated() {
                        let _ = tx.send(SessionEvent::invalidated(&record)).await;
                        return;
                    }
                    if record.is_expired() {
                        let _ = tx.send(SessionEvent::expired(record.expires_at)).await;
                        return;
                    }
                    if tick_count % u64::from(self.settings.heartbeat_every_ticks) == 0
                        && tx.send(SessionEvent::heartbeat()).await.is_err()
                    {
                        return;
                    }
                }
                Ok(None) => {
                    // The row vanished while we were watching it. Not an
                    // invalidation signal; close as expired.
                    let _ = tx.send(SessionEvent::expired(chrono::Utc::now())).await;
                    return;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        user_id,
                        consecutive_failures,
                        error = %e,
                        "Watch liveness check failed"
                    );
                    if consecutive_failures >= self.settings.max_consecutive_failures {
                        tracing::error!(user_id, "Storage unreachable, closing watch stream");
                        let _ = tx.send(SessionEvent::timeout()).await;
                        return;
                    }
                }
            }
        }
    }

    /// Initial lookup, retried at tick cadence up to the failure threshold.
    async fn lookup_with_tolerance(
        &self,
        token_hash: &str,
    ) -> Result<Option<crate::domain::SessionRecord>, ()> {
        let mut failures = 0u32;
        loop {
            match self.store.find_by_token_hash(token_hash).await {
                Ok(found) => return Ok(found),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(failures, error = %e, "Watch subscription lookup failed");
                    if failures >= self.settings.max_consecutive_failures {
                        return Err(());
                    }
                    tokio::time::sleep(self.settings.tick()).await;
                }
            }
        }
    }
}
