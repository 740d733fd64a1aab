//! Watch Stream Handler
//!
//! SSE endpoint bridging the notifier loop to an HTTP response body. The
//! notifier runs as its own task and pushes events through a bounded
//! channel; when the client goes away the channel closes and the notifier
//! notices on its next tick.

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::{self, Stream};
use tokio::sync::mpsc;

use crate::application::services::hash_token;
use crate::presentation::http::extractors::SessionToken;
use crate::presentation::sse::InvalidationNotifier;
use crate::startup::AppState;

/// Events buffered between the notifier task and the response body.
const STREAM_BUFFER: usize = 16;

/// `GET /api/v1/sessions/watch` - subscribe to invalidation push events
pub async fn watch_session(
    State(state): State<AppState>,
    token: SessionToken,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let notifier = InvalidationNotifier::new(
        state.store.clone(),
        state.registry.clone(),
        state.settings.notifier.clone(),
    );
    let token_hash = hash_token(token.as_str());

    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    tokio::spawn(async move {
        notifier.watch(token_hash, tx).await;
    });

    let stream = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Event::default().json_data(&event), rx))
    });

    Sse::new(stream)
}
