//! Server-Sent Events support
//!
//! A client gets the full snapshot once as `init`, then a `snapshot` event
//! after every state change and a `step` event whenever a generation step
//! starts calling the backend.

use crate::runtime::{SessionEvent, SessionSnapshot};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert a session's broadcast channel into an SSE stream
pub fn sse_stream(
    init: SessionSnapshot,
    broadcast_rx: tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move {
        Ok(Event::default()
            .event("init")
            .data(json!({ "type": "init", "snapshot": init }).to_string()))
    });

    // Every snapshot is complete, so a lagged client just skips ahead
    let events = BroadcastStream::new(broadcast_rx)
        .filter_map(|result| result.ok().map(|event| Ok(session_event_to_axum(event))));

    Sse::new(init.chain(events)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn session_event_to_axum(event: SessionEvent) -> Event {
    let (event_type, data) = match event {
        SessionEvent::Changed(snapshot) => (
            "snapshot",
            json!({
                "type": "snapshot",
                "snapshot": snapshot
            }),
        ),
        SessionEvent::StepStarted(step) => (
            "step",
            json!({
                "type": "step",
                "step": step
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
