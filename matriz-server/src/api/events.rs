//! WebSocket endpoint relaying hub broadcasts to browsers.
//!
//! Each connection gets a reader and a writer. The writer drains the
//! subscriber buffer into frames, text when the event is valid UTF-8 and
//! binary otherwise; the reader only watches for the
//! client going away. Whichever side ends first unregisters the
//! subscriber, and the hub closing the buffer in turn stops the writer.

use crate::state::EventsState;
use axum::Json;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use matriz_core::hub::{HubHandle, Subscription};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long a session waits for its writer after the reader ended.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
pub struct EventsHealthResponse {
    status: &'static str,
    version: &'static str,
    subscribers: usize,
}

pub async fn health_check(
    State(state): State<EventsState>,
) -> Result<Json<EventsHealthResponse>, StatusCode> {
    let subscribers = state
        .hub
        .subscriber_count()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    Ok(Json(EventsHealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        subscribers,
    }))
}

pub async fn events_ws(
    State(state): State<EventsState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let origin = headers.get(header::ORIGIN);
    if !state.origin_allowed(origin) {
        warn!(?origin, "Rejected websocket upgrade from disallowed origin");
        return StatusCode::FORBIDDEN.into_response();
    }
    ws.on_upgrade(move |socket| run_session(socket, state.hub))
}

async fn run_session(socket: WebSocket, hub: HubHandle) {
    let Subscription { id, outbound } = match hub.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "Dropping websocket, hub not running");
            return;
        }
    };
    debug!(%id, "Subscriber connected");

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(sink, outbound));
    let mut writer_done = false;

    tokio::select! {
        _ = read_until_closed(stream) => {}
        _ = &mut writer => writer_done = true,
    }

    if let Err(e) = hub.remove(id).await {
        debug!(%id, error = %e, "Hub gone before removal");
    }
    if !writer_done && !finish_writer(writer, WRITER_DRAIN_TIMEOUT).await {
        debug!(%id, "Writer stalled, aborted");
    }
    debug!(%id, "Subscriber disconnected");
}

/// Wait up to `limit` for the writer, aborting it past that. Returns
/// whether it finished on its own.
async fn finish_writer(mut writer: JoinHandle<()>, limit: Duration) -> bool {
    match tokio::time::timeout(limit, &mut writer).await {
        Ok(_) => true,
        Err(_) => {
            writer.abort();
            false
        }
    }
}

/// Event bodies go out unchanged.
fn frame_for(message: Bytes) -> Message {
    match std::str::from_utf8(&message) {
        Ok(text) => Message::Text(text.into()),
        Err(_) => Message::Binary(message),
    }
}

/// Runs until the buffer is closed by the hub or a send fails.
async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut outbound: mpsc::Receiver<Bytes>) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = sink.send(frame_for(message)).await {
            debug!(error = %e, "Websocket write failed");
            return;
        }
    }
    let _ = sink.close().await;
}

/// Incoming frames carry nothing of interest; read only to notice closure.
async fn read_until_closed(mut stream: SplitStream<WebSocket>) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "Websocket read failed");
                break;
            }
        }
    }
}
