//! WebSocket endpoint for live job updates.
//!
//! Clients open one socket per job id and receive the job's lifecycle events
//! as JSON text frames. A client `{"action":"ping"}` is answered with
//! `{"event":"pong"}` independently of job semantics; the server also sends
//! protocol Ping frames on an interval to detect dead subscribers. There is
//! no replay: a subscriber only sees events emitted while it is connected.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path,
    },
    http::StatusCode,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;

use dossier_core::JobId;

use crate::app::{errors, AppState};

/// How often the server pings idle connections.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub fn router() -> Router {
    Router::new().route("/analyses/:id/events", get(subscribe_events))
}

/// GET /analyses/:id/events: upgrade and stream.
async fn subscribe_events(
    ws: WebSocketUpgrade,
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id: JobId = match id.parse() {
        Ok(parsed) => parsed,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_job_id", e.to_string())
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, job_id))
}

/// Client-to-server messages. Anything else is ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientAction {
    Ping,
    Unsubscribe,
}

async fn handle_socket(socket: WebSocket, state: AppState, job_id: JobId) {
    tracing::info!(%job_id, "events subscriber connected");

    let mut rx = state.hub.subscribe(job_id);
    let (mut sink, mut stream) = socket.split();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    // The first interval tick fires immediately; consume it.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    let Ok(payload) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sink.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                    if terminal {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(%job_id, skipped, "subscriber lagging, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientAction>(&text) {
                        Ok(ClientAction::Ping) => {
                            let pong = r#"{"event":"pong"}"#.to_string();
                            if sink.send(Message::Text(pong)).await.is_err() {
                                break;
                            }
                        }
                        Ok(ClientAction::Unsubscribe) => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                        Err(_) => {}
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(%job_id, error = %e, "websocket receive error");
                    break;
                }
            },
            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!(%job_id, "events subscriber disconnected");
}
