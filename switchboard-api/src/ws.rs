//! Push Channel
//!
//! WebSocket stream of domain events for connected desktops.
//!
//! ## Protocol
//!
//! 1. Client connects with a session token (`Authorization` header, or
//!    `?access_token=` since browsers cannot set headers on upgrades)
//! 2. Server sends a `connected` frame naming the agent
//! 3. Server forwards every [`EventRecord`] as JSON
//! 4. A client that falls behind gets a `lagged` frame and keeps receiving
//!
//! ```text
//! GET /ws?access_token=<token>
//! Upgrade: websocket
//! ```

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Serialize;
use switchboard_events::EventHub;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::auth::AgentContext;
use crate::middleware::AuthExtractor;
use crate::state::AppState;
use crate::telemetry::METRICS;

/// Connection-level frames, sent alongside the domain events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ControlFrame {
    Connected { agent_id: String, worker_sid: String },
    Lagged { skipped: u64 },
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(events): State<EventHub>,
    AuthExtractor(agent): AuthExtractor,
) -> Response {
    info!(agent_id = %agent.agent_id, "WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, events, agent))
}

/// Runs for the lifetime of one connection.
async fn handle_socket(socket: WebSocket, events: EventHub, agent: AgentContext) {
    let agent_id = agent.agent_id.clone();
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before greeting so nothing published in between is missed.
    let mut rx = events.subscribe();

    let connected = ControlFrame::Connected {
        agent_id: agent.agent_id,
        worker_sid: agent.worker_sid,
    };
    if let Err(e) = send_frame(&mut sender, &connected).await {
        error!(agent_id = %agent_id, error = %e, "Failed to send connected frame");
        return;
    }

    if let Ok(m) = METRICS.as_ref() {
        m.ws_connected();
    }
    info!(agent_id = %agent_id, "WebSocket connected");

    let recv_agent = agent_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    debug!(agent_id = %recv_agent, "Client sent close frame");
                    break;
                }
                Ok(_) => {
                    // Pings are answered by axum; the channel is push-only.
                }
                Err(e) => {
                    warn!(agent_id = %recv_agent, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(record) => {
                        if let Err(e) = send_frame(&mut sender, &record).await {
                            debug!(agent_id = %agent_id, error = %e, "Send failed, closing connection");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(agent_id = %agent_id, skipped, "Client lagged, events were dropped");
                        if send_frame(&mut sender, &ControlFrame::Lagged { skipped }).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(agent_id = %agent_id, "Event hub closed");
                        break;
                    }
                }
            }

            _ = &mut recv_task => {
                debug!(agent_id = %agent_id, "Receiver task finished");
                break;
            }
        }
    }

    recv_task.abort();
    if let Ok(m) = METRICS.as_ref() {
        m.ws_disconnected();
    }
    info!(agent_id = %agent_id, "WebSocket disconnected");
}

/// Serialize a frame and send it as a text message.
async fn send_frame<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &T,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).map_err(|e| {
        error!(error = %e, "Failed to serialize frame");
        axum::Error::new(e)
    })?;
    sender.send(Message::Text(json)).await
}

/// Create the push channel router.
pub fn create_router(state: AppState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchboard_events::{DomainEvent, EventRecord};

    #[test]
    fn test_connected_frame_shape() {
        let frame = ControlFrame::Connected {
            agent_id: "42".to_string(),
            worker_sid: "WK42".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "connected", "agentId": "42", "workerSid": "WK42"})
        );
    }

    #[test]
    fn test_lagged_frame_shape() {
        let value = serde_json::to_value(ControlFrame::Lagged { skipped: 3 }).unwrap();
        assert_eq!(value, json!({"type": "lagged", "skipped": 3}));
    }

    #[test]
    fn test_event_frames_carry_type_tag() {
        let record = EventRecord::new(DomainEvent::TaskCanceled {
            task_sid: "WT1".to_string(),
            reason: "Duplicate conversation task".to_string(),
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "task_canceled");
        assert_eq!(value["taskSid"], "WT1");
        assert!(value.get("id").is_some());
    }
}
