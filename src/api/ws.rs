// WebSocket fan-out of task events
//
// Each connection gets a greeting, then every task event as JSON. Clients may
// send {"type": "ping"} keepalives which are answered with a pong; all other
// client messages are ignored.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use super::state::AppState;

pub async fn websocket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let greeting = serde_json::json!({
        "type": "connection_established",
        "timestamp": Utc::now(),
    });
    if socket
        .send(Message::Text(greeting.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    let mut events = state.tasks.subscribe();
    debug!("WebSocket client connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let Ok(payload) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if socket.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                // Skip over missed events, the client can refetch the task list
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            message = socket.recv() => match message {
                Some(Ok(Message::Text(text))) => {
                    if is_ping(&text) {
                        let pong = serde_json::json!({
                            "type": "pong",
                            "timestamp": Utc::now(),
                        });
                        if socket.send(Message::Text(pong.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }

    debug!("WebSocket client disconnected");
}

fn is_ping(text: &str) -> bool {
    if text.trim() == "ping" {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(|t| t == "ping"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_detection() {
        assert!(is_ping("ping"));
        assert!(is_ping(r#"{"type": "ping"}"#));
        assert!(!is_ping(r#"{"type": "hello"}"#));
        assert!(!is_ping("not json"));
    }
}
