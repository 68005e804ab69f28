pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::SplitSink, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::broadcast::broadcast_update;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

enum RoomEvent {
    Message(ServerMessage),
    Lagged,
    Closed,
}

/// Await the next room event, or park forever while unsubscribed.
async fn room_event(rx: &mut Option<broadcast::Receiver<ServerMessage>>) -> RoomEvent {
    match rx {
        Some(rx) => match rx.recv().await {
            Ok(msg) => RoomEvent::Message(msg),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "connection lagged behind room events");
                RoomEvent::Lagged
            }
            Err(broadcast::error::RecvError::Closed) => RoomEvent::Closed,
        },
        None => std::future::pending().await,
    }
}

async fn send_json(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("failed to serialize server message: {}", e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = Ulid::new().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();

    // Subscribed once the connection binds into a room.
    let mut room_rx: Option<broadcast::Receiver<ServerMessage>> = None;

    loop {
        tokio::select! {
            event = room_event(&mut room_rx) => {
                match event {
                    RoomEvent::Message(msg) => {
                        if !send_json(&mut sender, &msg).await {
                            break;
                        }
                    }
                    RoomEvent::Lagged => {}
                    RoomEvent::Closed => {
                        room_rx = None;
                    }
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(conn_id = %conn_id, "received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let dispatch =
                                    handlers::handle_message(&state, &conn_id, client_msg).await;
                                if dispatch.detach {
                                    room_rx = None;
                                }
                                if let Some(rx) = dispatch.subscribe {
                                    room_rx = Some(rx);
                                }
                                if let Some(reply) = dispatch.reply {
                                    if !send_json(&mut sender, &reply).await {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if !send_json(&mut sender, &error).await {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!(conn_id = %conn_id, "WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    handle_disconnect(&state, &conn_id).await;
    tracing::info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Transport-level drop: the player keeps their seat but is marked
/// disconnected, with host failover if needed. A later join under the same
/// name reclaims the seat.
pub async fn handle_disconnect(state: &Arc<AppState>, conn_id: &str) {
    let Some(session) = state.unbind(conn_id).await else {
        return;
    };
    let Some(handle) = state.find_room(&session.room_code).await else {
        return;
    };

    let mut room = handle.room.lock().await;
    let prev = room.version;
    let Some(player) = crate::state::roster::mark_disconnected(&mut room, &session.player_id)
    else {
        return;
    };
    tracing::info!(code = %room.code, player = %player.name, "player disconnected");

    crate::broadcast::broadcast_room(
        &handle,
        ServerMessage::PlayerDisconnected {
            player_id: player.id,
            name: player.name,
        },
    );
    broadcast_update(&handle, &room);

    let record = room.clone();
    drop(room);
    state.persist(prev, &record).await;
}
